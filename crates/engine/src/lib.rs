// crates/engine/src/lib.rs
//! Finds the newest tabular files under a set of roots and reports their
//! first lines.
//!
//! The pipeline is [`walker::TreeWalker`] (per-directory selection by
//! [`selector::FolderSelector`]) feeding [`extract::RowExtractor`], whose
//! results [`report::ReportBuilder`] writes into a [`output::ReportSink`].

pub mod config;
pub mod encoding;
pub mod error;
pub mod extract;
pub mod output;
pub mod progress;
pub mod report;
pub mod selector;
#[cfg(feature = "spreadsheets")]
pub mod spreadsheet;
pub mod text;
pub mod walker;

pub use config::{
    ExtractOptions, ExtractOptionsBuilder, FolderCap, RootSpec, ScanConfig, ScanConfigBuilder,
    SelectionPolicy, SelectionPolicyBuilder, TimestampKey, encoding_for_label, resolve_roots,
};
pub use encoding::{EncodingSniffer, TextEncoding};
pub use error::{EngineError, Result};
pub use extract::{Capabilities, Extraction, RowExtractor};
pub use output::{DelimitedSink, ReportSink};
pub use progress::ProgressSink;
pub use report::{ReportBuilder, ReportRow, ReportSummary, RunReport, count_expected, run_to_dir};
pub use selector::{FileCandidate, FolderSelector};
pub use walker::{ScanItem, TreeWalker};
