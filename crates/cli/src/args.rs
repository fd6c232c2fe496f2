// crates/cli/src/args.rs
use std::path::PathBuf;

use clap::{ArgAction, Parser, ValueEnum, ValueHint};
use head_scan_engine::TimestampKey;

/// Which timestamp ranks files inside a folder.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
#[value(rename_all = "lowercase")]
pub enum SortByArg {
    Modified,
    Created,
    Accessed,
}

impl From<SortByArg> for TimestampKey {
    fn from(value: SortByArg) -> Self {
        match value {
            SortByArg::Modified => Self::Modified,
            SortByArg::Created => Self::Created,
            SortByArg::Accessed => Self::Accessed,
        }
    }
}

/// Top-level CLI arguments parsed via clap.
#[derive(Parser, Debug)]
#[command(
    name = "head_scan",
    version = crate::VERSION,
    about = "Collects the first lines of the newest CSV/XLS/XLSX files in every folder into one report"
)]
#[allow(clippy::struct_excessive_bools)]
pub struct Args {
    /// Root directories to scan. When given, roots from the settings file are ignored
    #[arg(value_hint = ValueHint::DirPath)]
    pub roots: Vec<PathBuf>,

    /// Settings file (default: head_scan.yaml next to the executable)
    #[arg(long, value_hint = ValueHint::FilePath, help_heading = "Settings")]
    pub settings: Option<PathBuf>,

    /// Files taken per folder, applied to every root; 0 or less means no limit
    #[arg(long, allow_negative_numbers = true, help_heading = "Selection")]
    pub max_files: Option<i64>,

    /// Lines taken per file, applied to every root
    #[arg(long, value_parser = clap::value_parser!(u32).range(1..), help_heading = "Selection")]
    pub lines: Option<u32>,

    /// Timestamp used to rank files
    #[arg(long, value_enum, help_heading = "Selection")]
    pub sort_by: Option<SortByArg>,

    /// Prefer the oldest files instead of the newest
    #[arg(long, help_heading = "Selection")]
    pub ascending: bool,

    /// Directory receiving the report (default: the settings file's directory)
    #[arg(long, value_hint = ValueHint::DirPath, help_heading = "Output")]
    pub output_dir: Option<PathBuf>,

    /// Encoding of the written report, e.g. windows-1251 or utf-8
    #[arg(long, help_heading = "Output")]
    pub output_encoding: Option<String>,

    /// Code page tried for text files that are not UTF-8
    #[arg(long, help_heading = "Decoding")]
    pub legacy_encoding: Option<String>,

    /// Do not print progress to stderr
    #[arg(long, help_heading = "Output")]
    pub no_progress: bool,

    /// More log output (-v info, -vv debug)
    #[arg(short, long, action = ArgAction::Count, conflicts_with = "quiet")]
    pub verbose: u8,

    /// Only log errors
    #[arg(short, long)]
    pub quiet: bool,
}
