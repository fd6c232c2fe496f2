use crate::error::{EngineError, Result};
use derive_builder::Builder;
use encoding_rs::Encoding;
use std::path::{Path, PathBuf};

pub const DEFAULT_MAX_FILES_PER_FOLDER: i64 = 100;
pub const DEFAULT_LINES_PER_FILE: usize = 5;

/// Prefix read for encoding sniffing.
pub const DEFAULT_SNIFF_BUDGET: usize = 256 * 1024;

/// Extensions selected by default (lowercase, without the dot).
pub const DEFAULT_EXTENSIONS: &[&str] = &["csv", "xls", "xlsx"];

/// Maximum number of files taken from a single directory.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FolderCap {
    Limited(usize),
    Unbounded,
}

impl FolderCap {
    /// Any value `<= 0` means no limit.
    #[must_use]
    pub fn from_count(value: i64) -> Self {
        usize::try_from(value)
            .ok()
            .filter(|&n| n > 0)
            .map_or(Self::Unbounded, Self::Limited)
    }

    #[must_use]
    pub fn limit(self) -> Option<usize> {
        match self {
            Self::Limited(n) => Some(n),
            Self::Unbounded => None,
        }
    }
}

impl Default for FolderCap {
    fn default() -> Self {
        Self::from_count(DEFAULT_MAX_FILES_PER_FOLDER)
    }
}

/// One configured top-level directory with its own caps.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RootSpec {
    pub path: PathBuf,
    pub max_files_per_folder: FolderCap,
    pub lines_per_file: usize,
}

impl RootSpec {
    /// `lines_per_file` is clamped to at least one line.
    pub fn new(path: impl Into<PathBuf>, max_files_per_folder: FolderCap, lines_per_file: usize) -> Self {
        Self {
            path: path.into(),
            max_files_per_folder,
            lines_per_file: lines_per_file.max(1),
        }
    }

    pub fn with_defaults(path: impl Into<PathBuf>) -> Self {
        Self::new(path, FolderCap::default(), DEFAULT_LINES_PER_FILE)
    }
}

/// Which file timestamp ranks candidates inside a folder.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum TimestampKey {
    #[default]
    Modified,
    Created,
    Accessed,
}

impl std::str::FromStr for TimestampKey {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "modified" | "mtime" => Ok(Self::Modified),
            "created" | "ctime" => Ok(Self::Created),
            "accessed" | "atime" => Ok(Self::Accessed),
            other => Err(format!("Unknown timestamp key: {other}")),
        }
    }
}

#[derive(Debug, Clone, Builder)]
#[builder(setter(into))]
pub struct SelectionPolicy {
    #[builder(default)]
    pub timestamp: TimestampKey,
    #[builder(default = "true")]
    pub descending: bool,
    #[builder(default = "default_extensions()")]
    pub extensions: Vec<String>,
}

impl Default for SelectionPolicy {
    fn default() -> Self {
        Self {
            timestamp: TimestampKey::Modified,
            descending: true,
            extensions: default_extensions(),
        }
    }
}

fn default_extensions() -> Vec<String> {
    DEFAULT_EXTENSIONS.iter().map(|e| (*e).to_string()).collect()
}

#[derive(Debug, Clone, Builder)]
#[builder(setter(into))]
pub struct ExtractOptions {
    /// Single-byte code page tried after UTF-8 and used for the final lossy decode.
    #[builder(default = "encoding_rs::WINDOWS_1251")]
    pub legacy_encoding: &'static Encoding,
    #[builder(default = "DEFAULT_SNIFF_BUDGET")]
    pub sniff_budget: usize,
}

impl Default for ExtractOptions {
    fn default() -> Self {
        Self {
            legacy_encoding: encoding_rs::WINDOWS_1251,
            sniff_budget: DEFAULT_SNIFF_BUDGET,
        }
    }
}

#[derive(Debug, Clone, Builder)]
#[builder(setter(into))]
pub struct ScanConfig {
    /// Scanned as given. Build from [`resolve_roots`] to get the default-root fallback.
    pub roots: Vec<RootSpec>,
    #[builder(default)]
    pub selection: SelectionPolicy,
    #[builder(default)]
    pub extract: ExtractOptions,
    /// Character encoding of the written report.
    #[builder(default = "encoding_rs::WINDOWS_1251")]
    pub output_encoding: &'static Encoding,
}

impl ScanConfig {
    /// Width of every report row: the largest line cap over all roots.
    #[must_use]
    pub fn global_max_lines(&self) -> usize {
        self.roots
            .iter()
            .map(|r| r.lines_per_file)
            .max()
            .unwrap_or(DEFAULT_LINES_PER_FILE)
    }

    /// Header row: `File Path`, `Line 1` .. `Line N`.
    #[must_use]
    pub fn header(&self) -> Vec<String> {
        std::iter::once("File Path".to_string())
            .chain((1..=self.global_max_lines()).map(|i| format!("Line {i}")))
            .collect()
    }
}

impl From<ScanConfigBuilderError> for EngineError {
    fn from(err: ScanConfigBuilderError) -> Self {
        Self::Config(err.to_string())
    }
}

/// Looks up a WHATWG encoding label (`cp1251`, `windows-1251`, `utf-8`, ...).
///
/// # Errors
/// Returns [`EngineError::UnknownEncoding`] for labels `encoding_rs` does not know.
pub fn encoding_for_label(label: &str) -> Result<&'static Encoding> {
    let normalized = label.trim().to_ascii_lowercase();
    let lookup = match normalized.as_str() {
        // Python-style code page aliases are common in hand-written settings.
        "cp1251" => "windows-1251",
        "cp1252" => "windows-1252",
        "utf-8-sig" | "utf8" => "utf-8",
        other => other,
    };
    Encoding::for_label(lookup.as_bytes()).ok_or_else(|| EngineError::UnknownEncoding(label.to_string()))
}

/// Keeps roots that are existing directories; falls back to one default root over `default_dir`.
pub fn resolve_roots(configured: Vec<RootSpec>, default_dir: &Path) -> Vec<RootSpec> {
    let roots: Vec<RootSpec> = configured
        .into_iter()
        .filter(|root| {
            let ok = root.path.is_dir();
            if !ok {
                log::warn!("path not found or not a directory: {}", root.path.display());
            }
            ok
        })
        .collect();

    if roots.is_empty() {
        log::warn!(
            "no usable roots configured, scanning {} instead",
            default_dir.display()
        );
        return vec![RootSpec::with_defaults(default_dir)];
    }
    roots
}
