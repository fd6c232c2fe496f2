use std::fmt;
use std::io;
use std::path::Path;

use crate::config::ExtractOptions;
use crate::encoding::EncodingSniffer;
use crate::text::TextReader;

pub const SENTINEL_UNSUPPORTED: &str = "<unsupported extension>";
pub const SENTINEL_UNREADABLE_CSV: &str = "<could not read CSV>";
pub const SENTINEL_NO_SPREADSHEETS: &str = "<spreadsheet reader unavailable>";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileKind {
    Delimited,
    Xlsx,
    Xls,
    Other,
}

impl FileKind {
    /// Classifies by extension, ignoring case.
    pub fn from_path(path: &Path) -> Self {
        let ext = path
            .extension()
            .and_then(|s| s.to_str())
            .map(str::to_ascii_lowercase);
        match ext.as_deref() {
            Some("csv") => Self::Delimited,
            Some("xlsx") => Self::Xlsx,
            Some("xls") => Self::Xls,
            _ => Self::Other,
        }
    }
}

impl fmt::Display for FileKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Delimited => "csv",
            Self::Xlsx => "xlsx",
            Self::Xls => "xls",
            Self::Other => "other",
        })
    }
}

/// Optional readers compiled into this build, probed once.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Capabilities {
    pub spreadsheets: bool,
}

impl Capabilities {
    #[must_use]
    pub fn detect() -> Self {
        Self {
            spreadsheets: cfg!(feature = "spreadsheets"),
        }
    }
}

/// Outcome of extracting one file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Extraction {
    /// The first lines/rows of the file.
    Rows(Vec<String>),
    /// Extraction failed; the file is still reported with this placeholder.
    Sentinel(String),
    /// The file is left out of the report.
    Skipped(String),
}

impl Extraction {
    /// Cells to report, or `None` for a skipped file.
    #[must_use]
    pub fn into_cells(self) -> Option<Vec<String>> {
        match self {
            Self::Rows(rows) => Some(rows),
            Self::Sentinel(text) => Some(vec![text]),
            Self::Skipped(_) => None,
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct RowExtractor {
    text: TextReader,
    capabilities: Capabilities,
}

impl RowExtractor {
    #[must_use]
    pub fn new(options: &ExtractOptions, capabilities: Capabilities) -> Self {
        Self {
            text: TextReader::new(EncodingSniffer::new(options.sniff_budget), options.legacy_encoding),
            capabilities,
        }
    }

    /// Returns at most `max_rows` rows; never fails.
    pub fn extract(&self, path: &Path, max_rows: usize) -> Extraction {
        match FileKind::from_path(path) {
            FileKind::Delimited => self.extract_text(path, max_rows),
            kind @ (FileKind::Xlsx | FileKind::Xls) => self.extract_sheet(path, kind, max_rows),
            FileKind::Other => Extraction::Sentinel(SENTINEL_UNSUPPORTED.to_string()),
        }
    }

    fn extract_text(&self, path: &Path, max_rows: usize) -> Extraction {
        match self.text.read_first_lines(path, max_rows) {
            Ok(decoded) => {
                if decoded.lossy {
                    log::warn!(
                        "{}: no strict decoding succeeded, replaced undecodable bytes ({})",
                        path.display(),
                        decoded.encoding
                    );
                } else {
                    log::debug!("{}: decoded as {}", path.display(), decoded.encoding);
                }
                Extraction::Rows(decoded.lines)
            }
            Err(err) if err.kind() == io::ErrorKind::NotFound => vanished(path),
            Err(err) => {
                log::warn!("{}: {err}", path.display());
                Extraction::Sentinel(SENTINEL_UNREADABLE_CSV.to_string())
            }
        }
    }

    fn extract_sheet(&self, path: &Path, kind: FileKind, max_rows: usize) -> Extraction {
        if !self.capabilities.spreadsheets {
            return Extraction::Sentinel(SENTINEL_NO_SPREADSHEETS.to_string());
        }
        if !path.exists() {
            return vanished(path);
        }
        read_sheet(path, kind, max_rows)
    }
}

fn vanished(path: &Path) -> Extraction {
    log::debug!("{} disappeared before it could be read", path.display());
    Extraction::Skipped(format!("{} no longer exists", path.display()))
}

#[cfg(feature = "spreadsheets")]
fn read_sheet(path: &Path, kind: FileKind, max_rows: usize) -> Extraction {
    match crate::spreadsheet::read_first_rows(path, max_rows) {
        Ok(rows) => Extraction::Rows(rows),
        Err(err) => {
            log::warn!("{}: {err}", path.display());
            Extraction::Sentinel(format!("<{kind} error: {err}>"))
        }
    }
}

#[cfg(not(feature = "spreadsheets"))]
fn read_sheet(_path: &Path, _kind: FileKind, _max_rows: usize) -> Extraction {
    Extraction::Sentinel(SENTINEL_NO_SPREADSHEETS.to_string())
}
