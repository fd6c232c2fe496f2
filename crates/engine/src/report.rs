use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::path::{Path, PathBuf};

use crate::config::ScanConfig;
use crate::error::{EngineError, Result};
use crate::extract::{Capabilities, Extraction, RowExtractor};
use crate::output::{self, ReportSink};
use crate::progress::{ProgressGuard, ProgressSink};
use crate::selector::FolderSelector;
use crate::walker::{ScanItem, TreeWalker};

/// One report line: the file and exactly `GlobalMaxLines` cells.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReportRow {
    pub file_path: String,
    pub cells: Vec<String>,
}

impl ReportRow {
    #[must_use]
    pub fn new(path: &Path, cells: Vec<String>, width: usize) -> Self {
        Self {
            file_path: output::render_path(path),
            cells: normalize(cells, width),
        }
    }

    #[must_use]
    pub fn into_record(self) -> Vec<String> {
        std::iter::once(self.file_path).chain(self.cells).collect()
    }
}

/// Pads with empty cells or truncates so that exactly `width` cells remain.
#[must_use]
pub fn normalize(mut cells: Vec<String>, width: usize) -> Vec<String> {
    cells.truncate(width);
    cells.resize(width, String::new());
    cells
}

/// Counters of one run. Sentinel rows count as written.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReportSummary {
    pub written: u64,
    pub skipped: u64,
    pub sentinels: u64,
    /// Files announced to the progress sink, when one was attached.
    pub estimated_total: Option<u64>,
}

impl ReportSummary {
    #[must_use]
    pub fn attempted(&self) -> u64 {
        self.written + self.skipped
    }
}

/// Drives walk, extraction and output for one scan.
pub struct ReportBuilder<'a> {
    config: &'a ScanConfig,
    progress: Option<&'a dyn ProgressSink>,
    capabilities: Capabilities,
}

impl<'a> ReportBuilder<'a> {
    #[must_use]
    pub fn new(config: &'a ScanConfig) -> Self {
        Self {
            config,
            progress: None,
            capabilities: Capabilities::detect(),
        }
    }

    #[must_use]
    pub fn with_progress(mut self, progress: &'a dyn ProgressSink) -> Self {
        self.progress = Some(progress);
        self
    }

    #[must_use]
    pub fn with_capabilities(mut self, capabilities: Capabilities) -> Self {
        self.capabilities = capabilities;
        self
    }

    /// Writes the header and one row per extracted file into `sink`.
    ///
    /// Roots are scanned as given; pass them through
    /// [`resolve_roots`](crate::config::resolve_roots) first to drop missing
    /// ones and fall back to a default root.
    ///
    /// # Errors
    /// Fails with [`EngineError::NoRoots`] for an empty root list, or when
    /// the sink rejects a write. Problems with individual files never fail
    /// the run.
    pub fn build<S: ReportSink + ?Sized>(&self, sink: &mut S) -> Result<ReportSummary> {
        if self.config.roots.is_empty() {
            return Err(EngineError::NoRoots);
        }

        let width = self.config.global_max_lines();
        let selector = FolderSelector::new(self.config.selection.clone());
        let extractor = RowExtractor::new(&self.config.extract, self.capabilities);
        let mut summary = ReportSummary::default();

        let guard = ProgressGuard::new(self.progress);
        if let Some(progress) = self.progress {
            let total = count_expected(self.config);
            log::info!("about to process roughly {total} files");
            progress.start(total);
            summary.estimated_total = Some(total);
        }

        sink.write_record(&self.config.header())?;
        sink.flush()?;

        for item in TreeWalker::new(&self.config.roots, &selector) {
            let extraction = extract_guarded(&extractor, &item);
            guard.advance();

            let cells = match extraction {
                Extraction::Skipped(reason) => {
                    log::debug!("skipped: {reason}");
                    summary.skipped += 1;
                    continue;
                }
                Extraction::Sentinel(text) => {
                    summary.sentinels += 1;
                    vec![text]
                }
                Extraction::Rows(rows) => rows,
            };

            let row = ReportRow::new(&item.path, cells, width);
            sink.write_record(&row.into_record())?;
            sink.flush()?;
            summary.written += 1;
        }

        sink.finish()?;
        Ok(summary)
    }
}

fn extract_guarded(extractor: &RowExtractor, item: &ScanItem) -> Extraction {
    let result = panic::catch_unwind(AssertUnwindSafe(|| {
        extractor.extract(&item.path, item.lines_per_file)
    }));
    result.unwrap_or_else(|payload| {
        let message = panic_message(payload.as_ref());
        log::warn!("{}: reader panicked: {message}", item.path.display());
        Extraction::Skipped(format!("{}: reader panicked", item.path.display()))
    })
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    payload
        .downcast_ref::<&str>()
        .copied()
        .or_else(|| payload.downcast_ref::<String>().map(String::as_str))
        .unwrap_or("unknown panic")
}

/// Number of files the walk would select right now. Reads metadata only.
#[must_use]
pub fn count_expected(config: &ScanConfig) -> u64 {
    let selector = FolderSelector::new(config.selection.clone());
    TreeWalker::new(&config.roots, &selector).count() as u64
}

/// Result of [`run_to_dir`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunReport {
    pub summary: ReportSummary,
    pub output_path: PathBuf,
}

/// Scans and writes `Files_Head_Scan_<timestamp>.csv` into `out_dir`.
///
/// # Errors
/// Fails when the output cannot be created or written, or when no roots
/// are configured.
pub fn run_to_dir(
    config: &ScanConfig,
    out_dir: &Path,
    progress: Option<&dyn ProgressSink>,
) -> Result<RunReport> {
    let (output_path, mut sink) =
        output::create_report_file(out_dir, chrono::Local::now(), config.output_encoding)?;
    log::info!("writing report to {}", output_path.display());

    let mut builder = ReportBuilder::new(config);
    if let Some(progress) = progress {
        builder = builder.with_progress(progress);
    }
    let summary = builder.build(&mut sink)?;
    Ok(RunReport {
        summary,
        output_path,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{FolderCap, RootSpec, ScanConfigBuilder};
    use std::fs;
    use std::sync::atomic::{AtomicU64, Ordering};

    #[derive(Default)]
    struct Recorder {
        started: AtomicU64,
        advanced: AtomicU64,
        finished: AtomicU64,
    }

    impl ProgressSink for Recorder {
        fn start(&self, total: u64) {
            self.started.store(total, Ordering::SeqCst);
        }
        fn advance(&self) {
            self.advanced.fetch_add(1, Ordering::SeqCst);
        }
        fn finish(&self) {
            self.finished.fetch_add(1, Ordering::SeqCst);
        }
    }

    struct FailingSink;

    impl ReportSink for FailingSink {
        fn write_record(&mut self, _record: &[String]) -> Result<()> {
            Err(EngineError::Io(std::io::Error::other("disk full")))
        }
    }

    /// Deletes `victim` once the estimate is announced, before any extraction.
    struct DeleteOnStart {
        victim: PathBuf,
        recorder: Recorder,
    }

    impl ProgressSink for DeleteOnStart {
        fn start(&self, total: u64) {
            fs::remove_file(&self.victim).unwrap();
            self.recorder.start(total);
        }
        fn advance(&self) {
            self.recorder.advance();
        }
        fn finish(&self) {
            self.recorder.finish();
        }
    }

    fn config_for(root: &Path, lines: usize) -> ScanConfig {
        ScanConfigBuilder::default()
            .roots(vec![RootSpec::new(root, FolderCap::Unbounded, lines)])
            .build()
            .unwrap()
    }

    #[test]
    fn normalize_pads_and_truncates() {
        assert_eq!(normalize(vec!["a".into()], 3), vec!["a", "", ""]);
        assert_eq!(normalize(vec!["a".into(), "b".into(), "c".into()], 2), vec!["a", "b"]);
    }

    #[test]
    fn header_comes_first_and_rows_are_padded() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("one.csv"), "only\n").unwrap();
        let config = config_for(dir.path(), 3);

        let mut rows: Vec<Vec<String>> = Vec::new();
        let summary = ReportBuilder::new(&config).build(&mut rows).unwrap();

        assert_eq!(rows[0], vec!["File Path", "Line 1", "Line 2", "Line 3"]);
        assert_eq!(rows[1][1..], ["only", "", ""]);
        assert_eq!(summary.written, 1);
        assert_eq!(summary.estimated_total, None);
    }

    #[test]
    fn progress_sees_every_attempt_and_finishes_once() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("a.csv"), "x").unwrap();
        fs::write(dir.path().join("b.csv"), "y").unwrap();
        let config = config_for(dir.path(), 1);
        let recorder = Recorder::default();

        let mut rows: Vec<Vec<String>> = Vec::new();
        let summary = ReportBuilder::new(&config)
            .with_progress(&recorder)
            .build(&mut rows)
            .unwrap();

        assert_eq!(recorder.started.load(Ordering::SeqCst), 2);
        assert_eq!(recorder.advanced.load(Ordering::SeqCst), 2);
        assert_eq!(recorder.finished.load(Ordering::SeqCst), 1);
        assert_eq!(summary.estimated_total, Some(2));
    }

    #[test]
    fn vanished_file_is_skipped_without_a_row() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("a.csv"), "kept").unwrap();
        fs::write(dir.path().join("b.csv"), "gone").unwrap();
        let config = config_for(dir.path(), 1);
        let progress = DeleteOnStart {
            victim: dir.path().join("b.csv"),
            recorder: Recorder::default(),
        };

        let mut rows: Vec<Vec<String>> = Vec::new();
        let summary = ReportBuilder::new(&config)
            .with_progress(&progress)
            .build(&mut rows)
            .unwrap();

        assert_eq!(summary.skipped, 1);
        assert_eq!(summary.written, 1);
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[1][1], "kept");
        assert!(rows.iter().all(|row| !row[0].ends_with("b.csv")));
        assert_eq!(progress.recorder.advanced.load(Ordering::SeqCst), summary.attempted());
        assert_eq!(summary.estimated_total, Some(summary.attempted()));
    }

    #[test]
    fn resolved_roots_fall_back_to_the_default_directory() {
        let fallback = tempfile::tempdir().unwrap();
        fs::write(fallback.path().join("here.csv"), "x").unwrap();
        let missing = vec![RootSpec::with_defaults(fallback.path().join("absent"))];
        let config = ScanConfigBuilder::default()
            .roots(crate::config::resolve_roots(missing, fallback.path()))
            .build()
            .unwrap();

        let mut rows: Vec<Vec<String>> = Vec::new();
        let summary = ReportBuilder::new(&config).build(&mut rows).unwrap();

        assert_eq!(summary.written, 1);
        assert!(rows[1][0].ends_with("here.csv"));
    }

    #[test]
    fn sink_failure_is_fatal_and_still_finishes_progress() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("a.csv"), "x").unwrap();
        let config = config_for(dir.path(), 1);
        let recorder = Recorder::default();

        let result = ReportBuilder::new(&config)
            .with_progress(&recorder)
            .build(&mut FailingSink);

        assert!(matches!(result, Err(EngineError::Io(_))));
        assert_eq!(recorder.finished.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn empty_root_list_is_rejected() {
        let config = ScanConfigBuilder::default().roots(Vec::<RootSpec>::new()).build().unwrap();
        let mut rows: Vec<Vec<String>> = Vec::new();
        assert!(matches!(
            ReportBuilder::new(&config).build(&mut rows),
            Err(EngineError::NoRoots)
        ));
        assert!(rows.is_empty());
    }

    #[test]
    fn panic_payloads_are_described() {
        let payload: Box<dyn Any + Send> = Box::new("boom");
        assert_eq!(panic_message(payload.as_ref()), "boom");
        let payload: Box<dyn Any + Send> = Box::new(String::from("bang"));
        assert_eq!(panic_message(payload.as_ref()), "bang");
        let payload: Box<dyn Any + Send> = Box::new(7_u8);
        assert_eq!(panic_message(payload.as_ref()), "unknown panic");
    }

    #[test]
    fn run_to_dir_creates_directory_and_named_file() {
        let src = tempfile::tempdir().unwrap();
        fs::write(src.path().join("a.csv"), "x;y\n").unwrap();
        let out = tempfile::tempdir().unwrap();
        let target = out.path().join("nested/reports");

        let report = run_to_dir(&config_for(src.path(), 2), &target, None).unwrap();

        assert!(report.output_path.starts_with(&target));
        let name = report.output_path.file_name().unwrap().to_string_lossy().into_owned();
        assert!(name.starts_with("Files_Head_Scan_") && name.ends_with(".csv"), "{name}");
        let text = fs::read_to_string(&report.output_path).unwrap();
        assert!(text.starts_with("File Path;Line 1;Line 2\n"), "{text}");
        assert!(text.contains(";\"x;y\";\n"), "{text}");
        assert_eq!(report.summary.written, 1);
    }
}
