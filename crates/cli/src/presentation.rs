// crates/cli/src/presentation.rs
use head_scan_engine::{ProgressSink, RunReport};
use std::sync::atomic::{AtomicU64, Ordering};

/// Progress lines on stderr every [`StderrProgress::EVERY`] files and at the end.
#[derive(Debug, Default)]
pub struct StderrProgress {
    total: AtomicU64,
    current: AtomicU64,
}

impl StderrProgress {
    pub const EVERY: u64 = 100;

    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn line(&self) -> String {
        format!(
            "[{}/{}] Processing...",
            self.current.load(Ordering::Relaxed),
            self.total.load(Ordering::Relaxed)
        )
    }
}

impl ProgressSink for StderrProgress {
    fn start(&self, total: u64) {
        self.total.store(total, Ordering::Relaxed);
        self.current.store(0, Ordering::Relaxed);
    }

    fn advance(&self) {
        let current = self.current.fetch_add(1, Ordering::Relaxed) + 1;
        if current % Self::EVERY == 0 {
            eprintln!("{}", self.line());
        }
    }

    fn finish(&self) {
        if self.current.load(Ordering::Relaxed) % Self::EVERY != 0 {
            eprintln!("{}", self.line());
        }
    }
}

/// Final summary printed on stdout.
#[must_use]
pub fn summary_lines(report: &RunReport) -> Vec<String> {
    let summary = &report.summary;
    let mut lines = vec![format!(
        "Done. Files written: {}. Skipped: {}.",
        summary.written, summary.skipped
    )];
    if summary.sentinels > 0 {
        lines.push(format!("Unreadable files reported as placeholders: {}", summary.sentinels));
    }
    lines.push(format!("Report: {}", report.output_path.display()));
    lines
}

pub fn print_summary(report: &RunReport) {
    for line in summary_lines(report) {
        println!("{line}");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use head_scan_engine::ReportSummary;
    use std::path::PathBuf;

    #[test]
    fn summary_mentions_counts_and_path() {
        let report = RunReport {
            summary: ReportSummary {
                written: 4,
                skipped: 1,
                sentinels: 2,
                estimated_total: Some(5),
            },
            output_path: PathBuf::from("out/Files_Head_Scan_20240101_000000.csv"),
        };
        let lines = summary_lines(&report);
        assert_eq!(lines[0], "Done. Files written: 4. Skipped: 1.");
        assert!(lines[1].ends_with('2'));
        assert!(lines[2].ends_with("Files_Head_Scan_20240101_000000.csv"));
    }

    #[test]
    fn progress_counts_advances() {
        let progress = StderrProgress::new();
        progress.start(250);
        for _ in 0..150 {
            progress.advance();
        }
        progress.finish();
        assert_eq!(progress.line(), "[150/250] Processing...");
    }
}
