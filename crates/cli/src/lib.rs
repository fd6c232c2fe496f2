// crates/cli/src/lib.rs
pub mod args;
pub mod config;
pub mod error;
pub mod logging;
pub mod presentation;
pub mod settings;

use std::path::PathBuf;

use args::Args;
use error::Result;
use head_scan_engine::{ProgressSink, RunReport};
use presentation::StderrProgress;
use settings::Settings;

pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[derive(Debug)]
pub enum Outcome {
    /// No settings file existed; a template was written there.
    TemplateWritten(PathBuf),
    Completed(RunReport),
}

/// Loads settings, merges arguments and writes one report.
///
/// # Errors
/// Fails on invalid settings or encodings, or when the report cannot be written.
pub fn run(args: &Args) -> Result<Outcome> {
    let settings_path = settings::locate(args.settings.as_deref())?;
    let settings = match Settings::load(&settings_path)? {
        Some(settings) => settings,
        None if args.roots.is_empty() => {
            settings::write_template(&settings_path)?;
            return Ok(Outcome::TemplateWritten(settings_path));
        }
        None => Settings::default(),
    };

    let plan = config::build_plan(args, &settings, &settings::base_dir(&settings_path))?;
    for root in &plan.config.roots {
        log::info!(
            "root {} (lines per file: {}, files per folder: {:?})",
            root.path.display(),
            root.lines_per_file,
            root.max_files_per_folder
        );
    }

    let progress = StderrProgress::new();
    let sink: Option<&dyn ProgressSink> = plan.show_progress.then_some(&progress as &dyn ProgressSink);
    let report = head_scan_engine::run_to_dir(&plan.config, &plan.output_dir, sink)?;
    Ok(Outcome::Completed(report))
}
