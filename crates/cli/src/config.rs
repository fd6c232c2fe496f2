// crates/cli/src/config.rs
use crate::args::Args;
use crate::error::{AppError, Result};
use crate::settings::{self, Settings};
use head_scan_engine::config::DEFAULT_LINES_PER_FILE;
use head_scan_engine::{
    ExtractOptionsBuilder, FolderCap, RootSpec, ScanConfig, ScanConfigBuilder,
    SelectionPolicyBuilder, TimestampKey, encoding_for_label, resolve_roots,
};
use std::path::{Path, PathBuf};

/// Everything needed for one run after merging arguments and settings.
#[derive(Debug, Clone)]
pub struct RunPlan {
    pub config: ScanConfig,
    pub output_dir: PathBuf,
    pub show_progress: bool,
}

/// Command-line values win over settings; `base_dir` is the settings file's directory.
///
/// # Errors
/// Fails on unknown encoding labels or timestamp keys.
pub fn build_plan(args: &Args, settings: &Settings, base_dir: &Path) -> Result<RunPlan> {
    let configured = if args.roots.is_empty() {
        settings.root_specs()
    } else {
        args.roots
            .iter()
            .map(|path| RootSpec::with_defaults(path.clone()))
            .collect()
    };
    let roots = resolve_roots(apply_overrides(configured, args), base_dir);

    let timestamp = match (args.sort_by, settings.sort_by.as_deref()) {
        (Some(arg), _) => TimestampKey::from(arg),
        (None, Some(label)) => label.parse().map_err(|message| AppError::InvalidValue {
            field: "sort_by",
            message,
        })?,
        (None, None) => TimestampKey::default(),
    };
    let descending = !args.ascending && settings.descending.unwrap_or(true);

    let selection = SelectionPolicyBuilder::default()
        .timestamp(timestamp)
        .descending(descending)
        .build()
        .map_err(|err| AppError::InvalidValue {
            field: "selection",
            message: err.to_string(),
        })?;

    let mut extract = ExtractOptionsBuilder::default();
    if let Some(label) = args.legacy_encoding.as_deref().or(settings.legacy_encoding.as_deref()) {
        extract.legacy_encoding(encoding_for_label(label)?);
    }
    let extract = extract.build().map_err(|err| AppError::InvalidValue {
        field: "legacy_encoding",
        message: err.to_string(),
    })?;

    let mut builder = ScanConfigBuilder::default();
    builder.roots(roots).selection(selection).extract(extract);
    if let Some(label) = args.output_encoding.as_deref().or(settings.output_encoding.as_deref()) {
        builder.output_encoding(encoding_for_label(label)?);
    }
    let config = builder.build().map_err(head_scan_engine::EngineError::from)?;

    let output_dir = match (&args.output_dir, settings.output_dir.as_deref().map(str::trim)) {
        (Some(dir), _) => dir.clone(),
        (None, Some(dir)) if !dir.is_empty() => base_dir.join(settings::expand_path(dir)),
        _ => base_dir.to_path_buf(),
    };

    Ok(RunPlan {
        config,
        output_dir,
        show_progress: !args.no_progress,
    })
}

fn apply_overrides(roots: Vec<RootSpec>, args: &Args) -> Vec<RootSpec> {
    let cap = args.max_files.map(FolderCap::from_count);
    let lines = args
        .lines
        .map(|n| usize::try_from(n).unwrap_or(DEFAULT_LINES_PER_FILE));
    roots
        .into_iter()
        .map(|root| {
            RootSpec::new(
                root.path,
                cap.unwrap_or(root.max_files_per_folder),
                lines.unwrap_or(root.lines_per_file),
            )
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    fn args(argv: &[&str]) -> Args {
        Args::try_parse_from(std::iter::once("head_scan").chain(argv.iter().copied())).unwrap()
    }

    fn settings(yaml: &str) -> Settings {
        serde_yaml::from_str(yaml).unwrap()
    }

    #[test]
    fn positional_roots_replace_settings_roots() {
        let a = tempfile::tempdir().unwrap();
        let b = tempfile::tempdir().unwrap();
        let yaml = format!("roots:\n  - path: {}\n    lines_per_file: 9\n", b.path().display());
        let plan = build_plan(
            &args(&[a.path().to_str().unwrap(), "--lines", "2", "--max-files", "0"]),
            &settings(&yaml),
            Path::new("/unused"),
        )
        .unwrap();
        assert_eq!(plan.config.roots, vec![RootSpec::new(a.path(), FolderCap::Unbounded, 2)]);
    }

    #[test]
    fn settings_supply_roots_sorting_and_encodings() {
        let root = tempfile::tempdir().unwrap();
        let yaml = format!(
            "roots:\n  - path: {}\n    max_files_per_folder: 3\nsort_by: accessed\ndescending: false\noutput_encoding: utf-8\nlegacy_encoding: cp1252\n",
            root.path().display()
        );
        let plan = build_plan(&args(&["--no-progress"]), &settings(&yaml), Path::new("/base")).unwrap();

        assert_eq!(plan.config.roots[0].max_files_per_folder, FolderCap::Limited(3));
        assert_eq!(plan.config.selection.timestamp, TimestampKey::Accessed);
        assert!(!plan.config.selection.descending);
        assert_eq!(plan.config.output_encoding, encoding_rs::UTF_8);
        assert_eq!(plan.config.extract.legacy_encoding, encoding_rs::WINDOWS_1252);
        assert_eq!(plan.output_dir, PathBuf::from("/base"));
        assert!(!plan.show_progress);
    }

    #[test]
    fn missing_roots_fall_back_to_base_dir() {
        let base = tempfile::tempdir().unwrap();
        let plan = build_plan(&args(&[]), &Settings::default(), base.path()).unwrap();
        assert_eq!(plan.config.roots, vec![RootSpec::with_defaults(base.path())]);
        assert_eq!(plan.config.output_encoding, encoding_rs::WINDOWS_1251);
    }

    #[test]
    fn relative_output_dir_is_resolved_against_base() {
        let base = tempfile::tempdir().unwrap();
        let plan = build_plan(&args(&[]), &settings("output_dir: reports\n"), base.path()).unwrap();
        assert_eq!(plan.output_dir, base.path().join("reports"));
    }

    #[test]
    fn unknown_encoding_is_an_error() {
        let base = tempfile::tempdir().unwrap();
        let err = build_plan(&args(&["--output-encoding", "klingon"]), &Settings::default(), base.path())
            .unwrap_err();
        assert!(err.to_string().contains("klingon"), "{err}");
    }

    #[test]
    fn unknown_sort_key_is_an_error() {
        let base = tempfile::tempdir().unwrap();
        let err = build_plan(&args(&[]), &settings("sort_by: size\n"), base.path()).unwrap_err();
        assert!(matches!(err, AppError::InvalidValue { field: "sort_by", .. }));
    }
}
