// crates/cli/src/settings.rs
//! The YAML settings file: schema, loading, first-run template.

use head_scan_engine::config::{DEFAULT_LINES_PER_FILE, FolderCap, RootSpec};
use serde::Deserialize;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use crate::error::{AppError, Result};

pub const SETTINGS_FILE_NAME: &str = "head_scan.yaml";

pub const TEMPLATE: &str = r#"# head_scan settings
#
# Every root is scanned recursively. In each folder the newest csv/xls/xlsx
# files are picked and their first lines are written to one report.
roots:
  - path: ""                  # e.g. ~/exports or ${DATA_DIR}/exports
    max_files_per_folder: 100 # 0 or less: no limit
    lines_per_file: 5
sort_by: modified             # modified | created | accessed
descending: true              # false picks the oldest files
legacy_encoding: windows-1251 # tried for text that is not UTF-8
output_encoding: windows-1251 # encoding of the report
output_dir: null              # default: the folder of this file
"#;

#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Settings {
    pub roots: Vec<RootEntry>,
    pub sort_by: Option<String>,
    pub descending: Option<bool>,
    pub legacy_encoding: Option<String>,
    pub output_encoding: Option<String>,
    pub output_dir: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RootEntry {
    #[serde(default)]
    pub path: Option<String>,
    #[serde(default)]
    pub max_files_per_folder: Option<NumberCell>,
    #[serde(default)]
    pub lines_per_file: Option<NumberCell>,
}

/// Numeric cell written as an integer, a float or a string.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum NumberCell {
    Int(i64),
    Float(f64),
    Text(String),
}

impl NumberCell {
    /// Floats are truncated toward zero.
    #[must_use]
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Self::Int(n) => Some(*n),
            Self::Float(f) => truncate(*f),
            Self::Text(s) => {
                let s = s.trim();
                s.parse::<i64>()
                    .ok()
                    .or_else(|| s.parse::<f64>().ok().and_then(truncate))
            }
        }
    }
}

#[allow(clippy::cast_possible_truncation)]
fn truncate(value: f64) -> Option<i64> {
    value.is_finite().then(|| value.trunc() as i64)
}

impl Settings {
    /// Reads `path`; `Ok(None)` when the file does not exist.
    ///
    /// # Errors
    /// Fails when the file cannot be read or is not valid settings YAML.
    pub fn load(path: &Path) -> Result<Option<Self>> {
        let text = match fs::read_to_string(path) {
            Ok(text) => text,
            Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(err) => return Err(err.into()),
        };
        Self::parse(&text, path).map(Some)
    }

    fn parse(text: &str, path: &Path) -> Result<Self> {
        if text.trim().is_empty() {
            return Ok(Self::default());
        }
        serde_yaml::from_str(text).map_err(|source| AppError::Settings {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Configured roots with `~` and environment variables expanded.
    ///
    /// Blank paths are dropped. Unusable numbers fall back to the defaults.
    #[must_use]
    pub fn root_specs(&self) -> Vec<RootSpec> {
        self.roots.iter().filter_map(RootEntry::to_spec).collect()
    }
}

impl RootEntry {
    fn to_spec(&self) -> Option<RootSpec> {
        let raw = self.path.as_deref().map(str::trim).unwrap_or_default();
        if raw.is_empty() {
            log::debug!("ignoring root entry without a path");
            return None;
        }
        let path = expand_path(raw);

        let cap = match &self.max_files_per_folder {
            None => FolderCap::default(),
            Some(cell) => cell.as_i64().map_or_else(
                || {
                    log::warn!("{raw}: max_files_per_folder {cell:?} is not a number, using the default");
                    FolderCap::default()
                },
                FolderCap::from_count,
            ),
        };

        let lines = match &self.lines_per_file {
            None => DEFAULT_LINES_PER_FILE,
            Some(cell) => match cell.as_i64().and_then(|n| usize::try_from(n).ok()).filter(|&n| n > 0) {
                Some(n) => n,
                None => {
                    log::warn!(
                        "{raw}: lines_per_file {cell:?} is not a positive number, using {DEFAULT_LINES_PER_FILE}"
                    );
                    DEFAULT_LINES_PER_FILE
                }
            },
        };

        Some(RootSpec::new(path, cap, lines))
    }
}

/// `--settings`, or `head_scan.yaml` next to the executable.
///
/// # Errors
/// Fails when the executable's location cannot be determined.
pub fn locate(explicit: Option<&Path>) -> Result<PathBuf> {
    if let Some(path) = explicit {
        return Ok(path.to_path_buf());
    }
    let exe = std::env::current_exe()?;
    let dir = exe.parent().map_or_else(|| PathBuf::from("."), Path::to_path_buf);
    Ok(dir.join(SETTINGS_FILE_NAME))
}

/// Directory relative settings are resolved against.
#[must_use]
pub fn base_dir(settings_path: &Path) -> PathBuf {
    settings_path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .map_or_else(|| PathBuf::from("."), Path::to_path_buf)
}

/// Writes [`TEMPLATE`] to `path`, creating parent directories.
///
/// # Errors
/// Fails when the file cannot be written.
pub fn write_template(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }
    fs::write(path, TEMPLATE)?;
    Ok(())
}

/// Expands a leading `~` and `$VAR` / `${VAR}` references.
#[must_use]
pub fn expand_path(raw: &str) -> PathBuf {
    let home = dirs::home_dir();
    expand_with(raw, home.as_deref(), |name| std::env::var(name).ok())
}

fn expand_with(raw: &str, home: Option<&Path>, lookup: impl Fn(&str) -> Option<String>) -> PathBuf {
    let expanded = expand_vars(raw, lookup);
    if let Some(home) = home {
        if expanded == "~" {
            return home.to_path_buf();
        }
        if let Some(rest) = expanded.strip_prefix("~/").or_else(|| expanded.strip_prefix("~\\")) {
            return home.join(rest);
        }
    }
    PathBuf::from(expanded)
}

/// Unknown variables are left as written.
fn expand_vars(raw: &str, lookup: impl Fn(&str) -> Option<String>) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut rest = raw;
    while let Some(pos) = rest.find('$') {
        out.push_str(&rest[..pos]);
        let after = &rest[pos + 1..];
        let (name, tail) = if let Some(braced) = after.strip_prefix('{') {
            match braced.find('}') {
                Some(end) => (&braced[..end], &braced[end + 1..]),
                None => {
                    out.push('$');
                    rest = after;
                    continue;
                }
            }
        } else {
            let end = after
                .find(|c: char| !(c.is_ascii_alphanumeric() || c == '_'))
                .unwrap_or(after.len());
            (&after[..end], &after[end..])
        };
        match (!name.is_empty()).then(|| lookup(name)).flatten() {
            Some(value) => out.push_str(&value),
            None => out.push_str(&rest[pos..rest.len() - tail.len()]),
        }
        rest = tail;
    }
    out.push_str(rest);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn env(name: &str) -> Option<String> {
        match name {
            "DATA" => Some("/srv/data".to_string()),
            "USER_DIR" => Some("reports".to_string()),
            _ => None,
        }
    }

    fn parse(text: &str) -> Settings {
        Settings::parse(text, Path::new("head_scan.yaml")).unwrap()
    }

    #[test]
    fn template_parses_to_no_usable_roots() {
        let settings = parse(TEMPLATE);
        assert_eq!(settings.roots.len(), 1);
        assert!(settings.root_specs().is_empty());
        assert_eq!(settings.sort_by.as_deref(), Some("modified"));
        assert_eq!(settings.output_dir, None);
    }

    #[test]
    fn numeric_cells_accept_ints_floats_and_strings() {
        let settings = parse(
            "roots:\n  - path: /a\n    max_files_per_folder: 3.9\n    lines_per_file: \"7\"\n  - path: /b\n    max_files_per_folder: 0\n    lines_per_file: 2\n",
        );
        let specs = settings.root_specs();
        assert_eq!(specs[0], RootSpec::new("/a", FolderCap::Limited(3), 7));
        assert_eq!(specs[1], RootSpec::new("/b", FolderCap::Unbounded, 2));
    }

    #[test]
    fn bad_numbers_fall_back_to_defaults() {
        let settings = parse(
            "roots:\n  - path: /a\n    max_files_per_folder: lots\n    lines_per_file: -2\n  - path: \"  \"\n",
        );
        assert_eq!(settings.root_specs(), vec![RootSpec::with_defaults("/a")]);
    }

    #[test]
    fn empty_file_is_default_settings() {
        assert!(parse("  \n").roots.is_empty());
    }

    #[test]
    fn unknown_keys_are_rejected() {
        let err = Settings::parse("rootz: []\n", Path::new("s.yaml")).unwrap_err();
        assert!(matches!(err, AppError::Settings { .. }));
    }

    #[test]
    fn missing_file_loads_as_none() {
        let dir = tempfile::tempdir().unwrap();
        assert!(Settings::load(&dir.path().join("absent.yaml")).unwrap().is_none());
    }

    #[test]
    fn written_template_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join(SETTINGS_FILE_NAME);
        write_template(&path).unwrap();
        assert!(Settings::load(&path).unwrap().is_some());
    }

    #[test]
    fn expands_variables_and_home() {
        let home = Path::new("/home/me");
        assert_eq!(expand_with("$DATA/x", Some(home), env), PathBuf::from("/srv/data/x"));
        assert_eq!(expand_with("${DATA}_old", Some(home), env), PathBuf::from("/srv/data_old"));
        assert_eq!(expand_with("~/${USER_DIR}", Some(home), env), PathBuf::from("/home/me/reports"));
        assert_eq!(expand_with("~", Some(home), env), PathBuf::from("/home/me"));
    }

    #[test]
    fn unknown_or_malformed_references_stay_verbatim() {
        assert_eq!(expand_vars("$NOPE/a", env), "$NOPE/a");
        assert_eq!(expand_vars("${NOPE}", env), "${NOPE}");
        assert_eq!(expand_vars("cost $5 ${open", env), "cost $5 ${open");
        assert_eq!(expand_vars("a$", env), "a$");
    }

    #[test]
    fn base_dir_of_bare_file_name_is_current_dir() {
        assert_eq!(base_dir(Path::new("head_scan.yaml")), PathBuf::from("."));
        assert_eq!(base_dir(Path::new("/etc/head_scan.yaml")), PathBuf::from("/etc"));
    }
}
