use std::cmp::Ordering;
use std::fs::{self, Metadata};
use std::io;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use crate::config::{FolderCap, SelectionPolicy, TimestampKey};

/// A rankable file inside one directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileCandidate {
    pub path: PathBuf,
    pub key: SystemTime,
}

/// Picks the top files of a single directory (not recursive).
#[derive(Debug, Clone)]
pub struct FolderSelector {
    policy: SelectionPolicy,
}

impl FolderSelector {
    #[must_use]
    pub fn new(policy: SelectionPolicy) -> Self {
        Self { policy }
    }

    #[must_use]
    pub fn policy(&self) -> &SelectionPolicy {
        &self.policy
    }

    /// Case-insensitive extension check against the allowed set.
    #[must_use]
    pub fn is_allowed(&self, path: &Path) -> bool {
        path.extension()
            .and_then(|s| s.to_str())
            .is_some_and(|ext| self.policy.extensions.iter().any(|e| e.eq_ignore_ascii_case(ext)))
    }

    /// Allowed regular files directly inside `dir`, with their ranking key.
    ///
    /// Entries whose metadata or timestamp cannot be read are left out.
    ///
    /// # Errors
    /// Returns an error when `dir` itself cannot be listed.
    pub fn candidates(&self, dir: &Path) -> io::Result<Vec<FileCandidate>> {
        let mut out = Vec::new();
        for entry in fs::read_dir(dir)? {
            let Ok(entry) = entry else { continue };
            let path = entry.path();
            if !self.is_allowed(&path) {
                continue;
            }
            // Follows symlinks, so linked files rank by their target.
            let meta = match fs::metadata(&path) {
                Ok(meta) => meta,
                Err(err) => {
                    log::debug!("cannot stat {}: {err}", path.display());
                    continue;
                }
            };
            if !meta.is_file() {
                continue;
            }
            match timestamp(&meta, self.policy.timestamp) {
                Ok(key) => out.push(FileCandidate { path, key }),
                Err(err) => log::debug!("no usable timestamp for {}: {err}", path.display()),
            }
        }
        Ok(out)
    }

    /// Orders by key (newest first unless ascending) and keeps at most `cap` entries.
    ///
    /// Equal keys are ordered by file name so that runs are reproducible.
    #[must_use]
    pub fn rank(&self, mut candidates: Vec<FileCandidate>, cap: FolderCap) -> Vec<FileCandidate> {
        let descending = self.policy.descending;
        candidates.sort_by(|a, b| {
            let by_key = if descending { b.key.cmp(&a.key) } else { a.key.cmp(&b.key) };
            match by_key {
                Ordering::Equal => a.path.file_name().cmp(&b.path.file_name()),
                other => other,
            }
        });
        if let Some(limit) = cap.limit() {
            candidates.truncate(limit);
        }
        candidates
    }

    /// [`Self::candidates`] followed by [`Self::rank`].
    ///
    /// # Errors
    /// Returns an error when `dir` cannot be listed.
    pub fn select_in(&self, dir: &Path, cap: FolderCap) -> io::Result<Vec<FileCandidate>> {
        Ok(self.rank(self.candidates(dir)?, cap))
    }
}

fn timestamp(meta: &Metadata, key: TimestampKey) -> io::Result<SystemTime> {
    match key {
        TimestampKey::Modified => meta.modified(),
        TimestampKey::Created => meta.created(),
        TimestampKey::Accessed => meta.accessed(),
    }
}
