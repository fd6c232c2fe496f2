use ignore::{Walk, WalkBuilder};
use std::collections::VecDeque;
use std::path::PathBuf;

use crate::config::RootSpec;
use crate::selector::FolderSelector;

/// A selected file and the line cap of the root it was found under.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanItem {
    pub path: PathBuf,
    pub lines_per_file: usize,
}

/// Lazily walks every root and yields the per-directory selections.
///
/// Directories are visited depth-first, top-down, in file-name order. Only
/// the current directory's selection is held in memory.
pub struct TreeWalker<'a> {
    roots: std::slice::Iter<'a, RootSpec>,
    selector: &'a FolderSelector,
    current: Option<(Walk, &'a RootSpec)>,
    pending: VecDeque<ScanItem>,
}

impl<'a> TreeWalker<'a> {
    pub fn new(roots: &'a [RootSpec], selector: &'a FolderSelector) -> Self {
        Self {
            roots: roots.iter(),
            selector,
            current: None,
            pending: VecDeque::new(),
        }
    }

    fn walk_root(root: &RootSpec) -> Walk {
        WalkBuilder::new(&root.path)
            // Hidden entries and ignore files are not special here.
            .standard_filters(false)
            .follow_links(false)
            .sort_by_file_name(|a, b| a.cmp(b))
            .build()
    }

    fn select_directory(&mut self, dir: PathBuf, root: &RootSpec) {
        match self.selector.select_in(&dir, root.max_files_per_folder) {
            Ok(selected) => self.pending.extend(selected.into_iter().map(|c| ScanItem {
                path: c.path,
                lines_per_file: root.lines_per_file,
            })),
            Err(err) => log::debug!("skipping unreadable directory {}: {err}", dir.display()),
        }
    }
}

impl<'a> Iterator for TreeWalker<'a> {
    type Item = ScanItem;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some(item) = self.pending.pop_front() {
                return Some(item);
            }

            let Some((walk, root)) = self.current.as_mut() else {
                let root = self.roots.next()?;
                // The root itself is selected by path, so a symlinked root still counts.
                self.select_directory(root.path.clone(), root);
                self.current = Some((Self::walk_root(root), root));
                continue;
            };
            let root: &'a RootSpec = *root;

            match walk.next() {
                Some(Ok(entry)) => {
                    if entry.depth() > 0 && entry.file_type().is_some_and(|ft| ft.is_dir()) {
                        let dir = entry.into_path();
                        self.select_directory(dir, root);
                    }
                }
                Some(Err(err)) => log::debug!("walk error under {}: {err}", root.path.display()),
                None => self.current = None,
            }
        }
    }
}
