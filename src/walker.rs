//! Depth-first traversal of a directory tree that feeds every archive it
//! meets into a fresh [`ClassIndex`].
//!
//! Traversal is iterative, so deep trees cannot exhaust the call stack, and
//! symlinked directory loops are detected and skipped. Per-entry failures
//! (an unreadable directory, a corrupt archive) are logged and recorded in
//! the [`ScanReport`]; only an inaccessible root aborts the walk.

use ignore::WalkBuilder;
use rayon::prelude::*;
use serde::Serialize;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Instant;
use tracing::{debug, info, warn};

use crate::archive::read_class_names;
use crate::config::ScanConfig;
use crate::error::{Result, ScanError};
use crate::filter::{EntryKind, PathFilter};
use crate::index::ClassIndex;

/// Cooperative cancellation flag shared between a scan and whoever started it.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ArchiveFailure {
    pub path: String,
    pub error: String,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct ScanReport {
    pub root: String,
    pub archives_read: usize,
    pub archives_failed: Vec<ArchiveFailure>,
    pub entries_skipped: usize,
    pub classes_indexed: usize,
    pub duration_ms: u64,
}

/// Resolves `root` to an absolute directory that can be listed.
pub fn open_root(root: &Path) -> Result<PathBuf> {
    let absolute = std::path::absolute(root).map_err(|e| ScanError::root(root, e))?;
    let meta = std::fs::metadata(&absolute).map_err(|e| ScanError::root(&absolute, e))?;
    if !meta.is_dir() {
        return Err(ScanError::root(
            &absolute,
            io::Error::new(io::ErrorKind::NotADirectory, "not a directory"),
        ));
    }
    std::fs::read_dir(&absolute).map_err(|e| ScanError::root(&absolute, e))?;
    Ok(absolute)
}

pub struct TreeWalker {
    config: ScanConfig,
    filter: PathFilter,
}

impl TreeWalker {
    pub fn new(config: ScanConfig) -> Self {
        let filter = config.path_filter();
        Self { config, filter }
    }

    /// Builds the index for everything under `root`.
    ///
    /// Returns [`ScanError::Cancelled`] as soon as `cancel` is observed at a
    /// directory boundary; the partial index is dropped with it.
    pub fn walk(&self, root: &Path, cancel: &CancelToken) -> Result<(ClassIndex, ScanReport)> {
        let start = Instant::now();
        let root = open_root(root)?;
        info!(root = %root.display(), threads = self.config.threads, "Scanning for archives");

        let mut scan = ScanState {
            index: ClassIndex::new(),
            report: ScanReport {
                root: root.to_string_lossy().to_string(),
                ..ScanReport::default()
            },
        };

        let include_inner = self.config.include_inner_classes;
        let skipped = if self.config.threads <= 1 {
            self.visit(&root, cancel, |archive| {
                scan.merge(archive, read_class_names(archive, include_inner));
            })?
        } else {
            let mut archives = Vec::new();
            let skipped = self.visit(&root, cancel, |archive| archives.push(archive.to_path_buf()))?;
            let results = self.read_parallel(&archives, cancel)?;
            for (archive, result) in archives.iter().zip(results) {
                scan.merge(archive, result);
            }
            skipped
        };

        let mut report = scan.report;
        report.entries_skipped = skipped;
        report.classes_indexed = scan.index.len();
        report.duration_ms = start.elapsed().as_millis() as u64;
        info!(
            root = %report.root,
            archives = report.archives_read,
            failed = report.archives_failed.len(),
            classes = report.classes_indexed,
            duration_ms = report.duration_ms,
            "Scan finished"
        );
        Ok((scan.index, report))
    }

    /// Calls `on_archive` for every accepted archive in traversal order and
    /// returns how many entries had to be skipped because they were unreadable.
    fn visit<F>(&self, root: &Path, cancel: &CancelToken, mut on_archive: F) -> Result<usize>
    where
        F: FnMut(&Path),
    {
        let mut builder = WalkBuilder::new(root);
        builder
            .standard_filters(false)
            .follow_links(self.config.follow_links)
            .max_depth(self.config.max_depth);
        if self.config.sort_entries {
            builder.sort_by_file_name(|a, b| a.cmp(b));
        }

        let mut skipped = 0usize;
        for entry in builder.build() {
            let entry = match entry {
                Ok(entry) => entry,
                Err(err) => {
                    warn!(error = %err, "Skipping unreadable entry");
                    skipped += 1;
                    continue;
                }
            };
            let Some(file_type) = entry.file_type() else {
                continue;
            };

            match self.filter.classify(entry.path(), file_type) {
                Some(EntryKind::Directory) => {
                    if cancel.is_cancelled() {
                        info!(directory = %entry.path().display(), "Scan cancelled");
                        return Err(ScanError::Cancelled);
                    }
                }
                Some(EntryKind::Archive) => on_archive(entry.path()),
                None => {}
            }
        }
        Ok(skipped)
    }

    fn read_parallel(
        &self,
        archives: &[PathBuf],
        cancel: &CancelToken,
    ) -> Result<Vec<Result<Vec<String>>>> {
        let include_inner = self.config.include_inner_classes;
        let read = |archive: &PathBuf| {
            if cancel.is_cancelled() {
                return Err(ScanError::Cancelled);
            }
            read_class_names(archive, include_inner)
        };

        let results: Vec<Result<Vec<String>>> = match rayon::ThreadPoolBuilder::new()
            .num_threads(self.config.threads)
            .build()
        {
            Ok(pool) => pool.install(|| archives.par_iter().map(read).collect()),
            Err(err) => {
                warn!(error = %err, "Failed to build reader pool, reading sequentially");
                archives.iter().map(read).collect()
            }
        };

        if cancel.is_cancelled() {
            info!("Scan cancelled");
            return Err(ScanError::Cancelled);
        }
        Ok(results)
    }
}

struct ScanState {
    index: ClassIndex,
    report: ScanReport,
}

impl ScanState {
    fn merge(&mut self, archive: &Path, result: Result<Vec<String>>) {
        match result {
            Ok(names) => {
                let added = self.index.extend_from_archive(archive, &names);
                self.report.archives_read += 1;
                debug!(archive = %archive.display(), classes = added, "Indexed archive");
            }
            Err(err) => {
                warn!(archive = %archive.display(), error = %err.detail(), "Skipping unreadable archive");
                self.report.archives_failed.push(ArchiveFailure {
                    path: archive.to_string_lossy().to_string(),
                    error: err.detail(),
                });
            }
        }
    }
}
