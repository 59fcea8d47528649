use std::path::{Path, PathBuf};

use glob::{Pattern, glob};
use log::{error, info, warn};
use notewell_common::Document;

use crate::ledger::{Ledger, PendingUpdates, path_key};
use crate::loader::DocumentLoader;

/// Extension allow-list; matching ignores case and a leading dot.
#[derive(Debug, Clone)]
pub struct ExtensionFilter {
    extensions: Vec<String>,
}

impl ExtensionFilter {
    pub fn new<I, S>(extensions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            extensions: extensions
                .into_iter()
                .map(|e| e.as_ref().trim_start_matches('.').to_ascii_lowercase())
                .collect(),
        }
    }

    pub fn markdown() -> Self {
        Self::new(["md"])
    }

    pub fn accepts(&self, path: &Path) -> bool {
        path.extension()
            .and_then(|e| e.to_str())
            .is_some_and(|ext| self.extensions.iter().any(|e| e.eq_ignore_ascii_case(ext)))
    }
}

#[derive(Debug)]
pub struct ScanFailure {
    pub path: PathBuf,
    pub reason: String,
}

/// Result of one pass over the source tree.
///
/// `pending` must only be merged into the ledger once `documents` have been
/// indexed.
#[derive(Debug, Default)]
pub struct ScanOutcome {
    pub documents: Vec<Document>,
    pub pending: PendingUpdates,
    pub failures: Vec<ScanFailure>,
    pub files_seen: usize,
}

pub struct DocumentScanner<L> {
    loader: L,
    filter: ExtensionFilter,
}

impl<L: DocumentLoader> DocumentScanner<L> {
    pub fn new(loader: L, filter: ExtensionFilter) -> Self {
        Self { loader, filter }
    }

    /// Eligible files under `root`, in path order.
    pub fn eligible_files(&self, root: &Path) -> Vec<PathBuf> {
        if !root.is_dir() {
            warn!("Source directory {} does not exist", root.display());
            return Vec::new();
        }
        let root_str = root.to_string_lossy();
        let trimmed = match root_str.trim_end_matches('/') {
            "" => "/",
            r => r,
        };
        let pattern = format!("{}/**/*", Pattern::escape(trimmed));
        let paths = match glob(&pattern) {
            Ok(paths) => paths,
            Err(e) => {
                error!("Invalid scan pattern {pattern}: {e}");
                return Vec::new();
            }
        };
        let mut files: Vec<PathBuf> = paths
            .filter_map(|entry| match entry {
                Ok(path) => Some(path),
                Err(e) => {
                    warn!("Skipping unreadable entry: {e}");
                    None
                }
            })
            .filter(|path| path.is_file() && self.filter.accepts(path))
            .collect();
        files.sort();
        files
    }

    /// Loads every eligible file that is new or newer than its ledger entry.
    pub fn scan(&self, root: &Path, ledger: &Ledger) -> ScanOutcome {
        info!("Scanning directory: {}", root.display());
        let mut outcome = ScanOutcome::default();

        for path in self.eligible_files(root) {
            outcome.files_seen += 1;
            // The mtime observed now is what gets recorded, so an edit made
            // while loading still looks stale next run.
            let Some(mtime) = ledger.stale_mtime(&path) else {
                continue;
            };
            let key = path_key(&path);

            info!("Loading new/modified file: {key}");
            match self.loader.load(&path) {
                Ok(docs) => {
                    outcome.documents.extend(docs);
                    outcome.pending.insert(key, mtime);
                }
                Err(e) => {
                    error!("Failed to load file {key}: {e}");
                    outcome.failures.push(ScanFailure {
                        path,
                        reason: e.to_string(),
                    });
                }
            }
        }

        info!(
            "Scan found {} eligible file(s); {} loaded, {} failed",
            outcome.files_seen,
            outcome.pending.len(),
            outcome.failures.len()
        );
        outcome
    }
}
