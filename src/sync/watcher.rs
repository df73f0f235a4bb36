//! Debounced filesystem watcher feeding the sync service's event queue

use crate::error::SyncError;
use crate::types::{ChangeKind, FileChangeEvent};
use chrono::Utc;
use notify::{RecommendedWatcher, RecursiveMode, Watcher};
use notify_debouncer_mini::{new_debouncer, DebounceEventResult, Debouncer};
use std::collections::HashSet;
use std::path::Path;
use std::time::Duration;
use tokio::sync::mpsc;

/// Watches the docs root recursively and emits `FileChangeEvent`s for
/// recognized document extensions into a bounded channel
///
/// The underlying watcher thread is owned by the debouncer; dropping the
/// `DocWatcher` stops it.
pub struct DocWatcher {
    _debouncer: Debouncer<RecommendedWatcher>,
}

impl std::fmt::Debug for DocWatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DocWatcher").finish_non_exhaustive()
    }
}

impl DocWatcher {
    /// Start watching `root`, sending events to `tx`
    pub fn spawn(
        root: &Path,
        debounce: Duration,
        extensions: Vec<String>,
        tx: mpsc::Sender<FileChangeEvent>,
    ) -> Result<Self, SyncError> {
        if !root.exists() {
            return Err(SyncError::RootNotFound(root.display().to_string()));
        }

        let mut debouncer = new_debouncer(debounce, move |result: DebounceEventResult| {
            match result {
                Ok(events) => {
                    // Last event per path wins within one debounce window
                    let mut seen = HashSet::new();
                    for event in events.into_iter().rev() {
                        let path = event.path;
                        if !relevant_path(&path, &extensions) {
                            continue;
                        }
                        if !seen.insert(path.clone()) {
                            continue;
                        }

                        // The debouncer does not distinguish create from
                        // modify; existence decides between update and delete
                        let kind = if path.exists() {
                            ChangeKind::Modified
                        } else {
                            ChangeKind::Deleted
                        };

                        let change = FileChangeEvent {
                            path,
                            kind,
                            timestamp: Utc::now(),
                        };

                        if tx.blocking_send(change).is_err() {
                            tracing::debug!("Change queue closed, dropping event");
                            return;
                        }
                    }
                }
                Err(e) => tracing::warn!("File watcher error: {}", e),
            }
        })
        .map_err(|e| SyncError::WatcherFailed(e.to_string()))?;

        debouncer
            .watcher()
            .watch(root, RecursiveMode::Recursive)
            .map_err(|e| SyncError::WatcherFailed(e.to_string()))?;

        tracing::info!(
            "Watching {} for changes (debounce {:?})",
            root.display(),
            debounce
        );

        Ok(Self {
            _debouncer: debouncer,
        })
    }
}

/// Whether a changed path is a recognized, non-hidden document
fn relevant_path(path: &Path, extensions: &[String]) -> bool {
    if let Some(name) = path.file_name().and_then(|n| n.to_str())
        && name.starts_with('.')
    {
        return false;
    }

    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| {
            let ext = ext.to_ascii_lowercase();
            extensions.iter().any(|e| e == &ext)
        })
        .unwrap_or(false)
}
