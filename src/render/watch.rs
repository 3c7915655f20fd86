//! File watching for the preview server.
//!
//! Uses `notify-debouncer-full` to watch the preview template, its data,
//! the records file and the config file.

use std::path::{Path, PathBuf};
use std::sync::mpsc::{self, Receiver};
use std::time::Duration;

use notify::event::ModifyKind;
use notify::{
    Config as NotifyConfig, EventKind, PollWatcher, RecommendedWatcher, RecursiveMode, Watcher,
};
use notify_debouncer_full::{
    DebounceEventResult, Debouncer, RecommendedCache, new_debouncer, new_debouncer_opt,
};

use crate::config::WatchConfig;

// =============================================================================
// Errors
// =============================================================================

#[derive(thiserror::Error, Debug)]
pub enum WatchError {
    #[error("notify error: {0}")]
    Notify(#[from] notify::Error),
}

// =============================================================================
// Watch events
// =============================================================================

/// Which preview input changed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeKind {
    Template,
    Data,
    Records,
    Config,
}

/// Events sent from the file watcher.
#[derive(Debug)]
pub enum WatchEvent {
    /// Inputs changed, the preview should reload.
    FilesChanged(Vec<ChangeKind>),
    /// Watcher error occurred.
    Error(String),
}

// =============================================================================
// Path classification
// =============================================================================

/// Files to watch for changes.
#[derive(Debug, Clone)]
pub struct WatchPaths {
    pub template: PathBuf,
    pub data: Option<PathBuf>,
    pub records: Option<PathBuf>,
    pub config: PathBuf,
}

impl WatchPaths {
    fn entries(&self) -> Vec<(ChangeKind, &Path)> {
        let mut entries = vec![
            (ChangeKind::Template, self.template.as_path()),
            (ChangeKind::Config, self.config.as_path()),
        ];
        if let Some(data) = &self.data {
            entries.push((ChangeKind::Data, data.as_path()));
        }
        if let Some(records) = &self.records {
            entries.push((ChangeKind::Records, records.as_path()));
        }
        entries
    }
}

/// Classifies file paths into change types.
#[derive(Debug, Clone)]
pub struct PathClassifier {
    files: Vec<(ChangeKind, PathBuf)>,
}

impl PathClassifier {
    pub fn new(paths: &WatchPaths) -> Self {
        let files = paths
            .entries()
            .into_iter()
            .map(|(kind, path)| (kind, normalize(path)))
            .collect();
        Self { files }
    }

    /// Classify a changed path into a ChangeKind.
    pub fn classify(&self, path: &Path) -> Option<ChangeKind> {
        let path = normalize(path);
        self.files
            .iter()
            .find(|(_, file)| *file == path)
            .map(|(kind, _)| *kind)
    }
}

/// Absolute path with the parent directory resolved, so that event paths
/// and configured paths compare equal even when the file itself is gone.
fn normalize(path: &Path) -> PathBuf {
    let absolute = std::path::absolute(path).unwrap_or_else(|_| path.to_path_buf());
    let resolved = match (absolute.parent(), absolute.file_name()) {
        (Some(parent), Some(name)) => std::fs::canonicalize(parent)
            .ok()
            .map(|parent| parent.join(name)),
        _ => None,
    };
    resolved.unwrap_or(absolute)
}

// =============================================================================
// File watcher
// =============================================================================

/// A file watcher that can use either native or polling backend.
pub enum FileWatcher {
    /// Native file system watcher (recommended for local development).
    Native {
        _debouncer: Debouncer<RecommendedWatcher, RecommendedCache>,
        rx: Receiver<WatchEvent>,
    },
    /// Polling-based watcher (for network filesystems, Docker, etc.).
    Polling {
        _debouncer: Debouncer<PollWatcher, RecommendedCache>,
        rx: Receiver<WatchEvent>,
    },
}

impl FileWatcher {
    /// Create a new file watcher.
    pub fn new(config: &WatchConfig, paths: &WatchPaths) -> Result<Self, WatchError> {
        let debounce_timeout = Duration::from_millis(config.debounce_ms);
        let classifier = PathClassifier::new(paths);

        let (tx, rx) = mpsc::channel();

        let callback = move |result: DebounceEventResult| match result {
            Ok(events) => {
                let mut changes: Vec<ChangeKind> = events
                    .iter()
                    .filter(|event| is_relevant_event(&event.kind))
                    .flat_map(|event| event.paths.iter())
                    .filter_map(|p| classifier.classify(p))
                    .collect();
                changes.dedup();

                if !changes.is_empty() {
                    let _ = tx.send(WatchEvent::FilesChanged(changes));
                }
            }
            Err(errors) => {
                for e in errors {
                    let _ = tx.send(WatchEvent::Error(e.to_string()));
                }
            }
        };

        if config.poll {
            let poll_interval = Duration::from_millis(config.poll_interval_ms);
            let notify_config = NotifyConfig::default().with_poll_interval(poll_interval);

            let mut debouncer = new_debouncer_opt::<_, PollWatcher, RecommendedCache>(
                debounce_timeout,
                None,
                callback,
                RecommendedCache::default(),
                notify_config,
            )?;

            add_watch_paths_to_debouncer(&mut debouncer, paths)?;

            Ok(FileWatcher::Polling {
                _debouncer: debouncer,
                rx,
            })
        } else {
            let mut debouncer = new_debouncer(debounce_timeout, None, callback)?;

            add_watch_paths_to_debouncer(&mut debouncer, paths)?;

            Ok(FileWatcher::Native {
                _debouncer: debouncer,
                rx,
            })
        }
    }

    /// Receive the next watch event (blocking).
    pub fn recv(&self) -> Option<WatchEvent> {
        match self {
            FileWatcher::Native { rx, .. } => rx.recv().ok(),
            FileWatcher::Polling { rx, .. } => rx.recv().ok(),
        }
    }
}

/// Watch the directory of every file.
///
/// Editors often save by replacing the file, which a watch on the file
/// itself would miss.
fn add_watch_paths_to_debouncer<W: Watcher, C: notify_debouncer_full::FileIdCache>(
    debouncer: &mut Debouncer<W, C>,
    paths: &WatchPaths,
) -> Result<(), WatchError> {
    let mut dirs: Vec<PathBuf> = Vec::new();
    for (_, file) in paths.entries() {
        let dir = normalize(file)
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from("."));
        if !dirs.contains(&dir) {
            dirs.push(dir);
        }
    }

    for dir in dirs {
        if dir.exists() {
            tracing::debug!(dir = %dir.display(), "watching");
            debouncer.watch(&dir, RecursiveMode::NonRecursive)?;
        }
    }

    Ok(())
}

/// Check if an event kind is relevant for a reload.
fn is_relevant_event(kind: &EventKind) -> bool {
    matches!(
        kind,
        EventKind::Create(_)
            | EventKind::Remove(_)
            | EventKind::Modify(ModifyKind::Data(_))
            | EventKind::Modify(ModifyKind::Name(_))
            | EventKind::Modify(ModifyKind::Any)
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use notify::event::{CreateKind, DataChange, MetadataKind};

    #[test]
    fn test_classify_watched_files() {
        let dir = tempfile::tempdir().unwrap();
        let template = dir.path().join("template.yaml");
        let data = dir.path().join("variables.json");
        std::fs::write(&template, "content: x").unwrap();

        let paths = WatchPaths {
            template: template.clone(),
            data: Some(data.clone()),
            records: None,
            config: dir.path().join("formadoc.yaml"),
        };
        let classifier = PathClassifier::new(&paths);

        assert_eq!(classifier.classify(&template), Some(ChangeKind::Template));
        // Not created yet, still recognised
        assert_eq!(classifier.classify(&data), Some(ChangeKind::Data));
        assert_eq!(
            classifier.classify(&dir.path().join("formadoc.yaml")),
            Some(ChangeKind::Config)
        );
        assert_eq!(classifier.classify(&dir.path().join("other.json")), None);
    }

    #[test]
    fn test_relevant_events() {
        assert!(is_relevant_event(&EventKind::Create(CreateKind::File)));
        assert!(is_relevant_event(&EventKind::Modify(ModifyKind::Data(
            DataChange::Content
        ))));
        assert!(!is_relevant_event(&EventKind::Modify(ModifyKind::Metadata(
            MetadataKind::AccessTime
        ))));
    }
}
