//! File watching for live reload.

use std::path::{Path, PathBuf};

use notify::event::ModifyKind;
use notify::{EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc;

/// What happened to a watched path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WatchEventKind {
    /// File was created, removed or renamed
    Rename,

    /// File contents or metadata changed
    Change,
}

/// Events emitted by the source watcher.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WatchEvent {
    pub kind: WatchEventKind,
    pub path: PathBuf,
}

/// Recursive watcher over the source directory.
///
/// Events stop flowing once this is dropped.
pub struct SourceWatcher {
    _watcher: RecommendedWatcher,
}

impl SourceWatcher {
    /// Create a new watcher for `source_dir`.
    ///
    /// Returns the watcher and a channel to receive events.
    pub fn new(source_dir: &Path) -> Result<(Self, mpsc::Receiver<WatchEvent>), notify::Error> {
        let (tx, rx) = mpsc::channel(100);

        let mut watcher = notify::recommended_watcher(move |res: notify::Result<notify::Event>| {
            let event = match res {
                Ok(event) => event,
                Err(e) => {
                    tracing::warn!("Watch error: {}", e);
                    return;
                }
            };

            let Some(kind) = classify(&event.kind) else {
                return;
            };

            for path in event.paths {
                if is_temporary_file(&path) {
                    continue;
                }
                // Runs on the notify thread, outside the runtime
                if tx.blocking_send(WatchEvent { kind, path }).is_err() {
                    return;
                }
            }
        })?;

        watcher.watch(source_dir, RecursiveMode::Recursive)?;

        Ok((Self { _watcher: watcher }, rx))
    }
}

/// Classify a notify event kind.
fn classify(kind: &EventKind) -> Option<WatchEventKind> {
    match kind {
        EventKind::Create(_) | EventKind::Remove(_) => Some(WatchEventKind::Rename),
        EventKind::Modify(ModifyKind::Name(_)) => Some(WatchEventKind::Rename),
        EventKind::Modify(_) => Some(WatchEventKind::Change),
        _ => None,
    }
}

/// Editor swap, backup and atomic-save scratch files.
fn is_temporary_file(path: &Path) -> bool {
    let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
        return false;
    };

    name.ends_with('~')
        || name.ends_with(".swp")
        || name.ends_with(".swo")
        || name.ends_with(".swx")
        || (name.len() > 1 && name.starts_with('#') && name.ends_with('#'))
        || name.starts_with(".~")
        || name.ends_with(".tmp")
        || name.ends_with(".temp")
        || name.ends_with("___jb_tmp___")
        || name.ends_with("___jb_old___")
        || name.ends_with(".bak")
        || name.ends_with(".backup")
}

#[cfg(test)]
mod tests {
    use super::*;
    use notify::event::{CreateKind, DataChange, RenameMode};
    use std::fs;
    use std::time::Duration;
    use tempfile::tempdir;

    #[test]
    fn classifies_event_kinds() {
        assert_eq!(
            classify(&EventKind::Create(CreateKind::File)),
            Some(WatchEventKind::Rename)
        );
        assert_eq!(
            classify(&EventKind::Modify(ModifyKind::Name(RenameMode::Both))),
            Some(WatchEventKind::Rename)
        );
        assert_eq!(
            classify(&EventKind::Modify(ModifyKind::Data(DataChange::Content))),
            Some(WatchEventKind::Change)
        );
        assert_eq!(classify(&EventKind::Access(notify::event::AccessKind::Any)), None);
    }

    #[test]
    fn filters_editor_scratch_files() {
        assert!(is_temporary_file(Path::new("src/main.tsx~")));
        assert!(is_temporary_file(Path::new("src/.main.tsx.swp")));
        assert!(is_temporary_file(Path::new("src/#main.tsx#")));
        assert!(is_temporary_file(Path::new("src/main.tsx___jb_tmp___")));
        assert!(!is_temporary_file(Path::new("src/main.tsx")));
        assert!(!is_temporary_file(Path::new("src/#")));
    }

    #[tokio::test]
    async fn watches_nested_file_changes() {
        let temp = tempdir().unwrap();
        let nested = temp.path().join("components");
        fs::create_dir(&nested).unwrap();

        let (watcher, mut rx) = SourceWatcher::new(temp.path()).unwrap();

        // Give inotify time to set up
        tokio::time::sleep(Duration::from_millis(100)).await;

        fs::write(nested.join("App.tsx"), "export default 1").unwrap();

        let event = tokio::time::timeout(Duration::from_secs(3), rx.recv()).await;
        drop(watcher);

        assert!(event.is_ok(), "timeout waiting for file watch event");
        let event = event.unwrap().expect("channel should not be closed");
        assert!(event.path.ends_with("App.tsx"));
    }
}
