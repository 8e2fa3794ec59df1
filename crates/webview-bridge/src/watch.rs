//! Directory watcher for the sandbox root
//!
//! Emits `system` events of kind `files-changed` so the page can refresh its
//! file list. Runs on notify's own thread and only talks to the host.
//!
//! Writes to the bridge's own data file are not file changes from the page's
//! point of view; those already surface as `data-updated`.

use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};

use crate::host::{BridgeEvent, Host};

pub const FILES_CHANGED: &str = "files-changed";

/// Keeps the underlying watcher alive; dropping it stops the events.
pub struct DirectoryWatcher {
    _watcher: RecommendedWatcher,
    root: PathBuf,
}

impl DirectoryWatcher {
    pub fn root(&self) -> &Path {
        &self.root
    }
}

/// Watch `root`, skipping events for the `ignored` files and their `.tmp`
/// siblings.
pub fn watch_directory(
    root: &Path,
    ignored: &[PathBuf],
    host: Arc<dyn Host>,
) -> notify::Result<DirectoryWatcher> {
    let ignored = ignored_names(root, ignored);
    let mut watcher = notify::recommended_watcher(move |res: notify::Result<Event>| match res {
        Ok(event) => {
            if let Some(detail) = describe(&event, &ignored) {
                log::debug!("{}: {}", FILES_CHANGED, detail);
                host.emit(BridgeEvent::System {
                    kind: FILES_CHANGED.to_string(),
                    detail,
                });
            }
        }
        Err(e) => log::warn!("Directory watch error: {}", e),
    })?;

    watcher.watch(root, RecursiveMode::NonRecursive)?;
    log::info!("Watching {:?} for changes", root);

    Ok(DirectoryWatcher {
        _watcher: watcher,
        root: root.to_path_buf(),
    })
}

/// File names directly under `root` for the ignored paths, each with its
/// `.tmp` sibling.
fn ignored_names(root: &Path, ignored: &[PathBuf]) -> Vec<OsString> {
    let Ok(root) = root.canonicalize() else {
        return Vec::new();
    };

    let mut names = Vec::new();
    for path in ignored {
        let Some(name) = path.file_name() else {
            continue;
        };
        let parent = match path.parent().filter(|p| !p.as_os_str().is_empty()) {
            Some(parent) => parent.canonicalize(),
            None => std::env::current_dir().and_then(|cwd| cwd.canonicalize()),
        };
        if parent.is_ok_and(|p| p == root) {
            let mut tmp = name.to_os_string();
            tmp.push(".tmp");
            names.push(name.to_os_string());
            names.push(tmp);
        }
    }
    names
}

/// Comma-separated file names touched by a content-changing event.
fn describe(event: &Event, ignored: &[OsString]) -> Option<String> {
    match event.kind {
        EventKind::Create(_) | EventKind::Modify(_) | EventKind::Remove(_) => {}
        EventKind::Access(_) | EventKind::Any | EventKind::Other => return None,
    }

    let names: Vec<String> = event
        .paths
        .iter()
        .filter_map(|p| p.file_name())
        .filter(|n| !ignored.iter().any(|i| i == n))
        .map(|n| n.to_string_lossy().to_string())
        .collect();

    if names.is_empty() {
        None
    } else {
        Some(names.join(", "))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::HeadlessHost;
    use notify::event::{AccessKind, CreateKind, ModifyKind, RenameMode};
    use std::time::Duration;

    #[test]
    fn test_describe_filters_access_events() {
        let created = Event::new(EventKind::Create(CreateKind::File))
            .add_path(PathBuf::from("/root/a.txt"))
            .add_path(PathBuf::from("/root/b.txt"));
        assert_eq!(describe(&created, &[]), Some("a.txt, b.txt".to_string()));

        let accessed =
            Event::new(EventKind::Access(AccessKind::Any)).add_path(PathBuf::from("/root/a.txt"));
        assert_eq!(describe(&accessed, &[]), None);

        assert_eq!(describe(&Event::new(EventKind::Create(CreateKind::Any)), &[]), None);
    }

    #[test]
    fn test_data_file_writes_are_ignored() {
        let dir = tempfile::tempdir().unwrap();
        let data = dir.path().join("data.json");
        let ignored = ignored_names(dir.path(), &[data.clone(), PathBuf::from("/elsewhere/x.json")]);
        assert_eq!(ignored, vec![OsString::from("data.json"), OsString::from("data.json.tmp")]);

        let tmp = dir.path().join("data.json.tmp");
        let rename = Event::new(EventKind::Modify(ModifyKind::Name(RenameMode::Both)))
            .add_path(tmp)
            .add_path(data);
        assert_eq!(describe(&rename, &ignored), None);

        let mixed = Event::new(EventKind::Create(CreateKind::File))
            .add_path(dir.path().join("data.json.tmp"))
            .add_path(dir.path().join("notes.txt"));
        assert_eq!(describe(&mixed, &ignored), Some("notes.txt".to_string()));
    }

    #[tokio::test]
    async fn test_new_file_emits_event() {
        let dir = tempfile::tempdir().unwrap();
        let (host, mut channels) = HeadlessHost::new("watch");
        let watcher = watch_directory(dir.path(), &[], Arc::new(host)).unwrap();
        assert_eq!(watcher.root(), dir.path());

        std::fs::write(dir.path().join("fresh.txt"), "new").unwrap();

        let event = tokio::time::timeout(Duration::from_secs(10), channels.events.recv())
            .await
            .expect("no watch event within timeout")
            .unwrap();
        match event {
            BridgeEvent::System { kind, detail } => {
                assert_eq!(kind, FILES_CHANGED);
                assert!(detail.contains("fresh.txt"));
            }
            other => panic!("unexpected event {:?}", other),
        }
    }
}
