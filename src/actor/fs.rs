//! FileSystem Actor
//!
//! Watches the markdown file and runs one render-and-broadcast cycle per
//! relevant change.
//!
//! The parent directory is watched (non-recursively) and events are filtered
//! by file name, so editors that save through a temp file and an atomic
//! rename keep triggering cycles.
//!
//! ```text
//! notify thread --blocking_send--> FsActor --publish_file--> WsActor
//! ```

use std::ffi::OsString;
use std::path::{Path, PathBuf};

use notify::event::{ModifyKind, RenameMode};
use notify::{EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc;

use crate::reload::Publisher;

/// Bridge channel capacity between the notify thread and the actor
const EVENT_BUFFER: usize = 64;

/// FileSystem Actor - watches one file
pub struct FsActor {
    /// Channel to receive notify events (sync -> async bridge)
    notify_rx: std::sync::mpsc::Receiver<notify::Result<notify::Event>>,
    /// Watcher handle (must be kept alive)
    _watcher: RecommendedWatcher,
    path: PathBuf,
    file_name: OsString,
    publisher: Publisher,
}

impl FsActor {
    /// Start watching immediately; events buffer until [`run`](Self::run).
    pub fn new(path: PathBuf, publisher: Publisher) -> notify::Result<Self> {
        let file_name = path
            .file_name()
            .map(OsString::from)
            .ok_or_else(|| notify::Error::generic("watched path has no file name"))?;
        let dir = match path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        };

        let (notify_tx, notify_rx) = std::sync::mpsc::channel();
        let mut watcher = notify::recommended_watcher(move |res| {
            let _ = notify_tx.send(res);
        })?;
        watcher.watch(&dir, RecursiveMode::NonRecursive)?;

        crate::debug!("watch"; "watching {} in {}", path.display(), dir.display());
        Ok(Self {
            notify_rx,
            _watcher: watcher,
            path,
            file_name,
            publisher,
        })
    }

    /// Run the actor event loop until the watcher goes away.
    pub async fn run(self) {
        let notify_rx = self.notify_rx;
        let (async_tx, mut async_rx) = mpsc::channel::<notify::Event>(EVENT_BUFFER);

        std::thread::spawn(move || {
            while let Ok(result) = notify_rx.recv() {
                match result {
                    Ok(event) => {
                        if async_tx.blocking_send(event).is_err() {
                            break; // Receiver dropped
                        }
                    }
                    Err(e) => crate::log!("watch"; "notify error: {}", e),
                }
            }
        });

        // Sequential: the last event's content is the last broadcast
        while let Some(event) = async_rx.recv().await {
            handle_event(&event, &self.path, &self.file_name, &self.publisher);
        }
        crate::debug!("watch"; "stopped");
    }
}

/// Run one cycle if `event` concerns the watched file.
///
/// Returns whether a cycle ran.
fn handle_event(event: &notify::Event, path: &Path, file_name: &OsString, publisher: &Publisher) -> bool {
    if !is_relevant(event, file_name) {
        return false;
    }
    crate::debug!("watch"; "{:?}: {}", event.kind, path.display());
    publisher.publish_file(path);
    true
}

/// Content-changing event for a path named `file_name`.
///
/// Metadata and access events are ignored, as are removals and renames away
/// from the file.
fn is_relevant(event: &notify::Event, file_name: &OsString) -> bool {
    let kind_matches = match event.kind {
        EventKind::Create(_) => true,
        EventKind::Modify(ModifyKind::Data(_) | ModifyKind::Any | ModifyKind::Other) => true,
        EventKind::Modify(ModifyKind::Name(mode)) => {
            !matches!(mode, RenameMode::From)
        }
        _ => false,
    };

    kind_matches
        && event
            .paths
            .iter()
            .any(|p| p.file_name() == Some(file_name.as_os_str()))
}
