//! Actor Coordinator - Wires up the live-update actor system
//!
//! The Coordinator is a thin orchestrator: it starts the actors, waits for
//! the shutdown signal, and tears them down. Rendering and delivery logic
//! live in `reload` and `actor::ws`.
//!
//! ```text
//! FsActor --publish--> WsActor --> Browser tabs
//!                         ^
//! HTTP API --publish------+
//! ```

use std::path::PathBuf;
use std::time::Duration;

use anyhow::Result;
use crossbeam::channel::Receiver;

use super::fs::FsActor;
use super::ws::WsActor;
use crate::reload::Publisher;

/// How long the WsActor gets to close its clients
const SHUTDOWN_GRACE: Duration = Duration::from_millis(500);
const SHUTDOWN_POLL: Duration = Duration::from_millis(100);

/// Coordinator - wires up and runs the actor system
pub struct Coordinator {
    markdown_file: PathBuf,
    publisher: Publisher,
    ws_actor: WsActor,
    /// Optional shutdown signal receiver
    shutdown_rx: Option<Receiver<()>>,
}

impl Coordinator {
    /// `publisher` must broadcast through `ws_actor`'s handle.
    pub fn new(markdown_file: PathBuf, publisher: Publisher, ws_actor: WsActor) -> Self {
        Self {
            markdown_file,
            publisher,
            ws_actor,
            shutdown_rx: None,
        }
    }

    /// Set shutdown signal receiver
    pub fn with_shutdown_signal(mut self, rx: Receiver<()>) -> Self {
        self.shutdown_rx = Some(rx);
        self
    }

    /// Run the actor system until shutdown
    pub async fn run(self) -> Result<()> {
        let ws = self.publisher.ws().clone();
        let ws_task = tokio::spawn(self.ws_actor.run());

        // A watcher failure leaves the HTTP API working
        let fs_task = match FsActor::new(self.markdown_file.clone(), self.publisher.clone()) {
            Ok(fs) => Some(tokio::spawn(fs.run())),
            Err(e) => {
                crate::log!("watch"; "cannot watch {}: {}", self.markdown_file.display(), e);
                None
            }
        };

        crate::debug!("actor"; "start");
        match self.shutdown_rx {
            // Poll-based since crossbeam's receiver is blocking
            Some(rx) => loop {
                if rx.try_recv().is_ok() {
                    crate::debug!("actor"; "shutdown signal received");
                    break;
                }
                tokio::time::sleep(SHUTDOWN_POLL).await;
            },
            None => match fs_task {
                Some(ref task) => {
                    while !task.is_finished() {
                        tokio::time::sleep(SHUTDOWN_POLL).await;
                    }
                }
                None => {
                    while !crate::core::is_shutdown() {
                        tokio::time::sleep(SHUTDOWN_POLL).await;
                    }
                }
            },
        }

        if let Some(task) = fs_task {
            task.abort();
        }
        ws.shutdown();
        let _ = tokio::time::timeout(SHUTDOWN_GRACE, ws_task).await;

        crate::debug!("actor"; "stopped");
        Ok(())
    }
}
