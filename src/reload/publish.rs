//! Render-and-broadcast cycles.
//!
//! A [`Publisher`] is shared by the file watcher and the HTTP API: both turn
//! markdown into an `update` message and push it to every tab.

use std::fs;
use std::path::Path;
use std::sync::Arc;

use crate::actor::ws::WsHandle;
use crate::client::dom;
use crate::logger::{status_error, status_success};
use crate::reload::message::UpdateMessage;
use crate::render::{RenderError, RenderResult, Renderer};

#[derive(Clone)]
pub struct Publisher {
    renderer: Arc<dyn Renderer>,
    ws: WsHandle,
}

impl Publisher {
    pub fn new(renderer: Arc<dyn Renderer>, ws: WsHandle) -> Self {
        Self { renderer, ws }
    }

    pub fn renderer(&self) -> &dyn Renderer {
        self.renderer.as_ref()
    }

    pub fn ws(&self) -> &WsHandle {
        &self.ws
    }

    /// Render `markdown` and broadcast the result.
    ///
    /// On failure nothing is sent and clients keep their current deck.
    pub fn publish(&self, markdown: &str) -> Result<RenderResult, RenderError> {
        let result = self.renderer.render(markdown)?;
        if !self.ws.broadcast(&UpdateMessage::update(&result)) {
            crate::debug!("reload"; "update dropped, live-update actor stopped");
        }
        Ok(result)
    }

    /// Read a file and publish it, reporting the outcome on the status line.
    pub fn publish_file(&self, path: &Path) -> bool {
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());

        let markdown = match fs::read_to_string(path) {
            Ok(markdown) => markdown,
            Err(e) => {
                crate::log!("watch"; "cannot read {}: {}", path.display(), e);
                return false;
            }
        };

        match self.publish(&markdown) {
            Ok(result) => {
                let slides = dom::parse_fragment(&result.html).slide_count();
                status_success(&format!(
                    "{} ({} slide{})",
                    name,
                    slides,
                    if slides == 1 { "" } else { "s" }
                ));
                true
            }
            Err(e) => {
                status_error(&format!("render failed: {}", name), &e.to_string());
                false
            }
        }
    }
}
