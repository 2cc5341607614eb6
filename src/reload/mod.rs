//! Reload Module
//!
//! Live updates for the preview page.
//!
//! # Architecture
//!
//! ```text
//! FsActor ──┐
//!           ├─► Publisher (render) ─► WsActor ─► Browser tabs
//! HTTP API ─┘                            ▲
//!                 server (acceptor) ─────┘
//! ```
//!
//! # Modules
//!
//! - `message` - wire messages (update, goto, find, close_preview)
//! - `publish` - render-and-broadcast cycles
//! - `server` - WebSocket listener and acceptor thread

pub mod message;
pub mod publish;
pub mod server;

pub use publish::Publisher;
