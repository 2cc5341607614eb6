//! Actor System for live updates
//!
//! Message-passing concurrency for serve mode:
//!
//! ```text
//! FsActor --> Publisher --> WsActor
//! (watch)     (render)    (broadcast)
//! ```
//!
//! # Module Structure
//!
//! - `messages` - Message types for inter-actor communication
//! - `fs` - File watcher for the markdown file
//! - `ws` - WebSocket client set and broadcast
//! - `coordinator` - Wires up and runs actors

pub mod coordinator;
pub mod fs;
pub mod messages;
pub mod ws;

pub use coordinator::Coordinator;
