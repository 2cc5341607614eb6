//! Actor Message Definitions
//!
//! ```text
//! FsActor --publish--> Publisher --Broadcast--> WsActor --> Browser tabs
//! acceptor --handshake--AddClient------------> WsActor
//! ```

use std::net::TcpStream;

use tokio::sync::oneshot;
use tungstenite::WebSocket;

/// Messages to WebSocket Actor
#[derive(Debug)]
pub enum WsMsg {
    /// Send one serialized payload to every connected client
    Broadcast(String),
    /// Register a client whose WebSocket handshake has completed
    AddClient(WebSocket<TcpStream>),
    /// Report the number of connected clients
    ClientCount(oneshot::Sender<usize>),
    /// Close all clients and stop
    Shutdown,
}
