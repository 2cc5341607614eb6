//! WebSocket Actor - Live Update Delivery
//!
//! This actor is responsible for:
//! - Registering clients whose handshake finished on the acceptor side
//! - Broadcasting update and command payloads to all connected clients
//! - Polling clients for close frames and flushing pending writes
//!
//! # Architecture
//!
//! ```text
//! handshake thread --[AddClient]--> WsActor --[broadcast]--> Clients
//! Publisher / HTTP ---[Broadcast]---^   ^
//!                                       +--[poll: close, flush]--+
//! ```
//!
//! All client state lives in the actor. Senders only hold a [`WsHandle`].

mod client_io;
mod delivery;

pub use client_io::handshake;

#[cfg(test)]
mod tests;

use std::net::{SocketAddr, TcpStream};
use std::time::Duration;

use tokio::sync::{mpsc, oneshot};
use tokio::time::MissedTickBehavior;
use tungstenite::WebSocket;

use super::messages::WsMsg;
use crate::reload::message::UpdateMessage;

/// How often idle clients are polled for close frames.
const POLL_INTERVAL: Duration = Duration::from_millis(100);

/// A connected WebSocket client
struct Client {
    ws: WebSocket<TcpStream>,
    peer: Option<SocketAddr>,
    /// Consecutive broadcasts that found the write buffer full
    overflows: u8,
}

/// WebSocket Actor - manages client connections and broadcasts
pub struct WsActor {
    /// Channel to receive messages
    rx: mpsc::UnboundedReceiver<WsMsg>,
    /// Connected clients
    clients: Vec<Client>,
}

/// Cloneable sender side of the actor.
///
/// Sending never blocks, so it works from HTTP worker threads and async
/// tasks alike.
#[derive(Debug, Clone)]
pub struct WsHandle {
    tx: mpsc::UnboundedSender<WsMsg>,
}

impl WsActor {
    /// Create an actor together with its handle
    pub fn channel() -> (Self, WsHandle) {
        let (tx, rx) = mpsc::unbounded_channel();
        let actor = Self {
            rx,
            clients: Vec::new(),
        };
        (actor, WsHandle::new(tx))
    }

    /// Run the actor event loop
    pub async fn run(mut self) {
        let mut poll = tokio::time::interval(POLL_INTERVAL);
        poll.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                msg = self.rx.recv() => match msg {
                    Some(WsMsg::Broadcast(payload)) => {
                        self.broadcast(payload);
                    }
                    Some(WsMsg::AddClient(ws)) => {
                        self.add_client(ws);
                    }
                    Some(WsMsg::ClientCount(reply)) => {
                        let _ = reply.send(self.clients.len());
                    }
                    Some(WsMsg::Shutdown) | None => {
                        crate::debug!("ws"; "shutting down");
                        self.close_all();
                        break;
                    }
                },
                _ = poll.tick() => self.poll_clients(),
            }
        }
    }
}

impl WsHandle {
    pub fn new(tx: mpsc::UnboundedSender<WsMsg>) -> Self {
        Self { tx }
    }

    /// Serialize a message once and queue it for every client.
    ///
    /// Returns false if the actor has stopped.
    pub fn broadcast(&self, msg: &UpdateMessage) -> bool {
        self.broadcast_payload(msg.to_json())
    }

    /// Queue an already serialized payload for every client.
    pub fn broadcast_payload(&self, payload: String) -> bool {
        self.tx.send(WsMsg::Broadcast(payload)).is_ok()
    }

    /// Hand a client that finished its [`handshake`] to the actor.
    pub fn add_client(&self, ws: WebSocket<TcpStream>) -> bool {
        self.tx.send(WsMsg::AddClient(ws)).is_ok()
    }

    /// True once the actor has stopped.
    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }

    /// Number of connected clients (0 if the actor has stopped).
    pub async fn client_count(&self) -> usize {
        let (reply, rx) = oneshot::channel();
        if self.tx.send(WsMsg::ClientCount(reply)).is_err() {
            return 0;
        }
        rx.await.unwrap_or(0)
    }

    pub fn shutdown(&self) {
        let _ = self.tx.send(WsMsg::Shutdown);
    }
}
