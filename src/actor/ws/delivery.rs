use std::io::ErrorKind;

use tungstenite::protocol::Message;

use super::WsActor;

/// Consecutive write-buffer overflows before a client is dropped.
pub(super) const MAX_OVERFLOWS: u8 = 3;

/// Outcome of one broadcast.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub(super) struct Delivery {
    pub sent: usize,
    /// Socket full; frame stays queued in the client's write buffer.
    pub deferred: usize,
    /// Write buffer full; this message was not queued for the client.
    pub skipped: usize,
    pub dropped: usize,
}

impl WsActor {
    /// Broadcast one payload to all connected clients.
    ///
    /// The frame is built once and shared, so every client gets the same
    /// bytes. A client whose socket would block is kept. A client whose
    /// write buffer is full misses this message and is dropped once that
    /// happens [`MAX_OVERFLOWS`] times in a row. Any other send failure
    /// removes it.
    pub(super) fn broadcast(&mut self, payload: String) -> Delivery {
        let mut delivery = Delivery::default();

        if self.clients.is_empty() {
            crate::debug!("ws"; "no clients connected");
            return delivery;
        }

        let msg = Message::text(payload);
        self.clients
            .retain_mut(|client| match client.ws.send(msg.clone()) {
                Ok(()) => {
                    client.overflows = 0;
                    delivery.sent += 1;
                    true
                }
                Err(tungstenite::Error::Io(ref e)) if e.kind() == ErrorKind::WouldBlock => {
                    client.overflows = 0;
                    delivery.deferred += 1;
                    true
                }
                Err(tungstenite::Error::WriteBufferFull(_)) => {
                    client.overflows += 1;
                    if client.overflows >= MAX_OVERFLOWS {
                        crate::debug!("ws"; "client not reading, dropped: {:?}", client.peer);
                        delivery.dropped += 1;
                        false
                    } else {
                        delivery.skipped += 1;
                        true
                    }
                }
                Err(e) => {
                    crate::debug!("ws"; "client disconnected: {}", e);
                    delivery.dropped += 1;
                    false
                }
            });

        crate::debug!(
            "ws";
            "broadcast to {} clients ({} deferred, {} skipped, {} dropped)",
            delivery.sent, delivery.deferred, delivery.skipped, delivery.dropped
        );
        delivery
    }
}
