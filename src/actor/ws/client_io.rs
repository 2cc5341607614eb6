use std::io::{self, ErrorKind};
use std::net::TcpStream;
use std::time::{Duration, Instant};

use tungstenite::WebSocket;
use tungstenite::handshake::HandshakeError;
use tungstenite::protocol::{Message, WebSocketConfig};

use super::{Client, WsActor};

/// Total time a peer gets to complete its upgrade request.
const HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(2);

/// Sleep between attempts while the upgrade request is incomplete.
const HANDSHAKE_POLL: Duration = Duration::from_millis(10);

/// Cap on bytes queued for a client that is not reading.
const MAX_WRITE_BUFFER: usize = 16 * 1024 * 1024;

fn ws_config() -> WebSocketConfig {
    WebSocketConfig::default().max_write_buffer_size(MAX_WRITE_BUFFER)
}

/// Complete the server side of a WebSocket handshake.
///
/// Runs off the actor, on the thread that accepted the stream. The returned
/// socket is non-blocking and ready for [`WsHandle::add_client`].
///
/// [`WsHandle::add_client`]: super::WsHandle::add_client
pub fn handshake(stream: TcpStream) -> tungstenite::Result<WebSocket<TcpStream>> {
    handshake_within(stream, HANDSHAKE_TIMEOUT)
}

/// Handshake with one deadline across every read and write.
pub(super) fn handshake_within(
    stream: TcpStream,
    timeout: Duration,
) -> tungstenite::Result<WebSocket<TcpStream>> {
    let deadline = Instant::now() + timeout;
    stream.set_nonblocking(true)?;

    let mut attempt = tungstenite::accept_with_config(stream, Some(ws_config()));
    loop {
        match attempt {
            Ok(ws) => return Ok(ws),
            Err(HandshakeError::Failure(e)) => return Err(e),
            Err(HandshakeError::Interrupted(mid)) => {
                if Instant::now() >= deadline {
                    return Err(tungstenite::Error::Io(io::Error::new(
                        ErrorKind::TimedOut,
                        "handshake not completed in time",
                    )));
                }
                std::thread::sleep(HANDSHAKE_POLL);
                attempt = mid.handshake();
            }
        }
    }
}

impl WsActor {
    /// Register a client whose handshake has completed
    pub(super) fn add_client(&mut self, ws: WebSocket<TcpStream>) {
        let peer = ws.get_ref().peer_addr().ok();
        if let Err(e) = ws.get_ref().set_nonblocking(true) {
            crate::log!("ws"; "cannot poll client: {}", e);
            return;
        }
        self.clients.push(Client {
            ws,
            peer,
            overflows: 0,
        });
        crate::debug!("ws"; "client connected (total: {})", self.clients.len());
    }

    /// Drain incoming frames and flush pending writes.
    ///
    /// Clients that sent a close frame or failed a read are dropped.
    pub(super) fn poll_clients(&mut self) {
        self.clients.retain_mut(|client| {
            loop {
                match client.ws.read() {
                    Ok(Message::Close(_)) => {
                        crate::debug!("ws"; "client closed: {:?}", client.peer);
                        return false;
                    }
                    // Pings are answered by tungstenite, text is not expected
                    Ok(_) => continue,
                    Err(tungstenite::Error::Io(ref e)) if e.kind() == ErrorKind::WouldBlock => {
                        break;
                    }
                    Err(e) => {
                        crate::debug!("ws"; "client dropped: {}", e);
                        return false;
                    }
                }
            }

            match client.ws.flush() {
                Ok(()) => true,
                Err(tungstenite::Error::Io(ref e)) if e.kind() == ErrorKind::WouldBlock => true,
                Err(e) => {
                    crate::debug!("ws"; "client dropped on flush: {}", e);
                    false
                }
            }
        });
    }

    pub(super) fn close_all(&mut self) {
        for mut client in self.clients.drain(..) {
            let _ = client.ws.close(None);
            let _ = client.ws.flush();
        }
    }
}
