//! WebSocket Listener for Live Updates
//!
//! Binds the live-update port and runs an acceptor thread. Each accepted
//! stream gets its own short-lived thread for the WebSocket handshake, so a
//! slow peer never holds up the WsActor or other connections.

use std::io::ErrorKind;
use std::net::{IpAddr, TcpListener};
use std::time::Duration;

use anyhow::Result;

use crate::actor::ws::{WsHandle, handshake};
use crate::core::is_shutdown;

/// Maximum port retry attempts
const MAX_PORT_RETRIES: u16 = 10;

/// Acceptor sleep between polls of the non-blocking listener
const ACCEPT_BACKOFF: Duration = Duration::from_millis(100);

/// Bind the live-update listener, retrying successive ports if in use.
///
/// Returns the listener and the port actually bound.
pub fn bind(interface: IpAddr, base_port: u16) -> Result<(TcpListener, u16)> {
    let mut last_error = None;

    for offset in 0..MAX_PORT_RETRIES {
        let port = base_port.saturating_add(offset);
        match TcpListener::bind((interface, port)) {
            Ok(listener) => {
                let actual_port = listener.local_addr()?.port();
                if offset > 0 {
                    crate::log!("ws"; "port {} in use, using {} instead", base_port, actual_port);
                }
                return Ok((listener, actual_port));
            }
            Err(e) => last_error = Some(e),
        }
    }

    Err(anyhow::anyhow!(
        "Failed to bind WebSocket server after {} attempts: {}",
        MAX_PORT_RETRIES,
        last_error.map(|e| e.to_string()).unwrap_or_default()
    ))
}

/// Spawn the acceptor thread. It stops on shutdown or when the actor is gone.
pub fn spawn_acceptor(listener: TcpListener, ws: WsHandle) -> Result<std::thread::JoinHandle<()>> {
    listener.set_nonblocking(true)?;

    Ok(std::thread::spawn(move || {
        while !is_shutdown() {
            match listener.accept() {
                Ok((stream, addr)) => {
                    if ws.is_closed() {
                        crate::debug!("ws"; "actor stopped, acceptor exiting");
                        break;
                    }
                    crate::debug!("ws"; "connection from {}", addr);
                    let ws = ws.clone();
                    std::thread::spawn(move || match handshake(stream) {
                        Ok(socket) => {
                            ws.add_client(socket);
                        }
                        Err(e) => crate::log!("ws"; "handshake failed ({}): {}", addr, e),
                    });
                }
                Err(ref e) if e.kind() == ErrorKind::WouldBlock => {
                    std::thread::sleep(ACCEPT_BACKOFF);
                }
                Err(e) => {
                    crate::log!("ws"; "accept error: {}", e);
                    std::thread::sleep(ACCEPT_BACKOFF);
                }
            }
        }
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::Ipv4Addr;

    #[test]
    fn test_bind_retries_taken_port() {
        let localhost = IpAddr::V4(Ipv4Addr::LOCALHOST);
        let (first, port) = bind(localhost, 0).unwrap();
        assert_ne!(port, 0);

        let (_second, next) = bind(localhost, port).unwrap();
        assert_ne!(next, port);
        drop(first);
    }

    #[test]
    fn test_trickled_handshake_does_not_delay_broadcast() {
        use std::io::Write;
        use std::net::TcpStream;
        use std::time::Instant;

        use tungstenite::Message;

        use crate::actor::ws::WsActor;

        let rt = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(2)
            .enable_all()
            .build()
            .unwrap();
        let (actor, handle) = WsActor::channel();
        let task = rt.spawn(actor.run());

        let localhost = IpAddr::V4(Ipv4Addr::LOCALHOST);
        let (listener, port) = bind(localhost, 0).unwrap();
        spawn_acceptor(listener, handle.clone()).unwrap();

        // Sends an incomplete upgrade request one byte at a time
        let slow = std::thread::spawn(move || {
            let mut stream = TcpStream::connect((localhost, port)).unwrap();
            for byte in b"GET / HTT" {
                if stream.write_all(&[*byte]).is_err() {
                    break;
                }
                std::thread::sleep(Duration::from_millis(300));
            }
        });
        std::thread::sleep(Duration::from_millis(200));

        let stream = TcpStream::connect((localhost, port)).unwrap();
        stream
            .set_read_timeout(Some(Duration::from_secs(5)))
            .unwrap();
        let (mut client, _) = tungstenite::client(format!("ws://127.0.0.1:{port}/"), stream)
            .ok()
            .expect("client handshake");

        let deadline = Instant::now() + Duration::from_secs(3);
        while rt.block_on(handle.client_count()) == 0 {
            assert!(Instant::now() < deadline, "healthy client was not registered");
            std::thread::sleep(Duration::from_millis(20));
        }

        let sent = Instant::now();
        assert!(handle.broadcast_payload("{\"command\":\"goto\",\"slide\":2}".into()));
        let text = loop {
            match client.read().unwrap() {
                Message::Text(text) => break text,
                _ => continue,
            }
        };
        assert_eq!(text.as_str(), "{\"command\":\"goto\",\"slide\":2}");
        assert!(sent.elapsed() < Duration::from_secs(1));

        handle.shutdown();
        rt.block_on(task).unwrap();
        slow.join().unwrap();
    }
}
