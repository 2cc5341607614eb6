//! Server lifecycle: binding, the actor thread, and shutdown.

use std::net::{IpAddr, SocketAddr};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use anyhow::{Result, anyhow};
use tiny_http::Server;

use crate::actor::Coordinator;
use crate::log;

/// Maximum number of port binding attempts.
const MAX_PORT_RETRIES: u16 = 10;

/// Bind the HTTP server, moving to the next port while one is taken.
pub fn bind_with_retry(interface: IpAddr, base_port: u16) -> Result<(Server, SocketAddr)> {
    let mut last_error = None;

    for offset in 0..MAX_PORT_RETRIES {
        let port = base_port.saturating_add(offset);
        match Server::http(SocketAddr::new(interface, port)) {
            Ok(server) => {
                // Port 0 asks the OS for a free port
                let addr = server
                    .server_addr()
                    .to_ip()
                    .unwrap_or_else(|| SocketAddr::new(interface, port));
                if offset > 0 {
                    log!("serve"; "port {} in use, using {} instead", base_port, addr.port());
                }
                return Ok((server, addr));
            }
            Err(e) => last_error = Some(e),
        }
    }

    Err(anyhow!(
        "failed to bind after {} attempts (ports {}-{}): {}",
        MAX_PORT_RETRIES,
        base_port,
        base_port.saturating_add(MAX_PORT_RETRIES - 1),
        last_error.map(|e| e.to_string()).unwrap_or_default()
    ))
}

/// Run the actor system on its own thread with a small tokio runtime.
pub fn spawn_actors(coordinator: Coordinator) -> JoinHandle<()> {
    thread::spawn(move || {
        let rt = match tokio::runtime::Builder::new_multi_thread()
            .worker_threads(2)
            .enable_all()
            .build()
        {
            Ok(rt) => rt,
            Err(e) => {
                log!("actor"; "cannot start runtime: {}", e);
                return;
            }
        };

        if let Err(e) = rt.block_on(coordinator.run()) {
            log!("actor"; "error: {}", e);
        }
    })
}

/// Wait for the actor system to stop (at most 2 seconds).
pub fn wait_for_shutdown(handle: JoinHandle<()>) {
    for _ in 0..40 {
        if handle.is_finished() {
            let _ = handle.join();
            return;
        }
        thread::sleep(Duration::from_millis(50));
    }
    crate::debug!("actor"; "still running after shutdown grace period");
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::Ipv4Addr;

    #[test]
    fn test_bind_skips_taken_port() {
        let (first, addr) = bind_with_retry(IpAddr::V4(Ipv4Addr::LOCALHOST), 0).unwrap();
        let (_second, next) = bind_with_retry(addr.ip(), addr.port()).unwrap();
        assert_ne!(addr.port(), next.port());
        drop(first);
    }
}
