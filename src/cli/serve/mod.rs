//! Preview server: HTTP front end plus the live-update channel.
//!
//! ```text
//! tiny_http (rayon pool) --route--> Publisher --> WsActor --> tabs
//! acceptor thread ---------------------------------^
//! ```

mod lifecycle;
mod path;
mod response;
mod routes;

use std::io::Read;
use std::sync::Arc;

use anyhow::{Context, Result};
use crossbeam::channel;
use tiny_http::{Request, Server};

use crate::actor::Coordinator;
use crate::actor::ws::WsActor;
use crate::config::PreviewConfig;
use crate::core::register_server;
use crate::reload::{self, Publisher};
use crate::render::Renderer;
use crate::{debug, log};

use routes::ServeContext;

/// Request worker threads
const REQUEST_WORKERS: usize = 4;

/// Serve the preview until Ctrl+C.
pub fn serve(config: &PreviewConfig, renderer: Arc<dyn Renderer>) -> Result<()> {
    let (server, addr) = lifecycle::bind_with_retry(config.interface, config.port)?;
    let server = Arc::new(server);

    // The page looks for the live-update channel one port above HTTP
    let (listener, ws_port) = reload::server::bind(config.interface, addr.port().saturating_add(1))?;
    let (ws_actor, ws) = WsActor::channel();
    let publisher = Publisher::new(renderer, ws.clone());
    reload::server::spawn_acceptor(listener, ws)?;

    let (shutdown_tx, shutdown_rx) = channel::unbounded::<()>();
    register_server(Arc::clone(&server), shutdown_tx);

    log!("serve"; "http://{} for {}", addr, config.markdown_file.display());
    debug!("ws"; "ws://{}:{}", addr.ip(), ws_port);

    let coordinator = Coordinator::new(config.markdown_file.clone(), publisher.clone(), ws_actor)
        .with_shutdown_signal(shutdown_rx);
    let actors = lifecycle::spawn_actors(coordinator);

    let ctx = Arc::new(ServeContext {
        publisher,
        markdown_file: config.markdown_file.clone(),
        asset_root: config.asset_root(),
        ws_port,
    });
    run_request_loop(&server, ctx)?;

    lifecycle::wait_for_shutdown(actors);
    Ok(())
}

fn run_request_loop(server: &Server, ctx: Arc<ServeContext>) -> Result<()> {
    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(REQUEST_WORKERS)
        .build()
        .context("failed to create request thread pool")?;

    for request in server.incoming_requests() {
        let ctx = Arc::clone(&ctx);
        pool.spawn(move || {
            if let Err(e) = handle_request(request, &ctx) {
                log!("serve"; "request error: {e}");
            }
        });
    }
    Ok(())
}

fn handle_request(mut request: Request, ctx: &ServeContext) -> Result<()> {
    if crate::core::is_shutdown() {
        return response::respond_unavailable(request);
    }

    let mut body = Vec::new();
    request
        .as_reader()
        .read_to_end(&mut body)
        .context("failed to read request body")?;
    let body = String::from_utf8_lossy(&body);

    debug!("serve"; "{} {}", request.method(), request.url());
    let reply = routes::route(ctx, request.method(), request.url(), &body);
    response::respond(request, reply)
}
