use std::fs;
use std::sync::Arc;

use tokio::sync::mpsc;

use super::*;
use crate::actor::messages::WsMsg;
use crate::actor::ws::WsHandle;
use crate::client::{ClientSession, Page};
use crate::render::{BUILTIN_THEME, DeckRenderer, Renderer};

struct Fixture {
    _dir: tempfile::TempDir,
    ctx: ServeContext,
    renderer: Arc<DeckRenderer>,
    rx: mpsc::UnboundedReceiver<WsMsg>,
}

fn fixture(markdown: &str) -> Fixture {
    let dir = tempfile::TempDir::new().unwrap();
    let markdown_file = dir.path().join("deck.md");
    fs::write(&markdown_file, markdown).unwrap();

    let renderer = Arc::new(DeckRenderer::new(&[], BUILTIN_THEME).unwrap());
    let (tx, rx) = mpsc::unbounded_channel();
    let ctx = ServeContext {
        publisher: Publisher::new(renderer.clone(), WsHandle::new(tx)),
        asset_root: dir.path().to_path_buf(),
        markdown_file,
        ws_port: 9001,
    };
    Fixture {
        _dir: dir,
        ctx,
        renderer,
        rx,
    }
}

fn five_slides() -> String {
    (1..=5)
        .map(|i| format!("# Slide {i}\n"))
        .collect::<Vec<_>>()
        .join("\n---\n\n")
}

fn body_json(reply: &Reply) -> Value {
    serde_json::from_slice(&reply.body).unwrap()
}

fn broadcasts(rx: &mut mpsc::UnboundedReceiver<WsMsg>) -> Vec<String> {
    let mut out = Vec::new();
    while let Ok(msg) = rx.try_recv() {
        if let WsMsg::Broadcast(payload) = msg {
            out.push(payload);
        }
    }
    out
}

#[test]
fn test_index_renders_page() {
    let f = fixture("# Hello\n");
    let reply = route(&f.ctx, &Method::Get, "/", "");
    let html = String::from_utf8(reply.body).unwrap();

    assert_eq!(reply.status, 200);
    assert_eq!(reply.content_type, types::HTML);
    assert!(html.contains("<h1>Hello</h1>"));
    assert!(html.contains(r#"<meta name="ws-port" content="9001">"#));
    assert!(html.contains(r#"<div id="deck-container">"#));
    assert!(html.contains("<title>deck.md</title>"));
}

#[test]
fn test_index_render_failure_is_500() {
    let f = fixture("<!-- theme: nope -->\n# Hi\n");
    let reply = route(&f.ctx, &Method::Get, "/", "");
    assert_eq!(reply.status, 500);
}

#[test]
fn test_client_script() {
    let f = fixture("# x");
    let reply = route(&f.ctx, &Method::Get, "/client.js", "");
    assert_eq!(reply.status, 200);
    assert_eq!(reply.content_type, types::JAVASCRIPT);
    assert_eq!(reply.body, CLIENT_JS.as_bytes());
}

#[test]
fn test_reload_broadcasts_render() {
    let mut f = fixture("# x");
    let reply = route(&f.ctx, &Method::Post, "/api/reload", "# Pushed\n");

    assert_eq!(reply.status, 200);
    assert_eq!(body_json(&reply), json!({ "status": "ok" }));

    let direct = f.renderer.render("# Pushed\n").unwrap();
    let expected = crate::reload::message::UpdateMessage::update(&direct).to_json();
    assert_eq!(broadcasts(&mut f.rx), vec![expected]);
}

#[test]
fn test_reload_failure() {
    let mut f = fixture("# x");
    let reply = route(&f.ctx, &Method::Post, "/api/reload", "---\npaginate: maybe\n---\n");

    assert_eq!(reply.status, 500);
    assert_eq!(
        body_json(&reply),
        json!({ "status": "error", "message": "Failed to render markdown" })
    );
    assert!(broadcasts(&mut f.rx).is_empty());
}

#[test]
fn test_command_rebroadcast_drives_clients() {
    let mut f = fixture(&five_slides());
    let body = r#"{"command":"goto","slide":"3"}"#;
    let reply = route(&f.ctx, &Method::Post, "/api/command", body);

    assert_eq!(reply.status, 200);
    assert_eq!(
        body_json(&reply),
        json!({ "status": "ok", "command": { "command": "goto", "slide": "3" } })
    );

    let initial = f.renderer.render(&five_slides()).unwrap();
    let mut session = ClientSession::new(Page::load(&initial));
    for payload in broadcasts(&mut f.rx) {
        session.handle_text(&payload).unwrap();
    }
    assert_eq!(session.view.scrolled_to, Some(3));
}

#[test]
fn test_malformed_command_is_400() {
    let mut f = fixture("# x");
    let reply = route(&f.ctx, &Method::Post, "/api/command", "{not json");

    assert_eq!(reply.status, 400);
    assert_eq!(
        body_json(&reply),
        json!({ "status": "error", "message": "Invalid JSON" })
    );
    assert!(broadcasts(&mut f.rx).is_empty());
}

#[test]
fn test_static_assets() {
    let f = fixture("# x");
    fs::write(f.ctx.asset_root.join("logo.png"), b"\x89PNG").unwrap();

    let reply = route(&f.ctx, &Method::Get, "/logo.png?v=2", "");
    assert_eq!(reply.status, 200);
    assert_eq!(reply.content_type, types::PNG);
    assert_eq!(reply.body, b"\x89PNG");

    let missing = route(&f.ctx, &Method::Get, "/nope.png", "");
    assert_eq!(missing.status, 404);
    assert_eq!(missing.body, b"Not Found");
}

#[test]
fn test_api_routes_require_post() {
    let f = fixture("# x");
    assert_eq!(route(&f.ctx, &Method::Get, "/api/reload", "").status, 404);
    assert_eq!(route(&f.ctx, &Method::Delete, "/", "").status, 404);
}
