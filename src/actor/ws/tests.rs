use std::net::{TcpListener, TcpStream};
use std::thread;
use std::time::{Duration, Instant};

use tungstenite::WebSocket;
use tungstenite::protocol::Message;

use super::client_io::handshake_within;
use super::delivery::{Delivery, MAX_OVERFLOWS};
use super::*;
use crate::render::RenderResult;

fn listener() -> TcpListener {
    TcpListener::bind("127.0.0.1:0").unwrap()
}

/// Connect a client, giving the server side of the socket to `accept`.
fn connect_with(
    listener: &TcpListener,
    accept: impl FnOnce(WebSocket<TcpStream>),
) -> WebSocket<TcpStream> {
    let addr = listener.local_addr().unwrap();
    let client = thread::spawn(move || {
        let stream = TcpStream::connect(addr).unwrap();
        stream
            .set_read_timeout(Some(Duration::from_secs(5)))
            .unwrap();
        tungstenite::client(format!("ws://{addr}/"), stream)
            .ok()
            .expect("client handshake")
            .0
    });
    let (stream, _) = listener.accept().unwrap();
    accept(handshake(stream).unwrap());
    client.join().unwrap()
}

fn read_text(ws: &mut WebSocket<TcpStream>) -> String {
    loop {
        match ws.read().unwrap() {
            Message::Text(text) => return text.as_str().to_owned(),
            _ => continue,
        }
    }
}

fn update_payload() -> String {
    UpdateMessage::update(&RenderResult {
        html: "<div class=\"deck\"><section id=\"1\">hi</section></div>".into(),
        css: "section { color: red; }".into(),
    })
    .to_json()
}

#[test]
fn test_broadcast_delivers_identical_bytes() {
    let (mut actor, _handle) = WsActor::channel();
    let listener = listener();
    let mut a = connect_with(&listener, |ws| actor.add_client(ws));
    let mut b = connect_with(&listener, |ws| actor.add_client(ws));
    assert_eq!(actor.clients.len(), 2);

    let payload = update_payload();
    let delivery = actor.broadcast(payload.clone());
    assert_eq!(
        delivery,
        Delivery {
            sent: 2,
            deferred: 0,
            skipped: 0,
            dropped: 0
        }
    );

    let got_a = read_text(&mut a);
    let got_b = read_text(&mut b);
    assert_eq!(got_a, payload);
    assert_eq!(got_a, got_b);
}

#[test]
fn test_broadcast_without_clients() {
    let (mut actor, _handle) = WsActor::channel();
    assert_eq!(actor.broadcast(update_payload()), Delivery::default());
}

#[test]
fn test_close_frame_removes_client() {
    let (mut actor, _handle) = WsActor::channel();
    let listener = listener();
    let mut a = connect_with(&listener, |ws| actor.add_client(ws));
    let _b = connect_with(&listener, |ws| actor.add_client(ws));

    a.close(None).unwrap();
    let _ = a.flush();

    let deadline = Instant::now() + Duration::from_secs(3);
    while actor.clients.len() > 1 {
        assert!(Instant::now() < deadline, "closed client was not removed");
        thread::sleep(Duration::from_millis(20));
        actor.poll_clients();
    }
    assert_eq!(actor.clients.len(), 1);
}

#[test]
fn test_vanished_peer_is_dropped() {
    let (mut actor, _handle) = WsActor::channel();
    let listener = listener();
    let a = connect_with(&listener, |ws| actor.add_client(ws));
    drop(a);

    let deadline = Instant::now() + Duration::from_secs(3);
    while !actor.clients.is_empty() {
        assert!(Instant::now() < deadline, "vanished client was not removed");
        thread::sleep(Duration::from_millis(20));
        actor.poll_clients();
        actor.broadcast(update_payload());
    }
}

#[test]
fn test_failed_handshake_is_rejected() {
    let listener = listener();
    let addr = listener.local_addr().unwrap();
    let client = thread::spawn(move || {
        use std::io::Write;
        let mut stream = TcpStream::connect(addr).unwrap();
        stream.write_all(b"GET / HTTP/1.1\r\nHost: x\r\n\r\n").unwrap();
        stream
    });
    let (stream, _) = listener.accept().unwrap();
    assert!(handshake(stream).is_err());
    drop(client.join().unwrap());
}

#[test]
fn test_incomplete_handshake_hits_deadline() {
    let listener = listener();
    let addr = listener.local_addr().unwrap();
    let client = thread::spawn(move || {
        use std::io::Write;
        let mut stream = TcpStream::connect(addr).unwrap();
        // Keeps the request alive without ever finishing it
        for byte in b"GET / HTT" {
            if stream.write_all(&[*byte]).is_err() {
                break;
            }
            thread::sleep(Duration::from_millis(50));
        }
        stream
    });
    let (stream, _) = listener.accept().unwrap();

    let started = Instant::now();
    let result = handshake_within(stream, Duration::from_millis(200));
    assert!(matches!(
        result,
        Err(tungstenite::Error::Io(ref e)) if e.kind() == std::io::ErrorKind::TimedOut
    ));
    assert!(started.elapsed() < Duration::from_secs(2));
    drop(client.join().unwrap());
}

#[test]
fn test_client_that_stops_reading_is_evicted() {
    let (mut actor, _handle) = WsActor::channel();
    let listener = listener();
    // Never reads, so frames pile up in the server's write buffer
    let _idle = connect_with(&listener, |ws| actor.add_client(ws));
    let payload = "x".repeat(1024 * 1024);

    let mut total = Delivery::default();
    for _ in 0..80 {
        let delivery = actor.broadcast(payload.clone());
        total.skipped += delivery.skipped;
        total.dropped += delivery.dropped;
        if actor.clients.is_empty() {
            break;
        }
    }

    assert!(actor.clients.is_empty(), "idle client was never evicted");
    assert_eq!(total.dropped, 1);
    assert_eq!(total.skipped, usize::from(MAX_OVERFLOWS - 1));
}

#[test]
fn test_actor_run_via_handle() {
    let rt = tokio::runtime::Builder::new_multi_thread()
        .worker_threads(2)
        .enable_all()
        .build()
        .unwrap();
    let (actor, handle) = WsActor::channel();
    let task = rt.spawn(actor.run());

    let listener = listener();
    let mut a = connect_with(&listener, |ws| assert!(handle.add_client(ws)));
    assert_eq!(rt.block_on(handle.client_count()), 1);

    let payload = update_payload();
    assert!(handle.broadcast_payload(payload.clone()));
    assert_eq!(read_text(&mut a), payload);

    handle.shutdown();
    rt.block_on(task).unwrap();
    assert!(matches!(a.read(), Ok(Message::Close(_))));
    assert_eq!(rt.block_on(handle.client_count()), 0);
}
