mod common;

use std::net::TcpListener;
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};

use cfgsync_client::{ClientError, ConnectionState, SubscribeClient, SubscribeConfig, SubscribeEvents};
use common::*;

#[derive(Debug, PartialEq)]
enum Event {
    Message(Vec<u8>),
    Closed,
}

struct Recorder {
    tx: Mutex<Sender<Event>>,
}

impl SubscribeEvents for Recorder {
    fn on_message(&self, payload: &[u8]) {
        if payload == b"boom" {
            panic!("handler failed on purpose");
        }
        let _ = self.tx.lock().unwrap().send(Event::Message(payload.to_vec()));
    }

    fn on_closed(&self) {
        let _ = self.tx.lock().unwrap().send(Event::Closed);
    }
}

fn client(addr: String, ping_period: Duration) -> (SubscribeClient, Receiver<Event>) {
    let (tx, rx) = mpsc::channel();
    let config = SubscribeConfig {
        host: addr,
        channel: "changes".to_string(),
        ping_period,
        connect_timeout: Duration::from_secs(1),
    };
    let events = Arc::new(Recorder { tx: Mutex::new(tx) });
    (SubscribeClient::new(config, events).expect("client"), rx)
}

fn next(rx: &Receiver<Event>) -> Event {
    rx.recv_timeout(Duration::from_secs(2)).expect("event")
}

fn assert_quiet(rx: &Receiver<Event>, wait: Duration) {
    match rx.recv_timeout(wait) {
        // Disconnected: the client and its callbacks are already gone.
        Err(RecvTimeoutError::Timeout) | Err(RecvTimeoutError::Disconnected) => {}
        other => panic!("unexpected event: {:?}", other),
    }
}

fn listener() -> (TcpListener, String) {
    let listener = TcpListener::bind("127.0.0.1:0").expect("bind");
    let addr = listener.local_addr().expect("addr").to_string();
    (listener, addr)
}

#[test]
fn delivers_messages_in_arrival_order() {
    let (listener, addr) = listener();
    let server = thread::spawn(move || {
        let (mut stream, mut reader) = accept_subscriber(&listener);
        write_message(&mut stream, "changes", b"a");
        write_message(&mut stream, "changes", b"b");
        write_message(&mut stream, "changes", b"c");
        serve_until_eof(&mut stream, &mut reader, true);
    });

    let (client, rx) = client(addr, Duration::ZERO);
    client.init().expect("init");
    assert!(client.is_active());

    for expected in [b"a", b"b", b"c"] {
        assert_eq!(next(&rx), Event::Message(expected.to_vec()));
    }

    client.close();
    assert_eq!(next(&rx), Event::Closed);
    assert_eq!(client.state(), ConnectionState::Closed);
    server.join().expect("server");
}

#[test]
fn server_eof_raises_on_closed_once() {
    let (listener, addr) = listener();
    let server = thread::spawn(move || {
        let (stream, reader) = accept_subscriber(&listener);
        thread::sleep(Duration::from_millis(100));
        drop(reader);
        drop(stream);
    });

    let (client, rx) = client(addr, Duration::ZERO);
    client.init().expect("init");
    assert_eq!(next(&rx), Event::Closed);
    assert!(!client.is_active());

    client.close();
    assert_quiet(&rx, Duration::from_millis(200));
    server.join().expect("server");
}

#[test]
fn bad_confirmation_fails_init_without_callback() {
    let (listener, addr) = listener();
    let server = thread::spawn(move || {
        let (mut stream, _) = listener.accept().expect("accept");
        let mut reader = std::io::BufReader::new(stream.try_clone().expect("clone"));
        let _ = read_command(&mut reader);
        write_simple(&mut stream, "OK");
        thread::sleep(Duration::from_millis(200));
    });

    let (client, rx) = client(addr, Duration::ZERO);
    assert!(matches!(client.init(), Err(ClientError::Protocol(_))));
    assert_eq!(client.state(), ConnectionState::Closed);
    assert_quiet(&rx, Duration::from_millis(200));
    server.join().expect("server");
}

#[test]
fn refused_connection_fails_init() {
    let (client, rx) = client(closed_addr(), Duration::ZERO);
    assert!(matches!(client.init(), Err(ClientError::Connection(_))));
    assert!(!client.is_active());
    assert_quiet(&rx, Duration::from_millis(100));
}

#[test]
fn answered_pings_keep_subscription_alive() {
    let (listener, addr) = listener();
    let (ping_tx, ping_rx) = mpsc::channel();
    let server = thread::spawn(move || {
        let (mut stream, mut reader) = accept_subscriber(&listener);
        while let Ok(args) = read_command(&mut reader) {
            if args[0] == b"PING" {
                let _ = ping_tx.send(());
                write_push(&mut stream, &[b"pong", b""], None);
            }
        }
    });

    let (client, rx) = client(addr, Duration::from_millis(100));
    client.init().expect("init");
    for _ in 0..4 {
        ping_rx.recv_timeout(Duration::from_secs(1)).expect("ping");
    }
    assert!(client.is_active());
    assert_quiet(&rx, Duration::from_millis(50));

    client.close_quietly();
    assert_quiet(&rx, Duration::from_millis(200));
    server.join().expect("server");
}

#[test]
fn unanswered_ping_closes_within_two_periods() {
    let (listener, addr) = listener();
    let server = thread::spawn(move || {
        let (mut stream, mut reader) = accept_subscriber(&listener);
        serve_until_eof(&mut stream, &mut reader, false)
    });

    let (client, rx) = client(addr, Duration::from_millis(100));
    let start = Instant::now();
    client.init().expect("init");
    assert_eq!(next(&rx), Event::Closed);
    let elapsed = start.elapsed();
    assert!(elapsed >= Duration::from_millis(150), "closed too early: {:?}", elapsed);
    assert!(elapsed < Duration::from_millis(1000), "closed too late: {:?}", elapsed);
    assert!(!client.is_active());

    // The second tick closes instead of sending another PING.
    let pings = server.join().expect("server");
    assert_eq!(pings, 1);
}

#[test]
fn handler_panic_and_error_push_do_not_stop_reader() {
    let (listener, addr) = listener();
    let server = thread::spawn(move || {
        let (mut stream, mut reader) = accept_subscriber(&listener);
        write_message(&mut stream, "changes", b"boom");
        write_error(&mut stream, "ERR something odd");
        write_push(&mut stream, &[b"unexpected"], None);
        write_message(&mut stream, "changes", b"after");
        serve_until_eof(&mut stream, &mut reader, true);
    });

    let (client, rx) = client(addr, Duration::ZERO);
    client.init().expect("init");
    assert_eq!(next(&rx), Event::Message(b"after".to_vec()));
    assert!(client.is_active());

    drop(client);
    assert_quiet(&rx, Duration::from_millis(200));
    server.join().expect("server");
}

#[test]
fn close_is_idempotent() {
    let (listener, addr) = listener();
    let server = thread::spawn(move || {
        let (mut stream, mut reader) = accept_subscriber(&listener);
        serve_until_eof(&mut stream, &mut reader, true);
    });

    let (client, rx) = client(addr, Duration::ZERO);
    client.init().expect("init");
    client.close();
    client.close();
    client.close_quietly();
    assert_eq!(next(&rx), Event::Closed);
    assert_quiet(&rx, Duration::from_millis(200));

    // Closed is terminal; init does nothing.
    client.init().expect("init after close");
    assert_eq!(client.state(), ConnectionState::Closed);
    server.join().expect("server");
}

#[test]
fn empty_channel_is_rejected() {
    let (tx, _rx) = mpsc::channel();
    let config = SubscribeConfig {
        host: "127.0.0.1:6379".to_string(),
        channel: String::new(),
        ..SubscribeConfig::default()
    };
    let events = Arc::new(Recorder { tx: Mutex::new(tx) });
    assert!(matches!(
        SubscribeClient::new(config, events),
        Err(ClientError::InvalidArgument(_))
    ));
}
