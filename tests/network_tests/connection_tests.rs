//! Connection Tests
//!
//! These tests verify against a loopback server:
//! - Cancellation before dialing, racing the dial, and after connecting
//! - Establishment, read and protocol failures
//! - Command delivery order
//! - Listener replacement

use std::io::Write;
use std::net::TcpListener;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use crossbeam::channel::{self, Receiver, Sender};
use rgbclient::network::{
    Connection, ConnectionErrorKind, ConnectionListener, ConnectionState, Endpoint,
};
use rgbclient::protocol::{encode_frame, Command, Instruction};

const TIMEOUT: Duration = Duration::from_secs(5);

// =============================================================================
// Helper Functions
// =============================================================================

#[derive(Debug, Clone, PartialEq)]
enum Event {
    State(bool),
    Error(ConnectionErrorKind, String),
    Command(Instruction, i32, i32, i32),
}

struct RecordingListener {
    tx: Sender<Event>,
}

impl ConnectionListener for RecordingListener {
    fn connection_state_changed(&self, connected: bool) {
        let _ = self.tx.send(Event::State(connected));
    }

    fn connection_error(&self, kind: ConnectionErrorKind, message: &str) {
        let _ = self.tx.send(Event::Error(kind, message.to_string()));
    }

    fn command_received(&self, command: Command) {
        let _ = self
            .tx
            .send(Event::Command(command.instruction, command.r, command.g, command.b));
    }
}

fn listen() -> (TcpListener, Endpoint) {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let port = listener.local_addr().unwrap().port();
    (listener, Endpoint::new("127.0.0.1", port))
}

/// An endpoint nothing is listening on
fn closed_endpoint() -> Endpoint {
    let (listener, endpoint) = listen();
    drop(listener);
    endpoint
}

fn recording(connection: &Connection) -> Receiver<Event> {
    let (tx, rx) = channel::unbounded();
    connection.set_listener(Some(Arc::new(RecordingListener { tx })));
    rx
}

fn frames(commands: &[Command]) -> Vec<u8> {
    commands
        .iter()
        .flat_map(|c| encode_frame(c).unwrap().to_vec())
        .collect()
}

/// Accept one client, write `bytes`, then close
fn serve_once(listener: TcpListener, bytes: Vec<u8>) -> thread::JoinHandle<()> {
    thread::spawn(move || {
        let (mut stream, _) = listener.accept().unwrap();
        stream.write_all(&bytes).unwrap();
        stream.flush().unwrap();
    })
}

// =============================================================================
// Cancellation Tests
// =============================================================================

#[test]
fn test_stop_before_run_emits_nothing() {
    let (listener, endpoint) = listen();
    let connection = Connection::new(endpoint);
    let events = recording(&connection);

    connection.request_stop();
    connection.run();

    assert!(events.try_recv().is_err());
    assert_eq!(connection.state(), ConnectionState::Closed);

    listener.set_nonblocking(true).unwrap();
    assert!(listener.accept().is_err(), "should not have dialed");
}

#[test]
fn test_request_stop_is_idempotent() {
    let connection = Connection::new(closed_endpoint());

    assert!(!connection.is_stop_requested());
    connection.request_stop();
    connection.request_stop();
    connection.request_stop();
    assert!(connection.is_stop_requested());
}

#[test]
fn test_stop_after_connect_closes_without_error() {
    let (listener, endpoint) = listen();
    let server = thread::spawn(move || {
        let (stream, _) = listener.accept().unwrap();
        // Hold the socket open and silent until the client goes away
        let mut buf = [0u8; 1];
        let _ = std::io::Read::read(&mut &stream, &mut buf);
    });

    let connection = Arc::new(Connection::new(endpoint));
    let events = recording(&connection);
    let worker = connection.spawn("test-conn".to_string()).unwrap();

    assert_eq!(events.recv_timeout(TIMEOUT).unwrap(), Event::State(true));
    assert!(connection.is_connected());

    connection.request_stop();
    worker.join().unwrap();

    assert_eq!(events.recv_timeout(TIMEOUT).unwrap(), Event::State(false));
    assert!(events.try_recv().is_err());
    assert_eq!(connection.state(), ConnectionState::Closed);

    server.join().unwrap();
}

#[test]
fn test_stop_racing_dial_never_leaves_connected() {
    let (listener, endpoint) = listen();
    // Accepted sockets stay open so no attempt sees a server hangup
    thread::spawn(move || {
        let mut clients = Vec::new();
        for stream in listener.incoming().flatten() {
            clients.push(stream);
        }
    });

    for attempt in 0..200u64 {
        let connection = Arc::new(Connection::new(endpoint.clone()));
        let events = recording(&connection);
        let worker = connection.spawn(format!("test-conn-{}", attempt)).unwrap();

        // Land the stop anywhere from before the dial to after CONNECTED
        if attempt % 4 != 0 {
            thread::sleep(Duration::from_micros(attempt % 50));
        }
        connection.request_stop();
        worker.join().unwrap();

        let seen: Vec<Event> = events.try_iter().collect();
        match seen.as_slice() {
            [] => {}
            [Event::State(true), Event::State(false)] => {}
            other => panic!("attempt {}: unexpected events {:?}", attempt, other),
        }
        assert_eq!(connection.state(), ConnectionState::Closed);
    }
}

#[test]
fn test_run_twice_does_nothing() {
    let connection = Connection::new(closed_endpoint());
    let events = recording(&connection);

    connection.run();
    assert!(matches!(
        events.recv_timeout(TIMEOUT).unwrap(),
        Event::Error(ConnectionErrorKind::Establishment, _)
    ));

    connection.run();
    assert!(events.try_recv().is_err());
}

// =============================================================================
// Failure Tests
// =============================================================================

#[test]
fn test_dial_failure_reports_establishment_only() {
    let connection = Connection::new(closed_endpoint());
    let events = recording(&connection);

    connection.run();

    match events.try_recv().unwrap() {
        Event::Error(ConnectionErrorKind::Establishment, message) => assert!(!message.is_empty()),
        other => panic!("Expected establishment error, got {:?}", other),
    }
    assert!(events.try_recv().is_err(), "no state change without a connection");
    assert_eq!(connection.state(), ConnectionState::Closed);
}

#[test]
fn test_server_hangup_reports_read_error_then_disconnect() {
    let (listener, endpoint) = listen();
    let server = serve_once(listener, Vec::new());

    let connection = Connection::new(endpoint);
    let events = recording(&connection);
    connection.run();
    server.join().unwrap();

    assert_eq!(events.try_recv().unwrap(), Event::State(true));
    assert!(matches!(
        events.try_recv().unwrap(),
        Event::Error(ConnectionErrorKind::Read, _)
    ));
    assert_eq!(events.try_recv().unwrap(), Event::State(false));
    assert!(events.try_recv().is_err());
}

#[test]
fn test_invalid_code_reports_protocol_error() {
    let (listener, endpoint) = listen();
    let mut bytes = frames(&[Command::absolute(1, 2, 3)]);
    bytes.extend_from_slice(&[9, 2, 4, 5, 6]);
    let server = serve_once(listener, bytes);

    let connection = Connection::new(endpoint);
    let events = recording(&connection);
    connection.run();
    server.join().unwrap();

    assert_eq!(events.try_recv().unwrap(), Event::State(true));
    assert_eq!(
        events.try_recv().unwrap(),
        Event::Command(Instruction::Absolute, 1, 2, 3)
    );
    assert_eq!(
        events.try_recv().unwrap(),
        Event::Error(
            ConnectionErrorKind::Protocol,
            "invalid instruction code: 9".to_string()
        )
    );
    assert_eq!(events.try_recv().unwrap(), Event::State(false));
    assert!(events.try_recv().is_err(), "must not resync past a bad frame");
}

// =============================================================================
// Delivery Tests
// =============================================================================

#[test]
fn test_commands_delivered_in_order() {
    let (listener, endpoint) = listen();
    let sent = [
        Command::absolute(10, 20, 30),
        Command::relative(-5, 0, 300),
        Command::absolute(255, 255, 255),
    ];
    let server = serve_once(listener, frames(&sent));

    let connection = Connection::new(endpoint);
    let events = recording(&connection);
    connection.run();
    server.join().unwrap();

    assert_eq!(events.try_recv().unwrap(), Event::State(true));
    for cmd in &sent {
        assert_eq!(
            events.try_recv().unwrap(),
            Event::Command(cmd.instruction, cmd.r, cmd.g, cmd.b)
        );
    }
}

#[test]
fn test_cleared_listener_receives_nothing() {
    let (listener, endpoint) = listen();
    let server = serve_once(listener, frames(&[Command::absolute(1, 1, 1)]));

    let connection = Connection::new(endpoint);
    let events = recording(&connection);
    connection.set_listener(None);
    connection.run();
    server.join().unwrap();

    assert!(events.try_recv().is_err());
}

#[test]
fn test_listener_replaced_midstream() {
    let (listener, endpoint) = listen();
    let (go_tx, go_rx) = channel::bounded::<()>(0);
    let server = thread::spawn(move || {
        let (mut stream, _) = listener.accept().unwrap();
        stream.write_all(&frames(&[Command::absolute(1, 1, 1)])).unwrap();
        go_rx.recv().unwrap();
        stream.write_all(&frames(&[Command::absolute(2, 2, 2)])).unwrap();
    });

    let connection = Arc::new(Connection::new(endpoint));
    let first = recording(&connection);
    let worker = connection.spawn("test-conn".to_string()).unwrap();

    assert_eq!(first.recv_timeout(TIMEOUT).unwrap(), Event::State(true));
    assert_eq!(
        first.recv_timeout(TIMEOUT).unwrap(),
        Event::Command(Instruction::Absolute, 1, 1, 1)
    );

    let second = recording(&connection);
    go_tx.send(()).unwrap();

    assert_eq!(
        second.recv_timeout(TIMEOUT).unwrap(),
        Event::Command(Instruction::Absolute, 2, 2, 2)
    );
    server.join().unwrap();
    worker.join().unwrap();

    assert!(first.try_recv().is_err());
}

#[test]
fn test_connection_reports_endpoint() {
    let connection = Connection::new(Endpoint::new("example.invalid", 4242));

    assert_eq!(connection.endpoint().host(), "example.invalid");
    assert_eq!(connection.endpoint().port(), 4242);
    assert_eq!(connection.state(), ConnectionState::Idle);
    assert!(!connection.is_connected());
}
