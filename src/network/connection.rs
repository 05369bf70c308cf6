//! Connection Worker
//!
//! Owns one socket to the server and turns its byte stream into events.
//!
//! ## Lifecycle
//! ```text
//! IDLE ──► CONNECTING ──► CONNECTED ──► CLOSED
//!   │           │                          ▲
//!   └───────────┴──────────────────────────┘  (stop requested / dial failed)
//! ```
//!
//! A connection runs exactly once. Every failure is terminal for the instance;
//! retrying is the supervisor's job.

use std::cell::RefCell;
use std::fmt;
use std::io::{self, BufReader};
use std::net::{Shutdown, TcpStream};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use parking_lot::{Mutex, ReentrantMutex};

use super::Endpoint;
use crate::config::Config;
use crate::error::RgbError;
use crate::protocol::{read_frame, Command};

// =============================================================================
// Public Types
// =============================================================================

/// Where a connection is in its lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Idle,
    Connecting,
    Connected,
    Closed,
}

/// Failure categories reported to listeners
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionErrorKind {
    /// The dial failed (refused, unreachable, name resolution)
    Establishment,

    /// The stream failed after connecting, including the server hanging up
    Read,

    /// The server sent a malformed frame
    Protocol,
}

impl fmt::Display for ConnectionErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConnectionErrorKind::Establishment => f.write_str("ESTABLISHMENT"),
            ConnectionErrorKind::Read => f.write_str("READ"),
            ConnectionErrorKind::Protocol => f.write_str("PROTOCOL"),
        }
    }
}

/// Receives events from a connection
///
/// Callbacks run on the connection's worker thread and block its read loop,
/// so they should return quickly and hand long work off elsewhere.
pub trait ConnectionListener: Send + Sync {
    /// `true` once connected, `false` once a connected socket is closed
    fn connection_state_changed(&self, connected: bool);

    fn connection_error(&self, kind: ConnectionErrorKind, message: &str);

    fn command_received(&self, command: Command);
}

/// Set-once cancellation flag
#[derive(Debug, Clone, Default)]
pub struct StopToken(Arc<AtomicBool>);

impl StopToken {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the flag; returns true only for the call that actually set it
    pub fn request(&self) -> bool {
        !self.0.swap(true, Ordering::AcqRel)
    }

    pub fn is_requested(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }
}

// =============================================================================
// Connection
// =============================================================================

type ListenerSlot = ReentrantMutex<RefCell<Option<Arc<dyn ConnectionListener>>>>;

/// A single, non-restartable connection to the server
///
/// ## Concurrency:
/// - `listener`: reentrant lock held for the duration of every callback, so
///   `set_listener` from another thread waits for an in-flight callback, while
///   a callback may itself replace the listener
/// - `socket`: out-of-band handle used by `request_stop` to unblock a pending
///   read; published under the same lock that re-checks the stop flag
pub struct Connection {
    endpoint: Endpoint,
    connect_timeout: Option<Duration>,
    tcp_nodelay: bool,
    listener: ListenerSlot,
    stop: StopToken,
    socket: Mutex<Option<TcpStream>>,
    state: Mutex<ConnectionState>,
}

impl Connection {
    /// Create a connection with default settings; no I/O happens here
    pub fn new(endpoint: Endpoint) -> Self {
        Self::with_config(endpoint, &Config::default())
    }

    pub fn with_config(endpoint: Endpoint, config: &Config) -> Self {
        Self {
            endpoint,
            connect_timeout: config.connect_timeout(),
            tcp_nodelay: config.tcp_nodelay,
            listener: ReentrantMutex::new(RefCell::new(None)),
            stop: StopToken::new(),
            socket: Mutex::new(None),
            state: Mutex::new(ConnectionState::Idle),
        }
    }

    pub fn endpoint(&self) -> &Endpoint {
        &self.endpoint
    }

    pub fn state(&self) -> ConnectionState {
        *self.state.lock()
    }

    pub fn is_connected(&self) -> bool {
        self.state() == ConnectionState::Connected
    }

    /// Replace (or clear, with None) the event listener
    pub fn set_listener(&self, listener: Option<Arc<dyn ConnectionListener>>) {
        let slot = self.listener.lock();
        *slot.borrow_mut() = listener;
    }

    /// Ask the worker to stop
    ///
    /// Safe from any thread, any number of times. A connected socket is shut
    /// down so a blocked read returns promptly.
    pub fn request_stop(&self) {
        if !self.stop.request() {
            return;
        }
        tracing::debug!("Stop requested for connection to {}", self.endpoint);

        if let Some(socket) = self.socket.lock().as_ref() {
            if let Err(e) = socket.shutdown(Shutdown::Both) {
                tracing::trace!("Shutdown of {} failed: {}", self.endpoint, e);
            }
        }
    }

    pub fn is_stop_requested(&self) -> bool {
        self.stop.is_requested()
    }

    /// Run `run` on a dedicated, named worker thread
    pub fn spawn(self: &Arc<Self>, name: String) -> io::Result<JoinHandle<()>> {
        let connection = Arc::clone(self);
        thread::Builder::new().name(name).spawn(move || connection.run())
    }

    /// Worker body: connect, then read frames until stopped or failed
    ///
    /// Blocks the calling thread. Events go to the listener on this thread.
    pub fn run(&self) {
        // Checkpoint: before dialing
        {
            let mut state = self.state.lock();
            if *state != ConnectionState::Idle {
                tracing::warn!("Connection to {} has already run", self.endpoint);
                return;
            }
            if self.stop.is_requested() {
                tracing::debug!("Connection to {} stopped before dialing", self.endpoint);
                *state = ConnectionState::Closed;
                return;
            }
            *state = ConnectionState::Connecting;
        }

        tracing::debug!("Connecting to {}", self.endpoint);
        let stream = match self.endpoint.connect(self.connect_timeout) {
            Ok(stream) => stream,
            Err(e) => {
                tracing::warn!("Connection to {} failed: {}", self.endpoint, e);
                self.set_state(ConnectionState::Closed);
                self.notify(|l| l.connection_error(ConnectionErrorKind::Establishment, &e.to_string()));
                return;
            }
        };

        if self.tcp_nodelay {
            if let Err(e) = stream.set_nodelay(true) {
                tracing::debug!("Could not set TCP_NODELAY for {}: {}", self.endpoint, e);
            }
        }

        // Checkpoint: a stop that raced the dial
        {
            let mut socket = self.socket.lock();
            if self.stop.is_requested() {
                drop(socket);
                tracing::debug!("Connection to {} stopped while dialing", self.endpoint);
                let _ = stream.shutdown(Shutdown::Both);
                self.set_state(ConnectionState::Closed);
                return;
            }
            match stream.try_clone() {
                Ok(handle) => *socket = Some(handle),
                Err(e) => tracing::debug!(
                    "No out-of-band handle for {}; stop waits for the next frame: {}",
                    self.endpoint,
                    e
                ),
            }
        }

        self.set_state(ConnectionState::Connected);
        tracing::debug!("Connected to {}", self.endpoint);
        self.notify(|l| l.connection_state_changed(true));

        self.read_loop(stream);

        // Teardown: only reached after CONNECTED was announced
        if let Some(socket) = self.socket.lock().take() {
            let _ = socket.shutdown(Shutdown::Both);
        }
        self.set_state(ConnectionState::Closed);
        tracing::debug!("Disconnected from {}", self.endpoint);
        self.notify(|l| l.connection_state_changed(false));
    }

    /// Decode frames until stop, I/O failure, or a protocol error
    fn read_loop(&self, stream: TcpStream) {
        let mut reader = BufReader::new(stream);

        loop {
            if self.stop.is_requested() {
                tracing::debug!("Stop observed for {}", self.endpoint);
                return;
            }

            match read_frame(&mut reader) {
                Ok(command) => {
                    tracing::trace!("Received from {}: {}", self.endpoint, command);
                    self.notify(|l| l.command_received(command));
                }
                Err(e) if self.stop.is_requested() => {
                    tracing::debug!("Read from {} ended by stop: {}", self.endpoint, e);
                    return;
                }
                Err(RgbError::Protocol(message)) => {
                    tracing::warn!("Protocol error from {}: {}", self.endpoint, message);
                    self.notify(|l| l.connection_error(ConnectionErrorKind::Protocol, &message));
                    return;
                }
                Err(RgbError::Io(ref e)) if e.kind() == io::ErrorKind::UnexpectedEof => {
                    tracing::debug!("Server {} closed the connection", self.endpoint);
                    self.notify(|l| {
                        l.connection_error(ConnectionErrorKind::Read, "connection closed by server")
                    });
                    return;
                }
                Err(e) => {
                    // read_frame fails only with Io past this point
                    tracing::warn!("Error reading from {}: {}", self.endpoint, e);
                    let message = match e {
                        RgbError::Io(e) => e.to_string(),
                        other => other.to_string(),
                    };
                    self.notify(|l| l.connection_error(ConnectionErrorKind::Read, &message));
                    return;
                }
            }
        }
    }

    fn set_state(&self, state: ConnectionState) {
        *self.state.lock() = state;
    }

    /// Invoke the current listener, if any, with the slot locked
    fn notify<F>(&self, f: F)
    where
        F: FnOnce(&dyn ConnectionListener),
    {
        let slot = self.listener.lock();
        // Clone out so the RefCell borrow ends before the callback runs
        let listener = slot.borrow().clone();
        if let Some(listener) = listener {
            f(listener.as_ref());
        }
    }
}

impl fmt::Debug for Connection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Connection")
            .field("endpoint", &self.endpoint)
            .field("state", &self.state())
            .field("stop_requested", &self.stop.is_requested())
            .finish()
    }
}
