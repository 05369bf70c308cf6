//! Connection Supervisor
//!
//! Keeps at most one live connection running toward the desired target and
//! fans its commands out to the history log and the attached consumer.
//!
//! ## Responsibilities
//! - Serialize target/readiness/restart inputs under one lock
//! - Start, keep, or replace the connection on every input change
//! - Drop events from connections it no longer tracks (generation check)
//! - Let a reattaching consumer catch up from the history without gaps
//!
//! The supervisor never schedules retries on its own: a failed connection is
//! forgotten, and the next input (readiness, target change, restart) starts a
//! fresh one.

use std::sync::{Arc, Weak};
use std::thread::JoinHandle;

use parking_lot::Mutex;

use super::{Connection, ConnectionErrorKind, ConnectionListener, Endpoint};
use crate::config::Config;
use crate::error::Result;
use crate::history::CommandLog;
use crate::protocol::{Command, CommandId};

/// The display side of the client
///
/// Callbacks run on connection worker threads, or on the attaching thread
/// during replay. Live callbacks run with delivery serialized and must not
/// call back into the supervisor; the bulk of an attach replay runs unlocked
/// and may. Keep them short.
pub trait Consumer: Send + Sync {
    fn on_connection_state_changed(&self, _connected: bool) {}

    fn on_connection_error(&self, _kind: ConnectionErrorKind, _message: &str) {}

    fn on_command_received(&self, command: &Command);
}

/// Supervises the connection to one server at a time
///
/// ## Concurrency:
/// - `state`: target, readiness and the tracked connection; never held while
///   calling into a connection or a consumer
/// - `consumer`: held across history append + live forward, and across the
///   final catch-up + install in `attach_consumer`, so the two cannot
///   interleave
pub struct Supervisor {
    shared: Arc<Shared>,
}

struct Shared {
    config: Config,
    state: Mutex<State>,
    consumer: Mutex<Option<Arc<dyn Consumer>>>,
    history: CommandLog,
}

#[derive(Default)]
struct State {
    target: Option<Endpoint>,
    ready: bool,
    current: Option<Tracked>,

    /// Generation of the most recently started connection (0 = none yet)
    latest_generation: u64,
}

struct Tracked {
    generation: u64,
    connection: Arc<Connection>,
    _worker: JoinHandle<()>,
}

impl Supervisor {
    /// Create an idle supervisor; nothing connects until a target is set and
    /// readiness is signalled
    pub fn new(config: Config) -> Result<Self> {
        config.validate()?;

        let history = CommandLog::new(config.history_capacity);
        Ok(Self {
            shared: Arc::new(Shared {
                config,
                state: Mutex::new(State::default()),
                consumer: Mutex::new(None),
                history,
            }),
        })
    }

    // =========================================================================
    // Inputs
    // =========================================================================

    /// Point the client at a server
    pub fn set_target(&self, host: impl Into<String>, port: u16) {
        self.set_endpoint(Endpoint::new(host, port));
    }

    pub fn set_endpoint(&self, endpoint: Endpoint) {
        let retired = {
            let mut state = self.shared.state.lock();
            if state.target.as_ref() != Some(&endpoint) {
                tracing::info!("Target set to {}", endpoint);
            }
            state.target = Some(endpoint);
            self.shared.reconcile_locked(&mut state, false)
        };
        retire(retired);
    }

    /// The network is usable
    pub fn notify_ready(&self) {
        self.set_ready(true);
    }

    /// The network went away
    pub fn notify_unready(&self) {
        self.set_ready(false);
    }

    fn set_ready(&self, ready: bool) {
        let retired = {
            let mut state = self.shared.state.lock();
            if state.ready != ready {
                tracing::info!("Network {}", if ready { "ready" } else { "unready" });
            }
            state.ready = ready;
            self.shared.reconcile_locked(&mut state, false)
        };
        retire(retired);
    }

    /// Bring the running connection in line with the current inputs
    ///
    /// Idempotent: a live connection to the current target is left alone.
    pub fn reconcile(&self) {
        let retired = {
            let mut state = self.shared.state.lock();
            self.shared.reconcile_locked(&mut state, false)
        };
        retire(retired);
    }

    /// Drop the current connection unconditionally and reconcile
    pub fn restart(&self) {
        tracing::info!("Restart requested");
        let retired = {
            let mut state = self.shared.state.lock();
            self.shared.reconcile_locked(&mut state, true)
        };
        retire(retired);
    }

    /// Stop the current connection and stay stopped until the next
    /// `notify_ready`
    pub fn shutdown(&self) {
        let retired = {
            let mut state = self.shared.state.lock();
            state.ready = false;
            stop_current(&mut state)
        };
        if retired.is_some() {
            tracing::info!("Supervisor shutting down");
        }
        retire(retired);
    }

    // =========================================================================
    // Consumers
    // =========================================================================

    /// Install `consumer` as the live target, first replaying every command
    /// after `since` (or the whole history if `since` is unknown)
    ///
    /// Returns the number of replayed commands.
    pub fn attach_consumer(&self, consumer: Arc<dyn Consumer>, since: Option<&CommandId>) -> usize {
        let backlog = self.shared.history.commands_since(since);
        for command in &backlog {
            consumer.on_command_received(command);
        }
        let cursor = backlog.last().map(|command| command.id).or_else(|| since.copied());

        // Commands appended during the replay above; delivery waits on this
        // lock, so nothing lands between the tail and the install
        let mut slot = self.shared.consumer.lock();
        let tail = self.shared.history.commands_since(cursor.as_ref());
        for command in &tail {
            consumer.on_command_received(command);
        }
        *slot = Some(consumer);

        let replayed = backlog.len() + tail.len();
        tracing::debug!("Consumer attached, replayed {} commands", replayed);
        replayed
    }

    /// Remove the live consumer; commands keep flowing into the history
    pub fn detach_consumer(&self) -> Option<Arc<dyn Consumer>> {
        let previous = self.shared.consumer.lock().take();
        if previous.is_some() {
            tracing::debug!("Consumer detached");
        }
        previous
    }

    /// Commands delivered after `id`; see [`CommandLog::commands_since`]
    pub fn commands_since(&self, id: Option<&CommandId>) -> Vec<Command> {
        self.shared.history.commands_since(id)
    }

    pub fn last_command_id(&self) -> Option<CommandId> {
        self.shared.history.last_id()
    }

    pub fn history(&self) -> &CommandLog {
        &self.shared.history
    }

    // =========================================================================
    // Introspection
    // =========================================================================

    pub fn target(&self) -> Option<Endpoint> {
        self.shared.state.lock().target.clone()
    }

    pub fn is_ready(&self) -> bool {
        self.shared.state.lock().ready
    }

    /// The connection currently tracked, if one is running
    pub fn current_connection(&self) -> Option<Arc<Connection>> {
        self.shared
            .state
            .lock()
            .current
            .as_ref()
            .map(|tracked| Arc::clone(&tracked.connection))
    }

    pub fn is_connected(&self) -> bool {
        self.current_connection()
            .map(|connection| connection.is_connected())
            .unwrap_or(false)
    }

    /// Number of connections started so far
    pub fn generation(&self) -> u64 {
        self.shared.state.lock().latest_generation
    }
}

impl Drop for Supervisor {
    fn drop(&mut self) {
        self.shutdown();
    }
}

/// Untrack the current connection and ask it to stop
///
/// Runs under the state lock so a replacement is never spawned while the old
/// worker still holds a live socket. `request_stop` only takes the
/// connection's socket lock, which its worker never holds while waiting on
/// the supervisor.
fn stop_current(state: &mut State) -> Option<Tracked> {
    let tracked = state.current.take()?;
    tracing::info!(
        "Stopping connection #{} to {}",
        tracked.generation,
        tracked.connection.endpoint()
    );
    tracked.connection.request_stop();
    Some(tracked)
}

/// Detach a stopped connection from the supervisor
///
/// Must be called without the state lock held: detaching waits for any
/// callback in flight, and that callback may need the state lock.
fn retire(tracked: Option<Tracked>) {
    if let Some(tracked) = tracked {
        tracked.connection.set_listener(None);
        tracing::debug!("Connection #{} detached", tracked.generation);
    }
}

// =============================================================================
// Shared state
// =============================================================================

impl Shared {
    /// Decide whether to keep, stop, or replace the current connection
    ///
    /// Any connection being replaced is stopped before its successor is
    /// spawned. It is returned so the caller can detach it after releasing
    /// the lock.
    fn reconcile_locked(self: &Arc<Self>, state: &mut State, force: bool) -> Option<Tracked> {
        let target = match (&state.target, state.ready) {
            (Some(target), true) => target.clone(),
            (None, _) => {
                tracing::debug!("No target set; not connecting");
                return stop_current(state);
            }
            (Some(_), false) => {
                tracing::debug!("Network not ready; not connecting");
                return stop_current(state);
            }
        };

        if !force {
            if let Some(current) = &state.current {
                if current.connection.endpoint() == &target
                    && !current.connection.is_stop_requested()
                {
                    tracing::debug!(
                        "Connection #{} to {} already in progress",
                        current.generation,
                        target
                    );
                    return None;
                }
            }
        }

        let retired = stop_current(state);

        state.latest_generation += 1;
        let generation = state.latest_generation;

        let connection = Arc::new(Connection::with_config(target.clone(), &self.config));
        connection.set_listener(Some(Arc::new(SupervisedListener {
            generation,
            shared: Arc::downgrade(self),
        })));

        match connection.spawn(format!("rgb-conn-{}", generation)) {
            Ok(worker) => {
                tracing::info!("Started connection #{} to {}", generation, target);
                state.current = Some(Tracked {
                    generation,
                    connection,
                    _worker: worker,
                });
            }
            Err(e) => {
                tracing::error!("Failed to spawn connection worker for {}: {}", target, e);
                connection.set_listener(None);
            }
        }

        retired
    }

    fn is_current(&self, generation: u64) -> bool {
        self.state
            .lock()
            .current
            .as_ref()
            .map(|tracked| tracked.generation == generation)
            .unwrap_or(false)
    }

    fn is_latest(&self, generation: u64) -> bool {
        self.state.lock().latest_generation == generation
    }

    /// Forget the connection with this generation if it is still tracked
    ///
    /// Returns whether it is the most recently started connection, i.e.
    /// whether the consumer should hear about it.
    fn release(&self, generation: u64) -> bool {
        let mut state = self.state.lock();
        let tracked = state
            .current
            .as_ref()
            .map(|tracked| tracked.generation == generation)
            .unwrap_or(false);
        if tracked {
            state.current = None;
            tracing::debug!("Connection #{} finished", generation);
        }
        state.latest_generation == generation
    }

    fn deliver(&self, generation: u64, command: Command) {
        if !self.is_current(generation) {
            tracing::trace!("Dropping {} from stale connection #{}", command, generation);
            return;
        }

        let consumer = self.consumer.lock();
        self.history.append(command);
        if let Some(consumer) = consumer.as_ref() {
            consumer.on_command_received(&command);
        }
    }

    fn forward<F>(&self, f: F)
    where
        F: FnOnce(&dyn Consumer),
    {
        let consumer = self.consumer.lock().clone();
        if let Some(consumer) = consumer {
            f(consumer.as_ref());
        }
    }
}

/// Listener attached to each supervised connection, tagged with its generation
struct SupervisedListener {
    generation: u64,
    shared: Weak<Shared>,
}

impl ConnectionListener for SupervisedListener {
    fn connection_state_changed(&self, connected: bool) {
        let Some(shared) = self.shared.upgrade() else {
            return;
        };

        let latest = if connected {
            shared.is_latest(self.generation)
        } else {
            shared.release(self.generation)
        };
        if latest {
            shared.forward(|c| c.on_connection_state_changed(connected));
        }
    }

    fn connection_error(&self, kind: ConnectionErrorKind, message: &str) {
        let Some(shared) = self.shared.upgrade() else {
            return;
        };

        if shared.release(self.generation) {
            shared.forward(|c| c.on_connection_error(kind, message));
        }
    }

    fn command_received(&self, command: Command) {
        if let Some(shared) = self.shared.upgrade() {
            shared.deliver(self.generation, command);
        }
    }
}
