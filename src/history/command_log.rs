//! Command log implementation
//!
//! VecDeque-based ring with a Mutex for concurrency.

use std::collections::VecDeque;

use parking_lot::Mutex;

use crate::protocol::{Command, CommandId};

/// Bounded FIFO of delivered commands, addressable by command id
///
/// ## Concurrency:
/// - Single writer (the active connection's worker) appends
/// - Any thread may query; queries return owned copies
pub struct CommandLog {
    entries: Mutex<VecDeque<Command>>,
    capacity: usize,
}

impl CommandLog {
    /// Create an empty log holding at most `capacity` commands
    ///
    /// A capacity of zero is bumped to one so the newest command is always
    /// available as a cursor.
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            entries: Mutex::new(VecDeque::with_capacity(capacity)),
            capacity,
        }
    }

    /// Append a command at the tail, evicting the head if over capacity
    pub fn append(&self, command: Command) {
        let mut entries = self.entries.lock();
        entries.push_back(command);
        if entries.len() > self.capacity {
            if let Some(evicted) = entries.pop_front() {
                tracing::trace!("Evicted command {} from history", evicted.id);
            }
        }
    }

    /// All commands strictly after `id`, in delivery order
    ///
    /// If `id` is None or no longer in the log, the whole log is returned:
    /// an unknown cursor is treated as "nothing seen yet".
    pub fn commands_since(&self, id: Option<&CommandId>) -> Vec<Command> {
        let entries = self.entries.lock();

        let start = id
            .and_then(|id| entries.iter().position(|command| command.id == *id))
            .map(|index| index + 1)
            .unwrap_or(0);

        entries.range(start..).copied().collect()
    }

    /// Id of the most recently appended command
    pub fn last_id(&self) -> Option<CommandId> {
        self.entries.lock().back().map(|command| command.id)
    }

    /// Whether `id` is still retained
    pub fn contains(&self, id: &CommandId) -> bool {
        self.entries.lock().iter().any(|command| command.id == *id)
    }

    /// Number of retained commands
    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }

    /// Maximum number of retained commands
    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

impl Default for CommandLog {
    fn default() -> Self {
        Self::new(super::DEFAULT_CAPACITY)
    }
}
