//! History Module
//!
//! Bounded, ordered log of recently delivered commands.
//!
//! ## Responsibilities
//! - Keep the last N commands in delivery order
//! - Evict oldest-first once full
//! - Answer "everything after command X" for consumers catching up
//!
//! ## Data Structure Choice
//! A VecDeque behind a single Mutex:
//! - O(1) append and eviction
//! - Lookups by id are a linear scan, which is fine at the sizes involved
//! - Reads copy out a snapshot so the lock is never held while a consumer works

mod command_log;

pub use command_log::CommandLog;

/// Default number of commands retained for replay
pub const DEFAULT_CAPACITY: usize = 1000;
