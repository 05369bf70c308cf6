//! # rgbclient
//!
//! A resilient client for the RGB color-command protocol with:
//! - A binary frame codec for ABSOLUTE / RELATIVE color commands
//! - A cancellable, single-shot connection worker with a failure taxonomy
//! - A supervisor that keeps exactly one connection toward the current target
//! - A bounded command history so reattaching consumers miss nothing
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │        Inputs: set_target / notify_ready / restart          │
//! └─────────────────────┬───────────────────────────────────────┘
//!                       │
//! ┌─────────────────────▼───────────────────────────────────────┐
//! │                     Supervisor                              │
//! │            (at most one live Connection)                    │
//! └─────────────────────┬───────────────────────────────────────┘
//!                       │ spawns
//! ┌─────────────────────▼───────────────────────────────────────┐
//! │              Connection (worker thread)                     │
//! │          connect → read_frame loop → events                 │
//! └─────────────────────┬───────────────────────────────────────┘
//!                       │ commands
//!          ┌────────────┴────────────┐
//!          │                         │
//!          ▼                         ▼
//!   ┌─────────────┐          ┌─────────────┐
//!   │ CommandLog  │          │  Consumer   │
//!   │  (replay)   │─────────►│  (display)  │
//!   └─────────────┘ catch-up └─────────────┘
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod config;

pub mod protocol;
pub mod history;
pub mod network;
pub mod color;

// =============================================================================
// Public API Re-exports
// =============================================================================

pub use error::{Result, RgbError};
pub use config::Config;
pub use history::CommandLog;
pub use network::{Connection, ConnectionErrorKind, ConnectionListener, Consumer, Endpoint, Supervisor};
pub use protocol::{Command, CommandId, Instruction};

// =============================================================================
// Version Info
// =============================================================================

/// Current version of rgbclient
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
