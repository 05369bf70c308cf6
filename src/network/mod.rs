//! Network Module
//!
//! Client-side connection handling.
//!
//! ## Architecture
//! - One worker thread per live connection, running a blocking read loop
//! - A supervisor that owns at most one connection and replaces it when the
//!   target or readiness changes
//! - Events flow worker → supervisor → history log + consumer

mod endpoint;
mod connection;
mod supervisor;

pub use endpoint::Endpoint;
pub use connection::{
    Connection, ConnectionErrorKind, ConnectionListener, ConnectionState, StopToken,
};
pub use supervisor::{Consumer, Supervisor};
