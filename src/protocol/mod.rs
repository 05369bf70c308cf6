//! Protocol Module
//!
//! Defines the wire protocol spoken by the color-command server.
//!
//! ## Protocol Format
//!
//! One connection carries a stream of frames from server to client. Each
//! frame is an instruction code followed by three color fields whose width
//! depends on the code:
//!
//! ```text
//! ┌──────────┬─────────────────────────────┐
//! │ Code (1) │   R, G, B (3 or 6 bytes)    │
//! └──────────┴─────────────────────────────┘
//! ```
//!
//! ### Instructions
//! - 0x01: RELATIVE - three signed 16-bit big-endian deltas
//! - 0x02: ABSOLUTE - three unsigned bytes (0-255)
//!
//! Any other code is a protocol error.

mod command;
mod codec;

pub use command::{Command, CommandId, Instruction};
pub use codec::{
    decode_frame, encode_frame, read_frame, write_frame, ABSOLUTE_PAYLOAD_SIZE, CODE_SIZE,
    MAX_FRAME_SIZE, RELATIVE_PAYLOAD_SIZE,
};
