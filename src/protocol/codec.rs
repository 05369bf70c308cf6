//! Protocol codec
//!
//! Encoding and decoding functions for the wire protocol.
//!
//! ## Wire Format
//!
//! ```text
//! RELATIVE: ┌──────────┬────────┬────────┬────────┐
//!           │ 0x01 (1) │ R (2)  │ G (2)  │ B (2)  │   i16, big-endian
//!           └──────────┴────────┴────────┴────────┘
//! ABSOLUTE: ┌──────────┬────────┬────────┬────────┐
//!           │ 0x02 (1) │ R (1)  │ G (1)  │ B (1)  │   u8
//!           └──────────┴────────┴────────┴────────┘
//! ```
//!
//! There is no length prefix: the instruction code alone determines how many
//! bytes follow. An unknown code therefore leaves the stream unsynchronised and
//! is fatal to the connection.

use std::io::{Cursor, Read, Write};

use bytes::{BufMut, Bytes, BytesMut};

use super::{Command, Instruction};
use crate::error::{Result, RgbError};

/// Instruction code size
pub const CODE_SIZE: usize = 1;

/// Payload size of a RELATIVE frame: three i16 values
pub const RELATIVE_PAYLOAD_SIZE: usize = 6;

/// Payload size of an ABSOLUTE frame: three u8 values
pub const ABSOLUTE_PAYLOAD_SIZE: usize = 3;

/// Largest frame on the wire
pub const MAX_FRAME_SIZE: usize = CODE_SIZE + RELATIVE_PAYLOAD_SIZE;

// =============================================================================
// Decoding
// =============================================================================

/// Read one complete frame from a stream
///
/// Blocks until the frame is complete. Every failure of the reader, including
/// end-of-stream, is returned as `RgbError::Io`; an unknown instruction code is
/// `RgbError::Protocol` after consuming exactly one byte.
pub fn read_frame<R: Read>(reader: &mut R) -> Result<Command> {
    let mut code = [0u8; CODE_SIZE];
    reader.read_exact(&mut code)?;

    let instruction = Instruction::from_code(code[0]).ok_or_else(|| {
        RgbError::Protocol(format!("invalid instruction code: {}", code[0]))
    })?;

    let command = match instruction {
        Instruction::Relative => {
            let mut payload = [0u8; RELATIVE_PAYLOAD_SIZE];
            reader.read_exact(&mut payload)?;
            let r = i16::from_be_bytes([payload[0], payload[1]]);
            let g = i16::from_be_bytes([payload[2], payload[3]]);
            let b = i16::from_be_bytes([payload[4], payload[5]]);
            Command::relative(r, g, b)
        }
        Instruction::Absolute => {
            let mut payload = [0u8; ABSOLUTE_PAYLOAD_SIZE];
            reader.read_exact(&mut payload)?;
            Command::absolute(payload[0], payload[1], payload[2])
        }
    };

    Ok(command)
}

/// Decode a frame from the front of a byte slice
///
/// Returns the command and the number of bytes consumed. A slice that ends
/// mid-frame is reported as an `UnexpectedEof` I/O error.
pub fn decode_frame(bytes: &[u8]) -> Result<(Command, usize)> {
    let mut cursor = Cursor::new(bytes);
    let command = read_frame(&mut cursor)?;
    Ok((command, cursor.position() as usize))
}

// =============================================================================
// Encoding
// =============================================================================

/// Encode a command to its wire form
///
/// Values that do not fit the instruction's field width are rejected rather
/// than truncated.
pub fn encode_frame(command: &Command) -> Result<Bytes> {
    let mut buf = BytesMut::with_capacity(MAX_FRAME_SIZE);
    buf.put_u8(command.instruction.code());

    match command.instruction {
        Instruction::Relative => {
            for value in [command.r, command.g, command.b] {
                let value = i16::try_from(value).map_err(|_| {
                    RgbError::Protocol(format!("relative value out of range: {}", value))
                })?;
                buf.put_i16(value);
            }
        }
        Instruction::Absolute => {
            for value in [command.r, command.g, command.b] {
                let value = u8::try_from(value).map_err(|_| {
                    RgbError::Protocol(format!("absolute value out of range: {}", value))
                })?;
                buf.put_u8(value);
            }
        }
    }

    Ok(buf.freeze())
}

/// Write a command to a stream
pub fn write_frame<W: Write>(writer: &mut W, command: &Command) -> Result<()> {
    let bytes = encode_frame(command)?;
    writer.write_all(&bytes)?;
    writer.flush()?;
    Ok(())
}
