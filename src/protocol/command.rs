//! Command definitions
//!
//! Represents color commands received from the server.

use std::fmt;

use uuid::Uuid;

/// Instruction codes as they appear on the wire
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Instruction {
    /// Add a signed delta to the accumulated color
    Relative = 0x01,

    /// Replace the displayed color outright
    Absolute = 0x02,
}

impl Instruction {
    /// Map a wire byte to an instruction, if it is a known code
    pub fn from_code(code: u8) -> Option<Self> {
        match code {
            0x01 => Some(Instruction::Relative),
            0x02 => Some(Instruction::Absolute),
            _ => None,
        }
    }

    pub fn code(self) -> u8 {
        self as u8
    }
}

impl fmt::Display for Instruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Instruction::Relative => f.write_str("RELATIVE"),
            Instruction::Absolute => f.write_str("ABSOLUTE"),
        }
    }
}

/// Opaque, globally unique identifier assigned to a command when it is decoded
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CommandId(Uuid);

impl CommandId {
    /// Generate a fresh random id
    pub fn generate() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl From<Uuid> for CommandId {
    fn from(uuid: Uuid) -> Self {
        Self(uuid)
    }
}

impl std::str::FromStr for CommandId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Uuid::parse_str(s).map(Self)
    }
}

impl fmt::Display for CommandId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

/// A decoded command
///
/// Immutable once created. ABSOLUTE values are in 0..=255, RELATIVE values
/// are signed 16-bit deltas.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Command {
    pub id: CommandId,
    pub instruction: Instruction,
    pub r: i32,
    pub g: i32,
    pub b: i32,
}

impl Command {
    /// Create a command with a freshly generated id
    pub fn new(instruction: Instruction, r: i32, g: i32, b: i32) -> Self {
        Self::with_id(CommandId::generate(), instruction, r, g, b)
    }

    pub fn with_id(id: CommandId, instruction: Instruction, r: i32, g: i32, b: i32) -> Self {
        Self {
            id,
            instruction,
            r,
            g,
            b,
        }
    }

    pub fn absolute(r: u8, g: u8, b: u8) -> Self {
        Self::new(Instruction::Absolute, r.into(), g.into(), b.into())
    }

    pub fn relative(r: i16, g: i16, b: i16) -> Self {
        Self::new(Instruction::Relative, r.into(), g.into(), b.into())
    }

    /// Same instruction and color values, ignoring the id
    pub fn same_values(&self, other: &Command) -> bool {
        self.instruction == other.instruction
            && self.r == other.r
            && self.g == other.g
            && self.b == other.b
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({}, {}, {})", self.instruction, self.r, self.g, self.b)
    }
}
