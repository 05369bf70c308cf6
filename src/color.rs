//! Color accumulation
//!
//! Folds a stream of commands into the color a display should show.
//! ABSOLUTE commands set a new base and discard accumulated deltas; RELATIVE
//! commands add to the base. Nothing is shown until the first ABSOLUTE.

use std::fmt;

use crate::protocol::{Command, CommandId, Instruction};

/// An unclamped RGB triple
///
/// Channel arithmetic wraps at the `i32` bounds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Rgb {
    pub r: i32,
    pub g: i32,
    pub b: i32,
}

impl Rgb {
    pub fn new(r: i32, g: i32, b: i32) -> Self {
        Self { r, g, b }
    }

    /// Pack into 0xAARRGGBB with full alpha, keeping the low byte of each channel
    pub fn to_argb(self) -> u32 {
        0xFF00_0000
            | ((self.r as u32 & 0xFF) << 16)
            | ((self.g as u32 & 0xFF) << 8)
            | (self.b as u32 & 0xFF)
    }
}

impl fmt::Display for Rgb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {}, {})", self.r, self.g, self.b)
    }
}

/// Running color state built from applied commands
#[derive(Debug, Clone, Default)]
pub struct ColorState {
    base: Option<Rgb>,
    delta: Rgb,
    relative_count: usize,
    last_command: Option<CommandId>,
}

impl ColorState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn apply(&mut self, command: &Command) {
        match command.instruction {
            Instruction::Absolute => {
                self.base = Some(Rgb::new(command.r, command.g, command.b));
                self.delta = Rgb::default();
                self.relative_count = 0;
            }
            Instruction::Relative => {
                // Long RELATIVE runs wrap like the packed channels do
                self.delta.r = self.delta.r.wrapping_add(command.r);
                self.delta.g = self.delta.g.wrapping_add(command.g);
                self.delta.b = self.delta.b.wrapping_add(command.b);
                self.relative_count += 1;
            }
        }
        self.last_command = Some(command.id);
    }

    /// Base plus accumulated deltas, or None before the first ABSOLUTE
    pub fn effective(&self) -> Option<Rgb> {
        self.base.map(|base| {
            Rgb::new(
                base.r.wrapping_add(self.delta.r),
                base.g.wrapping_add(self.delta.g),
                base.b.wrapping_add(self.delta.b),
            )
        })
    }

    /// RELATIVE commands applied since the last ABSOLUTE
    pub fn relative_count(&self) -> usize {
        self.relative_count
    }

    /// Cursor to resume from when catching up on missed commands
    pub fn last_command_id(&self) -> Option<CommandId> {
        self.last_command
    }
}
