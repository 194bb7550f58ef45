//! Line-oriented command intake.
//!
//! Bytes are accumulated until `\r` or `\n`. A completed line is trimmed
//! and compared, ignoring ASCII case, against [`TOGGLE_COMMAND`]. Anything
//! else is dropped without a reply.

/// The only recognised command.
pub const TOGGLE_COMMAND: &[u8] = b"go";

/// Longest line kept in the buffer; further bytes are dropped until the
/// terminator arrives.
pub const MAX_LINE_LEN: usize = 64;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    ToggleValve,
}

#[derive(Debug, Default)]
pub struct CommandListener {
    line: Vec<u8>,
}

impl CommandListener {
    pub fn new() -> Self {
        Self {
            line: Vec::with_capacity(MAX_LINE_LEN),
        }
    }

    /// Feed one byte. Returns a command when this byte completed a
    /// recognised line.
    pub fn push(&mut self, byte: u8) -> Option<Command> {
        match byte {
            b'\r' | b'\n' => {
                let command = parse_line(&self.line);
                if command.is_none() && !self.line.trim_ascii().is_empty() {
                    tracing::debug!(
                        line = %String::from_utf8_lossy(&self.line),
                        "ignoring unknown command"
                    );
                }
                self.line.clear();
                command
            }
            _ => {
                if self.line.len() < MAX_LINE_LEN {
                    self.line.push(byte);
                }
                None
            }
        }
    }

    /// Bytes of the line currently being accumulated.
    pub fn pending(&self) -> &[u8] {
        &self.line
    }
}

fn parse_line(line: &[u8]) -> Option<Command> {
    if line.trim_ascii().eq_ignore_ascii_case(TOGGLE_COMMAND) {
        Some(Command::ToggleValve)
    } else {
        None
    }
}

// ===========================================================================
// Tests
// ===========================================================================
