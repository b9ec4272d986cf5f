//! ASCII codec for RcLink vehicle commands.
//!
//! Wire format:
//! ```text
//! <tag>[<payload>]\n
//! ```
//! `tag` is one of `F B L R S M`.  Directional tags carry an unpadded
//! decimal speed, `M` carries a mode letter, `S` carries nothing.

use thiserror::Error;

use crate::domain::motion::{ControlMode, Direction, Speed};
use crate::protocol::command::Command;

/// Longest valid encoding, `F255\n`.
pub const MAX_COMMAND_LEN: usize = 5;

const TERMINATOR: u8 = b'\n';

/// Errors that can occur while decoding a command.
///
/// Encoding is total and never fails.
#[derive(Debug, Error, PartialEq)]
pub enum ProtocolError {
    /// No terminator yet and the buffer could still grow into a valid command.
    #[error("insufficient data: {available} byte(s) buffered without a terminator")]
    InsufficientData { available: usize },

    /// More than [`MAX_COMMAND_LEN`] bytes arrived without a terminator.
    #[error("missing terminator within 5 bytes")]
    MissingTerminator,

    /// The first byte is not a known command tag.
    #[error("unknown command tag: 0x{0:02X}")]
    UnknownTag(u8),

    /// A directional command's payload is not an unpadded decimal in `0..=255`.
    #[error("invalid speed payload: {0:?}")]
    InvalidSpeed(String),

    /// The mode-change letter is not `B`, `G`, or `W`.
    #[error("unknown mode letter: 0x{0:02X}")]
    UnknownMode(u8),

    /// The line has the right tag but the wrong shape (e.g. `S5`, `M`).
    #[error("malformed command: {0:?}")]
    Malformed(String),
}

// ── Public API ────────────────────────────────────────────────────────────────

/// Encodes a [`Command`] into its canonical newline-terminated bytes.
///
/// # Examples
///
/// ```rust
/// use rclink_core::{encode, Command, Intent, Speed};
///
/// let forward = Command::for_intent(Intent::Forward, Speed::new(200));
/// assert_eq!(encode(&forward), b"F200\n");
/// assert_eq!(encode(&Command::Stop), b"S\n");
/// ```
pub fn encode(command: &Command) -> Vec<u8> {
    let mut buf = Vec::with_capacity(MAX_COMMAND_LEN);
    match command {
        Command::Drive { direction, speed } => {
            buf.push(direction.tag() as u8);
            buf.extend_from_slice(speed.value().to_string().as_bytes());
        }
        Command::Stop => buf.push(b'S'),
        Command::SetMode(mode) => {
            buf.push(b'M');
            buf.push(mode.letter() as u8);
        }
    }
    buf.push(TERMINATOR);
    buf
}

/// Decodes one command from the front of `buf`.
///
/// Returns the command and the number of bytes consumed (including the
/// terminator), so a caller holding a stream buffer can `drain(..consumed)`
/// and call again.
///
/// # Errors
///
/// - [`ProtocolError::InsufficientData`] when no terminator has arrived yet
///   and more bytes could still complete a command.
/// - [`ProtocolError::MissingTerminator`] when the buffer already exceeds the
///   longest valid command without a terminator.
/// - The remaining variants describe a complete but invalid line.
pub fn decode_command(buf: &[u8]) -> Result<(Command, usize), ProtocolError> {
    let Some(end) = buf.iter().position(|&b| b == TERMINATOR) else {
        if buf.len() >= MAX_COMMAND_LEN {
            return Err(ProtocolError::MissingTerminator);
        }
        return Err(ProtocolError::InsufficientData {
            available: buf.len(),
        });
    };

    let line = &buf[..end];
    let command = decode_line(line)?;
    Ok((command, end + 1))
}

// ── Line decoding ─────────────────────────────────────────────────────────────

fn decode_line(line: &[u8]) -> Result<Command, ProtocolError> {
    let (&tag, payload) = line
        .split_first()
        .ok_or_else(|| ProtocolError::Malformed(String::new()))?;

    match tag {
        b'S' if payload.is_empty() => Ok(Command::Stop),
        b'S' => Err(ProtocolError::Malformed(lossy(line))),
        b'M' => match payload {
            [letter] => ControlMode::from_letter(*letter as char)
                .map(Command::SetMode)
                .ok_or(ProtocolError::UnknownMode(*letter)),
            _ => Err(ProtocolError::Malformed(lossy(line))),
        },
        _ => {
            let direction =
                Direction::from_tag(tag as char).ok_or(ProtocolError::UnknownTag(tag))?;
            let speed = decode_speed(payload)?;
            Ok(Command::Drive { direction, speed })
        }
    }
}

fn decode_speed(payload: &[u8]) -> Result<Speed, ProtocolError> {
    let invalid = || ProtocolError::InvalidSpeed(lossy(payload));

    // Unpadded decimal: non-empty, digits only, no leading zero except "0".
    if payload.is_empty() || !payload.iter().all(u8::is_ascii_digit) {
        return Err(invalid());
    }
    if payload.len() > 1 && payload[0] == b'0' {
        return Err(invalid());
    }

    let text = std::str::from_utf8(payload).map_err(|_| invalid())?;
    text.parse::<u8>().map(Speed::new).map_err(|_| invalid())
}

fn lossy(bytes: &[u8]) -> String {
    String::from_utf8_lossy(bytes).into_owned()
}

// ── Tests ─────────────────────────────────────────────────────────────────────
