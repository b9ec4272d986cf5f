//! Line-oriented operator console.
//!
//! The `rclink` binary reads one command per line from stdin.  This module
//! only parses; executing a command is the job of
//! [`ui_bridge::execute`](crate::infrastructure::ui_bridge::execute).
//!
//! ```text
//! connect [ADDRESS]        open the link (configured peer if no address)
//! f | forward              drive forward
//! b | backward             drive backward
//! l | left                 turn left
//! r | right                turn right
//! s | stop                 stop
//! speed N                  set speed, clamped to 0..=255
//! mode bluetooth|gesture|webcam
//! status                   print the session snapshot
//! help                     print this list
//! quit | exit              stop the vehicle, close the link, exit
//! ```

use rclink_core::{ControlMode, Intent};
use thiserror::Error;

/// Command summary printed by `help`.
pub const HELP: &str = "\
commands:
  connect [ADDRESS]              open the link
  f|forward  b|backward  l|left  r|right  s|stop
  speed N                        set speed (0-255)
  mode bluetooth|gesture|webcam  switch control mode
  status                         show the session snapshot
  help                           show this list
  quit                           stop, disconnect, exit";

/// One parsed console line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConsoleCommand {
    /// Connect to `address`, or to the configured peer when `None`.
    Connect { address: Option<String> },
    Intent(Intent),
    /// Raw requested speed; clamping happens in the session.
    Speed(i64),
    Mode(ControlMode),
    Status,
    Help,
    Quit,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ParseError {
    #[error("unknown command {0:?}; type `help` for a list")]
    UnknownCommand(String),
    #[error("`{0}` needs an argument")]
    MissingArgument(&'static str),
    #[error("not a number: {0:?}")]
    InvalidSpeed(String),
    #[error("unknown mode {0:?}; expected bluetooth, gesture, or webcam")]
    UnknownMode(String),
}

/// Parses one line.  Blank lines yield `Ok(None)`.
///
/// # Errors
///
/// Returns [`ParseError`] for anything that is not a known command with
/// valid arguments.
pub fn parse_line(line: &str) -> Result<Option<ConsoleCommand>, ParseError> {
    let mut words = line.split_whitespace();
    let Some(word) = words.next() else {
        return Ok(None);
    };

    let command = match word.to_ascii_lowercase().as_str() {
        "connect" | "c" => ConsoleCommand::Connect {
            address: words.next().map(str::to_string),
        },
        "f" | "forward" => ConsoleCommand::Intent(Intent::Forward),
        "b" | "backward" | "back" => ConsoleCommand::Intent(Intent::Backward),
        "l" | "left" => ConsoleCommand::Intent(Intent::Left),
        "r" | "right" => ConsoleCommand::Intent(Intent::Right),
        "s" | "stop" => ConsoleCommand::Intent(Intent::Stop),
        "speed" => {
            let arg = words.next().ok_or(ParseError::MissingArgument("speed"))?;
            let value = arg
                .parse::<i64>()
                .map_err(|_| ParseError::InvalidSpeed(arg.to_string()))?;
            ConsoleCommand::Speed(value)
        }
        "mode" | "m" => {
            let arg = words.next().ok_or(ParseError::MissingArgument("mode"))?;
            ConsoleCommand::Mode(parse_mode(arg)?)
        }
        "status" => ConsoleCommand::Status,
        "help" | "?" => ConsoleCommand::Help,
        "quit" | "exit" | "q" => ConsoleCommand::Quit,
        _ => return Err(ParseError::UnknownCommand(word.to_string())),
    };
    Ok(Some(command))
}

fn parse_mode(arg: &str) -> Result<ControlMode, ParseError> {
    let lower = arg.to_ascii_lowercase();
    ControlMode::ALL
        .into_iter()
        .find(|mode| mode.to_string() == lower)
        .or_else(|| {
            let mut chars = lower.chars();
            match (chars.next(), chars.next()) {
                (Some(c), None) => ControlMode::from_letter(c.to_ascii_uppercase()),
                _ => None,
            }
        })
        .ok_or_else(|| ParseError::UnknownMode(arg.to_string()))
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_blank_line_is_ignored() {
        assert_eq!(parse_line("   "), Ok(None));
    }

    #[test]
    fn test_direction_shorthands() {
        assert_eq!(
            parse_line("f"),
            Ok(Some(ConsoleCommand::Intent(Intent::Forward)))
        );
        assert_eq!(
            parse_line("BACKWARD"),
            Ok(Some(ConsoleCommand::Intent(Intent::Backward)))
        );
        assert_eq!(
            parse_line(" s "),
            Ok(Some(ConsoleCommand::Intent(Intent::Stop)))
        );
    }

    #[test]
    fn test_speed_accepts_out_of_range_values_for_clamping() {
        assert_eq!(parse_line("speed 999"), Ok(Some(ConsoleCommand::Speed(999))));
        assert_eq!(parse_line("speed -5"), Ok(Some(ConsoleCommand::Speed(-5))));
    }

    #[test]
    fn test_speed_requires_a_number() {
        assert_eq!(
            parse_line("speed"),
            Err(ParseError::MissingArgument("speed"))
        );
        assert_eq!(
            parse_line("speed fast"),
            Err(ParseError::InvalidSpeed("fast".to_string()))
        );
    }

    #[test]
    fn test_mode_by_name_or_letter() {
        assert_eq!(
            parse_line("mode gesture"),
            Ok(Some(ConsoleCommand::Mode(ControlMode::Gesture)))
        );
        assert_eq!(
            parse_line("mode w"),
            Ok(Some(ConsoleCommand::Mode(ControlMode::Webcam)))
        );
        assert!(matches!(
            parse_line("mode radar"),
            Err(ParseError::UnknownMode(_))
        ));
    }

    #[test]
    fn test_connect_with_and_without_address() {
        assert_eq!(
            parse_line("connect"),
            Ok(Some(ConsoleCommand::Connect { address: None }))
        );
        assert_eq!(
            parse_line("connect /dev/rfcomm0"),
            Ok(Some(ConsoleCommand::Connect {
                address: Some("/dev/rfcomm0".to_string())
            }))
        );
    }

    #[test]
    fn test_unknown_command_is_reported() {
        assert_eq!(
            parse_line("fly"),
            Err(ParseError::UnknownCommand("fly".to_string()))
        );
    }
}
