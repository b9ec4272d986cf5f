//! Vehicle command protocol: the [`Command`] value object and its codec.
//!
//! Wire format is ASCII, newline-delimited and case-sensitive:
//!
//! | Command        | Encoding     |
//! |----------------|--------------|
//! | Forward        | `F<speed>\n` |
//! | Backward       | `B<speed>\n` |
//! | Left           | `L<speed>\n` |
//! | Right          | `R<speed>\n` |
//! | Stop           | `S\n`        |
//! | Mode→Bluetooth | `MB\n`       |
//! | Mode→Gesture   | `MG\n`       |
//! | Mode→Webcam    | `MW\n`       |
//!
//! `<speed>` is the unpadded decimal value `0`–`255`.

pub mod codec;
pub mod command;

pub use codec::{decode_command, encode, ProtocolError, MAX_COMMAND_LEN};
pub use command::{Command, Delivery};
