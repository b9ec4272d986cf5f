//! Integration tests for the vehicle wire protocol through the public API.
//!
//! These pin the exact bytes of every row of the protocol table.  The
//! receiver firmware matches on these strings literally, so any drift here is
//! a breaking change on the vehicle side.

use rclink_core::{decode_command, encode, Command, ControlMode, Direction, Intent, Speed};

/// Every row of the protocol table, in table order.
fn protocol_table() -> Vec<(Command, &'static str)> {
    vec![
        (Command::for_intent(Intent::Forward, Speed::new(200)), "F200\n"),
        (Command::for_intent(Intent::Backward, Speed::new(0)), "B0\n"),
        (Command::for_intent(Intent::Left, Speed::new(255)), "L255\n"),
        (Command::for_intent(Intent::Right, Speed::new(9)), "R9\n"),
        (Command::Stop, "S\n"),
        (Command::SetMode(ControlMode::Bluetooth), "MB\n"),
        (Command::SetMode(ControlMode::Gesture), "MG\n"),
        (Command::SetMode(ControlMode::Webcam), "MW\n"),
    ]
}

#[test]
fn test_every_table_row_encodes_exactly() {
    for (command, wire) in protocol_table() {
        assert_eq!(
            String::from_utf8(encode(&command)).unwrap(),
            wire,
            "encoding of {command:?}"
        );
    }
}

#[test]
fn test_decoder_accepts_every_table_row() {
    for (command, wire) in protocol_table() {
        let (decoded, consumed) = decode_command(wire.as_bytes()).expect("valid row");
        assert_eq!(decoded, command);
        assert_eq!(consumed, wire.len());
    }
}

#[test]
fn test_stream_of_commands_decodes_in_order() {
    // Arrange: a session's worth of traffic in one buffer, as a peer would see it
    let mut buf: Vec<u8> = Vec::new();
    let sent = [
        Command::Stop,
        Command::for_intent(Intent::Forward, Speed::new(200)),
        Command::for_intent(Intent::Forward, Speed::new(50)),
        Command::Stop,
        Command::SetMode(ControlMode::Gesture),
    ];
    for command in &sent {
        buf.extend_from_slice(&encode(command));
    }

    // Act
    let mut received = Vec::new();
    while !buf.is_empty() {
        let (command, consumed) = decode_command(&buf).expect("well-formed stream");
        received.push(command);
        buf.drain(..consumed);
    }

    // Assert
    assert_eq!(received, sent);
}

#[test]
fn test_speed_from_slider_is_clamped_before_encoding() {
    let command = Command::Drive {
        direction: Direction::Forward,
        speed: Speed::clamped(1_000),
    };
    assert_eq!(encode(&command), b"F255\n");
}
