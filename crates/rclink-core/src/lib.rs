//! # rclink-core
//!
//! Shared library for RcLink containing the vehicle command protocol, the
//! domain values the controller reasons about, and the send-throttling
//! policy.
//!
//! This crate has zero dependencies on OS APIs, async runtimes, or sockets.
//! Everything here is a pure value or a pure function, so it is trivially
//! testable and can also be reused by peer-side tooling (simulators, bench
//! rigs) that needs to speak the same protocol.
//!
//! # Architecture overview
//!
//! RcLink drives a small vehicle over a point-to-point link (classically a
//! Bluetooth serial-port profile channel).  The receiver on the vehicle is a
//! microcontroller reading newline-terminated ASCII commands such as `F200`
//! ("forward at speed 200") or `S` ("stop").
//!
//! - **`protocol`** – The [`Command`] value object and its one canonical
//!   byte encoding, plus a strict decoder for the same format.
//!
//! - **`domain`** – [`ConnectionState`], [`PeerHandle`], [`Intent`],
//!   [`Speed`], and [`ControlMode`].
//!
//! - **`rate_limit`** – [`RateLimiter`], the lossy minimum-interval gate that
//!   protects the slow serial peer from command floods.

pub mod domain;
pub mod protocol;
pub mod rate_limit;

pub use domain::{
    link::{ConnectionState, PeerHandle},
    motion::{ControlMode, Direction, Intent, Speed},
};
pub use protocol::codec::{decode_command, encode, ProtocolError};
pub use protocol::command::{Command, Delivery};
pub use rate_limit::RateLimiter;
