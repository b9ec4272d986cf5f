//! Infrastructure layer for the controller.
//!
//! Contains the adapters the application layer is written against:
//!
//! - [`transport`] – TCP, serial, and in-memory links to the receiver.
//! - [`alternate_input`] – gesture and webcam input subsystems.
//! - [`storage`] – TOML configuration.
//! - [`ui_bridge`] – presentation DTOs and the command envelope.
//! - [`console`] – the line-oriented operator console.

pub mod alternate_input;
pub mod console;
pub mod storage;
pub mod transport;
pub mod ui_bridge;
