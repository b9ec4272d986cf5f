//! Application layer for the controller.
//!
//! - [`link_manager`] – the single owner of the link: connect, health
//!   probing, bounded reconnection, throttled sends.
//! - [`control_session`] – operator state (mode, intent, speed) and the
//!   rules that turn it into commands.
//! - [`mode_switch`] – the capability interface of the alternate-input
//!   subsystems and the one place that starts and stops them.

pub mod control_session;
pub mod link_manager;
pub mod mode_switch;
