//! rclink-controller library entry point.
//!
//! Re-exports all public modules so that integration tests in `tests/`
//! and the binary entry point in `main.rs` share the same module tree.
//!
//! # What does the controller do?
//!
//! The controller is the operator-side half of RcLink.  It owns one
//! persistent link to the vehicle's receiver and turns operator intents
//! (press *forward*, drag the speed slider, switch to gesture mode) into the
//! newline-terminated ASCII commands defined in `rclink-core`.
//!
//! 1. The presentation layer hands in a [`PeerHandle`](rclink_core::PeerHandle)
//!    chosen from the platform's paired-device list.
//! 2. The [`LinkManager`](application::link_manager::LinkManager) opens the
//!    transport, sends a safety `Stop`, and probes liveness every two seconds.
//! 3. When the link drops it retries a bounded number of times, then parks in
//!    `Failed` until the operator asks again.
//! 4. The [`ControlSession`](application::control_session::ControlSession)
//!    tracks mode, intent, and speed, and decides what goes on the wire.

/// Application layer: the link state machine and the control session.
pub mod application;

/// Infrastructure layer: transports, alternate-input subsystems, storage,
/// and the presentation bridge.
pub mod infrastructure;
