//! Domain values for RcLink.
//!
//! - **`link`** – The connection lifecycle as observed from outside the link
//!   manager ([`link::ConnectionState`]) and the opaque peer identifier handed
//!   in by the device-selection layer ([`link::PeerHandle`]).
//! - **`motion`** – What the operator is asking the vehicle to do: the active
//!   [`motion::Intent`], the [`motion::Speed`] it is applied at, and which
//!   [`motion::ControlMode`] is driving input.

pub mod link;
pub mod motion;
