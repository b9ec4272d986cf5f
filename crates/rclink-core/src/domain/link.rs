//! Connection lifecycle values.
//!
//! ```text
//! Disconnected ──► Connecting ──► Connected ──► Disconnected (teardown)
//!      ▲               │              │
//!      │            failure        probe/write failure
//!      │               ▼              ▼
//!      └──────── Reconnecting(n) ◄────┘
//!                      │
//!                 n exhausted
//!                      ▼
//!                   Failed
//! ```
//!
//! Exactly one [`ConnectionState`] exists per link manager.  It is only ever
//! mutated by the link manager's serialized transition logic; everyone else
//! sees copies.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Current state of the link to the peer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ConnectionState {
    /// No transport is open and no attempt is in progress.
    #[default]
    Disconnected,
    /// A transport open is in flight.
    Connecting,
    /// The transport is open; commands flow and the health loop is armed.
    Connected,
    /// The reconnection policy fired; carries the 1-based attempt number.
    Reconnecting(u8),
    /// The reconnection budget is spent (or the platform denied access).
    /// Only an explicit user connect leaves this state.
    Failed,
}

impl ConnectionState {
    /// Returns `true` only for [`ConnectionState::Connected`].
    pub fn is_connected(self) -> bool {
        matches!(self, ConnectionState::Connected)
    }

    /// Returns `true` while a connect request would be ignored.
    pub fn is_busy(self) -> bool {
        matches!(self, ConnectionState::Connecting | ConnectionState::Connected)
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConnectionState::Disconnected => f.write_str("disconnected"),
            ConnectionState::Connecting => f.write_str("connecting"),
            ConnectionState::Connected => f.write_str("connected"),
            ConnectionState::Reconnecting(n) => write!(f, "reconnecting ({n})"),
            ConnectionState::Failed => f.write_str("failed"),
        }
    }
}

/// Opaque identifier of the remote receiver plus a display name.
///
/// The address is interpreted only by the transport that opens it: a
/// `host:port` pair for TCP, a device path such as `/dev/rfcomm0` for a
/// serial-port profile tty.  A handle is immutable once a connection begins.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PeerHandle {
    address: String,
    name: String,
}

impl PeerHandle {
    pub fn new(address: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            address: address.into(),
            name: name.into(),
        }
    }

    pub fn address(&self) -> &str {
        &self.address
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

impl fmt::Display for PeerHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.name, self.address)
    }
}
