//! Transport infrastructure: byte-stream links to one peer.
//!
//! A transport is split in two:
//!
//! - [`Connector`] knows how to *open* a link to a [`PeerHandle`].  It is
//!   long-lived and shared by every connection attempt.
//! - [`Transport`] is one open link.  It only exists after a successful
//!   open, so "write before connect" is unrepresentable.
//!
//! Transports never retry.  Every retry decision belongs to the link
//! manager, which is the only owner of a `Transport` value.
//!
//! # Implementations
//!
//! - **`tcp`** – `tokio::net::TcpStream`; for bridged receivers (ESP32 Wi-Fi
//!   modules, serial-over-TCP adapters, simulators).
//! - **`serial`** – serial-port profile devices exposed as a tty, e.g. an
//!   HC-05 bound to `/dev/rfcomm0`.
//! - **`mock`** – in-memory peer used by the tests.

use std::time::Duration;

use async_trait::async_trait;
use rclink_core::PeerHandle;
use thiserror::Error;

pub mod mock;
pub mod serial;
pub mod tcp;

/// Opening a link failed.
#[derive(Debug, Error)]
pub enum ConnectError {
    /// The peer could not be reached (out of range, powered off, bad address).
    #[error("peer {address} unreachable: {source}")]
    Unreachable {
        address: String,
        #[source]
        source: std::io::Error,
    },
    /// The peer (or the adapter in front of it) actively refused.
    #[error("peer {address} rejected the connection: {reason}")]
    Rejected { address: String, reason: String },
    /// The platform denied access to the device.  Never retried.
    #[error("permission denied opening {address}")]
    PermissionDenied { address: String },
    /// The open did not complete within the configured connect timeout.
    #[error("timed out connecting to {address}")]
    Timeout { address: String },
}

impl ConnectError {
    /// `true` when retrying cannot help until the operator intervenes.
    pub fn is_permission_denied(&self) -> bool {
        matches!(self, ConnectError::PermissionDenied { .. })
    }
}

/// A write on an open link failed.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("transport I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("transport is closed")]
    Closed,
    #[error("write did not complete within {0:?}")]
    Timeout(Duration),
}

/// Opens links to peers.
#[async_trait]
pub trait Connector: Send + Sync {
    /// Opens a link to `peer`.
    ///
    /// # Errors
    ///
    /// Returns [`ConnectError`] if the link cannot be established.
    async fn open(&self, peer: &PeerHandle) -> Result<Box<dyn Transport>, ConnectError>;
}

/// One open, bidirectional link.
#[async_trait]
pub trait Transport: Send {
    /// Writes all of `bytes` and flushes.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError`] on any I/O failure or after `close`.
    async fn write(&mut self, bytes: &[u8]) -> Result<(), TransportError>;

    /// Non-blocking liveness probe.  Not a protocol round-trip: it only
    /// reports whether the underlying connection still looks established.
    fn is_alive(&self) -> bool;

    /// Releases the link.  Safe to call any number of times.
    async fn close(&mut self);
}

// ── Tests ─────────────────────────────────────────────────────────────────────
