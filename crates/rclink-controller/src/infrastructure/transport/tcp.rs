//! TCP transport.
//!
//! Used for receivers that sit behind a Wi-Fi bridge or a serial-over-TCP
//! adapter, and for desktop simulators.  `PeerHandle::address` is a
//! `host:port` string.
//!
//! The stream is split on open.  The write half stays with the
//! [`TcpTransport`]; the read half goes to a small background task that
//! drains whatever the receiver echoes back and flips the liveness flag when
//! the peer closes or the socket errors.  That flag is what
//! [`Transport::is_alive`] reports, so the health probe never touches the
//! socket itself.

use std::io::ErrorKind;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use rclink_core::PeerHandle;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;
use tokio::task::JoinHandle;
use tracing::{debug, info, trace, warn};

use super::{ConnectError, Connector, Transport, TransportError};

/// Opens [`TcpTransport`]s.
#[derive(Debug, Clone, Copy, Default)]
pub struct TcpConnector;

impl TcpConnector {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Connector for TcpConnector {
    async fn open(&self, peer: &PeerHandle) -> Result<Box<dyn Transport>, ConnectError> {
        let stream = TcpStream::connect(peer.address())
            .await
            .map_err(|source| classify_connect_error(peer, source))?;

        // Commands are a handful of bytes each; waiting for Nagle only adds
        // latency to the steering.
        if let Err(e) = stream.set_nodelay(true) {
            warn!(peer = %peer, "could not disable Nagle: {e}");
        }

        info!(peer = %peer, "tcp link open");
        Ok(Box::new(TcpTransport::new(stream)))
    }
}

fn classify_connect_error(peer: &PeerHandle, source: std::io::Error) -> ConnectError {
    let address = peer.address().to_string();
    match source.kind() {
        ErrorKind::PermissionDenied => ConnectError::PermissionDenied { address },
        ErrorKind::ConnectionRefused => ConnectError::Rejected {
            address,
            reason: source.to_string(),
        },
        ErrorKind::TimedOut => ConnectError::Timeout { address },
        _ => ConnectError::Unreachable { address, source },
    }
}

/// One open TCP link.
pub struct TcpTransport {
    write_half: Option<OwnedWriteHalf>,
    alive: Arc<AtomicBool>,
    reader: Option<JoinHandle<()>>,
}

impl TcpTransport {
    /// Wraps a connected stream and starts the inbound drain task.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn new(stream: TcpStream) -> Self {
        let (read_half, write_half) = stream.into_split();
        let alive = Arc::new(AtomicBool::new(true));
        let reader = tokio::spawn(drain_inbound(read_half, Arc::clone(&alive)));
        Self {
            write_half: Some(write_half),
            alive,
            reader: Some(reader),
        }
    }
}

async fn drain_inbound(mut reader: OwnedReadHalf, alive: Arc<AtomicBool>) {
    let mut buf = [0u8; 256];
    loop {
        match reader.read(&mut buf).await {
            Ok(0) => {
                debug!("tcp peer closed the connection");
                break;
            }
            Ok(n) => {
                trace!(bytes = n, text = %String::from_utf8_lossy(&buf[..n]), "inbound");
            }
            Err(e) => {
                warn!("tcp read error: {e}");
                break;
            }
        }
    }
    alive.store(false, Ordering::Release);
}

#[async_trait]
impl Transport for TcpTransport {
    async fn write(&mut self, bytes: &[u8]) -> Result<(), TransportError> {
        let writer = self.write_half.as_mut().ok_or(TransportError::Closed)?;
        let result = async {
            writer.write_all(bytes).await?;
            writer.flush().await
        }
        .await;
        if let Err(e) = result {
            self.alive.store(false, Ordering::Release);
            return Err(e.into());
        }
        Ok(())
    }

    fn is_alive(&self) -> bool {
        self.write_half.is_some() && self.alive.load(Ordering::Acquire)
    }

    async fn close(&mut self) {
        self.alive.store(false, Ordering::Release);
        if let Some(reader) = self.reader.take() {
            reader.abort();
        }
        if let Some(mut writer) = self.write_half.take() {
            if let Err(e) = writer.shutdown().await {
                debug!("tcp shutdown: {e}");
            }
        }
    }
}

impl Drop for TcpTransport {
    fn drop(&mut self) {
        if let Some(reader) = self.reader.take() {
            reader.abort();
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
