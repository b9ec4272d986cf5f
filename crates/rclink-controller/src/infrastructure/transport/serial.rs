//! Serial transport for serial-port-profile receivers.
//!
//! Classic HC-05/HC-06 style modules show up as a tty once bound
//! (`/dev/rfcomm0` on Linux, `/dev/cu.HC-05-*` on macOS, `COMn` on Windows),
//! so `PeerHandle::address` is a device path and the link is an 8N1 serial
//! line.
//!
//! `serialport` is blocking.  Every call that can block runs on
//! `spawn_blocking`; the port sits behind a `std::sync::Mutex` so the
//! liveness probe can `try_lock` without ever waiting on an in-flight write.

use std::io::{ErrorKind as IoErrorKind, Write};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, TryLockError};
use std::time::Duration;

use async_trait::async_trait;
use rclink_core::PeerHandle;
use serialport::{DataBits, FlowControl, Parity, SerialPort, StopBits};
use tracing::{debug, info};

use super::{ConnectError, Connector, Transport, TransportError};

/// Baud rate of factory-configured HC-05 modules.
pub const DEFAULT_BAUD_RATE: u32 = 9600;

const PORT_TIMEOUT: Duration = Duration::from_millis(500);

type SharedPort = Arc<Mutex<Option<Box<dyn SerialPort>>>>;

/// Opens [`SerialTransport`]s at a fixed baud rate.
#[derive(Debug, Clone, Copy)]
pub struct SerialConnector {
    baud_rate: u32,
}

impl SerialConnector {
    pub fn new(baud_rate: u32) -> Self {
        Self { baud_rate }
    }

    pub fn baud_rate(&self) -> u32 {
        self.baud_rate
    }
}

impl Default for SerialConnector {
    fn default() -> Self {
        Self::new(DEFAULT_BAUD_RATE)
    }
}

#[async_trait]
impl Connector for SerialConnector {
    async fn open(&self, peer: &PeerHandle) -> Result<Box<dyn Transport>, ConnectError> {
        let path = peer.address().to_string();
        let baud_rate = self.baud_rate;

        let opened = tokio::task::spawn_blocking(move || {
            serialport::new(&path, baud_rate)
                .data_bits(DataBits::Eight)
                .parity(Parity::None)
                .stop_bits(StopBits::One)
                .flow_control(FlowControl::None)
                .timeout(PORT_TIMEOUT)
                .open()
        })
        .await
        .map_err(|e| ConnectError::Unreachable {
            address: peer.address().to_string(),
            source: std::io::Error::other(e.to_string()),
        })?;

        let port = opened.map_err(|e| classify_open_error(peer, e))?;
        info!(peer = %peer, baud_rate, "serial link open");
        Ok(Box::new(SerialTransport::new(port)))
    }
}

fn classify_open_error(peer: &PeerHandle, err: serialport::Error) -> ConnectError {
    let address = peer.address().to_string();
    match err.kind() {
        serialport::ErrorKind::Io(IoErrorKind::PermissionDenied) => {
            ConnectError::PermissionDenied { address }
        }
        serialport::ErrorKind::Io(IoErrorKind::TimedOut) => ConnectError::Timeout { address },
        serialport::ErrorKind::NoDevice => ConnectError::Unreachable {
            address,
            source: std::io::Error::new(IoErrorKind::NotFound, err.description),
        },
        serialport::ErrorKind::Io(kind) => ConnectError::Unreachable {
            address,
            source: std::io::Error::new(kind, err.description),
        },
        _ => ConnectError::Rejected {
            address,
            reason: err.description,
        },
    }
}

/// One open serial link.
pub struct SerialTransport {
    port: SharedPort,
    alive: Arc<AtomicBool>,
}

impl SerialTransport {
    pub fn new(port: Box<dyn SerialPort>) -> Self {
        Self {
            port: Arc::new(Mutex::new(Some(port))),
            alive: Arc::new(AtomicBool::new(true)),
        }
    }
}

#[async_trait]
impl Transport for SerialTransport {
    async fn write(&mut self, bytes: &[u8]) -> Result<(), TransportError> {
        let port = Arc::clone(&self.port);
        let bytes = bytes.to_vec();

        let result = tokio::task::spawn_blocking(move || -> Result<(), TransportError> {
            let mut guard = port
                .lock()
                .map_err(|_| std::io::Error::other("serial port lock poisoned"))?;
            let port = guard.as_mut().ok_or(TransportError::Closed)?;
            port.write_all(&bytes)?;
            port.flush()?;
            Ok(())
        })
        .await
        .unwrap_or_else(|e| Err(std::io::Error::other(e.to_string()).into()));

        if result.is_err() {
            self.alive.store(false, Ordering::Release);
        }
        result
    }

    fn is_alive(&self) -> bool {
        if !self.alive.load(Ordering::Acquire) {
            return false;
        }
        match self.port.try_lock() {
            // A vanished RFCOMM channel makes the status ioctl fail.
            Ok(guard) => guard.as_ref().is_some_and(|port| port.bytes_to_read().is_ok()),
            // A write is in flight; it will report its own failure.
            Err(TryLockError::WouldBlock) => true,
            Err(TryLockError::Poisoned(_)) => false,
        }
    }

    async fn close(&mut self) {
        self.alive.store(false, Ordering::Release);
        let port = Arc::clone(&self.port);
        let closed = tokio::task::spawn_blocking(move || {
            let taken = match port.lock() {
                Ok(mut guard) => guard.take().is_some(),
                Err(_) => false,
            };
            taken
        })
        .await
        .unwrap_or(false);
        if closed {
            debug!("serial link closed");
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
