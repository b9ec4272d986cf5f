//! In-memory transport for tests.
//!
//! # Why a mock peer?
//!
//! The link manager's interesting behaviour is all about failure: opens that
//! do not complete, links that die between health probes, writes that error
//! halfway through a drive.  None of that is reproducible with a real radio
//! on a test machine.
//!
//! A [`MockPeer`] is a scriptable stand-in for the vehicle receiver.  Tests
//! keep one handle and give the link manager a [`MockConnector`] built from
//! it; everything the manager writes is recorded on the peer, and every
//! failure knob on the peer affects the transports it hands out.
//!
//! # Usage in tests
//!
//! ```ignore
//! let peer = MockPeer::new();
//! let link = LinkManager::spawn(Arc::new(peer.connector()), LinkConfig::default());
//!
//! link.connect(PeerHandle::new("mock", "rx")).await?;
//! // ... let the actor run ...
//! assert_eq!(peer.written(), vec!["S\n"]);
//!
//! peer.drop_link();            // next health probe fails
//! peer.fail_next_opens(2);     // and the first two reconnects fail
//! ```

use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use async_trait::async_trait;
use rclink_core::{decode_command, Command, PeerHandle};
use tracing::debug;

use super::{ConnectError, Connector, Transport, TransportError};

#[derive(Debug, Default)]
struct PeerState {
    writes: Vec<Vec<u8>>,
    opens: u32,
    closes: u32,
    fail_next_opens: u32,
    refuse_all_opens: bool,
    deny_permission: bool,
    connect_delay: Duration,
    /// Generation of the currently live link; bumped by `drop_link`.
    link_generation: u64,
    fail_writes: bool,
}

/// Shared, scriptable receiver.  Cloning yields another handle to the same
/// peer.
#[derive(Debug, Clone, Default)]
pub struct MockPeer {
    state: Arc<Mutex<PeerState>>,
}

impl MockPeer {
    pub fn new() -> Self {
        Self::default()
    }

    /// A connector whose transports all talk to this peer.
    pub fn connector(&self) -> MockConnector {
        MockConnector { peer: self.clone() }
    }

    fn lock(&self) -> MutexGuard<'_, PeerState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    // ── Failure knobs ─────────────────────────────────────────────────────────

    /// The next `n` opens fail with `ConnectError::Unreachable`.
    pub fn fail_next_opens(&self, n: u32) {
        self.lock().fail_next_opens = n;
    }

    /// While set, every open fails with `ConnectError::Unreachable`.
    pub fn refuse_all_opens(&self, refuse: bool) {
        self.lock().refuse_all_opens = refuse;
    }

    /// Every open fails with `ConnectError::PermissionDenied`.
    pub fn deny_permission(&self, deny: bool) {
        self.lock().deny_permission = deny;
    }

    /// Opens take `delay` before completing.
    pub fn set_connect_delay(&self, delay: Duration) {
        self.lock().connect_delay = delay;
    }

    /// Kills every transport handed out so far.  Later opens get a fresh,
    /// live link.
    pub fn drop_link(&self) {
        self.lock().link_generation += 1;
    }

    /// While set, writes fail with a broken-pipe error and kill the link.
    pub fn fail_writes(&self, fail: bool) {
        self.lock().fail_writes = fail;
    }

    // ── Observations ──────────────────────────────────────────────────────────

    pub fn open_count(&self) -> u32 {
        self.lock().opens
    }

    pub fn close_count(&self) -> u32 {
        self.lock().closes
    }

    /// Every successful write, in order, as text.
    pub fn written(&self) -> Vec<String> {
        self.lock()
            .writes
            .iter()
            .map(|w| String::from_utf8_lossy(w).into_owned())
            .collect()
    }

    /// Every successful write decoded back into commands.
    ///
    /// Writes that do not decode are skipped; the link manager only ever
    /// writes encoder output.
    pub fn commands(&self) -> Vec<Command> {
        self.lock()
            .writes
            .iter()
            .filter_map(|w| decode_command(w).ok().map(|(command, _)| command))
            .collect()
    }

    pub fn clear_written(&self) {
        self.lock().writes.clear();
    }
}

/// [`Connector`] backed by a [`MockPeer`].
#[derive(Debug, Clone)]
pub struct MockConnector {
    peer: MockPeer,
}

#[async_trait]
impl Connector for MockConnector {
    async fn open(&self, peer: &PeerHandle) -> Result<Box<dyn Transport>, ConnectError> {
        let delay = {
            let mut state = self.peer.lock();
            state.opens += 1;
            state.connect_delay
        };
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }

        let mut state = self.peer.lock();
        let address = peer.address().to_string();
        if state.deny_permission {
            return Err(ConnectError::PermissionDenied { address });
        }
        if state.refuse_all_opens || state.fail_next_opens > 0 {
            state.fail_next_opens = state.fail_next_opens.saturating_sub(1);
            return Err(ConnectError::Unreachable {
                address,
                source: std::io::Error::new(std::io::ErrorKind::NotConnected, "mock peer offline"),
            });
        }

        debug!(peer = %peer, open = state.opens, "mock link open");
        Ok(Box::new(MockTransport {
            peer: self.peer.clone(),
            generation: state.link_generation,
            open: true,
        }))
    }
}

/// One link to a [`MockPeer`].
#[derive(Debug)]
pub struct MockTransport {
    peer: MockPeer,
    generation: u64,
    open: bool,
}

#[async_trait]
impl Transport for MockTransport {
    async fn write(&mut self, bytes: &[u8]) -> Result<(), TransportError> {
        if !self.open {
            return Err(TransportError::Closed);
        }
        let mut state = self.peer.lock();
        if state.link_generation != self.generation {
            return Err(std::io::Error::new(std::io::ErrorKind::NotConnected, "mock link dropped").into());
        }
        if state.fail_writes {
            state.link_generation += 1;
            return Err(std::io::Error::new(std::io::ErrorKind::BrokenPipe, "mock write failure").into());
        }
        state.writes.push(bytes.to_vec());
        Ok(())
    }

    fn is_alive(&self) -> bool {
        self.open && self.peer.lock().link_generation == self.generation
    }

    async fn close(&mut self) {
        if self.open {
            self.open = false;
            self.peer.lock().closes += 1;
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn handle() -> PeerHandle {
        PeerHandle::new("mock:0", "mock-rx")
    }

    #[tokio::test]
    async fn test_writes_are_recorded_in_order() {
        let peer = MockPeer::new();
        let mut link = peer.connector().open(&handle()).await.unwrap();

        link.write(b"S\n").await.unwrap();
        link.write(b"F200\n").await.unwrap();

        assert_eq!(peer.written(), vec!["S\n", "F200\n"]);
        assert_eq!(peer.commands().len(), 2);
    }

    #[tokio::test]
    async fn test_drop_link_kills_existing_transports_only() {
        // Arrange
        let peer = MockPeer::new();
        let old = peer.connector().open(&handle()).await.unwrap();

        // Act
        peer.drop_link();
        let fresh = peer.connector().open(&handle()).await.unwrap();

        // Assert
        assert!(!old.is_alive());
        assert!(fresh.is_alive());
        assert_eq!(peer.open_count(), 2);
    }

    #[tokio::test]
    async fn test_fail_next_opens_counts_down() {
        let peer = MockPeer::new();
        peer.fail_next_opens(1);

        assert!(peer.connector().open(&handle()).await.is_err());
        assert!(peer.connector().open(&handle()).await.is_ok());
    }

    #[tokio::test]
    async fn test_denied_permission_is_reported() {
        let peer = MockPeer::new();
        peer.deny_permission(true);

        let err = peer.connector().open(&handle()).await.err().unwrap();

        assert!(err.is_permission_denied());
    }

    #[tokio::test]
    async fn test_write_failure_kills_the_link() {
        let peer = MockPeer::new();
        let mut link = peer.connector().open(&handle()).await.unwrap();
        peer.fail_writes(true);

        assert!(link.write(b"S\n").await.is_err());
        assert!(!link.is_alive());
        assert!(peer.written().is_empty());
    }

    #[tokio::test]
    async fn test_close_counts_once() {
        let peer = MockPeer::new();
        let mut link = peer.connector().open(&handle()).await.unwrap();

        link.close().await;
        link.close().await;

        assert_eq!(peer.close_count(), 1);
        assert!(matches!(link.write(b"S\n").await, Err(TransportError::Closed)));
    }
}
