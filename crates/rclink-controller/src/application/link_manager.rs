//! LinkManager: owns the one link to the vehicle and its lifecycle.
//!
//! # State machine
//!
//! ```text
//!                 connect()
//!  Disconnected ─────────────▶ Connecting ──ok──▶ Connected
//!       ▲  ▲                      │                 │
//!       │  │                  err │      dead probe │ or write error
//!       │  └──────────────────────┴─────────────────┘
//!       │                         │
//!       │        attempt < max    ▼       attempt == max
//!       │   ┌──── reconnect policy ───────────────▶ Failed
//!       │   │  (after reconnect_delay)
//!       │   ▼
//!       │  Reconnecting(n) ──▶ Connecting
//!       │
//!   teardown() from anywhere
//! ```
//!
//! # Concurrency
//!
//! All state lives in a single [`LinkActor`] task.  Callers hold a cheap,
//! cloneable [`LinkManager`] handle that forwards requests over a bounded
//! `mpsc` channel, so there is exactly one writer of link state and commands
//! hit the wire in the order they were submitted.
//!
//! The two timers (health probe and reconnect backoff) are plain deadlines
//! owned by the actor and raced in `tokio::select!`.  Cancelling a timer is
//! setting its deadline to `None`; a cancelled timer cannot fire late.
//!
//! Opening a transport can take seconds, so each attempt runs in its own
//! task and reports back tagged with the epoch it was started in.
//! [`LinkManager::teardown`] bumps the epoch; a result from an older epoch is
//! closed and discarded.
//!
//! Observers read the latest [`LinkStatus`] from a `watch` channel and can
//! [`subscribe`](LinkManager::subscribe) to every transition on a
//! `broadcast` channel.

use std::sync::Arc;
use std::time::Duration;

use rclink_core::protocol::MAX_COMMAND_LEN;
use rclink_core::{encode, Command, ConnectionState, Delivery, PeerHandle, RateLimiter};
use serde::Serialize;
use thiserror::Error;
use tokio::sync::{broadcast, mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tokio::time::{self, Instant};
use tracing::{debug, info, trace, warn};

use crate::infrastructure::transport::{ConnectError, Connector, Transport, TransportError};

const REQUEST_QUEUE_DEPTH: usize = 64;
const EVENT_QUEUE_DEPTH: usize = 64;

// ── Public types ──────────────────────────────────────────────────────────────

/// Timing and retry policy for one link.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkConfig {
    /// Interval between liveness probes while connected.
    pub health_interval: Duration,
    /// Wait before each automatic reconnection attempt.
    pub reconnect_delay: Duration,
    /// Automatic retries after the link is lost or an open fails.
    pub max_reconnect_attempts: u8,
    /// Minimum spacing between directional commands.
    pub command_interval: Duration,
    /// Longest a single write may take before the link is declared lost.
    pub write_timeout: Duration,
    /// Longest a single open may take.
    pub connect_timeout: Duration,
}

impl Default for LinkConfig {
    fn default() -> Self {
        Self {
            health_interval: Duration::from_millis(2000),
            reconnect_delay: Duration::from_millis(3000),
            max_reconnect_attempts: 3,
            command_interval: Duration::from_millis(100),
            write_timeout: Duration::from_millis(1000),
            connect_timeout: Duration::from_millis(10_000),
        }
    }
}

/// Latest published link state plus its human-readable status line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LinkStatus {
    pub state: ConnectionState,
    pub status: String,
    pub peer: Option<PeerHandle>,
    /// Number of links opened so far.  Bumps each time the state enters
    /// `Connected`, so two statuses with the same generation describe the
    /// same physical link.
    pub generation: u64,
}

impl Default for LinkStatus {
    fn default() -> Self {
        Self {
            state: ConnectionState::Disconnected,
            status: "Disconnected".to_string(),
            peer: None,
            generation: 0,
        }
    }
}

/// Everything observable that happens on the link, in order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LinkEvent {
    /// `ConnectionState` changed; carries the status published with it.
    StateChanged(LinkStatus),
    /// A command was written to the transport.
    CommandSent(Command),
    /// A throttled command was dropped by the rate limiter.
    CommandThrottled(Command),
    /// The platform refused access to the peer; no retry is scheduled.
    PermissionDenied(PeerHandle),
}

/// Returned when the actor behind a [`LinkManager`] is no longer running.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum LinkError {
    #[error("link manager task has stopped")]
    ActorGone,
}

// ── Handle ────────────────────────────────────────────────────────────────────

enum LinkRequest {
    Connect(PeerHandle),
    Send(Command),
    Teardown(oneshot::Sender<()>),
}

/// Cloneable handle to the link actor.
///
/// The actor runs until every handle is dropped, then closes the transport.
#[derive(Clone)]
pub struct LinkManager {
    requests: mpsc::Sender<LinkRequest>,
    status: watch::Receiver<LinkStatus>,
    events: broadcast::Sender<LinkEvent>,
}

impl LinkManager {
    /// Starts the actor on the current Tokio runtime.
    pub fn spawn(connector: Arc<dyn Connector>, config: LinkConfig) -> Self {
        let (request_tx, request_rx) = mpsc::channel(REQUEST_QUEUE_DEPTH);
        let (outcome_tx, outcome_rx) = mpsc::unbounded_channel();
        let (status_tx, status_rx) = watch::channel(LinkStatus::default());
        let (events, _) = broadcast::channel(EVENT_QUEUE_DEPTH);

        let actor = LinkActor::new(connector, config, outcome_tx, status_tx, events.clone());
        tokio::spawn(actor.run(request_rx, outcome_rx));

        Self {
            requests: request_tx,
            status: status_rx,
            events,
        }
    }

    /// Starts connecting to `peer`.  Ignored while already connecting or
    /// connected.  Cancels any pending automatic retry.
    ///
    /// # Errors
    ///
    /// [`LinkError::ActorGone`] if the actor has stopped.
    pub async fn connect(&self, peer: PeerHandle) -> Result<(), LinkError> {
        self.request(LinkRequest::Connect(peer)).await
    }

    /// Queues `command` for the wire.
    ///
    /// Dropped silently unless the link is `Connected`, and directional
    /// commands are dropped when they arrive inside the rate-limit window.
    ///
    /// # Errors
    ///
    /// [`LinkError::ActorGone`] if the actor has stopped.
    pub async fn send(&self, command: Command) -> Result<(), LinkError> {
        self.request(LinkRequest::Send(command)).await
    }

    /// Cancels timers and any outstanding open, closes the transport, and
    /// waits until the actor reports `Disconnected`.  Idempotent.
    pub async fn teardown(&self) {
        let (ack_tx, ack_rx) = oneshot::channel();
        if self.requests.send(LinkRequest::Teardown(ack_tx)).await.is_err() {
            // Actor already gone: its transport was closed on the way out.
            return;
        }
        let _ = ack_rx.await;
    }

    /// Latest published status.
    pub fn status(&self) -> LinkStatus {
        self.status.borrow().clone()
    }

    pub fn state(&self) -> ConnectionState {
        self.status.borrow().state
    }

    /// Every [`LinkEvent`] from now on.
    pub fn subscribe(&self) -> broadcast::Receiver<LinkEvent> {
        self.events.subscribe()
    }

    async fn request(&self, request: LinkRequest) -> Result<(), LinkError> {
        self.requests
            .send(request)
            .await
            .map_err(|_| LinkError::ActorGone)
    }
}

// ── Actor ─────────────────────────────────────────────────────────────────────

struct ConnectOutcome {
    epoch: u64,
    result: Result<Box<dyn Transport>, ConnectError>,
}

struct LinkActor {
    connector: Arc<dyn Connector>,
    config: LinkConfig,
    limiter: RateLimiter,
    transport: Option<Box<dyn Transport>>,
    peer: Option<PeerHandle>,
    state: ConnectionState,
    /// Automatic attempts made since the last successful open or user connect.
    attempts: u8,
    epoch: u64,
    generation: u64,
    pending_connect: Option<JoinHandle<()>>,
    health_deadline: Option<Instant>,
    reconnect_deadline: Option<Instant>,
    outcome_tx: mpsc::UnboundedSender<ConnectOutcome>,
    status_tx: watch::Sender<LinkStatus>,
    events: broadcast::Sender<LinkEvent>,
}

async fn sleep_until(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => time::sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}

impl LinkActor {
    fn new(
        connector: Arc<dyn Connector>,
        config: LinkConfig,
        outcome_tx: mpsc::UnboundedSender<ConnectOutcome>,
        status_tx: watch::Sender<LinkStatus>,
        events: broadcast::Sender<LinkEvent>,
    ) -> Self {
        Self {
            limiter: RateLimiter::with_interval(config.command_interval),
            connector,
            config,
            transport: None,
            peer: None,
            state: ConnectionState::Disconnected,
            attempts: 0,
            epoch: 0,
            generation: 0,
            pending_connect: None,
            health_deadline: None,
            reconnect_deadline: None,
            outcome_tx,
            status_tx,
            events,
        }
    }

    async fn run(
        mut self,
        mut requests: mpsc::Receiver<LinkRequest>,
        mut outcomes: mpsc::UnboundedReceiver<ConnectOutcome>,
    ) {
        loop {
            tokio::select! {
                biased;

                request = requests.recv() => match request {
                    Some(request) => self.handle_request(request).await,
                    None => break,
                },
                Some(outcome) = outcomes.recv() => self.handle_outcome(outcome).await,
                () = sleep_until(self.health_deadline) => self.probe_health().await,
                () = sleep_until(self.reconnect_deadline) => self.reconnect_due(),
            }
        }

        debug!("all link handles dropped; shutting down");
        self.shutdown().await;
    }

    async fn handle_request(&mut self, request: LinkRequest) {
        match request {
            LinkRequest::Connect(peer) => self.connect(peer),
            LinkRequest::Send(command) => self.send(command).await,
            LinkRequest::Teardown(ack) => {
                self.shutdown().await;
                let _ = ack.send(());
            }
        }
    }

    // ── Connecting ────────────────────────────────────────────────────────────

    fn connect(&mut self, peer: PeerHandle) {
        if self.state.is_busy() {
            debug!(state = %self.state, "connect ignored: link busy");
            return;
        }
        self.reconnect_deadline = None;
        self.attempts = 0;
        self.peer = Some(peer);
        self.begin_open();
    }

    fn begin_open(&mut self) {
        let Some(peer) = self.peer.clone() else {
            return;
        };
        self.epoch += 1;
        let epoch = self.epoch;

        let status = if self.attempts == 0 {
            "Connecting...".to_string()
        } else {
            format!("Reconnecting... attempt {}", self.attempts)
        };
        self.transition(ConnectionState::Connecting, status);

        let connector = Arc::clone(&self.connector);
        let outcome_tx = self.outcome_tx.clone();
        let connect_timeout = self.config.connect_timeout;
        self.pending_connect = Some(tokio::spawn(async move {
            let result = match time::timeout(connect_timeout, connector.open(&peer)).await {
                Ok(result) => result,
                Err(_) => Err(ConnectError::Timeout {
                    address: peer.address().to_string(),
                }),
            };
            let _ = outcome_tx.send(ConnectOutcome { epoch, result });
        }));
    }

    async fn handle_outcome(&mut self, outcome: ConnectOutcome) {
        if outcome.epoch != self.epoch || self.state != ConnectionState::Connecting {
            debug!(epoch = outcome.epoch, current = self.epoch, "discarding stale connect result");
            if let Ok(mut transport) = outcome.result {
                transport.close().await;
            }
            return;
        }
        self.pending_connect = None;

        match outcome.result {
            Ok(transport) => self.on_open(transport).await,
            Err(ConnectError::PermissionDenied { address }) => {
                warn!(%address, "permission denied; not retrying");
                self.transition(ConnectionState::Failed, "Permissions required");
                if let Some(peer) = self.peer.clone() {
                    let _ = self.events.send(LinkEvent::PermissionDenied(peer));
                }
            }
            Err(e) => {
                warn!(error = %e, attempt = self.attempts, "connect failed");
                self.transition(ConnectionState::Disconnected, "Connection failed");
                self.schedule_reconnect();
            }
        }
    }

    async fn on_open(&mut self, transport: Box<dyn Transport>) {
        self.transport = Some(transport);
        self.attempts = 0;
        self.generation += 1;
        self.limiter.reset();

        let name = self
            .peer
            .as_ref()
            .map(|p| p.name().to_string())
            .unwrap_or_default();
        self.transition(ConnectionState::Connected, format!("Connected to {name}"));

        // Whatever the vehicle was doing before this link, it stops now.
        if self.write(Command::Stop).await {
            self.health_deadline = Some(Instant::now() + self.config.health_interval);
        }
    }

    // ── Sending ───────────────────────────────────────────────────────────────

    async fn send(&mut self, command: Command) {
        if !self.state.is_connected() {
            debug!(%command, state = %self.state, "dropping command: link not connected");
            return;
        }
        if command.delivery() == Delivery::Throttled
            && !self.limiter.admit(Instant::now().into_std())
        {
            trace!(%command, "throttled");
            let _ = self.events.send(LinkEvent::CommandThrottled(command));
            return;
        }
        self.write(command).await;
    }

    /// Writes one command.  On failure the link is declared lost and `false`
    /// is returned.
    async fn write(&mut self, command: Command) -> bool {
        let Some(transport) = self.transport.as_mut() else {
            return false;
        };
        let bytes = encode(&command);
        debug_assert!(bytes.len() <= MAX_COMMAND_LEN);

        let write_timeout = self.config.write_timeout;
        let result = match time::timeout(write_timeout, transport.write(&bytes)).await {
            Ok(result) => result,
            Err(_) => Err(TransportError::Timeout(write_timeout)),
        };

        match result {
            Ok(()) => {
                debug!(%command, "sent");
                let _ = self.events.send(LinkEvent::CommandSent(command));
                true
            }
            Err(e) => {
                warn!(%command, error = %e, "write failed");
                self.link_lost().await;
                false
            }
        }
    }

    // ── Health and recovery ───────────────────────────────────────────────────

    async fn probe_health(&mut self) {
        self.health_deadline = None;
        if !self.state.is_connected() {
            return;
        }
        let alive = self.transport.as_ref().is_some_and(|t| t.is_alive());
        if alive {
            trace!("link alive");
            self.health_deadline = Some(Instant::now() + self.config.health_interval);
        } else {
            warn!("liveness probe failed");
            self.link_lost().await;
        }
    }

    async fn link_lost(&mut self) {
        self.health_deadline = None;
        if let Some(mut transport) = self.transport.take() {
            transport.close().await;
        }
        self.transition(ConnectionState::Disconnected, "Connection lost");
        self.schedule_reconnect();
    }

    fn schedule_reconnect(&mut self) {
        if self.attempts < self.config.max_reconnect_attempts {
            info!(
                next_attempt = self.attempts + 1,
                delay = ?self.config.reconnect_delay,
                "scheduling reconnect"
            );
            self.reconnect_deadline = Some(Instant::now() + self.config.reconnect_delay);
        } else {
            warn!(attempts = self.attempts, "giving up on reconnection");
            self.reconnect_deadline = None;
            self.transition(ConnectionState::Failed, "Reconnection failed");
        }
    }

    fn reconnect_due(&mut self) {
        self.reconnect_deadline = None;
        if self.peer.is_none() {
            return;
        }
        self.attempts += 1;
        self.transition(
            ConnectionState::Reconnecting(self.attempts),
            format!("Reconnecting... attempt {}", self.attempts),
        );
        self.begin_open();
    }

    // ── Teardown ──────────────────────────────────────────────────────────────

    async fn shutdown(&mut self) {
        self.health_deadline = None;
        self.reconnect_deadline = None;
        self.epoch += 1;
        if let Some(pending) = self.pending_connect.take() {
            pending.abort();
        }
        if let Some(mut transport) = self.transport.take() {
            transport.close().await;
        }
        self.attempts = 0;
        self.transition(ConnectionState::Disconnected, "Disconnected");
    }

    fn transition(&mut self, state: ConnectionState, status: impl Into<String>) {
        let published = LinkStatus {
            state,
            status: status.into(),
            peer: self.peer.clone(),
            generation: self.generation,
        };
        let previous = self.state;
        self.state = state;
        if previous != state {
            info!(from = %previous, to = %state, status = %published.status, "link state changed");
            let _ = self.events.send(LinkEvent::StateChanged(published.clone()));
        }
        self.status_tx.send_replace(published);
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::transport::mock::MockPeer;

    fn spawn_with(peer: &MockPeer) -> LinkManager {
        LinkManager::spawn(Arc::new(peer.connector()), LinkConfig::default())
    }

    async fn settle() {
        time::sleep(Duration::from_millis(1)).await;
    }

    #[test]
    fn test_default_config_matches_documented_timings() {
        let config = LinkConfig::default();
        assert_eq!(config.health_interval, Duration::from_secs(2));
        assert_eq!(config.reconnect_delay, Duration::from_secs(3));
        assert_eq!(config.max_reconnect_attempts, 3);
        assert_eq!(config.command_interval, Duration::from_millis(100));
    }

    #[tokio::test(start_paused = true)]
    async fn test_starts_disconnected() {
        let link = spawn_with(&MockPeer::new());
        assert_eq!(link.state(), ConnectionState::Disconnected);
        assert_eq!(link.status().status, "Disconnected");
    }

    #[tokio::test(start_paused = true)]
    async fn test_connect_sends_safety_stop() {
        // Arrange
        let peer = MockPeer::new();
        let link = spawn_with(&peer);

        // Act
        link.connect(PeerHandle::new("mock", "HC-05")).await.unwrap();
        settle().await;

        // Assert
        assert_eq!(link.state(), ConnectionState::Connected);
        assert_eq!(link.status().status, "Connected to HC-05");
        assert_eq!(peer.written(), vec!["S\n"]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_second_connect_while_connected_is_ignored() {
        let peer = MockPeer::new();
        let link = spawn_with(&peer);
        link.connect(PeerHandle::new("mock", "rx")).await.unwrap();
        settle().await;

        link.connect(PeerHandle::new("mock", "rx")).await.unwrap();
        settle().await;

        assert_eq!(peer.open_count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_send_while_disconnected_is_dropped() {
        let peer = MockPeer::new();
        let link = spawn_with(&peer);

        link.send(Command::Stop).await.unwrap();
        settle().await;

        assert!(peer.written().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_teardown_is_idempotent() {
        let peer = MockPeer::new();
        let link = spawn_with(&peer);
        link.connect(PeerHandle::new("mock", "rx")).await.unwrap();
        settle().await;

        link.teardown().await;
        link.teardown().await;

        assert_eq!(link.state(), ConnectionState::Disconnected);
        assert_eq!(peer.close_count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_slow_open_times_out_and_schedules_retry() {
        // Arrange: the open takes longer than the connect timeout
        let peer = MockPeer::new();
        peer.set_connect_delay(Duration::from_secs(60));
        let link = spawn_with(&peer);

        // Act
        link.connect(PeerHandle::new("mock", "rx")).await.unwrap();
        time::sleep(Duration::from_millis(10_500)).await;

        // Assert
        assert_eq!(link.state(), ConnectionState::Disconnected);
        assert_eq!(link.status().status, "Connection failed");
    }

    #[tokio::test(start_paused = true)]
    async fn test_open_result_arriving_after_teardown_is_closed_and_dropped() {
        // Arrange: a finished open whose attempt has since been torn down
        let peer = MockPeer::new();
        let connector = Arc::new(peer.connector());
        let late = connector.open(&PeerHandle::new("mock", "rx")).await.unwrap();
        peer.set_connect_delay(Duration::from_secs(60));

        let (outcome_tx, _outcome_rx) = mpsc::unbounded_channel();
        let (status_tx, status_rx) = watch::channel(LinkStatus::default());
        let (events, _) = broadcast::channel(EVENT_QUEUE_DEPTH);
        let mut actor = LinkActor::new(connector, LinkConfig::default(), outcome_tx, status_tx, events);
        actor.connect(PeerHandle::new("mock", "rx"));
        let stale_epoch = actor.epoch;
        actor.shutdown().await;

        // Act
        actor
            .handle_outcome(ConnectOutcome {
                epoch: stale_epoch,
                result: Ok(late),
            })
            .await;

        // Assert
        assert_eq!(actor.state, ConnectionState::Disconnected);
        assert_eq!(status_rx.borrow().state, ConnectionState::Disconnected);
        assert!(actor.transport.is_none());
        assert!(peer.written().is_empty());
        assert_eq!(peer.close_count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_generation_bumps_on_every_new_link() {
        let peer = MockPeer::new();
        let link = spawn_with(&peer);
        assert_eq!(link.status().generation, 0);

        link.connect(PeerHandle::new("mock", "rx")).await.unwrap();
        settle().await;
        assert_eq!(link.status().generation, 1);

        peer.drop_link();
        time::sleep(Duration::from_millis(5_500)).await;

        assert_eq!(link.state(), ConnectionState::Connected);
        assert_eq!(link.status().generation, 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_state_changed_carries_the_published_status() {
        let peer = MockPeer::new();
        let link = spawn_with(&peer);
        let mut events = link.subscribe();

        link.connect(PeerHandle::new("mock", "HC-05")).await.unwrap();
        settle().await;

        let mut published = Vec::new();
        while let Ok(event) = events.try_recv() {
            if let LinkEvent::StateChanged(status) = event {
                published.push(status.status);
            }
        }
        assert_eq!(published, vec!["Connecting...", "Connected to HC-05"]);
    }
}
