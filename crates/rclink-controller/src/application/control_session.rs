//! ControlSession: what the operator wants, and what that puts on the wire.
//!
//! The session holds the three pieces of operator state (mode, intent,
//! speed) and translates changes to them into commands for the
//! [`LinkManager`].  It owns no timers and no I/O; everything it sends goes
//! through the link manager, which decides whether the command actually
//! reaches the wire.
//!
//! Rules enforced here:
//!
//! - Motion is only ever transmitted while the link is `Connected`.  Intents
//!   set while disconnected are remembered but not sent.
//! - A speed change re-sends the current motion at the new speed; it never
//!   starts motion by itself.
//! - Every new link opens with a safety `Stop`, so an intent recorded
//!   against an earlier link generation reads as `Stop` once a newer link is
//!   up.
//! - A mode change stops the vehicle first, then announces the new mode,
//!   then hands input over to the new mode's subsystem.

use rclink_core::{Command, ControlMode, Intent, PeerHandle, Speed};
use serde::Serialize;
use thiserror::Error;
use tracing::{debug, info};
use uuid::Uuid;

use crate::application::link_manager::{LinkError, LinkManager, LinkStatus};
use crate::application::mode_switch::{ModeError, ModeSubsystems};

/// Error type for control session operations.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum SessionError {
    #[error(transparent)]
    Link(#[from] LinkError),

    /// The new mode is active but its input subsystem could not get access
    /// to its sensor.
    #[error("{mode} input needs permission that was not granted")]
    Permission { mode: ControlMode },

    /// The new mode is active but its input subsystem failed to start.
    #[error("{mode} input failed to start: {reason}")]
    Subsystem { mode: ControlMode, reason: String },
}

/// Point-in-time view of a session, for presentation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SessionView {
    pub session_id: Uuid,
    pub link: LinkStatus,
    pub mode: ControlMode,
    pub intent: Intent,
    pub speed: Speed,
    /// Whether the current mode's input subsystem is running.  Always
    /// `false` in `Bluetooth` mode.
    pub input_active: bool,
}

/// One operator's control session over one link.
pub struct ControlSession {
    id: Uuid,
    link: LinkManager,
    subsystems: ModeSubsystems,
    mode: ControlMode,
    intent: Intent,
    /// Link generation that was current when `intent` was recorded.
    intent_generation: u64,
    speed: Speed,
}

impl ControlSession {
    /// Creates a session in `Bluetooth` mode, stopped, at the default speed.
    pub fn new(link: LinkManager, subsystems: ModeSubsystems) -> Self {
        Self {
            id: Uuid::new_v4(),
            link,
            subsystems,
            mode: ControlMode::default(),
            intent: Intent::default(),
            intent_generation: 0,
            speed: Speed::default(),
        }
    }

    /// Overrides the starting speed.
    pub fn with_speed(mut self, speed: Speed) -> Self {
        self.speed = speed;
        self
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn mode(&self) -> ControlMode {
        self.mode
    }

    /// The intent in effect on the current link.
    pub fn intent(&self) -> Intent {
        self.intent_on(self.link.status().generation)
    }

    pub fn speed(&self) -> Speed {
        self.speed
    }

    pub fn link(&self) -> &LinkManager {
        &self.link
    }

    // ── Operator actions ──────────────────────────────────────────────────────

    /// Asks the link manager to connect to `peer`.
    ///
    /// # Errors
    ///
    /// [`SessionError::Link`] if the link manager has stopped.
    pub async fn connect(&self, peer: PeerHandle) -> Result<(), SessionError> {
        info!(peer = %peer, "operator requested connect");
        self.link.connect(peer).await?;
        Ok(())
    }

    /// Records `intent` and, when connected, sends it at the current speed.
    ///
    /// # Errors
    ///
    /// [`SessionError::Link`] if the link manager has stopped.
    pub async fn set_intent(&mut self, intent: Intent) -> Result<(), SessionError> {
        self.intent = intent;
        self.intent_generation = self.link.status().generation;
        self.transmit(Command::for_intent(intent, self.speed)).await
    }

    /// Shorthand for `set_intent(Intent::Stop)`.
    ///
    /// # Errors
    ///
    /// [`SessionError::Link`] if the link manager has stopped.
    pub async fn clear_intent(&mut self) -> Result<(), SessionError> {
        self.set_intent(Intent::Stop).await
    }

    /// Sets the speed, clamping `value` into `0..=255`, and returns the
    /// stored speed.  If the vehicle is moving, the motion is re-sent at the
    /// new speed.
    ///
    /// # Errors
    ///
    /// [`SessionError::Link`] if the link manager has stopped.
    pub async fn set_speed(&mut self, value: i64) -> Result<Speed, SessionError> {
        self.speed = Speed::clamped(value);
        debug!(speed = %self.speed, "speed set");
        self.forget_stale_intent();
        if self.intent.is_motion() {
            self.transmit(Command::for_intent(self.intent, self.speed))
                .await?;
        }
        Ok(self.speed)
    }

    /// Switches to `mode`.  A no-op when `mode` is already current.
    ///
    /// Order: stop the vehicle, announce the mode (both only when
    /// connected), record the mode, then tear down every other input
    /// subsystem before starting the new one.
    ///
    /// # Errors
    ///
    /// - [`SessionError::Permission`] / [`SessionError::Subsystem`] when the
    ///   new mode's subsystem fails to start.  The mode is switched anyway.
    /// - [`SessionError::Link`] if the link manager has stopped.
    pub async fn set_mode(&mut self, mode: ControlMode) -> Result<(), SessionError> {
        if mode == self.mode {
            return Ok(());
        }

        self.clear_intent().await?;
        self.transmit(Command::SetMode(mode)).await?;

        info!(from = %self.mode, to = %mode, "control mode switched");
        self.mode = mode;

        self.subsystems.activate(mode).map_err(|e| match e {
            ModeError::PermissionDenied => SessionError::Permission { mode },
            ModeError::Unavailable(reason) => SessionError::Subsystem { mode, reason },
        })
    }

    /// Ends the session: stops every input subsystem and tears the link down.
    pub async fn teardown(&mut self) {
        self.subsystems.shutdown();
        self.link.teardown().await;
        info!(session = %self.id, "session ended");
    }

    pub fn snapshot(&self) -> SessionView {
        SessionView {
            session_id: self.id,
            link: self.link.status(),
            mode: self.mode,
            intent: self.intent(),
            speed: self.speed,
            input_active: self.subsystems.is_initialized(self.mode),
        }
    }

    fn intent_on(&self, generation: u64) -> Intent {
        if self.intent_generation == generation {
            self.intent
        } else {
            Intent::Stop
        }
    }

    /// Drops an intent that predates the current link; the link's safety
    /// stop already superseded it.
    fn forget_stale_intent(&mut self) {
        let generation = self.link.status().generation;
        if self.intent_on(generation) != self.intent {
            debug!(intent = %self.intent, "intent predates current link; now stopped");
            self.intent = Intent::Stop;
        }
        self.intent_generation = generation;
    }

    /// Hands `command` to the link manager when connected.
    async fn transmit(&self, command: Command) -> Result<(), SessionError> {
        if !self.link.state().is_connected() {
            debug!(%command, "not connected; not sending");
            return Ok(());
        }
        self.link.send(command).await?;
        Ok(())
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use super::*;
    use crate::application::link_manager::LinkConfig;
    use crate::application::mode_switch::MockInputModeSubsystem;
    use crate::infrastructure::transport::mock::MockPeer;

    fn idle_subsystem() -> MockInputModeSubsystem {
        let mut mock = MockInputModeSubsystem::new();
        mock.expect_is_initialized().return_const(false);
        mock.expect_initialize().returning(|| Ok(()));
        mock.expect_teardown().return_const(());
        mock
    }

    fn session_with(peer: &MockPeer, gesture: MockInputModeSubsystem) -> ControlSession {
        let link = LinkManager::spawn(Arc::new(peer.connector()), LinkConfig::default());
        ControlSession::new(
            link,
            ModeSubsystems::new(Box::new(gesture), Box::new(idle_subsystem())),
        )
    }

    async fn settle() {
        tokio::time::sleep(Duration::from_millis(1)).await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_new_session_defaults() {
        let session = session_with(&MockPeer::new(), idle_subsystem());

        let view = session.snapshot();

        assert_eq!(view.mode, ControlMode::Bluetooth);
        assert_eq!(view.intent, Intent::Stop);
        assert_eq!(view.speed, Speed::new(128));
        assert!(!view.input_active);
    }

    #[tokio::test(start_paused = true)]
    async fn test_speed_change_while_stopped_sends_nothing() {
        // Arrange
        let peer = MockPeer::new();
        let mut session = session_with(&peer, idle_subsystem());
        session.connect(PeerHandle::new("mock", "rx")).await.unwrap();
        settle().await;
        peer.clear_written();

        // Act
        let speed = session.set_speed(300).await.unwrap();
        settle().await;

        // Assert
        assert_eq!(speed, Speed::MAX);
        assert!(peer.written().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_intent_is_remembered_while_disconnected() {
        let peer = MockPeer::new();
        let mut session = session_with(&peer, idle_subsystem());

        session.set_intent(Intent::Left).await.unwrap();
        settle().await;

        assert_eq!(session.intent(), Intent::Left);
        assert!(peer.written().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_same_mode_is_a_no_op() {
        let peer = MockPeer::new();
        let mut gesture = MockInputModeSubsystem::new();
        gesture.expect_is_initialized().return_const(false);
        gesture.expect_initialize().never();
        let mut session = session_with(&peer, gesture);

        session.set_mode(ControlMode::Bluetooth).await.unwrap();

        assert_eq!(session.mode(), ControlMode::Bluetooth);
    }

    #[tokio::test(start_paused = true)]
    async fn test_permission_failure_still_switches_mode() {
        // Arrange
        let peer = MockPeer::new();
        let mut gesture = MockInputModeSubsystem::new();
        gesture.expect_is_initialized().return_const(false);
        gesture
            .expect_initialize()
            .times(1)
            .returning(|| Err(ModeError::PermissionDenied));
        let mut session = session_with(&peer, gesture);

        // Act
        let result = session.set_mode(ControlMode::Gesture).await;

        // Assert
        assert_eq!(
            result,
            Err(SessionError::Permission {
                mode: ControlMode::Gesture
            })
        );
        assert_eq!(session.mode(), ControlMode::Gesture);
        assert!(!session.snapshot().input_active);
    }

    #[tokio::test(start_paused = true)]
    async fn test_unavailable_device_is_reported_with_reason() {
        let peer = MockPeer::new();
        let mut gesture = MockInputModeSubsystem::new();
        gesture.expect_is_initialized().return_const(false);
        gesture
            .expect_initialize()
            .returning(|| Err(ModeError::Unavailable("no IMU".to_string())));
        let mut session = session_with(&peer, gesture);

        let err = session.set_mode(ControlMode::Gesture).await.unwrap_err();

        assert!(err.to_string().contains("no IMU"));
    }
}
