//! Presentation bridge for the controller.
//!
//! Turns application-layer state into things a front end can show, and
//! front-end commands into session calls.  Only this module references both
//! the application layer and the console front end.
//!
//! # DTOs
//!
//! [`SessionView`] carries typed values (`ConnectionState`, `Speed`, ...).
//! [`SessionSnapshotDto`] flattens it into plain strings and numbers so it
//! can be printed as JSON with `--json` and consumed by scripts without
//! knowing the Rust types.
//!
//! # `CommandResult<T>`
//!
//! Every executed command yields a unified envelope:
//! ```json
//! { "success": true,  "data": {...}, "error": null  }
//! { "success": false, "data": null,  "error": "..."  }
//! ```

use rclink_core::PeerHandle;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::application::control_session::{ControlSession, SessionView};
use crate::infrastructure::console::ConsoleCommand;

// ── DTOs ──────────────────────────────────────────────────────────────────────

/// Flat, serializable session snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionSnapshotDto {
    pub session_id: String,
    /// Lowercase state name, e.g. `"connected"` or `"reconnecting (2)"`.
    pub connection_state: String,
    /// Human-readable status line from the link manager.
    pub status: String,
    pub peer: Option<String>,
    pub mode: String,
    pub intent: String,
    pub speed: u8,
    pub speed_percent: u8,
    pub input_active: bool,
}

impl From<&SessionView> for SessionSnapshotDto {
    fn from(view: &SessionView) -> Self {
        Self {
            session_id: view.session_id.to_string(),
            connection_state: view.link.state.to_string(),
            status: view.link.status.clone(),
            peer: view.link.peer.as_ref().map(ToString::to_string),
            mode: view.mode.to_string(),
            intent: view.intent.to_string(),
            speed: view.speed.value(),
            speed_percent: view.speed.percent(),
            input_active: view.input_active,
        }
    }
}

/// Unified response wrapper for executed commands.
#[derive(Debug, Serialize, Deserialize)]
pub struct CommandResult<T: Serialize> {
    /// `true` if the command completed successfully; `false` on error.
    pub success: bool,
    /// The command's return value, present only when `success` is `true`.
    pub data: Option<T>,
    /// A human-readable error message, present only when `success` is `false`.
    pub error: Option<String>,
}

impl<T: Serialize> CommandResult<T> {
    pub fn ok(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
        }
    }

    pub fn err(msg: impl Into<String>) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(msg.into()),
        }
    }
}

// ── Rendering ─────────────────────────────────────────────────────────────────

/// One-line human summary, e.g.
/// `Connected to HC-05 | mode bluetooth | forward @ 200 (78%)`.
pub fn status_line(view: &SessionView) -> String {
    let mut line = format!(
        "{} | mode {} | {} @ {} ({}%)",
        view.link.status,
        view.mode,
        view.intent,
        view.speed,
        view.speed.percent()
    );
    if view.mode.is_alternate() && !view.input_active {
        line.push_str(" | input inactive");
    }
    line
}

// ── Commands ──────────────────────────────────────────────────────────────────

/// Runs one console command against `session` and returns the resulting
/// snapshot.
///
/// `configured` is the peer from config or flags; `connect ADDRESS` reuses
/// its display name for the new address.  `Help` and `Quit` only report the
/// snapshot; the front end acts on them itself.
pub async fn execute(
    session: &mut ControlSession,
    command: ConsoleCommand,
    configured: Option<&PeerHandle>,
) -> CommandResult<SessionSnapshotDto> {
    let outcome = match command {
        ConsoleCommand::Connect { address } => {
            let peer = match (address, configured) {
                (Some(address), Some(peer)) => Some(PeerHandle::new(address, peer.name())),
                (Some(address), None) => Some(PeerHandle::new(address, "vehicle")),
                (None, peer) => peer.cloned(),
            };
            match peer {
                Some(peer) => session.connect(peer).await,
                None => {
                    return CommandResult::err(
                        "no peer address configured; use `connect ADDRESS` or --peer",
                    )
                }
            }
        }
        ConsoleCommand::Intent(intent) => session.set_intent(intent).await,
        ConsoleCommand::Speed(value) => session.set_speed(value).await.map(|_| ()),
        ConsoleCommand::Mode(mode) => session.set_mode(mode).await,
        ConsoleCommand::Status | ConsoleCommand::Help | ConsoleCommand::Quit => Ok(()),
    };

    match outcome {
        Ok(()) => CommandResult::ok(SessionSnapshotDto::from(&session.snapshot())),
        Err(e) => {
            warn!(error = %e, "command failed");
            CommandResult::err(e.to_string())
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use rclink_core::{ConnectionState, ControlMode, Intent, Speed};
    use uuid::Uuid;

    use super::*;
    use crate::application::link_manager::{LinkConfig, LinkManager, LinkStatus};
    use crate::infrastructure::alternate_input::default_subsystems;
    use crate::infrastructure::transport::mock::MockPeer;

    fn view() -> SessionView {
        SessionView {
            session_id: Uuid::nil(),
            link: LinkStatus {
                state: ConnectionState::Connected,
                status: "Connected to HC-05".to_string(),
                peer: Some(PeerHandle::new("/dev/rfcomm0", "HC-05")),
                generation: 1,
            },
            mode: ControlMode::Bluetooth,
            intent: Intent::Forward,
            speed: Speed::new(200),
            input_active: false,
        }
    }

    fn session(peer: &MockPeer) -> ControlSession {
        let link = LinkManager::spawn(Arc::new(peer.connector()), LinkConfig::default());
        ControlSession::new(link, default_subsystems(None))
    }

    #[test]
    fn test_snapshot_dto_flattens_the_view() {
        // Arrange / Act
        let dto = SessionSnapshotDto::from(&view());

        // Assert
        assert_eq!(dto.connection_state, "connected");
        assert_eq!(dto.peer.as_deref(), Some("HC-05 (/dev/rfcomm0)"));
        assert_eq!(dto.intent, "forward");
        assert_eq!(dto.speed, 200);
        assert_eq!(dto.speed_percent, Speed::new(200).percent());
    }

    #[test]
    fn test_snapshot_dto_serializes_to_json() {
        let json = serde_json::to_string(&SessionSnapshotDto::from(&view())).unwrap();
        assert!(json.contains("\"status\":\"Connected to HC-05\""));
        assert!(json.contains("\"mode\":\"bluetooth\""));
    }

    #[test]
    fn test_status_line_mentions_status_and_motion() {
        let line = status_line(&view());
        assert!(line.starts_with("Connected to HC-05"));
        assert!(line.contains("forward @ 200"));
        assert!(!line.contains("input inactive"));
    }

    #[test]
    fn test_status_line_flags_inactive_alternate_input() {
        let mut v = view();
        v.mode = ControlMode::Webcam;
        assert!(status_line(&v).ends_with("input inactive"));
    }

    #[test]
    fn test_command_result_envelopes() {
        let ok: CommandResult<u8> = CommandResult::ok(7);
        assert!(ok.success);
        assert_eq!(ok.data, Some(7));

        let err: CommandResult<u8> = CommandResult::err("nope");
        assert!(!err.success);
        assert_eq!(err.error.as_deref(), Some("nope"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_connect_without_any_peer_is_an_error() {
        let peer = MockPeer::new();
        let mut session = session(&peer);

        let result = execute(&mut session, ConsoleCommand::Connect { address: None }, None).await;

        assert!(!result.success);
        assert_eq!(peer.open_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_connect_address_keeps_configured_name() {
        // Arrange
        let peer = MockPeer::new();
        let mut session = session(&peer);
        let configured = PeerHandle::new("/dev/rfcomm0", "HC-05");

        // Act
        let command = ConsoleCommand::Connect {
            address: Some("/dev/rfcomm1".to_string()),
        };
        execute(&mut session, command, Some(&configured)).await;
        tokio::time::sleep(Duration::from_millis(1)).await;

        // Assert
        let status = session.link().status();
        assert_eq!(status.state, ConnectionState::Connected);
        assert_eq!(status.status, "Connected to HC-05");
        assert_eq!(status.peer.map(|p| p.address().to_string()).as_deref(), Some("/dev/rfcomm1"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_speed_command_reports_clamped_value() {
        let peer = MockPeer::new();
        let mut session = session(&peer);

        let result = execute(&mut session, ConsoleCommand::Speed(1000), None).await;

        assert_eq!(result.data.map(|d| d.speed), Some(255));
    }
}
