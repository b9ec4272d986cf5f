//! Alternate-input subsystems: gesture and webcam control.
//!
//! These are the pieces the operator switches to with `mode gesture` or
//! `mode webcam`.  Recognition itself is out of scope here; what matters to
//! the rest of the controller is that each subsystem acquires its sensor on
//! `initialize`, releases it on `teardown`, and reports a permission failure
//! distinctly from any other failure.

use std::fs::OpenOptions;
use std::io::ErrorKind;
use std::path::PathBuf;

use tracing::{debug, info};

use crate::application::mode_switch::{InputModeSubsystem, ModeError, ModeSubsystems};

/// The production pair: a gesture recognizer and a webcam tracker bound to
/// `webcam_device` when one is configured.
pub fn default_subsystems(webcam_device: Option<PathBuf>) -> ModeSubsystems {
    ModeSubsystems::new(
        Box::new(GestureRecognizer::new()),
        Box::new(WebcamTracker::new(webcam_device)),
    )
}

/// Tilt-to-steer gesture input.
#[derive(Debug, Default)]
pub struct GestureRecognizer {
    initialized: bool,
}

impl GestureRecognizer {
    pub fn new() -> Self {
        Self::default()
    }
}

impl InputModeSubsystem for GestureRecognizer {
    fn initialize(&mut self) -> Result<(), ModeError> {
        self.initialized = true;
        info!("gesture recognizer started");
        Ok(())
    }

    fn teardown(&mut self) {
        if self.initialized {
            self.initialized = false;
            info!("gesture recognizer stopped");
        }
    }

    fn is_initialized(&self) -> bool {
        self.initialized
    }
}

/// Camera-based hand tracking.
///
/// When a capture device is configured, `initialize` opens it to claim it
/// and to surface permission problems up front.  Without one the tracker
/// runs detached from any camera.
#[derive(Debug, Default)]
pub struct WebcamTracker {
    device: Option<PathBuf>,
    capture: Option<std::fs::File>,
    initialized: bool,
}

impl WebcamTracker {
    pub fn new(device: Option<PathBuf>) -> Self {
        Self {
            device,
            capture: None,
            initialized: false,
        }
    }
}

impl InputModeSubsystem for WebcamTracker {
    fn initialize(&mut self) -> Result<(), ModeError> {
        if let Some(device) = &self.device {
            let file = OpenOptions::new()
                .read(true)
                .open(device)
                .map_err(|e| match e.kind() {
                    ErrorKind::PermissionDenied => ModeError::PermissionDenied,
                    _ => ModeError::Unavailable(format!("{}: {e}", device.display())),
                })?;
            debug!(device = %device.display(), "capture device opened");
            self.capture = Some(file);
        }
        self.initialized = true;
        info!("webcam tracker started");
        Ok(())
    }

    fn teardown(&mut self) {
        self.capture = None;
        if self.initialized {
            self.initialized = false;
            info!("webcam tracker stopped");
        }
    }

    fn is_initialized(&self) -> bool {
        self.initialized
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_gesture_lifecycle() {
        let mut gesture = GestureRecognizer::new();
        assert!(!gesture.is_initialized());

        gesture.initialize().unwrap();
        assert!(gesture.is_initialized());

        gesture.teardown();
        gesture.teardown();
        assert!(!gesture.is_initialized());
    }

    #[test]
    fn test_webcam_without_device_starts() {
        let mut webcam = WebcamTracker::new(None);
        assert_eq!(webcam.initialize(), Ok(()));
        assert!(webcam.is_initialized());
    }

    #[test]
    fn test_webcam_missing_device_is_unavailable() {
        // Arrange
        let mut webcam = WebcamTracker::new(Some(PathBuf::from("/nonexistent/rclink/video9")));

        // Act
        let result = webcam.initialize();

        // Assert
        assert!(matches!(result, Err(ModeError::Unavailable(_))));
        assert!(!webcam.is_initialized());
    }

    #[test]
    fn test_webcam_teardown_releases_device() {
        let dir = std::env::temp_dir().join("rclink_webcam_test_device");
        std::fs::write(&dir, b"").unwrap();
        let mut webcam = WebcamTracker::new(Some(dir.clone()));

        webcam.initialize().unwrap();
        assert!(webcam.capture.is_some());
        webcam.teardown();

        assert!(webcam.capture.is_none());
        let _ = std::fs::remove_file(&dir);
    }
}
