//! Alternate-input subsystems and the single point that switches them.
//!
//! Gesture and webcam control each own an exclusive sensor (IMU listener,
//! camera pipeline).  The session must never have both running, so every
//! init/teardown goes through [`ModeSubsystems::activate`], which tears
//! down everything that is not the target *before* starting the target.
//!
//! The subsystems themselves live in the infrastructure layer; this module
//! only defines the capability they expose.

use rclink_core::ControlMode;
use thiserror::Error;
use tracing::{debug, info, warn};

/// Error type for alternate-input subsystems.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ModeError {
    /// The platform refused access to the sensor (camera, motion sensors).
    #[error("permission denied")]
    PermissionDenied,
    /// The sensor exists but could not be started.
    #[error("input device unavailable: {0}")]
    Unavailable(String),
}

/// Capability interface of an alternate-input subsystem.
///
/// The session never looks inside a subsystem; it only starts and stops it.
#[cfg_attr(test, mockall::automock)]
pub trait InputModeSubsystem: Send {
    /// Acquires the sensor and starts producing intents.
    fn initialize(&mut self) -> Result<(), ModeError>;

    /// Releases the sensor.  Must be safe to call when not initialized.
    fn teardown(&mut self);

    fn is_initialized(&self) -> bool;
}

/// The gesture and webcam subsystems, switched as one unit.
pub struct ModeSubsystems {
    gesture: Box<dyn InputModeSubsystem>,
    webcam: Box<dyn InputModeSubsystem>,
}

impl ModeSubsystems {
    pub fn new(gesture: Box<dyn InputModeSubsystem>, webcam: Box<dyn InputModeSubsystem>) -> Self {
        Self { gesture, webcam }
    }

    fn get(&self, mode: ControlMode) -> Option<&dyn InputModeSubsystem> {
        match mode {
            ControlMode::Bluetooth => None,
            ControlMode::Gesture => Some(self.gesture.as_ref()),
            ControlMode::Webcam => Some(self.webcam.as_ref()),
        }
    }

    fn get_mut(&mut self, mode: ControlMode) -> Option<&mut dyn InputModeSubsystem> {
        match mode {
            ControlMode::Bluetooth => None,
            ControlMode::Gesture => Some(self.gesture.as_mut()),
            ControlMode::Webcam => Some(self.webcam.as_mut()),
        }
    }

    /// Makes `mode` the only running subsystem.
    ///
    /// Every other subsystem is torn down first.  `Bluetooth` has no
    /// subsystem, so activating it just tears the others down.
    ///
    /// # Errors
    ///
    /// Returns the target's [`ModeError`] if it fails to initialize; the
    /// others are already torn down at that point.
    pub fn activate(&mut self, mode: ControlMode) -> Result<(), ModeError> {
        for other in ControlMode::ALL.into_iter().filter(|m| *m != mode) {
            if let Some(subsystem) = self.get_mut(other) {
                if subsystem.is_initialized() {
                    debug!(mode = %other, "tearing down subsystem");
                    subsystem.teardown();
                }
            }
        }

        let Some(target) = self.get_mut(mode) else {
            return Ok(());
        };
        if target.is_initialized() {
            return Ok(());
        }
        match target.initialize() {
            Ok(()) => {
                info!(%mode, "subsystem initialized");
                Ok(())
            }
            Err(e) => {
                warn!(%mode, error = %e, "subsystem failed to initialize");
                Err(e)
            }
        }
    }

    /// Tears down every running subsystem.
    pub fn shutdown(&mut self) {
        for mode in ControlMode::ALL {
            if let Some(subsystem) = self.get_mut(mode) {
                if subsystem.is_initialized() {
                    subsystem.teardown();
                }
            }
        }
    }

    /// Whether the subsystem behind `mode` is running.  Always `false` for
    /// `Bluetooth`.
    pub fn is_initialized(&self, mode: ControlMode) -> bool {
        self.get(mode).is_some_and(|s| s.is_initialized())
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
