//! Protocol events emitted during a language installation.
//!
//! The executor and the observers only ever emit [`InstallEvent`]s; the UI
//! state is derived from them by the reducer in [`crate::state`].

use crate::{Device, InstallError};

/// Message shown while the device waits for physical approval.
pub const PERMISSION_WORDING: &str = "Approve the language installation on your device";

/// Events describing the progress of an installation.
///
/// # Example
///
/// ```rust
/// use hw_language_installer::InstallEvent;
///
/// fn on_event(event: &InstallEvent) {
///     match event {
///         InstallEvent::Progress { progress } => println!("{:.0}%", progress * 100.0),
///         InstallEvent::DevicePermissionRequested { wording } => println!("{}", wording),
///         InstallEvent::Error { error } => eprintln!("{}", error),
///         other => println!("{}", other.description()),
///     }
/// }
/// ```
#[derive(Debug, Clone, PartialEq)]
#[non_exhaustive]
pub enum InstallEvent {
    /// An application other than the dashboard is open on the device.
    AppDetected,

    /// The device did not answer within the unresponsive window.
    UnresponsiveDevice,

    /// An APDU of the install script succeeded.
    Progress {
        /// Fraction of the script sent so far, in `0.0..=1.0`.
        progress: f64,
    },

    /// The next APDU blocks until the user approves on the device.
    DevicePermissionRequested {
        /// Text for the UI.
        wording: String,
    },

    /// The last APDU of the script succeeded.
    InstallationCompleted,

    /// The polling observer changed its confirmed device.
    DeviceChange {
        /// The newly confirmed device, or `None` when it was lost.
        device: Option<Device>,
    },

    /// The run failed.
    Error {
        /// What went wrong.
        error: InstallError,
    },
}

impl InstallEvent {
    pub fn progress(progress: f64) -> Self {
        Self::Progress { progress }
    }

    pub fn permission_requested() -> Self {
        Self::DevicePermissionRequested {
            wording: PERMISSION_WORDING.to_string(),
        }
    }

    pub fn error(error: InstallError) -> Self {
        Self::Error { error }
    }

    /// Short description of the event, for logs.
    pub fn description(&self) -> &'static str {
        match self {
            Self::AppDetected => "App detected",
            Self::UnresponsiveDevice => "Device unresponsive",
            Self::Progress { .. } => "Installing",
            Self::DevicePermissionRequested { .. } => "Waiting for device approval",
            Self::InstallationCompleted => "Installation complete",
            Self::DeviceChange { .. } => "Device changed",
            Self::Error { .. } => "Installation failed",
        }
    }

    /// Whether the event ends a run.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::InstallationCompleted | Self::Error { .. })
    }
}
