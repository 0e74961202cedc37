//! Error types for language installation.
//!
//! Every failure inside the installer is an [`InstallError`]. Each variant
//! carries a `fix` field with an actionable suggestion that a UI can show
//! next to the error message.

use std::time::Duration;
use thiserror::Error;

/// How an error should be treated by the caller.
///
/// # Example
///
/// ```rust
/// use hw_language_installer::{ErrorCategory, InstallError};
///
/// let error = InstallError::refused_on_device(0x5501);
/// assert_eq!(error.category(), ErrorCategory::Refused);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCategory {
    /// Informational; the protocol keeps going.
    Transient,
    /// The run failed but a user-initiated retry is likely to succeed.
    Retryable,
    /// The user declined the operation on the device.
    Refused,
    /// Nothing changes on retry without operator intervention.
    Fatal,
}

/// Errors that can occur while installing a language pack.
///
/// The enum is `Clone + PartialEq` so error events can be compared
/// structurally when consecutive duplicates are suppressed.
///
/// # Example
///
/// ```rust
/// use hw_language_installer::InstallError;
///
/// fn report(error: &InstallError) {
///     eprintln!("Language installation failed: {}", error);
///     eprintln!("To fix: {}", error.fix_suggestion());
/// }
/// ```
#[derive(Debug, Clone, PartialEq, Error)]
#[non_exhaustive]
pub enum InstallError {
    /// The transport failed or the device answered with an unexpected status.
    #[error("Transport error: {message}{}", status.map(|s| format!(" (status 0x{:04x})", s)).unwrap_or_default())]
    TransportError {
        /// Description of the failure.
        message: String,
        /// Status word returned by the device, if any.
        status: Option<u16>,
        /// Actionable suggestion for resolving the issue.
        fix: String,
    },

    /// The device did not answer in time.
    #[error("Device is not responding")]
    DeviceUnresponsive {
        /// Actionable suggestion for resolving the issue.
        fix: String,
    },

    /// An application is open on the device and cannot be quit remotely.
    #[error("Device must be on the dashboard")]
    DeviceOnDashboardExpected {
        /// Actionable suggestion for resolving the issue.
        fix: String,
    },

    /// The device went away before the operation started.
    #[error("Device disconnected")]
    DisconnectedDevice {
        /// Actionable suggestion for resolving the issue.
        fix: String,
    },

    /// The device went away while an exchange was in flight.
    #[error("Device disconnected during operation")]
    DisconnectedDeviceDuringOperation {
        /// Actionable suggestion for resolving the issue.
        fix: String,
    },

    /// No language package matches the device firmware and requested language.
    #[error("No language package found for {language}")]
    LanguageNotFound {
        /// The requested language.
        language: String,
        /// Actionable suggestion for resolving the issue.
        fix: String,
    },

    /// The user declined the installation on the device.
    #[error("Language installation refused on device (status {status})")]
    LanguageInstallRefusedOnDevice {
        /// Hex status string returned by the device.
        status: String,
        /// Actionable suggestion for resolving the issue.
        fix: String,
    },

    /// A polling attempt did not finish in time.
    #[error("Language installation on {product_name} timed out after {duration:?}")]
    LanguageInstallTimeout {
        /// Display name of the device model.
        product_name: String,
        /// How long the attempt was allowed to run.
        duration: Duration,
        /// Actionable suggestion for resolving the issue.
        fix: String,
    },

    /// Resolving the package or downloading the script failed.
    #[error("Network error: {message}")]
    Network {
        /// Description of the network error.
        message: String,
        /// Actionable suggestion for resolving the issue.
        fix: String,
    },

    /// The downloaded APDU script could not be parsed.
    #[error("Invalid install script at line {line}: {message}")]
    InvalidScript {
        /// 1-based line number in the script body.
        line: usize,
        /// What was wrong with the line.
        message: String,
        /// Actionable suggestion for resolving the issue.
        fix: String,
    },

    /// A device response could not be decoded.
    #[error("Invalid device response: {message}")]
    InvalidResponse {
        /// What was wrong with the response.
        message: String,
        /// Actionable suggestion for resolving the issue.
        fix: String,
    },
}

impl InstallError {
    /// Unexpected status word from the device.
    pub fn unexpected_status(status: u16) -> Self {
        Self::TransportError {
            message: "Unexpected device response".to_string(),
            status: Some(status),
            fix: "Reconnect the device and try again".to_string(),
        }
    }

    /// Failure of the transport itself, without a status word.
    pub fn transport(message: impl Into<String>) -> Self {
        Self::TransportError {
            message: message.into(),
            status: None,
            fix: "Reconnect the device and try again".to_string(),
        }
    }

    /// The user pressed reject on the device.
    pub fn refused_on_device(status: u16) -> Self {
        Self::LanguageInstallRefusedOnDevice {
            status: format!("{:x}", status),
            fix: "Approve the language installation on your device to continue".to_string(),
        }
    }

    /// No response before the unresponsive window elapsed.
    pub fn unresponsive() -> Self {
        Self::DeviceUnresponsive {
            fix: "Unlock your device and keep it connected".to_string(),
        }
    }

    /// An app is open and the device must be brought back to the dashboard.
    pub fn dashboard_expected() -> Self {
        Self::DeviceOnDashboardExpected {
            fix: "Quit the application on your device and return to the dashboard".to_string(),
        }
    }

    /// Device vanished mid-exchange.
    pub fn disconnected_during_operation() -> Self {
        Self::DisconnectedDeviceDuringOperation {
            fix: "Reconnect your device and try again".to_string(),
        }
    }

    /// Device is gone.
    pub fn disconnected() -> Self {
        Self::DisconnectedDevice {
            fix: "Connect your device and try again".to_string(),
        }
    }

    /// No package for the requested language.
    pub fn language_not_found(language: impl Into<String>) -> Self {
        Self::LanguageNotFound {
            language: language.into(),
            fix: "Update the device firmware or choose another language".to_string(),
        }
    }

    /// Polling attempt exceeded its window.
    pub fn install_timeout(product_name: impl Into<String>, duration: Duration) -> Self {
        Self::LanguageInstallTimeout {
            product_name: product_name.into(),
            duration,
            fix: "Make sure the device is unlocked and on the dashboard, then retry".to_string(),
        }
    }

    /// Network failure while talking to the manager API.
    pub fn network(message: impl Into<String>) -> Self {
        Self::Network {
            message: message.into(),
            fix: "Check your internet connection and try again".to_string(),
        }
    }

    /// Bad line in the install script.
    pub fn invalid_script(line: usize, message: impl Into<String>) -> Self {
        Self::InvalidScript {
            line,
            message: message.into(),
            fix: "The language package is corrupted; try again later".to_string(),
        }
    }

    /// Undecodable device response.
    pub fn invalid_response(message: impl Into<String>) -> Self {
        Self::InvalidResponse {
            message: message.into(),
            fix: "Update the device firmware and try again".to_string(),
        }
    }

    /// Get an actionable suggestion for fixing this error.
    ///
    /// # Example
    ///
    /// ```rust
    /// use hw_language_installer::InstallError;
    ///
    /// let error = InstallError::network("connection reset");
    /// assert!(error.fix_suggestion().contains("internet"));
    /// ```
    pub fn fix_suggestion(&self) -> &str {
        match self {
            Self::TransportError { fix, .. } => fix,
            Self::DeviceUnresponsive { fix } => fix,
            Self::DeviceOnDashboardExpected { fix } => fix,
            Self::DisconnectedDevice { fix } => fix,
            Self::DisconnectedDeviceDuringOperation { fix } => fix,
            Self::LanguageNotFound { fix, .. } => fix,
            Self::LanguageInstallRefusedOnDevice { fix, .. } => fix,
            Self::LanguageInstallTimeout { fix, .. } => fix,
            Self::Network { fix, .. } => fix,
            Self::InvalidScript { fix, .. } => fix,
            Self::InvalidResponse { fix, .. } => fix,
        }
    }

    /// Whether this error means the device went away.
    ///
    /// The polling observer holds these back for a while because switching
    /// apps on the device briefly disconnects it.
    pub fn is_disconnect(&self) -> bool {
        matches!(
            self,
            Self::DisconnectedDevice { .. } | Self::DisconnectedDeviceDuringOperation { .. }
        )
    }

    /// Classify the error for UI and retry decisions.
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::DeviceUnresponsive { .. }
            | Self::DisconnectedDevice { .. }
            | Self::DisconnectedDeviceDuringOperation { .. } => ErrorCategory::Transient,
            Self::TransportError { .. }
            | Self::LanguageInstallTimeout { .. }
            | Self::Network { .. }
            | Self::DeviceOnDashboardExpected { .. }
            | Self::InvalidResponse { .. } => ErrorCategory::Retryable,
            Self::LanguageInstallRefusedOnDevice { .. } => ErrorCategory::Refused,
            Self::LanguageNotFound { .. } | Self::InvalidScript { .. } => ErrorCategory::Fatal,
        }
    }
}

impl From<reqwest::Error> for InstallError {
    fn from(error: reqwest::Error) -> Self {
        Self::network(error.to_string())
    }
}
