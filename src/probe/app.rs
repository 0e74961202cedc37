//! Foreground application detection.

use super::ResponseReader;
use crate::InstallError;
use semver::{Version, VersionReq};

/// Names the dashboard reports for itself.
const DASHBOARD_NAMES: &[&str] = &["BOLOS", "OLOS\0"];

/// Minimum app versions that implement the quit command.
const QUIT_APP_REQUIREMENTS: &[(&str, &str)] = &[
    ("Bitcoin", ">=1.4.0"),
    ("Bitcoin Test", ">=1.4.0"),
    ("Ethereum", ">=1.4.0"),
    ("Exchange", ">=1.0.0"),
];

/// The application currently running on the device.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppAndVersion {
    pub name: String,
    pub version: String,
    pub flags: Option<u8>,
}

impl AppAndVersion {
    /// Decode `format(1) | len name | len version | len flags`.
    pub fn decode(data: &[u8]) -> Result<Self, InstallError> {
        let mut reader = ResponseReader::new(data);
        let format = reader.u8()?;
        if format != 1 {
            return Err(InstallError::invalid_response(format!(
                "unsupported app-and-version format {}",
                format
            )));
        }
        let name = reader.length_prefixed_string()?;
        let version = reader.length_prefixed_string()?;
        let flags = if reader.is_empty() {
            None
        } else {
            reader.length_prefixed()?.first().copied()
        };

        Ok(Self {
            name,
            version,
            flags,
        })
    }

    pub fn is_dashboard(&self) -> bool {
        is_dashboard_name(&self.name)
    }
}

/// Whether an app name designates the dashboard.
pub fn is_dashboard_name(name: &str) -> bool {
    DASHBOARD_NAMES.contains(&name)
}

/// Whether the app can be asked to quit over the wire.
///
/// Only apps listed with a minimum version support it; anything else
/// has to be closed by the user.
///
/// # Example
///
/// ```rust
/// use hw_language_installer::probe::{app_supports_quit_app, AppAndVersion};
///
/// let app = AppAndVersion { name: "Bitcoin".into(), version: "2.1.0".into(), flags: None };
/// assert!(app_supports_quit_app(&app));
///
/// let old = AppAndVersion { name: "Bitcoin".into(), version: "1.3.9".into(), flags: None };
/// assert!(!app_supports_quit_app(&old));
/// ```
pub fn app_supports_quit_app(app: &AppAndVersion) -> bool {
    let Some((_, requirement)) = QUIT_APP_REQUIREMENTS
        .iter()
        .find(|(name, _)| *name == app.name)
    else {
        return false;
    };

    match (VersionReq::parse(requirement), Version::parse(&app.version)) {
        (Ok(req), Ok(version)) => req.matches(&version),
        _ => false,
    }
}
