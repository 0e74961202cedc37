//! Language package resolution against the manager API.
//!
//! The manager API maps a device (target id, firmware version) to the
//! language packages available for it, and serves the install scripts.
//! [`ManagerApi`] is the seam; [`HttpManagerApi`] talks to the real service.

mod http;

pub use http::{HttpManagerApi, HttpManagerApiOptions};

use crate::probe::DeviceInfo;
use crate::{ApduScript, InstallError, Language};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Hardware revision known to the manager API.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceVersion {
    pub id: u64,
    #[serde(default)]
    pub name: String,
}

/// Secure element firmware known to the manager API.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FirmwareVersion {
    pub id: u64,
    #[serde(default)]
    pub name: String,
}

/// A language package available for a firmware.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LanguagePackage {
    /// Language name, e.g. `french`.
    pub language: String,
    /// Where the install script is served.
    #[serde(rename = "apdu_install_url")]
    pub install_apdu_script_url: String,
    #[serde(default)]
    pub language_package_version_id: Option<u64>,
    #[serde(default)]
    pub version: Option<String>,
}

/// Remote collaborator resolving device metadata and serving scripts.
#[async_trait]
pub trait ManagerApi: Send + Sync {
    async fn get_device_version(
        &self,
        target_id: u32,
        provider: u32,
    ) -> Result<DeviceVersion, InstallError>;

    async fn get_current_firmware(
        &self,
        version: &str,
        device_version_id: u64,
        provider: u32,
    ) -> Result<FirmwareVersion, InstallError>;

    async fn get_language_packages(
        &self,
        device_version_id: u64,
        firmware_id: u64,
    ) -> Result<Vec<LanguagePackage>, InstallError>;

    /// GET the plaintext script body.
    async fn fetch_script(&self, url: &str) -> Result<String, InstallError>;
}

/// Pick the package to install among those matching a language.
///
/// The first match wins. Region variants are listed by the API in order of
/// preference.
///
/// # Example
///
/// ```rust
/// use hw_language_installer::manager::{select_package, LanguagePackage};
///
/// let package = |url: &str| LanguagePackage {
///     language: "french".into(),
///     install_apdu_script_url: url.into(),
///     language_package_version_id: None,
///     version: None,
/// };
/// let packages = vec![package("https://a"), package("https://b")];
/// assert_eq!(select_package(&packages).unwrap().install_apdu_script_url, "https://a");
/// ```
pub fn select_package(packages: &[LanguagePackage]) -> Option<&LanguagePackage> {
    packages.first()
}

/// Resolves the package and script for a device and language.
pub struct PackageResolver<'a> {
    api: &'a dyn ManagerApi,
}

impl<'a> PackageResolver<'a> {
    pub fn new(api: &'a dyn ManagerApi) -> Self {
        Self { api }
    }

    /// Packages for `language` on the given firmware.
    ///
    /// Fails with [`InstallError::LanguageNotFound`] when none match.
    pub async fn resolve(
        &self,
        device_version_id: u64,
        firmware_id: u64,
        language: Language,
    ) -> Result<Vec<LanguagePackage>, InstallError> {
        let packages: Vec<LanguagePackage> = self
            .api
            .get_language_packages(device_version_id, firmware_id)
            .await?
            .into_iter()
            .filter(|p| p.language == language.as_str())
            .collect();

        if packages.is_empty() {
            return Err(InstallError::language_not_found(language.as_str()));
        }
        Ok(packages)
    }

    /// Walk device version, firmware and packages for a probed device.
    pub async fn resolve_for_device(
        &self,
        info: &DeviceInfo,
        language: Language,
    ) -> Result<LanguagePackage, InstallError> {
        let device_version = self
            .api
            .get_device_version(info.target_id, info.provider_id)
            .await?;
        let firmware = self
            .api
            .get_current_firmware(&info.version, device_version.id, info.provider_id)
            .await?;
        debug!(
            device_version = device_version.id,
            firmware = firmware.id,
            %language,
            "resolving language package"
        );

        let packages = self.resolve(device_version.id, firmware.id, language).await?;
        select_package(&packages)
            .cloned()
            .ok_or_else(|| InstallError::language_not_found(language.as_str()))
    }

    /// Download and parse the script of a package.
    pub async fn fetch_script(&self, package: &LanguagePackage) -> Result<ApduScript, InstallError> {
        let body = self.api.fetch_script(&package.install_apdu_script_url).await?;
        ApduScript::parse(&body)
    }
}
