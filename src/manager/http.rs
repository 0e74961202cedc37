//! HTTP client for the manager API.

use super::{DeviceVersion, FirmwareVersion, LanguagePackage, ManagerApi};
use crate::options::duration_ms;
use crate::InstallError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

/// Connection settings for [`HttpManagerApi`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HttpManagerApiOptions {
    /// Root of the API, without trailing slash.
    pub base_url: String,
    /// Per-request timeout. Default: 30 seconds.
    #[serde(with = "duration_ms")]
    pub request_timeout: Duration,
}

impl Default for HttpManagerApiOptions {
    fn default() -> Self {
        Self {
            base_url: "https://manager.api.live.ledger.com/api".to_string(),
            request_timeout: Duration::from_secs(30),
        }
    }
}

#[derive(Serialize)]
struct DeviceVersionRequest {
    target_id: u32,
    provider: u32,
}

#[derive(Serialize)]
struct FirmwareVersionRequest<'a> {
    device_version: u64,
    version_name: &'a str,
    provider: u32,
}

/// [`ManagerApi`] over HTTPS with JSON bodies.
#[derive(Debug, Clone)]
pub struct HttpManagerApi {
    client: reqwest::Client,
    base_url: String,
}

impl HttpManagerApi {
    pub fn new(options: HttpManagerApiOptions) -> Result<Self, InstallError> {
        let client = reqwest::Client::builder()
            .timeout(options.request_timeout)
            .build()?;
        Ok(Self {
            client,
            base_url: options.base_url.trim_end_matches('/').to_string(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path)
    }
}

#[async_trait]
impl ManagerApi for HttpManagerApi {
    async fn get_device_version(
        &self,
        target_id: u32,
        provider: u32,
    ) -> Result<DeviceVersion, InstallError> {
        let version = self
            .client
            .post(self.url("get_device_version"))
            .json(&DeviceVersionRequest {
                target_id,
                provider,
            })
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;
        Ok(version)
    }

    async fn get_current_firmware(
        &self,
        version: &str,
        device_version_id: u64,
        provider: u32,
    ) -> Result<FirmwareVersion, InstallError> {
        let firmware = self
            .client
            .post(self.url("get_firmware_version"))
            .json(&FirmwareVersionRequest {
                device_version: device_version_id,
                version_name: version,
                provider,
            })
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;
        Ok(firmware)
    }

    async fn get_language_packages(
        &self,
        device_version_id: u64,
        firmware_id: u64,
    ) -> Result<Vec<LanguagePackage>, InstallError> {
        let packages: Vec<LanguagePackage> = self
            .client
            .get(self.url("language-package"))
            .query(&[
                ("device_version", device_version_id),
                ("se_firmware_final_version", firmware_id),
            ])
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;
        debug!(count = packages.len(), "fetched language packages");
        Ok(packages)
    }

    async fn fetch_script(&self, url: &str) -> Result<String, InstallError> {
        let body = self
            .client
            .get(url)
            .send()
            .await?
            .error_for_status()?
            .text()
            .await?;
        Ok(body)
    }
}
