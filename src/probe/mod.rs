//! Device identity probing.
//!
//! Queries the device for what the installer needs before it can resolve a
//! language package:
//!
//! - `get_device_info`: target id and firmware version (dashboard only)
//! - `get_app_and_version`: the foreground application
//! - `quit_app`: return to the dashboard
//!
//! [`probe_device_info`] is the standalone entry point for callers outside
//! an install run, such as a device details screen: it bounds
//! `get_device_info` with a timeout. The executor does not use it, since
//! its own exchanges are already watched for unresponsiveness.

mod app;
mod device_info;

pub use app::{app_supports_quit_app, is_dashboard_name, AppAndVersion};
pub use device_info::DeviceInfo;

use crate::transport::{self, status, Apdu, ApduResponse, Transport};
use crate::InstallError;
use std::time::Duration;

/// Read the device info from the dashboard.
///
/// Fails with [`InstallError::DeviceOnDashboardExpected`] when the device
/// answers with one of the statuses an open application returns.
pub async fn get_device_info(transport: &mut dyn Transport) -> Result<DeviceInfo, InstallError> {
    let raw = transport
        .exchange(&Apdu::get_device_info().to_bytes()?)
        .await?;
    let response = ApduResponse::parse(&raw)?;

    if status::is_app_open(response.status) {
        return Err(InstallError::dashboard_expected());
    }
    if !response.is_ok() {
        return Err(InstallError::unexpected_status(response.status));
    }
    DeviceInfo::decode(&response.data)
}

/// [`get_device_info`] bounded by `timeout`.
///
/// Some device states (mid-boot, app transition) never answer; this fails
/// with [`InstallError::DeviceUnresponsive`] instead of hanging.
pub async fn probe_device_info(
    transport: &mut dyn Transport,
    timeout: Duration,
) -> Result<DeviceInfo, InstallError> {
    tokio::time::timeout(timeout, get_device_info(transport))
        .await
        .map_err(|_| InstallError::unresponsive())?
}

/// Read the name and version of the foreground application.
pub async fn get_app_and_version(
    transport: &mut dyn Transport,
) -> Result<AppAndVersion, InstallError> {
    let response = transport::send(transport, &Apdu::get_app_and_version(), &[status::OK]).await?;
    AppAndVersion::decode(&response.data)
}

/// Ask the foreground application to exit.
pub async fn quit_app(transport: &mut dyn Transport) -> Result<(), InstallError> {
    transport::send(transport, &Apdu::quit_app(), &[status::OK]).await?;
    Ok(())
}

/// Cursor over a response payload made of length-prefixed fields.
pub(crate) struct ResponseReader<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> ResponseReader<'a> {
    pub(crate) fn new(buf: &'a [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.pos >= self.buf.len()
    }

    pub(crate) fn u8(&mut self) -> Result<u8, InstallError> {
        Ok(self.take(1)?[0])
    }

    pub(crate) fn u32_be(&mut self) -> Result<u32, InstallError> {
        let bytes = self.take(4)?;
        Ok(u32::from_be_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
    }

    pub(crate) fn take(&mut self, len: usize) -> Result<&'a [u8], InstallError> {
        let end = self.pos + len;
        if end > self.buf.len() {
            return Err(InstallError::invalid_response(format!(
                "expected {} bytes at offset {}, only {} left",
                len,
                self.pos,
                self.buf.len() - self.pos
            )));
        }
        let slice = &self.buf[self.pos..end];
        self.pos = end;
        Ok(slice)
    }

    /// One length byte followed by that many bytes.
    pub(crate) fn length_prefixed(&mut self) -> Result<&'a [u8], InstallError> {
        let len = self.u8()? as usize;
        self.take(len)
    }

    pub(crate) fn length_prefixed_string(&mut self) -> Result<String, InstallError> {
        let bytes = self.length_prefixed()?;
        Ok(String::from_utf8_lossy(bytes).into_owned())
    }
}
