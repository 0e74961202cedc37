//! Decoding of the dashboard device info response.

use super::ResponseReader;
use crate::InstallError;
use serde::{Deserialize, Serialize};

/// Provider id used when resolving firmware metadata.
pub const DEFAULT_PROVIDER_ID: u32 = 1;

/// Identity of the device, valid for the connection that produced it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceInfo {
    /// Hardware target id.
    pub target_id: u32,
    /// Secure element firmware version, e.g. `2.1.0`.
    pub version: String,
    /// MCU firmware version.
    pub mcu_version: String,
    /// Raw device flags.
    pub flags: Vec<u8>,
    /// Firmware provider.
    pub provider_id: u32,
}

impl DeviceInfo {
    /// Decode `target_id(4) | len version | len flags | len mcu_version`.
    ///
    /// Older firmwares stop after the version; flags and MCU version are
    /// then empty. The MCU version is NUL terminated on some models.
    pub fn decode(data: &[u8]) -> Result<Self, InstallError> {
        let mut reader = ResponseReader::new(data);
        let target_id = reader.u32_be()?;
        let version = reader.length_prefixed_string()?;

        let flags = if reader.is_empty() {
            Vec::new()
        } else {
            reader.length_prefixed()?.to_vec()
        };

        let mcu_version = if reader.is_empty() {
            String::new()
        } else {
            reader
                .length_prefixed_string()?
                .trim_end_matches('\0')
                .to_string()
        };

        Ok(Self {
            target_id,
            version,
            mcu_version,
            flags,
            provider_id: DEFAULT_PROVIDER_ID,
        })
    }
}
