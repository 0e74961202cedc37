//! Device references and the tracked-device state used while polling.

use serde::{Deserialize, Serialize};

/// Hardware model of a connected device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, strum::EnumIter)]
#[serde(rename_all = "camelCase")]
#[non_exhaustive]
pub enum DeviceModelId {
    Blue,
    NanoS,
    NanoSP,
    NanoX,
    Stax,
}

impl DeviceModelId {
    /// Human-readable product name, used in user-facing errors.
    ///
    /// # Example
    ///
    /// ```rust
    /// use hw_language_installer::DeviceModelId;
    ///
    /// assert_eq!(DeviceModelId::NanoX.product_name(), "Ledger Nano X");
    /// ```
    pub fn product_name(&self) -> &'static str {
        match self {
            Self::Blue => "Ledger Blue",
            Self::NanoS => "Ledger Nano S",
            Self::NanoSP => "Ledger Nano S Plus",
            Self::NanoX => "Ledger Nano X",
            Self::Stax => "Ledger Stax",
        }
    }
}

/// A device as reported by the transport layer.
///
/// The installer never owns the physical device; this is only a reference
/// used to open a transport.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Device {
    /// Transport-level connection id.
    pub device_id: String,
    /// Hardware model.
    pub model_id: DeviceModelId,
}

impl Device {
    pub fn new(device_id: impl Into<String>, model_id: DeviceModelId) -> Self {
        Self {
            device_id: device_id.into(),
            model_id,
        }
    }

    pub fn product_name(&self) -> &'static str {
        self.model_id.product_name()
    }
}

/// What the polling observer knows about the device.
///
/// A `Candidate` came from the device feed but has not answered yet; a
/// `Confirmed` device produced at least one protocol event.
///
/// # Example
///
/// ```rust
/// use hw_language_installer::{Device, DeviceModelId, DeviceState};
///
/// let mut state = DeviceState::default();
/// state.observe(Device::new("usb-1", DeviceModelId::NanoS));
/// assert!(state.is_candidate());
///
/// assert!(state.confirm().is_some());
/// assert!(state.is_confirmed());
///
/// // Confirming twice reports no new device.
/// assert!(state.confirm().is_none());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum DeviceState {
    #[default]
    NoDevice,
    Candidate(Device),
    Confirmed(Device),
}

impl DeviceState {
    /// The device to run against, confirmed or not.
    pub fn device(&self) -> Option<&Device> {
        match self {
            Self::NoDevice => None,
            Self::Candidate(device) | Self::Confirmed(device) => Some(device),
        }
    }

    pub fn is_candidate(&self) -> bool {
        matches!(self, Self::Candidate(_))
    }

    pub fn is_confirmed(&self) -> bool {
        matches!(self, Self::Confirmed(_))
    }

    /// Record a device coming from the feed.
    ///
    /// A confirmed device stays confirmed when the feed repeats it.
    pub fn observe(&mut self, device: Device) {
        if let Self::Confirmed(current) = self {
            if *current == device {
                return;
            }
        }
        *self = Self::Candidate(device);
    }

    /// Promote the candidate. Returns the device only on an actual change.
    pub fn confirm(&mut self) -> Option<Device> {
        match std::mem::take(self) {
            Self::Candidate(device) => {
                *self = Self::Confirmed(device.clone());
                Some(device)
            }
            other => {
                *self = other;
                None
            }
        }
    }

    /// Forget the confirmation but keep the device as a polling candidate.
    pub fn demote(&mut self) {
        if let Self::Confirmed(device) = std::mem::take(self) {
            *self = Self::Candidate(device);
        }
    }
}
