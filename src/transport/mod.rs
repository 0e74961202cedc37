//! Transport boundary to the device.
//!
//! The concrete USB and BLE transports live outside this crate. They plug in
//! through [`Transport`] (one open channel) and [`TransportOpener`] (open a
//! channel for a device id).
//!
//! Exchanges take `&mut self`, so a transport never has more than one APDU
//! in flight.

mod apdu;

pub use apdu::{status, Apdu, ApduResponse};

use crate::InstallError;
use async_trait::async_trait;

/// An open channel to one device.
#[async_trait]
pub trait Transport: Send {
    /// Send raw APDU bytes and return the raw response, status trailer included.
    ///
    /// Implementations report a vanished device as
    /// [`InstallError::DisconnectedDeviceDuringOperation`].
    async fn exchange(&mut self, apdu: &[u8]) -> Result<Vec<u8>, InstallError>;

    /// Release the channel.
    async fn close(&mut self) -> Result<(), InstallError> {
        Ok(())
    }
}

/// Opens transports by device id.
#[async_trait]
pub trait TransportOpener: Send + Sync {
    async fn open(&self, device_id: &str) -> Result<Box<dyn Transport>, InstallError>;
}

/// Exchange a command and check its status word against `accepted`.
///
/// Any status outside `accepted` becomes [`InstallError::TransportError`]
/// carrying that status.
pub async fn send(
    transport: &mut dyn Transport,
    command: &Apdu,
    accepted: &[u16],
) -> Result<ApduResponse, InstallError> {
    let raw = transport.exchange(&command.to_bytes()?).await?;
    let response = ApduResponse::parse(&raw)?;
    if !accepted.contains(&response.status) {
        return Err(InstallError::unexpected_status(response.status));
    }
    Ok(response)
}
