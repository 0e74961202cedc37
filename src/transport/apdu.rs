//! APDU command framing and response status trailers.

use crate::InstallError;

/// Status words with a meaning to the installer.
pub mod status {
    /// Command succeeded.
    pub const OK: u16 = 0x9000;
    /// User refused on the device, or the language was already absent.
    pub const REFUSED_OR_ABSENT: u16 = 0x5501;

    /// Statuses returned by the dashboard-only commands while an app is open.
    pub const APP_OPEN: [u16; 5] = [0x6e00, 0x6d00, 0x6e01, 0x6d01, 0x6d02];

    /// Whether `status` means an application is in the foreground.
    pub fn is_app_open(status: u16) -> bool {
        APP_OPEN.contains(&status)
    }
}

/// A command APDU: class, instruction, two parameters and a data field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Apdu {
    pub cla: u8,
    pub ins: u8,
    pub p1: u8,
    pub p2: u8,
    pub data: Vec<u8>,
}

impl Apdu {
    pub fn new(cla: u8, ins: u8, p1: u8, p2: u8) -> Self {
        Self {
            cla,
            ins,
            p1,
            p2,
            data: Vec::new(),
        }
    }

    /// Dashboard version and target id.
    pub fn get_device_info() -> Self {
        Self::new(0xe0, 0x01, 0x00, 0x00)
    }

    /// Name and version of the foreground application.
    pub fn get_app_and_version() -> Self {
        Self::new(0xb0, 0x01, 0x00, 0x00)
    }

    /// Ask the foreground application to exit to the dashboard.
    pub fn quit_app() -> Self {
        Self::new(0xb0, 0xa7, 0x00, 0x00)
    }

    /// Remove the language pack stored in slot `language_id`.
    pub fn uninstall_language(language_id: u8) -> Self {
        Self::new(0xe0, 0x33, language_id, 0x00)
    }

    /// Serialize as `CLA INS P1 P2 Lc DATA`.
    ///
    /// # Example
    ///
    /// ```rust
    /// use hw_language_installer::transport::Apdu;
    ///
    /// let bytes = Apdu::uninstall_language(0x01).to_bytes().unwrap();
    /// assert_eq!(bytes, vec![0xe0, 0x33, 0x01, 0x00, 0x00]);
    /// ```
    pub fn to_bytes(&self) -> Result<Vec<u8>, InstallError> {
        let lc = u8::try_from(self.data.len()).map_err(|_| {
            InstallError::transport(format!(
                "APDU data of {} bytes exceeds 255",
                self.data.len()
            ))
        })?;

        let mut bytes = Vec::with_capacity(5 + self.data.len());
        bytes.extend_from_slice(&[self.cla, self.ins, self.p1, self.p2, lc]);
        bytes.extend_from_slice(&self.data);
        Ok(bytes)
    }
}

/// A response APDU split into payload and status trailer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApduResponse {
    pub data: Vec<u8>,
    pub status: u16,
}

impl ApduResponse {
    /// Split raw response bytes. The last two bytes are the status word.
    ///
    /// # Example
    ///
    /// ```rust
    /// use hw_language_installer::transport::ApduResponse;
    ///
    /// let response = ApduResponse::parse(&[0x01, 0x02, 0x90, 0x00]).unwrap();
    /// assert_eq!(response.data, vec![0x01, 0x02]);
    /// assert!(response.is_ok());
    /// ```
    pub fn parse(raw: &[u8]) -> Result<Self, InstallError> {
        if raw.len() < 2 {
            return Err(InstallError::invalid_response(format!(
                "response of {} bytes has no status word",
                raw.len()
            )));
        }
        let (data, trailer) = raw.split_at(raw.len() - 2);
        Ok(Self {
            data: data.to_vec(),
            status: u16::from_be_bytes([trailer[0], trailer[1]]),
        })
    }

    pub fn is_ok(&self) -> bool {
        self.status == status::OK
    }
}
