//! Install scripts: ordered lists of hex-encoded APDUs.

use crate::InstallError;
use std::str::FromStr;

/// Hex prefix of APDUs that block until the user approves on the device.
const CONFIRMATION_PREFIX: &str = "e030";

/// One line of an install script.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScriptApdu {
    hex: String,
    bytes: Vec<u8>,
}

impl ScriptApdu {
    /// Lowercase hex form, as it appeared in the script.
    pub fn hex(&self) -> &str {
        &self.hex
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Whether the device will wait for physical approval on this command.
    pub fn requires_confirmation(&self) -> bool {
        self.hex.starts_with(CONFIRMATION_PREFIX)
    }
}

/// An install script. Order is significant and preserved.
///
/// # Example
///
/// ```rust
/// use hw_language_installer::ApduScript;
///
/// let script: ApduScript = "e0300000\r\n\ne0310000\n".parse().unwrap();
/// assert_eq!(script.len(), 2);
/// assert!(script.apdus()[0].requires_confirmation());
/// assert!(!script.apdus()[1].requires_confirmation());
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApduScript {
    apdus: Vec<ScriptApdu>,
}

impl ApduScript {
    /// Parse a script body: one hex APDU per line, blank lines dropped.
    ///
    /// An empty script is an error since it could never report completion.
    pub fn parse(body: &str) -> Result<Self, InstallError> {
        let mut apdus = Vec::new();

        for (index, line) in body.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            let hex = line.to_ascii_lowercase();
            let bytes = hex::decode(&hex)
                .map_err(|e| InstallError::invalid_script(index + 1, e.to_string()))?;
            apdus.push(ScriptApdu { hex, bytes });
        }

        if apdus.is_empty() {
            return Err(InstallError::invalid_script(0, "script contains no APDU"));
        }
        Ok(Self { apdus })
    }

    pub fn apdus(&self) -> &[ScriptApdu] {
        &self.apdus
    }

    pub fn len(&self) -> usize {
        self.apdus.len()
    }

    pub fn is_empty(&self) -> bool {
        self.apdus.is_empty()
    }
}

impl FromStr for ApduScript {
    type Err = InstallError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_preserves_order() {
        let script = ApduScript::parse("e0010000\ne0300000\nE0310000").unwrap();
        let hex: Vec<&str> = script.apdus().iter().map(|a| a.hex()).collect();
        assert_eq!(hex, vec!["e0010000", "e0300000", "e0310000"]);
        assert_eq!(script.apdus()[0].bytes(), &[0xe0, 0x01, 0x00, 0x00]);
    }

    #[test]
    fn test_parse_handles_crlf_and_blank_lines() {
        let script = ApduScript::parse("\r\ne0010000\r\n\r\n\r\ne0020000\r\n").unwrap();
        assert_eq!(script.len(), 2);
    }

    #[test]
    fn test_uppercase_prefix_requires_confirmation() {
        let script = ApduScript::parse("E030000000").unwrap();
        assert!(script.apdus()[0].requires_confirmation());
    }

    #[test]
    fn test_invalid_hex_reports_line() {
        let err = ApduScript::parse("e0010000\n\nzz00").unwrap_err();
        match err {
            InstallError::InvalidScript { line, .. } => assert_eq!(line, 3),
            other => panic!("unexpected error {:?}", other),
        }
    }

    #[test]
    fn test_empty_script_rejected() {
        assert!(ApduScript::parse("\n\r\n").is_err());
    }
}
