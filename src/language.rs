//! Languages that can be installed on a device.

use serde::{Deserialize, Serialize};
use strum::IntoEnumIterator;

/// A device language pack.
///
/// Each variant has a stable on-device id used by the uninstall command,
/// and a lowercase string form used by the manager API.
///
/// # Example
///
/// ```rust
/// use hw_language_installer::Language;
///
/// assert_eq!(Language::French.id(), 0x01);
/// assert_eq!(Language::French.as_str(), "french");
/// assert_eq!("spanish".parse::<Language>().unwrap(), Language::Spanish);
/// ```
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    strum::EnumIter,
    strum::EnumString,
    strum::Display,
    strum::IntoStaticStr,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
#[non_exhaustive]
pub enum Language {
    English,
    French,
    Spanish,
    Brazilian,
    German,
    Russian,
    Turkish,
}

impl Language {
    /// Id of the language slot on the device.
    pub fn id(&self) -> u8 {
        match self {
            Self::English => 0x00,
            Self::French => 0x01,
            Self::Spanish => 0x02,
            Self::Brazilian => 0x03,
            Self::German => 0x04,
            Self::Russian => 0x05,
            Self::Turkish => 0x06,
        }
    }

    /// Name used by the manager API.
    pub fn as_str(&self) -> &'static str {
        self.into()
    }

    /// Iterator over every known language, in id order.
    pub fn all() -> impl Iterator<Item = Self> {
        <Self as IntoEnumIterator>::iter()
    }
}
