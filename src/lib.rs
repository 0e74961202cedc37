//! # hw-language-installer
//!
//! Installs language packs on USB and BLE hardware wallets.
//!
//! An installation reads the device identity, leaves any open app, fetches
//! the matching APDU script from the manager API, clears the language slots
//! and replays the script one exchange at a time. Progress is reported as
//! [`InstallEvent`]s and folded into an [`InstallationState`] for the UI.
//!
//! ## Features
//!
//! - [`InstallScriptExecutor`] running one installation against one device
//! - Event-driven and polling [`observation`] strategies, chosen from the
//!   transport's [`TransportCapability`]
//! - [`reduce`] and a debounced state publisher for the UI
//! - [`InstallLanguageSession`] tying the pieces together, with retry
//!
//! ## Example
//!
//! ```rust,no_run
//! use hw_language_installer::manager::{HttpManagerApi, HttpManagerApiOptions};
//! use hw_language_installer::{
//!     Device, DeviceModelId, InstallLanguageSession, InstallerConfig, Language,
//!     TransportCapability,
//! };
//! # use hw_language_installer::transport::TransportOpener;
//! use std::sync::Arc;
//!
//! # async fn demo(opener: Arc<dyn TransportOpener>) -> Result<(), hw_language_installer::InstallError> {
//! let api = Arc::new(HttpManagerApi::new(HttpManagerApiOptions::default())?);
//! let config = InstallerConfig::for_capability(TransportCapability::RequiresPolling);
//!
//! let mut session = InstallLanguageSession::from_config(&config, opener, api, Language::German);
//! session.set_device(Some(Device::new("ble-1", DeviceModelId::NanoX)));
//! session.start();
//!
//! let mut states = session.states();
//! while states.changed().await.is_ok() {
//!     println!("{:?}", *states.borrow_and_update());
//! }
//! # Ok(())
//! # }
//! ```

mod device;
mod errors;
mod events;
mod executor;
mod language;
mod options;
mod script;
mod session;
mod state;

pub mod manager;
pub mod observation;
pub mod probe;
pub mod transport;

pub use device::{Device, DeviceModelId, DeviceState};
pub use errors::{ErrorCategory, InstallError};
pub use events::{InstallEvent, PERMISSION_WORDING};
pub use executor::{InstallScriptExecutor, Phase, RunOutcome};
pub use language::Language;
pub use options::{
    EventDrivenOptions, ExecutorOptions, InstallerConfig, ObservationMode, PollingOptions,
    StateOptions, TransportCapability,
};
pub use script::{ApduScript, ScriptApdu};
pub use session::InstallLanguageSession;
pub use state::{publish_debounced, reduce, replay, InstallationState};
