//! A language installation as the UI drives it.

use crate::executor::InstallScriptExecutor;
use crate::manager::ManagerApi;
use crate::observation::{observer_for, DeviceObserver, TaskGuard};
use crate::options::{InstallerConfig, StateOptions};
use crate::state::{publish_debounced, InstallationState};
use crate::transport::TransportOpener;
use crate::{Device, Language};
use futures::StreamExt;
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{debug, info};

/// Owns the device feed and the published state of one installation.
///
/// The UI pushes device references with [`set_device`](Self::set_device)
/// and renders [`states`](Self::states). Events flow observer, reducer,
/// debounce, then out.
///
/// # Example
///
/// ```rust,no_run
/// use hw_language_installer::{
///     Device, DeviceModelId, InstallLanguageSession, InstallerConfig, Language,
///     TransportCapability,
/// };
/// # use hw_language_installer::{manager::ManagerApi, transport::TransportOpener};
/// # use std::sync::Arc;
/// # async fn demo(opener: Arc<dyn TransportOpener>, api: Arc<dyn ManagerApi>) {
/// let config = InstallerConfig::for_capability(TransportCapability::PushesDeviceChanges);
/// let mut session = InstallLanguageSession::from_config(&config, opener, api, Language::French);
///
/// let mut states = session.states();
/// session.set_device(Some(Device::new("usb-1", DeviceModelId::NanoX)));
/// session.start();
///
/// while states.changed().await.is_ok() {
///     let state = states.borrow_and_update().clone();
///     println!("{:?}", state);
///     if state.is_terminal() {
///         break;
///     }
/// }
/// # }
/// ```
pub struct InstallLanguageSession {
    observer: Arc<dyn DeviceObserver>,
    language: Language,
    options: StateOptions,
    devices: watch::Sender<Option<Device>>,
    states: Arc<watch::Sender<InstallationState>>,
    task: Option<TaskGuard>,
}

impl InstallLanguageSession {
    pub fn new(observer: Arc<dyn DeviceObserver>, language: Language, options: StateOptions) -> Self {
        let (devices, _) = watch::channel(None);
        let (states, _) = watch::channel(InstallationState::Preparing);
        Self {
            observer,
            language,
            options,
            devices,
            states: Arc::new(states),
            task: None,
        }
    }

    /// Build the executor and the observer `config` selects.
    pub fn from_config(
        config: &InstallerConfig,
        opener: Arc<dyn TransportOpener>,
        api: Arc<dyn ManagerApi>,
        language: Language,
    ) -> Self {
        let executor = Arc::new(InstallScriptExecutor::new(
            opener,
            api,
            config.executor.clone(),
        ));
        Self::new(
            observer_for(config, executor),
            language,
            config.state.clone(),
        )
    }

    pub fn language(&self) -> Language {
        self.language
    }

    /// Report the current device, or `None` when it went away.
    ///
    /// Reporting the device already known is a no-op, so a run in progress
    /// is not restarted.
    pub fn set_device(&self, device: Option<Device>) {
        let changed = self.devices.send_if_modified(|current| {
            if *current == device {
                return false;
            }
            *current = device;
            true
        });
        if !changed {
            debug!(language = %self.language, "device unchanged");
        }
    }

    /// Debounced installation states.
    pub fn states(&self) -> watch::Receiver<InstallationState> {
        self.states.subscribe()
    }

    /// Last published state.
    pub fn state(&self) -> InstallationState {
        self.states.borrow().clone()
    }

    pub fn is_running(&self) -> bool {
        self.task.is_some()
    }

    /// Start observing. Does nothing if already started.
    ///
    /// Must be called within a tokio runtime.
    pub fn start(&mut self) {
        if self.task.is_some() {
            return;
        }

        let language = self.language;
        info!(%language, mode = ?self.observer.mode(), "starting language installation");
        let mut stream = self.observer.observe(self.devices.subscribe(), language);
        let states = Arc::clone(&self.states);
        let window = self.options.state_debounce;
        let initial = self.state();

        self.task = Some(TaskGuard::spawn(move |mut stop| async move {
            let events = (&mut stream).inspect(move |event| {
                info!(%language, event = event.description(), "{:?}", event);
            });
            tokio::select! {
                biased;
                _ = &mut stop => debug!(%language, "publishing stopped"),
                _ = publish_debounced(events, initial, window, &states) => {
                    debug!(%language, "observation ended");
                }
            }
            // Waits for the run in progress to release the device.
            stream.shutdown().await;
        }));
    }

    /// Throw away the current attempt and start over from the beginning.
    ///
    /// The previous run has closed its transport by the time the new one
    /// opens.
    pub async fn retry(&mut self) {
        info!(language = %self.language, "retrying language installation");
        if let Some(task) = self.task.take() {
            task.shutdown().await;
        }
        self.states.send_replace(InstallationState::Preparing);
        self.start();
    }

    /// Stop observing. The last published state is kept.
    ///
    /// The run in progress is cancelled and closes its transport in the
    /// background.
    pub fn cancel(&mut self) {
        if self.task.take().is_some() {
            info!(language = %self.language, "language installation cancelled");
        }
    }
}
