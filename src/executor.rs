//! Install script execution.
//!
//! This module provides [`InstallScriptExecutor`], which drives one device
//! through a language installation:
//!
//! 1. **ResolvingContext**: read the device info
//! 2. **MaybeQuittingApp**: leave the foreground app if one is open
//! 3. **FetchingScript**: resolve the language package and download its script
//! 4. **Uninstalling**: clear every language slot
//! 5. **InstallingApdus**: replay the script, strictly in order
//! 6. **Completed**
//!
//! A run reports through a callback and never mutates UI state. A run
//! started with [`InstallScriptExecutor::run_until`] stops when its cancel
//! future resolves: the pending exchange is abandoned, no further APDU is
//! sent and the transport is closed before the call returns.

use crate::manager::{ManagerApi, PackageResolver};
use crate::options::ExecutorOptions;
use crate::probe::{self, DeviceInfo};
use crate::transport::{self, status, Apdu, ApduResponse, Transport, TransportOpener};
use crate::{ApduScript, InstallError, InstallEvent, Language};
use std::future::Future;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Phases of a run, used for logging.
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display)]
pub enum Phase {
    ResolvingContext,
    MaybeQuittingApp,
    FetchingScript,
    Uninstalling,
    InstallingApdus,
    Completed,
}

/// How a run ended when it did not fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunOutcome {
    /// The whole script was accepted by the device.
    Installed,
    /// The foreground app was asked to quit; the next run starts over once
    /// the device is back.
    AppQuitRequested,
    /// The owner cancelled the run before it finished.
    Cancelled,
}

/// Runs install scripts against devices.
///
/// # Example
///
/// ```rust,no_run
/// use hw_language_installer::{ExecutorOptions, InstallScriptExecutor, Language};
/// # use hw_language_installer::{manager::ManagerApi, transport::TransportOpener};
/// # use std::sync::Arc;
/// # async fn demo(opener: Arc<dyn TransportOpener>, api: Arc<dyn ManagerApi>) {
/// let executor = InstallScriptExecutor::new(opener, api, ExecutorOptions::default());
///
/// let result = executor
///     .run("usb-1", Language::French, |event| println!("{:?}", event))
///     .await;
///
/// match result {
///     Ok(outcome) => println!("Finished: {:?}", outcome),
///     Err(e) => println!("Failed: {}. Fix: {}", e, e.fix_suggestion()),
/// }
/// # }
/// ```
pub struct InstallScriptExecutor {
    opener: Arc<dyn TransportOpener>,
    api: Arc<dyn ManagerApi>,
    options: ExecutorOptions,
}

impl InstallScriptExecutor {
    pub fn new(
        opener: Arc<dyn TransportOpener>,
        api: Arc<dyn ManagerApi>,
        options: ExecutorOptions,
    ) -> Self {
        Self {
            opener,
            api,
            options,
        }
    }

    pub fn options(&self) -> &ExecutorOptions {
        &self.options
    }

    /// Open a transport to `device_id` and run the installation on it.
    ///
    /// The transport is closed when the run ends, successful or not.
    pub async fn run<F>(
        &self,
        device_id: &str,
        language: Language,
        on_event: F,
    ) -> Result<RunOutcome, InstallError>
    where
        F: FnMut(InstallEvent) + Send,
    {
        self.run_until(device_id, language, on_event, futures::future::pending())
            .await
    }

    /// [`run`](Self::run), stopped early once `cancelled` resolves.
    ///
    /// Cancellation abandons the exchange in flight and returns
    /// [`RunOutcome::Cancelled`] only after the transport is closed, so the
    /// caller may open the device again right away.
    pub async fn run_until<F, C>(
        &self,
        device_id: &str,
        language: Language,
        mut on_event: F,
        cancelled: C,
    ) -> Result<RunOutcome, InstallError>
    where
        F: FnMut(InstallEvent) + Send,
        C: Future<Output = ()> + Send,
    {
        let mut transport = self.opener.open(device_id).await?;
        let result = tokio::select! {
            biased;
            _ = cancelled => {
                info!(device_id, "run cancelled");
                Ok(RunOutcome::Cancelled)
            }
            result = self.run_on(transport.as_mut(), language, &mut on_event) => result,
        };

        if let Err(e) = transport.close().await {
            warn!(device_id, error = %e, "failed to close transport");
        }
        result
    }

    /// Run the installation on an already open transport.
    pub async fn run_on<F>(
        &self,
        transport: &mut dyn Transport,
        language: Language,
        on_event: &mut F,
    ) -> Result<RunOutcome, InstallError>
    where
        F: FnMut(InstallEvent) + Send,
    {
        debug!(phase = %Phase::ResolvingContext, %language, "starting run");
        let info = match self
            .guarded(
                Phase::ResolvingContext,
                probe::get_device_info(transport),
                on_event,
            )
            .await
        {
            Ok(info) => info,
            Err(InstallError::DeviceOnDashboardExpected { .. }) => {
                return self.quit_app(transport, on_event).await;
            }
            Err(e) => return Err(e),
        };

        let script = self.fetch_script(&info, language).await?;
        self.uninstall_all(transport, on_event).await?;
        self.install(transport, &script, on_event).await?;

        info!(phase = %Phase::Completed, %language, apdus = script.len(), "language installed");
        on_event(InstallEvent::InstallationCompleted);
        Ok(RunOutcome::Installed)
    }

    async fn quit_app<F>(
        &self,
        transport: &mut dyn Transport,
        on_event: &mut F,
    ) -> Result<RunOutcome, InstallError>
    where
        F: FnMut(InstallEvent) + Send,
    {
        let app = self
            .guarded(
                Phase::MaybeQuittingApp,
                probe::get_app_and_version(transport),
                on_event,
            )
            .await?;

        if app.is_dashboard() {
            warn!(app = %app.name, "device info refused on dashboard");
            return Err(InstallError::dashboard_expected());
        }

        debug!(phase = %Phase::MaybeQuittingApp, app = %app.name, version = %app.version, "app detected");
        on_event(InstallEvent::AppDetected);

        if !probe::app_supports_quit_app(&app) {
            info!(app = %app.name, "app cannot be quit remotely");
            return Err(InstallError::dashboard_expected());
        }

        probe::quit_app(transport).await?;
        info!(app = %app.name, "requested app quit");
        // The device drops off the bus while it switches back to the dashboard.
        on_event(InstallEvent::UnresponsiveDevice);
        Ok(RunOutcome::AppQuitRequested)
    }

    async fn fetch_script(
        &self,
        info: &DeviceInfo,
        language: Language,
    ) -> Result<ApduScript, InstallError> {
        debug!(phase = %Phase::FetchingScript, target_id = info.target_id, version = %info.version);
        let resolver = PackageResolver::new(self.api.as_ref());
        let package = resolver.resolve_for_device(info, language).await?;
        let script = resolver.fetch_script(&package).await?;
        debug!(apdus = script.len(), url = %package.install_apdu_script_url, "script fetched");
        Ok(script)
    }

    async fn uninstall_all<F>(
        &self,
        transport: &mut dyn Transport,
        on_event: &mut F,
    ) -> Result<(), InstallError>
    where
        F: FnMut(InstallEvent) + Send,
    {
        debug!(phase = %Phase::Uninstalling);
        let accepted = [status::OK, status::REFUSED_OR_ABSENT];

        for (n, language) in Language::all().enumerate() {
            let command = Apdu::uninstall_language(language.id());
            let exchange = transport::send(transport, &command, &accepted);
            if n == 0 {
                self.guarded(Phase::Uninstalling, exchange, on_event).await?;
            } else {
                exchange.await?;
            }
        }
        Ok(())
    }

    async fn install<F>(
        &self,
        transport: &mut dyn Transport,
        script: &ApduScript,
        on_event: &mut F,
    ) -> Result<(), InstallError>
    where
        F: FnMut(InstallEvent) + Send,
    {
        debug!(phase = %Phase::InstallingApdus, apdus = script.len());
        let total = script.len();

        for (index, apdu) in script.apdus().iter().enumerate() {
            let gated = apdu.requires_confirmation();
            if gated {
                debug!(index, "waiting for approval on device");
                on_event(InstallEvent::permission_requested());
            }

            let exchange = transport.exchange(apdu.bytes());
            let raw = if index == 0 && !gated {
                self.guarded(Phase::InstallingApdus, exchange, on_event).await?
            } else {
                exchange.await?
            };

            let response = ApduResponse::parse(&raw)?;
            match response.status {
                status::OK => {}
                status::REFUSED_OR_ABSENT => {
                    info!(index, "installation refused on device");
                    return Err(InstallError::refused_on_device(response.status));
                }
                other => {
                    warn!(index, status = %format!("0x{:04x}", other), "unexpected status");
                    return Err(InstallError::unexpected_status(other));
                }
            }

            on_event(InstallEvent::progress((index + 1) as f64 / total as f64));
        }
        Ok(())
    }

    /// Await `fut`, emitting `UnresponsiveDevice` if it has not resolved
    /// within the unresponsive window. The wait continues afterwards.
    async fn guarded<T, F>(
        &self,
        phase: Phase,
        fut: impl Future<Output = T>,
        on_event: &mut F,
    ) -> T
    where
        F: FnMut(InstallEvent) + Send,
    {
        tokio::pin!(fut);
        tokio::select! {
            biased;
            out = &mut fut => return out,
            _ = tokio::time::sleep(self.options.unresponsive_after) => {
                debug!(%phase, "device unresponsive");
                on_event(InstallEvent::UnresponsiveDevice);
            }
        }
        fut.await
    }
}
