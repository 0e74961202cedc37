//! Device observation strategies.
//!
//! An observer turns a feed of "current device" values into a stream of
//! [`InstallEvent`]s by running the [`InstallScriptExecutor`] whenever a
//! usable device is available. Two strategies share that contract:
//!
//! - [`EventDrivenObserver`]: the transport pushes device changes, the feed
//!   is trusted and every stable device starts a fresh run.
//! - [`PollingObserver`]: the transport cannot push changes, so the executor
//!   is retried against the last known device on a timer.
//!
//! The strategy is chosen once from the transport capability, see
//! [`observer_for`].

mod event_driven;
mod polling;

pub use event_driven::EventDrivenObserver;
pub use polling::PollingObserver;

use crate::executor::{InstallScriptExecutor, RunOutcome};
use crate::options::{InstallerConfig, ObservationMode};
use crate::{Device, InstallError, InstallEvent, Language};
use futures::channel::mpsc::{UnboundedReceiver, UnboundedSender};
use futures::{Stream, StreamExt};
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, warn};

/// Produces install events from a device feed.
pub trait DeviceObserver: Send + Sync {
    /// Start observing. Must be called within a tokio runtime.
    ///
    /// Each call starts an independent observation; dropping the returned
    /// stream cancels it, including any run in progress. A cancelled run
    /// always closes its transport.
    fn observe(
        &self,
        devices: watch::Receiver<Option<Device>>,
        language: Language,
    ) -> InstallEventStream;

    /// The strategy this observer implements.
    fn mode(&self) -> ObservationMode;
}

/// Build the observer selected by `config.mode`.
///
/// # Example
///
/// ```rust,no_run
/// use hw_language_installer::observation::observer_for;
/// use hw_language_installer::{InstallScriptExecutor, InstallerConfig, TransportCapability};
/// # use std::sync::Arc;
/// # fn demo(executor: Arc<InstallScriptExecutor>) {
/// let config = InstallerConfig::for_capability(TransportCapability::RequiresPolling);
/// let observer = observer_for(&config, executor);
/// # }
/// ```
pub fn observer_for(
    config: &InstallerConfig,
    executor: Arc<InstallScriptExecutor>,
) -> Arc<dyn DeviceObserver> {
    match config.mode {
        ObservationMode::Event => Arc::new(EventDrivenObserver::new(executor, config.event.clone())),
        ObservationMode::Polling => Arc::new(PollingObserver::new(executor, config.polling.clone())),
    }
}

/// Stream of events from one observation.
///
/// Ends when the observation has nothing left to do. Dropping it asks the
/// background task to stop; the run in progress is cancelled and its
/// transport closed in the background.
pub struct InstallEventStream {
    events: UnboundedReceiver<InstallEvent>,
    task: TaskGuard,
}

impl InstallEventStream {
    pub(crate) fn spawn<T, Fut>(events: UnboundedReceiver<InstallEvent>, task: T) -> Self
    where
        T: FnOnce(StopSignal) -> Fut,
        Fut: Future<Output = ()> + Send + 'static,
    {
        Self {
            events,
            task: TaskGuard::spawn(task),
        }
    }

    /// Stop the observation and wait until its run has released the device.
    pub async fn shutdown(self) {
        self.task.shutdown().await;
    }
}

impl Stream for InstallEventStream {
    type Item = InstallEvent;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.get_mut().events.poll_next_unpin(cx)
    }
}

/// Resolves when the owner of a [`TaskGuard`] wants the task to wind down.
///
/// Also resolves if the guard is gone. Must not be polled again once it
/// has resolved.
pub(crate) type StopSignal = oneshot::Receiver<()>;

/// Owns a spawned task that winds down on request.
///
/// Dropping the guard signals the task and detaches it, so teardown such as
/// closing a transport still completes.
pub(crate) struct TaskGuard {
    stop: Option<oneshot::Sender<()>>,
    handle: Option<JoinHandle<()>>,
}

impl TaskGuard {
    pub(crate) fn spawn<T, Fut>(task: T) -> Self
    where
        T: FnOnce(StopSignal) -> Fut,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let (stop, stopped) = oneshot::channel();
        Self {
            stop: Some(stop),
            handle: Some(tokio::spawn(task(stopped))),
        }
    }

    /// Signal the task without waiting for it.
    pub(crate) fn stop(&mut self) {
        if let Some(stop) = self.stop.take() {
            let _ = stop.send(());
        }
    }

    /// Signal the task and wait until it has finished.
    pub(crate) async fn shutdown(mut self) {
        self.stop();
        if let Some(handle) = self.handle.take() {
            if let Err(e) = handle.await {
                warn!(error = %e, "observation task failed");
            }
        }
    }
}

impl Drop for TaskGuard {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Output side of an observer.
///
/// With `dedupe` set, an event structurally equal to the previous one is
/// dropped.
pub(crate) struct EventSink {
    tx: UnboundedSender<InstallEvent>,
    last: Option<InstallEvent>,
    dedupe: bool,
}

impl EventSink {
    pub(crate) fn new(tx: UnboundedSender<InstallEvent>) -> Self {
        Self {
            tx,
            last: None,
            dedupe: false,
        }
    }

    pub(crate) fn deduplicated(tx: UnboundedSender<InstallEvent>) -> Self {
        Self {
            dedupe: true,
            ..Self::new(tx)
        }
    }

    pub(crate) fn emit(&mut self, event: InstallEvent) {
        if self.dedupe && self.last.as_ref() == Some(&event) {
            return;
        }
        debug!(target: "install_language", event = event.description(), "{:?}", event);
        if self.dedupe {
            self.last = Some(event.clone());
        }
        // The consumer may already be gone; the task is stopping then.
        let _ = self.tx.unbounded_send(event);
    }
}

type RunFuture = Pin<Box<dyn Future<Output = Result<RunOutcome, InstallError>> + Send>>;

/// One executor run against one device.
pub(crate) struct RunHandle {
    device: Device,
    cancel: Option<oneshot::Sender<()>>,
    future: RunFuture,
}

impl RunHandle {
    pub(crate) fn device(&self) -> &Device {
        &self.device
    }

    /// Stop the run and wait until its transport is closed.
    pub(crate) async fn cancel(mut self) -> Result<RunOutcome, InstallError> {
        if let Some(cancel) = self.cancel.take() {
            let _ = cancel.send(());
        }
        self.future.await
    }
}

/// Start one executor run whose events go to `events`.
pub(crate) fn start_run(
    executor: &Arc<InstallScriptExecutor>,
    device: &Device,
    language: Language,
    events: mpsc::UnboundedSender<InstallEvent>,
) -> RunHandle {
    let executor = Arc::clone(executor);
    let device_id = device.device_id.clone();
    let (cancel, cancelled) = oneshot::channel::<()>();
    let future = Box::pin(async move {
        executor
            .run_until(
                &device_id,
                language,
                move |event| {
                    let _ = events.send(event);
                },
                async move {
                    let _ = cancelled.await;
                },
            )
            .await
    });
    RunHandle {
        device: device.clone(),
        cancel: Some(cancel),
        future,
    }
}

/// Completes with the run's result, or never when there is no run.
pub(crate) async fn run_finished(run: &mut Option<RunHandle>) -> Result<RunOutcome, InstallError> {
    match run {
        Some(run) => (&mut run.future).await,
        None => futures::future::pending().await,
    }
}

/// Sleeps until `deadline`, or forever when there is none.
pub(crate) async fn sleep_until_opt(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(deadline).await,
        None => futures::future::pending().await,
    }
}
