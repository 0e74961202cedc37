//! Observation driven by a device feed the transport keeps accurate.

use super::{
    run_finished, sleep_until_opt, start_run, DeviceObserver, EventSink, InstallEventStream,
    RunHandle, StopSignal,
};
use crate::executor::InstallScriptExecutor;
use crate::options::{EventDrivenOptions, ObservationMode};
use crate::{Device, InstallEvent, Language};
use std::sync::Arc;
use tokio::sync::{mpsc, watch};
use tokio::time::Instant;
use tracing::{debug, info};

/// Starts one executor run per stable, present device.
///
/// Feed changes are debounced by `device_debounce`; an absent device is
/// ignored, and so is a settled device equal to the one already running. A
/// new device cancels the run in progress and waits for its transport to
/// close before the next one opens, so two scripts never interleave on the
/// wire.
pub struct EventDrivenObserver {
    executor: Arc<InstallScriptExecutor>,
    options: EventDrivenOptions,
}

impl EventDrivenObserver {
    pub fn new(executor: Arc<InstallScriptExecutor>, options: EventDrivenOptions) -> Self {
        Self { executor, options }
    }
}

impl DeviceObserver for EventDrivenObserver {
    fn observe(
        &self,
        devices: watch::Receiver<Option<Device>>,
        language: Language,
    ) -> InstallEventStream {
        let (tx, rx) = futures::channel::mpsc::unbounded();
        let observation = EventDrivenLoop {
            executor: Arc::clone(&self.executor),
            options: self.options.clone(),
            language,
            devices,
            sink: EventSink::new(tx),
        };
        InstallEventStream::spawn(rx, |stop| observation.run(stop))
    }

    fn mode(&self) -> ObservationMode {
        ObservationMode::Event
    }
}

struct EventDrivenLoop {
    executor: Arc<InstallScriptExecutor>,
    options: EventDrivenOptions,
    language: Language,
    devices: watch::Receiver<Option<Device>>,
    sink: EventSink,
}

impl EventDrivenLoop {
    async fn run(mut self, mut stop: StopSignal) {
        let (run_tx, mut run_events) = mpsc::unbounded_channel();
        let mut run: Option<RunHandle> = None;
        // The value present at subscription counts as the first change.
        let mut settle_at = Some(Instant::now() + self.options.device_debounce);
        let mut feed_open = true;

        loop {
            tokio::select! {
                biased;
                _ = &mut stop => {
                    debug!("observation stopped");
                    break;
                }
                Some(event) = run_events.recv() => self.sink.emit(event),
                result = run_finished(&mut run) => {
                    run = None;
                    self.forward_pending(&mut run_events);
                    match result {
                        Ok(outcome) => debug!(?outcome, "run finished"),
                        Err(error) => {
                            info!(%error, "run failed");
                            self.sink.emit(InstallEvent::error(error));
                        }
                    }
                }
                changed = self.devices.changed(), if feed_open => match changed {
                    Ok(()) => settle_at = Some(Instant::now() + self.options.device_debounce),
                    Err(_) => {
                        debug!("device feed closed");
                        feed_open = false;
                    }
                },
                _ = sleep_until_opt(settle_at) => {
                    settle_at = None;
                    let current = self.devices.borrow_and_update().clone();
                    match current {
                        None => debug!("no device connected"),
                        Some(device) if run.as_ref().is_some_and(|r| r.device() == &device) => {
                            debug!(device_id = %device.device_id, "same device, run continues");
                        }
                        Some(device) => {
                            if let Some(previous) = run.take() {
                                let outcome = previous.cancel().await;
                                self.forward_pending(&mut run_events);
                                info!(?outcome, "device changed, previous run cancelled");
                            }
                            info!(device_id = %device.device_id, model = ?device.model_id, language = %self.language, "starting run");
                            run = Some(start_run(&self.executor, &device, self.language, run_tx.clone()));
                        }
                    }
                }
            }

            if !feed_open && settle_at.is_none() && run.is_none() {
                break;
            }
        }

        if let Some(run) = run.take() {
            let outcome = run.cancel().await;
            debug!(?outcome, "run cancelled on stop");
        }
        debug!("event-driven observation finished");
    }

    /// Forward what a finished or cancelled run emitted before it stopped.
    fn forward_pending(&mut self, run_events: &mut mpsc::UnboundedReceiver<InstallEvent>) {
        while let Ok(event) = run_events.try_recv() {
            self.sink.emit(event);
        }
    }
}
