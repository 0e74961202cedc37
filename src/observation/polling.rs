//! Observation for transports that cannot report device changes.
//!
//! The loop owns all of its scheduling state in [`PollingLoop`]: the tracked
//! device, the attempt in flight and one deadline per timer. A single
//! `select!` advances it. Whenever an attempt is abandoned, on timeout, on
//! a lasting disconnect or when the observation stops, it is cancelled and
//! its transport closed before the loop moves on.

use super::{
    run_finished, sleep_until_opt, start_run, DeviceObserver, EventSink, InstallEventStream,
    RunHandle, StopSignal,
};
use crate::executor::{InstallScriptExecutor, RunOutcome};
use crate::options::{ObservationMode, PollingOptions};
use crate::{Device, DeviceState, InstallError, InstallEvent, Language};
use std::sync::Arc;
use tokio::sync::{mpsc, watch};
use tokio::time::Instant;
use tracing::{debug, info, warn};

/// Retries the executor against the last device known to work.
///
/// - attempts run every `polling_interval`; an attempt that goes
///   `attempt_timeout` without any answer from the device is abandoned
/// - a disconnect is held back for `disconnect_debounce` and dropped if the
///   device answers again in the meantime
/// - any other failure stops polling and is surfaced at once
/// - consecutive identical events are emitted once
pub struct PollingObserver {
    executor: Arc<InstallScriptExecutor>,
    options: PollingOptions,
}

impl PollingObserver {
    pub fn new(executor: Arc<InstallScriptExecutor>, options: PollingOptions) -> Self {
        Self { executor, options }
    }
}

impl DeviceObserver for PollingObserver {
    fn observe(
        &self,
        devices: watch::Receiver<Option<Device>>,
        language: Language,
    ) -> InstallEventStream {
        let (tx, rx) = futures::channel::mpsc::unbounded();
        let observation = PollingLoop::new(
            Arc::clone(&self.executor),
            self.options.clone(),
            language,
            devices,
            EventSink::deduplicated(tx),
        );
        InstallEventStream::spawn(rx, |stop| observation.run(stop))
    }

    fn mode(&self) -> ObservationMode {
        ObservationMode::Polling
    }
}

struct PendingDisconnect {
    surface_at: Instant,
    error: InstallError,
}

struct PollingLoop {
    executor: Arc<InstallScriptExecutor>,
    options: PollingOptions,
    language: Language,
    devices: watch::Receiver<Option<Device>>,
    sink: EventSink,

    tracked: DeviceState,
    attempt: Option<RunHandle>,
    /// Moves forward each time the device answers during the attempt.
    attempt_deadline: Option<Instant>,
    next_poll: Option<Instant>,
    init_deadline: Option<Instant>,
    pending_disconnect: Option<PendingDisconnect>,
    stopped: bool,
}

impl PollingLoop {
    fn new(
        executor: Arc<InstallScriptExecutor>,
        options: PollingOptions,
        language: Language,
        devices: watch::Receiver<Option<Device>>,
        sink: EventSink,
    ) -> Self {
        Self {
            executor,
            options,
            language,
            devices,
            sink,
            tracked: DeviceState::NoDevice,
            attempt: None,
            attempt_deadline: None,
            next_poll: None,
            init_deadline: None,
            pending_disconnect: None,
            stopped: false,
        }
    }

    async fn run(mut self, mut stop: StopSignal) {
        let (run_tx, mut run_events) = mpsc::unbounded_channel();
        let now = Instant::now();
        self.observe_feed();
        self.next_poll = Some(now);
        self.init_deadline = Some(now + self.options.init_debounce);
        let mut feed_open = true;

        while !self.is_finished() {
            let surface_at = self.pending_disconnect.as_ref().map(|p| p.surface_at);

            tokio::select! {
                biased;
                _ = &mut stop => {
                    debug!("observation stopped");
                    self.stop();
                    self.abandon_attempt(&mut run_events).await;
                    break;
                }
                Some(event) = run_events.recv() => self.on_run_event(event),
                result = run_finished(&mut self.attempt) => {
                    self.attempt = None;
                    self.attempt_deadline = None;
                    while let Ok(event) = run_events.try_recv() {
                        self.on_run_event(event);
                    }
                    self.on_attempt_finished(result);
                }
                changed = self.devices.changed(), if feed_open => match changed {
                    Ok(()) => self.observe_feed(),
                    Err(_) => {
                        debug!("device feed closed");
                        feed_open = false;
                    }
                },
                _ = sleep_until_opt(self.attempt_deadline) => {
                    self.on_attempt_timeout(&mut run_events).await;
                }
                _ = sleep_until_opt(surface_at) => self.surface_disconnect(&mut run_events).await,
                _ = sleep_until_opt(self.init_deadline) => self.on_init_timeout(),
                _ = sleep_until_opt(self.next_poll) => {
                    self.next_poll = None;
                    self.poll(&run_tx);
                }
            }
        }
        debug!("polling stopped");
    }

    fn is_finished(&self) -> bool {
        self.stopped && self.attempt.is_none()
    }

    fn observe_feed(&mut self) {
        let current = self.devices.borrow_and_update().clone();
        if let Some(device) = current {
            debug!(device_id = %device.device_id, "device reported by feed");
            self.tracked.observe(device);
        }
    }

    fn poll(&mut self, run_tx: &mpsc::UnboundedSender<InstallEvent>) {
        let Some(device) = self.tracked.device().cloned() else {
            debug!("no device yet, waiting");
            self.schedule_poll();
            return;
        };

        debug!(device_id = %device.device_id, confirmed = self.tracked.is_confirmed(), "polling device");
        self.attempt = Some(start_run(&self.executor, &device, self.language, run_tx.clone()));
        self.attempt_deadline = Some(Instant::now() + self.options.attempt_timeout);
    }

    /// Cancel the attempt in flight, if any, and wait for its transport to
    /// close. Whatever it emitted meanwhile is dropped.
    async fn abandon_attempt(&mut self, run_events: &mut mpsc::UnboundedReceiver<InstallEvent>) {
        self.attempt_deadline = None;
        let Some(attempt) = self.attempt.take() else {
            return;
        };
        let outcome = attempt.cancel().await;
        debug!(?outcome, "attempt abandoned");
        while let Ok(event) = run_events.try_recv() {
            debug!(event = event.description(), "dropping event of abandoned attempt");
        }
    }

    async fn on_attempt_timeout(&mut self, run_events: &mut mpsc::UnboundedReceiver<InstallEvent>) {
        let limit = self.options.attempt_timeout;
        let product_name = self
            .attempt
            .as_ref()
            .map(|attempt| attempt.device().product_name());
        self.abandon_attempt(run_events).await;
        let Some(product_name) = product_name else {
            return;
        };
        info!(timeout_ms = limit.as_millis() as u64, "device silent for too long");
        self.on_error(InstallError::install_timeout(product_name, limit));
    }

    fn schedule_poll(&mut self) {
        if !self.stopped {
            self.next_poll = Some(Instant::now() + self.options.polling_interval);
        }
    }

    fn on_run_event(&mut self, event: InstallEvent) {
        match event {
            InstallEvent::UnresponsiveDevice => {
                debug!("device unresponsive, waiting");
            }
            InstallEvent::Error { error } => self.on_error(error),
            event => {
                if self.attempt.is_some() {
                    self.attempt_deadline = Some(Instant::now() + self.options.attempt_timeout);
                }
                // The device answered: whatever disconnect was pending was a blip.
                if self.pending_disconnect.take().is_some() {
                    info!("device back, disconnect absorbed");
                }
                if let Some(device) = self.tracked.confirm() {
                    info!(device_id = %device.device_id, "device confirmed");
                    self.sink.emit(InstallEvent::DeviceChange {
                        device: Some(device),
                    });
                }
                if self.tracked.is_confirmed() {
                    self.init_deadline = None;
                }

                let terminal = event.is_terminal();
                self.sink.emit(event);
                if terminal {
                    self.stop();
                }
            }
        }
    }

    fn on_attempt_finished(&mut self, result: Result<RunOutcome, InstallError>) {
        match result {
            Ok(RunOutcome::Installed) => debug!("attempt installed the language"),
            Ok(RunOutcome::AppQuitRequested) => debug!("app quit requested, polling again"),
            Ok(RunOutcome::Cancelled) => debug!("attempt cancelled"),
            Err(error) => self.on_error(error),
        }
        self.schedule_poll();
    }

    fn on_error(&mut self, error: InstallError) {
        if error.is_disconnect() {
            match &self.pending_disconnect {
                Some(_) => debug!(%error, "device still disconnected"),
                None => {
                    info!(%error, "disconnect held back");
                    self.pending_disconnect = Some(PendingDisconnect {
                        surface_at: Instant::now() + self.options.disconnect_debounce,
                        error,
                    });
                }
            }
            return;
        }

        warn!(%error, "stopping polling");
        self.stop();
        self.sink.emit(InstallEvent::error(error));
    }

    async fn surface_disconnect(&mut self, run_events: &mut mpsc::UnboundedReceiver<InstallEvent>) {
        let Some(pending) = self.pending_disconnect.take() else {
            return;
        };
        info!(error = %pending.error, "device did not come back");
        self.tracked.demote();
        self.stop();
        self.abandon_attempt(run_events).await;
        self.sink.emit(InstallEvent::error(pending.error));
    }

    fn on_init_timeout(&mut self) {
        self.init_deadline = None;
        if !self.tracked.is_confirmed() {
            info!(
                timeout_ms = self.options.init_debounce.as_millis() as u64,
                "no device answered in time"
            );
            self.sink.emit(InstallEvent::DeviceChange { device: None });
        }
    }

    fn stop(&mut self) {
        self.stopped = true;
        self.next_poll = None;
        self.init_deadline = None;
        self.pending_disconnect = None;
    }
}
