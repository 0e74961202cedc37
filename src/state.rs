//! UI-facing installation state.
//!
//! [`reduce`] folds protocol events into an [`InstallationState`].
//! [`publish_debounced`] feeds a stream of events through it and publishes
//! the result once it has been stable for the state debounce window.

use crate::observation::sleep_until_opt;
use crate::{InstallError, InstallEvent};
use futures::{Stream, StreamExt};
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::Instant;
use tracing::trace;

/// What the UI shows for an installation.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum InstallationState {
    /// Nothing to show yet, or the device is busy switching apps.
    #[default]
    Preparing,
    /// The script is being sent.
    DownloadingLanguage { progress: f64 },
    /// The device waits for the user to approve.
    AwaitingDeviceConfirmation,
    Success,
    Error { error: InstallError },
}

impl InstallationState {
    /// `Success` and `Error` end a run; only a retry leaves them.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Success | Self::Error { .. })
    }
}

/// Next state after `event`.
///
/// # Example
///
/// ```rust
/// use hw_language_installer::{reduce, InstallEvent, InstallationState};
///
/// let state = reduce(&InstallationState::Preparing, &InstallEvent::progress(0.5));
/// assert_eq!(state, InstallationState::DownloadingLanguage { progress: 0.5 });
///
/// // A transient stall never changes what is shown.
/// assert_eq!(reduce(&state, &InstallEvent::UnresponsiveDevice), state);
/// ```
pub fn reduce(state: &InstallationState, event: &InstallEvent) -> InstallationState {
    if state.is_terminal() {
        return state.clone();
    }
    match event {
        InstallEvent::DevicePermissionRequested { .. } => {
            InstallationState::AwaitingDeviceConfirmation
        }
        InstallEvent::Progress { progress } => InstallationState::DownloadingLanguage {
            progress: *progress,
        },
        InstallEvent::InstallationCompleted => InstallationState::Success,
        InstallEvent::Error { error } => InstallationState::Error {
            error: error.clone(),
        },
        InstallEvent::UnresponsiveDevice
        | InstallEvent::AppDetected
        | InstallEvent::DeviceChange { .. } => state.clone(),
    }
}

/// Fold a whole event sequence, starting from `Preparing`.
pub fn replay<'a>(events: impl IntoIterator<Item = &'a InstallEvent>) -> InstallationState {
    events
        .into_iter()
        .fold(InstallationState::default(), |state, event| {
            reduce(&state, event)
        })
}

/// Reduce `events` from `initial` and publish to `out`.
///
/// A state is published once no other change happened for `window`.
/// Whatever is pending when `events` ends is published right away.
///
/// The debounce is trailing: every change restarts the window, so a steady
/// burst of events closer together than `window` keeps pushing publication
/// back until the burst pauses or the stream ends.
pub async fn publish_debounced<S>(
    events: S,
    initial: InstallationState,
    window: Duration,
    out: &watch::Sender<InstallationState>,
) where
    S: Stream<Item = InstallEvent>,
{
    futures::pin_mut!(events);
    let mut state = initial;
    let mut publish_at: Option<Instant> = None;

    loop {
        tokio::select! {
            biased;
            next = events.next() => {
                let Some(event) = next else { break };
                let next_state = reduce(&state, &event);
                if next_state != state {
                    trace!(?next_state, "state changed");
                    state = next_state;
                    publish_at = Some(Instant::now() + window);
                }
            }
            _ = sleep_until_opt(publish_at) => {
                publish_at = None;
                out.send_replace(state.clone());
            }
        }
    }

    if publish_at.is_some() {
        out.send_replace(state);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reduce_transitions() {
        let state = InstallationState::Preparing;
        assert_eq!(
            reduce(&state, &InstallEvent::permission_requested()),
            InstallationState::AwaitingDeviceConfirmation
        );
        assert_eq!(
            reduce(&state, &InstallEvent::InstallationCompleted),
            InstallationState::Success
        );
        assert_eq!(reduce(&state, &InstallEvent::AppDetected), state);
    }

    #[test]
    fn test_terminal_states_ignore_events() {
        let failed = InstallationState::Error {
            error: InstallError::refused_on_device(0x5501),
        };
        assert_eq!(reduce(&failed, &InstallEvent::progress(0.4)), failed);
        assert_eq!(
            reduce(&InstallationState::Success, &InstallEvent::UnresponsiveDevice),
            InstallationState::Success
        );
    }

    #[test]
    fn test_replay_full_run() {
        let events = vec![
            InstallEvent::progress(0.5),
            InstallEvent::permission_requested(),
            InstallEvent::UnresponsiveDevice,
            InstallEvent::progress(1.0),
            InstallEvent::InstallationCompleted,
        ];
        assert_eq!(replay(&events), InstallationState::Success);
        assert_eq!(
            replay(&events[..3]),
            InstallationState::AwaitingDeviceConfirmation
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_burst_publishes_last_state_once() {
        let (tx, mut rx) = watch::channel(InstallationState::Preparing);
        let (events_tx, events_rx) = futures::channel::mpsc::unbounded();

        let publisher = tokio::spawn(async move {
            publish_debounced(
                events_rx,
                InstallationState::Preparing,
                Duration::from_millis(1500),
                &tx,
            )
            .await;
            tx
        });

        events_tx.unbounded_send(InstallEvent::progress(0.25)).unwrap();
        tokio::time::sleep(Duration::from_millis(500)).await;
        events_tx.unbounded_send(InstallEvent::progress(0.5)).unwrap();
        tokio::time::sleep(Duration::from_millis(500)).await;
        assert!(!rx.has_changed().unwrap());

        tokio::time::sleep(Duration::from_millis(1600)).await;
        assert!(rx.has_changed().unwrap());
        assert_eq!(
            *rx.borrow_and_update(),
            InstallationState::DownloadingLanguage { progress: 0.5 }
        );

        events_tx.unbounded_send(InstallEvent::InstallationCompleted).unwrap();
        drop(events_tx);
        let tx = publisher.await.unwrap();
        assert_eq!(*tx.borrow(), InstallationState::Success);
    }

    #[tokio::test(start_paused = true)]
    async fn test_steady_progress_delays_publication() {
        let (tx, mut rx) = watch::channel(InstallationState::Preparing);
        let (events_tx, events_rx) = futures::channel::mpsc::unbounded();
        let publisher = tokio::spawn(async move {
            publish_debounced(
                events_rx,
                InstallationState::Preparing,
                Duration::from_millis(1500),
                &tx,
            )
            .await;
        });

        for step in 1..=5 {
            events_tx
                .unbounded_send(InstallEvent::progress(step as f64 / 10.0))
                .unwrap();
            tokio::time::sleep(Duration::from_secs(1)).await;
            assert!(!rx.has_changed().unwrap());
        }

        tokio::time::sleep(Duration::from_secs(1)).await;
        assert_eq!(
            *rx.borrow_and_update(),
            InstallationState::DownloadingLanguage { progress: 0.5 }
        );
        drop(events_tx);
        publisher.await.unwrap();
    }
}
