//! Integration tests for the event-driven observer, on paused time.

mod common;

use common::*;
use futures::StreamExt;
use hw_language_installer::observation::{observer_for, DeviceObserver, EventDrivenObserver};
use hw_language_installer::{
    EventDrivenOptions, InstallError, InstallEvent, InstallerConfig, Language, ObservationMode,
    TransportCapability,
};
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::Instant;

fn observer(opener: &FakeOpener, script: &str) -> EventDrivenObserver {
    EventDrivenObserver::new(
        executor(opener.clone(), FakeApi::french(script)),
        EventDrivenOptions::default(),
    )
}

#[tokio::test(start_paused = true)]
async fn test_stable_device_runs_once_after_debounce() {
    let device = FakeDevice::on_dashboard();
    let opener = FakeOpener::with("usb-1", device.clone());
    let (feed, devices) = watch::channel(Some(nano_x("usb-1")));

    let start = Instant::now();
    let mut events = observer(&opener, FIVE_APDUS).observe(devices, Language::French);

    let first = events.next().await;
    assert!(start.elapsed() >= Duration::from_secs(1));
    assert_eq!(first, Some(InstallEvent::progress(0.2)));

    drop(feed);
    let rest: Vec<_> = events.collect().await;
    assert_eq!(rest.last(), Some(&InstallEvent::InstallationCompleted));
    assert_eq!(opener.opened(), vec!["usb-1"]);
}

#[tokio::test(start_paused = true)]
async fn test_rapid_changes_collapse_into_last_device() {
    let opener = FakeOpener::default();
    opener.register("usb-1", FakeDevice::on_dashboard());
    opener.register("usb-2", FakeDevice::on_dashboard());
    let (feed, devices) = watch::channel(Some(nano_x("usb-1")));

    let events = observer(&opener, FIVE_APDUS).observe(devices, Language::French);
    tokio::time::sleep(Duration::from_millis(300)).await;
    feed.send_replace(None);
    tokio::time::sleep(Duration::from_millis(300)).await;
    feed.send_replace(Some(nano_x("usb-2")));
    drop(feed);

    let events: Vec<_> = events.collect().await;
    assert_eq!(events.last(), Some(&InstallEvent::InstallationCompleted));
    assert_eq!(opener.opened(), vec!["usb-2"]);
}

#[tokio::test(start_paused = true)]
async fn test_absent_device_never_starts_a_run() {
    let opener = FakeOpener::default();
    let (feed, devices) = watch::channel(None);

    let events = observer(&opener, FIVE_APDUS).observe(devices, Language::French);
    tokio::time::sleep(Duration::from_secs(3)).await;
    drop(feed);

    let events: Vec<_> = events.collect().await;
    assert!(events.is_empty());
    assert!(opener.opened().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_new_device_cancels_previous_run() {
    let stuck = FakeDevice::on_dashboard();
    // Waits forever on the approval APDU.
    stuck.configure(|b| b.hang_install_at = Some(1));
    let fresh = FakeDevice::on_dashboard();
    let opener = FakeOpener::default();
    opener.register("usb-1", stuck.clone());
    opener.register("usb-2", fresh.clone());
    let (feed, devices) = watch::channel(Some(nano_x("usb-1")));

    let script = "e031000001aa\ne030000000\ne032000000";
    let events = observer(&opener, script).observe(devices, Language::French);

    tokio::time::sleep(Duration::from_secs(3)).await;
    assert_eq!(stuck.install_exchanges(), 2);

    feed.send_replace(Some(nano_x("usb-2")));
    drop(feed);
    let events: Vec<_> = events.collect().await;

    assert_eq!(opener.opened(), vec!["usb-1", "usb-2"]);
    // The stuck transport is closed before the next one opens.
    assert_eq!(
        opener.connections(),
        vec!["open:usb-1", "close:usb-1", "open:usb-2", "close:usb-2"]
    );
    assert_eq!(opener.closed(), 2);
    assert_eq!(stuck.install_exchanges(), 2);
    assert_eq!(fresh.install_exchanges(), 3);
    assert_eq!(
        events
            .iter()
            .filter(|e| **e == InstallEvent::InstallationCompleted)
            .count(),
        1
    );
    assert_eq!(events.last(), Some(&InstallEvent::InstallationCompleted));
}

#[tokio::test(start_paused = true)]
async fn test_same_device_reported_again_keeps_run() {
    let device = FakeDevice::on_dashboard();
    device.configure(|b| b.install_delay = Some(Duration::from_secs(1)));
    let opener = FakeOpener::with("usb-1", device.clone());
    let (feed, devices) = watch::channel(Some(nano_x("usb-1")));

    let script = script_of(10);
    let events = observer(&opener, &script).observe(devices, Language::French);
    tokio::time::sleep(Duration::from_secs(5)).await;
    assert!(device.install_exchanges() > 0);
    assert!(device.install_exchanges() < 10);

    feed.send_replace(Some(nano_x("usb-1")));
    drop(feed);
    let events: Vec<_> = events.collect().await;

    assert_eq!(opener.opened(), vec!["usb-1"]);
    assert_eq!(device.install_exchanges(), 10);
    let progress = progress_values(&events);
    assert_eq!(progress.len(), 10);
    assert!(progress.windows(2).all(|pair| pair[0] < pair[1]));
    assert_eq!(events.last(), Some(&InstallEvent::InstallationCompleted));
}

#[tokio::test(start_paused = true)]
async fn test_dropping_stream_closes_transport() {
    let device = FakeDevice::on_dashboard();
    device.configure(|b| b.hang_install_at = Some(2));
    let opener = FakeOpener::with("usb-1", device.clone());
    let (_feed, devices) = watch::channel(Some(nano_x("usb-1")));

    let events = observer(&opener, FIVE_APDUS).observe(devices, Language::French);
    tokio::time::sleep(Duration::from_secs(3)).await;
    assert_eq!(opener.closed(), 0);

    events.shutdown().await;
    assert_eq!(opener.connections(), vec!["open:usb-1", "close:usb-1"]);
    assert_eq!(device.install_exchanges(), 3);
}

#[tokio::test(start_paused = true)]
async fn test_run_error_forwarded_as_event() {
    let opener = FakeOpener::with("usb-1", FakeDevice::on_dashboard());
    let observer = EventDrivenObserver::new(
        executor(opener.clone(), FakeApi::new(&["german"], FIVE_APDUS)),
        EventDrivenOptions::default(),
    );
    let (feed, devices) = watch::channel(Some(nano_x("usb-1")));
    drop(feed);

    let events: Vec<_> = observer.observe(devices, Language::French).collect().await;
    assert_eq!(
        events,
        vec![InstallEvent::error(InstallError::language_not_found("french"))]
    );
}

#[test]
fn test_capability_selects_strategy() {
    let executor = executor(FakeOpener::default(), FakeApi::french(FIVE_APDUS));

    let pushed = InstallerConfig::for_capability(TransportCapability::PushesDeviceChanges);
    assert_eq!(
        observer_for(&pushed, executor.clone()).mode(),
        ObservationMode::Event
    );

    let polled = InstallerConfig::for_capability(TransportCapability::RequiresPolling);
    assert_eq!(observer_for(&polled, executor).mode(), ObservationMode::Polling);
}
