//! Fake device, transport and manager API shared by the integration tests.

#![allow(dead_code)]

use async_trait::async_trait;
use hw_language_installer::manager::{DeviceVersion, FirmwareVersion, LanguagePackage, ManagerApi};
use hw_language_installer::transport::{Transport, TransportOpener};
use hw_language_installer::{
    Device, DeviceModelId, ExecutorOptions, InstallError, InstallEvent, InstallScriptExecutor,
};
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};
use std::time::Duration;

pub const OK: [u8; 2] = [0x90, 0x00];

/// Five non-gated APDUs.
pub const FIVE_APDUS: &str = "e031000001aa\ne031000001bb\ne031000001cc\ne031000001dd\ne032000000\n";

/// Behaviour of a fake device. Every field can be changed while a test runs.
#[derive(Debug, Default)]
pub struct Behaviour {
    /// Foreground app `(name, version)`; `None` means the dashboard.
    pub app: Option<(String, String)>,
    /// Status returned by the n-th script APDU, `9000` otherwise.
    pub install_status: HashMap<usize, u16>,
    /// Script APDU index that never answers.
    pub hang_install_at: Option<usize>,
    /// Time every script APDU takes to answer.
    pub install_delay: Option<Duration>,
    /// Device info requests never answer.
    pub hang_device_info: bool,
    /// Delay before the device info answer.
    pub device_info_delay: Option<Duration>,
    /// Number of upcoming exchanges failing with a disconnect.
    pub disconnects: usize,
}

#[derive(Debug, Default)]
struct DeviceLog {
    exchanges: Vec<Vec<u8>>,
    install_index: usize,
}

/// A device shared between a test and the transports opened on it.
#[derive(Clone, Default)]
pub struct FakeDevice {
    behaviour: Arc<Mutex<Behaviour>>,
    log: Arc<Mutex<DeviceLog>>,
    timeline: Timeline,
}

impl FakeDevice {
    pub fn on_dashboard() -> Self {
        Self::default()
    }

    pub fn with_app(name: &str, version: &str) -> Self {
        let device = Self::default();
        device.configure(|b| b.app = Some((name.to_string(), version.to_string())));
        device
    }

    pub fn with_timeline(timeline: Timeline) -> Self {
        Self {
            timeline,
            ..Self::default()
        }
    }

    pub fn configure(&self, f: impl FnOnce(&mut Behaviour)) {
        f(&mut self.behaviour.lock().unwrap());
    }

    pub fn exchanges(&self) -> Vec<Vec<u8>> {
        self.log.lock().unwrap().exchanges.clone()
    }

    /// Exchanges as lowercase hex.
    pub fn exchanges_hex(&self) -> Vec<String> {
        self.exchanges().iter().map(hex::encode).collect()
    }

    /// Script APDUs the device received.
    pub fn install_exchanges(&self) -> usize {
        self.log.lock().unwrap().install_index
    }

    pub fn count_with_prefix(&self, prefix: &[u8]) -> usize {
        self.exchanges()
            .iter()
            .filter(|apdu| apdu.starts_with(prefix))
            .count()
    }

    async fn answer(&self, apdu: &[u8]) -> Result<Vec<u8>, InstallError> {
        {
            let mut behaviour = self.behaviour.lock().unwrap();
            if behaviour.disconnects > 0 {
                behaviour.disconnects -= 1;
                return Err(InstallError::disconnected_during_operation());
            }
        }
        self.log.lock().unwrap().exchanges.push(apdu.to_vec());
        self.timeline.push(format!("exchange:{}", hex::encode(apdu)));

        match (apdu[0], apdu[1]) {
            (0xe0, 0x01) => self.device_info().await,
            (0xb0, 0x01) => Ok(self.app_and_version()),
            (0xb0, 0xa7) => {
                self.configure(|b| b.app = None);
                Ok(OK.to_vec())
            }
            // Odd slots are empty on this device.
            (0xe0, 0x33) if apdu[2] % 2 == 1 => Ok(vec![0x55, 0x01]),
            (0xe0, 0x33) => Ok(OK.to_vec()),
            _ => self.script_apdu().await,
        }
    }

    async fn device_info(&self) -> Result<Vec<u8>, InstallError> {
        let (hang, delay, app_open) = {
            let b = self.behaviour.lock().unwrap();
            (b.hang_device_info, b.device_info_delay, b.app.is_some())
        };
        if hang {
            futures::future::pending::<()>().await;
        }
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        if app_open {
            return Ok(vec![0x6e, 0x00]);
        }

        let mut data = vec![0x33, 0x00, 0x00, 0x04];
        push_prefixed(&mut data, b"2.1.0");
        push_prefixed(&mut data, &[0x00, 0x00, 0x00, 0x00]);
        push_prefixed(&mut data, b"2.30");
        data.extend_from_slice(&OK);
        Ok(data)
    }

    fn app_and_version(&self) -> Vec<u8> {
        let (name, version) = self
            .behaviour
            .lock()
            .unwrap()
            .app
            .clone()
            .unwrap_or_else(|| ("BOLOS".to_string(), "2.1.0".to_string()));

        let mut data = vec![0x01];
        push_prefixed(&mut data, name.as_bytes());
        push_prefixed(&mut data, version.as_bytes());
        push_prefixed(&mut data, &[0x02]);
        data.extend_from_slice(&OK);
        data
    }

    async fn script_apdu(&self) -> Result<Vec<u8>, InstallError> {
        let index = {
            let mut log = self.log.lock().unwrap();
            log.install_index += 1;
            log.install_index - 1
        };
        let (hang, delay, status) = {
            let b = self.behaviour.lock().unwrap();
            (
                b.hang_install_at == Some(index),
                b.install_delay,
                b.install_status.get(&index).copied().unwrap_or(0x9000),
            )
        };
        if hang {
            futures::future::pending::<()>().await;
        }
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        Ok(status.to_be_bytes().to_vec())
    }
}

fn push_prefixed(data: &mut Vec<u8>, bytes: &[u8]) {
    data.push(bytes.len() as u8);
    data.extend_from_slice(bytes);
}

/// Ordered record of exchanges and events, shared by device and test.
#[derive(Clone, Default)]
pub struct Timeline(Arc<Mutex<Vec<String>>>);

impl Timeline {
    pub fn push(&self, entry: String) {
        self.0.lock().unwrap().push(entry);
    }

    pub fn entries(&self) -> Vec<String> {
        self.0.lock().unwrap().clone()
    }

    pub fn position(&self, entry: &str) -> Option<usize> {
        self.entries().iter().position(|e| e == entry)
    }
}

pub struct FakeTransport {
    device_id: String,
    device: FakeDevice,
    connections: Arc<Mutex<Vec<String>>>,
}

#[async_trait]
impl Transport for FakeTransport {
    async fn exchange(&mut self, apdu: &[u8]) -> Result<Vec<u8>, InstallError> {
        self.device.answer(apdu).await
    }

    async fn close(&mut self) -> Result<(), InstallError> {
        self.connections
            .lock()
            .unwrap()
            .push(format!("close:{}", self.device_id));
        Ok(())
    }
}

/// Opens transports on registered devices; unknown ids are disconnected.
#[derive(Clone, Default)]
pub struct FakeOpener {
    devices: Arc<Mutex<HashMap<String, FakeDevice>>>,
    opened: Arc<Mutex<Vec<String>>>,
    connections: Arc<Mutex<Vec<String>>>,
}

impl FakeOpener {
    pub fn with(device_id: &str, device: FakeDevice) -> Self {
        let opener = Self::default();
        opener.register(device_id, device);
        opener
    }

    pub fn register(&self, device_id: &str, device: FakeDevice) {
        self.devices
            .lock()
            .unwrap()
            .insert(device_id.to_string(), device);
    }

    /// Device ids in the order transports were opened.
    pub fn opened(&self) -> Vec<String> {
        self.opened.lock().unwrap().clone()
    }

    /// `open:<id>` and `close:<id>` in the order they happened, for
    /// transports that were opened successfully.
    pub fn connections(&self) -> Vec<String> {
        self.connections.lock().unwrap().clone()
    }

    pub fn closed(&self) -> usize {
        self.connections()
            .iter()
            .filter(|entry| entry.starts_with("close:"))
            .count()
    }
}

#[async_trait]
impl TransportOpener for FakeOpener {
    async fn open(&self, device_id: &str) -> Result<Box<dyn Transport>, InstallError> {
        self.opened.lock().unwrap().push(device_id.to_string());
        let device = self
            .devices
            .lock()
            .unwrap()
            .get(device_id)
            .cloned()
            .ok_or_else(InstallError::disconnected)?;
        self.connections
            .lock()
            .unwrap()
            .push(format!("open:{}", device_id));
        Ok(Box::new(FakeTransport {
            device_id: device_id.to_string(),
            device,
            connections: Arc::clone(&self.connections),
        }))
    }
}

/// Manager API serving one script for a fixed set of languages.
pub struct FakeApi {
    languages: HashSet<String>,
    script: String,
}

impl FakeApi {
    pub fn new(languages: &[&str], script: &str) -> Self {
        Self {
            languages: languages.iter().map(|l| l.to_string()).collect(),
            script: script.to_string(),
        }
    }

    pub fn french(script: &str) -> Self {
        Self::new(&["french"], script)
    }
}

#[async_trait]
impl ManagerApi for FakeApi {
    async fn get_device_version(
        &self,
        target_id: u32,
        _provider: u32,
    ) -> Result<DeviceVersion, InstallError> {
        assert_eq!(target_id, 0x33000004);
        Ok(DeviceVersion {
            id: 17,
            name: "nanoX".into(),
        })
    }

    async fn get_current_firmware(
        &self,
        version: &str,
        _device_version_id: u64,
        _provider: u32,
    ) -> Result<FirmwareVersion, InstallError> {
        assert_eq!(version, "2.1.0");
        Ok(FirmwareVersion {
            id: 42,
            name: version.into(),
        })
    }

    async fn get_language_packages(
        &self,
        _device_version_id: u64,
        _firmware_id: u64,
    ) -> Result<Vec<LanguagePackage>, InstallError> {
        let mut languages: Vec<&String> = self.languages.iter().collect();
        languages.sort();
        Ok(languages
            .into_iter()
            .map(|language| LanguagePackage {
                language: language.clone(),
                install_apdu_script_url: format!("https://cdn.test/{}.apdus", language),
                language_package_version_id: Some(1),
                version: Some("1.0.0".into()),
            })
            .collect())
    }

    async fn fetch_script(&self, _url: &str) -> Result<String, InstallError> {
        Ok(self.script.clone())
    }
}

/// A script of `count` non-gated APDUs, the last one closing the install.
pub fn script_of(count: usize) -> String {
    let mut script: String = (1..count)
        .map(|i| format!("e031000001{:02x}\n", i))
        .collect();
    script.push_str("e032000000\n");
    script
}

/// Progress values in the order they were emitted.
pub fn progress_values(events: &[InstallEvent]) -> Vec<f64> {
    events
        .iter()
        .filter_map(|event| match event {
            InstallEvent::Progress { progress } => Some(*progress),
            _ => None,
        })
        .collect()
}

pub fn nano_x(device_id: &str) -> Device {
    Device::new(device_id, DeviceModelId::NanoX)
}

pub fn executor(opener: FakeOpener, api: FakeApi) -> Arc<InstallScriptExecutor> {
    Arc::new(InstallScriptExecutor::new(
        Arc::new(opener),
        Arc::new(api),
        ExecutorOptions::default(),
    ))
}
