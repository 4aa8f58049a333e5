//! Sensor source contract and the production mailbox-backed reader.

use async_trait::async_trait;
use tokio::process::Command;

use crate::error::{Error, Result};
use crate::mailbox::Mailbox;
use crate::platform::Platform;

/// Probe invoked for the drive temperature. Spins the query through
/// SMART, so it is slow and polled on its own longer interval.
const HDD_TEMPERATURE_CMD: &str = "hdd-temperature";
const HDD_DEVICE: &str = "/dev/sda";

/// Readings the monitor consumes each poll. Implementations are free to
/// fail per reading; the monitor recovers locally.
#[async_trait]
pub trait Sensors: Send {
    /// SOC temperature in degrees C, possibly fractional.
    async fn soc_temperature(&mut self) -> Result<f32>;

    /// SOC core voltage, telemetry only.
    async fn soc_voltage(&mut self) -> Result<String>;

    /// Fan tach pulse count since the last window; zero means not
    /// spinning.
    async fn fan_speed(&mut self) -> Result<u16>;

    /// Drive temperature in whole degrees C, `None` on platforms
    /// without an HDD.
    async fn hdd_temperature(&mut self) -> Result<Option<u16>>;

    /// Auxiliary (e.g. Wi-Fi SOC) temperature, `None` on platforms
    /// without one.
    async fn aux1_temperature(&mut self) -> Result<Option<f32>>;
}

/// Production sensors: GPIO mailbox files plus the HDD probe
/// subprocess.
pub struct MailboxSensors {
    mailbox: Mailbox,
    has_hdd: bool,
    has_aux1: bool,
}

impl MailboxSensors {
    pub fn new(mailbox: Mailbox, platform: &Platform) -> Self {
        Self {
            mailbox,
            has_hdd: platform.has_hdd(),
            has_aux1: platform.has_aux1(),
        }
    }
}

#[async_trait]
impl Sensors for MailboxSensors {
    async fn soc_temperature(&mut self) -> Result<f32> {
        self.mailbox.read_soc_temperature().await
    }

    async fn soc_voltage(&mut self) -> Result<String> {
        self.mailbox.read_soc_voltage().await
    }

    async fn fan_speed(&mut self) -> Result<u16> {
        self.mailbox.read_fan_speed().await
    }

    async fn hdd_temperature(&mut self) -> Result<Option<u16>> {
        if !self.has_hdd {
            return Ok(None);
        }
        probe_hdd_temperature().await.map(Some)
    }

    async fn aux1_temperature(&mut self) -> Result<Option<f32>> {
        if !self.has_aux1 {
            return Ok(None);
        }
        self.mailbox.read_aux1_temperature().await.map(Some)
    }
}

async fn probe_hdd_temperature() -> Result<u16> {
    let output = Command::new(HDD_TEMPERATURE_CMD)
        .arg(HDD_DEVICE)
        .output()
        .await
        .map_err(|err| Error::HddProbe(format!("{HDD_TEMPERATURE_CMD}: {err}")))?;

    if !output.status.success() {
        return Err(Error::HddProbe(format!(
            "{HDD_TEMPERATURE_CMD} exited with {}",
            output.status
        )));
    }

    let stdout = String::from_utf8_lossy(&output.stdout);
    let first = stdout.split_whitespace().next().ok_or(Error::Parse {
        what: "hdd temperature",
        value: String::new(),
    })?;
    first.parse().map_err(|_| Error::Parse {
        what: "hdd temperature",
        value: first.to_string(),
    })
}
