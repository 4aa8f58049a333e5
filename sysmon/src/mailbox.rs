//! GPIO mailbox: single-value text files exchanged with the GPIO daemon
//! under `/tmp/gpio`.
//!
//! Reads take the first line of a file; writes go through a temp file
//! and rename so the daemon never sees a partial value. The directory is
//! injectable so tests can run against a scratch dir.

use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use tokio::fs;

use crate::error::{Error, Result};
use crate::thermal::FanActuator;
use crate::tracing::prelude::*;

pub const MAILBOX_DIR: &str = "/tmp/gpio";

const FAN_PERCENT_FILE: &str = "fanpercent";
const FAN_SPEED_FILE: &str = "fanspeed";
const CPU_TEMPERATURE_FILE: &str = "cpu_temperature";
const AUX1_TEMPERATURE_FILE: &str = "aux1_temperature";
const CPU_VOLTAGE_FILE: &str = "cpu_voltage";
const READY_FILE: &str = "ready";

/// Bounded startup wait for the GPIO daemon to create its ready file.
const READY_RETRIES: u32 = 4;
const READY_RETRY_WAIT: Duration = Duration::from_secs(2);

#[derive(Debug, Clone)]
pub struct Mailbox {
    dir: PathBuf,
}

impl Default for Mailbox {
    fn default() -> Self {
        Self::new(MAILBOX_DIR)
    }
}

impl Mailbox {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub async fn read_soc_temperature(&self) -> Result<f32> {
        let value = self.read_value(CPU_TEMPERATURE_FILE).await?;
        parse_f32("soc temperature", &value)
    }

    pub async fn read_aux1_temperature(&self) -> Result<f32> {
        let value = self.read_value(AUX1_TEMPERATURE_FILE).await?;
        parse_f32("aux1 temperature", &value)
    }

    pub async fn read_soc_voltage(&self) -> Result<String> {
        self.read_value(CPU_VOLTAGE_FILE).await
    }

    /// Fan tach pulse count since the daemon's last window; zero means
    /// the fan is not spinning.
    pub async fn read_fan_speed(&self) -> Result<u16> {
        let value = self.read_value(FAN_SPEED_FILE).await?;
        parse_u16("fan speed", &value)
    }

    pub async fn read_fan_duty_cycle(&self) -> Result<u16> {
        let value = self.read_value(FAN_PERCENT_FILE).await?;
        parse_u16("fan duty cycle", &value)
    }

    pub async fn write_fan_duty_cycle(&self, duty_cycle: u16) -> Result<()> {
        self.write_value(FAN_PERCENT_FILE, &duty_cycle.to_string())
            .await
    }

    pub async fn is_ready(&self) -> bool {
        fs::try_exists(self.dir.join(READY_FILE))
            .await
            .unwrap_or(false)
    }

    /// Wait for the GPIO daemon to come up, with a bounded number of
    /// retries. Returns whether the mailbox became ready.
    pub async fn wait_ready(&self) -> bool {
        for _ in 0..READY_RETRIES {
            if self.is_ready().await {
                return true;
            }
            debug!(dir = %self.dir.display(), "gpio mailbox not ready, waiting");
            tokio::time::sleep(READY_RETRY_WAIT).await;
        }
        self.is_ready().await
    }

    async fn read_value(&self, file: &str) -> Result<String> {
        let path = self.dir.join(file);
        let contents = fs::read_to_string(&path)
            .await
            .map_err(|source| Error::SensorRead {
                path: path.clone(),
                source,
            })?;
        Ok(contents.lines().next().unwrap_or("").trim().to_string())
    }

    async fn write_value(&self, file: &str, value: &str) -> Result<()> {
        let path = self.dir.join(file);
        let tmp_path = self.dir.join(format!("{file}.sysmond_tmp"));

        let map_err = |source| Error::ActuatorWrite {
            path: path.clone(),
            source,
        };
        fs::write(&tmp_path, value).await.map_err(map_err)?;
        fs::rename(&tmp_path, &path).await.map_err(map_err)
    }
}

#[async_trait]
impl FanActuator for Mailbox {
    async fn write_duty_cycle(&mut self, duty_cycle: u16) -> Result<()> {
        self.write_fan_duty_cycle(duty_cycle).await
    }

    async fn read_duty_cycle(&mut self) -> Result<u16> {
        self.read_fan_duty_cycle().await
    }
}

fn parse_f32(what: &'static str, value: &str) -> Result<f32> {
    value.parse().map_err(|_| Error::Parse {
        what,
        value: value.to_string(),
    })
}

fn parse_u16(what: &'static str, value: &str) -> Result<u16> {
    value.parse().map_err(|_| Error::Parse {
        what,
        value: value.to_string(),
    })
}
