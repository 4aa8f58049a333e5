//! Overheat escalation collaborators: warning LED and forced power-off.

use std::path::PathBuf;

use async_trait::async_trait;
use nix::sys::reboot::{RebootMode, reboot};
use tokio::fs;

use crate::error::{Error, Result};
use crate::tracing::prelude::*;

/// Pattern file picked up by the LED daemon.
pub const OVERHEAT_LED_FILE: &str = "/tmp/leds/overheating";

/// Blink pattern signalling overheat.
const OVERHEAT_LED_PATTERN: &str = "1 0 1 0 1 0";

#[async_trait]
pub trait Escalation: Send {
    async fn set_overheat_led(&mut self) -> Result<()>;
    async fn clear_overheat_led(&mut self) -> Result<()>;
    async fn poweroff(&mut self) -> Result<()>;
}

/// Production escalation: LED mailbox file plus the reboot syscall.
pub struct SystemEscalation {
    led_file: PathBuf,
}

impl Default for SystemEscalation {
    fn default() -> Self {
        Self::with_led_file(OVERHEAT_LED_FILE)
    }
}

impl SystemEscalation {
    pub fn with_led_file(path: impl Into<PathBuf>) -> Self {
        Self {
            led_file: path.into(),
        }
    }
}

#[async_trait]
impl Escalation for SystemEscalation {
    async fn set_overheat_led(&mut self) -> Result<()> {
        if let Some(parent) = self.led_file.parent() {
            fs::create_dir_all(parent).await?;
        }
        fs::write(&self.led_file, OVERHEAT_LED_PATTERN)
            .await
            .map_err(|source| Error::ActuatorWrite {
                path: self.led_file.clone(),
                source,
            })
    }

    async fn clear_overheat_led(&mut self) -> Result<()> {
        match fs::remove_file(&self.led_file).await {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(source) => Err(Error::ActuatorWrite {
                path: self.led_file.clone(),
                source,
            }),
        }
    }

    async fn poweroff(&mut self) -> Result<()> {
        error!("sustained overheat, forcing power-off");
        nix::unistd::sync();
        match reboot(RebootMode::RB_POWER_OFF) {
            Ok(never) => match never {},
            Err(errno) => Err(Error::Io(errno.into())),
        }
    }
}
