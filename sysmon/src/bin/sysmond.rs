//! The peripheral monitor daemon.
//!
//! Detects the platform, loads the fan parameter table (honoring the
//! tuning override file), waits for the GPIO mailbox, and runs the poll
//! loop until interrupted.

use anyhow::Result;
use tokio_util::sync::CancellationToken;

use sysmon::mailbox::Mailbox;
use sysmon::monitor::{MailboxSensors, PeripheralMon, SystemEscalation};
use sysmon::platform::Platform;
use sysmon::thermal::{FanControl, PlatformParams};
use sysmon::tracing::prelude::*;

/// Tuning table letting hardware engineers adjust fan parameters
/// without reflashing. Read once at startup.
const FAN_PARAMS_OVERRIDE_FILE: &str = "/etc/sysmon/fan_params.tbl";

#[tokio::main]
async fn main() -> Result<()> {
    sysmon::tracing::init();

    let platform = Platform::detect();
    info!(platform = %platform.name(), "starting peripheral monitor");

    let mut params = PlatformParams::defaults_for(&platform);
    if let Ok(table) = tokio::fs::read_to_string(FAN_PARAMS_OVERRIDE_FILE).await {
        info!(file = FAN_PARAMS_OVERRIDE_FILE, "fan parameter override table found");
        params.apply_overrides(&platform, &table);
    }
    params.validate()?;

    let mailbox = Mailbox::default();
    if !mailbox.wait_ready().await {
        warn!("gpio mailbox still not ready, sensor reads will fail until it is");
    }

    let mut fan_control = FanControl::new(params, mailbox.clone());
    fan_control.init().await;

    let sensors = MailboxSensors::new(mailbox, &platform);
    let monitor = PeripheralMon::new(sensors, SystemEscalation::default(), fan_control);

    let cancellation = CancellationToken::new();
    let monitor_task = tokio::spawn(monitor.run(cancellation.clone()));

    tokio::signal::ctrl_c().await?;
    info!("shutdown requested");
    cancellation.cancel();
    monitor_task.await?;

    Ok(())
}
