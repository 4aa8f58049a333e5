//! Sweep synthetic temperatures through the fan control loop.
//!
//! Bringup and tuning aid: feeds a rising SOC (and optionally HDD)
//! temperature ramp into a real `FanControl` and prints each commanded
//! duty cycle. By default the writes land on a console recorder; with
//! `--live` they drive the GPIO mailbox and the real fan.

use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use clap::Parser;

use sysmon::mailbox::Mailbox;
use sysmon::platform::Platform;
use sysmon::thermal::{FanActuator, FanControl, PlatformParams, ZoneTemperatures};

#[derive(Parser)]
#[command(name = "fan-bench", about = "Sweep temperatures through the fan control loop")]
struct Args {
    /// Platform whose parameter table to use.
    #[arg(long, default_value = "GFHD100")]
    platform: String,

    /// Sweep start SOC temperature (degrees C).
    #[arg(long, default_value_t = 80.0)]
    soc_low: f32,

    /// Sweep end SOC temperature (degrees C).
    #[arg(long, default_value_t = 102.0)]
    soc_high: f32,

    /// Temperature increment per sweep step.
    #[arg(long, default_value_t = 1.0)]
    step: f32,

    /// Evaluations per temperature step, to let the rate limiter settle.
    #[arg(long, default_value_t = 3)]
    count: u32,

    /// Fixed HDD temperature fed alongside the SOC ramp, on platforms
    /// with an HDD zone.
    #[arg(long)]
    hdd: Option<f32>,

    /// Delay between evaluations.
    #[arg(long, default_value_t = 1000)]
    interval_ms: u64,

    /// Drive the real GPIO mailbox instead of the console recorder.
    #[arg(long)]
    live: bool,
}

/// Prints each write instead of touching hardware.
struct ConsoleActuator;

#[async_trait]
impl FanActuator for ConsoleActuator {
    async fn write_duty_cycle(&mut self, duty_cycle: u16) -> sysmon::error::Result<()> {
        println!("  -> pwm {duty_cycle}");
        Ok(())
    }

    async fn read_duty_cycle(&mut self) -> sysmon::error::Result<u16> {
        Ok(0)
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    sysmon::tracing::init();
    let args = Args::parse();

    let platform = Platform::from_name(&args.platform);
    let params = PlatformParams::defaults_for(&platform);
    params.validate()?;

    let actuator: Box<dyn FanActuator> = if args.live {
        Box::new(Mailbox::default())
    } else {
        Box::new(ConsoleActuator)
    };

    let mut fan_control = FanControl::new(params, actuator);
    if args.live {
        fan_control.init().await;
    }

    let mut soc_temp = args.soc_low;
    while soc_temp <= args.soc_high {
        for _ in 0..args.count {
            let temps = ZoneTemperatures {
                soc: Some(soc_temp),
                hdd: args.hdd.filter(|_| platform.has_hdd()),
                aux1: None,
            };
            // Simulated tach: spinning whenever a duty cycle is commanded.
            let fan_speed = if fan_control.duty_cycle() > 0 { 1 } else { 0 };
            fan_control.adjust_speed(temps, fan_speed).await?;

            println!(
                "soc {soc_temp:5.1} C  hdd {:>5}  duty {:3} %  state {:?}",
                args.hdd.map_or_else(|| String::from("-"), |t| format!("{t:.1}")),
                fan_control.duty_cycle(),
                fan_control.state(),
            );
            tokio::time::sleep(Duration::from_millis(args.interval_ms)).await;
        }
        soc_temp += args.step;
    }

    Ok(())
}
