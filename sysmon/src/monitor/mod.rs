//! The peripheral polling loop: read sensors, run fan control, and
//! escalate sustained overheat.
//!
//! One tokio task owns all loop state; at most one evaluation is ever
//! in flight, so nothing here needs locking. Fan control and overheat
//! shutdown deliberately stay separate paths: the fan loop is rate
//! limited and hysteretic, while the shutdown trip is a count-debounced
//! hard stop that must not inherit either property.

mod escalation;
mod sensors;

pub use escalation::{Escalation, OVERHEAT_LED_FILE, SystemEscalation};
pub use sensors::{MailboxSensors, Sensors};

use std::time::Duration;

use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use crate::thermal::{FanActuator, FanControl, ZoneTemperatures};
use crate::tracing::prelude::*;
use crate::types::consecutive_alarm::{AlarmStatus, ConsecutiveAlarm};

/// Consecutive overheated polls before the forced power-off. A single
/// noisy reading must not take the box down; three in a row reliably
/// will.
pub const OVERHEAT_POLL_COUNT: u32 = 3;

pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(5);

/// The drive temperature probe shells out to SMART and is slow, so it
/// runs far less often than the SOC poll.
pub const DEFAULT_HDD_POLL_INTERVAL: Duration = Duration::from_secs(300);

pub struct PeripheralMon<S, E, A> {
    sensors: S,
    escalation: E,
    fan_control: FanControl<A>,
    poll_interval: Duration,
    hdd_poll_interval: Duration,
    /// Last good drive reading, reused between (slow) HDD polls.
    hdd_temp: Option<u16>,
    next_hdd_poll: Option<Instant>,
    overheat: ConsecutiveAlarm,
    first_poll: bool,
}

impl<S, E, A> PeripheralMon<S, E, A>
where
    S: Sensors,
    E: Escalation,
    A: FanActuator,
{
    pub fn new(sensors: S, escalation: E, fan_control: FanControl<A>) -> Self {
        Self::with_intervals(
            sensors,
            escalation,
            fan_control,
            DEFAULT_POLL_INTERVAL,
            DEFAULT_HDD_POLL_INTERVAL,
        )
    }

    pub fn with_intervals(
        sensors: S,
        escalation: E,
        fan_control: FanControl<A>,
        poll_interval: Duration,
        hdd_poll_interval: Duration,
    ) -> Self {
        Self {
            sensors,
            escalation,
            fan_control,
            poll_interval,
            hdd_poll_interval,
            hdd_temp: None,
            next_hdd_poll: None,
            overheat: ConsecutiveAlarm::new(OVERHEAT_POLL_COUNT),
            first_poll: true,
        }
    }

    /// Drive the poll loop until cancelled. Poll N+1 never starts until
    /// poll N's whole body has completed.
    pub async fn run(mut self, cancellation: CancellationToken) {
        let mut interval = tokio::time::interval(self.poll_interval);
        interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                _ = cancellation.cancelled() => {
                    info!("peripheral monitor stopping");
                    break;
                }
                _ = interval.tick() => {
                    self.tick().await;
                }
            }
        }
    }

    async fn tick(&mut self) {
        self.refresh_hdd_temperature().await;

        let fan_speed = match self.sensors.fan_speed().await {
            Ok(count) => count,
            Err(err) => {
                info!(error = %err, "fan speed unavailable, leaving pwm untouched");
                return;
            }
        };

        // A failed SOC read freezes everything for this cycle: no PWM
        // change and no overheat counter movement.
        let soc_temp = match self.sensors.soc_temperature().await {
            Ok(temp) => temp,
            Err(err) => {
                info!(error = %err, "soc temperature unavailable, leaving pwm untouched");
                return;
            }
        };

        let voltage = self
            .sensors
            .soc_voltage()
            .await
            .unwrap_or_else(|_| String::from("unknown"));

        let aux1_temp = match self.sensors.aux1_temperature().await {
            Ok(temp) => temp,
            Err(err) => {
                warn!(error = %err, "aux1 temperature unavailable");
                None
            }
        };

        if self.first_poll {
            // No tach window yet; the first count is meaningless.
            info!(
                voltage = %voltage,
                soc_temperature = soc_temp,
                hdd_temperature = ?self.hdd_temp,
                "peripheral probe"
            );
            self.first_poll = false;
        } else {
            info!(
                voltage = %voltage,
                soc_temperature = soc_temp,
                hdd_temperature = ?self.hdd_temp,
                fanspeed = fan_speed,
                "peripheral probe"
            );
        }

        let temps = ZoneTemperatures {
            soc: Some(soc_temp),
            hdd: self.hdd_temp.map(f32::from),
            aux1: aux1_temp,
        };
        if let Err(err) = self.fan_control.adjust_speed(temps, fan_speed).await {
            // Next poll recomputes with fresh temperatures; no retry here.
            error!(error = %err, "fan speed adjustment failed");
        }

        self.escalate(soc_temp).await;
    }

    async fn refresh_hdd_temperature(&mut self) {
        let now = Instant::now();
        if self.next_hdd_poll.is_some_and(|due| now < due) {
            return;
        }
        self.next_hdd_poll = Some(now + self.hdd_poll_interval);

        match self.sensors.hdd_temperature().await {
            Ok(temp) => self.hdd_temp = temp,
            Err(err) => {
                warn!(error = %err, "hdd temperature probe failed, keeping last reading");
            }
        }
    }

    async fn escalate(&mut self, soc_temp: f32) {
        let threshold = f32::from(self.fan_control.overheat_temperature());
        match self.overheat.check(soc_temp >= threshold) {
            AlarmStatus::Idle => {
                if let Err(err) = self.escalation.clear_overheat_led().await {
                    warn!(error = %err, "failed to clear overheat led");
                }
            }
            AlarmStatus::Pending => {
                warn!(soc_temperature = soc_temp, threshold, "soc overheating");
                if let Err(err) = self.escalation.set_overheat_led().await {
                    warn!(error = %err, "failed to set overheat led");
                }
            }
            AlarmStatus::Triggered => {
                error!(
                    soc_temperature = soc_temp,
                    threshold,
                    polls = OVERHEAT_POLL_COUNT,
                    "sustained overheat, powering off"
                );
                if let Err(err) = self.escalation.set_overheat_led().await {
                    warn!(error = %err, "failed to set overheat led");
                }
                if let Err(err) = self.escalation.poweroff().await {
                    error!(error = %err, "power-off failed");
                }
            }
        }
    }
}
