//! Fan control state machine: per-zone duty-cycle evaluation, actuator
//! writes, and the spin-up contingency.

use std::time::Duration;

use async_trait::async_trait;

use super::duty_cycle::{FanSpin, desired_duty_cycle};
use super::params::{DUTY_CYCLE_PWM_MAX, PlatformParams};
use crate::error::Result;
use crate::tracing::prelude::*;

/// Duty cycle driven before settling on a computed target when the fan
/// is stalled. Matches the lm96063 spin-up setting used by the boot
/// loader.
pub const PWM_STARTUP: u16 = 50;

/// Bounded wait for the fan to mechanically engage after the startup
/// kick, before lowering to the computed target.
const SPINUP_WAIT: Duration = Duration::from_secs(2);

/// Where duty-cycle commands land. Production writes the GPIO mailbox;
/// tests record the write sequence.
#[async_trait]
pub trait FanActuator: Send {
    async fn write_duty_cycle(&mut self, duty_cycle: u16) -> Result<()>;
    async fn read_duty_cycle(&mut self) -> Result<u16>;
}

#[async_trait]
impl FanActuator for Box<dyn FanActuator> {
    async fn write_duty_cycle(&mut self, duty_cycle: u16) -> Result<()> {
        (**self).write_duty_cycle(duty_cycle).await
    }

    async fn read_duty_cycle(&mut self) -> Result<u16> {
        (**self).read_duty_cycle().await
    }
}

/// Derived from the commanded duty cycle on every drive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FanState {
    Off,
    VarSpeed,
    FullSpeed,
}

/// One poll's temperature inputs. Zones absent from the platform, or
/// whose read failed this cycle, are `None` and contribute nothing.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ZoneTemperatures {
    pub soc: Option<f32>,
    pub hdd: Option<f32>,
    pub aux1: Option<f32>,
}

pub struct FanControl<A> {
    params: PlatformParams,
    actuator: A,
    /// Current commanded duty cycle; the control loop's memory.
    duty_cycle_pwm: u16,
    state: FanState,
}

impl<A: FanActuator> FanControl<A> {
    pub fn new(params: PlatformParams, actuator: A) -> Self {
        Self {
            params,
            actuator,
            duty_cycle_pwm: 0,
            state: FanState::Off,
        }
    }

    /// Pick up the duty cycle the boot scripts left behind. Falls back
    /// to the SOC row's minimum when the mailbox cannot be read.
    pub async fn init(&mut self) {
        self.duty_cycle_pwm = match self.actuator.read_duty_cycle().await {
            Ok(duty) => duty,
            Err(err) => {
                error!(error = %err, "failed to read current fan duty cycle");
                self.params.soc.duty_cycle_min
            }
        };
        self.state = state_for(self.duty_cycle_pwm);
        debug!(duty_cycle = self.duty_cycle_pwm, "fan control initialized");
    }

    pub fn duty_cycle(&self) -> u16 {
        self.duty_cycle_pwm
    }

    pub fn state(&self) -> FanState {
        self.state
    }

    /// SOC overheat threshold for the shutdown escalation path.
    pub fn overheat_temperature(&self) -> u16 {
        self.params.soc.temp_overheat
    }

    /// The hottest zone's demand wins.
    fn compute(&self, temps: &ZoneTemperatures, fan: FanSpin) -> u16 {
        let zones = [
            (Some(&self.params.soc), temps.soc),
            (self.params.hdd.as_ref(), temps.hdd),
            (self.params.aux1.as_ref(), temps.aux1),
        ];

        let mut new_duty_cycle = None;
        for (params, temp) in zones {
            if let (Some(params), Some(temp)) = (params, temp) {
                let zone_duty = desired_duty_cycle(temp, fan, self.duty_cycle_pwm, params);
                new_duty_cycle = Some(new_duty_cycle.unwrap_or(0).max(zone_duty));
            }
        }
        // No readable zone this cycle: hold.
        new_duty_cycle.unwrap_or(self.duty_cycle_pwm)
    }

    /// One control-loop evaluation: compute the combined target and
    /// drive the actuator if it changed.
    ///
    /// A stalled fan asked to speed up is first kicked to [`PWM_STARTUP`]
    /// for [`SPINUP_WAIT`]; commanding a low target directly may never
    /// produce rotation.
    pub async fn adjust_speed(&mut self, temps: ZoneTemperatures, fan_speed: u16) -> Result<()> {
        let fan = FanSpin::from_tach_count(fan_speed);
        let new_duty_cycle = self.compute(&temps, fan);

        debug!(
            soc_temp = ?temps.soc,
            hdd_temp = ?temps.hdd,
            aux1_temp = ?temps.aux1,
            fan_speed,
            current = self.duty_cycle_pwm,
            target = new_duty_cycle,
            "fan control evaluation"
        );

        if new_duty_cycle == self.duty_cycle_pwm {
            return Ok(());
        }

        if fan == FanSpin::Stopped && new_duty_cycle > self.duty_cycle_pwm {
            info!(duty_cycle = PWM_STARTUP, "kicking stalled fan");
            self.drive_pwm(PWM_STARTUP).await?;
            tokio::time::sleep(SPINUP_WAIT).await;
        }

        self.drive_pwm(new_duty_cycle).await
    }

    /// Write the duty cycle to the actuator, then update loop state.
    /// On write failure the cached duty cycle is left untouched so the
    /// next poll recomputes against what the hardware last accepted.
    pub async fn drive_pwm(&mut self, duty_cycle: u16) -> Result<()> {
        info!(duty_cycle, "drive pwm");
        self.actuator.write_duty_cycle(duty_cycle).await?;
        self.duty_cycle_pwm = duty_cycle;
        self.state = state_for(duty_cycle);
        Ok(())
    }
}

fn state_for(duty_cycle: u16) -> FanState {
    match duty_cycle {
        0 => FanState::Off,
        DUTY_CYCLE_PWM_MAX.. => FanState::FullSpeed,
        _ => FanState::VarSpeed,
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use super::super::params::FanControlParams;
    use super::*;
    use crate::error::Error;

    const SOC: FanControlParams = FanControlParams {
        temp_setpt: 90,
        temp_max: 100,
        temp_step: 2,
        duty_cycle_min: 12,
        duty_cycle_max: 40,
        pwm_step: 1,
        temp_overheat: 120,
    };

    const HDD: FanControlParams = FanControlParams {
        temp_setpt: 56,
        temp_max: 60,
        temp_step: 2,
        duty_cycle_min: 25,
        duty_cycle_max: 100,
        pwm_step: 2,
        temp_overheat: 120,
    };

    #[derive(Clone, Default)]
    struct RecordingActuator {
        writes: Arc<Mutex<Vec<u16>>>,
        fail_writes: bool,
        stored: u16,
    }

    impl RecordingActuator {
        fn writes(&self) -> Vec<u16> {
            self.writes.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl FanActuator for RecordingActuator {
        async fn write_duty_cycle(&mut self, duty_cycle: u16) -> Result<()> {
            if self.fail_writes {
                return Err(Error::Io(std::io::Error::other("mailbox gone")));
            }
            self.writes.lock().unwrap().push(duty_cycle);
            Ok(())
        }

        async fn read_duty_cycle(&mut self) -> Result<u16> {
            Ok(self.stored)
        }
    }

    fn soc_only(actuator: RecordingActuator) -> FanControl<RecordingActuator> {
        FanControl::new(
            PlatformParams {
                soc: SOC,
                hdd: None,
                aux1: None,
            },
            actuator,
        )
    }

    fn soc_temps(temp: f32) -> ZoneTemperatures {
        ZoneTemperatures {
            soc: Some(temp),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn init_picks_up_current_duty_cycle() {
        let actuator = RecordingActuator {
            stored: 33,
            ..Default::default()
        };
        let mut fan = soc_only(actuator);
        fan.init().await;
        assert_eq!(fan.duty_cycle(), 33);
        assert_eq!(fan.state(), FanState::VarSpeed);
    }

    #[tokio::test]
    async fn init_falls_back_to_soc_min_on_read_failure() {
        let mut fan = FanControl::new(
            PlatformParams {
                soc: SOC,
                hdd: None,
                aux1: None,
            },
            FailingReadActuator,
        );
        fan.init().await;
        assert_eq!(fan.duty_cycle(), SOC.duty_cycle_min);
    }

    struct FailingReadActuator;

    #[async_trait]
    impl FanActuator for FailingReadActuator {
        async fn write_duty_cycle(&mut self, _duty_cycle: u16) -> Result<()> {
            Ok(())
        }

        async fn read_duty_cycle(&mut self) -> Result<u16> {
            Err(Error::Io(std::io::Error::other("no mailbox")))
        }
    }

    #[tokio::test(start_paused = true)]
    async fn spinning_fan_steps_up_directly() {
        let actuator = RecordingActuator::default();
        let mut fan = soc_only(actuator.clone());
        fan.drive_pwm(12).await.unwrap();

        fan.adjust_speed(soc_temps(93.0), 1200).await.unwrap();

        assert_eq!(actuator.writes(), vec![12, 13]);
        assert_eq!(fan.duty_cycle(), 13);
    }

    #[tokio::test(start_paused = true)]
    async fn stalled_fan_gets_startup_kick_then_target() {
        let actuator = RecordingActuator::default();
        let mut fan = soc_only(actuator.clone());

        fan.adjust_speed(soc_temps(93.0), 0).await.unwrap();

        // Two-phase write: startup kick, then the computed target.
        assert_eq!(actuator.writes(), vec![PWM_STARTUP, SOC.duty_cycle_min]);
        assert_eq!(fan.duty_cycle(), SOC.duty_cycle_min);
    }

    #[tokio::test(start_paused = true)]
    async fn no_kick_when_slowing_down() {
        let actuator = RecordingActuator::default();
        let mut fan = soc_only(actuator.clone());
        fan.drive_pwm(20).await.unwrap();

        // Fan reported stopped, but the target is lower; drop straight
        // to zero without the kick.
        fan.adjust_speed(soc_temps(80.0), 0).await.unwrap();

        assert_eq!(actuator.writes(), vec![20, 0]);
        assert_eq!(fan.state(), FanState::Off);
    }

    #[tokio::test(start_paused = true)]
    async fn stable_result_writes_nothing_further() {
        let actuator = RecordingActuator::default();
        let mut fan = soc_only(actuator.clone());
        fan.drive_pwm(12).await.unwrap();

        // Inside the dead zone the target equals the current duty cycle.
        for _ in 0..4 {
            fan.adjust_speed(soc_temps(90.0), 900).await.unwrap();
        }

        assert_eq!(actuator.writes(), vec![12]);
    }

    #[tokio::test(start_paused = true)]
    async fn hottest_zone_wins() {
        let actuator = RecordingActuator::default();
        let mut fan = FanControl::new(
            PlatformParams {
                soc: SOC,
                hdd: Some(HDD),
                aux1: None,
            },
            actuator.clone(),
        );
        fan.drive_pwm(12).await.unwrap();

        // SOC is inside its band (wants 12), HDD is over temp_max
        // (wants 100); the combined demand is the HDD's.
        let temps = ZoneTemperatures {
            soc: Some(90.0),
            hdd: Some(61.0),
            aux1: None,
        };
        fan.adjust_speed(temps, 800).await.unwrap();

        assert_eq!(fan.duty_cycle(), HDD.duty_cycle_max);
    }

    #[tokio::test(start_paused = true)]
    async fn absent_zone_contributes_nothing() {
        let actuator = RecordingActuator::default();
        let mut fan = FanControl::new(
            PlatformParams {
                soc: SOC,
                hdd: Some(HDD),
                aux1: None,
            },
            actuator.clone(),
        );
        fan.drive_pwm(12).await.unwrap();

        // HDD read failed this cycle; only the SOC zone is evaluated.
        fan.adjust_speed(soc_temps(93.0), 800).await.unwrap();

        assert_eq!(fan.duty_cycle(), 13);
    }

    #[tokio::test(start_paused = true)]
    async fn actuator_failure_propagates_and_keeps_state() {
        let actuator = RecordingActuator {
            fail_writes: true,
            ..Default::default()
        };
        let mut fan = soc_only(actuator);

        let err = fan.adjust_speed(soc_temps(95.0), 700).await;

        assert!(err.is_err());
        // Cached duty cycle untouched; next poll recomputes from here.
        assert_eq!(fan.duty_cycle(), 0);
        assert_eq!(fan.state(), FanState::Off);
    }

    #[tokio::test(start_paused = true)]
    async fn full_speed_state_at_pwm_max() {
        let actuator = RecordingActuator::default();
        let mut fan = FanControl::new(
            PlatformParams {
                soc: GFMS_LIKE,
                hdd: None,
                aux1: None,
            },
            actuator,
        );

        fan.drive_pwm(100).await.unwrap();
        assert_eq!(fan.state(), FanState::FullSpeed);
    }

    const GFMS_LIKE: FanControlParams = FanControlParams {
        temp_setpt: 90,
        temp_max: 100,
        temp_step: 2,
        duty_cycle_min: 25,
        duty_cycle_max: 100,
        pwm_step: 2,
        temp_overheat: 120,
    };
}
