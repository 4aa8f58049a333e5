//! Pure duty-cycle computation for one thermal zone.

use super::params::{DUTY_CYCLE_PWM_MIN, FanControlParams};

/// Whether the fan is currently rotating, derived from the tach pulse
/// count since the last poll.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FanSpin {
    Stopped,
    Spinning,
}

impl FanSpin {
    pub fn from_tach_count(count: u16) -> Self {
        if count == 0 {
            FanSpin::Stopped
        } else {
            FanSpin::Spinning
        }
    }
}

/// Compute one zone's desired duty cycle from its current temperature,
/// the commanded duty cycle, and the zone's parameter row.
///
/// Above `temp_max` the result is `duty_cycle_max` outright; the hard
/// ceiling must not wait on rate limiting. On the hot side of the
/// hysteresis band the duty cycle steps up by at most `pwm_step`, except
/// that a stopped fan jumps to `duty_cycle_min` (a near-zero step is
/// below its stall torque). On the cold side it steps down by `pwm_step`
/// with a floor at zero. Inside the band nothing changes; the dead zone
/// is what prevents oscillation at the set point.
pub fn desired_duty_cycle(
    temp: f32,
    fan: FanSpin,
    current: u16,
    params: &FanControlParams,
) -> u16 {
    // Params are validated at load time; saturate anyway so a bad row
    // cannot wrap the cold threshold.
    let hot_side = f32::from(params.temp_setpt.saturating_add(params.temp_step));
    let cold_side = f32::from(params.temp_setpt.saturating_sub(params.temp_step));

    if temp > f32::from(params.temp_max) {
        params.duty_cycle_max
    } else if temp > hot_side {
        match fan {
            FanSpin::Stopped => params.duty_cycle_min,
            FanSpin::Spinning if current < params.duty_cycle_max => {
                (current + params.pwm_step).min(params.duty_cycle_max)
            }
            FanSpin::Spinning => current,
        }
    } else if temp < cold_side {
        if fan == FanSpin::Stopped || current < params.pwm_step {
            DUTY_CYCLE_PWM_MIN
        } else {
            current - params.pwm_step
        }
    } else {
        current
    }
}
