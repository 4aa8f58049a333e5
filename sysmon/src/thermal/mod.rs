mod duty_cycle;
mod fan_control;
mod params;

pub use duty_cycle::{FanSpin, desired_duty_cycle};
pub use fan_control::{FanActuator, FanControl, FanState, PWM_STARTUP, ZoneTemperatures};
pub use params::{
    DUTY_CYCLE_PWM_MAX, DUTY_CYCLE_PWM_MIN, FanControlParams, PlatformParams, Zone,
    parse_params_row,
};
