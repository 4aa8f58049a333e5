//! Per-platform fan control parameter tables.
//!
//! One row per monitored thermal zone. The compiled-in defaults can be
//! overridden at startup from a plain-text tuning table so hardware
//! engineers can experiment without reflashing; rows that fail the
//! ordering invariants are rejected and the default kept.

use std::str::SplitWhitespace;

use crate::error::{Error, Result};
use crate::platform::{Platform, PlatformKind};
use crate::tracing::prelude::*;

pub const DUTY_CYCLE_PWM_MIN: u16 = 0;
pub const DUTY_CYCLE_PWM_MAX: u16 = 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Zone {
    Soc,
    Hdd,
    Aux1,
}

impl Zone {
    /// Keyword suffix used in the override table, e.g. `GFMS100_SOC`.
    pub fn suffix(&self) -> &'static str {
        match self {
            Zone::Soc => "SOC",
            Zone::Hdd => "HDD",
            Zone::Aux1 => "AUX1",
        }
    }
}

/// Control constants for one thermal zone.
///
/// The fan starts responding above `temp_setpt + temp_step` and slows
/// below `temp_setpt - temp_step`; in between it holds speed. Above
/// `temp_max` the duty cycle jumps to `duty_cycle_max` unconditionally.
/// `temp_overheat` feeds the separate shutdown escalation, not the fan
/// loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FanControlParams {
    pub temp_setpt: u16,
    pub temp_max: u16,
    pub temp_step: u16,
    pub duty_cycle_min: u16,
    pub duty_cycle_max: u16,
    pub pwm_step: u16,
    pub temp_overheat: u16,
}

impl FanControlParams {
    /// Enforce the table ordering invariants:
    /// `temp_step <= temp_setpt`, `temp_setpt + temp_step <= temp_max <=
    /// temp_overheat`, `duty_cycle_min <= duty_cycle_max <= 100`.
    ///
    /// A row where `temp_step > temp_setpt` would make the cold-side
    /// threshold wrap below zero; such rows are rejected outright rather
    /// than clamped.
    pub fn validate(&self) -> Result<()> {
        if self.temp_step > self.temp_setpt {
            return Err(Error::InvalidParams(format!(
                "temp_step {} exceeds temp_setpt {}",
                self.temp_step, self.temp_setpt
            )));
        }
        if self.temp_setpt.saturating_add(self.temp_step) > self.temp_max {
            return Err(Error::InvalidParams(format!(
                "hysteresis band top {} exceeds temp_max {}",
                self.temp_setpt.saturating_add(self.temp_step),
                self.temp_max
            )));
        }
        if self.temp_max > self.temp_overheat {
            return Err(Error::InvalidParams(format!(
                "temp_max {} exceeds temp_overheat {}",
                self.temp_max, self.temp_overheat
            )));
        }
        if self.duty_cycle_min > self.duty_cycle_max {
            return Err(Error::InvalidParams(format!(
                "duty_cycle_min {} exceeds duty_cycle_max {}",
                self.duty_cycle_min, self.duty_cycle_max
            )));
        }
        if self.duty_cycle_max > DUTY_CYCLE_PWM_MAX {
            return Err(Error::InvalidParams(format!(
                "duty_cycle_max {} exceeds pwm range",
                self.duty_cycle_max
            )));
        }
        Ok(())
    }
}

pub const GFMS100_SOC: FanControlParams = FanControlParams {
    temp_setpt: 90,
    temp_max: 100,
    temp_step: 2,
    duty_cycle_min: 25,
    duty_cycle_max: 100,
    pwm_step: 2,
    temp_overheat: 120,
};

pub const GFMS100_HDD: FanControlParams = FanControlParams {
    temp_setpt: 56,
    temp_max: 60,
    temp_step: 2,
    duty_cycle_min: 25,
    duty_cycle_max: 100,
    pwm_step: 2,
    temp_overheat: 120,
};

/// There is no direct SOC temp input on the routers; the remote sensor
/// reads low, so the set points are offset from the real CPU targets
/// (fan on near cpu ~93, max near cpu ~100).
pub const GFRG200_SOC: FanControlParams = FanControlParams {
    temp_setpt: 82,
    temp_max: 92,
    temp_step: 2,
    duty_cycle_min: 30,
    duty_cycle_max: 100,
    pwm_step: 2,
    temp_overheat: 105,
};

pub const GFRG210_SOC: FanControlParams = FanControlParams {
    temp_setpt: 86,
    temp_max: 94,
    temp_step: 2,
    duty_cycle_min: 30,
    duty_cycle_max: 100,
    pwm_step: 2,
    temp_overheat: 105,
};

pub const GFRG210_HDD: FanControlParams = FanControlParams {
    temp_setpt: 56,
    temp_max: 60,
    temp_step: 2,
    duty_cycle_min: 30,
    duty_cycle_max: 100,
    pwm_step: 2,
    temp_overheat: 105,
};

pub const GFRG250_SOC: FanControlParams = FanControlParams {
    temp_setpt: 85,
    temp_max: 92,
    temp_step: 2,
    duty_cycle_min: 30,
    duty_cycle_max: 100,
    pwm_step: 2,
    temp_overheat: 105,
};

pub const GFRG250_HDD: FanControlParams = FanControlParams {
    temp_setpt: 56,
    temp_max: 60,
    temp_step: 2,
    duty_cycle_min: 30,
    duty_cycle_max: 100,
    pwm_step: 2,
    temp_overheat: 105,
};

/// Wi-Fi SOC on the GFRG250, read through the aux1 mailbox file.
pub const GFRG250_AUX1: FanControlParams = FanControlParams {
    temp_setpt: 75,
    temp_max: 85,
    temp_step: 2,
    duty_cycle_min: 30,
    duty_cycle_max: 100,
    pwm_step: 2,
    temp_overheat: 105,
};

pub const GFSC100_SOC: FanControlParams = FanControlParams {
    temp_setpt: 86,
    temp_max: 94,
    temp_step: 2,
    duty_cycle_min: 30,
    duty_cycle_max: 100,
    pwm_step: 2,
    temp_overheat: 105,
};

pub const GFSC100_HDD: FanControlParams = FanControlParams {
    temp_setpt: 56,
    temp_max: 60,
    temp_step: 2,
    duty_cycle_min: 30,
    duty_cycle_max: 100,
    pwm_step: 2,
    temp_overheat: 105,
};

/* Measured on GFHD100: pwm 25% already spins the fan at roughly half
 * speed, and anything past pwm 40% buys less than 1% more airflow, so
 * Dmax is capped at 40 to keep the noise down. */
pub const GFHD100_SOC: FanControlParams = FanControlParams {
    temp_setpt: 90,
    temp_max: 100,
    temp_step: 2,
    duty_cycle_min: 12,
    duty_cycle_max: 40,
    pwm_step: 1,
    temp_overheat: 120,
};

/// The fan parameter rows for the zones a platform actually has.
#[derive(Debug, Clone)]
pub struct PlatformParams {
    pub soc: FanControlParams,
    pub hdd: Option<FanControlParams>,
    pub aux1: Option<FanControlParams>,
}

impl PlatformParams {
    /// Compiled-in defaults for the given platform.
    ///
    /// An unknown platform gets the conservative GFHD100 SOC row so the
    /// fan still responds to SOC temperature; the mismatch is reported
    /// loudly instead of leaving the table empty.
    pub fn defaults_for(platform: &Platform) -> Self {
        match platform.kind() {
            PlatformKind::Gfms100 => Self {
                soc: GFMS100_SOC,
                hdd: Some(GFMS100_HDD),
                aux1: None,
            },
            PlatformKind::Gfhd100 => Self {
                soc: GFHD100_SOC,
                hdd: None,
                aux1: None,
            },
            PlatformKind::Gfrg200 => Self {
                soc: GFRG200_SOC,
                hdd: None,
                aux1: None,
            },
            PlatformKind::Gfrg210 => Self {
                soc: GFRG210_SOC,
                hdd: Some(GFRG210_HDD),
                aux1: None,
            },
            PlatformKind::Gfrg250 => Self {
                soc: GFRG250_SOC,
                hdd: Some(GFRG250_HDD),
                aux1: Some(GFRG250_AUX1),
            },
            PlatformKind::Gfsc100 => Self {
                soc: GFSC100_SOC,
                hdd: Some(GFSC100_HDD),
                aux1: None,
            },
            PlatformKind::Unknown => {
                error!(
                    platform = %platform.name(),
                    "no fan parameter table for this platform, using GFHD100 SOC defaults"
                );
                Self {
                    soc: GFHD100_SOC,
                    hdd: None,
                    aux1: None,
                }
            }
        }
    }

    pub fn validate(&self) -> Result<()> {
        self.soc.validate()?;
        if let Some(hdd) = &self.hdd {
            hdd.validate()?;
        }
        if let Some(aux1) = &self.aux1 {
            aux1.validate()?;
        }
        Ok(())
    }

    /// Apply rows from a tuning table to the zones this platform has.
    /// Rows that are missing, malformed, or invariant-violating leave
    /// the compiled default in place.
    pub fn apply_overrides(&mut self, platform: &Platform, table: &str) {
        if let Some(row) = override_row(table, platform.name(), Zone::Soc) {
            self.soc = row;
        }
        if let Some(hdd) = self.hdd.as_mut() {
            if let Some(row) = override_row(table, platform.name(), Zone::Hdd) {
                *hdd = row;
            }
        }
        if let Some(aux1) = self.aux1.as_mut() {
            if let Some(row) = override_row(table, platform.name(), Zone::Aux1) {
                *aux1 = row;
            }
        }
    }
}

fn override_row(table: &str, platform_name: &str, zone: Zone) -> Option<FanControlParams> {
    let keyword = format!("{}_{}", platform_name, zone.suffix());
    let line = table
        .lines()
        .map(str::trim_start)
        .find(|line| line.starts_with(&keyword))?;

    match parse_params_row(line) {
        Ok(params) => {
            info!(
                keyword = %keyword,
                setpt = params.temp_setpt,
                max = params.temp_max,
                step = params.temp_step,
                dmin = params.duty_cycle_min,
                dmax = params.duty_cycle_max,
                pwm_step = params.pwm_step,
                overheat = params.temp_overheat,
                "fan parameter override applied"
            );
            Some(params)
        }
        Err(err) => {
            error!(keyword = %keyword, error = %err, "rejecting fan parameter override row");
            None
        }
    }
}

/// Parse one override row: `<KEYWORD> Tsetpt Tmax Tstep Dmin Dmax PWMstep
/// Toverheat`, whitespace-delimited. The parsed row is also validated.
pub fn parse_params_row(line: &str) -> Result<FanControlParams> {
    let mut fields = line.split_whitespace();
    // Zone keyword.
    fields.next().ok_or_else(|| Error::Parse {
        what: "fan parameter row",
        value: line.to_string(),
    })?;

    let params = FanControlParams {
        temp_setpt: next_u16(&mut fields, "temp_setpt")?,
        temp_max: next_u16(&mut fields, "temp_max")?,
        temp_step: next_u16(&mut fields, "temp_step")?,
        duty_cycle_min: next_u16(&mut fields, "duty_cycle_min")?,
        duty_cycle_max: next_u16(&mut fields, "duty_cycle_max")?,
        pwm_step: next_u16(&mut fields, "pwm_step")?,
        temp_overheat: next_u16(&mut fields, "temp_overheat")?,
    };
    params.validate()?;
    Ok(params)
}

fn next_u16(fields: &mut SplitWhitespace, what: &'static str) -> Result<u16> {
    let field = fields.next().ok_or(Error::Parse {
        what,
        value: String::from("<missing>"),
    })?;
    field.parse().map_err(|_| Error::Parse {
        what,
        value: field.to_string(),
    })
}
