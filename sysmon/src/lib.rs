//! Peripheral monitoring and thermal fan control for set-top-box and
//! router platforms.
//!
//! The daemon polls the GPIO mailbox for SOC temperature, fan tach count
//! and voltage, runs a per-zone duty-cycle control loop against the
//! platform's fan parameter table, and escalates sustained overheat to a
//! warning LED and a forced power-off.

pub mod error;
pub mod mailbox;
pub mod monitor;
pub mod platform;
pub mod thermal;
pub mod tracing;
pub mod types;
