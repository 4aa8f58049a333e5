//! Subscriber wiring and log macro re-exports.
//!
//! Modules pull the log macros in through [`prelude`] so the subscriber
//! configuration stays in one place.

use tracing_subscriber::EnvFilter;

pub mod prelude {
    pub use ::tracing::{debug, error, info, trace, warn};
}

/// Environment variable controlling the log filter, e.g.
/// `SYSMON_LOG=sysmon=debug`.
pub const LOG_ENV: &str = "SYSMON_LOG";

/// Install the global fmt subscriber. Call once at process startup.
pub fn init() {
    let filter = EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}
