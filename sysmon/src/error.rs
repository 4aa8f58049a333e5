use std::path::PathBuf;

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    /// A sensor value could not be read from the mailbox.
    #[error("failed to read {path}: {source}")]
    SensorRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A value could not be delivered to the mailbox.
    #[error("failed to write {path}: {source}")]
    ActuatorWrite {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A mailbox file or parameter table field held something unexpected.
    #[error("could not parse {value:?} as {what}")]
    Parse { what: &'static str, value: String },

    /// A fan parameter row violates the table ordering invariants.
    #[error("invalid fan control parameters: {0}")]
    InvalidParams(String),

    /// The drive temperature probe subprocess failed.
    #[error("hdd temperature probe failed: {0}")]
    HddProbe(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}
