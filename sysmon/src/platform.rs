//! Platform identity, read once at startup from `/etc/platform`.
//!
//! The platform name selects the fan parameter table and tells the
//! monitor which thermal zones exist. The instance is constructed in
//! `main` and passed by reference into whatever needs it; there is no
//! global.

use std::path::Path;

use crate::tracing::prelude::*;

pub const PLATFORM_FILE: &str = "/etc/platform";

const COMMENT_CHAR: char = '#';

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlatformKind {
    /// Media server, fan cools SOC and HDD.
    Gfms100,
    /// TV box, SOC only.
    Gfhd100,
    /// Router without HDD.
    Gfrg200,
    /// Router with HDD.
    Gfrg210,
    /// Router with HDD and a separately monitored Wi-Fi SOC.
    Gfrg250,
    /// Storage unit, SOC and HDD.
    Gfsc100,
    Unknown,
}

#[derive(Debug, Clone)]
pub struct Platform {
    name: String,
    kind: PlatformKind,
    has_hdd: bool,
    has_aux1: bool,
}

impl Platform {
    /// Detect the running platform from [`PLATFORM_FILE`].
    pub fn detect() -> Self {
        Self::from_file(Path::new(PLATFORM_FILE))
    }

    pub fn from_file(path: &Path) -> Self {
        match std::fs::read_to_string(path) {
            Ok(contents) => Self::from_contents(&contents),
            Err(err) => {
                error!(path = %path.display(), error = %err, "cannot read platform file");
                Self::from_name("UNKNOWN")
            }
        }
    }

    pub fn from_contents(contents: &str) -> Self {
        match first_value_line(contents) {
            Some(name) => Self::from_name(name),
            None => {
                error!("platform file holds no platform name");
                Self::from_name("UNKNOWN")
            }
        }
    }

    pub fn from_name(name: &str) -> Self {
        let (kind, has_hdd, has_aux1) = match name {
            "GFMS100" => (PlatformKind::Gfms100, true, false),
            "GFHD100" => (PlatformKind::Gfhd100, false, false),
            "GFRG200" => (PlatformKind::Gfrg200, false, false),
            "GFRG210" => (PlatformKind::Gfrg210, true, false),
            "GFRG250" => (PlatformKind::Gfrg250, true, true),
            "GFSC100" => (PlatformKind::Gfsc100, true, false),
            other => {
                error!(platform = %other, "unknown platform name");
                (PlatformKind::Unknown, false, false)
            }
        };

        Self {
            name: name.to_string(),
            kind,
            has_hdd,
            has_aux1,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> PlatformKind {
        self.kind
    }

    pub fn has_hdd(&self) -> bool {
        self.has_hdd
    }

    pub fn has_aux1(&self) -> bool {
        self.has_aux1
    }
}

/// First non-empty, non-comment line, trimmed.
fn first_value_line(contents: &str) -> Option<&str> {
    contents
        .lines()
        .map(str::trim)
        .find(|line| !line.is_empty() && !line.starts_with(COMMENT_CHAR))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_platform_name_past_comments() {
        let platform = Platform::from_contents("# board id\n\nGFRG210\n");
        assert_eq!(platform.kind(), PlatformKind::Gfrg210);
        assert_eq!(platform.name(), "GFRG210");
        assert!(platform.has_hdd());
        assert!(!platform.has_aux1());
    }

    #[test]
    fn soc_only_platform_has_no_extra_zones() {
        let platform = Platform::from_name("GFHD100");
        assert_eq!(platform.kind(), PlatformKind::Gfhd100);
        assert!(!platform.has_hdd());
        assert!(!platform.has_aux1());
    }

    #[test]
    fn aux1_platform() {
        let platform = Platform::from_name("GFRG250");
        assert!(platform.has_hdd());
        assert!(platform.has_aux1());
    }

    #[test]
    fn unknown_name_maps_to_unknown_kind() {
        let platform = Platform::from_name("GFXX999");
        assert_eq!(platform.kind(), PlatformKind::Unknown);
        assert!(!platform.has_hdd());
    }

    #[test]
    fn empty_file_maps_to_unknown() {
        let platform = Platform::from_contents("# nothing here\n");
        assert_eq!(platform.kind(), PlatformKind::Unknown);
    }
}
