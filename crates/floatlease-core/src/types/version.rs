//! Library version reporting.

use std::fmt;

use serde::{Deserialize, Serialize};

/// A four-part version number: `major.minor.build.revision`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Version {
    /// Major version.
    pub major: u32,
    /// Minor version.
    pub minor: u32,
    /// Build number.
    pub build: u32,
    /// Revision number.
    pub revision: u32,
}

impl Version {
    /// Build a version from its parts.
    pub const fn new(major: u32, minor: u32, build: u32, revision: u32) -> Self {
        Self {
            major,
            minor,
            build,
            revision,
        }
    }

    /// Parse a dotted version string with up to four numeric parts.
    /// Missing parts are zero; a pre-release or build suffix is ignored.
    pub fn parse(text: &str) -> Option<Self> {
        let core = text.split(['-', '+']).next()?;
        let mut parts = [0u32; 4];
        for (slot, piece) in parts.iter_mut().zip(core.split('.')) {
            *slot = piece.parse().ok()?;
        }
        if core.split('.').count() > 4 {
            return None;
        }
        let [major, minor, build, revision] = parts;
        Some(Self::new(major, minor, build, revision))
    }

    /// Version of this library.
    pub fn current() -> Self {
        Self::parse(env!("CARGO_PKG_VERSION")).unwrap_or_default()
    }

    /// The parts as a tuple.
    pub fn as_tuple(self) -> (u32, u32, u32, u32) {
        (self.major, self.minor, self.build, self.revision)
    }
}

impl Default for Version {
    fn default() -> Self {
        Self::new(0, 0, 0, 0)
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}.{}.{}.{}",
            self.major, self.minor, self.build, self.revision
        )
    }
}
