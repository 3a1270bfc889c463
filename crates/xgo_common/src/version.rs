//! Go toolchain version parsing and the supported-version gate.

use serde::{Deserialize, Serialize};
use std::fmt;

/// The only `{major, minor}` toolchain line the patch set is written against.
pub const SUPPORTED_GO: (u32, u32) = (1, 20);

/// A `{major, minor, patch}` Go toolchain version.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug, Serialize, Deserialize)]
pub struct GoVersion {
    /// Major version (`1` in `go1.20.3`).
    pub major: u32,
    /// Minor version (`20` in `go1.20.3`).
    pub minor: u32,
    /// Patch version (`3` in `go1.20.3`); `0` for `go1.20` and pre-releases.
    pub patch: u32,
}

/// Errors produced while reading or validating a toolchain version.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum VersionError {
    /// The text does not contain a `goX.Y[.Z]` token.
    #[error("cannot parse go version from '{0}'")]
    Unparseable(String),

    /// The toolchain is not the single supported line.
    #[error("expect go{}.{}.x, actual: {actual}", .expected.0, .expected.1)]
    Unsupported {
        /// The supported `{major, minor}` pair.
        expected: (u32, u32),
        /// The version that was found.
        actual: GoVersion,
    },
}

impl GoVersion {
    /// Creates a version from its components.
    pub fn new(major: u32, minor: u32, patch: u32) -> Self {
        Self {
            major,
            minor,
            patch,
        }
    }

    /// Parses the output of `go version`, e.g.
    /// `go version go1.20.3 linux/amd64`, or a bare `go1.20` token.
    ///
    /// Pre-release suffixes (`go1.21rc2`) parse with patch `0`.
    pub fn parse_go_version_output(text: &str) -> Result<Self, VersionError> {
        text.split_whitespace()
            .find_map(|tok| tok.strip_prefix("go").and_then(Self::parse_numbers))
            .ok_or_else(|| VersionError::Unparseable(text.trim().to_string()))
    }

    fn parse_numbers(s: &str) -> Option<Self> {
        let mut parts = s.splitn(3, '.');
        let major = parts.next()?.parse().ok()?;
        let minor = leading_number(parts.next()?)?;
        let patch = match parts.next() {
            Some(p) => leading_number(p)?,
            None => 0,
        };
        Some(Self::new(major, minor, patch))
    }

    /// Returns `Ok` only for the supported `{major, minor}` line.
    pub fn require_supported(&self) -> Result<(), VersionError> {
        if (self.major, self.minor) == SUPPORTED_GO {
            Ok(())
        } else {
            Err(VersionError::Unsupported {
                expected: SUPPORTED_GO,
                actual: *self,
            })
        }
    }

    /// Returns `true` when this version is `major.minor` or newer.
    pub fn at_least(&self, major: u32, minor: u32) -> bool {
        self.major > major || (self.major == major && self.minor >= minor)
    }

    /// Directory-style name, `go<major>.<minor>.<patch>`.
    pub fn dir_name(&self) -> String {
        self.to_string()
    }
}

fn leading_number(s: &str) -> Option<u32> {
    let end = s.find(|c: char| !c.is_ascii_digit()).unwrap_or(s.len());
    if end == 0 {
        return None;
    }
    s[..end].parse().ok()
}

impl fmt::Display for GoVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "go{}.{}.{}", self.major, self.minor, self.patch)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_full_output() {
        let v = GoVersion::parse_go_version_output("go version go1.20.3 linux/amd64\n").unwrap();
        assert_eq!(v, GoVersion::new(1, 20, 3));
    }

    #[test]
    fn parse_bare_token() {
        assert_eq!(
            GoVersion::parse_go_version_output("go1.20").unwrap(),
            GoVersion::new(1, 20, 0)
        );
    }

    #[test]
    fn parse_prerelease() {
        assert_eq!(
            GoVersion::parse_go_version_output("go version go1.21rc2 darwin/arm64").unwrap(),
            GoVersion::new(1, 21, 0)
        );
    }

    #[test]
    fn parse_garbage_errors() {
        let err = GoVersion::parse_go_version_output("command not found").unwrap_err();
        assert!(matches!(err, VersionError::Unparseable(_)));
    }

    #[test]
    fn supported_line_accepted() {
        for patch in [0, 1, 14] {
            assert!(GoVersion::new(1, 20, patch).require_supported().is_ok());
        }
    }

    #[test]
    fn other_lines_rejected() {
        for v in [
            GoVersion::new(1, 19, 5),
            GoVersion::new(1, 21, 0),
            GoVersion::new(2, 20, 0),
        ] {
            let err = v.require_supported().unwrap_err();
            assert_eq!(
                err,
                VersionError::Unsupported {
                    expected: (1, 20),
                    actual: v
                }
            );
        }
    }

    #[test]
    fn unsupported_display() {
        let err = GoVersion::new(1, 21, 4).require_supported().unwrap_err();
        assert_eq!(err.to_string(), "expect go1.20.x, actual: go1.21.4");
    }

    #[test]
    fn at_least_predicate() {
        assert!(GoVersion::new(1, 20, 0).at_least(1, 20));
        assert!(GoVersion::new(1, 21, 0).at_least(1, 20));
        assert!(GoVersion::new(2, 0, 0).at_least(1, 20));
        assert!(!GoVersion::new(1, 19, 9).at_least(1, 20));
    }

    #[test]
    fn dir_name_format() {
        assert_eq!(GoVersion::new(1, 20, 3).dir_name(), "go1.20.3");
    }
}
