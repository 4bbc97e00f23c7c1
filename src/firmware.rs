use std::fmt::Display;
use std::num::ParseIntError;
use std::str::FromStr;

use thiserror::Error;

/// Marker line the device posts back once the heuristic stage runs.
pub const FW_MARKER: &str = "FW_VERSION:";

/// Highest encoded firmware the kernel stage is known to work on (`10.01`).
pub const KERNEL_STAGE_MAX: u32 = 1001;

/// Encoding used when the reported version string is garbage. Low enough
/// that the kernel stage is still attempted.
const UNKNOWN_ENCODED: u32 = 999;

/// Firmware version as reported by the device, e.g. `10.00`.
///
/// Versions are compared through their encoded form `major * 100 + minor`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FwVersion {
    raw: String,
    encoded: u32,
}

#[derive(Debug, Error)]
pub enum FwParseError {
    #[error("empty version string")]
    Empty,
    #[error("couldn't parse version number: {0}")]
    Number(#[from] ParseIntError),
}

impl FromStr for FwVersion {
    type Err = FwParseError;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.is_empty() {
            return Err(FwParseError::Empty);
        }

        let mut parts = s.split('.');
        let major = parts.next().unwrap_or_default().parse::<u64>()?;
        let minor = match parts.next() {
            Some(minor) => minor.parse::<u64>()?,
            None => 0,
        };

        // The marker comes off the network: saturate instead of wrapping so
        // an absurd version stays above the kernel-stage threshold.
        let encoded = major
            .saturating_mul(100)
            .saturating_add(minor)
            .min(u32::MAX as u64) as u32;

        Ok(FwVersion {
            raw: s.to_string(),
            encoded,
        })
    }
}

impl Display for FwVersion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.raw)
    }
}

impl FwVersion {
    /// Unparsable strings encode as a low unknown version instead of failing.
    pub fn parse_lossy(raw: &str) -> FwVersion {
        FwVersion::from_str(raw).unwrap_or_else(|_| FwVersion {
            raw: raw.trim().to_string(),
            encoded: UNKNOWN_ENCODED,
        })
    }

    pub fn encoded(&self) -> u32 {
        self.encoded
    }

    pub fn allows_kernel_stage(&self) -> bool {
        self.encoded <= KERNEL_STAGE_MAX
    }
}

/// Scans captured log text for the firmware marker and returns the trimmed
/// remainder of the first line carrying it.
pub fn find_marker(content: &str) -> Option<&str> {
    content
        .lines()
        .find_map(|line| line.split_once(FW_MARKER).map(|(_, rest)| rest.trim()))
}

#[cfg(test)]
mod tests {
    use std::str::FromStr;

    use super::{find_marker, FwVersion};

    #[test]
    fn parse_major_minor() {
        let fw = FwVersion::from_str("10.00").unwrap();
        assert_eq!(fw.encoded(), 1000);
        assert!(fw.allows_kernel_stage());
    }

    #[test]
    fn parse_major_only() {
        let fw = FwVersion::from_str("7").unwrap();
        assert_eq!(fw.encoded(), 700);
    }

    #[test]
    fn threshold() {
        assert!(FwVersion::from_str("10.01").unwrap().allows_kernel_stage());
        assert!(!FwVersion::from_str("10.02").unwrap().allows_kernel_stage());
        assert!(!FwVersion::from_str("11.00").unwrap().allows_kernel_stage());
    }

    #[test]
    fn huge_version_fails_the_gate() {
        let fw = FwVersion::parse_lossy("99999999");
        assert!(fw.encoded() > super::KERNEL_STAGE_MAX);
        assert!(!fw.allows_kernel_stage());

        let fw = FwVersion::parse_lossy("4294967295.99");
        assert!(!fw.allows_kernel_stage());
    }

    #[test]
    fn garbage_encodes_low() {
        let fw = FwVersion::parse_lossy("beta-build");
        assert_eq!(fw.encoded(), 999);
        assert!(fw.allows_kernel_stage());
    }

    #[test]
    fn marker_in_log_body() {
        const LOG: &str = "\
[12:30:01] log sink listening on 0.0.0.0:8080
[12:30:04] heuristic stage booted
[12:30:05] FW_VERSION:10.00
[12:30:05] heuristic done
";
        assert_eq!(find_marker(LOG), Some("10.00"));
    }

    #[test]
    fn marker_absent() {
        assert_eq!(find_marker("nothing to see\nhere\n"), None);
    }
}
