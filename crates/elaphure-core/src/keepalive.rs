//! TCP keep-alive policy.
//!
//! The policy is applied once, right after connect, and only when the
//! running OS is new enough to support every option it sets. On older or
//! unrecognized systems it is silently skipped.

use std::time::Duration;

/// Kernel release, compared component-wise.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct OsVersion {
    /// Major version
    pub major: u32,
    /// Minor version
    pub minor: u32,
    /// Patch level
    pub patch: u32,
}

impl OsVersion {
    /// Construct a version.
    pub const fn new(major: u32, minor: u32, patch: u32) -> Self {
        Self { major, minor, patch }
    }

    /// Parse a release string such as `6.1.0-18-amd64` or `23.1.0`.
    ///
    /// Missing trailing components count as zero; anything after the
    /// numeric prefix of a component is ignored.
    pub fn parse(release: &str) -> Option<Self> {
        let mut parts = release.trim().split('.').map(|part| {
            let digits: String = part.chars().take_while(char::is_ascii_digit).collect();
            digits.parse::<u32>().ok()
        });

        let major = parts.next().flatten()?;
        let minor = parts.next().flatten().unwrap_or(0);
        let patch = parts.next().flatten().unwrap_or(0);
        Some(Self { major, minor, patch })
    }
}

/// Oldest kernel release that supports idle, interval and count options.
#[cfg(target_os = "linux")]
const MIN_OS: OsVersion = OsVersion::new(2, 4, 0);

#[cfg(any(target_os = "macos", target_os = "ios"))]
const MIN_OS: OsVersion = OsVersion::new(15, 0, 0);

#[cfg(not(any(target_os = "linux", target_os = "macos", target_os = "ios")))]
const MIN_OS: OsVersion = OsVersion::new(u32::MAX, 0, 0);

/// Keep-alive tuning.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeepAlivePolicy {
    /// Idle time before the first probe
    pub idle: Duration,
    /// Interval between probes
    pub interval: Duration,
    /// Unanswered probes before the connection is dropped
    pub retries: u32,
    /// Oldest OS release the policy is applied on
    pub min_os: OsVersion,
}

impl Default for KeepAlivePolicy {
    fn default() -> Self {
        Self {
            idle: Duration::from_secs(10),
            interval: Duration::from_secs(2),
            retries: 5,
            min_os: MIN_OS,
        }
    }
}

impl KeepAlivePolicy {
    /// Whether the policy should be applied on `os`.
    ///
    /// An unknown OS version never qualifies.
    pub fn applies_to(&self, os: Option<OsVersion>) -> bool {
        os.is_some_and(|os| os >= self.min_os)
    }
}
