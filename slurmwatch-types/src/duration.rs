//! Wait-time representation.
//!
//! Wait times are measured in seconds. Medians and means over whole-second
//! samples can land between two seconds, so the value is kept as an `f64`.

use std::fmt;
use std::time::Duration;

/// A span of time in seconds.
///
/// Displayed the way the dashboard shows queue waits: `"1d 2h 3m 4s"`,
/// truncated to whole seconds.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(transparent))]
pub struct Seconds(pub f64);

impl Seconds {
    /// Zero seconds.
    pub const ZERO: Self = Self(0.0);

    /// Create from a whole number of seconds.
    pub fn from_secs(secs: u64) -> Self {
        Self(secs as f64)
    }

    /// The value in (possibly fractional) seconds.
    pub const fn as_secs_f64(&self) -> f64 {
        self.0
    }

    /// The value truncated to whole seconds. Negative and NaN values are 0.
    pub fn whole_secs(&self) -> u64 {
        // `as` saturates and maps NaN to 0
        self.0 as u64
    }

    /// Convert to a standard Duration, saturating at zero.
    pub fn to_duration(&self) -> Duration {
        Duration::try_from_secs_f64(self.0.max(0.0)).unwrap_or(Duration::ZERO)
    }
}

impl From<Duration> for Seconds {
    fn from(d: Duration) -> Self {
        Self(d.as_secs_f64())
    }
}

impl fmt::Display for Seconds {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut secs = self.whole_secs();
        let days = secs / 86_400;
        secs %= 86_400;
        let hours = secs / 3_600;
        secs %= 3_600;
        let minutes = secs / 60;
        secs %= 60;
        write!(f, "{}d {}h {}m {}s", days, hours, minutes, secs)
    }
}
