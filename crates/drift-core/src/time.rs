//! Wall-clock time for DRIFT event logs
//!
//! Log records carry seconds since the UNIX epoch so that logs written by
//! different processes share one time axis.

use std::fmt;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// Wall-clock instant in seconds since the UNIX epoch
#[derive(Clone, Copy, PartialEq, PartialOrd, Default)]
pub struct WallTime(f64);

impl WallTime {
    pub const ZERO: WallTime = WallTime(0.0);

    /// Read the system clock
    pub fn now() -> Self {
        let since_epoch = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or(Duration::ZERO);
        WallTime(since_epoch.as_secs_f64())
    }

    #[inline]
    pub fn from_secs_f64(secs: f64) -> Self {
        WallTime(secs)
    }

    #[inline]
    pub fn as_secs_f64(self) -> f64 {
        self.0
    }

    /// Elapsed time since `earlier`, zero if the clock went backwards
    pub fn duration_since(self, earlier: WallTime) -> Duration {
        let diff = self.0 - earlier.0;
        if diff.is_finite() && diff > 0.0 {
            Duration::from_secs_f64(diff)
        } else {
            Duration::ZERO
        }
    }

    #[inline]
    pub fn saturating_add(self, duration: Duration) -> Self {
        WallTime(self.0 + duration.as_secs_f64())
    }
}

impl fmt::Debug for WallTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "WallTime({:.4})", self.0)
    }
}

impl fmt::Display for WallTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.4}", self.0)
    }
}
