//! Tick sources
//!
//! The event loop asks its tick source for the current wall time, for how
//! long to pause before the next tick, and for the monotonic time elapsed
//! since the source was created. Wall time only stamps log events; run
//! deadlines are measured on the monotonic side. `WallTicks` follows real
//! time; `ManualTicks` advances a virtual clock so tests step without delay.

use std::time::{Duration, Instant};

use drift_core::WallTime;

/// Drives the tick cadence of an event loop
pub trait TickSource: Send {
    /// Wall time stamped on events produced now
    fn now(&self) -> WallTime;

    /// Monotonic time since this source was created, unaffected by
    /// system clock changes
    fn elapsed(&self) -> Duration;

    /// Move to the next tick boundary `period` after the previous one.
    /// Returns how long the caller must sleep to reach it.
    fn advance(&mut self, period: Duration) -> Duration;
}

/// Real-time ticks aligned to a fixed cadence
pub struct WallTicks {
    started: Instant,
    next_boundary: Instant,
}

impl WallTicks {
    pub fn new() -> Self {
        let now = Instant::now();
        WallTicks {
            started: now,
            next_boundary: now,
        }
    }
}

impl Default for WallTicks {
    fn default() -> Self {
        Self::new()
    }
}

impl TickSource for WallTicks {
    fn now(&self) -> WallTime {
        WallTime::now()
    }

    fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }

    fn advance(&mut self, period: Duration) -> Duration {
        let now = Instant::now();
        self.next_boundary += period;
        // A tick that overran its slot restarts the cadence instead of bursting
        if self.next_boundary < now {
            self.next_boundary = now;
        }
        self.next_boundary.saturating_duration_since(now)
    }
}

/// Virtual ticks for deterministic tests
#[derive(Clone, Debug)]
pub struct ManualTicks {
    now: WallTime,
    elapsed: Duration,
    ticks: u64,
}

impl ManualTicks {
    pub fn new() -> Self {
        Self::starting_at(WallTime::from_secs_f64(0.0))
    }

    pub fn starting_at(now: WallTime) -> Self {
        ManualTicks {
            now,
            elapsed: Duration::ZERO,
            ticks: 0,
        }
    }

    /// Boundaries crossed so far
    pub fn ticks(&self) -> u64 {
        self.ticks
    }
}

impl Default for ManualTicks {
    fn default() -> Self {
        Self::new()
    }
}

impl TickSource for ManualTicks {
    fn now(&self) -> WallTime {
        self.now
    }

    fn elapsed(&self) -> Duration {
        self.elapsed
    }

    fn advance(&mut self, period: Duration) -> Duration {
        self.now = self.now.saturating_add(period);
        self.elapsed = self.elapsed.saturating_add(period);
        self.ticks += 1;
        Duration::ZERO
    }
}
