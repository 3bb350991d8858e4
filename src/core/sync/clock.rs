/*!
 * Clocks and Deadlines
 *
 * Clock selection for timed waits plus the conversions each backend needs:
 * - Native backend: absolute `timespec` on the clock bound to the condvar
 * - Emulated backend: `std::time::Instant` on the host's single monotonic clock
 */

use serde::{Deserialize, Serialize};
use std::ops::Add;
use std::time::{Duration, Instant};

/// Clock a condition variable interprets its deadlines against
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClockSelector {
    /// Monotonic, immune to wall-clock adjustments
    #[default]
    Steady,
    /// Wall clock, subject to adjustment (NTP, manual changes)
    System,
}

impl ClockSelector {
    /// Current reading of this clock, measured from its epoch
    ///
    /// Cannot fail on supported targets: both clocks are mandatory on Linux
    /// and the fallback clocks are infallible. A broken `clock_gettime` trips
    /// a debug assertion and reads as zero in release builds.
    pub fn now(self) -> Duration {
        read_clock(self)
    }
}

/// An instant on a specific clock, nanosecond resolution
///
/// Points on different clocks are not comparable; arithmetic between two
/// points assumes they share a clock.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TimePoint {
    clock: ClockSelector,
    since_epoch: Duration,
}

impl TimePoint {
    /// Current time on `clock`
    pub fn now(clock: ClockSelector) -> Self {
        Self {
            clock,
            since_epoch: clock.now(),
        }
    }

    pub const fn from_epoch(clock: ClockSelector, since_epoch: Duration) -> Self {
        Self { clock, since_epoch }
    }

    #[inline]
    pub const fn clock(&self) -> ClockSelector {
        self.clock
    }

    #[inline]
    pub const fn since_epoch(&self) -> Duration {
        self.since_epoch
    }

    pub fn checked_add(&self, offset: Duration) -> Option<Self> {
        self.since_epoch
            .checked_add(offset)
            .map(|since_epoch| Self::from_epoch(self.clock, since_epoch))
    }

    /// Time from `self` until `later`, zero if `later` is not after `self`
    pub fn saturating_duration_until(&self, later: TimePoint) -> Duration {
        debug_assert_eq!(self.clock, later.clock, "time points on different clocks");
        later.since_epoch.saturating_sub(self.since_epoch)
    }

    /// Time left until this point on its own clock, zero once passed
    pub fn remaining(&self) -> Duration {
        TimePoint::now(self.clock).saturating_duration_until(*self)
    }

    /// The same deadline expressed on `clock`
    ///
    /// Points already on `clock` are returned unchanged; others are re-based
    /// using the time remaining until them on their own clock.
    pub fn on_clock(self, clock: ClockSelector) -> TimePoint {
        if self.clock == clock {
            self
        } else {
            TimePoint::now(clock) + self.remaining()
        }
    }

    #[inline]
    pub fn has_passed(&self) -> bool {
        self.remaining().is_zero()
    }
}

impl Add<Duration> for TimePoint {
    type Output = TimePoint;

    /// Saturates at `Duration::MAX` instead of panicking
    fn add(self, offset: Duration) -> TimePoint {
        self.checked_add(offset)
            .unwrap_or(TimePoint::from_epoch(self.clock, Duration::MAX))
    }
}

/// Convert a deadline into the absolute `timespec` pthread timed waits expect
///
/// Seconds are clamped to `time_t::MAX` so far-future deadlines never wrap.
#[cfg(any(target_os = "linux", target_os = "android"))]
pub fn to_timespec(deadline: TimePoint) -> nix::libc::timespec {
    use nix::libc::{c_long, time_t};

    let since_epoch = deadline.since_epoch();
    let tv_sec = time_t::try_from(since_epoch.as_secs()).unwrap_or(time_t::MAX);
    nix::libc::timespec {
        tv_sec,
        tv_nsec: since_epoch.subsec_nanos() as c_long,
    }
}

/// Re-base a deadline onto the host's monotonic `Instant`
///
/// Returns `None` when the deadline lies too far ahead to be represented,
/// which callers treat as "no deadline".
pub fn to_host_deadline(deadline: TimePoint) -> Option<Instant> {
    Instant::now().checked_add(deadline.remaining())
}

#[cfg(any(target_os = "linux", target_os = "android"))]
fn read_clock(clock: ClockSelector) -> Duration {
    use nix::time::{clock_gettime, ClockId};

    let id = match clock {
        ClockSelector::Steady => ClockId::CLOCK_MONOTONIC,
        ClockSelector::System => ClockId::CLOCK_REALTIME,
    };
    // Both clocks are mandatory on Linux; failure means a broken libc
    let reading = clock_gettime(id);
    debug_assert!(reading.is_ok(), "clock_gettime({clock:?}) failed");
    match reading {
        Ok(ts) => Duration::from(ts),
        Err(err) => {
            tracing::error!(clock = ?clock, error = %err, "clock_gettime failed");
            Duration::ZERO
        }
    }
}

#[cfg(not(any(target_os = "linux", target_os = "android")))]
fn read_clock(clock: ClockSelector) -> Duration {
    use std::sync::OnceLock;
    use std::time::SystemTime;

    static STEADY_ANCHOR: OnceLock<Instant> = OnceLock::new();

    match clock {
        ClockSelector::Steady => STEADY_ANCHOR.get_or_init(Instant::now).elapsed(),
        ClockSelector::System => SystemTime::now()
            .duration_since(SystemTime::UNIX_EPOCH)
            .unwrap_or(Duration::ZERO),
    }
}
