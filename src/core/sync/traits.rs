/*!
 * Condition Variable Backend Traits
 *
 * # Design: Trait-Based Abstraction for Backends
 *
 * `ConditionVariable` is generic over its backend, so the backend is fixed
 * by monomorphization and no call ever branches on which one is active.
 */

use super::clock::{ClockSelector, TimePoint};
use crate::core::errors::SyncResult;
use parking_lot::lock_api::RawMutex;

/// Outcome of a timed wait, as seen by callers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitStatus {
    /// Woken by a notification (or spuriously) before the deadline
    NoTimeout,
    /// Deadline reached with no notification observed
    Timeout,
}

impl WaitStatus {
    #[inline(always)]
    pub fn timed_out(&self) -> bool {
        matches!(self, WaitStatus::Timeout)
    }
}

/// Uncollapsed outcome of a backend timed wait
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitOutcome {
    Signaled,
    TimedOut,
    /// Native call returned a code that is neither success nor timeout
    Failed(i32),
}

impl WaitOutcome {
    /// Binary mapping: every failure code counts as a wake-up
    #[inline]
    pub fn collapse(self) -> WaitStatus {
        match self {
            WaitOutcome::TimedOut => WaitStatus::Timeout,
            WaitOutcome::Signaled | WaitOutcome::Failed(_) => WaitStatus::NoTimeout,
        }
    }
}

/// A native wait/notify resource
///
/// Implementations own exactly one resource for their whole lifetime and
/// release it on drop.
///
/// # Safety contract for `wait`/`wait_until`
///
/// The calling thread must hold `lock`. It is released while the thread is
/// suspended and held again when the call returns, on every path.
pub trait CondvarBackend: Send + Sync + Sized {
    /// Raw lock the backend's wait calls release and re-acquire
    type RawLock: RawMutex + Send + Sync;

    /// Backend name for debugging
    const NAME: &'static str;

    /// Allocate the native resource, binding `clock` where supported
    fn create(clock: ClockSelector) -> SyncResult<Self>;

    /// Clock selected at construction
    fn clock(&self) -> ClockSelector;

    /// Wake at least one waiter, no-op without waiters
    fn notify_one(&self);

    /// Wake every suspended waiter
    fn notify_all(&self);

    /// Suspend until notified or spuriously woken
    ///
    /// # Safety
    ///
    /// `lock` must be held by the calling thread.
    unsafe fn wait(&self, lock: &Self::RawLock);

    /// Suspend until notified, spuriously woken, or `deadline` passes
    ///
    /// # Safety
    ///
    /// `lock` must be held by the calling thread.
    unsafe fn wait_until(&self, lock: &Self::RawLock, deadline: TimePoint) -> WaitOutcome;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_collapse_folds_failures_into_no_timeout() {
        assert_eq!(WaitOutcome::Signaled.collapse(), WaitStatus::NoTimeout);
        assert_eq!(WaitOutcome::TimedOut.collapse(), WaitStatus::Timeout);
        assert_eq!(WaitOutcome::Failed(22).collapse(), WaitStatus::NoTimeout);
    }

    #[test]
    fn test_timed_out() {
        assert!(WaitStatus::Timeout.timed_out());
        assert!(!WaitStatus::NoTimeout.timed_out());
    }
}
