/*!
 * Condition Variable
 *
 * One contract over both backends. The backend is a type parameter fixed at
 * build time (`DefaultBackend` per platform), never a per-call branch.
 *
 * Waiting takes the caller's `lock_api` guard, which proves the mutex is
 * held; the guard is held again when every wait returns.
 */

use super::clock::{ClockSelector, TimePoint};
use super::traits::{CondvarBackend, WaitOutcome, WaitStatus};
use crate::core::errors::{SyncError, SyncResult};
use parking_lot::lock_api::MutexGuard;
use std::fmt;
use std::time::Duration;
use tracing::{debug, warn};

#[cfg(all(
    any(target_os = "linux", target_os = "android"),
    not(feature = "force-emulated")
))]
/// Backend selected for this platform
pub type DefaultBackend = super::native::NativeCondvar;

#[cfg(not(all(
    any(target_os = "linux", target_os = "android"),
    not(feature = "force-emulated")
)))]
/// Backend selected for this platform
pub type DefaultBackend = super::emulated::EmulatedCondvar;

/// Raw lock the default backend waits on
pub type DefaultRawLock = <DefaultBackend as CondvarBackend>::RawLock;

/// Mutex usable with `ConditionVariable<DefaultBackend>`
pub type MutexLock<T> = parking_lot::lock_api::Mutex<DefaultRawLock, T>;

/// Guard of a `MutexLock`
pub type MutexLockGuard<'a, T> = MutexGuard<'a, DefaultRawLock, T>;

/// Condition variable with a deadline clock chosen at construction
///
/// Owns exactly one native wait/notify resource, released on drop. Dropping
/// while threads are suspended in a wait is impossible from safe code since
/// waits borrow `self`.
///
/// # Examples
///
/// ```
/// use ipc_sync::{ClockSelector, ConditionVariable, MutexLock, TimePoint};
/// use std::time::Duration;
///
/// let cv: ConditionVariable = ConditionVariable::new(ClockSelector::Steady).unwrap();
/// let mutex = MutexLock::new(false);
///
/// let mut ready = mutex.lock();
/// let deadline = TimePoint::now(ClockSelector::Steady) + Duration::from_millis(10);
/// let status = cv.wait_until(&mut ready, deadline);
/// assert!(status.timed_out());
/// ```
pub struct ConditionVariable<B: CondvarBackend = DefaultBackend> {
    backend: B,
}

impl<B: CondvarBackend> ConditionVariable<B> {
    /// Allocate the native resource and bind `clock` to it
    ///
    /// Allocation failure is returned as-is and never retried.
    pub fn new(clock: ClockSelector) -> SyncResult<Self> {
        let backend = B::create(clock)?;
        debug!(backend = B::NAME, clock = ?clock, "condition variable constructed");
        Ok(Self { backend })
    }

    #[inline]
    pub fn clock(&self) -> ClockSelector {
        self.backend.clock()
    }

    #[inline]
    pub fn backend_name(&self) -> &'static str {
        B::NAME
    }

    /// Wake at least one waiter. No-op without waiters, never blocks.
    #[inline]
    pub fn notify_one(&self) {
        self.backend.notify_one();
    }

    /// Wake every currently suspended waiter. No-op without waiters.
    #[inline]
    pub fn notify_all(&self) {
        self.backend.notify_all();
    }

    /// Release the mutex and suspend until notified
    ///
    /// May return spuriously; re-check the guarded condition afterwards.
    pub fn wait<T: ?Sized>(&self, guard: &mut MutexGuard<'_, B::RawLock, T>) {
        // SAFETY: the guard proves the calling thread holds the lock
        unsafe { self.backend.wait(MutexGuard::mutex(guard).raw()) }
    }

    /// Release the mutex and suspend until notified or `deadline` passes
    ///
    /// Deadlines on a clock other than [`clock`](Self::clock) are re-based
    /// onto it. Native failure codes other than a timeout are reported as
    /// `NoTimeout` and logged as a `tracing` warning with the code; use
    /// [`try_wait_until`](Self::try_wait_until) to see them.
    pub fn wait_until<T: ?Sized>(
        &self,
        guard: &mut MutexGuard<'_, B::RawLock, T>,
        deadline: TimePoint,
    ) -> WaitStatus {
        let outcome = self.wait_until_outcome(guard, deadline);
        if let WaitOutcome::Failed(code) = outcome {
            warn!(backend = B::NAME, code, "timed wait failed, reporting no_timeout");
        }
        outcome.collapse()
    }

    /// Like [`wait_until`](Self::wait_until), but surfaces native failures
    ///
    /// The mutex is held again on return, including on `Err`.
    pub fn try_wait_until<T: ?Sized>(
        &self,
        guard: &mut MutexGuard<'_, B::RawLock, T>,
        deadline: TimePoint,
    ) -> SyncResult<WaitStatus> {
        match self.wait_until_outcome(guard, deadline) {
            WaitOutcome::Failed(code) => Err(SyncError::WaitFailed { code }),
            outcome => Ok(outcome.collapse()),
        }
    }

    /// Wait with a deadline `timeout` from now on this instance's clock
    pub fn wait_for<T: ?Sized>(
        &self,
        guard: &mut MutexGuard<'_, B::RawLock, T>,
        timeout: Duration,
    ) -> WaitStatus {
        self.wait_until(guard, TimePoint::now(self.clock()) + timeout)
    }

    /// Block while `condition` holds, absorbing spurious wake-ups
    pub fn wait_while<T, F>(&self, guard: &mut MutexGuard<'_, B::RawLock, T>, mut condition: F)
    where
        T: ?Sized,
        F: FnMut(&mut T) -> bool,
    {
        while condition(&mut **guard) {
            self.wait(guard);
        }
    }

    /// Block while `condition` holds or until `deadline`
    ///
    /// Returns `Timeout` only if the condition still holds once the deadline
    /// has passed.
    pub fn wait_until_while<T, F>(
        &self,
        guard: &mut MutexGuard<'_, B::RawLock, T>,
        deadline: TimePoint,
        mut condition: F,
    ) -> WaitStatus
    where
        T: ?Sized,
        F: FnMut(&mut T) -> bool,
    {
        while condition(&mut **guard) {
            if self.wait_until(guard, deadline).timed_out() {
                return if condition(&mut **guard) {
                    WaitStatus::Timeout
                } else {
                    WaitStatus::NoTimeout
                };
            }
        }
        WaitStatus::NoTimeout
    }

    fn wait_until_outcome<T: ?Sized>(
        &self,
        guard: &mut MutexGuard<'_, B::RawLock, T>,
        deadline: TimePoint,
    ) -> WaitOutcome {
        let deadline = deadline.on_clock(self.clock());
        // SAFETY: the guard proves the calling thread holds the lock
        unsafe {
            self.backend
                .wait_until(MutexGuard::mutex(guard).raw(), deadline)
        }
    }
}

impl<B: CondvarBackend> fmt::Debug for ConditionVariable<B> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConditionVariable")
            .field("backend", &B::NAME)
            .field("clock", &self.clock())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::sync::EmulatedCondvar;
    use std::sync::Arc;
    use std::thread;
    use std::time::Instant;

    /// Backend whose timed wait always reports a native failure code
    struct FailingBackend;

    impl CondvarBackend for FailingBackend {
        type RawLock = parking_lot::RawMutex;

        const NAME: &'static str = "failing";

        fn create(_clock: ClockSelector) -> SyncResult<Self> {
            Ok(Self)
        }

        fn clock(&self) -> ClockSelector {
            ClockSelector::Steady
        }

        fn notify_one(&self) {}

        fn notify_all(&self) {}

        unsafe fn wait(&self, _lock: &Self::RawLock) {}

        unsafe fn wait_until(&self, _lock: &Self::RawLock, _deadline: TimePoint) -> WaitOutcome {
            WaitOutcome::Failed(22)
        }
    }

    fn far_deadline() -> TimePoint {
        TimePoint::now(ClockSelector::Steady) + Duration::from_secs(60)
    }

    #[test]
    fn test_past_deadline_times_out() {
        for clock in [ClockSelector::Steady, ClockSelector::System] {
            let cv: ConditionVariable = ConditionVariable::new(clock).unwrap();
            let mutex = MutexLock::new(());
            let mut guard = mutex.lock();

            let start = Instant::now();
            let past = TimePoint::from_epoch(clock, Duration::ZERO);
            assert_eq!(cv.wait_until(&mut guard, past), WaitStatus::Timeout);
            assert!(start.elapsed() < Duration::from_millis(100));
        }
    }

    #[test]
    fn test_wait_for_times_out() {
        let cv: ConditionVariable = ConditionVariable::new(ClockSelector::Steady).unwrap();
        let mutex = MutexLock::new(0u32);
        let mut guard = mutex.lock();

        let start = Instant::now();
        assert!(cv.wait_for(&mut guard, Duration::from_millis(50)).timed_out());
        assert!(start.elapsed() >= Duration::from_millis(50));
        *guard += 1;
        assert_eq!(*guard, 1);
    }

    #[test]
    fn test_notify_without_waiters_is_noop() {
        let cv: ConditionVariable = ConditionVariable::new(ClockSelector::Steady).unwrap();
        cv.notify_one();
        cv.notify_all();
    }

    #[test]
    fn test_wait_while_predicate() {
        let cv = Arc::new(ConditionVariable::<DefaultBackend>::new(ClockSelector::Steady).unwrap());
        let mutex = Arc::new(MutexLock::new(0u32));

        let (cv_clone, mutex_clone) = (cv.clone(), mutex.clone());
        let handle = thread::spawn(move || {
            let mut guard = mutex_clone.lock();
            cv_clone.wait_while(&mut guard, |value| *value < 5);
            *guard
        });

        for _ in 0..5 {
            thread::sleep(Duration::from_millis(10));
            *mutex.lock() += 1;
            cv.notify_one();
        }

        assert_eq!(handle.join().unwrap(), 5);
    }

    #[test]
    fn test_wait_until_while_reports_condition_at_deadline() {
        let cv: ConditionVariable = ConditionVariable::new(ClockSelector::Steady).unwrap();
        let mutex = MutexLock::new(true);
        let mut guard = mutex.lock();

        let deadline = TimePoint::now(ClockSelector::Steady) + Duration::from_millis(20);
        let status = cv.wait_until_while(&mut guard, deadline, |pending| *pending);
        assert_eq!(status, WaitStatus::Timeout);

        *guard = false;
        let status = cv.wait_until_while(&mut guard, deadline, |pending| *pending);
        assert_eq!(status, WaitStatus::NoTimeout);
    }

    #[test]
    fn test_wait_until_while_returns_when_condition_clears() {
        let cv = Arc::new(ConditionVariable::<DefaultBackend>::new(ClockSelector::Steady).unwrap());
        let mutex = Arc::new(MutexLock::new(true));

        let (cv_clone, mutex_clone) = (cv.clone(), mutex.clone());
        let handle = thread::spawn(move || {
            let mut pending = mutex_clone.lock();
            let start = Instant::now();
            let deadline = TimePoint::now(ClockSelector::Steady) + Duration::from_secs(10);
            let status = cv_clone.wait_until_while(&mut pending, deadline, |pending| *pending);
            (status, *pending, start.elapsed())
        });

        thread::sleep(Duration::from_millis(50));
        *mutex.lock() = false;
        cv.notify_one();

        let (status, pending, elapsed) = handle.join().unwrap();
        assert_eq!(status, WaitStatus::NoTimeout);
        assert!(!pending);
        assert!(elapsed < Duration::from_secs(5));
    }

    #[test]
    fn test_failed_code_collapses_to_no_timeout() {
        let cv = ConditionVariable::<FailingBackend>::new(ClockSelector::Steady).unwrap();
        let mutex = parking_lot::Mutex::new(0u32);
        let mut guard = mutex.lock();

        assert_eq!(cv.wait_until(&mut guard, far_deadline()), WaitStatus::NoTimeout);
        assert!(mutex.is_locked());
        *guard += 1;
        assert_eq!(*guard, 1);
    }

    #[test]
    fn test_try_wait_until_surfaces_failure() {
        let cv = ConditionVariable::<FailingBackend>::new(ClockSelector::Steady).unwrap();
        let mutex = parking_lot::Mutex::new(());
        let mut guard = mutex.lock();

        match cv.try_wait_until(&mut guard, far_deadline()) {
            Err(SyncError::WaitFailed { code }) => assert_eq!(code, 22),
            other => panic!("expected WaitFailed, got {:?}", other),
        }
        assert!(mutex.is_locked());
    }

    #[test]
    fn test_emulated_backend_explicitly() {
        let cv = ConditionVariable::<EmulatedCondvar>::new(ClockSelector::System).unwrap();
        assert_eq!(cv.backend_name(), "emulated");
        assert_eq!(cv.clock(), ClockSelector::System);

        let mutex = parking_lot::Mutex::new(());
        let mut guard = mutex.lock();
        assert!(cv.wait_for(&mut guard, Duration::from_millis(10)).timed_out());
    }

    #[test]
    fn test_debug_names_backend() {
        let cv: ConditionVariable = ConditionVariable::new(ClockSelector::Steady).unwrap();
        let debug = format!("{:?}", cv);
        assert!(debug.contains(cv.backend_name()));
        assert!(debug.contains("Steady"));
    }
}
