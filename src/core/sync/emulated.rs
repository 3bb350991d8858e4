/*!
 * Emulated Backend
 *
 * Condition variable built on `parking_lot_core` parking, for hosts without
 * a clock-selectable native condvar.
 *
 * # Design
 *
 * The parking lot only knows one clock (`std::time::Instant`), so deadlines
 * on either selector are re-based onto it and the selector is merely stored.
 *
 * Timed waits cannot tell a notification from a timeout on their own, so the
 * instance carries a `signaled` flag: reset at the start of every timed wait,
 * set by every notify. The flag is checked in the park validation callback,
 * which runs under the parking lot's queue lock, so a notify landing between
 * the mutex release and the actual sleep is never lost.
 *
 * The flag is instance-wide: with several concurrent timed waiters, a
 * notify meant for one may satisfy another's predicate. A waiter entering
 * `wait_until` also clears a notify that an unparked waiter has not yet
 * observed, in which case that waiter parks again and the notify is lost.
 */

use super::clock::{to_host_deadline, ClockSelector, TimePoint};
use super::traits::{CondvarBackend, WaitOutcome};
use crate::core::errors::SyncResult;
use parking_lot::lock_api::RawMutex;
use parking_lot_core::{
    park, unpark_all, unpark_one, ParkResult, DEFAULT_PARK_TOKEN, DEFAULT_UNPARK_TOKEN,
};
use std::marker::PhantomData;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Instant;

/// Parking-lot condition variable with a shared predicate flag
///
/// Works with any `lock_api` raw mutex; defaults to `parking_lot::RawMutex`
/// so `parking_lot::Mutex` guards can be waited on directly.
pub struct EmulatedCondvar<R: RawMutex = parking_lot::RawMutex> {
    signaled: AtomicBool,
    clock: ClockSelector,
    _lock: PhantomData<fn() -> R>,
}

impl<R: RawMutex> EmulatedCondvar<R> {
    /// Parking address, stable while any thread borrows `self`
    #[inline]
    fn park_key(&self) -> usize {
        &self.signaled as *const AtomicBool as usize
    }

    /// Park on this instance, releasing `lock` only once enqueued
    ///
    /// `lock` is held again on return whatever the result.
    unsafe fn park_releasing(
        &self,
        lock: &R,
        validate: impl FnOnce() -> bool,
        deadline: Option<Instant>,
    ) -> ParkResult {
        let result = park(
            self.park_key(),
            validate,
            || lock.unlock(),
            |_key, _was_last| {},
            DEFAULT_PARK_TOKEN,
            deadline,
        );

        // before_sleep only runs when validation let the thread park
        if result != ParkResult::Invalid {
            lock.lock();
        }
        result
    }
}

impl<R: RawMutex + Send + Sync> CondvarBackend for EmulatedCondvar<R> {
    type RawLock = R;

    const NAME: &'static str = "emulated";

    fn create(clock: ClockSelector) -> SyncResult<Self> {
        if clock != ClockSelector::Steady {
            tracing::debug!(
                clock = ?clock,
                "emulated condvar measures deadlines on the host monotonic clock"
            );
        }
        Ok(Self {
            signaled: AtomicBool::new(false),
            clock,
            _lock: PhantomData,
        })
    }

    #[inline]
    fn clock(&self) -> ClockSelector {
        self.clock
    }

    fn notify_one(&self) {
        self.signaled.store(true, Ordering::SeqCst);
        unsafe { unpark_one(self.park_key(), |_| DEFAULT_UNPARK_TOKEN) };
    }

    fn notify_all(&self) {
        self.signaled.store(true, Ordering::SeqCst);
        unsafe { unpark_all(self.park_key(), DEFAULT_UNPARK_TOKEN) };
    }

    unsafe fn wait(&self, lock: &R) {
        self.park_releasing(lock, || true, None);
    }

    unsafe fn wait_until(&self, lock: &R, deadline: TimePoint) -> WaitOutcome {
        self.signaled.store(false, Ordering::SeqCst);
        let host_deadline = to_host_deadline(deadline);

        loop {
            if self.signaled.load(Ordering::SeqCst) {
                return WaitOutcome::Signaled;
            }

            let result = self.park_releasing(
                lock,
                || !self.signaled.load(Ordering::SeqCst),
                host_deadline,
            );

            if result == ParkResult::TimedOut {
                // A notify racing the deadline still counts as a wake-up
                return if self.signaled.load(Ordering::SeqCst) {
                    WaitOutcome::Signaled
                } else {
                    WaitOutcome::TimedOut
                };
            }
        }
    }
}
