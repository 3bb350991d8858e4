/*!
 * Native pthread Backend
 *
 * Delegates to `pthread_cond_t` created with a clock attribute, so steady
 * and system deadlines are honored by the OS itself.
 *
 * # Design
 *
 * - The condvar lives in a `Box` so its address never changes once waiters
 *   may be queued on it
 * - `PthreadRawMutex` plugs a `pthread_mutex_t` into `lock_api`, which gives
 *   callers the usual guard-based API while the wait calls get the raw
 *   handle `pthread_cond_timedwait` needs
 */

use super::clock::{to_timespec, ClockSelector, TimePoint};
use super::traits::{CondvarBackend, WaitOutcome};
use crate::core::errors::{SyncError, SyncResult};
use nix::libc;
use parking_lot::lock_api::{GuardNoSend, RawMutex};
use std::cell::UnsafeCell;
use std::mem::MaybeUninit;
use tracing::{debug, trace};

/// A `pthread_mutex_t` usable as a `lock_api` raw mutex
///
/// Default (non-recursive) mutex type. Must not be moved while locked;
/// `lock_api::Mutex` only allows moves when no guard exists.
pub struct PthreadRawMutex {
    inner: UnsafeCell<libc::pthread_mutex_t>,
}

// SAFETY: pthread mutexes are designed to be shared between threads
unsafe impl Send for PthreadRawMutex {}
unsafe impl Sync for PthreadRawMutex {}

impl PthreadRawMutex {
    #[inline]
    pub fn as_ptr(&self) -> *mut libc::pthread_mutex_t {
        self.inner.get()
    }
}

unsafe impl RawMutex for PthreadRawMutex {
    #[allow(clippy::declare_interior_mutable_const)]
    const INIT: Self = Self {
        inner: UnsafeCell::new(libc::PTHREAD_MUTEX_INITIALIZER),
    };

    type GuardMarker = GuardNoSend;

    fn lock(&self) {
        let rc = unsafe { libc::pthread_mutex_lock(self.as_ptr()) };
        debug_assert_eq!(rc, 0, "pthread_mutex_lock failed");
    }

    fn try_lock(&self) -> bool {
        unsafe { libc::pthread_mutex_trylock(self.as_ptr()) == 0 }
    }

    unsafe fn unlock(&self) {
        let rc = libc::pthread_mutex_unlock(self.as_ptr());
        debug_assert_eq!(rc, 0, "pthread_mutex_unlock failed");
    }
}

impl Drop for PthreadRawMutex {
    fn drop(&mut self) {
        unsafe { libc::pthread_mutex_destroy(self.as_ptr()) };
    }
}

/// Condition variable backed by `pthread_cond_t` with a bound clock
pub struct NativeCondvar {
    cond: Box<UnsafeCell<libc::pthread_cond_t>>,
    clock: ClockSelector,
}

// SAFETY: pthread condvars are designed to be shared between threads and the
// boxed handle is never exposed
unsafe impl Send for NativeCondvar {}
unsafe impl Sync for NativeCondvar {}

fn clock_id(clock: ClockSelector) -> libc::clockid_t {
    match clock {
        ClockSelector::Steady => libc::CLOCK_MONOTONIC,
        ClockSelector::System => libc::CLOCK_REALTIME,
    }
}

fn allocation_failed(resource: &str, code: i32) -> SyncError {
    SyncError::ResourceAllocation {
        resource: resource.into(),
        code,
    }
}

impl CondvarBackend for NativeCondvar {
    type RawLock = PthreadRawMutex;

    const NAME: &'static str = "pthread";

    fn create(clock: ClockSelector) -> SyncResult<Self> {
        let mut attr = MaybeUninit::<libc::pthread_condattr_t>::uninit();

        let rc = unsafe { libc::pthread_condattr_init(attr.as_mut_ptr()) };
        if rc != 0 {
            return Err(allocation_failed("condition attribute", rc));
        }

        let rc = unsafe { libc::pthread_condattr_setclock(attr.as_mut_ptr(), clock_id(clock)) };
        if rc != 0 {
            unsafe { libc::pthread_condattr_destroy(attr.as_mut_ptr()) };
            return Err(allocation_failed("condition clock attribute", rc));
        }

        let cond = Box::new(UnsafeCell::new(libc::PTHREAD_COND_INITIALIZER));
        let rc = unsafe { libc::pthread_cond_init(cond.get(), attr.as_ptr()) };
        // The attribute is only read during init
        unsafe { libc::pthread_condattr_destroy(attr.as_mut_ptr()) };
        if rc != 0 {
            return Err(allocation_failed("condition variable", rc));
        }

        debug!(clock = ?clock, "pthread condition variable created");
        Ok(Self { cond, clock })
    }

    #[inline]
    fn clock(&self) -> ClockSelector {
        self.clock
    }

    fn notify_one(&self) {
        unsafe { libc::pthread_cond_signal(self.cond.get()) };
    }

    fn notify_all(&self) {
        unsafe { libc::pthread_cond_broadcast(self.cond.get()) };
    }

    unsafe fn wait(&self, lock: &PthreadRawMutex) {
        let rc = libc::pthread_cond_wait(self.cond.get(), lock.as_ptr());
        debug_assert_eq!(rc, 0, "pthread_cond_wait failed");
    }

    unsafe fn wait_until(&self, lock: &PthreadRawMutex, deadline: TimePoint) -> WaitOutcome {
        debug_assert_eq!(deadline.clock(), self.clock, "deadline on foreign clock");

        let ts = to_timespec(deadline);
        let rc = libc::pthread_cond_timedwait(self.cond.get(), lock.as_ptr(), &ts);
        trace!(rc, "pthread_cond_timedwait returned");

        match rc {
            0 => WaitOutcome::Signaled,
            libc::ETIMEDOUT => WaitOutcome::TimedOut,
            code => WaitOutcome::Failed(code),
        }
    }
}

impl Drop for NativeCondvar {
    fn drop(&mut self) {
        unsafe { libc::pthread_cond_destroy(self.cond.get()) };
        debug!(clock = ?self.clock, "pthread condition variable destroyed");
    }
}
