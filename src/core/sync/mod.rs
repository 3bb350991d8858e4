/*!
 * Synchronization Primitives
 *
 * Condition variable with a selectable deadline clock, behaving the same on
 * every host:
 * - Native backend (Linux/Android): pthread condvar with a bound clock
 * - Emulated backend (elsewhere): parking-lot condvar with a predicate flag
 *
 * # Architecture
 *
 * `ConditionVariable<B>` holds the contract; `CondvarBackend` is the seam
 * both backends implement. The platform default is picked at compile time,
 * and the `force-emulated` feature pins the emulated backend everywhere.
 *
 * # Use Cases
 *
 * - **Blocking queues**: Sleep until an item arrives or a deadline passes
 * - **Request/response**: Wait for a reply with a wall-clock deadline
 * - **Shutdown**: Broadcast to every waiter with `notify_all`
 */

mod clock;
mod condvar;
mod emulated;
#[cfg(any(target_os = "linux", target_os = "android"))]
mod native;
mod traits;

pub use clock::{to_host_deadline, ClockSelector, TimePoint};
pub use condvar::{ConditionVariable, DefaultBackend, DefaultRawLock, MutexLock, MutexLockGuard};
pub use traits::{CondvarBackend, WaitOutcome, WaitStatus};

// Re-export specific backends for advanced users
#[cfg(any(target_os = "linux", target_os = "android"))]
pub use clock::to_timespec;
pub use emulated::EmulatedCondvar;
#[cfg(any(target_os = "linux", target_os = "android"))]
pub use native::{NativeCondvar, PthreadRawMutex};
