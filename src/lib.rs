/*!
 * IPC Sync
 * Cross-platform condition variable with selectable deadline clocks
 */

pub mod config;
pub mod core;
pub mod monitoring;

// Re-exports
pub use config::NameServerConfig;
pub use crate::core::errors::{ConfigError, ConfigResult, SyncError, SyncResult};
pub use crate::core::sync::{
    ClockSelector, ConditionVariable, CondvarBackend, DefaultBackend, EmulatedCondvar, MutexLock,
    MutexLockGuard, TimePoint, WaitStatus,
};
pub use monitoring::init_tracing;
