//! Small helpers shared across modules.

use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

/// Lock a std mutex, recovering the guard if a holder panicked.
pub(crate) fn lock<T: ?Sized>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Exponential backoff: `base * 2^(attempt - 1)`, capped at `max`.
///
/// - attempt 1 → `base`
/// - attempt 2 → `2 * base`
/// - attempt 0 is treated as 1.
pub(crate) fn backoff_delay(base: Duration, max: Duration, attempt: u32) -> Duration {
    let exp = attempt.saturating_sub(1).min(16);
    base.saturating_mul(1u32 << exp).min(max)
}
