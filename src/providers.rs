//! Shared provider traits for dependency injection.
//!
//! External inputs that would make tests nondeterministic (the wall clock)
//! sit behind traits here so the history store can be tested with fixed values.

use chrono::{Local, NaiveDateTime};

/// Trait for providing timestamps.
///
/// # Example
///
/// ```
/// use hearth::providers::{SystemTimeProvider, TimeProvider};
///
/// let provider = SystemTimeProvider;
/// let stamp = provider.now();
/// assert!(stamp.and_utc().timestamp() > 0);
/// ```
pub trait TimeProvider: Send + Sync {
    /// Returns the current local time.
    fn now(&self) -> NaiveDateTime;
}

/// Default time provider using the system clock in the local timezone.
pub struct SystemTimeProvider;

impl TimeProvider for SystemTimeProvider {
    fn now(&self) -> NaiveDateTime {
        Local::now().naive_local()
    }
}

/// Time provider that always returns the same instant.
pub struct FixedTimeProvider(pub NaiveDateTime);

impl TimeProvider for FixedTimeProvider {
    fn now(&self) -> NaiveDateTime {
        self.0
    }
}
