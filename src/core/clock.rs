/*!
 * Clock Sources
 * Current-instant providers for the access control facade
 */

use crate::core::types::Timestamp;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

/// Source of the current instant
pub trait Clock: Send + Sync {
    fn now(&self) -> Timestamp;
}

/// Wall clock in whole seconds since the UNIX epoch
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Timestamp {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or(1)
            .max(1)
    }
}

/// Manually driven clock for tests and script replay
#[derive(Debug)]
pub struct ManualClock {
    now: AtomicU64,
}

impl ManualClock {
    pub fn new(start: Timestamp) -> Self {
        Self {
            now: AtomicU64::new(start),
        }
    }

    pub fn set(&self, instant: Timestamp) {
        self.now.store(instant, Ordering::SeqCst);
    }

    /// Move forward by `seconds`, saturating at the maximum instant
    pub fn advance(&self, seconds: u64) -> Timestamp {
        let mut current = self.now.load(Ordering::SeqCst);
        loop {
            let next = current.saturating_add(seconds);
            match self
                .now
                .compare_exchange(current, next, Ordering::SeqCst, Ordering::SeqCst)
            {
                Ok(_) => return next,
                Err(actual) => current = actual,
            }
        }
    }
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::new(1)
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Timestamp {
        self.now.load(Ordering::SeqCst)
    }
}

impl<C: Clock + ?Sized> Clock for std::sync::Arc<C> {
    fn now(&self) -> Timestamp {
        (**self).now()
    }
}
