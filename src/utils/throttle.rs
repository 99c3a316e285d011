//! Rate limiting primitives
//!
//! [`Cooldown`] gates a single action to at most once per period (used for
//! per-client refresh commands). [`LogThrottler`] applies the same idea per
//! message key so hot-path warnings do not flood the log.

use parking_lot::Mutex;
use std::collections::HashMap;
use std::time::{Duration, Instant};

/// Single-slot cooldown
///
/// The first acquisition always succeeds. Later acquisitions succeed only
/// once `period` has elapsed since the last successful one.
#[derive(Debug)]
pub struct Cooldown {
    period: Duration,
    last: Mutex<Option<Instant>>,
}

impl Cooldown {
    pub fn new(period: Duration) -> Self {
        Self {
            period,
            last: Mutex::new(None),
        }
    }

    /// Try to take the slot at `now`
    ///
    /// Returns the remaining wait time when still cooling down.
    pub fn try_acquire_at(&self, now: Instant) -> Result<(), Duration> {
        let mut last = self.last.lock();
        if let Some(prev) = *last {
            let elapsed = now.saturating_duration_since(prev);
            if elapsed < self.period {
                return Err(self.period - elapsed);
            }
        }
        *last = Some(now);
        Ok(())
    }
}

/// Keyed log throttler
///
/// Counts how many messages were swallowed for a key so the next emitted
/// line can report them.
pub struct LogThrottler {
    interval: Duration,
    entries: Mutex<HashMap<&'static str, (Instant, u64)>>,
}

impl LogThrottler {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            entries: Mutex::new(HashMap::new()),
        }
    }

    pub fn with_secs(secs: u64) -> Self {
        Self::new(Duration::from_secs(secs))
    }

    /// Returns `Some(suppressed)` when a message for `key` may be logged now,
    /// where `suppressed` is the number of messages swallowed since the last one.
    pub fn should_log(&self, key: &'static str) -> Option<u64> {
        let now = Instant::now();
        let mut entries = self.entries.lock();
        match entries.get_mut(key) {
            Some((last, suppressed)) if now.duration_since(*last) < self.interval => {
                *suppressed += 1;
                None
            }
            Some((last, suppressed)) => {
                let count = *suppressed;
                *last = now;
                *suppressed = 0;
                Some(count)
            }
            None => {
                entries.insert(key, (now, 0));
                Some(0)
            }
        }
    }
}

impl Default for LogThrottler {
    /// 5 second interval
    fn default() -> Self {
        Self::with_secs(5)
    }
}

/// Throttled warning
///
/// ```rust
/// use smart_clock::utils::LogThrottler;
/// use smart_clock::warn_throttled;
///
/// let throttler = LogThrottler::default();
/// warn_throttled!(throttler, "intake_full", "Frame dropped: {}", "intake full");
/// ```
#[macro_export]
macro_rules! warn_throttled {
    ($throttler:expr, $key:expr, $($arg:tt)*) => {
        if let Some(suppressed) = $throttler.should_log($key) {
            tracing::warn!(suppressed, $($arg)*);
        }
    };
}
