//! Metrics backend boundary
//!
//! A [`StatSource`] hands out concurrency-safe [`Timer`] and [`Counter`]
//! handles by name. The [`Metrics`](crate::decorator::Metrics) decorator
//! resolves those handles through a [`StatCache`] so each name is
//! constructed once per decorator instance.
//!
//! Per scope `<name>` three handles exist:
//!
//! | Handle              | Kind    | Emitted                                 |
//! |---------------------|---------|-----------------------------------------|
//! | `<name>`            | timer   | once per executed action                |
//! | `<name>.success`    | counter | `+1` when the action succeeded          |
//! | `<name>.error`      | counter | `+1` when the action failed             |

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

pub mod cache;
pub mod memory;
pub mod prom;

pub use cache::{LockedStatCache, ShardedStatCache, StatCache};
pub use memory::MemoryStatSource;
pub use prom::PrometheusStatSource;

/// Emits the duration of an event, typically to build latency histograms
pub type Timer = Arc<dyn Fn(Duration) + Send + Sync>;

/// Emits a number of events happening at a given time
pub type Counter = Arc<dyn Fn(i64) + Send + Sync>;

/// Creates metrics with the given name
///
/// Returned handles must be safe to invoke concurrently without external
/// synchronization.
pub trait StatSource: Send + Sync {
    /// Latency-recording handle for `name`
    fn timer(&self, name: &str) -> Timer;

    /// Counter handle for `name`
    fn counter(&self, name: &str) -> Counter;
}

/// The timer and the success/error counters bound to one name
#[derive(Clone)]
pub struct StatSet {
    /// Measures how long an action takes
    pub latency: Timer,
    /// Incremented when an action does not fail
    pub success: Counter,
    /// Incremented when an action fails
    pub error: Counter,
}

impl StatSet {
    /// Resolve the three handles for `name` from `src`
    pub fn new(src: &dyn StatSource, name: &str) -> Self {
        Self {
            latency: src.timer(name),
            success: src.counter(&format!("{name}.success")),
            error: src.counter(&format!("{name}.error")),
        }
    }

    /// Emit one action outcome
    pub fn record(&self, elapsed: Duration, succeeded: bool) {
        (self.latency)(elapsed);
        if succeeded {
            (self.success)(1);
        } else {
            (self.error)(1);
        }
    }
}

impl fmt::Debug for StatSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StatSet").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stat_set_records_one_counter() {
        let src = MemoryStatSource::new();
        let set = StatSet::new(&src, "scope");

        set.record(Duration::from_millis(3), true);
        set.record(Duration::from_millis(4), false);
        set.record(Duration::from_millis(5), false);

        assert_eq!(src.timer_samples("scope"), Some(3));
        assert_eq!(src.counter_value("scope.success"), Some(1));
        assert_eq!(src.counter_value("scope.error"), Some(2));
    }
}
