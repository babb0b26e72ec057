//! In-process stat source
//!
//! Records timer samples and counter totals in memory. Handy for tests and
//! for inspecting a stack without a metrics backend.

use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use parking_lot::Mutex;

use super::{Counter, StatSource, Timer};

/// [`StatSource`] that keeps every emitted value in memory
#[derive(Default, Clone)]
pub struct MemoryStatSource {
    timers: Arc<DashMap<String, Arc<Mutex<Vec<Duration>>>>>,
    counters: Arc<DashMap<String, Arc<AtomicI64>>>,
}

impl MemoryStatSource {
    /// Create an empty source
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of samples recorded by timer `name`, if it was ever created
    pub fn timer_samples(&self, name: &str) -> Option<usize> {
        self.timers.get(name).map(|t| t.lock().len())
    }

    /// Samples recorded by timer `name`
    pub fn timer_values(&self, name: &str) -> Vec<Duration> {
        self.timers
            .get(name)
            .map(|t| t.lock().clone())
            .unwrap_or_default()
    }

    /// Current total of counter `name`, if it was ever created
    pub fn counter_value(&self, name: &str) -> Option<i64> {
        self.counters.get(name).map(|c| c.load(Ordering::SeqCst))
    }

    /// Names of every counter created so far, sorted
    pub fn counter_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.counters.iter().map(|e| e.key().clone()).collect();
        names.sort();
        names
    }
}

impl StatSource for MemoryStatSource {
    fn timer(&self, name: &str) -> Timer {
        let samples = Arc::clone(
            self.timers
                .entry(name.to_string())
                .or_insert_with(|| Arc::new(Mutex::new(Vec::new())))
                .value(),
        );
        Arc::new(move |d: Duration| samples.lock().push(d))
    }

    fn counter(&self, name: &str) -> Counter {
        let total = Arc::clone(
            self.counters
                .entry(name.to_string())
                .or_insert_with(|| Arc::new(AtomicI64::new(0)))
                .value(),
        );
        Arc::new(move |delta: i64| {
            total.fetch_add(delta, Ordering::SeqCst);
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_records_values() {
        let src = MemoryStatSource::new();
        let timer = src.timer("t");
        let counter = src.counter("c");

        timer(Duration::from_millis(1));
        counter(2);
        counter(3);

        assert_eq!(src.timer_samples("t"), Some(1));
        assert_eq!(src.counter_value("c"), Some(5));
        assert_eq!(src.counter_value("missing"), None);
        assert_eq!(src.counter_names(), vec!["c".to_string()]);
    }
}
