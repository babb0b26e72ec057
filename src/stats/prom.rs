//! Prometheus-backed stat source
//!
//! Timers become histograms (seconds), counters become integer counters.
//! Names are sanitized to the Prometheus charset, so `fetch-user.error`
//! is exported as `fetch_user_error`.

use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use prometheus::{Encoder, Histogram, HistogramOpts, IntCounter, Opts, Registry, TextEncoder};
use tracing::warn;

use super::{Counter, StatSource, Timer};

/// Default latency buckets, in seconds
const LATENCY_BUCKETS: &[f64] = &[0.001, 0.005, 0.01, 0.05, 0.1, 0.5, 1.0, 5.0, 10.0];

/// [`StatSource`] registering its metrics in a Prometheus [`Registry`]
pub struct PrometheusStatSource {
    registry: Registry,
    namespace: Option<String>,
    histograms: DashMap<String, Histogram>,
    counters: DashMap<String, IntCounter>,
}

impl PrometheusStatSource {
    /// Create a source with its own registry
    pub fn new() -> Self {
        Self::with_registry(Registry::new())
    }

    /// Create a source registering into `registry`
    pub fn with_registry(registry: Registry) -> Self {
        Self {
            registry,
            namespace: None,
            histograms: DashMap::new(),
            counters: DashMap::new(),
        }
    }

    /// Prefix every metric name with `namespace`
    pub fn with_namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = Some(sanitize(&namespace.into()));
        self
    }

    /// The backing registry
    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Render every registered metric in the text exposition format
    pub fn gather_text(&self) -> String {
        let mut buf = Vec::new();
        if let Err(e) = TextEncoder::new().encode(&self.registry.gather(), &mut buf) {
            warn!(error = %e, "failed to encode metrics");
        }
        String::from_utf8_lossy(&buf).into_owned()
    }

    fn opts_name(&self, name: &str) -> String {
        match &self.namespace {
            Some(ns) => format!("{ns}_{}", sanitize(name)),
            None => sanitize(name),
        }
    }

    fn histogram(&self, name: &str) -> Option<Histogram> {
        let metric = self.opts_name(name);
        if let Some(h) = self.histograms.get(&metric) {
            return Some(h.clone());
        }

        let opts = HistogramOpts::new(metric.clone(), format!("Latency of {name}"))
            .buckets(LATENCY_BUCKETS.to_vec());
        let histogram = match Histogram::with_opts(opts) {
            Ok(h) => h,
            Err(e) => {
                warn!(metric = %metric, error = %e, "invalid histogram options");
                return None;
            }
        };

        let entry = self.histograms.entry(metric.clone()).or_insert_with(|| {
            if let Err(e) = self.registry.register(Box::new(histogram.clone())) {
                warn!(metric = %metric, error = %e, "failed to register histogram");
            }
            histogram
        });
        Some(entry.clone())
    }

    fn int_counter(&self, name: &str) -> Option<IntCounter> {
        let metric = self.opts_name(name);
        if let Some(c) = self.counters.get(&metric) {
            return Some(c.clone());
        }

        let counter = match IntCounter::with_opts(Opts::new(metric.clone(), format!("Count of {name}"))) {
            Ok(c) => c,
            Err(e) => {
                warn!(metric = %metric, error = %e, "invalid counter options");
                return None;
            }
        };

        let entry = self.counters.entry(metric.clone()).or_insert_with(|| {
            if let Err(e) = self.registry.register(Box::new(counter.clone())) {
                warn!(metric = %metric, error = %e, "failed to register counter");
            }
            counter
        });
        Some(entry.clone())
    }
}

impl Default for PrometheusStatSource {
    fn default() -> Self {
        Self::new()
    }
}

impl StatSource for PrometheusStatSource {
    fn timer(&self, name: &str) -> Timer {
        match self.histogram(name) {
            Some(histogram) => Arc::new(move |d: Duration| histogram.observe(d.as_secs_f64())),
            None => Arc::new(|_: Duration| {}),
        }
    }

    fn counter(&self, name: &str) -> Counter {
        match self.int_counter(name) {
            Some(counter) => Arc::new(move |delta: i64| match u64::try_from(delta) {
                Ok(delta) => counter.inc_by(delta),
                Err(_) => warn!(delta, "prometheus counters cannot decrease"),
            }),
            None => Arc::new(|_: i64| {}),
        }
    }
}

/// Map `name` onto `[a-zA-Z_:][a-zA-Z0-9_:]*`.
fn sanitize(name: &str) -> String {
    let mut out: String = name
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '_' || c == ':' { c } else { '_' })
        .collect();
    if out.is_empty() || out.starts_with(|c: char| c.is_ascii_digit()) {
        out.insert(0, '_');
    }
    out
}
