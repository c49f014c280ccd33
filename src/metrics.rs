//! Counters recorded by the built-in middleware.
//!
//! The app holds one [`MetricsSink`] handed to it at construction time and
//! threads it to every request through [`Context`](crate::Context). There is
//! no process-wide registry: two apps in the same process (or two tests) never
//! see each other's counts.
//!
//! - [`InMemoryMetrics`] keeps counts in the process and can report them.
//! - [`RecorderMetrics`] forwards to the [`metrics`] facade so any installed
//!   exporter (Prometheus, StatsD, ...) picks them up.

use std::collections::{BTreeMap, HashMap};
use std::sync::{Mutex, PoisonError};

/// Incremented once per request that reaches a route.
pub const REQUESTS: &str = "requests";
/// Incremented once per request whose handler chain returned an error.
pub const ERRORS: &str = "errors";
/// Incremented once per recovered handler panic.
pub const PANICS: &str = "panics";

/// Where counters go.
pub trait MetricsSink: Send + Sync + 'static {
    /// Adds one to the counter called `name`.
    fn increment(&self, name: &'static str);
}

/// Counters held in memory.
#[derive(Debug, Default)]
pub struct InMemoryMetrics {
    counters: Mutex<HashMap<&'static str, u64>>,
}

impl InMemoryMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current value of `name`; zero if it was never incremented.
    pub fn get(&self, name: &str) -> u64 {
        self.counters
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(name)
            .copied()
            .unwrap_or(0)
    }

    /// Every counter, sorted by name. Serializes as a JSON object.
    pub fn snapshot(&self) -> BTreeMap<&'static str, u64> {
        self.counters
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .map(|(k, v)| (*k, *v))
            .collect()
    }
}

impl MetricsSink for InMemoryMetrics {
    fn increment(&self, name: &'static str) {
        *self
            .counters
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .entry(name)
            .or_insert(0) += 1;
    }
}

/// Forwards every increment to the global [`metrics`] recorder.
///
/// Counter names are prefixed, so with the default `app_` prefix the
/// built-ins show up as `app_requests`, `app_errors` and `app_panics`.
#[derive(Clone, Debug)]
pub struct RecorderMetrics {
    prefix: String,
}

impl RecorderMetrics {
    pub fn new(prefix: impl Into<String>) -> Self {
        Self { prefix: prefix.into() }
    }
}

impl Default for RecorderMetrics {
    fn default() -> Self {
        Self::new("app_")
    }
}

impl MetricsSink for RecorderMetrics {
    fn increment(&self, name: &'static str) {
        ::metrics::counter!(format!("{}{name}", self.prefix)).increment(1);
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicU64, Ordering};
    use std::sync::{Arc, Mutex};

    use ::metrics::{Counter, Gauge, Histogram, Key, KeyName, Metadata, Recorder, SharedString, Unit};

    use super::*;

    #[test]
    fn counts_per_name() {
        let m = InMemoryMetrics::new();
        m.increment(REQUESTS);
        m.increment(REQUESTS);
        m.increment(ERRORS);

        assert_eq!(m.get(REQUESTS), 2);
        assert_eq!(m.get(ERRORS), 1);
        assert_eq!(m.get(PANICS), 0);
    }

    #[test]
    fn snapshot_is_sorted() {
        let m = InMemoryMetrics::new();
        m.increment(REQUESTS);
        m.increment(PANICS);
        m.increment(ERRORS);

        let keys: Vec<_> = m.snapshot().into_keys().collect();
        assert_eq!(keys, vec![ERRORS, PANICS, REQUESTS]);
        assert_eq!(serde_json::to_string(&m.snapshot()).unwrap(), r#"{"errors":1,"panics":1,"requests":1}"#);
    }

    #[test]
    fn recorder_without_exporter_is_a_no_op() {
        RecorderMetrics::default().increment(REQUESTS);
    }

    /// Keeps one atomic per counter name.
    #[derive(Default)]
    struct CountingRecorder {
        counters: Mutex<HashMap<String, Arc<AtomicU64>>>,
    }

    impl CountingRecorder {
        fn get(&self, name: &str) -> u64 {
            self.counters
                .lock()
                .unwrap()
                .get(name)
                .map_or(0, |c| c.load(Ordering::Relaxed))
        }
    }

    impl Recorder for CountingRecorder {
        fn describe_counter(&self, _: KeyName, _: Option<Unit>, _: SharedString) {}
        fn describe_gauge(&self, _: KeyName, _: Option<Unit>, _: SharedString) {}
        fn describe_histogram(&self, _: KeyName, _: Option<Unit>, _: SharedString) {}

        fn register_counter(&self, key: &Key, _: &Metadata<'_>) -> Counter {
            let counter = Arc::clone(self.counters.lock().unwrap().entry(key.name().to_owned()).or_default());
            Counter::from_arc(counter)
        }

        fn register_gauge(&self, _: &Key, _: &Metadata<'_>) -> Gauge {
            Gauge::noop()
        }

        fn register_histogram(&self, _: &Key, _: &Metadata<'_>) -> Histogram {
            Histogram::noop()
        }
    }

    #[test]
    fn recorder_forwards_prefixed_counters() {
        let recorder = CountingRecorder::default();

        ::metrics::with_local_recorder(&recorder, || {
            let sink = RecorderMetrics::default();
            sink.increment(REQUESTS);
            sink.increment(REQUESTS);
            sink.increment(PANICS);
            RecorderMetrics::new("beers_").increment(ERRORS);
        });

        assert_eq!(recorder.get("app_requests"), 2);
        assert_eq!(recorder.get("app_panics"), 1);
        assert_eq!(recorder.get("beers_errors"), 1);
        assert_eq!(recorder.get("app_errors"), 0);
    }
}
