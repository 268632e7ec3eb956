//! # Recorder
//!
//! [metrics::Recorder] installed by [Builder::init](super::Builder::init), turning every
//! `counter!` / `gauge!` update into a line written by the [Emitter]

use super::emitter::Emitter;
use super::line::{MetricType, MetricValue};
use metrics::SharedString;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};
use tracing::error;

/// Resolved name and tags of a registered metric
struct MetricHandle {
    emitter: Arc<Emitter>,
    name: String,
    tags: Vec<String>,
}

impl MetricHandle {
    fn new(emitter: Arc<Emitter>, key: &metrics::Key) -> Self {
        Self {
            emitter,
            name: key.name().to_string(),
            tags: key
                .labels()
                .map(|label| format!("{}:{}", label.key(), label.value()))
                .collect(),
        }
    }

    fn emit(&self, kind: MetricType, value: MetricValue) {
        if let Err(err) = self.emitter.emit(kind, &self.name, value, &self.tags) {
            error!("Failed to write {kind} {}: {err}", self.name);
        }
    }
}

/// Counters carry no state, every increment is written as its own delta
struct CounterHandle(MetricHandle);

impl metrics::CounterFn for CounterHandle {
    fn increment(&self, value: u64) {
        self.0.emit(MetricType::Count, value.into());
    }

    fn absolute(&self, _value: u64) {
        error!("Unable to set counter {} to an absolute value, only deltas can be emitted", self.0.name);
    }
}

/// Gauges remember the last value so increment/decrement can emit the new reading
struct GaugeHandle {
    metric: MetricHandle,
    value: Mutex<f64>,
}

impl GaugeHandle {
    /// Emits while holding the lock, so lines come out in the order updates were applied
    fn update(&self, f: impl FnOnce(f64) -> f64) {
        let mut value = self.value.lock().unwrap_or_else(PoisonError::into_inner);
        *value = f(*value);
        self.metric.emit(MetricType::Gauge, (*value).into());
    }
}

impl metrics::GaugeFn for GaugeHandle {
    fn increment(&self, value: f64) {
        self.update(|current| current + value);
    }

    fn decrement(&self, value: f64) {
        self.update(|current| current - value);
    }

    fn set(&self, value: f64) {
        self.update(|_| value);
    }
}

/// [metrics::Recorder] writing through an [Emitter]
///
/// # Example
/// ```
/// let metrics = lambda_dd_metrics::Builder::new()
///      .service_prefix("MyApplication")
///      .stats_group("api")
///      .init()
///      .unwrap();
///
/// // MONITORING|<now>|1|count|MyApplication.api.requests|#method:get
/// metrics::counter!("requests", "method" => "get").increment(1);
/// ```
pub struct Recorder {
    emitter: Arc<Emitter>,
    /// Gauges by key, so a re-registered gauge continues from its last value
    #[allow(clippy::mutable_key_type)] // metrics::Key has interior mutability
    gauges: Mutex<HashMap<metrics::Key, Arc<GaugeHandle>>>,
}

impl From<Arc<Emitter>> for Recorder {
    fn from(emitter: Arc<Emitter>) -> Self {
        Self {
            emitter,
            gauges: Mutex::new(HashMap::new()),
        }
    }
}

impl metrics::Recorder for Recorder {
    // Units and descriptions have no field in the line format
    fn describe_counter(&self, _key: metrics::KeyName, _unit: Option<metrics::Unit>, _description: SharedString) {}

    fn describe_gauge(&self, _key: metrics::KeyName, _unit: Option<metrics::Unit>, _description: SharedString) {}

    fn describe_histogram(&self, _key: metrics::KeyName, _unit: Option<metrics::Unit>, _description: SharedString) {}

    fn register_counter(&self, key: &metrics::Key, _metadata: &metrics::Metadata<'_>) -> metrics::Counter {
        metrics::Counter::from_arc(Arc::new(CounterHandle(MetricHandle::new(self.emitter.clone(), key))))
    }

    #[allow(clippy::mutable_key_type)] // metrics::Key has interior mutability
    fn register_gauge(&self, key: &metrics::Key, _metadata: &metrics::Metadata<'_>) -> metrics::Gauge {
        let mut gauges = self.gauges.lock().unwrap_or_else(PoisonError::into_inner);

        let gauge = gauges.entry(key.clone()).or_insert_with(|| {
            Arc::new(GaugeHandle {
                metric: MetricHandle::new(self.emitter.clone(), key),
                value: Mutex::new(0.0),
            })
        });

        metrics::Gauge::from_arc(gauge.clone())
    }

    fn register_histogram(&self, key: &metrics::Key, _metadata: &metrics::Metadata<'_>) -> metrics::Histogram {
        error!("Unable to register histogram {key}, the DataDog Lambda integration only accepts counts and gauges");
        metrics::Histogram::noop()
    }
}
