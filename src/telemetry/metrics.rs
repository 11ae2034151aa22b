use std::{fmt::Debug, sync::Arc, time::Duration};

/// Implementors receive every metric recorded through a [MetricsScope]. Backends (OTel,
/// Prometheus, a lang-side bridge) are expected to provide their own implementation.
pub trait CoreMeter: Send + Sync + Debug {
    /// Add `value` to the counter named `name`
    fn counter_add(&self, name: &str, value: u64, attributes: &[MetricKeyValue]);
    /// Record one observation of a duration histogram
    fn histogram_duration_record(&self, name: &str, value: Duration, attributes: &[MetricKeyValue]);
    /// Set the gauge named `name`
    fn gauge_record(&self, name: &str, value: u64, attributes: &[MetricKeyValue]);
}

/// A K/V pair that can be used to label a specific recording of a metric
#[derive(Clone, Debug, PartialEq)]
pub struct MetricKeyValue {
    #[allow(missing_docs)]
    pub key: String,
    #[allow(missing_docs)]
    pub value: MetricValue,
}
impl MetricKeyValue {
    /// Create a new key value pair
    pub fn new(key: impl Into<String>, value: impl Into<MetricValue>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
        }
    }
}

/// Values metric labels may assume
#[derive(Clone, Debug, PartialEq, derive_more::From)]
#[allow(missing_docs)]
pub enum MetricValue {
    String(String),
    Int(i64),
    Float(f64),
    Bool(bool),
}
impl From<&'static str> for MetricValue {
    fn from(value: &'static str) -> Self {
        MetricValue::String(value.to_string())
    }
}

/// Handle activity code uses to emit metrics. Carries a set of default attributes attached to
/// everything recorded through it. Cloning is cheap.
#[derive(Clone, Debug)]
pub struct MetricsScope {
    meter: Arc<dyn CoreMeter>,
    kvs: Arc<Vec<MetricKeyValue>>,
}

impl MetricsScope {
    /// Create a scope over `meter` with no default attributes
    pub fn new(meter: Arc<dyn CoreMeter>) -> Self {
        Self {
            meter,
            kvs: Default::default(),
        }
    }

    /// A scope which drops everything recorded through it
    pub fn no_op() -> Self {
        Self::new(Arc::new(NoOpCoreMeter))
    }

    /// Extend an existing scope with new attributes
    pub fn with_new_attrs(&self, new_kvs: impl IntoIterator<Item = MetricKeyValue>) -> Self {
        let mut kvs = self.kvs.clone();
        Arc::make_mut(&mut kvs).extend(new_kvs);
        Self {
            meter: self.meter.clone(),
            kvs,
        }
    }

    /// The attributes attached to every recording
    pub fn attributes(&self) -> &[MetricKeyValue] {
        &self.kvs
    }

    /// Add `value` to a counter
    pub fn counter_add(&self, name: &str, value: u64) {
        self.meter.counter_add(name, value, &self.kvs);
    }

    /// Record a duration in a histogram
    pub fn record_duration(&self, name: &str, value: Duration) {
        self.meter.histogram_duration_record(name, value, &self.kvs);
    }

    /// Set a gauge
    pub fn gauge_record(&self, name: &str, value: u64) {
        self.meter.gauge_record(name, value, &self.kvs);
    }
}

impl Default for MetricsScope {
    fn default() -> Self {
        Self::no_op()
    }
}

/// A meter which drops everything
#[derive(Debug)]
pub struct NoOpCoreMeter;
impl CoreMeter for NoOpCoreMeter {
    fn counter_add(&self, _: &str, _: u64, _: &[MetricKeyValue]) {}
    fn histogram_duration_record(&self, _: &str, _: Duration, _: &[MetricKeyValue]) {}
    fn gauge_record(&self, _: &str, _: u64, _: &[MetricKeyValue]) {}
}


#[cfg(test)]
mod tests {
    use super::{test_help::RecordingMeter, *};

    #[test]
    fn new_attrs_do_not_leak_into_parent() {
        let meter = Arc::new(RecordingMeter::default());
        let base = MetricsScope::new(meter.clone())
            .with_new_attrs([MetricKeyValue::new("namespace", "default")]);
        let child = base.with_new_attrs([MetricKeyValue::new("activity_type", "charge")]);
        base.counter_add("requests", 1);
        child.counter_add("requests", 2);

        let counters = meter.counters.lock();
        assert_eq!(counters[0].2.len(), 1);
        assert_eq!(counters[1].2.len(), 2);
        assert_eq!(
            counters[1].2[1],
            MetricKeyValue::new("activity_type", "charge")
        );
    }

    #[test]
    fn no_op_scope_accepts_everything() {
        let scope = MetricsScope::default();
        scope.counter_add("c", 1);
        scope.record_duration("d", Duration::from_millis(5));
        scope.gauge_record("g", 3);
        assert!(scope.attributes().is_empty());
    }
}
