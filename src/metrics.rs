//! Metric descriptions, samples and the sink every scrape writes into
use log::trace;
use std::sync::Arc;
use tokio::sync::mpsc;

/// Namespace prefixed to every exported metric name
pub const NAMESPACE: &str = "mikrotik";

/// How the encoder should expose a metric
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueType {
    Gauge,
    Counter,
}

/// Static schema of a metric family
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MetricDescription {
    fq_name: String,
    help: String,
    label_names: Vec<String>,
    value_type: ValueType,
}

impl MetricDescription {
    /// Create a description named `mikrotik_<subsystem>_<name>`
    pub fn new(
        subsystem: &str,
        name: &str,
        help: impl Into<String>,
        label_names: &[&str],
        value_type: ValueType,
    ) -> Arc<Self> {
        Arc::new(Self {
            fq_name: build_fq_name(NAMESPACE, subsystem, name),
            help: help.into(),
            label_names: label_names.iter().map(|l| l.to_string()).collect(),
            value_type,
        })
    }

    /// Shorthand for a gauge description
    pub fn gauge(subsystem: &str, name: &str, help: &str, label_names: &[&str]) -> Arc<Self> {
        Self::new(subsystem, name, help, label_names, ValueType::Gauge)
    }

    /// Shorthand for a counter description
    pub fn counter(subsystem: &str, name: &str, help: &str, label_names: &[&str]) -> Arc<Self> {
        Self::new(subsystem, name, help, label_names, ValueType::Counter)
    }

    pub fn fq_name(&self) -> &str {
        &self.fq_name
    }

    pub fn help(&self) -> &str {
        &self.help
    }

    pub fn label_names(&self) -> &[String] {
        &self.label_names
    }

    pub fn value_type(&self) -> ValueType {
        self.value_type
    }
}

/// Join the non-empty name parts with underscores
pub fn build_fq_name(namespace: &str, subsystem: &str, name: &str) -> String {
    [namespace, subsystem, name]
        .iter()
        .filter(|part| !part.is_empty())
        .copied()
        .collect::<Vec<_>>()
        .join("_")
}

/// A single metric value with its label values
#[derive(Debug, Clone)]
pub struct Sample {
    desc: Arc<MetricDescription>,
    value: f64,
    label_values: Vec<String>,
}

impl Sample {
    /// Create a sample; label values follow the order of the description's label names
    pub fn new(desc: Arc<MetricDescription>, value: f64, label_values: Vec<String>) -> Self {
        Self {
            desc,
            value,
            label_values,
        }
    }

    pub fn desc(&self) -> &Arc<MetricDescription> {
        &self.desc
    }

    pub fn value(&self) -> f64 {
        self.value
    }

    pub fn label_values(&self) -> &[String] {
        &self.label_values
    }

    /// Look up a label value by label name
    pub fn label(&self, name: &str) -> Option<&str> {
        self.desc
            .label_names
            .iter()
            .position(|l| l == name)
            .and_then(|i| self.label_values.get(i))
            .map(String::as_str)
    }
}

/// The shared destination for every sample produced during a scrape.
///
/// Cloning is cheap and every clone feeds the same receiver. Sending never
/// blocks; samples sent after the receiver is gone are discarded.
#[derive(Debug, Clone)]
pub struct MetricSink {
    tx: mpsc::UnboundedSender<Sample>,
}

impl MetricSink {
    /// Create a sink and the receiver the encoder drains
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<Sample>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    /// Forward a sample to the consumer
    pub fn send(&self, sample: Sample) {
        if self.tx.send(sample).is_err() {
            trace!("Metric receiver dropped, discarding sample");
        }
    }

    /// Build and forward a sample in one step
    pub fn emit(&self, desc: &Arc<MetricDescription>, value: f64, label_values: Vec<String>) {
        self.send(Sample::new(Arc::clone(desc), value, label_values));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fq_name_skips_empty_parts() {
        assert_eq!(build_fq_name("mikrotik", "system", "uptime"), "mikrotik_system_uptime");
        assert_eq!(build_fq_name("mikrotik", "", "up"), "mikrotik_up");
    }

    #[test]
    fn test_sample_label_lookup() {
        let desc = MetricDescription::gauge("health", "voltage", "input voltage", &["name", "address"]);
        let sample = Sample::new(desc, 24.1, vec!["r1".to_string(), "10.0.0.1".to_string()]);

        assert_eq!(sample.label("address"), Some("10.0.0.1"));
        assert_eq!(sample.label("interface"), None);
        assert_eq!(sample.desc().fq_name(), "mikrotik_health_voltage");
    }

    #[tokio::test]
    async fn test_sink_delivers_and_tolerates_closed_receiver() {
        let (sink, mut rx) = MetricSink::channel();
        let desc = MetricDescription::counter("interface", "rx_byte", "rx bytes", &["name"]);

        sink.emit(&desc, 1.0, vec!["r1".to_string()]);
        let sample = rx.recv().await.unwrap();
        assert_eq!(sample.value(), 1.0);

        drop(rx);
        // must not panic
        sink.emit(&desc, 2.0, vec!["r1".to_string()]);
    }
}
