//! Renders one scrape's samples in the Prometheus text exposition format
use log::{error, warn};
use prometheus::{CounterVec, GaugeVec, Opts, Registry, TextEncoder};
use std::collections::HashMap;
use tokio::sync::mpsc;

use crate::error::{ExporterError, Result};
use crate::metrics::{MetricDescription, MetricSink, Sample, ValueType};
use crate::scrape::Scraper;

enum Family {
    Gauge(GaugeVec),
    Counter(CounterVec),
}

/// Accumulates samples into a fresh registry, one family per metric name
pub struct SampleEncoder {
    registry: Registry,
    families: HashMap<String, Family>,
}

impl SampleEncoder {
    pub fn new() -> Self {
        Self {
            registry: Registry::new(),
            families: HashMap::new(),
        }
    }

    fn family(&mut self, desc: &MetricDescription) -> Result<&Family> {
        if !self.families.contains_key(desc.fq_name()) {
            let opts = Opts::new(desc.fq_name(), desc.help());
            let labels: Vec<&str> = desc.label_names().iter().map(String::as_str).collect();

            let family = match desc.value_type() {
                ValueType::Gauge => {
                    let vec = GaugeVec::new(opts, &labels)?;
                    self.registry.register(Box::new(vec.clone()))?;
                    Family::Gauge(vec)
                }
                ValueType::Counter => {
                    let vec = CounterVec::new(opts, &labels)?;
                    self.registry.register(Box::new(vec.clone()))?;
                    Family::Counter(vec)
                }
            };
            self.families.insert(desc.fq_name().to_string(), family);
        }

        self.families
            .get(desc.fq_name())
            .ok_or_else(|| ExporterError::Encode(format!("missing family {}", desc.fq_name())))
    }

    /// Record one sample; samples that do not fit their family are logged and dropped
    pub fn observe(&mut self, sample: &Sample) {
        let desc = sample.desc();
        let labels: Vec<&str> = sample.label_values().iter().map(String::as_str).collect();

        let family = match self.family(desc) {
            Ok(family) => family,
            Err(e) => {
                error!("Dropping sample metric={} error={}", desc.fq_name(), e);
                return;
            }
        };

        let recorded = match family {
            Family::Gauge(vec) => vec
                .get_metric_with_label_values(&labels)
                .map(|gauge| gauge.set(sample.value())),
            Family::Counter(vec) => {
                if !(sample.value() >= 0.0) {
                    warn!(
                        "Dropping negative counter sample metric={} value={}",
                        desc.fq_name(),
                        sample.value()
                    );
                    return;
                }
                vec.get_metric_with_label_values(&labels)
                    .map(|counter| counter.inc_by(sample.value()))
            }
        };

        if let Err(e) = recorded {
            error!("Dropping sample metric={} error={}", desc.fq_name(), e);
        }
    }

    /// Render everything observed so far
    pub fn finish(self) -> Result<String> {
        TextEncoder::new()
            .encode_to_string(&self.registry.gather())
            .map_err(Into::into)
    }
}

impl Default for SampleEncoder {
    fn default() -> Self {
        Self::new()
    }
}

async fn encode_stream(mut rx: mpsc::UnboundedReceiver<Sample>) -> SampleEncoder {
    let mut encoder = SampleEncoder::new();
    while let Some(sample) = rx.recv().await {
        encoder.observe(&sample);
    }
    encoder
}

/// Run one scrape and render its samples while they arrive
pub async fn gather(scraper: &Scraper) -> Result<String> {
    let (sink, rx) = MetricSink::channel();
    let ((), encoder) = tokio::join!(scraper.scrape(sink), encode_stream(rx));
    encoder.finish()
}
