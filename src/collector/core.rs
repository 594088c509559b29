//! Core collector trait and the per-device scrape context
use async_trait::async_trait;
use log::error;
use std::sync::Arc;

use crate::connection::Connection;
use crate::error::{ExporterError, Result};
use crate::metrics::{MetricDescription, MetricSink};
use crate::routeros::{Reply, Sentence};

/// Label names every feature metric starts with
pub const DEVICE_LABELS: [&str; 2] = ["name", "address"];

/// One metric family collected from a device.
///
/// Implementations are stateless and shared by every device they apply to.
#[async_trait]
pub trait FeatureCollector: Send + Sync + 'static {
    /// Stable identifier, used as the `collector` label and in logs
    fn name(&self) -> &str;

    /// Push the descriptions of every metric this collector may emit
    fn describe(&self, descs: &mut Vec<Arc<MetricDescription>>);

    /// Run one collection pass against the context's device.
    ///
    /// Unparseable fields are logged and skipped. A failed request aborts the
    /// pass; samples already sent stay sent.
    async fn collect(&self, ctx: &ScrapeContext) -> Result<()>;
}

/// Everything a collector needs for one device during one scrape
pub struct ScrapeContext {
    connection: Arc<dyn Connection>,
    device_name: String,
    device_address: String,
    sink: MetricSink,
}

impl ScrapeContext {
    pub fn new(
        connection: Arc<dyn Connection>,
        device_name: impl Into<String>,
        device_address: impl Into<String>,
        sink: MetricSink,
    ) -> Self {
        Self {
            connection,
            device_name: device_name.into(),
            device_address: device_address.into(),
            sink,
        }
    }

    pub fn device_name(&self) -> &str {
        &self.device_name
    }

    pub fn device_address(&self) -> &str {
        &self.device_address
    }

    pub fn sink(&self) -> &MetricSink {
        &self.sink
    }

    /// Run a raw API command on the device
    pub async fn run(&self, words: &[String]) -> Result<Reply> {
        self.connection.run(words).await
    }

    /// Print `command` restricted to `properties` and return the data rows
    pub async fn fetch(&self, command: &str, properties: &[&str]) -> Result<Vec<Sentence>> {
        let words = [
            command.to_string(),
            format!("=.proplist={}", properties.join(",")),
        ];
        Ok(self.run(&words).await?.re)
    }

    /// Run `command` with `queries` as a `=count-only=` request and return the
    /// count the device reports, if any
    pub async fn count(&self, command: &str, queries: &[String]) -> Result<Option<String>> {
        let mut words = Vec::with_capacity(queries.len() + 2);
        words.push(command.to_string());
        words.extend(queries.iter().cloned());
        words.push("=count-only=".to_string());

        let reply = self.run(&words).await?;
        Ok(reply
            .done
            .get("ret")
            .filter(|ret| !ret.is_empty())
            .map(str::to_string))
    }

    /// Emit a sample labelled with this device's name and address followed by `labels`
    pub fn emit(&self, desc: &Arc<MetricDescription>, value: f64, labels: &[&str]) {
        let mut label_values = Vec::with_capacity(DEVICE_LABELS.len() + labels.len());
        label_values.push(self.device_name.clone());
        label_values.push(self.device_address.clone());
        label_values.extend(labels.iter().map(|l| l.to_string()));

        self.sink.emit(desc, value, label_values);
    }

    /// Log a field that could not be parsed; the caller skips it
    pub fn log_parse_error(&self, collector: &str, property: &str, value: &str, err: &ExporterError) {
        error!(
            "Failed to parse metric value collector={} device={} property={} value={:?} error={}",
            collector, self.device_name, property, value, err
        );
    }
}

/// Parse a plain numeric property value
pub fn parse_float(value: &str) -> Result<f64> {
    value
        .parse::<f64>()
        .map_err(|e| ExporterError::Parse(format!("invalid number {:?}: {}", value, e)))
}

#[cfg(test)]
pub(crate) mod testing {
    //! Fakes shared by collector tests
    use super::*;
    use crate::metrics::Sample;
    use std::collections::HashMap;
    use std::sync::Mutex;
    use tokio::sync::mpsc;

    /// Answers commands from a fixed table keyed by the command word
    #[derive(Default)]
    pub struct ScriptedConnection {
        replies: HashMap<String, Vec<Vec<(&'static str, &'static str)>>>,
        counts: HashMap<String, &'static str>,
        pub requests: Mutex<Vec<Vec<String>>>,
    }

    impl ScriptedConnection {
        pub fn with_rows(mut self, command: &str, rows: Vec<Vec<(&'static str, &'static str)>>) -> Self {
            self.replies.insert(command.to_string(), rows);
            self
        }

        /// Answer the exact request `words` with `ret` in its `!done` sentence
        pub fn with_count(mut self, words: &[&str], ret: &'static str) -> Self {
            self.counts.insert(words.join(" "), ret);
            self
        }
    }

    #[async_trait]
    impl Connection for ScriptedConnection {
        async fn run(&self, words: &[String]) -> Result<Reply> {
            self.requests.lock().unwrap().push(words.to_vec());
            if let Some(ret) = self.counts.get(&words.join(" ")) {
                return Ok(Reply {
                    re: Vec::new(),
                    done: Sentence {
                        word: "!done".to_string(),
                        tag: None,
                        attributes: vec![("ret".to_string(), ret.to_string())],
                    },
                });
            }

            let rows = self
                .replies
                .get(&words[0])
                .ok_or_else(|| ExporterError::Trap("no such command".to_string()))?;

            Ok(Reply {
                re: rows
                    .iter()
                    .map(|row| Sentence {
                        word: "!re".to_string(),
                        tag: None,
                        attributes: row
                            .iter()
                            .map(|(k, v)| (k.to_string(), v.to_string()))
                            .collect(),
                    })
                    .collect(),
                done: Sentence::default(),
            })
        }

        async fn close(&self) {}
    }

    /// A context for device `r1` at `10.0.0.1` plus the sink's receiver
    pub fn context(connection: ScriptedConnection) -> (ScrapeContext, mpsc::UnboundedReceiver<Sample>) {
        let (sink, rx) = MetricSink::channel();
        (ScrapeContext::new(Arc::new(connection), "r1", "10.0.0.1", sink), rx)
    }

    pub fn drain(rx: &mut mpsc::UnboundedReceiver<Sample>) -> Vec<Sample> {
        let mut samples = Vec::new();
        while let Ok(sample) = rx.try_recv() {
            samples.push(sample);
        }
        samples
    }

    /// Find the value of the sample with `fq_name` whose labels include every pair in `labels`
    pub fn value_of(samples: &[Sample], fq_name: &str, labels: &[(&str, &str)]) -> Option<f64> {
        samples
            .iter()
            .find(|s| {
                s.desc().fq_name() == fq_name
                    && labels.iter().all(|(k, v)| s.label(k) == Some(*v))
            })
            .map(|s| s.value())
    }
}
