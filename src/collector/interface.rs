use async_trait::async_trait;
use std::sync::Arc;

use super::core::{FeatureCollector, ScrapeContext, parse_float};
use crate::error::{ExporterError, Result};
use crate::metrics::MetricDescription;
use crate::routeros::Sentence;

const PREFIX: &str = "interface";

const PROPERTIES: [&str; 16] = [
    "name", "type", "disabled", "comment", "running", "slave", "actual-mtu", "rx-byte", "tx-byte",
    "rx-packet", "tx-packet", "rx-error", "tx-error", "rx-drop", "tx-drop", "link-downs",
];

const LABEL_NAMES: [&str; 8] = [
    "name", "address", "interface", "type", "disabled", "comment", "running", "slave",
];

/// Per-interface traffic counters from `/interface/print`
pub struct InterfaceCollector {
    descriptions: Vec<(&'static str, Arc<MetricDescription>)>,
}

impl InterfaceCollector {
    pub fn new() -> Self {
        let gauge = |name: &str, help: &str| MetricDescription::gauge(PREFIX, name, help, &LABEL_NAMES);
        let counter = |name: &str, help: &str| MetricDescription::counter(PREFIX, name, help, &LABEL_NAMES);

        Self {
            descriptions: vec![
                ("actual-mtu", gauge("actual_mtu", "actual mtu of interface")),
                ("rx-byte", counter("rx_byte", "number of rx bytes on interface")),
                ("tx-byte", counter("tx_byte", "number of tx bytes on interface")),
                ("rx-packet", counter("rx_packet", "number of rx packets on interface")),
                ("tx-packet", counter("tx_packet", "number of tx packets on interface")),
                ("rx-error", counter("rx_error", "number of rx errors on interface")),
                ("tx-error", counter("tx_error", "number of tx errors on interface")),
                ("rx-drop", counter("rx_drop", "number of dropped rx packets on interface")),
                ("tx-drop", counter("tx_drop", "number of dropped tx packets on interface")),
                (
                    "link-downs",
                    counter("link_downs", "number of times link has gone down on interface"),
                ),
            ],
        }
    }

    fn collect_for_row(&self, ctx: &ScrapeContext, row: &Sentence) {
        let labels = [
            row.get_or_empty("name"),
            row.get_or_empty("type"),
            row.get_or_empty("disabled"),
            row.get_or_empty("comment"),
            row.get_or_empty("running"),
            row.get_or_empty("slave"),
        ];

        for (property, desc) in &self.descriptions {
            let value = row.get_or_empty(property);
            if value.is_empty() {
                continue;
            }

            match parse_float(value) {
                Ok(v) => ctx.emit(desc, v, &labels),
                Err(e) => ctx.log_parse_error(PREFIX, property, value, &e),
            }
        }
    }
}

impl Default for InterfaceCollector {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl FeatureCollector for InterfaceCollector {
    fn name(&self) -> &str {
        PREFIX
    }

    fn describe(&self, descs: &mut Vec<Arc<MetricDescription>>) {
        descs.extend(self.descriptions.iter().map(|(_, d)| Arc::clone(d)));
    }

    async fn collect(&self, ctx: &ScrapeContext) -> Result<()> {
        let rows = ctx
            .fetch("/interface/print", &PROPERTIES)
            .await
            .map_err(|e| ExporterError::collection(PREFIX, e))?;

        for row in &rows {
            self.collect_for_row(ctx, row);
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collector::core::testing::*;

    #[tokio::test]
    async fn test_collects_counters_and_skips_bad_field() {
        let connection = ScriptedConnection::default().with_rows(
            "/interface/print",
            vec![
                vec![
                    ("name", "ether1"),
                    ("type", "ether"),
                    ("running", "true"),
                    ("actual-mtu", "1500"),
                    ("rx-byte", "1024"),
                    ("tx-byte", "garbage"),
                ],
                vec![("name", "bridge"), ("type", "bridge"), ("link-downs", "3")],
            ],
        );
        let (ctx, mut rx) = context(connection);

        InterfaceCollector::new().collect(&ctx).await.unwrap();
        let samples = drain(&mut rx);

        assert_eq!(samples.len(), 3);
        assert_eq!(
            value_of(&samples, "mikrotik_interface_rx_byte", &[("interface", "ether1"), ("type", "ether")]),
            Some(1024.0)
        );
        assert_eq!(
            value_of(&samples, "mikrotik_interface_actual_mtu", &[("running", "true")]),
            Some(1500.0)
        );
        assert_eq!(
            value_of(&samples, "mikrotik_interface_link_downs", &[("interface", "bridge")]),
            Some(3.0)
        );
        assert_eq!(value_of(&samples, "mikrotik_interface_tx_byte", &[]), None);
    }

    #[tokio::test]
    async fn test_fetch_failure_is_reported() {
        let (ctx, mut rx) = context(ScriptedConnection::default());

        let err = InterfaceCollector::new().collect(&ctx).await.unwrap_err();
        assert!(matches!(err, ExporterError::Collection(_)));
        assert!(drain(&mut rx).is_empty());
    }

    #[test]
    fn test_describe_is_idempotent() {
        let collector = InterfaceCollector::new();
        let mut first = Vec::new();
        let mut second = Vec::new();
        collector.describe(&mut first);
        collector.describe(&mut second);

        assert_eq!(first.len(), 10);
        assert_eq!(first, second);
        assert!(first.iter().all(|d| d.label_names().len() == LABEL_NAMES.len()));
    }
}
