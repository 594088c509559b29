use async_trait::async_trait;
use std::sync::Arc;

use super::core::{FeatureCollector, ScrapeContext, parse_float};
use crate::error::{ExporterError, Result};
use crate::metrics::MetricDescription;
use crate::routeros::Sentence;

const PREFIX: &str = "bgp_session";

const PROPERTIES: [&str; 8] = [
    "name",
    "remote-as",
    "state",
    "prefix-count",
    "updates-sent",
    "updates-received",
    "withdrawn-sent",
    "withdrawn-received",
];

const LABEL_NAMES: [&str; 4] = ["name", "address", "session", "asn"];

/// BGP peer state and update counts from `/routing/bgp/peer/print`
pub struct BgpCollector {
    descriptions: Vec<(&'static str, Arc<MetricDescription>)>,
}

impl BgpCollector {
    pub fn new() -> Self {
        let gauge = |name: &str, help: &str| MetricDescription::gauge(PREFIX, name, help, &LABEL_NAMES);

        Self {
            descriptions: vec![
                ("state", gauge("state", "bgp session state (up = 1)")),
                ("prefix-count", gauge("prefix_count", "number of prefixes per session")),
                ("updates-sent", gauge("updates_sent", "number of bgp updates sent per session")),
                (
                    "updates-received",
                    gauge("updates_received", "number of bgp updates received per session"),
                ),
                ("withdrawn-sent", gauge("withdrawn_sent", "number of bgp withdrawns sent per session")),
                (
                    "withdrawn-received",
                    gauge("withdrawn_received", "number of bgp withdrawns received per session"),
                ),
            ],
        }
    }

    fn collect_for_row(&self, ctx: &ScrapeContext, row: &Sentence) {
        let labels = [row.get_or_empty("name"), row.get_or_empty("remote-as")];

        for (property, desc) in &self.descriptions {
            let value = row.get_or_empty(property);
            if value.is_empty() {
                continue;
            }

            let parsed = match *property {
                "state" => Ok(if value == "established" { 1.0 } else { 0.0 }),
                _ => parse_float(value),
            };

            match parsed {
                Ok(v) => ctx.emit(desc, v, &labels),
                Err(e) => ctx.log_parse_error(PREFIX, property, value, &e),
            }
        }
    }
}

impl Default for BgpCollector {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl FeatureCollector for BgpCollector {
    fn name(&self) -> &str {
        PREFIX
    }

    fn describe(&self, descs: &mut Vec<Arc<MetricDescription>>) {
        descs.extend(self.descriptions.iter().map(|(_, d)| Arc::clone(d)));
    }

    async fn collect(&self, ctx: &ScrapeContext) -> Result<()> {
        let rows = ctx
            .fetch("/routing/bgp/peer/print", &PROPERTIES)
            .await
            .map_err(|e| ExporterError::collection("bgp", e))?;

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
    async fn test_session_state_maps_to_up() {
        let connection = ScriptedConnection::default().with_rows(
            "/routing/bgp/peer/print",
            vec![
                vec![
                    ("name", "upstream"),
                    ("remote-as", "65001"),
                    ("state", "established"),
                    ("prefix-count", "812000"),
                ],
                vec![("name", "backup"), ("remote-as", "65002"), ("state", "active")],
            ],
        );
        let (ctx, mut rx) = context(connection);

        BgpCollector::new().collect(&ctx).await.unwrap();
        let samples = drain(&mut rx);

        assert_eq!(
            value_of(&samples, "mikrotik_bgp_session_state", &[("session", "upstream"), ("asn", "65001")]),
            Some(1.0)
        );
        assert_eq!(
            value_of(&samples, "mikrotik_bgp_session_state", &[("session", "backup")]),
            Some(0.0)
        );
        assert_eq!(
            value_of(&samples, "mikrotik_bgp_session_prefix_count", &[("session", "upstream")]),
            Some(812_000.0)
        );
    }
}
