use async_trait::async_trait;
use std::sync::Arc;

use super::core::{DEVICE_LABELS, FeatureCollector, ScrapeContext, parse_float};
use crate::error::{ExporterError, Result};
use crate::metrics::MetricDescription;

const PREFIX: &str = "conntrack";

const PROPERTIES: [&str; 2] = ["total-entries", "max-entries"];

/// Connection tracking table usage from `/ip/firewall/connection/tracking/print`
pub struct ConntrackCollector {
    descriptions: Vec<(&'static str, Arc<MetricDescription>)>,
}

impl ConntrackCollector {
    pub fn new() -> Self {
        let gauge = |name: &str, help: &str| MetricDescription::gauge(PREFIX, name, help, &DEVICE_LABELS);

        Self {
            descriptions: vec![
                ("total-entries", gauge("entries", "number of tracked connections")),
                ("max-entries", gauge("max_entries", "conntrack table capacity")),
            ],
        }
    }
}

impl Default for ConntrackCollector {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl FeatureCollector for ConntrackCollector {
    fn name(&self) -> &str {
        PREFIX
    }

    fn describe(&self, descs: &mut Vec<Arc<MetricDescription>>) {
        descs.extend(self.descriptions.iter().map(|(_, d)| Arc::clone(d)));
    }

    async fn collect(&self, ctx: &ScrapeContext) -> Result<()> {
        let rows = ctx
            .fetch("/ip/firewall/connection/tracking/print", &PROPERTIES)
            .await
            .map_err(|e| ExporterError::collection("conntrack table", e))?;

        for row in &rows {
            for (property, desc) in &self.descriptions {
                let value = row.get_or_empty(property);
                if value.is_empty() {
                    continue;
                }

                match parse_float(value) {
                    Ok(v) => ctx.emit(desc, v, &[]),
                    Err(e) => ctx.log_parse_error(PREFIX, property, value, &e),
                }
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collector::core::testing::*;

    #[tokio::test]
    async fn test_collects_table_usage() {
        let connection = ScriptedConnection::default().with_rows(
            "/ip/firewall/connection/tracking/print",
            vec![vec![("total-entries", "1532"), ("max-entries", "x")]],
        );
        let (ctx, mut rx) = context(connection);

        ConntrackCollector::new().collect(&ctx).await.unwrap();
        let samples = drain(&mut rx);

        assert_eq!(samples.len(), 1);
        assert_eq!(value_of(&samples, "mikrotik_conntrack_entries", &[("name", "r1")]), Some(1532.0));
    }
}
