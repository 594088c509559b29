use async_trait::async_trait;
use std::sync::Arc;

use super::core::{DEVICE_LABELS, FeatureCollector, ScrapeContext, parse_float};
use crate::error::{ExporterError, Result};
use crate::metrics::MetricDescription;

const PREFIX: &str = "health";

const PROPERTIES: [&str; 3] = ["voltage", "temperature", "cpu-temperature"];

/// Board voltage and temperatures from `/system/health/print`
pub struct HealthCollector {
    descriptions: Vec<(&'static str, Arc<MetricDescription>)>,
}

impl HealthCollector {
    pub fn new() -> Self {
        let gauge = |name: &str, help: &str| MetricDescription::gauge(PREFIX, name, help, &DEVICE_LABELS);

        Self {
            descriptions: vec![
                ("voltage", gauge("voltage", "input voltage to routeros board in volts")),
                (
                    "temperature",
                    gauge("board_temperature", "temperature of routeros board in degrees celsius"),
                ),
                ("cpu-temperature", gauge("cpu_temperature", "cpu temperature in degrees celsius")),
            ],
        }
    }
}

impl Default for HealthCollector {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl FeatureCollector for HealthCollector {
    fn name(&self) -> &str {
        PREFIX
    }

    fn describe(&self, descs: &mut Vec<Arc<MetricDescription>>) {
        descs.extend(self.descriptions.iter().map(|(_, d)| Arc::clone(d)));
    }

    async fn collect(&self, ctx: &ScrapeContext) -> Result<()> {
        let rows = ctx
            .fetch("/system/health/print", &PROPERTIES)
            .await
            .map_err(|e| ExporterError::collection("system health", e))?;

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
    async fn test_collects_health_gauges() {
        let connection = ScriptedConnection::default().with_rows(
            "/system/health/print",
            vec![vec![("voltage", "24.1"), ("temperature", "41"), ("cpu-temperature", "n/a")]],
        );
        let (ctx, mut rx) = context(connection);

        HealthCollector::new().collect(&ctx).await.unwrap();
        let samples = drain(&mut rx);

        assert_eq!(samples.len(), 2);
        assert_eq!(
            value_of(&samples, "mikrotik_health_voltage", &[("name", "r1"), ("address", "10.0.0.1")]),
            Some(24.1)
        );
        assert_eq!(value_of(&samples, "mikrotik_health_board_temperature", &[]), Some(41.0));
    }
}
