use async_trait::async_trait;
use std::sync::Arc;

use super::core::{FeatureCollector, ScrapeContext, parse_float};
use crate::error::{ExporterError, Result};
use crate::metrics::MetricDescription;
use crate::parsers::parse_duration;
use crate::routeros::Sentence;

const PREFIX: &str = "system";

const PROPERTIES: [&str; 8] = [
    "free-memory",
    "total-memory",
    "cpu-load",
    "free-hdd-space",
    "total-hdd-space",
    "uptime",
    "board-name",
    "version",
];

const LABEL_NAMES: [&str; 4] = ["name", "address", "boardname", "version"];

/// Memory, CPU, disk and uptime from `/system/resource/print`
pub struct ResourceCollector {
    descriptions: Vec<(&'static str, Arc<MetricDescription>)>,
}

impl ResourceCollector {
    pub fn new() -> Self {
        let gauge = |name: &str, help: &str| MetricDescription::gauge(PREFIX, name, help, &LABEL_NAMES);

        Self {
            descriptions: vec![
                ("free-memory", gauge("free_memory", "amount of free memory in bytes")),
                ("total-memory", gauge("total_memory", "amount of total memory in bytes")),
                ("cpu-load", gauge("cpu_load", "cpu load in percent")),
                ("free-hdd-space", gauge("free_hdd_space", "amount of free hdd space in bytes")),
                ("total-hdd-space", gauge("total_hdd_space", "amount of total hdd space in bytes")),
                (
                    "uptime",
                    MetricDescription::counter(PREFIX, "uptime", "system uptime in seconds", &LABEL_NAMES),
                ),
            ],
        }
    }

    fn collect_for_row(&self, ctx: &ScrapeContext, row: &Sentence) {
        let labels = [row.get_or_empty("board-name"), row.get_or_empty("version")];

        for (property, desc) in &self.descriptions {
            let value = row.get_or_empty(property);
            if value.is_empty() {
                continue;
            }

            let parsed = match *property {
                "uptime" => parse_duration(value),
                _ => parse_float(value),
            };

            match parsed {
                Ok(v) => ctx.emit(desc, v, &labels),
                Err(e) => ctx.log_parse_error(PREFIX, property, value, &e),
            }
        }
    }
}

impl Default for ResourceCollector {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl FeatureCollector for ResourceCollector {
    fn name(&self) -> &str {
        PREFIX
    }

    fn describe(&self, descs: &mut Vec<Arc<MetricDescription>>) {
        descs.extend(self.descriptions.iter().map(|(_, d)| Arc::clone(d)));
    }

    async fn collect(&self, ctx: &ScrapeContext) -> Result<()> {
        let rows = ctx
            .fetch("/system/resource/print", &PROPERTIES)
            .await
            .map_err(|e| ExporterError::collection("resource", e))?;

        for row in &rows {
            self.collect_for_row(ctx, row);
        }

        Ok(())
    }
}
