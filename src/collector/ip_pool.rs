use async_trait::async_trait;
use std::sync::Arc;

use super::core::{FeatureCollector, ScrapeContext, parse_float};
use crate::error::{ExporterError, Result};
use crate::metrics::MetricDescription;

const PREFIX: &str = "ip_pool";

const LABEL_NAMES: [&str; 4] = ["name", "address", "ip_version", "pool"];

/// Used addresses per IPv4 pool
pub struct IpPoolCollector {
    used: Arc<MetricDescription>,
}

impl IpPoolCollector {
    pub fn new() -> Self {
        Self {
            used: MetricDescription::gauge(PREFIX, "used", "number of used ip/prefixes in pool", &LABEL_NAMES),
        }
    }

    async fn collect_for_ip_version(&self, ctx: &ScrapeContext, topic: &str, ip_version: &str) -> Result<()> {
        let pools = ctx
            .fetch(&format!("/{}/pool/print", topic), &["name"])
            .await
            .map_err(|e| ExporterError::collection("ip pool names", e))?;

        for pool in &pools {
            let name = pool.get_or_empty("name");
            let used = ctx
                .count(&format!("/{}/pool/used/print", topic), &[format!("?pool={}", name)])
                .await
                .map_err(|e| ExporterError::collection("ip pool usage", e))?;

            let Some(value) = used else {
                continue;
            };
            match parse_float(&value) {
                Ok(v) => ctx.emit(&self.used, v, &[ip_version, name]),
                Err(e) => ctx.log_parse_error(PREFIX, "used", &value, &e),
            }
        }

        Ok(())
    }
}

impl Default for IpPoolCollector {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl FeatureCollector for IpPoolCollector {
    fn name(&self) -> &str {
        PREFIX
    }

    fn describe(&self, descs: &mut Vec<Arc<MetricDescription>>) {
        descs.push(Arc::clone(&self.used));
    }

    async fn collect(&self, ctx: &ScrapeContext) -> Result<()> {
        self.collect_for_ip_version(ctx, "ip", "4").await
    }
}
