use async_trait::async_trait;
use std::sync::Arc;

use super::core::{FeatureCollector, ScrapeContext, parse_float};
use crate::error::{ExporterError, Result};
use crate::metrics::MetricDescription;

const PREFIX: &str = "routes";

const PROTOCOLS: [&str; 6] = ["bgp", "static", "ospf", "dynamic", "connect", "rip"];

/// API menu and `ip_version` label for each address family
const FAMILIES: [(&str, &str); 2] = [("ip", "4"), ("ipv6", "6")];

/// Active route counts in the RIB, in total and per protocol, for IPv4 and IPv6
pub struct RoutesCollector {
    total: Arc<MetricDescription>,
    by_protocol: Arc<MetricDescription>,
}

impl RoutesCollector {
    pub fn new() -> Self {
        Self {
            total: MetricDescription::gauge(
                PREFIX,
                "total",
                "number of routes in rib",
                &["name", "address", "ip_version"],
            ),
            by_protocol: MetricDescription::gauge(
                PREFIX,
                "by_protocol",
                "number of routes per protocol in rib",
                &["name", "address", "ip_version", "protocol"],
            ),
        }
    }

    async fn emit_count(
        &self,
        ctx: &ScrapeContext,
        topic: &str,
        queries: Vec<String>,
        desc: &Arc<MetricDescription>,
        labels: &[&str],
    ) -> Result<()> {
        let count = ctx
            .count(&format!("/{}/route/print", topic), &queries)
            .await
            .map_err(|e| ExporterError::collection("routes", e))?;

        if let Some(value) = count {
            match parse_float(&value) {
                Ok(v) => ctx.emit(desc, v, labels),
                Err(e) => ctx.log_parse_error(PREFIX, "count", &value, &e),
            }
        }
        Ok(())
    }
}

impl Default for RoutesCollector {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl FeatureCollector for RoutesCollector {
    fn name(&self) -> &str {
        PREFIX
    }

    fn describe(&self, descs: &mut Vec<Arc<MetricDescription>>) {
        descs.push(Arc::clone(&self.total));
        descs.push(Arc::clone(&self.by_protocol));
    }

    async fn collect(&self, ctx: &ScrapeContext) -> Result<()> {
        for (topic, ip_version) in FAMILIES {
            let active = "?active=true".to_string();
            self.emit_count(ctx, topic, vec![active.clone()], &self.total, &[ip_version])
                .await?;

            for protocol in PROTOCOLS {
                let queries = vec![active.clone(), format!("?{}=true", protocol)];
                self.emit_count(ctx, topic, queries, &self.by_protocol, &[ip_version, protocol])
                    .await?;
            }
        }

        Ok(())
    }
}
