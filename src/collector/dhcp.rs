use async_trait::async_trait;
use std::sync::Arc;

use super::core::{FeatureCollector, ScrapeContext};
use crate::error::{ExporterError, Result};
use crate::metrics::MetricDescription;
use crate::parsers::parse_duration;

const PREFIX: &str = "dhcp_lease";

const PROPERTIES: [&str; 6] = [
    "active-mac-address",
    "server",
    "status",
    "expires-after",
    "active-address",
    "host-name",
];

const LABEL_NAMES: [&str; 7] = [
    "name",
    "address",
    "active_mac_address",
    "server",
    "status",
    "active_address",
    "hostname",
];

/// Remaining lease time of every DHCP server lease
pub struct DhcpLeaseCollector {
    expires_after: Arc<MetricDescription>,
}

impl DhcpLeaseCollector {
    pub fn new() -> Self {
        Self {
            expires_after: MetricDescription::gauge(
                PREFIX,
                "expires_after",
                "dhcp lease expires after seconds",
                &LABEL_NAMES,
            ),
        }
    }
}

impl Default for DhcpLeaseCollector {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl FeatureCollector for DhcpLeaseCollector {
    fn name(&self) -> &str {
        PREFIX
    }

    fn describe(&self, descs: &mut Vec<Arc<MetricDescription>>) {
        descs.push(Arc::clone(&self.expires_after));
    }

    async fn collect(&self, ctx: &ScrapeContext) -> Result<()> {
        let rows = ctx
            .fetch("/ip/dhcp-server/lease/print", &PROPERTIES)
            .await
            .map_err(|e| ExporterError::collection("dhcp lease", e))?;

        for row in &rows {
            // static leases without an active binding carry no expiry
            let value = row.get_or_empty("expires-after");
            if value.is_empty() {
                continue;
            }

            let seconds = match parse_duration(value) {
                Ok(v) => v,
                Err(e) => {
                    ctx.log_parse_error(PREFIX, "expires-after", value, &e);
                    continue;
                }
            };

            let labels = [
                row.get_or_empty("active-mac-address"),
                row.get_or_empty("server"),
                row.get_or_empty("status"),
                row.get_or_empty("active-address"),
                row.get_or_empty("host-name"),
            ];
            ctx.emit(&self.expires_after, seconds, &labels);
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collector::core::testing::*;

    #[tokio::test]
    async fn test_collects_lease_expiry() {
        let connection = ScriptedConnection::default().with_rows(
            "/ip/dhcp-server/lease/print",
            vec![
                vec![
                    ("active-mac-address", "AA:BB:CC:DD:EE:FF"),
                    ("server", "lan"),
                    ("status", "bound"),
                    ("expires-after", "9m32s"),
                    ("active-address", "192.168.88.10"),
                    ("host-name", "laptop"),
                ],
                vec![("server", "lan"), ("status", "waiting")],
                vec![("server", "lan"), ("expires-after", "soon")],
            ],
        );
        let (ctx, mut rx) = context(connection);

        DhcpLeaseCollector::new().collect(&ctx).await.unwrap();
        let samples = drain(&mut rx);

        assert_eq!(samples.len(), 1);
        assert_eq!(
            value_of(
                &samples,
                "mikrotik_dhcp_lease_expires_after",
                &[("hostname", "laptop"), ("active_address", "192.168.88.10")]
            ),
            Some(572.0)
        );
    }
}
