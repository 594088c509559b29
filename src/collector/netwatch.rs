use async_trait::async_trait;
use std::sync::Arc;

use super::core::{FeatureCollector, ScrapeContext};
use crate::error::{ExporterError, Result};
use crate::metrics::MetricDescription;

const PREFIX: &str = "netwatch";

const PROPERTIES: [&str; 3] = ["host", "comment", "status"];

/// Status of every enabled netwatch entry
pub struct NetwatchCollector {
    status: Arc<MetricDescription>,
}

impl NetwatchCollector {
    pub fn new() -> Self {
        Self {
            status: MetricDescription::gauge(
                PREFIX,
                "status",
                "netwatch status (up = 1, down = -1)",
                &["name", "address", "host", "comment"],
            ),
        }
    }
}

impl Default for NetwatchCollector {
    fn default() -> Self {
        Self::new()
    }
}

/// `up` is 1, `down` is -1, anything else (`unknown`) is 0
fn status_value(status: &str) -> f64 {
    match status {
        "up" => 1.0,
        "down" => -1.0,
        _ => 0.0,
    }
}

#[async_trait]
impl FeatureCollector for NetwatchCollector {
    fn name(&self) -> &str {
        PREFIX
    }

    fn describe(&self, descs: &mut Vec<Arc<MetricDescription>>) {
        descs.push(Arc::clone(&self.status));
    }

    async fn collect(&self, ctx: &ScrapeContext) -> Result<()> {
        let words = [
            "/tool/netwatch/print".to_string(),
            "?disabled=false".to_string(),
            format!("=.proplist={}", PROPERTIES.join(",")),
        ];
        let reply = ctx
            .run(&words)
            .await
            .map_err(|e| ExporterError::collection("netwatch", e))?;

        for row in &reply.re {
            let status = row.get_or_empty("status");
            if status.is_empty() {
                continue;
            }
            let labels = [row.get_or_empty("host"), row.get_or_empty("comment")];
            ctx.emit(&self.status, status_value(status), &labels);
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collector::core::testing::*;

    #[tokio::test]
    async fn test_maps_status_values() {
        let connection = ScriptedConnection::default().with_rows(
            "/tool/netwatch/print",
            vec![
                vec![("host", "1.1.1.1"), ("comment", "cloudflare"), ("status", "up")],
                vec![("host", "10.9.9.9"), ("status", "down")],
                vec![("host", "10.9.9.10"), ("status", "unknown")],
                vec![("host", "10.9.9.11")],
            ],
        );
        let (ctx, mut rx) = context(connection);

        NetwatchCollector::new().collect(&ctx).await.unwrap();
        let samples = drain(&mut rx);

        let status = "mikrotik_netwatch_status";
        assert_eq!(samples.len(), 3);
        assert_eq!(value_of(&samples, status, &[("host", "1.1.1.1"), ("comment", "cloudflare")]), Some(1.0));
        assert_eq!(value_of(&samples, status, &[("host", "10.9.9.9")]), Some(-1.0));
        assert_eq!(value_of(&samples, status, &[("host", "10.9.9.10")]), Some(0.0));
    }
}
