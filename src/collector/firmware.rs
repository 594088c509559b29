use async_trait::async_trait;
use std::sync::Arc;

use super::core::{FeatureCollector, ScrapeContext};
use crate::error::{ExporterError, Result};
use crate::metrics::MetricDescription;

const PREFIX: &str = "firmware";

const LABEL_NAMES: [&str; 5] = ["name", "address", "package", "version", "build_time"];

/// Installed packages from `/system/package/getall`; enabled packages read 1
pub struct FirmwareCollector {
    package_active: Arc<MetricDescription>,
}

impl FirmwareCollector {
    pub fn new() -> Self {
        Self {
            package_active: MetricDescription::gauge(
                PREFIX,
                "package_active",
                "active firmware packages",
                &LABEL_NAMES,
            ),
        }
    }
}

impl Default for FirmwareCollector {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl FeatureCollector for FirmwareCollector {
    fn name(&self) -> &str {
        PREFIX
    }

    fn describe(&self, descs: &mut Vec<Arc<MetricDescription>>) {
        descs.push(Arc::clone(&self.package_active));
    }

    async fn collect(&self, ctx: &ScrapeContext) -> Result<()> {
        let reply = ctx
            .run(&["/system/package/getall".to_string()])
            .await
            .map_err(|e| ExporterError::collection("package", e))?;

        for row in &reply.re {
            let active = if row.get_or_empty("disabled") == "false" { 1.0 } else { 0.0 };
            let labels = [
                row.get_or_empty("name"),
                row.get_or_empty("version"),
                row.get_or_empty("build-time"),
            ];
            ctx.emit(&self.package_active, active, &labels);
        }

        Ok(())
    }
}
