use async_trait::async_trait;
use std::sync::Arc;

use super::core::{FeatureCollector, ScrapeContext, parse_float};
use crate::error::{ExporterError, Result};
use crate::metrics::MetricDescription;
use crate::parsers::{parse_comma_separated, parse_duration, parse_wireless_rate};
use crate::routeros::Sentence;

const PREFIX: &str = "wlan_station";

const PROPERTIES: [&str; 12] = [
    "interface",
    "mac-address",
    "uptime",
    "signal-to-noise",
    "signal-strength-ch0",
    "signal-strength-ch1",
    "tx-ccq",
    "rx-rate",
    "tx-rate",
    "packets",
    "bytes",
    "frames",
];

const LABEL_NAMES: [&str; 4] = ["name", "address", "interface", "mac_address"];

/// Properties reported as a `tx,rx` pair
const PAIRED: [&str; 3] = ["packets", "bytes", "frames"];

/// Registered wireless clients from `/interface/wireless/registration-table/print`
pub struct WlanStationsCollector {
    single: Vec<(&'static str, Arc<MetricDescription>)>,
    // (property, tx description, rx description)
    paired: Vec<(&'static str, Arc<MetricDescription>, Arc<MetricDescription>)>,
}

impl WlanStationsCollector {
    pub fn new() -> Self {
        let gauge = |name: &str, help: &str| MetricDescription::gauge(PREFIX, name, help, &LABEL_NAMES);
        let counter = |name: &str, help: &str| MetricDescription::counter(PREFIX, name, help, &LABEL_NAMES);

        let single = vec![
            ("uptime", counter("uptime", "wlan station uptime in seconds")),
            ("signal-to-noise", gauge("signal_to_noise_ratio", "wlan station signal to noise ratio")),
            (
                "signal-strength-ch0",
                gauge("signal_strength_ch0", "wlan station signal strength on ch0 in dbm"),
            ),
            (
                "signal-strength-ch1",
                gauge("signal_strength_ch1", "wlan station signal strength on ch1 in dbm"),
            ),
            ("tx-ccq", gauge("tx_ccq", "wlan station tx ccq in percent")),
            ("rx-rate", gauge("rx_rate", "wlan station rx rate in mbps")),
            ("tx-rate", gauge("tx_rate", "wlan station tx rate in mbps")),
        ];

        let paired = PAIRED
            .iter()
            .map(|property| {
                (
                    *property,
                    counter(
                        &format!("tx_{}", property),
                        &format!("number of tx {} per wlan station", property),
                    ),
                    counter(
                        &format!("rx_{}", property),
                        &format!("number of rx {} per wlan station", property),
                    ),
                )
            })
            .collect();

        Self { single, paired }
    }

    fn collect_for_row(&self, ctx: &ScrapeContext, row: &Sentence) {
        let labels = [row.get_or_empty("interface"), row.get_or_empty("mac-address")];

        for (property, desc) in &self.single {
            let value = row.get_or_empty(property);
            if value.is_empty() {
                continue;
            }

            let parsed = match *property {
                "uptime" => parse_duration(value),
                "rx-rate" | "tx-rate" => parse_wireless_rate(value),
                _ => parse_float(value),
            };

            match parsed {
                Ok(v) => ctx.emit(desc, v, &labels),
                Err(e) => ctx.log_parse_error(PREFIX, property, value, &e),
            }
        }

        for (property, tx_desc, rx_desc) in &self.paired {
            let value = row.get_or_empty(property);
            if value.is_empty() {
                continue;
            }

            match parse_comma_separated(value) {
                Ok((tx, rx)) => {
                    ctx.emit(tx_desc, tx, &labels);
                    ctx.emit(rx_desc, rx, &labels);
                }
                Err(e) => ctx.log_parse_error(PREFIX, property, value, &e),
            }
        }
    }
}

impl Default for WlanStationsCollector {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl FeatureCollector for WlanStationsCollector {
    fn name(&self) -> &str {
        PREFIX
    }

    fn describe(&self, descs: &mut Vec<Arc<MetricDescription>>) {
        descs.extend(self.single.iter().map(|(_, d)| Arc::clone(d)));
        for (_, tx, rx) in &self.paired {
            descs.push(Arc::clone(tx));
            descs.push(Arc::clone(rx));
        }
    }

    async fn collect(&self, ctx: &ScrapeContext) -> Result<()> {
        let rows = ctx
            .fetch("/interface/wireless/registration-table/print", &PROPERTIES)
            .await
            .map_err(|e| ExporterError::collection("wlan station", e))?;

        for row in &rows {
            self.collect_for_row(ctx, row);
        }

        Ok(())
    }
}
