//! A Prometheus exporter library for MikroTik RouterOS devices

pub mod collector;
pub mod config;
pub mod connection;
pub mod device;
pub mod dns;
pub mod encoder;
pub mod error;
pub mod metrics;
pub mod parsers;
pub mod routeros;
pub mod scrape;
pub mod server;
pub mod util;

/// Re-export of commonly used types for convenience
pub mod prelude {
    pub use crate::collector::{FeatureCollector, ScrapeContext};
    pub use crate::config::{AppConfig, ConfigBuilder};
    pub use crate::connection::{Connection, Connector};
    pub use crate::device::{Device, DeviceRegistry, Target};
    pub use crate::dns::Resolver;
    pub use crate::error::{ExporterError, Result};
    pub use crate::metrics::{MetricDescription, MetricSink, Sample};
    pub use crate::scrape::Scraper;
    pub use crate::scrape::telemetry::{Step, StepOutcome};
}

/// Library version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
