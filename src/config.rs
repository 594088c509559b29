//! Exporter configuration: a YAML file layered with environment overrides
use clap::ValueEnum;
use log::debug;
use serde::{Deserialize, Deserializer};
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use crate::collector::{FeatureCollector, build_collectors, default_collectors};
use crate::device::{ClientOptions, DEFAULT_DIAL_TIMEOUT, Device, DeviceRegistry, DnsRecord};
use crate::error::{ExporterError, Result};

/// Prefix of environment variables that override file settings,
/// e.g. `MIKROTIK_EXPORTER__SERVER__PORT=9000`
pub const ENV_PREFIX: &str = "MIKROTIK_EXPORTER";

const DEFAULT_LISTEN_PORT: u16 = 9436;
const DEFAULT_METRICS_PATH: &str = "/metrics";
const DEFAULT_DNS_PORT: &str = "53";

/// Feature flags switching on optional collectors.
///
/// Unknown flags are rejected so a typo or an unsupported collector fails
/// loudly instead of silently collecting less.
#[derive(Debug, Deserialize, Clone, Copy, Default, PartialEq, Eq)]
#[serde(default, deny_unknown_fields)]
pub struct Features {
    /// BGP session state
    pub bgp: bool,
    /// Active route counts for IPv4 and IPv6
    pub routes: bool,
    /// DHCP server lease expiry
    pub dhcp: bool,
    /// Installed packages
    pub firmware: bool,
    /// Board voltage and temperatures
    pub health: bool,
    /// Used addresses per IPv4 pool
    pub ip_pools: bool,
    /// Wireless registration table
    pub wlan_stations: bool,
    /// Netwatch entry status
    pub netwatch: bool,
    /// Connection tracking table usage
    pub conntrack: bool,
}

/// RouterOS client settings, at app or device level
#[derive(Debug, Deserialize, Clone, Default, PartialEq, Eq)]
#[serde(default)]
pub struct ClientConfig {
    /// Human-readable duration such as `5s` or `1500ms`
    #[serde(deserialize_with = "deserialize_duration")]
    pub dial_timeout: Option<Duration>,
    pub enable_tls: bool,
    pub insecure_tls_skip_verify: bool,
}

impl ClientConfig {
    pub fn to_options(&self) -> ClientOptions {
        ClientOptions {
            dial_timeout: self.dial_timeout.unwrap_or(DEFAULT_DIAL_TIMEOUT),
            enable_tls: self.enable_tls,
            insecure_tls_skip_verify: self.insecure_tls_skip_verify,
        }
    }
}

fn deserialize_duration<'de, D>(deserializer: D) -> std::result::Result<Option<Duration>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw: Option<String> = Option::deserialize(deserializer)?;
    match raw.as_deref().map(str::trim) {
        None | Some("") => Ok(None),
        Some(text) => humantime::parse_duration(text)
            .map(Some)
            .map_err(serde::de::Error::custom),
    }
}

/// DNS server queried for a device's SRV record
#[derive(Debug, Deserialize, Clone, PartialEq, Eq)]
pub struct DnsServerConfig {
    pub address: String,
    #[serde(default = "default_dns_port")]
    pub port: String,
}

fn default_dns_port() -> String {
    DEFAULT_DNS_PORT.to_string()
}

impl DnsServerConfig {
    fn socket_address(&self) -> String {
        if self.address.contains(':') && !self.address.starts_with('[') {
            format!("[{}]:{}", self.address, self.port)
        } else {
            format!("{}:{}", self.address, self.port)
        }
    }
}

/// SRV record used to look up a device's address
#[derive(Debug, Deserialize, Clone, PartialEq, Eq)]
pub struct DnsRecordConfig {
    pub record: String,
    /// Optional server; the system resolver is used without one
    #[serde(default)]
    pub server: Option<DnsServerConfig>,
}

/// One device entry
#[derive(Debug, Deserialize, Clone, Default, PartialEq, Eq)]
pub struct DeviceConfig {
    pub name: String,
    #[serde(default)]
    pub address: String,
    #[serde(default)]
    pub dns_record: Option<DnsRecordConfig>,
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub password: String,
    #[serde(default)]
    pub port: Option<u16>,
    /// Overrides the app-level client settings entirely
    #[serde(default)]
    pub client: Option<ClientConfig>,
    /// Collectors run for this device only, on top of the shared ones
    #[serde(default)]
    pub features: Option<Features>,
}

/// HTTP listener settings
#[derive(Debug, Deserialize, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    #[serde(default = "default_listen_port")]
    pub port: u16,
    #[serde(default = "default_metrics_path")]
    pub metrics_path: String,
}

fn default_listen_port() -> u16 {
    DEFAULT_LISTEN_PORT
}

fn default_metrics_path() -> String {
    DEFAULT_METRICS_PATH.to_string()
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: default_listen_port(),
            metrics_path: default_metrics_path(),
        }
    }
}

/// Logging level
#[derive(Debug, Deserialize, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Error,
    Warn,
    #[default]
    Info,
    Debug,
    Trace,
}

/// Log line rendering
#[derive(Debug, Deserialize, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Timestamp, level, target and message on one line
    #[default]
    Text,
    /// One JSON object per line
    Json,
}

#[derive(Debug, Deserialize, Clone, Default, PartialEq, Eq)]
#[serde(default)]
pub struct LogConfig {
    pub level: LogLevel,
    pub format: LogFormat,
}

/// Top-level exporter configuration
#[derive(Debug, Deserialize, Clone, Default, PartialEq, Eq)]
pub struct AppConfig {
    #[serde(default)]
    pub devices: Vec<DeviceConfig>,
    /// Client settings for devices that do not carry their own
    #[serde(default)]
    pub client: Option<ClientConfig>,
    /// Collectors shared by every device
    #[serde(default)]
    pub features: Option<Features>,
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub log: LogConfig,
    /// Emit a `resolve` step outcome for devices with an SRV record
    #[serde(default)]
    pub report_resolve_step: bool,
}

impl AppConfig {
    /// A configuration scraping exactly one device
    pub fn single_device(device: DeviceConfig) -> Self {
        Self {
            devices: vec![device],
            ..Self::default()
        }
    }

    /// Check the settings that deserialization cannot
    pub fn validate(&self) -> Result<()> {
        if self.devices.is_empty() {
            return Err(ExporterError::Config("no devices configured".to_string()));
        }

        let mut seen = HashSet::with_capacity(self.devices.len());
        for device in &self.devices {
            if device.name.trim().is_empty() {
                return Err(ExporterError::Config("device with empty name".to_string()));
            }
            if !seen.insert(device.name.as_str()) {
                return Err(ExporterError::Config(format!(
                    "duplicate device name {:?}",
                    device.name
                )));
            }

            let has_record = device
                .dns_record
                .as_ref()
                .is_some_and(|r| !r.record.trim().is_empty());
            if device.address.trim().is_empty() && !has_record {
                return Err(ExporterError::Config(format!(
                    "device {:?} needs an address or a dns_record",
                    device.name
                )));
            }
        }

        let path = self.server.metrics_path.as_str();
        if !path.starts_with('/') || path == "/" || path == "/live" {
            return Err(ExporterError::Config(format!(
                "metrics path {:?} must start with '/' and not be '/' or '/live'",
                path
            )));
        }

        Ok(())
    }

    /// Collectors every device runs: feature-enabled ones, then the defaults
    pub fn shared_collectors(&self) -> Vec<Arc<dyn FeatureCollector>> {
        let mut collectors = self
            .features
            .as_ref()
            .map(build_collectors)
            .unwrap_or_default();
        collectors.extend(default_collectors());
        collectors
    }

    /// Client options for a device: its own settings, else the app's, else defaults
    fn client_options(&self, device: &DeviceConfig) -> ClientOptions {
        device
            .client
            .as_ref()
            .or(self.client.as_ref())
            .map(ClientConfig::to_options)
            .unwrap_or_default()
    }

    fn build_device(&self, config: &DeviceConfig) -> Device {
        let dns_record = config.dns_record.as_ref().map(|r| DnsRecord {
            name: r.record.clone(),
            server_address: r
                .server
                .as_ref()
                .map(DnsServerConfig::socket_address)
                .unwrap_or_default(),
        });

        Device {
            name: config.name.clone(),
            address: config.address.clone(),
            port: config.port,
            username: config.username.clone(),
            password: config.password.clone(),
            client: self.client_options(config),
            dns_record,
            collectors: config
                .features
                .as_ref()
                .map(build_collectors)
                .unwrap_or_default(),
        }
    }

    /// The configured devices, ready to scrape
    pub fn registry(&self) -> DeviceRegistry {
        DeviceRegistry::new(self.devices.iter().map(|d| self.build_device(d)).collect())
    }
}

/// Where configuration values come from; later sources override earlier ones
#[derive(Debug, Clone)]
pub enum ConfigSource {
    /// YAML file
    File(PathBuf),
    /// Environment variables under a prefix, optionally from a fixed map
    Environment {
        prefix: String,
        vars: Option<HashMap<String, String>>,
    },
    /// Inline YAML
    Yaml(String),
}

/// Loads an [`AppConfig`] from ordered sources and validates it
#[derive(Debug, Default)]
pub struct ConfigBuilder {
    sources: Vec<ConfigSource>,
}

impl ConfigBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_file<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.sources.push(ConfigSource::File(path.as_ref().to_path_buf()));
        self
    }

    /// Read overrides from the process environment
    pub fn add_env(mut self, prefix: impl Into<String>) -> Self {
        self.sources.push(ConfigSource::Environment {
            prefix: prefix.into(),
            vars: None,
        });
        self
    }

    /// Read overrides from `vars` as if they were the environment
    pub fn add_env_vars(mut self, prefix: impl Into<String>, vars: HashMap<String, String>) -> Self {
        self.sources.push(ConfigSource::Environment {
            prefix: prefix.into(),
            vars: Some(vars),
        });
        self
    }

    pub fn add_yaml(mut self, yaml: impl Into<String>) -> Self {
        self.sources.push(ConfigSource::Yaml(yaml.into()));
        self
    }

    /// Merge the sources, deserialize and validate
    pub fn build(self) -> Result<AppConfig> {
        let mut builder = config::Config::builder();

        for source in self.sources {
            match source {
                ConfigSource::File(path) => {
                    if !path.exists() {
                        return Err(ExporterError::Config(format!(
                            "configuration file not found: {}",
                            path.display()
                        )));
                    }
                    debug!("Loading configuration from file: {}", path.display());
                    builder = builder.add_source(
                        config::File::from(path.as_path()).format(config::FileFormat::Yaml),
                    );
                }
                ConfigSource::Environment { prefix, vars } => {
                    debug!("Loading configuration from environment with prefix: {}", prefix);
                    builder = builder.add_source(
                        config::Environment::with_prefix(&prefix)
                            .prefix_separator("__")
                            .separator("__")
                            .try_parsing(true)
                            .source(vars),
                    );
                }
                ConfigSource::Yaml(yaml) => {
                    builder = builder
                        .add_source(config::File::from_str(&yaml, config::FileFormat::Yaml));
                }
            }
        }

        let config: AppConfig = builder.build()?.try_deserialize()?;
        config.validate()?;

        debug!("Configuration loaded with {} device(s)", config.devices.len());
        Ok(config)
    }
}

/// Load and validate a YAML configuration file with environment overrides
pub fn load_config<P: AsRef<Path>>(path: P) -> Result<AppConfig> {
    ConfigBuilder::new().add_file(path).add_env(ENV_PREFIX).build()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    const SAMPLE: &str = r#"
devices:
  - name: edge
    address: 192.168.88.1
    username: prometheus
    password: changeme
    port: 8729
    client:
      dial_timeout: 2s
      enable_tls: true
    features:
      bgp: true
  - name: branch
    dns_record:
      record: _api._tcp.branch.example.com
      server:
        address: 10.0.0.53
    username: prometheus
    password: changeme
client:
  dial_timeout: 10s
features:
  health: true
"#;

    #[test]
    fn test_load_from_yaml_file() {
        let mut file = NamedTempFile::with_suffix(".yml").unwrap();
        write!(file, "{}", SAMPLE).unwrap();

        let config = ConfigBuilder::new().add_file(file.path()).build().unwrap();
        assert_eq!(config.devices.len(), 2);
        assert_eq!(config.devices[0].port, Some(8729));
        assert_eq!(config.server, ServerConfig::default());
        assert_eq!(config.log.level, LogLevel::Info);
        assert!(!config.report_resolve_step);
    }

    #[test]
    fn test_missing_file_is_an_error() {
        let result = ConfigBuilder::new().add_file("/nonexistent/exporter.yml").build();
        assert!(matches!(result, Err(ExporterError::Config(_))));
    }

    #[test]
    fn test_device_client_overrides_app_client() {
        let config = ConfigBuilder::new().add_yaml(SAMPLE).build().unwrap();
        let registry = config.registry();
        let devices: Vec<_> = registry.iter().collect();

        assert_eq!(devices[0].client.dial_timeout, Duration::from_secs(2));
        assert!(devices[0].client.enable_tls);
        assert_eq!(devices[1].client.dial_timeout, Duration::from_secs(10));
        assert!(!devices[1].client.enable_tls);
    }

    #[test]
    fn test_client_defaults_without_any_client_section() {
        let config = ConfigBuilder::new()
            .add_yaml("devices:\n  - name: r1\n    address: 10.0.0.1\n")
            .build()
            .unwrap();
        let registry = config.registry();
        let device = registry.iter().next().unwrap();
        assert_eq!(device.client, ClientOptions::default());
        assert_eq!(device.dns_record, None);
    }

    #[test]
    fn test_dns_record_server_defaults_port() {
        let config = ConfigBuilder::new().add_yaml(SAMPLE).build().unwrap();
        let registry = config.registry();
        let branch = registry.iter().nth(1).unwrap();

        let record = branch.dynamic_record().unwrap();
        assert_eq!(record.name, "_api._tcp.branch.example.com");
        assert_eq!(record.server_address, "10.0.0.53:53");
    }

    #[test]
    fn test_features_split_into_shared_and_device_collectors() {
        let config = ConfigBuilder::new().add_yaml(SAMPLE).build().unwrap();

        let shared: Vec<_> = config
            .shared_collectors()
            .iter()
            .map(|c| c.name().to_string())
            .collect();
        assert_eq!(shared, vec!["health", "interface", "system"]);

        let registry = config.registry();
        let devices: Vec<_> = registry.iter().collect();
        assert_eq!(devices[0].collectors.len(), 1);
        assert_eq!(devices[0].collectors[0].name(), "bgp_session");
        assert!(devices[1].collectors.is_empty());
    }

    #[test]
    fn test_env_overrides_file() {
        let vars = HashMap::from([
            ("MIKROTIK_EXPORTER__SERVER__PORT".to_string(), "9100".to_string()),
            ("MIKROTIK_EXPORTER__REPORT_RESOLVE_STEP".to_string(), "true".to_string()),
        ]);

        let config = ConfigBuilder::new()
            .add_yaml(SAMPLE)
            .add_env_vars(ENV_PREFIX, vars)
            .build()
            .unwrap();

        assert_eq!(config.server.port, 9100);
        assert!(config.report_resolve_step);
    }

    #[test]
    fn test_validation_rejects_bad_device_sets() {
        let empty = ConfigBuilder::new().add_yaml("devices: []").build();
        assert!(matches!(empty, Err(ExporterError::Config(_))));

        let duplicate = ConfigBuilder::new()
            .add_yaml(
                "devices:\n  - name: r1\n    address: 10.0.0.1\n  - name: r1\n    address: 10.0.0.2\n",
            )
            .build();
        assert!(matches!(duplicate, Err(ExporterError::Config(_))));

        let nowhere = ConfigBuilder::new()
            .add_yaml("devices:\n  - name: r1\n    username: admin\n")
            .build();
        assert!(matches!(nowhere, Err(ExporterError::Config(_))));
    }

    #[test]
    fn test_unknown_feature_flag_is_rejected() {
        let result = ConfigBuilder::new()
            .add_yaml("devices:\n  - name: r1\n    address: 10.0.0.1\nfeatures:\n  routes: true\n  poe: true\n")
            .build();
        assert!(matches!(result, Err(ExporterError::Config(_))));

        let device_level = ConfigBuilder::new()
            .add_yaml("devices:\n  - name: r1\n    address: 10.0.0.1\n    features:\n      lte: true\n")
            .build();
        assert!(matches!(device_level, Err(ExporterError::Config(_))));
    }

    #[test]
    fn test_feature_enabled_at_both_levels_runs_once() {
        let config = ConfigBuilder::new()
            .add_yaml(
                "devices:\n  - name: r1\n    address: 10.0.0.1\n    features:\n      wlan_stations: true\n      conntrack: true\nfeatures:\n  wlan_stations: true\n",
            )
            .build()
            .unwrap();

        let shared = config.shared_collectors();
        let registry = config.registry();
        let device = registry.iter().next().unwrap();
        let names: Vec<_> = device
            .effective_collectors(&shared)
            .iter()
            .map(|c| c.name().to_string())
            .collect();
        assert_eq!(names, vec!["wlan_station", "interface", "system", "conntrack"]);
    }

    #[test]
    fn test_invalid_dial_timeout_is_rejected() {
        let result = ConfigBuilder::new()
            .add_yaml("devices:\n  - name: r1\n    address: 10.0.0.1\nclient:\n  dial_timeout: soon\n")
            .build();
        assert!(matches!(result, Err(ExporterError::Config(_))));
    }

    #[test]
    fn test_single_device_config() {
        let config = AppConfig::single_device(DeviceConfig {
            name: "r1".to_string(),
            address: "10.0.0.1".to_string(),
            username: "admin".to_string(),
            password: "secret".to_string(),
            ..DeviceConfig::default()
        });
        config.validate().unwrap();
        assert_eq!(config.registry().len(), 1);
        assert_eq!(config.shared_collectors().len(), 2);
    }
}
