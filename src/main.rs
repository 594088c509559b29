use anyhow::{Context, Result, bail};
use clap::Parser;
use log::info;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use mikrotik_exporter::config::{
    AppConfig, ClientConfig, DeviceConfig, LogFormat, LogLevel, load_config,
};
use mikrotik_exporter::scrape::Scraper;
use mikrotik_exporter::{VERSION, server, util::logging};

/// Prometheus exporter for MikroTik RouterOS devices
#[derive(Debug, Parser)]
#[command(name = "mikrotik-exporter", version)]
struct Args {
    /// YAML configuration file; without one a single device is configured from flags
    #[arg(long, env = "MIKROTIK_EXPORTER_CONFIG_FILE")]
    config_file: Option<PathBuf>,

    /// Address of the single device
    #[arg(long, env = "MIKROTIK_ADDRESS")]
    address: Option<String>,

    /// Name of the single device
    #[arg(long, env = "MIKROTIK_DEVICE_NAME")]
    name: Option<String>,

    /// Username for the single device
    #[arg(long, env = "MIKROTIK_USERNAME")]
    username: Option<String>,

    /// Password for the single device
    #[arg(long, env = "MIKROTIK_PASSWORD", hide_env_values = true)]
    password: Option<String>,

    /// API port of the single device
    #[arg(long, env = "MIKROTIK_PORT")]
    device_port: Option<u16>,

    /// Port to listen on [default: 9436]
    #[arg(long, env = "MIKROTIK_EXPORTER_PORT")]
    port: Option<u16>,

    /// Path to answer metrics requests on [default: /metrics]
    #[arg(long, env = "MIKROTIK_EXPORTER_PATH")]
    path: Option<String>,

    /// Timeout when connecting to the single device, e.g. `5s`
    #[arg(long, value_parser = humantime::parse_duration)]
    timeout: Option<Duration>,

    /// Connect to the single device with TLS
    #[arg(long)]
    enable_tls: bool,

    /// Skip server certificate verification when using TLS
    #[arg(long)]
    insecure_tls_skip_verify: bool,

    #[arg(long, env = "LOG_LEVEL", value_enum)]
    log_level: Option<LogLevel>,

    #[arg(long, env = "LOG_FORMAT", value_enum)]
    log_format: Option<LogFormat>,
}

impl Args {
    /// The single device described by flags; every identity flag is required
    fn single_device(&self) -> Result<AppConfig> {
        let (Some(name), Some(address), Some(username), Some(password)) = (
            self.name.as_deref().filter(|s| !s.is_empty()),
            self.address.as_deref().filter(|s| !s.is_empty()),
            self.username.as_deref().filter(|s| !s.is_empty()),
            self.password.as_deref().filter(|s| !s.is_empty()),
        ) else {
            bail!("missing required param for single device configuration: --name, --address, --username and --password");
        };

        let config = AppConfig::single_device(DeviceConfig {
            name: name.to_string(),
            address: address.to_string(),
            username: username.to_string(),
            password: password.to_string(),
            port: self.device_port,
            client: Some(ClientConfig {
                dial_timeout: self.timeout,
                enable_tls: self.enable_tls,
                insecure_tls_skip_verify: self.insecure_tls_skip_verify,
            }),
            ..DeviceConfig::default()
        });
        Ok(config)
    }

    fn load(&self) -> Result<AppConfig> {
        let mut config = match &self.config_file {
            Some(path) => load_config(path)
                .with_context(|| format!("could not load config from {}", path.display()))?,
            None => self.single_device()?,
        };

        if let Some(port) = self.port {
            config.server.port = port;
        }
        if let Some(path) = &self.path {
            config.server.metrics_path = path.clone();
        }
        if let Some(level) = self.log_level {
            config.log.level = level;
        }
        if let Some(format) = self.log_format {
            config.log.format = format;
        }

        config.validate().context("invalid configuration")?;
        Ok(config)
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let config = args.load()?;

    logging::init(config.log.level, config.log.format);
    info!("Starting mikrotik-exporter {}", VERSION);

    let registry = config.registry();
    info!("Scraping {} device(s)", registry.len());

    let scraper = Scraper::new(registry, config.shared_collectors())
        .report_resolve_step(config.report_resolve_step);
    let router = server::create_router(Arc::new(scraper), &config.server.metrics_path);

    server::serve(router, config.server.port)
        .await
        .context("server failed")?;
    Ok(())
}
