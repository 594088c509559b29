use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use crate::collector::FeatureCollector;

const DEFAULT_API_PORT: u16 = 8728;
const DEFAULT_API_PORT_TLS: u16 = 8729;

/// Default timeout for establishing a device connection
pub const DEFAULT_DIAL_TIMEOUT: Duration = Duration::from_secs(5);

/// Connection settings for the RouterOS API client
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientOptions {
    /// Bound on dialing and logging in; zero disables the bound
    pub dial_timeout: Duration,
    /// Connect with TLS (api-ssl service)
    pub enable_tls: bool,
    /// Accept any server certificate when TLS is enabled
    pub insecure_tls_skip_verify: bool,
}

impl Default for ClientOptions {
    fn default() -> Self {
        Self {
            dial_timeout: DEFAULT_DIAL_TIMEOUT,
            enable_tls: false,
            insecure_tls_skip_verify: false,
        }
    }
}

/// SRV record used to look up a device address at scrape time
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DnsRecord {
    /// SRV record name
    pub name: String,
    /// `host:port` of the DNS server; empty means the system resolver
    pub server_address: String,
}

/// A configured device. Never mutated after construction.
#[derive(Clone)]
pub struct Device {
    /// Unique name, exported as the `name`/`device` label
    pub name: String,
    /// IP or hostname; may be empty when a DNS record is configured
    pub address: String,
    /// API port; the default depends on whether TLS is enabled
    pub port: Option<u16>,
    pub username: String,
    pub password: String,
    pub client: ClientOptions,
    pub dns_record: Option<DnsRecord>,
    /// Collectors that run for this device only
    pub collectors: Vec<Arc<dyn FeatureCollector>>,
}

impl Device {
    /// A device with the given name and default settings
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            address: String::new(),
            port: None,
            username: String::new(),
            password: String::new(),
            client: ClientOptions::default(),
            dns_record: None,
            collectors: Vec::new(),
        }
    }

    /// The SRV record to resolve, if one with a non-empty name is configured
    pub fn dynamic_record(&self) -> Option<&DnsRecord> {
        self.dns_record.as_ref().filter(|r| !r.name.is_empty())
    }

    /// Shared collectors followed by this device's own, as a freshly owned list.
    ///
    /// A device collector whose name is already present is skipped, so a
    /// feature enabled at both levels runs once. Neither input is modified,
    /// so the same shared list can be combined with every device in the
    /// registry.
    pub fn effective_collectors(
        &self,
        shared: &[Arc<dyn FeatureCollector>],
    ) -> Vec<Arc<dyn FeatureCollector>> {
        let mut collectors: Vec<Arc<dyn FeatureCollector>> =
            Vec::with_capacity(shared.len() + self.collectors.len());
        let mut names = HashSet::with_capacity(collectors.capacity());

        for collector in shared.iter().chain(self.collectors.iter()) {
            if names.insert(collector.name()) {
                collectors.push(Arc::clone(collector));
            }
        }
        collectors
    }
}

impl fmt::Debug for Device {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Device")
            .field("name", &self.name)
            .field("address", &self.address)
            .field("port", &self.port)
            .field("username", &self.username)
            .field("client", &self.client)
            .field("dns_record", &self.dns_record)
            .field(
                "collectors",
                &self.collectors.iter().map(|c| c.name()).collect::<Vec<_>>(),
            )
            .finish_non_exhaustive()
    }
}

/// What one scrape cycle works on: a device plus the address in effect for
/// this cycle.
///
/// Resolution writes only here, so concurrent scrapes of the same registry
/// never observe each other's lookups.
#[derive(Debug, Clone)]
pub struct Target {
    device: Arc<Device>,
    address: String,
}

impl Target {
    /// Start from the device's configured address
    pub fn new(device: Arc<Device>) -> Self {
        let address = device.address.clone();
        Self { device, address }
    }

    /// Replace the address with a resolved one
    pub fn with_address(mut self, address: impl Into<String>) -> Self {
        self.address = address.into();
        self
    }

    pub fn device(&self) -> &Device {
        &self.device
    }

    pub fn name(&self) -> &str {
        &self.device.name
    }

    pub fn address(&self) -> &str {
        &self.address
    }

    /// Configured port, or the API default for the transport in use
    pub fn port(&self) -> u16 {
        self.device.port.unwrap_or(if self.device.client.enable_tls {
            DEFAULT_API_PORT_TLS
        } else {
            DEFAULT_API_PORT
        })
    }

    /// `host:port`, bracketing IPv6 literals
    pub fn socket_address(&self) -> String {
        if self.address.contains(':') && !self.address.starts_with('[') {
            format!("[{}]:{}", self.address, self.port())
        } else {
            format!("{}:{}", self.address, self.port())
        }
    }
}

/// The fixed set of devices scraped on every request
#[derive(Debug, Clone, Default)]
pub struct DeviceRegistry {
    devices: Arc<[Arc<Device>]>,
}

impl DeviceRegistry {
    pub fn new(devices: Vec<Device>) -> Self {
        Self {
            devices: devices.into_iter().map(Arc::new).collect(),
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = &Arc<Device>> {
        self.devices.iter()
    }

    pub fn len(&self) -> usize {
        self.devices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.devices.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collector::{ScrapeContext, FeatureCollector};
    use crate::error::Result;
    use crate::metrics::MetricDescription;
    use async_trait::async_trait;

    struct Named(&'static str);

    #[async_trait]
    impl FeatureCollector for Named {
        fn name(&self) -> &str {
            self.0
        }

        fn describe(&self, _descs: &mut Vec<Arc<MetricDescription>>) {}

        async fn collect(&self, _ctx: &ScrapeContext) -> Result<()> {
            Ok(())
        }
    }

    #[test]
    fn test_effective_collectors_do_not_alias_shared_list() {
        let mut shared: Vec<Arc<dyn FeatureCollector>> = Vec::with_capacity(8);
        shared.push(Arc::new(Named("interface")));

        let device_a = Device {
            collectors: vec![Arc::new(Named("bgp_session"))],
            ..Device::new("a")
        };
        let device_b = Device::new("b");

        let before_b = device_b.effective_collectors(&shared).len();
        let set_a = device_a.effective_collectors(&shared);
        let set_b = device_b.effective_collectors(&shared);

        assert_eq!(set_a.len(), 2);
        assert_eq!(set_b.len(), before_b);
        assert_eq!(set_b.len(), 1);
        assert_eq!(shared.len(), 1);
        assert_eq!(set_b[0].name(), "interface");
    }

    #[test]
    fn test_collector_enabled_twice_runs_once() {
        let shared: Vec<Arc<dyn FeatureCollector>> = vec![
            Arc::new(Named("wlan_station")),
            Arc::new(Named("interface")),
        ];
        let device = Device {
            collectors: vec![Arc::new(Named("wlan_station")), Arc::new(Named("bgp_session"))],
            ..Device::new("r1")
        };

        let names: Vec<_> = device
            .effective_collectors(&shared)
            .iter()
            .map(|c| c.name().to_string())
            .collect();
        assert_eq!(names, vec!["wlan_station", "interface", "bgp_session"]);
        assert_eq!(device.collectors.len(), 2);
    }

    #[test]
    fn test_target_address_is_independent_of_device() {
        let device = Arc::new(Device {
            address: "192.168.88.1".to_string(),
            ..Device::new("r1")
        });

        let resolved = Target::new(Arc::clone(&device)).with_address("10.0.0.1");
        assert_eq!(resolved.address(), "10.0.0.1");
        assert_eq!(device.address, "192.168.88.1");
        assert_eq!(Target::new(device).address(), "192.168.88.1");
    }

    #[test]
    fn test_default_ports() {
        let plain = Target::new(Arc::new(Device {
            address: "10.0.0.1".to_string(),
            ..Device::new("r1")
        }));
        assert_eq!(plain.socket_address(), "10.0.0.1:8728");

        let tls = Target::new(Arc::new(Device {
            address: "fe80::1".to_string(),
            client: ClientOptions {
                enable_tls: true,
                ..ClientOptions::default()
            },
            ..Device::new("r2")
        }));
        assert_eq!(tls.socket_address(), "[fe80::1]:8729");
    }

    #[test]
    fn test_empty_record_name_is_not_dynamic() {
        let device = Device {
            dns_record: Some(DnsRecord {
                name: String::new(),
                server_address: "1.1.1.1:53".to_string(),
            }),
            ..Device::new("r1")
        };
        assert!(device.dynamic_record().is_none());
    }
}
