//! SRV-based device address lookup
use async_trait::async_trait;
use hickory_resolver::TokioAsyncResolver;
use hickory_resolver::config::{NameServerConfigGroup, ResolverConfig, ResolverOpts};
use log::debug;
use std::net::{IpAddr, SocketAddr};

use crate::error::{ExporterError, Result};

const DEFAULT_DNS_PORT: u16 = 53;

/// Turns a dynamic-address descriptor into a host or IP
#[async_trait]
pub trait Resolver: Send + Sync + 'static {
    /// Resolve `record_name`, querying `server_address` (`host:port`) or the
    /// system resolver when it is empty
    async fn resolve(&self, record_name: &str, server_address: &str) -> Result<String>;
}

/// Looks up the target of an SRV record
#[derive(Debug, Default, Clone)]
pub struct SrvResolver;

impl SrvResolver {
    pub fn new() -> Self {
        Self
    }

    fn resolver_for(server_address: &str) -> Result<TokioAsyncResolver> {
        if server_address.is_empty() {
            return TokioAsyncResolver::tokio_from_system_conf().map_err(|e| {
                ExporterError::Resolve(format!("failed to create dns client config: {}", e))
            });
        }

        let server = parse_server_address(server_address)?;
        let group = NameServerConfigGroup::from_ips_clear(&[server.ip()], server.port(), true);
        Ok(TokioAsyncResolver::tokio(
            ResolverConfig::from_parts(None, vec![], group),
            ResolverOpts::default(),
        ))
    }
}

#[async_trait]
impl Resolver for SrvResolver {
    async fn resolve(&self, record_name: &str, server_address: &str) -> Result<String> {
        let resolver = Self::resolver_for(server_address)?;
        let fqdn = if record_name.ends_with('.') {
            record_name.to_string()
        } else {
            format!("{}.", record_name)
        };

        let lookup = resolver
            .srv_lookup(fqdn.as_str())
            .await
            .map_err(|e| ExporterError::Resolve(format!("failed to lookup dns record: {}", e)))?;

        let target = lookup
            .iter()
            .next()
            .map(|srv| trim_target(&srv.target().to_utf8()))
            .ok_or_else(|| ExporterError::Resolve("resource record not found".to_string()))?;

        debug!("Resolved {} to {}", record_name, target);
        Ok(target)
    }
}

/// Accept `ip:port`, `[ipv6]:port` or a bare IP with the default DNS port
fn parse_server_address(server_address: &str) -> Result<SocketAddr> {
    if let Ok(addr) = server_address.parse::<SocketAddr>() {
        return Ok(addr);
    }

    server_address
        .parse::<IpAddr>()
        .map(|ip| SocketAddr::new(ip, DEFAULT_DNS_PORT))
        .map_err(|_| {
            ExporterError::Resolve(format!("invalid dns server address {:?}", server_address))
        })
}

fn trim_target(target: &str) -> String {
    target.trim_end_matches('.').to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_server_address_forms() {
        assert_eq!(
            parse_server_address("1.1.1.1:5353").unwrap(),
            "1.1.1.1:5353".parse::<SocketAddr>().unwrap()
        );
        assert_eq!(parse_server_address("1.1.1.1").unwrap().port(), 53);
        assert_eq!(parse_server_address("[::1]:53").unwrap().port(), 53);
        assert!(parse_server_address("dns.example.com:53").is_err());
    }

    #[test]
    fn test_trim_target() {
        assert_eq!(trim_target("router1.example.com."), "router1.example.com");
        assert_eq!(trim_target("router1"), "router1");
    }

    #[tokio::test]
    async fn test_invalid_server_fails_before_querying() {
        let err = SrvResolver::new()
            .resolve("_api._tcp.example.com", "not-an-address")
            .await
            .unwrap_err();
        assert!(matches!(err, ExporterError::Resolve(_)));
    }
}
