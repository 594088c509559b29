mod bgp;
mod conntrack;
mod core;
mod dhcp;
mod firmware;
mod health;
mod interface;
mod ip_pool;
mod netwatch;
mod resource;
mod routes;
mod wlan_stations;

use std::sync::Arc;

use crate::config::Features;

// Re-export public items
pub use self::core::{DEVICE_LABELS, FeatureCollector, ScrapeContext, parse_float};
pub use bgp::BgpCollector;
pub use conntrack::ConntrackCollector;
pub use dhcp::DhcpLeaseCollector;
pub use firmware::FirmwareCollector;
pub use health::HealthCollector;
pub use interface::InterfaceCollector;
pub use ip_pool::IpPoolCollector;
pub use netwatch::NetwatchCollector;
pub use resource::ResourceCollector;
pub use routes::RoutesCollector;
pub use wlan_stations::WlanStationsCollector;

/// Collectors every device gets regardless of feature flags
pub fn default_collectors() -> Vec<Arc<dyn FeatureCollector>> {
    vec![
        Arc::new(InterfaceCollector::new()),
        Arc::new(ResourceCollector::new()),
    ]
}

/// Collectors switched on by a set of feature flags
pub fn build_collectors(features: &Features) -> Vec<Arc<dyn FeatureCollector>> {
    let mut collectors: Vec<Arc<dyn FeatureCollector>> = Vec::new();

    if features.bgp {
        collectors.push(Arc::new(BgpCollector::new()));
    }
    if features.routes {
        collectors.push(Arc::new(RoutesCollector::new()));
    }
    if features.dhcp {
        collectors.push(Arc::new(DhcpLeaseCollector::new()));
    }
    if features.firmware {
        collectors.push(Arc::new(FirmwareCollector::new()));
    }
    if features.health {
        collectors.push(Arc::new(HealthCollector::new()));
    }
    if features.ip_pools {
        collectors.push(Arc::new(IpPoolCollector::new()));
    }
    if features.wlan_stations {
        collectors.push(Arc::new(WlanStationsCollector::new()));
    }
    if features.netwatch {
        collectors.push(Arc::new(NetwatchCollector::new()));
    }
    if features.conntrack {
        collectors.push(Arc::new(ConntrackCollector::new()));
    }

    collectors
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_collectors_follows_flags() {
        let none = build_collectors(&Features::default());
        assert!(none.is_empty());

        let features = Features {
            bgp: true,
            wlan_stations: true,
            ..Features::default()
        };
        let names: Vec<_> = build_collectors(&features)
            .iter()
            .map(|c| c.name().to_string())
            .collect();
        assert_eq!(names, vec!["bgp_session", "wlan_station"]);
    }

    #[test]
    fn test_collector_names_are_unique() {
        let all = Features {
            health: true,
            bgp: true,
            wlan_stations: true,
            routes: true,
            dhcp: true,
            firmware: true,
            ip_pools: true,
            netwatch: true,
            conntrack: true,
        };
        let mut names: Vec<_> = default_collectors()
            .into_iter()
            .chain(build_collectors(&all))
            .map(|c| c.name().to_string())
            .collect();
        let total = names.len();
        assert_eq!(total, 11);
        names.sort();
        names.dedup();
        assert_eq!(names.len(), total);
    }
}
