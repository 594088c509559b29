//! Scrape orchestration.
//!
//! One scrape visits every registered device concurrently. For each device the
//! address is resolved if it comes from an SRV record, a connection is opened,
//! and every effective collector runs concurrently over that connection. Each
//! attempted step reports a [`telemetry::StepOutcome`] alongside the feature
//! samples the collectors emit.
pub mod telemetry;

use log::{debug, error, warn};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tokio::task::{Id, JoinSet};

use crate::collector::{FeatureCollector, ScrapeContext};
use crate::connection::{Connection, Connector, RouterOsConnector};
use crate::device::{Device, DeviceRegistry, Target};
use crate::dns::{Resolver, SrvResolver};
use crate::metrics::{MetricDescription, MetricSink};

use self::telemetry::{Step, StepTimer};

/// Runs scrape cycles over a fixed device registry
pub struct Scraper {
    registry: DeviceRegistry,
    collectors: Arc<[Arc<dyn FeatureCollector>]>,
    connector: Arc<dyn Connector>,
    resolver: Arc<dyn Resolver>,
    report_resolve_step: bool,
}

impl Scraper {
    /// A scraper dialing devices over the RouterOS API and resolving SRV
    /// records with the system or configured DNS server.
    ///
    /// `collectors` run for every device, before each device's own.
    pub fn new(registry: DeviceRegistry, collectors: Vec<Arc<dyn FeatureCollector>>) -> Self {
        Self {
            registry,
            collectors: collectors.into(),
            connector: Arc::new(RouterOsConnector::new()),
            resolver: Arc::new(SrvResolver::new()),
            report_resolve_step: false,
        }
    }

    pub fn with_connector(mut self, connector: impl Connector) -> Self {
        self.connector = Arc::new(connector);
        self
    }

    pub fn with_resolver(mut self, resolver: impl Resolver) -> Self {
        self.resolver = Arc::new(resolver);
        self
    }

    /// Emit a `resolve` step outcome for devices with an SRV record
    pub fn report_resolve_step(mut self, enabled: bool) -> Self {
        self.report_resolve_step = enabled;
        self
    }

    pub fn registry(&self) -> &DeviceRegistry {
        &self.registry
    }

    /// Push the telemetry descriptions and those of every collector any device
    /// may run, each collector once
    pub fn describe(&self, descs: &mut Vec<Arc<MetricDescription>>) {
        telemetry::describe(descs);

        let mut seen = HashSet::new();
        let device_collectors = self.registry.iter().flat_map(|d| d.collectors.iter());
        for collector in self.collectors.iter().chain(device_collectors) {
            if seen.insert(collector.name().to_string()) {
                collector.describe(descs);
            }
        }
    }

    /// Scrape every device once, sending all samples to `sink`.
    ///
    /// Returns when every device has finished. Failures are reported as step
    /// outcomes and logged; they never abort other devices.
    pub async fn scrape(&self, sink: MetricSink) {
        let mut devices = JoinSet::new();

        for device in self.registry.iter() {
            let Some(target) = self.resolve_target(device, &sink).await else {
                continue;
            };

            let collectors = device.effective_collectors(&self.collectors);
            let connector = Arc::clone(&self.connector);
            let sink = sink.clone();
            devices.spawn(scrape_device(connector, target, collectors, sink));
        }

        while let Some(joined) = devices.join_next().await {
            if let Err(e) = joined {
                error!("Device scrape task failed: {}", e);
            }
        }
    }

    /// The target for this cycle, or `None` when its address lookup failed
    async fn resolve_target(&self, device: &Arc<Device>, sink: &MetricSink) -> Option<Target> {
        let target = Target::new(Arc::clone(device));
        let Some(record) = device.dynamic_record() else {
            return Some(target);
        };

        let timer = StepTimer::start();
        match self.resolver.resolve(&record.name, &record.server_address).await {
            Ok(address) => {
                debug!("Resolved device address device={} address={}", device.name, address);
                if self.report_resolve_step {
                    timer.report(sink, &device.name, Step::Resolve, true);
                }
                Some(target.with_address(address))
            }
            Err(e) => {
                error!(
                    "Failed to resolve device address device={} record={} error={}",
                    device.name, record.name, e
                );
                if self.report_resolve_step {
                    timer.report(sink, &device.name, Step::Resolve, false);
                }
                None
            }
        }
    }
}

/// Connect to one device, run its collectors and release the connection
async fn scrape_device(
    connector: Arc<dyn Connector>,
    target: Target,
    collectors: Vec<Arc<dyn FeatureCollector>>,
    sink: MetricSink,
) {
    let timer = StepTimer::start();
    let guard = match connector.connect(&target).await {
        Ok(connection) => {
            timer.report(&sink, target.name(), Step::Connect, true);
            ConnectionGuard::new(Arc::from(connection))
        }
        Err(e) => {
            error!(
                "Failed to connect to device device={} address={} error={}",
                target.name(),
                target.address(),
                e
            );
            timer.report(&sink, target.name(), Step::Connect, false);
            return;
        }
    };

    let ctx = Arc::new(ScrapeContext::new(
        guard.connection(),
        target.name(),
        target.address(),
        sink.clone(),
    ));

    let timer = StepTimer::start();
    run_collectors(&ctx, collectors).await;
    timer.report(&sink, target.name(), Step::Collect, true);

    // every collector task has been joined, so nothing else uses the connection
    drop(ctx);
    guard.close().await;
}

/// Run every collector in its own task over the shared context and report one
/// outcome per collector. Returns once all of them have been joined.
async fn run_collectors(ctx: &Arc<ScrapeContext>, collectors: Vec<Arc<dyn FeatureCollector>>) {
    let mut tasks = JoinSet::new();
    let mut running: HashMap<Id, (String, StepTimer)> = HashMap::with_capacity(collectors.len());

    for collector in collectors {
        let name = collector.name().to_string();
        let timer = StepTimer::start();
        let task_ctx = Arc::clone(ctx);

        let handle = tasks.spawn(async move {
            let result = collector.collect(&task_ctx).await;
            if let Err(e) = &result {
                error!(
                    "Collector failed device={} collector={} error={}",
                    task_ctx.device_name(),
                    collector.name(),
                    e
                );
            }
            timer.report(
                task_ctx.sink(),
                task_ctx.device_name(),
                Step::Collector(collector.name().to_string()),
                result.is_ok(),
            );
        });
        running.insert(handle.id(), (name, timer));
    }

    while let Some(joined) = tasks.join_next_with_id().await {
        let e = match joined {
            Ok((id, ())) => {
                running.remove(&id);
                continue;
            }
            Err(e) => e,
        };

        // a task that did not finish never reported its own outcome
        let Some((name, timer)) = running.remove(&e.id()) else {
            warn!("Collector task failed device={} error={}", ctx.device_name(), e);
            continue;
        };
        error!(
            "Collector task failed device={} collector={} error={}",
            ctx.device_name(),
            name,
            e
        );
        timer.report(ctx.sink(), ctx.device_name(), Step::Collector(name), false);
    }
}

/// Owns a device connection for the device task and closes it when the task
/// ends, including when the task is aborted mid-scrape
struct ConnectionGuard {
    connection: Arc<dyn Connection>,
    closed: bool,
}

impl ConnectionGuard {
    fn new(connection: Arc<dyn Connection>) -> Self {
        Self {
            connection,
            closed: false,
        }
    }

    fn connection(&self) -> Arc<dyn Connection> {
        Arc::clone(&self.connection)
    }

    async fn close(mut self) {
        self.closed = true;
        self.connection.close().await;
    }
}

impl Drop for ConnectionGuard {
    fn drop(&mut self) {
        if self.closed {
            return;
        }
        // close is async; hand it to the runtime when dropped without `close`
        let connection = Arc::clone(&self.connection);
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                handle.spawn(async move { connection.close().await });
            }
            Err(_) => debug!("No runtime to close abandoned device connection"),
        }
    }
}
