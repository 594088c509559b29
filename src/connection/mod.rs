//! Device connections: the command channel collectors talk through, and the
//! provider that dials it.
use async_trait::async_trait;
use log::debug;
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::time::timeout;

use crate::device::Target;
use crate::error::{ExporterError, Result};
use crate::routeros::{Client, Reply};

/// A live command channel to one device
#[async_trait]
pub trait Connection: Send + Sync + 'static {
    /// Run one API command and return its complete reply
    async fn run(&self, words: &[String]) -> Result<Reply>;

    /// Release the channel. Calling it more than once is harmless.
    async fn close(&self);
}

/// Produces connections for scrape targets
#[async_trait]
pub trait Connector: Send + Sync + 'static {
    async fn connect(&self, target: &Target) -> Result<Box<dyn Connection>>;
}

#[async_trait]
impl Connection for Client {
    async fn run(&self, words: &[String]) -> Result<Reply> {
        Client::run(self, words).await
    }

    async fn close(&self) {
        Client::close(self).await
    }
}

/// Dials devices over the RouterOS API, with or without TLS
#[derive(Debug, Default, Clone)]
pub struct RouterOsConnector;

impl RouterOsConnector {
    pub fn new() -> Self {
        Self
    }

    async fn dial(&self, target: &Target) -> Result<Client> {
        let device = target.device();
        let addr = target.socket_address();
        debug!("Dialing device {} at {}", device.name, addr);

        let tcp = TcpStream::connect(&addr).await.map_err(|e| {
            ExporterError::Connection(format!("failed to connect to {}: {}", addr, e))
        })?;

        let client = if device.client.enable_tls {
            let connector = native_tls::TlsConnector::builder()
                .danger_accept_invalid_certs(device.client.insecure_tls_skip_verify)
                .build()?;
            let connector = tokio_native_tls::TlsConnector::from(connector);
            let tls = connector.connect(target.address(), tcp).await?;
            Client::new(tls)
        } else {
            Client::new(tcp)
        };

        client.login(&device.username, &device.password).await?;
        Ok(client)
    }
}

#[async_trait]
impl Connector for RouterOsConnector {
    async fn connect(&self, target: &Target) -> Result<Box<dyn Connection>> {
        let dial_timeout = target.device().client.dial_timeout;

        let client = if dial_timeout.is_zero() {
            self.dial(target).await?
        } else {
            with_timeout(dial_timeout, self.dial(target)).await?
        };

        Ok(Box::new(client))
    }
}

async fn with_timeout<T>(limit: Duration, fut: impl Future<Output = Result<T>>) -> Result<T> {
    match timeout(limit, fut).await {
        Ok(result) => result,
        Err(_) => Err(ExporterError::Timeout(limit)),
    }
}
