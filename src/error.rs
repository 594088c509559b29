// src/error.rs
use std::io;
use std::time::Duration;
use thiserror::Error;

/// Result type used throughout the exporter library
pub type Result<T> = std::result::Result<T, ExporterError>;

/// Custom Error type for the exporter
#[derive(Error, Debug)]
pub enum ExporterError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("Config error: {0}")]
    Config(String),

    #[error("Connection error: {0}")]
    Connection(String),

    #[error("Timed out after {0:?}")]
    Timeout(Duration),

    #[error("TLS error: {0}")]
    Tls(String),

    #[error("Protocol error: {0}")]
    Protocol(String),

    #[error("Device returned an error: {0}")]
    Trap(String),

    #[error("Device closed the session: {0}")]
    Fatal(String),

    #[error("Address resolution error: {0}")]
    Resolve(String),

    #[error("Collection error: {0}")]
    Collection(String),

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Encode error: {0}")]
    Encode(String),
}

impl ExporterError {
    /// Wrap an error raised while a collector was fetching from a device
    pub fn collection(collector: &str, err: impl std::fmt::Display) -> Self {
        ExporterError::Collection(format!("failed to fetch {} metrics: {}", collector, err))
    }
}

impl From<native_tls::Error> for ExporterError {
    fn from(err: native_tls::Error) -> Self {
        ExporterError::Tls(err.to_string())
    }
}

impl From<prometheus::Error> for ExporterError {
    fn from(err: prometheus::Error) -> Self {
        ExporterError::Encode(err.to_string())
    }
}

impl From<config::ConfigError> for ExporterError {
    fn from(err: config::ConfigError) -> Self {
        ExporterError::Config(err.to_string())
    }
}
