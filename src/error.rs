use std::path::PathBuf;
use thiserror::Error;

/// A single connection attempt failed. Callers never distinguish the cause.
#[derive(Error, Debug)]
#[error("connection to {address}:{port} failed: {reason}")]
pub struct ConnectError {
    pub address: String,
    pub port: u16,
    pub reason: String,
}

impl ConnectError {
    pub(crate) fn new(address: &str, port: u16, reason: impl Into<String>) -> Self {
        Self {
            address: address.to_string(),
            port,
            reason: reason.into(),
        }
    }
}

/// Failures while expanding user supplied targets. None of these abort a scan.
#[derive(Error, Debug)]
pub enum TargetError {
    #[error("could not resolve hostname: {host}")]
    Resolution {
        host: String,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid CIDR notation: {input}")]
    InvalidCidr {
        input: String,
        #[source]
        source: ipnet::AddrParseError,
    },

    #[error("could not read file: {}", path.display())]
    FileUnreadable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Failures loading a version table override file.
#[derive(Error, Debug)]
pub enum TablesError {
    #[error("could not read version tables from {}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed version tables in {}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}
