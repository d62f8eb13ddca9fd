use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

/// An address string (IPv4, IPv6 or hostname) and the port to probe on it.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, Hash)]
pub struct Target {
    pub address: String,
    pub port: u16,
}

impl Target {
    pub fn new(address: impl Into<String>, port: u16) -> Self {
        Self {
            address: address.into(),
            port,
        }
    }
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.address.contains(':') {
            write!(f, "[{}]:{}", self.address, self.port)
        } else {
            write!(f, "{}:{}", self.address, self.port)
        }
    }
}

/// Everything one probing task needs. One task per (target, port) pair.
#[derive(Debug, Clone)]
pub struct ProbeTask {
    pub target: Target,
    pub timeout: Duration,
    /// `None` disables the LoginGraceTime probe.
    pub grace_period: Option<Duration>,
    pub use_help_request: bool,
    pub dns_resolve: bool,
}

/// Final classification of one probed target/port pair.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Verdict {
    ClosedPort,
    BannerRetrievalFailed,
    UnknownService,
    Vulnerable,
    NotVulnerable,
    LikelyNotVulnerable,
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Verdict::ClosedPort => "closed",
            Verdict::BannerRetrievalFailed => "failed",
            Verdict::UnknownService => "unknown",
            Verdict::Vulnerable => "vulnerable",
            Verdict::NotVulnerable => "not_vulnerable",
            Verdict::LikelyNotVulnerable => "likely_not_vulnerable",
        };
        f.write_str(s)
    }
}

/// Outcome of one probing task.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct ProbeResult {
    pub address: String,
    pub port: u16,
    pub verdict: Verdict,
    pub detail: String,
    pub display_name: Option<String>,
    pub banner: Option<String>,
    pub timestamp: String,
}

impl ProbeResult {
    pub fn target(&self) -> Target {
        Target::new(self.address.clone(), self.port)
    }
}
