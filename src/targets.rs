use crate::error::TargetError;
use ipnet::IpNet;
use std::collections::HashSet;
use std::fs;
use std::net::IpAddr;
use std::path::Path;
use tokio::net::lookup_host;
use tracing::{debug, warn};
use trust_dns_resolver::TokioAsyncResolver;

/// Upper bound on addresses taken from one CIDR block.
pub const MAX_HOSTS_PER_BLOCK: usize = 1 << 20;

/// Expand a CIDR block into its host addresses.
///
/// Network and broadcast addresses are excluded for IPv4 blocks up to /30;
/// /31 and /32 yield every address.
pub fn expand_cidr(net: IpNet) -> Vec<IpAddr> {
    let too_large = match net {
        IpNet::V4(n) => n.prefix_len() < 12,
        IpNet::V6(n) => n.prefix_len() < 108,
    };
    if too_large {
        warn!("network {net} is too large, only the first {MAX_HOSTS_PER_BLOCK} hosts are scanned");
    }
    net.hosts().take(MAX_HOSTS_PER_BLOCK).collect()
}

/// Parse `input` as CIDR notation and expand it.
pub fn expand_cidr_str(input: &str) -> Result<Vec<String>, TargetError> {
    let trimmed = input.trim();
    let net: IpNet = trimmed.parse().map_err(|source| TargetError::InvalidCidr {
        input: trimmed.to_string(),
        source,
    })?;
    Ok(expand_cidr(net).into_iter().map(|ip| ip.to_string()).collect())
}

/// Resolve a hostname to every address it has.
pub async fn resolve_hostname(host: &str) -> Result<Vec<String>, TargetError> {
    let addrs = lookup_host((host, 0))
        .await
        .map_err(|source| TargetError::Resolution {
            host: host.to_string(),
            source,
        })?;
    unique_addresses(host, addrs.map(|sa| sa.ip()))
}

/// Deduplicate resolved addresses; an empty answer is a resolution failure.
fn unique_addresses(
    host: &str,
    addrs: impl Iterator<Item = IpAddr>,
) -> Result<Vec<String>, TargetError> {
    let mut seen = HashSet::new();
    let out: Vec<String> = addrs
        .map(|ip| ip.to_string())
        .filter(|ip| seen.insert(ip.clone()))
        .collect();
    if out.is_empty() {
        return Err(TargetError::Resolution {
            host: host.to_string(),
            source: std::io::Error::new(std::io::ErrorKind::NotFound, "no addresses returned"),
        });
    }
    Ok(out)
}

/// Expand one non-file input: CIDR block, IP literal, or hostname.
async fn expand_entry(input: &str) -> Result<Vec<String>, TargetError> {
    if input.contains('/') {
        return expand_cidr_str(input);
    }
    if let Ok(ip) = input.parse::<IpAddr>() {
        return Ok(vec![ip.to_string()]);
    }
    resolve_hostname(input).await
}

/// Expand every line of a target list file.
///
/// Blank lines and `#` comments are skipped. A bad line is logged and
/// skipped; only an unreadable file is an error.
pub async fn expand_file(path: impl AsRef<Path>) -> Result<Vec<String>, TargetError> {
    let path = path.as_ref();
    let content = fs::read_to_string(path).map_err(|source| TargetError::FileUnreadable {
        path: path.to_path_buf(),
        source,
    })?;

    let mut out = Vec::new();
    for (idx, raw_line) in content.lines().enumerate() {
        let line = raw_line.split('#').next().map(str::trim).unwrap_or("");
        if line.is_empty() {
            continue;
        }
        match expand_entry(line).await {
            Ok(addrs) => out.extend(addrs),
            Err(e) => warn!("{}:{}: {e}", path.display(), idx + 1),
        }
    }
    Ok(out)
}

/// Expand a single command line target.
///
/// An existing file is read as a target list; anything else is treated as a
/// CIDR block, an IP literal, or a hostname.
pub async fn expand_target(input: &str) -> Result<Vec<String>, TargetError> {
    let trimmed = input.trim();
    if Path::new(trimmed).is_file() {
        return expand_file(trimmed).await;
    }
    expand_entry(trimmed).await
}

/// Union of all positional targets and the optional list file, in first-seen order.
///
/// Failures are logged as warnings and contribute no addresses.
pub async fn collect_targets(positional: &[String], list: Option<&Path>) -> Vec<String> {
    let mut seen = HashSet::new();
    let mut out = Vec::new();
    let mut push_all = |addrs: Vec<String>| {
        for a in addrs {
            if seen.insert(a.clone()) {
                out.push(a);
            }
        }
    };

    if let Some(path) = list {
        match expand_file(path).await {
            Ok(addrs) => push_all(addrs),
            Err(e) => warn!("{e}"),
        }
    }

    for input in positional {
        match expand_target(input).await {
            Ok(addrs) => push_all(addrs),
            Err(e) => warn!("{e}"),
        }
    }

    out
}

/// Reverse DNS lookups for display names.
#[derive(Clone)]
pub struct ReverseResolver {
    resolver: TokioAsyncResolver,
}

impl ReverseResolver {
    /// Use the system resolver configuration, or the library defaults if it cannot be read.
    pub fn new() -> Self {
        let resolver = TokioAsyncResolver::tokio_from_system_conf().unwrap_or_else(|e| {
            debug!("system resolver config unavailable ({e}), using defaults");
            TokioAsyncResolver::tokio(Default::default(), Default::default())
        });
        Self { resolver }
    }

    /// First PTR name for `address`, without the trailing dot.
    pub async fn lookup(&self, address: &str) -> Option<String> {
        let ip: IpAddr = address.parse().ok()?;
        match self.resolver.reverse_lookup(ip).await {
            Ok(names) => names
                .iter()
                .next()
                .map(|name| name.to_string().trim_end_matches('.').to_string()),
            Err(e) => {
                debug!("reverse lookup for {address} failed: {e}");
                None
            }
        }
    }
}

impl Default for ReverseResolver {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::Ipv4Addr;

    #[test]
    fn expand_small_cidr_excludes_network_and_broadcast() {
        let net: IpNet = "192.168.1.0/30".parse().unwrap();
        assert_eq!(
            expand_cidr(net),
            vec![
                IpAddr::V4(Ipv4Addr::new(192, 168, 1, 1)),
                IpAddr::V4(Ipv4Addr::new(192, 168, 1, 2)),
            ]
        );
    }

    #[test]
    fn single_host_block_yields_itself() {
        assert_eq!(expand_cidr_str("10.9.8.7/32").unwrap(), vec!["10.9.8.7"]);
    }

    #[test]
    fn non_canonical_block_is_accepted() {
        // host bits set: 10.0.0.5/30 is the 10.0.0.4/30 block
        let hosts = expand_cidr_str("10.0.0.5/30").unwrap();
        assert_eq!(hosts, vec!["10.0.0.5", "10.0.0.6"]);
    }

    #[test]
    fn invalid_cidr_is_reported() {
        let err = expand_cidr_str("10.0.0.0/33").unwrap_err();
        assert!(matches!(err, TargetError::InvalidCidr { .. }));
    }

    #[test]
    fn empty_lookup_answer_is_resolution_error() {
        let err = unique_addresses("ghost.invalid", std::iter::empty()).unwrap_err();
        assert!(matches!(err, TargetError::Resolution { ref host, .. } if host == "ghost.invalid"));
    }

    #[test]
    fn resolved_addresses_are_deduplicated() {
        let v4 = IpAddr::V4(Ipv4Addr::new(192, 0, 2, 1));
        let v6: IpAddr = "2001:db8::1".parse().unwrap();
        let out = unique_addresses("dual.example", [v4, v6, v4].into_iter()).unwrap();
        assert_eq!(out, vec!["192.0.2.1", "2001:db8::1"]);
    }

    #[tokio::test]
    async fn reverse_lookup_of_non_address_is_none() {
        let resolver = ReverseResolver::new();
        assert_eq!(resolver.lookup("not-an-ip").await, None);
        assert_eq!(resolver.lookup("").await, None);
    }

    #[tokio::test]
    async fn literals_pass_through() {
        assert_eq!(expand_target("192.0.2.10").await.unwrap(), vec!["192.0.2.10"]);
        assert_eq!(expand_target(" ::1 ").await.unwrap(), vec!["::1"]);
    }
}
