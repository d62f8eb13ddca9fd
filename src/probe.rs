//! Network side of a check: connect, grab the greeting, and time the
//! server's unauthenticated session cutoff.

use crate::error::ConnectError;
use crate::types::Target;
use std::io;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr};
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{lookup_host, TcpStream};
use tokio::time::{self, Instant};

/// Bytes read per greeting.
pub const BANNER_BUF_LEN: usize = 1024;

/// Sent when the server stays silent and the fallback is enabled.
pub const FALLBACK_REQUEST: &[u8] = b"HELP\n";

/// Added to the configured grace time before the probe gives up waiting.
pub const GRACE_MARGIN: Duration = Duration::from_secs(4);

/// Open one TCP connection with `timeout` bounding resolution and establishment.
///
/// A colon in `address` means IPv6, otherwise IPv4; anything that parses as
/// neither is looked up as a hostname and the first address is used.
pub async fn connect(address: &str, port: u16, timeout: Duration) -> Result<TcpStream, ConnectError> {
    match time::timeout(timeout, connect_inner(address, port)).await {
        Ok(Ok(stream)) => Ok(stream),
        Ok(Err(e)) => Err(ConnectError::new(address, port, e.to_string())),
        Err(_) => Err(ConnectError::new(address, port, "timed out")),
    }
}

async fn connect_inner(address: &str, port: u16) -> io::Result<TcpStream> {
    let addr = socket_addr_for(address, port).await?;
    TcpStream::connect(addr).await
}

async fn socket_addr_for(address: &str, port: u16) -> io::Result<SocketAddr> {
    let host = address.trim();
    let parsed: Option<IpAddr> = if host.contains(':') {
        host.trim_matches(|c| c == '[' || c == ']')
            .parse::<Ipv6Addr>()
            .ok()
            .map(IpAddr::V6)
    } else {
        host.parse::<Ipv4Addr>().ok().map(IpAddr::V4)
    };
    if let Some(ip) = parsed {
        return Ok(SocketAddr::new(ip, port));
    }
    lookup_host((host, port))
        .await?
        .next()
        .ok_or_else(|| io::Error::new(io::ErrorKind::NotFound, "no addresses found"))
}

/// Read the protocol greeting, consuming the connection.
///
/// Never fails: a read error is returned as its own text, which the
/// classifier later rejects as a missing banner.
pub async fn read_banner(mut stream: TcpStream, use_fallback: bool, timeout: Duration) -> String {
    match read_banner_inner(&mut stream, use_fallback, timeout).await {
        Ok(banner) => banner,
        Err(e) => io_error_text(&e),
    }
}

async fn read_banner_inner(
    stream: &mut TcpStream,
    use_fallback: bool,
    timeout: Duration,
) -> io::Result<String> {
    let banner = read_text(stream, timeout).await?;
    if !banner.is_empty() || !use_fallback {
        return Ok(banner);
    }
    stream.write_all(FALLBACK_REQUEST).await?;
    read_text(stream, timeout).await
}

/// One bounded read, decoded lossily and trimmed.
async fn read_text(stream: &mut TcpStream, timeout: Duration) -> io::Result<String> {
    let mut buf = vec![0u8; BANNER_BUF_LEN];
    let n = time::timeout(timeout, stream.read(&mut buf))
        .await
        .map_err(|_| io::Error::new(io::ErrorKind::TimedOut, "timed out"))??;
    buf.truncate(n);
    Ok(String::from_utf8_lossy(&buf).trim().to_string())
}

fn io_error_text(e: &io::Error) -> String {
    match e.kind() {
        io::ErrorKind::TimedOut => "timed out".to_string(),
        _ => e.to_string(),
    }
}

/// What the server did with an idle unauthenticated session.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum GraceOutcome {
    /// The server sent data or closed the session before the deadline.
    SessionClosed { elapsed: Duration },
    /// Nothing happened within `grace + margin`.
    TimedOut,
}

/// Re-connect to `target` and observe whether the session is cut off within
/// the grace window.
///
/// The wait deadline is `grace - elapsed + 4s`, measured from just before the
/// greeting is discarded.
pub async fn probe_grace_period(
    target: &Target,
    grace: Duration,
    connect_timeout: Duration,
) -> Result<GraceOutcome, ConnectError> {
    probe_grace_period_with_margin(target, grace, connect_timeout, GRACE_MARGIN).await
}

pub(crate) async fn probe_grace_period_with_margin(
    target: &Target,
    grace: Duration,
    connect_timeout: Duration,
    margin: Duration,
) -> Result<GraceOutcome, ConnectError> {
    let mut stream = connect(&target.address, target.port, connect_timeout).await?;
    let start = Instant::now();

    // Greeting is ignored; a silent server just eats into the window.
    let _ = read_text(&mut stream, connect_timeout).await;

    let wait = grace_wait(grace, margin, start.elapsed());
    let mut buf = vec![0u8; BANNER_BUF_LEN];
    match time::timeout(wait, stream.read(&mut buf)).await {
        Ok(_) => Ok(GraceOutcome::SessionClosed {
            elapsed: start.elapsed(),
        }),
        Err(_) => Ok(GraceOutcome::TimedOut),
    }
}

/// Remaining wait: `grace - elapsed + margin`, never negative.
fn grace_wait(grace: Duration, margin: Duration, elapsed: Duration) -> Duration {
    (grace + margin).saturating_sub(elapsed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::net::TcpListener;

    async fn silent_server() -> (Target, tokio::task::JoinHandle<()>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        let handle = tokio::spawn(async move {
            let mut held = Vec::new();
            while let Ok((mut sock, _)) = listener.accept().await {
                let _ = sock.write_all(b"SSH-2.0-OpenSSH_9.6\r\n").await;
                held.push(sock);
            }
        });
        (Target::new("127.0.0.1", port), handle)
    }

    #[tokio::test]
    async fn open_session_past_window_times_out() {
        let (target, server) = silent_server().await;
        let outcome = probe_grace_period_with_margin(
            &target,
            Duration::from_millis(100),
            Duration::from_secs(1),
            Duration::from_millis(200),
        )
        .await
        .unwrap();
        assert_eq!(outcome, GraceOutcome::TimedOut);
        server.abort();
    }

    #[test]
    fn grace_wait_adds_four_second_margin() {
        assert_eq!(GRACE_MARGIN, Duration::from_secs(4));
        assert_eq!(
            grace_wait(Duration::from_secs(120), GRACE_MARGIN, Duration::from_millis(1500)),
            Duration::from_millis(122_500)
        );
        assert_eq!(
            grace_wait(Duration::ZERO, GRACE_MARGIN, Duration::from_secs(10)),
            Duration::ZERO
        );
    }

    #[tokio::test]
    async fn default_margin_holds_idle_session_for_four_seconds() {
        let (target, server) = silent_server().await;
        let started = std::time::Instant::now();
        let outcome = probe_grace_period(&target, Duration::ZERO, Duration::from_secs(1))
            .await
            .unwrap();
        let waited = started.elapsed();
        assert_eq!(outcome, GraceOutcome::TimedOut);
        assert!(waited >= Duration::from_millis(3900), "waited {waited:?}");
        assert!(waited < Duration::from_secs(6), "waited {waited:?}");
        server.abort();
    }

    #[tokio::test]
    async fn silent_server_without_fallback_reports_timeout_text() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        let server = tokio::spawn(async move {
            let (sock, _) = listener.accept().await.unwrap();
            time::sleep(Duration::from_secs(2)).await;
            drop(sock);
        });
        let stream = connect("127.0.0.1", port, Duration::from_secs(1)).await.unwrap();
        let banner = read_banner(stream, false, Duration::from_millis(150)).await;
        assert_eq!(banner, "timed out");
        server.abort();
    }

    #[tokio::test]
    async fn ipv6_literal_is_parsed_not_resolved() {
        let addr = socket_addr_for("::1", 2222).await.unwrap();
        assert_eq!(addr, "[::1]:2222".parse::<SocketAddr>().unwrap());
        let addr = socket_addr_for("10.0.0.1", 22).await.unwrap();
        assert_eq!(addr, "10.0.0.1:22".parse::<SocketAddr>().unwrap());
    }
}
