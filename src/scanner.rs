use crate::classify::{classify, describe};
use crate::probe::{self, GraceOutcome};
use crate::targets::ReverseResolver;
use crate::types::{ProbeResult, ProbeTask, Target, Verdict};
use crate::versions::VersionTables;
use ::time::{format_description::well_known, OffsetDateTime};
use anyhow::{Context, Result};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, Semaphore};
use tokio::task::JoinSet;
use tracing::{debug, warn};

/// Default worker ceiling.
pub const DEFAULT_CONCURRENCY: usize = 100;

/// Settings shared by every task of one scan.
#[derive(Debug, Clone)]
pub struct ScanOptions {
    pub timeout: Duration,
    pub grace_period: Option<Duration>,
    pub use_help_request: bool,
    pub dns_resolve: bool,
    pub concurrency: usize,
}

impl Default for ScanOptions {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(1),
            grace_period: None,
            use_help_request: false,
            dns_resolve: false,
            concurrency: DEFAULT_CONCURRENCY,
        }
    }
}

impl ScanOptions {
    fn task_for(&self, target: Target) -> ProbeTask {
        ProbeTask {
            target,
            timeout: self.timeout,
            grace_period: self.grace_period,
            use_help_request: self.use_help_request,
            dns_resolve: self.dns_resolve,
        }
    }
}

/// Counters for the progress line. Nothing in the scan reads them back.
#[derive(Clone, Debug)]
pub struct SharedProgress {
    pub total: Arc<AtomicU64>,
    pub completed: Arc<AtomicU64>,
    pub in_flight: Arc<AtomicU64>,
    pub peak_in_flight: Arc<AtomicU64>,
}

impl SharedProgress {
    pub fn new() -> Self {
        Self {
            total: Arc::new(AtomicU64::new(0)),
            completed: Arc::new(AtomicU64::new(0)),
            in_flight: Arc::new(AtomicU64::new(0)),
            peak_in_flight: Arc::new(AtomicU64::new(0)),
        }
    }

    pub fn completed(&self) -> u64 {
        self.completed.load(Ordering::Relaxed)
    }

    pub fn total(&self) -> u64 {
        self.total.load(Ordering::Relaxed)
    }

    pub fn peak_in_flight(&self) -> u64 {
        self.peak_in_flight.load(Ordering::Relaxed)
    }

    pub fn in_flight(&self) -> u64 {
        self.in_flight.load(Ordering::SeqCst)
    }

    /// Count a task as running until the returned guard drops, even by unwinding.
    fn task_started(&self) -> TaskGuard {
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak_in_flight.fetch_max(now, Ordering::SeqCst);
        TaskGuard {
            progress: self.clone(),
        }
    }
}

struct TaskGuard {
    progress: SharedProgress,
}

impl Drop for TaskGuard {
    fn drop(&mut self) {
        self.progress.in_flight.fetch_sub(1, Ordering::SeqCst);
        self.progress.completed.fetch_add(1, Ordering::Relaxed);
    }
}

impl Default for SharedProgress {
    fn default() -> Self {
        Self::new()
    }
}

/// Probe every (target, port) pair and return one result per pair.
///
/// - Limits concurrent tasks using a `Semaphore` sized by `opts.concurrency`.
/// - Each task connects once, reads the greeting, classifies it, and runs the
///   grace probe for version-vulnerable banners when enabled.
/// - Results are collected through a channel after every task has joined.
pub async fn scan_targets(
    targets: &[String],
    ports: &[u16],
    opts: &ScanOptions,
    tables: Arc<VersionTables>,
) -> Result<Vec<ProbeResult>> {
    scan_targets_with_shared(targets, ports, opts, tables, SharedProgress::new()).await
}

/// Variant that reports progress into caller-owned counters.
pub async fn scan_targets_with_shared(
    targets: &[String],
    ports: &[u16],
    opts: &ScanOptions,
    tables: Arc<VersionTables>,
    shared: SharedProgress,
) -> Result<Vec<ProbeResult>> {
    let total = targets.len() as u64 * ports.len() as u64;
    shared.total.store(total, Ordering::Relaxed);

    let resolver = opts.dns_resolve.then(ReverseResolver::new);
    let sem = Arc::new(Semaphore::new(opts.concurrency.clamp(1, 5_000)));
    let (tx, mut rx) = mpsc::unbounded_channel::<ProbeResult>();
    let mut set = JoinSet::new();
    let mut pending: HashMap<tokio::task::Id, Target> = HashMap::new();

    for address in targets {
        for &port in ports {
            let permit = sem
                .clone()
                .acquire_owned()
                .await
                .context("worker pool closed")?;
            let task = opts.task_for(Target::new(address.trim(), port));
            let tables = tables.clone();
            let resolver = resolver.clone();
            let shared = shared.clone();
            let tx = tx.clone();
            let target = task.target.clone();

            let handle = set.spawn(async move {
                let _permit = permit; // keep permit until task completes
                let guard = shared.task_started();
                let result = check_target(task, &tables, resolver.as_ref()).await;
                drop(guard);
                // Receiver lives until every task has joined.
                let _ = tx.send(result);
            });
            pending.insert(handle.id(), target);
        }
    }

    while let Some(joined) = set.join_next_with_id().await {
        match joined {
            Ok((id, ())) => {
                pending.remove(&id);
            }
            Err(e) => {
                if let Some(target) = pending.remove(&e.id()) {
                    warn!("check for {target} failed: {e}");
                    let _ = tx.send(result_for(
                        &target,
                        Verdict::BannerRetrievalFailed,
                        format!("Failed to retrieve SSH banner: {e}"),
                        None,
                        None,
                    ));
                }
            }
        }
    }
    drop(tx);

    let mut results = Vec::with_capacity(total as usize);
    while let Some(result) = rx.recv().await {
        results.push(result);
    }
    Ok(results)
}

/// Run one probing task to its single result.
pub async fn check_target(
    task: ProbeTask,
    tables: &VersionTables,
    resolver: Option<&ReverseResolver>,
) -> ProbeResult {
    let target = &task.target;

    debug!(%target, "connecting");
    let stream = match probe::connect(&target.address, target.port, task.timeout).await {
        Ok(s) => s,
        Err(e) => {
            debug!(%target, "{e}");
            return result_for(target, Verdict::ClosedPort, describe(Verdict::ClosedPort, ""), None, None);
        }
    };

    let banner = probe::read_banner(stream, task.use_help_request, task.timeout).await;
    debug!(%target, %banner, "banner read");

    let verdict = classify(&banner, tables);
    debug!(%target, %verdict, "classified");

    match verdict {
        Verdict::BannerRetrievalFailed | Verdict::UnknownService => {
            let detail = describe(verdict, &banner);
            return result_for(target, verdict, detail, None, Some(banner));
        }
        _ => {}
    }

    let display_name = match (task.dns_resolve, resolver) {
        (true, Some(r)) => r.lookup(&target.address).await,
        _ => None,
    };

    let (verdict, detail) = match (verdict, task.grace_period) {
        (Verdict::Vulnerable, Some(grace)) => grace_verdict(target, &banner, grace, task.timeout).await,
        _ => (verdict, describe(verdict, &banner)),
    };

    result_for(target, verdict, detail, display_name, Some(banner))
}

async fn grace_verdict(
    target: &Target,
    banner: &str,
    grace: Duration,
    timeout: Duration,
) -> (Verdict, String) {
    debug!(%target, grace_secs = grace.as_secs(), "probing grace period");
    match probe::probe_grace_period(target, grace, timeout).await {
        Ok(GraceOutcome::SessionClosed { elapsed }) => (
            Verdict::Vulnerable,
            format!(
                "(running {banner}) vulnerable and LoginGraceTime remediation not done (Session was closed by server at {:.1} seconds)",
                elapsed.as_secs_f64()
            ),
        ),
        Ok(GraceOutcome::TimedOut) => (
            Verdict::LikelyNotVulnerable,
            describe(Verdict::LikelyNotVulnerable, banner),
        ),
        Err(e) => {
            warn!("grace period check for {target} skipped: {e}");
            (Verdict::Vulnerable, describe(Verdict::Vulnerable, banner))
        }
    }
}

fn result_for(
    target: &Target,
    verdict: Verdict,
    detail: String,
    display_name: Option<String>,
    banner: Option<String>,
) -> ProbeResult {
    ProbeResult {
        address: target.address.clone(),
        port: target.port,
        verdict,
        detail,
        display_name,
        banner,
        timestamp: now_rfc3339(),
    }
}

fn now_rfc3339() -> String {
    let now = OffsetDateTime::now_utc();
    now.format(&well_known::Rfc3339)
        .unwrap_or_else(|_| String::from("1970-01-01T00:00:00Z"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn panicking_task_is_counted_finished() {
        let progress = SharedProgress::new();
        let shared = progress.clone();
        let handle = tokio::spawn(async move {
            let _guard = shared.task_started();
            panic!("check blew up");
        });
        assert!(handle.await.is_err());
        assert_eq!(progress.in_flight(), 0);
        assert_eq!(progress.completed(), 1);
        assert_eq!(progress.peak_in_flight(), 1);
    }

    #[test]
    fn guard_counts_each_task_once() {
        let progress = SharedProgress::new();
        let a = progress.task_started();
        let b = progress.task_started();
        assert_eq!(progress.in_flight(), 2);
        drop(a);
        drop(b);
        assert_eq!(progress.in_flight(), 0);
        assert_eq!(progress.completed(), 2);
        assert_eq!(progress.peak_in_flight(), 2);
    }
}
