use crate::types::{ProbeResult, Target, Verdict};
use std::fmt::Write as _;

/// One line of the report: where, and what we learned.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReportEntry {
    pub display: String,
    pub detail: String,
}

impl ReportEntry {
    fn from_result(r: &ProbeResult) -> Self {
        let target = Target::new(r.address.clone(), r.port);
        let display = match &r.display_name {
            Some(name) => format!("{target} ({name})"),
            None => target.to_string(),
        };
        Self {
            display,
            detail: r.detail.clone(),
        }
    }
}

/// Scan results bucketed by verdict.
#[derive(Debug, Clone, Default)]
pub struct Report {
    pub not_vulnerable: Vec<ReportEntry>,
    pub likely_not_vulnerable: Vec<ReportEntry>,
    pub vulnerable: Vec<ReportEntry>,
    pub unknown: Vec<ReportEntry>,
    pub failed: Vec<ReportEntry>,
    pub closed_ports: usize,
    pub total_hosts: usize,
    pub total_checks: usize,
    pub grace_check_enabled: bool,
}

impl Report {
    pub fn from_results(results: &[ProbeResult], total_hosts: usize, grace_check_enabled: bool) -> Self {
        let mut report = Report {
            total_hosts,
            total_checks: results.len(),
            grace_check_enabled,
            ..Default::default()
        };
        for r in results {
            let entry = || ReportEntry::from_result(r);
            match r.verdict {
                Verdict::ClosedPort => report.closed_ports += 1,
                Verdict::BannerRetrievalFailed => report.failed.push(entry()),
                Verdict::UnknownService => report.unknown.push(entry()),
                Verdict::Vulnerable => report.vulnerable.push(entry()),
                Verdict::NotVulnerable => report.not_vulnerable.push(entry()),
                Verdict::LikelyNotVulnerable => report.likely_not_vulnerable.push(entry()),
            }
        }
        report
    }

    pub fn count(&self, verdict: Verdict) -> usize {
        match verdict {
            Verdict::ClosedPort => self.closed_ports,
            Verdict::BannerRetrievalFailed => self.failed.len(),
            Verdict::UnknownService => self.unknown.len(),
            Verdict::Vulnerable => self.vulnerable.len(),
            Verdict::NotVulnerable => self.not_vulnerable.len(),
            Verdict::LikelyNotVulnerable => self.likely_not_vulnerable.len(),
        }
    }

    /// Render the plain text summary printed after a scan.
    pub fn render(&self) -> String {
        let mut out = String::new();
        section(&mut out, "Servers not vulnerable", &self.not_vulnerable);
        if self.grace_check_enabled {
            section(
                &mut out,
                "Servers likely not vulnerable (possible LoginGraceTime remediation)",
                &self.likely_not_vulnerable,
            );
        }
        section(&mut out, "Servers likely vulnerable", &self.vulnerable);
        section(&mut out, "Servers with unknown SSH version", &self.unknown);
        if !self.failed.is_empty() {
            section(&mut out, "Servers where banner retrieval failed", &self.failed);
        }
        let _ = writeln!(out, "\nServers with port(s) closed: {}", self.closed_ports);
        let _ = writeln!(out, "\nTotal scanned hosts: {}", self.total_hosts);
        let _ = writeln!(out, "Total port checks performed: {}", self.total_checks);
        out
    }
}

fn section(out: &mut String, title: &str, entries: &[ReportEntry]) {
    let _ = writeln!(out, "\n{title}: {}", entries.len());
    for e in entries {
        let _ = writeln!(out, "   [+] Server at {} {}", e.display, e.detail);
    }
}
