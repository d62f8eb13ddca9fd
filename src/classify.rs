use crate::types::Verdict;
use crate::versions::VersionTables;

const SSH2_MARKER: &str = "SSH-2.0";
const OPENSSH_MARKER: &str = "SSH-2.0-OpenSSH";

/// Map a banner to a verdict. Pure: no I/O, no normalisation of the input.
///
/// A `Vulnerable` result here only means the version string matches; the
/// scanner may still downgrade it to `LikelyNotVulnerable` after a grace probe.
pub fn classify(banner: &str, tables: &VersionTables) -> Verdict {
    if !banner.contains(SSH2_MARKER) {
        return Verdict::BannerRetrievalFailed;
    }
    if !banner.contains(OPENSSH_MARKER) {
        return Verdict::UnknownService;
    }
    if tables.has_vulnerable_prefix(banner) && !tables.is_patched(banner) {
        Verdict::Vulnerable
    } else {
        Verdict::NotVulnerable
    }
}

/// Human readable detail line for a verdict reached from the banner alone.
pub fn describe(verdict: Verdict, banner: &str) -> String {
    match verdict {
        Verdict::ClosedPort => "Port closed".to_string(),
        Verdict::BannerRetrievalFailed => format!("Failed to retrieve SSH banner: {banner}"),
        Verdict::UnknownService => format!("(banner: {banner})"),
        Verdict::LikelyNotVulnerable => {
            format!("(running {banner} False negative possible depending on LoginGraceTime)")
        }
        Verdict::Vulnerable | Verdict::NotVulnerable => format!("(running {banner})"),
    }
}
