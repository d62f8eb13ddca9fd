use anyhow::{bail, Context, Result};
use std::collections::HashSet;

/// The SSH port probed when none are given.
pub const DEFAULT_PORT: u16 = 22;

/// Parse a comma-separated port list into deduplicated TCP ports (1..=65535).
///
/// Supported items:
/// - single port number: `22`
/// - inclusive range: `2222-2224`
/// - whitespace around items is ignored, empty items are skipped
pub fn parse_ports_str(s: &str) -> Result<Vec<u16>> {
    let mut out: Vec<u16> = Vec::new();
    let mut seen = HashSet::new();

    for raw in s.split(',') {
        let item = raw.trim();
        if item.is_empty() {
            continue;
        }

        if let Some((a, b)) = item.split_once('-') {
            let start = parse_port_str(a.trim())
                .with_context(|| format!("invalid start in range: {item}"))?;
            let end = parse_port_str(b.trim())
                .with_context(|| format!("invalid end in range: {item}"))?;
            if start > end {
                bail!("invalid range {start}-{end} (start > end)");
            }
            for p in start..=end {
                if seen.insert(p) {
                    out.push(p);
                }
            }
            continue;
        }

        let p = parse_port_str(item).with_context(|| format!("invalid port value: {item}"))?;
        if seen.insert(p) {
            out.push(p);
        }
    }

    if out.is_empty() {
        bail!("no ports given");
    }
    Ok(out)
}

fn parse_port_str(s: &str) -> Result<u16> {
    let val: u32 = s.parse::<u32>().map_err(|e| anyhow::anyhow!(e))?;
    if val == 0 || val > 65535 {
        bail!("port out of range: {val}");
    }
    Ok(val as u16)
}
