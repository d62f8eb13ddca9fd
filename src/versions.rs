//! OpenSSH version tables used by the classifier.
//!
//! The tables are plain data: a list of banner prefixes known to be affected
//! by CVE-2024-6387 and a list of complete vendor banners that carry a
//! backported fix. They can be replaced at runtime from a JSON file.

use crate::error::TablesError;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

const VULNERABLE_PREFIXES: &[&str] = &[
    "SSH-2.0-OpenSSH_1",
    "SSH-2.0-OpenSSH_2",
    "SSH-2.0-OpenSSH_3",
    "SSH-2.0-OpenSSH_4.0",
    "SSH-2.0-OpenSSH_4.1",
    "SSH-2.0-OpenSSH_4.2",
    "SSH-2.0-OpenSSH_4.3",
    "SSH-2.0-OpenSSH_4.4",
    "SSH-2.0-OpenSSH_8.5",
    "SSH-2.0-OpenSSH_8.6",
    "SSH-2.0-OpenSSH_8.7",
    "SSH-2.0-OpenSSH_8.8",
    "SSH-2.0-OpenSSH_8.9",
    "SSH-2.0-OpenSSH_9.0",
    "SSH-2.0-OpenSSH_9.1",
    "SSH-2.0-OpenSSH_9.2",
    "SSH-2.0-OpenSSH_9.3",
    "SSH-2.0-OpenSSH_9.4",
    "SSH-2.0-OpenSSH_9.5",
    "SSH-2.0-OpenSSH_9.6",
    "SSH-2.0-OpenSSH_9.7",
];

const PATCHED_BANNERS: &[&str] = &[
    "SSH-2.0-OpenSSH_8.9p1 Ubuntu-3ubuntu0.10",
    "SSH-2.0-OpenSSH_9.3p1 Ubuntu-3ubuntu3.6",
    "SSH-2.0-OpenSSH_9.6p1 Ubuntu-3ubuntu13.3",
    "SSH-2.0-OpenSSH_9.6p1 Ubuntu-3ubuntu13.4",
    "SSH-2.0-OpenSSH_9.6p1 Ubuntu-3ubuntu13.5",
    "SSH-2.0-OpenSSH_9.3p1 Ubuntu-1ubuntu3.6",
    "SSH-2.0-OpenSSH_9.2p1 Debian-2+deb12u3",
    "SSH-2.0-OpenSSH_8.4p1 Debian-5+deb11u3",
    "SSH-2.0-OpenSSH_9.7p1 Debian-7",
    "SSH-2.0-OpenSSH_9.6 FreeBSD-20240701",
    "SSH-2.0-OpenSSH_9.7 FreeBSD-20240701",
];

/// Banner substrings that mark a vulnerable build, and exact banners exempted from them.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct VersionTables {
    pub vulnerable_prefixes: Vec<String>,
    pub patched_banners: Vec<String>,
}

impl Default for VersionTables {
    fn default() -> Self {
        Self {
            vulnerable_prefixes: VULNERABLE_PREFIXES.iter().map(|s| s.to_string()).collect(),
            patched_banners: PATCHED_BANNERS.iter().map(|s| s.to_string()).collect(),
        }
    }
}

impl VersionTables {
    /// Parse tables from JSON of the shape `{"vulnerable_prefixes": [..], "patched_banners": [..]}`.
    pub fn from_json_str(s: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(s)
    }

    /// Load tables from a JSON file, replacing the built-in lists entirely.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, TablesError> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|source| TablesError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json_str(&content).map_err(|source| TablesError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// True if any vulnerable prefix occurs anywhere in the banner.
    pub fn has_vulnerable_prefix(&self, banner: &str) -> bool {
        self.vulnerable_prefixes
            .iter()
            .any(|prefix| banner.contains(prefix.as_str()))
    }

    /// Exact match only; a patched string embedded in a longer banner does not count.
    pub fn is_patched(&self, banner: &str) -> bool {
        self.patched_banners.iter().any(|patched| patched == banner)
    }
}
