use anyhow::{Context, Result};
use std::fs;
use std::path::Path;
use tracing::{debug, trace};

use super::host::extract_host;
use crate::config::HostMatching;

/// Hostnames that mark content as spam
///
/// Entries are kept exactly as supplied; only the comparison is governed by
/// the [`HostMatching`] policy.
#[derive(Debug, Clone, Default)]
pub struct Blocklist {
    hosts: Vec<String>,
    matching: HostMatching,
}

impl Blocklist {
    /// Creates a blocklist with the default matching policy
    pub fn new<I, S>(hosts: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            hosts: hosts.into_iter().map(Into::into).collect(),
            matching: HostMatching::default(),
        }
    }

    /// Sets the hostname comparison policy
    pub fn with_matching(mut self, matching: HostMatching) -> Self {
        self.matching = matching;
        self
    }

    /// Reads one hostname per line
    ///
    /// Blank lines, `#` comment lines and trailing ` #` comments are
    /// skipped. Anything after the first word of a line is ignored.
    pub fn from_file(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path)
            .with_context(|| format!("Failed to read blocklist {}", path.display()))?;
        let blocklist = Self::new(text.lines().filter_map(|line| {
            let line = &line[..line.find(" #").unwrap_or(line.len())];
            line.split_whitespace().next().filter(|host| !host.starts_with('#'))
        }));
        debug!("Loaded {} blocklist entries from {}", blocklist.len(), path.display());
        Ok(blocklist)
    }

    /// Appends more hostnames
    pub fn extend<I, S>(&mut self, hosts: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.hosts.extend(hosts.into_iter().map(Into::into));
    }

    pub fn matching(&self) -> HostMatching {
        self.matching
    }

    pub fn hosts(&self) -> &[String] {
        &self.hosts
    }

    pub fn len(&self) -> usize {
        self.hosts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.hosts.is_empty()
    }

    /// Whether a bare hostname is listed
    pub fn contains_host(&self, host: &str) -> bool {
        self.hosts
            .iter()
            .any(|entry| self.matching.matches(host, entry))
    }

    /// Whether the hostname of `url` is listed; unparsable URLs never match
    pub fn is_blocked(&self, url: &str) -> bool {
        match extract_host(url) {
            Some(host) => {
                let blocked = self.contains_host(&host);
                trace!("Host {} blocked: {}", host, blocked);
                blocked
            }
            None => false,
        }
    }
}
