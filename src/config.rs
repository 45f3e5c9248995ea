use anyhow::{Context, Result};
use serde::{Deserialize, Deserializer};
use std::path::Path;
use std::time::Duration;
use tracing::debug;

// Defaults for checker behaviour
const MAX_HOPS: usize = 3;
const REQUEST_TIMEOUT: u64 = 10; // seconds
const CONNECT_TIMEOUT: u64 = 5; // seconds
const POOL_IDLE_TIMEOUT: u64 = 90; // seconds
const MAX_BODY_BYTES: usize = 2 * 1024 * 1024;
const MAX_PAGE_REDIRECTS: usize = 5;
const MAX_CONCURRENT_BRANCHES: usize = 16;

/// Prefix for environment variable overrides, e.g. `LINK_SPAM_MAX_HOPS=5`
pub const ENV_PREFIX: &str = "LINK_SPAM";

/// How resolved hostnames are compared against blocklist entries
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HostMatching {
    /// Byte-for-byte equality. Resolved hostnames of http(s) URLs are
    /// already lower-cased by the `url` crate, so in practice this only
    /// makes the case of the blocklist entry matter: `Evil.Example` never
    /// matches.
    Exact,
    /// Equality after ASCII lower-casing both sides
    #[default]
    IgnoreAsciiCase,
}

impl HostMatching {
    pub fn matches(&self, host: &str, entry: &str) -> bool {
        match self {
            HostMatching::Exact => host == entry,
            HostMatching::IgnoreAsciiCase => host.eq_ignore_ascii_case(entry),
        }
    }
}

/// Configuration for the spam checker and its HTTP client
///
/// Values are layered: built-in defaults, then an optional config file,
/// then `LINK_SPAM_*` environment variables. Durations are given in
/// whole seconds in files and the environment.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CheckerConfig {
    // Redirect handling
    pub max_hops: usize,
    pub follow_all_redirect_statuses: bool,

    // HTTP client configuration
    #[serde(deserialize_with = "duration_from_secs")]
    pub request_timeout: Duration,
    #[serde(deserialize_with = "duration_from_secs")]
    pub connect_timeout: Duration,
    #[serde(deserialize_with = "duration_from_secs")]
    pub pool_idle_timeout: Duration,
    pub pool_max_idle_per_host: usize,
    pub user_agent: String,
    pub max_body_bytes: usize,
    pub max_page_redirects: usize,

    // Evaluation
    pub max_concurrent_branches: usize,
    pub host_matching: HostMatching,
    pub blocklist: Vec<String>,
}

impl CheckerConfig {
    /// Creates a new configuration with default values
    pub fn new() -> Self {
        Self::default()
    }

    /// Loads configuration from an optional file plus the environment
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut builder = config::Config::builder();

        if let Some(path) = path {
            debug!("Loading configuration file {}", path.display());
            builder = builder.add_source(config::File::from(path).required(true));
        }

        let settings = builder
            .add_source(config::Environment::with_prefix(ENV_PREFIX))
            .build()
            .context("Failed to read configuration")?;

        settings
            .try_deserialize::<CheckerConfig>()
            .context("Invalid configuration")
    }

    /// Sets the default hop budget
    pub fn with_max_hops(mut self, max_hops: usize) -> Self {
        self.max_hops = max_hops;
        self
    }

    /// Also follows 303, 307 and 308 responses, not only 301 and 302
    pub fn with_follow_all_redirect_statuses(mut self, follow: bool) -> Self {
        self.follow_all_redirect_statuses = follow;
        self
    }

    /// Sets the per-request timeout
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    /// Sets the connection timeout for establishing new connections
    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Sets the idle timeout for the connection pool
    pub fn with_pool_idle_timeout(mut self, timeout: Duration) -> Self {
        self.pool_idle_timeout = timeout;
        self
    }

    /// Sets the maximum number of idle connections per host
    pub fn with_pool_max_idle_per_host(mut self, max: usize) -> Self {
        self.pool_max_idle_per_host = max;
        self
    }

    /// Sets the user agent string
    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }

    /// Caps how much of a page body is read for link extraction
    pub fn with_max_body_bytes(mut self, max: usize) -> Self {
        self.max_body_bytes = max;
        self
    }

    /// Sets how many redirects a page load for link extraction may follow
    pub fn with_max_page_redirects(mut self, max: usize) -> Self {
        self.max_page_redirects = max;
        self
    }

    /// Limits how many top-level URLs are evaluated at once
    pub fn with_max_concurrent_branches(mut self, max: usize) -> Self {
        self.max_concurrent_branches = max;
        self
    }

    /// Sets the hostname comparison policy
    pub fn with_host_matching(mut self, host_matching: HostMatching) -> Self {
        self.host_matching = host_matching;
        self
    }

    /// Sets the blocklisted hostnames
    pub fn with_blocklist(mut self, hosts: Vec<String>) -> Self {
        self.blocklist = hosts;
        self
    }
}

impl Default for CheckerConfig {
    fn default() -> Self {
        Self {
            max_hops: MAX_HOPS,
            follow_all_redirect_statuses: false,

            request_timeout: Duration::from_secs(REQUEST_TIMEOUT),
            connect_timeout: Duration::from_secs(CONNECT_TIMEOUT),
            pool_idle_timeout: Duration::from_secs(POOL_IDLE_TIMEOUT),
            pool_max_idle_per_host: 10,
            user_agent: format!("LinkSpamChecker/{}", env!("CARGO_PKG_VERSION")),
            max_body_bytes: MAX_BODY_BYTES,
            max_page_redirects: MAX_PAGE_REDIRECTS,

            max_concurrent_branches: MAX_CONCURRENT_BRANCHES,
            host_matching: HostMatching::default(),
            blocklist: Vec::new(),
        }
    }
}

fn duration_from_secs<'de, D>(deserializer: D) -> Result<Duration, D::Error>
where
    D: Deserializer<'de>,
{
    u64::deserialize(deserializer).map(Duration::from_secs)
}
