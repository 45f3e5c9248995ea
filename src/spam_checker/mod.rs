use anyhow::{bail, Result};
use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, error, info, instrument, warn};

use crate::config::CheckerConfig;
use crate::fetcher::{FetchMode, FetchResponse, Fetcher, HttpFetcher};
use crate::link_extractor::LinkExtractor;
use crate::url_crawler::{RedirectResolver, VisitedSet};
use crate::url_parser::{extract_candidate_urls, Blocklist};

/// Decides whether content links to blocklisted hosts
///
/// Every URL in the content is followed through its redirects. If the
/// destination host is not listed, the destination page is fetched and each
/// of its links is followed (with one hop less) and checked as well.
#[derive(Clone)]
pub struct SpamChecker {
    fetcher: Arc<dyn Fetcher>,
    config: CheckerConfig,
}

/// Everything one top-level URL needs to be evaluated on its own task
struct Branch {
    resolver: RedirectResolver,
    extractor: LinkExtractor,
    blocklist: Arc<Blocklist>,
    visited: Arc<VisitedSet>,
    hop_budget: usize,
}

impl Branch {
    async fn evaluate(&self, candidate: &str) -> bool {
        let final_url = self
            .resolver
            .resolve(candidate, self.hop_budget, &self.visited)
            .await;

        if self.blocklist.is_blocked(&final_url) {
            info!("{} resolves to blocklisted {}", candidate, final_url);
            return true;
        }

        let page_budget = self.hop_budget.saturating_sub(1);
        for link in self.extractor.extract_links(&final_url).await {
            let link_final = self.resolver.resolve(&link, page_budget, &self.visited).await;
            if self.blocklist.is_blocked(&link_final) {
                info!("{} links to {} which resolves to blocklisted {}", final_url, link, link_final);
                return true;
            }
        }

        debug!("No blocklisted host reachable from {}", candidate);
        false
    }
}

impl SpamChecker {
    pub fn new(fetcher: Arc<dyn Fetcher>, config: CheckerConfig) -> Self {
        Self { fetcher, config }
    }

    /// Creates a checker that talks HTTP with a reqwest client
    pub fn from_config(config: CheckerConfig) -> Result<Self> {
        let fetcher = HttpFetcher::new(&config)?;
        Ok(Self::new(Arc::new(fetcher), config))
    }

    pub fn config(&self) -> &CheckerConfig {
        &self.config
    }

    /// The blocklist carried by the configuration
    pub fn configured_blocklist(&self) -> Blocklist {
        Blocklist::new(self.config.blocklist.iter().cloned()).with_matching(self.config.host_matching)
    }

    /// Checks content against the configured blocklist and hop budget
    pub async fn check(&self, content: &str) -> bool {
        let blocklist = self.configured_blocklist();
        let hop_budget = i64::try_from(self.config.max_hops).unwrap_or(i64::MAX);
        self.is_spam(content, &blocklist, hop_budget).await
    }

    /// Returns true if any URL in `content` leads to a blocklisted host
    ///
    /// A zero or negative `hop_budget` disables redirect following; page
    /// links are still extracted and checked as written. Network failures
    /// never surface here: a lead that cannot be followed is checked as far
    /// as it got.
    ///
    /// # Arguments
    /// * `content` - Free text to scan for http(s) URLs
    /// * `blocklist` - Hostnames that mark a lead as spam
    /// * `hop_budget` - Redirects to follow per top-level URL; page links
    ///   get one less
    ///
    /// # Returns
    /// * `bool` - `true` as soon as one lead reaches a blocklisted host
    #[instrument(level = "debug", skip_all, fields(hop_budget = hop_budget))]
    pub async fn is_spam(&self, content: &str, blocklist: &Blocklist, hop_budget: i64) -> bool {
        let candidates = extract_candidate_urls(content);
        if candidates.is_empty() {
            debug!("No URLs in content");
            return false;
        }

        let hop_budget = usize::try_from(hop_budget).unwrap_or(0);
        info!("Checking {} URLs with hop budget {}", candidates.len(), hop_budget);

        let branch = Arc::new(Branch {
            resolver: RedirectResolver::new(self.fetcher.clone())
                .with_follow_all_redirect_statuses(self.config.follow_all_redirect_statuses),
            extractor: LinkExtractor::new(self.fetcher.clone()),
            blocklist: Arc::new(blocklist.clone()),
            visited: Arc::new(VisitedSet::new()),
            hop_budget,
        });

        let semaphore = Arc::new(Semaphore::new(self.config.max_concurrent_branches.max(1)));
        let mut branches = JoinSet::new();
        for candidate in candidates {
            let branch = branch.clone();
            let semaphore = semaphore.clone();
            branches.spawn(async move {
                let Ok(_permit) = semaphore.acquire_owned().await else {
                    return false;
                };
                branch.evaluate(&candidate).await
            });
        }

        while let Some(result) = branches.join_next().await {
            match result {
                Ok(true) => {
                    // Remaining branches cannot change the verdict
                    branches.abort_all();
                    info!("Content flagged as spam");
                    return true;
                }
                Ok(false) => {}
                Err(e) => warn!("Branch task did not complete: {}", e),
            }
        }

        info!("Content is clean");
        false
    }
}

/// Stand-in transport for when no HTTP client could be built
struct OfflineFetcher;

#[async_trait]
impl Fetcher for OfflineFetcher {
    async fn fetch(&self, url: &str, _mode: FetchMode) -> Result<FetchResponse> {
        bail!("No HTTP client available to fetch {}", url)
    }
}

/// Checks `content` against `blocklist` with default settings
///
/// Hostnames are compared ignoring ASCII case.
pub async fn is_spam(content: &str, blocklist: &[String], hop_budget: i64) -> bool {
    let config = CheckerConfig::default();
    let fetcher: Arc<dyn Fetcher> = match HttpFetcher::new(&config) {
        Ok(fetcher) => Arc::new(fetcher),
        Err(e) => {
            error!("Falling back to offline checks: {:#}", e);
            Arc::new(OfflineFetcher)
        }
    };

    let blocklist = Blocklist::new(blocklist.iter().cloned());
    SpamChecker::new(fetcher, config)
        .is_spam(content, &blocklist, hop_budget)
        .await
}
