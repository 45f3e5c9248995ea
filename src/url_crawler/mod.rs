use std::collections::HashSet;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info, trace, warn};
use url::Url;

use crate::fetcher::{FetchMode, Fetcher};
use crate::url_parser::normalize_url;

/// URLs already probed during one evaluation
///
/// Shared by every branch of a single spam check so that a redirect loop
/// spanning top-level URLs and page links is still caught. Test-and-insert
/// is atomic under the lock.
#[derive(Debug, Default)]
pub struct VisitedSet {
    urls: Mutex<HashSet<String>>,
}

impl VisitedSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records `url`, returning `false` if it was already present
    ///
    /// URLs are compared in normalized form, so `http://a.example` and
    /// `http://a.example/` are one entry.
    pub async fn insert(&self, url: &str) -> bool {
        let key = normalize_url(url);
        let mut urls = self.urls.lock().await;
        if urls.contains(&key) {
            return false;
        }
        urls.insert(key)
    }

    pub async fn contains(&self, url: &str) -> bool {
        self.urls.lock().await.contains(&normalize_url(url))
    }

    pub async fn len(&self) -> usize {
        self.urls.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.urls.lock().await.is_empty()
    }
}

/// Outcome of walking one redirect chain
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolution {
    /// Where redirect following stopped
    pub final_url: String,
    /// Number of redirects followed
    pub hops: usize,
    /// Whether the walk stopped on an already visited URL
    pub cycle_detected: bool,
}

/// Follows redirect chains one hop at a time through a [`Fetcher`]
#[derive(Clone)]
pub struct RedirectResolver {
    fetcher: Arc<dyn Fetcher>,
    follow_all_redirect_statuses: bool,
}

impl RedirectResolver {
    pub fn new(fetcher: Arc<dyn Fetcher>) -> Self {
        Self {
            fetcher,
            follow_all_redirect_statuses: false,
        }
    }

    /// Also treats 303, 307 and 308 as redirects
    pub fn with_follow_all_redirect_statuses(mut self, follow: bool) -> Self {
        self.follow_all_redirect_statuses = follow;
        self
    }

    fn is_redirect(&self, status: u16) -> bool {
        match status {
            301 | 302 => true,
            303 | 307 | 308 => self.follow_all_redirect_statuses,
            _ => false,
        }
    }

    /// Returns the terminal URL of the chain starting at `url`
    ///
    /// # Arguments
    /// * `url` - Where the chain starts
    /// * `hop_budget` - Maximum number of redirects to follow
    /// * `visited` - URLs already probed during this evaluation
    ///
    /// # Returns
    /// * `String` - The last URL reached, `url` itself if nothing was followed
    pub async fn resolve(&self, url: &str, hop_budget: usize, visited: &VisitedSet) -> String {
        self.resolve_chain(url, hop_budget, visited).await.final_url
    }

    /// Walks the redirect chain starting at `url`
    ///
    /// Stops when the hop budget runs out, when a URL has already been
    /// visited, on any non-redirect response, on a redirect without a
    /// usable `Location`, or on a transport error. None of these are
    /// errors: the last URL reached is returned in every case.
    ///
    /// # Arguments
    /// * `url` - Where the chain starts
    /// * `hop_budget` - Maximum number of redirects to follow; 0 makes no request
    /// * `visited` - URLs already probed during this evaluation, updated
    ///   before each request goes out
    ///
    /// # Returns
    /// * `Resolution` - The final URL, the number of hops taken and whether
    ///   the walk stopped on a visited URL
    pub async fn resolve_chain(&self, url: &str, hop_budget: usize, visited: &VisitedSet) -> Resolution {
        let mut current_url = url.to_owned();
        let mut remaining = hop_budget;
        let mut hops = 0;
        let mut cycle_detected = false;

        trace!("Beginning redirect chain traversal from {} with budget {}", current_url, hop_budget);
        loop {
            if remaining == 0 {
                debug!("Hop budget exhausted at {}", current_url);
                break;
            }

            // Recorded before the request goes out
            if !visited.insert(&current_url).await {
                debug!("Already visited {}, stopping", current_url);
                cycle_detected = true;
                break;
            }

            let resp = match self.fetcher.fetch(&current_url, FetchMode::Probe).await {
                Ok(r) => r,
                Err(e) => {
                    warn!("Probe of {} failed, treating as terminal: {:#}", current_url, e);
                    break;
                }
            };

            if !self.is_redirect(resp.status) {
                trace!("Status {} at {} ends the chain", resp.status, current_url);
                break;
            }

            let Some(location) = resp.location() else {
                warn!("Redirect status {} without Location header at {}", resp.status, current_url);
                break;
            };

            let next_url = match Url::parse(&current_url).and_then(|base| base.join(location)) {
                Ok(next) => next.to_string(),
                Err(e) => {
                    warn!("Cannot resolve redirect location '{}' from {}: {}", location, current_url, e);
                    break;
                }
            };

            hops += 1;
            remaining -= 1;
            debug!("Redirected to: {} (hop {}/{})", next_url, hops, hop_budget);
            current_url = next_url;
        }

        if hops > 0 {
            info!("Resolved {} to {} after {} hops", url, current_url, hops);
        }

        Resolution {
            final_url: current_url,
            hops,
            cycle_detected,
        }
    }
}
