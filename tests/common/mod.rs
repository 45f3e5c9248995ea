#![allow(dead_code)]

use anyhow::{bail, Result};
use async_trait::async_trait;
use link_spam_checker::{FetchMode, FetchResponse, Fetcher};
use reqwest::header::{HeaderValue, CONTENT_TYPE, LOCATION};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

pub const MAX_PAGE_REDIRECTS: usize = 5;

#[derive(Debug, Clone)]
enum Route {
    Redirect(u16, String),
    Page(String),
    Fail,
}

/// In-memory web keyed by exact URL string
///
/// Unknown URLs answer 404. Probes see redirects as-is; full fetches follow
/// up to [`MAX_PAGE_REDIRECTS`] of them like a browser page load. Every
/// request, including each followed hop, is recorded so tests can check how
/// often a URL was touched.
#[derive(Debug, Default)]
pub struct ScriptedFetcher {
    routes: HashMap<String, Route>,
    requests: Mutex<Vec<(String, FetchMode)>>,
}

impl ScriptedFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// `from` answers 302 pointing at `to`
    pub fn redirect(self, from: &str, to: &str) -> Self {
        self.redirect_with(302, from, to)
    }

    pub fn redirect_with(mut self, status: u16, from: &str, to: &str) -> Self {
        self.routes
            .insert(from.to_string(), Route::Redirect(status, to.to_string()));
        self
    }

    /// `url` answers 200 with an HTML body
    pub fn page(mut self, url: &str, html: &str) -> Self {
        self.routes.insert(url.to_string(), Route::Page(html.to_string()));
        self
    }

    /// Every request to `url` fails at the transport level
    pub fn fail(mut self, url: &str) -> Self {
        self.routes.insert(url.to_string(), Route::Fail);
        self
    }

    pub fn build(self) -> Arc<Self> {
        Arc::new(self)
    }

    pub fn count(&self, url: &str, mode: FetchMode) -> usize {
        self.requests
            .lock()
            .unwrap()
            .iter()
            .filter(|(u, m)| u == url && *m == mode)
            .count()
    }

    pub fn probes(&self, url: &str) -> usize {
        self.count(url, FetchMode::Probe)
    }

    pub fn gets(&self, url: &str) -> usize {
        self.count(url, FetchMode::Full)
    }

    pub fn total_requests(&self) -> usize {
        self.requests.lock().unwrap().len()
    }
}

#[async_trait]
impl Fetcher for ScriptedFetcher {
    async fn fetch(&self, url: &str, mode: FetchMode) -> Result<FetchResponse> {
        let mut current = url.to_string();
        for _ in 0..=MAX_PAGE_REDIRECTS {
            let resp = self.respond(&current, mode).await?;
            let next = match mode {
                FetchMode::Full => resp.location().map(str::to_owned),
                FetchMode::Probe => None,
            };
            match next {
                Some(next) => current = next,
                None => {
                    return Ok(FetchResponse {
                        final_url: Some(current).filter(|served| served != url),
                        ..resp
                    })
                }
            }
        }
        bail!("too many redirects: {}", url)
    }
}

impl ScriptedFetcher {
    async fn respond(&self, url: &str, mode: FetchMode) -> Result<FetchResponse> {
        self.requests.lock().unwrap().push((url.to_string(), mode));
        tokio::task::yield_now().await;

        match self.routes.get(url) {
            Some(Route::Redirect(status, to)) => {
                let mut resp = FetchResponse::new(*status);
                resp.headers.insert(LOCATION, HeaderValue::from_str(to)?);
                Ok(resp)
            }
            Some(Route::Page(html)) => {
                let mut resp = FetchResponse::new(200);
                resp.headers
                    .insert(CONTENT_TYPE, HeaderValue::from_static("text/html; charset=utf-8"));
                if mode == FetchMode::Full {
                    resp.body = html.clone();
                }
                Ok(resp)
            }
            Some(Route::Fail) => bail!("connection refused: {}", url),
            None => Ok(FetchResponse::new(404)),
        }
    }
}

/// Wraps hrefs into a minimal HTML page
pub fn html_with_links(links: &[&str]) -> String {
    let anchors: String = links
        .iter()
        .map(|link| format!("<a href=\"{}\">link</a>\n", link))
        .collect();
    format!("<html><body>{}</body></html>", anchors)
}
