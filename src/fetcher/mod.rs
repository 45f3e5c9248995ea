use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, CONTENT_TYPE, LOCATION, USER_AGENT};
use reqwest::Client;
use tracing::{debug, error, trace};
use url::Url;

use crate::config::CheckerConfig;

/// What a fetch is for
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchMode {
    /// HEAD request used to look at a single redirect hop
    Probe,
    /// GET request whose body is read, following a few redirects
    Full,
}

/// Status, headers and body of a single HTTP exchange
#[derive(Debug, Clone, Default)]
pub struct FetchResponse {
    pub status: u16,
    pub headers: HeaderMap,
    pub body: String,
    /// Where a [`FetchMode::Full`] request ended up after redirects;
    /// `None` when it was served from the requested URL
    pub final_url: Option<String>,
}

impl FetchResponse {
    pub fn new(status: u16) -> Self {
        Self {
            status,
            ..Default::default()
        }
    }

    /// The raw `Location` header, if present and valid UTF-8
    pub fn location(&self) -> Option<&str> {
        self.headers.get(LOCATION).and_then(|v| v.to_str().ok())
    }

    /// The `Content-Type` header, if present and valid UTF-8
    pub fn content_type(&self) -> Option<&str> {
        self.headers.get(CONTENT_TYPE).and_then(|v| v.to_str().ok())
    }

    /// The URL the body was served from
    pub fn served_from<'a>(&'a self, requested: &'a str) -> &'a str {
        self.final_url.as_deref().unwrap_or(requested)
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Transport used by the resolver and the link extractor
///
/// Probes must never follow redirects on their own; every hop is driven by
/// the caller. Full fetches behave like a normal page load and may follow a
/// bounded number of redirects, reporting the landing URL in
/// [`FetchResponse::final_url`]. Any error is treated by callers as "this
/// lead goes nowhere" and is never surfaced further.
#[async_trait]
pub trait Fetcher: Send + Sync {
    async fn fetch(&self, url: &str, mode: FetchMode) -> Result<FetchResponse>;
}

/// Fetcher backed by reqwest clients
///
/// Probes go through a client that never follows redirects; page loads use
/// one limited to `max_page_redirects` hops.
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    probe_client: Client,
    page_client: Client,
    max_body_bytes: usize,
}

impl HttpFetcher {
    /// Builds the HTTP client from the checker configuration
    pub fn new(config: &CheckerConfig) -> Result<Self> {
        debug!("Initializing HTTP client with user agent: {}", config.user_agent);
        let mut headers = HeaderMap::new();
        let user_agent = HeaderValue::from_str(&config.user_agent)
            .with_context(|| format!("Invalid user agent string '{}'", config.user_agent))?;
        headers.insert(USER_AGENT, user_agent);

        let probe_client = build_client(config, headers.clone(), reqwest::redirect::Policy::none())?;
        let page_client = build_client(
            config,
            headers,
            reqwest::redirect::Policy::limited(config.max_page_redirects),
        )?;

        Ok(Self {
            probe_client,
            page_client,
            max_body_bytes: config.max_body_bytes,
        })
    }
}

fn build_client(
    config: &CheckerConfig,
    headers: HeaderMap,
    redirect: reqwest::redirect::Policy,
) -> Result<Client> {
    Client::builder()
        .redirect(redirect)
        .timeout(config.request_timeout)
        .connect_timeout(config.connect_timeout)
        .pool_idle_timeout(config.pool_idle_timeout)
        .pool_max_idle_per_host(config.pool_max_idle_per_host)
        .default_headers(headers)
        .build()
        .map_err(|e| {
            error!("Failed to build HTTP client: {}", e);
            e
        })
        .context("Failed to build HTTP client")
}

#[async_trait]
impl Fetcher for HttpFetcher {
    async fn fetch(&self, url: &str, mode: FetchMode) -> Result<FetchResponse> {
        let request = match mode {
            FetchMode::Probe => self.probe_client.head(url),
            FetchMode::Full => self.page_client.get(url),
        };

        trace!("Sending {:?} request to {}", mode, url);
        let mut resp = request
            .send()
            .await
            .with_context(|| format!("Failed to send request to {}", url))?;

        let status = resp.status().as_u16();
        let headers = resp.headers().clone();
        let final_url = Some(resp.url().clone())
            .filter(|served| Url::parse(url).ok().as_ref() != Some(served))
            .map(String::from);
        debug!("Response status for {}: {}", url, status);
        if let Some(served) = &final_url {
            debug!("{} was served from {}", url, served);
        }
        trace!("Response headers: {:?}", headers);

        let body = match mode {
            FetchMode::Probe => String::new(),
            FetchMode::Full => {
                let mut bytes = Vec::new();
                while let Some(chunk) = resp
                    .chunk()
                    .await
                    .with_context(|| format!("Failed to read body of {}", url))?
                {
                    let room = self.max_body_bytes.saturating_sub(bytes.len());
                    if chunk.len() >= room {
                        bytes.extend_from_slice(&chunk[..room]);
                        debug!("Body of {} truncated at {} bytes", url, self.max_body_bytes);
                        break;
                    }
                    bytes.extend_from_slice(&chunk);
                }
                String::from_utf8_lossy(&bytes).into_owned()
            }
        };

        Ok(FetchResponse {
            status,
            headers,
            body,
            final_url,
        })
    }
}
