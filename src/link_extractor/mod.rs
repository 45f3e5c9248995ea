use once_cell::sync::Lazy;
use scraper::{Html, Selector};
use std::sync::Arc;
use tracing::{debug, trace, warn};
use url::Url;

use crate::fetcher::{FetchMode, Fetcher};

static ANCHOR_SELECTOR: Lazy<Selector> = Lazy::new(|| Selector::parse("a[href]").unwrap());
static BASE_SELECTOR: Lazy<Selector> = Lazy::new(|| Selector::parse("base[href]").unwrap());

const HTML_CONTENT_TYPES: [&str; 2] = ["text/html", "application/xhtml+xml"];

/// Collects the anchor links of an HTML document
///
/// Every `href` of an `<a>` element is resolved against the document base
/// (a valid `<base href>` if the page declares one, otherwise `base_url`)
/// and kept in document order. Values that do not resolve to an absolute
/// URL are dropped.
pub fn extract_anchor_links(html: &str, base_url: &str) -> Vec<String> {
    let document = Html::parse_document(html);
    let page_base = Url::parse(base_url).ok();

    let base = document
        .select(&BASE_SELECTOR)
        .next()
        .and_then(|el| el.value().attr("href"))
        .and_then(|href| match &page_base {
            Some(page) => page.join(href).ok(),
            None => Url::parse(href).ok(),
        })
        .or(page_base);

    let links: Vec<String> = document
        .select(&ANCHOR_SELECTOR)
        .filter_map(|el| el.value().attr("href"))
        .filter_map(|href| resolve_href(base.as_ref(), href.trim()))
        .collect();

    trace!("Extracted {} anchor links relative to {}", links.len(), base_url);
    links
}

fn resolve_href(base: Option<&Url>, href: &str) -> Option<String> {
    let resolved = match base {
        Some(base) => base.join(href),
        None => Url::parse(href),
    };
    match resolved {
        Ok(url) => Some(url.to_string()),
        Err(e) => {
            trace!("Dropping href '{}': {}", href, e);
            None
        }
    }
}

fn is_html(content_type: &str) -> bool {
    let mime = content_type.split(';').next().unwrap_or("").trim();
    HTML_CONTENT_TYPES
        .iter()
        .any(|html| mime.eq_ignore_ascii_case(html))
}

/// Fetches pages and pulls outbound links from them
#[derive(Clone)]
pub struct LinkExtractor {
    fetcher: Arc<dyn Fetcher>,
}

impl LinkExtractor {
    pub fn new(fetcher: Arc<dyn Fetcher>) -> Self {
        Self { fetcher }
    }

    /// Returns the anchor links found on the page at `url`
    ///
    /// The page is loaded like a browser would, following a few redirects,
    /// and relative links are resolved against the URL it was finally
    /// served from. Any failure (transport error, non-2xx status, non-HTML
    /// content) yields an empty list.
    ///
    /// # Arguments
    /// * `url` - The page to load
    ///
    /// # Returns
    /// * `Vec<String>` - Absolute link URLs in document order, possibly empty
    pub async fn extract_links(&self, url: &str) -> Vec<String> {
        let resp = match self.fetcher.fetch(url, FetchMode::Full).await {
            Ok(r) => r,
            Err(e) => {
                warn!("Fetching {} for links failed: {:#}", url, e);
                return Vec::new();
            }
        };

        if !resp.is_success() {
            debug!("Status {} at {}, no links extracted", resp.status, url);
            return Vec::new();
        }

        if let Some(content_type) = resp.content_type() {
            if !is_html(content_type) {
                debug!("Content type '{}' at {} is not HTML", content_type, url);
                return Vec::new();
            }
        }

        let page_url = resp.served_from(url);
        let links = extract_anchor_links(&resp.body, page_url);
        debug!("Found {} links on {}", links.len(), page_url);
        links
    }
}
