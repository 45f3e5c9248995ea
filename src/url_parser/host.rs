use url::Url;

/// Extracts the hostname from a URL string
///
/// Returns `None` when the string does not parse or has no host. Unlike
/// domain display helpers this keeps any `www.` prefix, since blocklist
/// entries are compared against the exact host.
pub fn extract_host(url: &str) -> Option<String> {
    match Url::parse(url) {
        Ok(parsed) => parsed.host_str().map(str::to_owned),
        Err(e) => {
            tracing::debug!("Cannot extract host from '{}': {}", url, e);
            None
        }
    }
}

/// Canonical form of a URL used to tell whether two spellings are the same
///
/// Parsing fills in what the `url` crate normalizes (root path, host case,
/// default port), so `http://A.example` and `http://a.example/` compare
/// equal. Strings that do not parse are returned as written.
pub fn normalize_url(url: &str) -> String {
    Url::parse(url)
        .map(String::from)
        .unwrap_or_else(|_| url.to_owned())
}
