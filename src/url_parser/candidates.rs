use std::collections::HashSet;
use tracing::{debug, trace};

use super::host::normalize_url;
use super::patterns::CANDIDATE_URL_REGEX;

/// Finds every URL-shaped substring in free text
///
/// Matches are returned in order of first appearance. Repeated URLs are
/// collapsed so each one is evaluated once per call; spellings that
/// normalize to the same URL count as repeats and the first one is kept.
pub fn extract_candidate_urls(content: &str) -> Vec<String> {
    let mut seen = HashSet::new();
    let candidates: Vec<String> = CANDIDATE_URL_REGEX
        .find_iter(content)
        .map(|m| m.as_str())
        .filter(|url| seen.insert(normalize_url(url)))
        .map(str::to_owned)
        .collect();

    debug!("Found {} candidate URLs in content", candidates.len());
    trace!("Candidate URLs: {:?}", candidates);
    candidates
}
