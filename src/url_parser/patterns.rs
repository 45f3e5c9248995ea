use once_cell::sync::Lazy;
use regex::Regex;

/// An http or https URL running up to the next whitespace
pub static CANDIDATE_URL_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"https?://[^\s]+").unwrap()
});
