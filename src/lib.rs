//! Redirect-aware link spam checking.
//!
//! Content is flagged when any URL in it, or any link on the page that URL
//! finally lands on, resolves to a blocklisted host.

pub mod config;
pub mod fetcher;
pub mod link_extractor;
pub mod spam_checker;
pub mod url_crawler;
pub mod url_parser;
pub mod utils;

pub use config::{CheckerConfig, HostMatching};
pub use fetcher::{FetchMode, FetchResponse, Fetcher, HttpFetcher};
pub use spam_checker::{is_spam, SpamChecker};
pub use url_parser::Blocklist;
