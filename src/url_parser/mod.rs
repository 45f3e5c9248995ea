pub mod blocklist;
pub mod candidates;
pub mod host;
pub mod patterns;


pub use blocklist::Blocklist;
pub use candidates::extract_candidate_urls;
pub use host::{extract_host, normalize_url};
