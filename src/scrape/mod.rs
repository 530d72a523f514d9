pub mod backloggd;

pub use backloggd::WishlistScraper;

use async_trait::async_trait;

#[derive(Debug, thiserror::Error)]
pub enum ScrapeError {
    #[error("could not find {0} on {1}")]
    Resolution(&'static str, String),
    #[error("request failed with status {status}: {url}")]
    Status { status: u16, url: String },
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("could not resolve link: {0}")]
    BadLink(String),
}

/// Produces the full slug set for one profile URL, or fails the user's pass.
/// An empty result is a valid outcome (empty wishlist), never an error.
#[async_trait]
pub trait WishlistSource: Send + Sync {
    async fn scrape(&self, profile_url: &str) -> Result<Vec<String>, ScrapeError>;
}
