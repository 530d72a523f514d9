use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use scraper::{Html, Selector};
use tracing::debug;
use url::Url;

use crate::scrape::{ScrapeError, WishlistSource};
use crate::types::keyset::KeySet;
use crate::util::env::{env_opt, env_parse};

const DEFAULT_BASE_URL: &str = "https://backloggd.com/";

// The site serves a reduced page to obvious bots.
const USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 \
                          (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";

const GAMES_LINK_SELECTOR: &str = "a[href^='/u/'][href$='/games/']";
const WISHLIST_LINK_SELECTOR: &str = "a[href^='/u/'][href$='/type:wishlist/']";
const ENTRY_LINK_SELECTOR: &str = "div#game-lists a[href^='/games/']";
const PAGE_LINK_SELECTOR: &str = "nav[aria-label='Pages'] > a[href^='/page=']";

/// Static-HTML wishlist scraper.
///
/// Resolution walks three hops (profile page, games index, wishlist view),
/// then unions slug sets across every pagination link found on the wishlist
/// view. Pages are independent, so discovery order does not matter. Any
/// network or parse failure at any hop fails the whole scrape; the caller
/// skips that user for the cycle.
pub struct WishlistScraper {
    http: Client,
    base: Url,
    games_link: Selector,
    wishlist_link: Selector,
    entry_links: Selector,
    page_links: Selector,
}

fn parse_selector(raw: &str) -> Result<Selector> {
    Selector::parse(raw).map_err(|err| anyhow!("invalid selector {raw}: {err}"))
}

impl WishlistScraper {
    pub fn new(base_url: &str) -> Result<Self> {
        let base = Url::parse(base_url)
            .with_context(|| format!("invalid wishlist base url: {base_url}"))?;
        let timeout: u64 = env_parse("HTTP_TIMEOUT_SECS", 30u64);
        let http = Client::builder()
            .user_agent(USER_AGENT)
            .timeout(Duration::from_secs(timeout))
            .build()
            .context("failed to construct wishlist HTTP client")?;
        Ok(Self {
            http,
            base,
            games_link: parse_selector(GAMES_LINK_SELECTOR)?,
            wishlist_link: parse_selector(WISHLIST_LINK_SELECTOR)?,
            entry_links: parse_selector(ENTRY_LINK_SELECTOR)?,
            page_links: parse_selector(PAGE_LINK_SELECTOR)?,
        })
    }

    pub fn new_from_env() -> Result<Self> {
        let base = env_opt("WISHLIST_BASE_URL").unwrap_or_else(|| DEFAULT_BASE_URL.to_string());
        Self::new(&base)
    }

    async fn get_page(&self, url: &Url) -> Result<String, ScrapeError> {
        let response = self.http.get(url.clone()).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(ScrapeError::Status {
                status: status.as_u16(),
                url: url.to_string(),
            });
        }
        Ok(response.text().await?)
    }

    /// Resolve a possibly host-relative href against the site's base origin.
    fn resolve(&self, href: &str) -> Result<Url, ScrapeError> {
        self.base
            .join(href)
            .map_err(|_| ScrapeError::BadLink(href.to_string()))
    }

    fn first_href(&self, body: &str, selector: &Selector) -> Option<String> {
        let doc = Html::parse_document(body);
        doc.select(selector)
            .next()
            .and_then(|el| el.value().attr("href"))
            .map(str::to_string)
    }

    /// Union this page's entry slugs into the accumulator.
    fn collect_slugs(&self, body: &str, acc: &mut KeySet) {
        let doc = Html::parse_document(body);
        for href in doc
            .select(&self.entry_links)
            .filter_map(|el| el.value().attr("href"))
        {
            if let Some(slug) = slug_from_href(href) {
                acc.insert(slug);
            }
        }
    }

    fn pagination_links(&self, body: &str) -> KeySet {
        let doc = Html::parse_document(body);
        let mut pages = KeySet::new();
        for href in doc
            .select(&self.page_links)
            .filter_map(|el| el.value().attr("href"))
        {
            pages.insert(href);
        }
        pages
    }
}

/// The slug is the second path segment of an entry href ("/games/<slug>/").
fn slug_from_href(href: &str) -> Option<&str> {
    href.split('/').nth(2).filter(|s| !s.is_empty())
}

#[async_trait]
impl WishlistSource for WishlistScraper {
    async fn scrape(&self, profile_url: &str) -> Result<Vec<String>, ScrapeError> {
        let profile = Url::parse(profile_url)
            .map_err(|_| ScrapeError::BadLink(profile_url.to_string()))?;
        let body = self.get_page(&profile).await?;
        let games_href = self
            .first_href(&body, &self.games_link)
            .ok_or_else(|| ScrapeError::Resolution("games index link", profile_url.to_string()))?;

        let games_url = self.resolve(&games_href)?;
        let body = self.get_page(&games_url).await?;
        let wishlist_href = self
            .first_href(&body, &self.wishlist_link)
            .ok_or_else(|| ScrapeError::Resolution("wishlist link", games_url.to_string()))?;

        let wishlist_url = self.resolve(&wishlist_href)?;
        let body = self.get_page(&wishlist_url).await?;

        let mut slugs = KeySet::new();
        self.collect_slugs(&body, &mut slugs);

        for page_href in self.pagination_links(&body).into_values() {
            let page_url = self.resolve(&page_href)?;
            let body = self.get_page(&page_url).await?;
            self.collect_slugs(&body, &mut slugs);
        }

        debug!(profile = profile_url, slugs = slugs.len(), "wishlist scraped");
        Ok(slugs.into_values())
    }
}
