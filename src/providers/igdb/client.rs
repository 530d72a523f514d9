use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use itertools::Itertools;
use reqwest::Client;
use serde::Deserialize;
use tokio::sync::Mutex;
use tracing::debug;

use crate::models::MetadataRecord;
use crate::providers::{FetchError, MetadataFetcher};
use crate::util::env::{env_parse, env_req};

const TWITCH_TOKEN_URL: &str = "https://id.twitch.tv/oauth2/token";
const IGDB_GAMES_ENDPOINT: &str = "https://api.igdb.com/v4/games";

/// IGDB metadata client.
///
/// Auth follows the Twitch client-credentials exchange: the access token is
/// requested on first use and cached for the process lifetime (no refresh).
/// Queries are IGDB's query language posted as text/plain with `Client-ID`
/// and bearer `Authorization` headers.
pub struct IgdbClient {
    http: Client,
    client_id: String,
    client_secret: String,
    token: Mutex<Option<String>>,
}

#[derive(Debug, Deserialize)]
struct TwitchTokenResponse {
    access_token: String,
}

impl IgdbClient {
    pub fn new_from_env() -> Result<Self> {
        let client_id = env_req("TWITCH_CLIENT_ID").context("required for IGDB")?;
        let client_secret = env_req("TWITCH_CLIENT_SECRET").context("required for IGDB")?;
        let timeout: u64 = env_parse("HTTP_TIMEOUT_SECS", 30u64);
        let http = Client::builder()
            .timeout(Duration::from_secs(timeout))
            .build()
            .context("failed to construct IGDB HTTP client")?;
        Ok(Self {
            http,
            client_id,
            client_secret,
            token: Mutex::new(None),
        })
    }

    async fn ensure_token(&self) -> Result<String, FetchError> {
        let mut guard = self.token.lock().await;
        if let Some(token) = guard.as_ref() {
            return Ok(token.clone());
        }
        let token = self.request_token().await?;
        *guard = Some(token.clone());
        Ok(token)
    }

    async fn request_token(&self) -> Result<String, FetchError> {
        let response = self
            .http
            .post(TWITCH_TOKEN_URL)
            .query(&[
                ("client_id", self.client_id.as_str()),
                ("client_secret", self.client_secret.as_str()),
                ("grant_type", "client_credentials"),
            ])
            .send()
            .await?;
        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status {
                status: status.as_u16(),
                context: "twitch token request".into(),
            });
        }
        let token: TwitchTokenResponse = response.json().await?;
        debug!("twitch oauth token obtained");
        Ok(token.access_token)
    }

    /// Query body carrying every missing slug in one IN-list. The service
    /// is assumed to accept an arbitrarily large list; no chunking here.
    fn games_query(slugs: &[String]) -> String {
        let quoted = slugs.iter().map(|s| format!("\"{s}\"")).join(", ");
        format!(
            "fields name, slug, external_games.uid, external_games.external_game_source.name; \
             where slug = ({quoted});"
        )
    }
}

#[async_trait]
impl MetadataFetcher for IgdbClient {
    async fn fetch_games(&self, slugs: &[String]) -> Result<Vec<MetadataRecord>, FetchError> {
        let token = self.ensure_token().await?;
        let response = self
            .http
            .post(IGDB_GAMES_ENDPOINT)
            .header("Client-ID", &self.client_id)
            .header("Content-Type", "text/plain")
            .header("Authorization", format!("Bearer {token}"))
            .body(Self::games_query(slugs))
            .send()
            .await?;
        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status {
                status: status.as_u16(),
                context: "igdb games query".into(),
            });
        }
        let text = response.text().await?;
        let games: Vec<MetadataRecord> = serde_json::from_str(&text)?;
        debug!(requested = slugs.len(), matched = games.len(), "igdb batch fetched");
        Ok(games)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn games_query_quotes_every_slug() {
        let body = IgdbClient::games_query(&["halo".into(), "portal".into()]);
        assert!(body.starts_with("fields name, slug, external_games.uid"));
        assert!(body.contains(r#"where slug = ("halo", "portal");"#));
    }

    #[test]
    fn games_query_with_single_slug_has_no_separator() {
        let body = IgdbClient::games_query(&["portal".into()]);
        assert!(body.contains("(\"portal\")"));
    }
}
