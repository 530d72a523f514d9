use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::Value;
use tracing::debug;

use crate::models::PricingRecord;
use crate::providers::{FetchError, PricingFetcher};
use crate::util::env::env_parse;

const STEAM_APPDETAILS_ENDPOINT: &str = "https://store.steampowered.com/api/appdetails/";

/// Steam storefront pricing client.
///
/// The appdetails endpoint takes one app id at a time; there is no batched
/// alternative. Requests run strictly sequentially with a fixed delay in
/// between to respect the storefront's rate limit. Do not parallelize this
/// without renegotiating that limit.
pub struct SteamClient {
    http: Client,
    request_delay: Duration,
}

#[derive(Debug, Deserialize)]
struct AppData {
    #[serde(default)]
    name: String,
    #[serde(default)]
    steam_appid: u64,
    price_overview: Option<PriceOverview>,
}

#[derive(Debug, Default, Deserialize)]
struct PriceOverview {
    #[serde(default)]
    discount_percent: u32,
    #[serde(default)]
    initial_formatted: String,
    #[serde(default)]
    final_formatted: String,
}

impl SteamClient {
    pub fn new_from_env() -> Result<Self> {
        let timeout: u64 = env_parse("HTTP_TIMEOUT_SECS", 30u64);
        let delay: u64 = env_parse("STEAM_FETCH_DELAY_SECS", 2u64);
        let http = Client::builder()
            .timeout(Duration::from_secs(timeout))
            .build()
            .context("failed to construct Steam HTTP client")?;
        Ok(Self {
            http,
            request_delay: Duration::from_secs(delay),
        })
    }

    /// Single decision point for the per-id success flag. A false (or
    /// absent) flag aborts the whole batch for this user's pass.
    fn check_success(app_id: u64, entry: Option<&Value>) -> Result<(), FetchError> {
        let ok = entry
            .and_then(|e| e.get("success"))
            .and_then(Value::as_bool)
            .unwrap_or(false);
        if ok {
            Ok(())
        } else {
            Err(FetchError::ExternalApi { app_id })
        }
    }

    /// Decode the `data` payload for one app. A missing `price_overview`
    /// is not a failure; it yields a zero discount.
    fn decode_app_entry(
        app_id: u64,
        region: &str,
        entry: Option<&Value>,
    ) -> Result<PricingRecord, FetchError> {
        let data = entry
            .and_then(|e| e.get("data"))
            .cloned()
            .unwrap_or(Value::Null);
        let data: AppData = serde_json::from_value(data)?;
        let price = data.price_overview.unwrap_or_default();
        Ok(PricingRecord {
            app_id: if data.steam_appid != 0 {
                data.steam_appid
            } else {
                app_id
            },
            region: region.to_string(),
            name: data.name,
            discount_percent: price.discount_percent,
            initial_formatted: price.initial_formatted,
            final_formatted: price.final_formatted,
        })
    }
}

#[async_trait]
impl PricingFetcher for SteamClient {
    async fn fetch_app_details(
        &self,
        app_ids: &[u64],
        region: &str,
    ) -> Result<Vec<PricingRecord>, FetchError> {
        let mut records = Vec::with_capacity(app_ids.len());
        for app_id in app_ids {
            let url = format!(
                "{STEAM_APPDETAILS_ENDPOINT}?appids={app_id}&l=english&cc={region}"
            );
            let response = self.http.get(&url).send().await?;
            let status = response.status();
            if !status.is_success() {
                return Err(FetchError::Status {
                    status: status.as_u16(),
                    context: format!("steam appdetails for {app_id}"),
                });
            }
            let body: Value = response.json().await?;
            let key = app_id.to_string();
            Self::check_success(*app_id, body.get(&key))?;
            records.push(Self::decode_app_entry(*app_id, region, body.get(&key))?);
            debug!(app_id, region, "steam appdetails fetched");
            // Mandatory spacing against the storefront rate limit.
            tokio::time::sleep(self.request_delay).await;
        }
        Ok(records)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn false_success_flag_aborts() {
        let entry = json!({"success": false});
        let err = SteamClient::check_success(400, Some(&entry)).unwrap_err();
        assert!(matches!(err, FetchError::ExternalApi { app_id: 400 }));
    }

    #[test]
    fn missing_entry_counts_as_failure() {
        assert!(SteamClient::check_success(400, None).is_err());
    }

    #[test]
    fn decodes_discounted_app() {
        let entry = json!({
            "success": true,
            "data": {
                "name": "Portal",
                "steam_appid": 400,
                "price_overview": {
                    "discount_percent": 50,
                    "initial": 1999,
                    "initial_formatted": "$20",
                    "final": 999,
                    "final_formatted": "$10"
                }
            }
        });
        SteamClient::check_success(400, Some(&entry)).unwrap();
        let record = SteamClient::decode_app_entry(400, "US", Some(&entry)).unwrap();
        assert_eq!(record.app_id, 400);
        assert_eq!(record.region, "US");
        assert_eq!(record.name, "Portal");
        assert_eq!(record.discount_percent, 50);
        assert_eq!(record.initial_formatted, "$20");
        assert_eq!(record.final_formatted, "$10");
    }

    #[test]
    fn missing_price_overview_yields_zero_discount() {
        let entry = json!({
            "success": true,
            "data": {"name": "Free Game", "steam_appid": 500}
        });
        let record = SteamClient::decode_app_entry(500, "US", Some(&entry)).unwrap();
        assert_eq!(record.discount_percent, 0);
        assert!(record.initial_formatted.is_empty());
    }
}
