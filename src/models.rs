use serde::{Deserialize, Serialize};

/// One user's scraped wishlist, captured whole at the start of a pass and
/// discarded when the pass ends.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WishlistSnapshot {
    pub owner_id: i64,
    pub slugs: Vec<String>,
}

/// Catalog metadata for one game, keyed by slug. Field names follow the
/// catalog API payload so records deserialize straight off the wire.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetadataRecord {
    #[serde(default)]
    pub slug: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub external_games: Vec<ExternalGame>,
}

/// Cross-reference from a metadata record into another catalog.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExternalGame {
    #[serde(default)]
    pub uid: String,
    #[serde(default)]
    pub external_game_source: ExternalSource,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExternalSource {
    #[serde(default)]
    pub name: String,
}

/// Storefront pricing for one app in one region. The same title has
/// independent records per region; `discount_percent == 0` means not
/// currently discounted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PricingRecord {
    pub app_id: u64,
    pub region: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub discount_percent: u32,
    #[serde(default)]
    pub initial_formatted: String,
    #[serde(default)]
    pub final_formatted: String,
}

/// Per-user settings owned by the chat-command collaborator; the pipeline
/// only reads them.
#[derive(Debug, Clone, PartialEq)]
pub struct UserPreference {
    pub owner_id: i64,
    pub profile_url: String,
    pub region: String,
}

impl UserPreference {
    /// A preference missing either field is skipped for the pass, not
    /// treated as an error.
    pub fn is_valid(&self) -> bool {
        !self.profile_url.trim().is_empty() && !self.region.trim().is_empty()
    }
}

/// One discounted title, derived fresh each pass.
#[derive(Debug, Clone, PartialEq)]
pub struct SaleEntry {
    pub name: String,
    pub store_url: String,
    pub discount_percent: u32,
    pub initial_formatted: String,
    pub final_formatted: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn preference_requires_profile_and_region() {
        let pref = UserPreference {
            owner_id: 1,
            profile_url: "https://backloggd.com/u/bob".into(),
            region: "US".into(),
        };
        assert!(pref.is_valid());
        assert!(!UserPreference { profile_url: String::new(), ..pref.clone() }.is_valid());
        assert!(!UserPreference { region: "  ".into(), ..pref }.is_valid());
    }

    #[test]
    fn metadata_record_decodes_catalog_payload() {
        let raw = r#"{
            "id": 71,
            "name": "Portal",
            "slug": "portal",
            "external_games": [
                {"id": 9, "uid": "400", "external_game_source": {"id": 1, "name": "Steam"}}
            ]
        }"#;
        let record: MetadataRecord = serde_json::from_str(raw).unwrap();
        assert_eq!(record.slug, "portal");
        assert_eq!(record.external_games.len(), 1);
        assert_eq!(record.external_games[0].uid, "400");
        assert_eq!(record.external_games[0].external_game_source.name, "Steam");
    }

    #[test]
    fn metadata_record_tolerates_missing_cross_references() {
        let record: MetadataRecord =
            serde_json::from_str(r#"{"name": "Halo", "slug": "halo"}"#).unwrap();
        assert!(record.external_games.is_empty());
    }
}
