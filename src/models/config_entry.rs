use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One entry of the upstream `config-index.json`
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfigIndexEntry {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub author: String,
    #[serde(default)]
    pub version: String,
    #[serde(default)]
    pub download_url: String,
    #[serde(default)]
    pub icon_url: String,
    #[serde(default)]
    pub filename: String,
    #[serde(default)]
    pub directory: String,
}

/// Config record returned to the front-end
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ConfigMetadata {
    pub id: String,
    pub name: String,
    pub description: String,
    pub author: String,
    pub version: String,
    pub download_url: String,
    pub icon_url: String,
    pub filename: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ConfigMetadata {
    pub fn from_index(entry: &ConfigIndexEntry, now: DateTime<Utc>) -> Self {
        Self {
            id: entry.id.clone(),
            name: entry.name.clone(),
            description: entry.description.clone(),
            author: entry.author.clone(),
            version: if entry.version.is_empty() {
                "1.0.0".to_string()
            } else {
                entry.version.clone()
            },
            download_url: entry.download_url.clone(),
            icon_url: entry.icon_url.clone(),
            filename: entry.filename.clone(),
            created_at: now,
            updated_at: now,
        }
    }
}

/// Response body of `GET /api/configs`
#[derive(Debug, Clone, Default, Serialize)]
pub struct ConfigListing {
    pub configs: Vec<ConfigMetadata>,
}
