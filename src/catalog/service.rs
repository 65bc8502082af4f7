use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use serde::de::DeserializeOwned;

use super::cache::IndexCache;
use super::{CdnError, ContentSource};
use crate::config::Config;
use crate::models::{ConfigIndexEntry, ConfigMetadata, Script, ScriptIndexEntry, ScriptKind, ScriptListing};

const CONFIG_INDEX_PATH: &str = "config-index.json";

/// Catalog read path
///
/// Listings never fail: an unreachable or malformed upstream index yields the
/// last good listing, or an empty one.
pub struct CatalogService {
    source: Arc<dyn ContentSource>,
    configs_repo: String,
    scripts_repo: String,
    configs: IndexCache<Vec<ConfigMetadata>>,
    scripts: IndexCache<ScriptListing>,
}

impl CatalogService {
    pub fn new(source: Arc<dyn ContentSource>, config: &Config) -> Self {
        let ttl = Duration::from_secs(config.catalog_cache_secs);
        Self {
            source,
            configs_repo: config.configs_repo.clone(),
            scripts_repo: config.scripts_repo.clone(),
            configs: IndexCache::new(ttl),
            scripts: IndexCache::new(ttl),
        }
    }

    async fn fetch_index<T: DeserializeOwned>(&self, repo: &str, path: &str) -> Result<T, CdnError> {
        let bytes = self.source.fetch(repo, path).await?;
        serde_json::from_slice(&bytes).map_err(|source| CdnError::Decode {
            url: self.source.public_url(repo, path),
            source,
        })
    }

    pub async fn list_configs(&self) -> Vec<ConfigMetadata> {
        if let Some(configs) = self.configs.fresh() {
            return configs;
        }

        match self
            .fetch_index::<Vec<ConfigIndexEntry>>(&self.configs_repo, CONFIG_INDEX_PATH)
            .await
        {
            Ok(entries) => {
                let now = Utc::now();
                let configs: Vec<ConfigMetadata> = entries
                    .iter()
                    .map(|e| ConfigMetadata::from_index(e, now))
                    .collect();
                tracing::debug!("Loaded {} configs from index", configs.len());
                self.configs.store(configs.clone());
                configs
            }
            Err(e) => {
                tracing::error!("Error fetching configs: {}", e);
                self.configs.stale().unwrap_or_default()
            }
        }
    }

    pub async fn script_index(&self, kind: ScriptKind) -> Result<Vec<ScriptIndexEntry>, CdnError> {
        self.fetch_index(&self.scripts_repo, &kind.index_path()).await
    }

    pub async fn list_scripts(&self) -> ScriptListing {
        if let Some(listing) = self.scripts.fresh() {
            return listing;
        }

        let (modules, commands) = tokio::join!(
            self.script_index(ScriptKind::Module),
            self.script_index(ScriptKind::Command)
        );

        match (modules, commands) {
            (Ok(modules), Ok(commands)) => {
                let now = Utc::now();
                let base = self.source.public_url(&self.scripts_repo, "");
                let base = base.trim_end_matches('/');
                let listing = ScriptListing {
                    module: modules
                        .iter()
                        .map(|e| Script::from_index(e, base, now))
                        .collect(),
                    command: commands
                        .iter()
                        .map(|e| Script::from_index(e, base, now))
                        .collect(),
                };
                self.scripts.store(listing.clone());
                listing
            }
            (Err(e), _) | (_, Err(e)) => {
                tracing::error!("Error fetching scripts: {}", e);
                self.scripts.stale().unwrap_or_default()
            }
        }
    }

    /// Zipped config archive
    pub async fn config_archive(&self, config_id: &str) -> Result<Vec<u8>, CdnError> {
        self.source
            .fetch(&self.configs_repo, &format!("{}.zip", config_id))
            .await
    }

    pub async fn config_icon(&self, config_id: &str) -> Result<Vec<u8>, CdnError> {
        self.source
            .fetch(&self.configs_repo, &format!("{}/icon.png", config_id))
            .await
    }

    /// Look a script up by name and fetch its source
    ///
    /// Returns `Ok(None)` when the index has no matching entry.
    pub async fn script_source(
        &self,
        kind: ScriptKind,
        name: &str,
    ) -> Result<Option<(ScriptIndexEntry, Vec<u8>)>, CdnError> {
        let entries = self.script_index(kind).await?;
        let Some(entry) = entries.into_iter().find(|e| e.matches(name)) else {
            return Ok(None);
        };

        let content = self
            .source
            .fetch(&self.scripts_repo, &format!("{}/{}", kind, entry.filename))
            .await?;
        Ok(Some((entry, content)))
    }
}
