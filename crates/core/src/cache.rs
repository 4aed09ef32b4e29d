//! Versioned on-disk cache for the built recipe dataset.
//!
//! A single JSON file holds the whole [`RecipeDataset`]. Writes go through
//! a sibling temp file followed by a rename so readers never observe a
//! half-written payload. Loads are forgiving: any read, parse, version, or
//! shape problem just means "no cache" and triggers a rebuild.

use std::path::{Path, PathBuf};

use log::{debug, warn};

use crate::constants::CACHE_VERSION;
use crate::errors::Result;
use crate::model::RecipeDataset;

pub struct RecipeCacheStore {
    path: PathBuf,
}

impl RecipeCacheStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load the cached dataset, or `None` when it is absent, unreadable,
    /// from a different cache version, or empty.
    pub async fn load(&self) -> Option<RecipeDataset> {
        let raw = tokio::fs::read_to_string(&self.path).await.ok()?;
        let dataset: RecipeDataset = match serde_json::from_str(&raw) {
            Ok(dataset) => dataset,
            Err(err) => {
                warn!("discarding unreadable recipe cache: {err}");
                return None;
            }
        };
        if dataset.cache_version != CACHE_VERSION {
            debug!(
                "discarding recipe cache version {} (current {})",
                dataset.cache_version, CACHE_VERSION
            );
            return None;
        }
        if dataset.recipes.is_empty() {
            return None;
        }
        Some(dataset)
    }

    /// Persist the dataset atomically.
    pub async fn save(&self, dataset: &RecipeDataset) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let payload = serde_json::to_vec_pretty(dataset)?;
        let tmp = self.path.with_extension("tmp.json");
        tokio::fs::write(&tmp, &payload).await?;
        tokio::fs::rename(&tmp, &self.path).await?;
        debug!(
            "wrote {} recipes to {}",
            dataset.recipe_count,
            self.path.display()
        );
        Ok(())
    }
}
