//! Build orchestration: tries sources in priority order, extracts and
//! deduplicates recipes, and serves the result from memory or disk cache.
//!
//! [`RecipeService::ensure_build`] is the only entry point consumers need.
//! Concurrent callers during a rebuild share one in-flight build future, so
//! the sources are hit at most once regardless of request fan-in.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use chrono::Utc;
use futures::future::{BoxFuture, FutureExt, Shared};
use log::{debug, info, warn};
use serde_json::Value;
use tokio::sync::RwLock;

use crate::cache::RecipeCacheStore;
use crate::constants::{CACHE_VERSION, PLACEHOLDER_MARKER};
use crate::errors::BuildError;
use crate::extract::{validate_manual_recipes, JsonRecipeExtractor};
use crate::extract::xml::XmlRecipeParser;
use crate::heuristics;
use crate::model::{Recipe, RecipeDataset};
use crate::sources::{SourceContent, SourceReader, SourceSpec};

type SharedBuild = Shared<BoxFuture<'static, BuildOutcome>>;
type BuildOutcome = Result<Arc<RecipeDataset>, Arc<BuildError>>;

struct Inner {
    reader: Arc<dyn SourceReader>,
    cache: RecipeCacheStore,
    name_sources: Vec<SourceSpec>,
    recipe_sources: Vec<SourceSpec>,
    dataset: RwLock<Option<Arc<RecipeDataset>>>,
    in_flight: Mutex<Option<SharedBuild>>,
}

/// Cached, single-flight access to the built recipe dataset.
#[derive(Clone)]
pub struct RecipeService {
    inner: Arc<Inner>,
}

impl RecipeService {
    pub fn new(
        reader: Arc<dyn SourceReader>,
        cache: RecipeCacheStore,
        name_sources: Vec<SourceSpec>,
        recipe_sources: Vec<SourceSpec>,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                reader,
                cache,
                name_sources,
                recipe_sources,
                dataset: RwLock::new(None),
                in_flight: Mutex::new(None),
            }),
        }
    }

    /// Return the dataset, building it if needed. With `force` the caches
    /// are bypassed and a fresh build runs (joining one already in flight).
    pub async fn ensure_build(&self, force: bool) -> BuildOutcome {
        if !force {
            if let Some(dataset) = self.cached_dataset().await {
                return Ok(dataset);
            }
        }

        let build = {
            let mut slot = self
                .inner
                .in_flight
                .lock()
                .unwrap_or_else(|poisoned| poisoned.into_inner());
            match slot.as_ref() {
                Some(build) => build.clone(),
                None => {
                    let inner = Arc::clone(&self.inner);
                    let build: SharedBuild = async move {
                        let outcome = Self::build_dataset(&inner).await;
                        let mut slot = inner
                            .in_flight
                            .lock()
                            .unwrap_or_else(|poisoned| poisoned.into_inner());
                        *slot = None;
                        outcome
                    }
                    .boxed()
                    .shared();
                    *slot = Some(build.clone());
                    build
                }
            }
        };

        build.await
    }

    /// Memory cache first, disk cache second; a disk hit repopulates the
    /// memory holder.
    async fn cached_dataset(&self) -> Option<Arc<RecipeDataset>> {
        if let Some(dataset) = self.inner.dataset.read().await.as_ref() {
            if !dataset.recipes.is_empty() {
                return Some(Arc::clone(dataset));
            }
        }

        let loaded = Arc::new(self.inner.cache.load().await?);
        let mut holder = self.inner.dataset.write().await;
        *holder = Some(Arc::clone(&loaded));
        Some(loaded)
    }

    async fn build_dataset(inner: &Arc<Inner>) -> BuildOutcome {
        let names = Self::load_item_names(inner).await;
        let (source, recipes) = Self::load_recipes_from_sources(inner, &names)
            .await
            .map_err(Arc::new)?;

        if recipes.is_empty() {
            return Err(Arc::new(BuildError::Schema(
                "recipe build produced 0 recipes".to_string(),
            )));
        }

        info!("built {} recipes from '{}'", recipes.len(), source);

        let dataset = Arc::new(RecipeDataset {
            cache_version: CACHE_VERSION,
            generated_at: Utc::now(),
            source,
            recipe_count: recipes.len(),
            recipes,
        });

        if let Err(err) = inner.cache.save(&dataset).await {
            warn!("failed to persist recipe cache: {err}");
        }

        let mut holder = inner.dataset.write().await;
        *holder = Some(Arc::clone(&dataset));

        Ok(dataset)
    }

    /// Best-effort name loading: first source that yields any names wins,
    /// failures just move on to the next source.
    async fn load_item_names(inner: &Arc<Inner>) -> HashMap<String, String> {
        let mut names = HashMap::new();

        for spec in &inner.name_sources {
            let content = match inner.reader.read(spec).await {
                Ok(content) => content,
                Err(err) => {
                    debug!("name source '{}' unavailable: {err}", spec.label);
                    continue;
                }
            };
            let SourceContent::Json(raw) = content else {
                continue;
            };

            for entry in entries_of(&raw) {
                let Some(item_id) = heuristics::item_id(entry) else {
                    continue;
                };
                if item_id.starts_with(PLACEHOLDER_MARKER) || names.contains_key(&item_id) {
                    continue;
                }
                let name = heuristics::localized_name(entry, &item_id);
                names.insert(item_id, name);
            }

            if !names.is_empty() {
                debug!("loaded {} item names from '{}'", names.len(), spec.label);
                break;
            }
        }

        names
    }

    /// First source that yields at least one recipe wins. A total miss
    /// produces [`BuildError::Exhausted`] carrying one reason per source.
    async fn load_recipes_from_sources(
        inner: &Arc<Inner>,
        names: &HashMap<String, String>,
    ) -> Result<(String, Vec<Recipe>), BuildError> {
        let mut reasons = Vec::new();

        for spec in &inner.recipe_sources {
            let content = match inner.reader.read(spec).await {
                Ok(content) => content,
                Err(err) => {
                    reasons.push(format!("{} -> {err}", spec.label));
                    continue;
                }
            };

            match content {
                SourceContent::Xml(raw) => {
                    let recipes = XmlRecipeParser::parse(&raw, names);
                    if recipes.is_empty() {
                        reasons.push(format!("{} -> parsed 0 recipes from XML", spec.label));
                        continue;
                    }
                    return Ok((spec.label.clone(), recipes));
                }
                SourceContent::Json(raw) => {
                    if let Some(manual) = validate_manual_recipes(&raw) {
                        return Ok((spec.label.clone(), manual));
                    }

                    let entries = entries_of(&raw);
                    if entries.is_empty() {
                        reasons.push(format!("{} -> parsed 0 entries", spec.label));
                        continue;
                    }

                    let extractor = JsonRecipeExtractor::new();
                    let recipes = extractor.extract_recipes_from_entries(&entries, names);
                    if recipes.is_empty() {
                        reasons.push(format!(
                            "{} -> parsed 0 recipes from {} entries",
                            spec.label,
                            entries.len()
                        ));
                        continue;
                    }

                    return Ok((spec.label.clone(), recipes));
                }
            }
        }

        Err(BuildError::Exhausted { reasons })
    }
}

/// Flatten a raw payload into candidate entries: list containers first,
/// then a deep scan for identifiable objects.
fn entries_of(raw: &Value) -> Vec<&Value> {
    let direct = heuristics::coerce_to_list(raw);
    if !direct.is_empty() {
        direct
    } else {
        heuristics::collect_default(raw)
    }
}
