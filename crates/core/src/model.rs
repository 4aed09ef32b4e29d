//! Canonical recipe data model.
//!
//! A [`Recipe`] is created during one build pass and is immutable
//! thereafter; the [`RecipeDataset`] is replaced wholesale on each
//! successful rebuild, never mutated in place. Wire names are camelCase to
//! match the persisted cache record.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::constants::ENCHANT_SEPARATOR;

/// One ingredient reference inside a recipe. Amounts are positive and may
/// be fractional in source data.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IngredientRef {
    /// Ingredient item identifier
    pub item_id: String,
    /// Units required to craft one unit of the owning item
    pub amount: f64,
}

impl IngredientRef {
    pub fn new(item_id: impl Into<String>, amount: f64) -> Self {
        Self {
            item_id: item_id.into(),
            amount,
        }
    }
}

/// Canonical minimal crafting recipe for one item.
///
/// Invariants (enforced during extraction, checked by tests):
/// - `ingredients` is non-empty and deduplicated by ingredient id;
/// - no ingredient references the recipe's own item id;
/// - no ingredient id starts with the placeholder marker;
/// - every amount is finite and positive.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Recipe {
    /// Item identifier, possibly carrying an `@N` enchantment suffix
    pub item_id: String,
    /// Human-readable localized name (falls back to the id)
    pub name: String,
    /// Tier, when the source declared a positive one
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tier: Option<u32>,
    /// Enchantment level, when the recipe came from an enchantment-aware
    /// source
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enchantment: Option<u32>,
    /// Deduplicated ingredient list
    pub ingredients: Vec<IngredientRef>,
}

/// The persisted, versioned build output.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecipeDataset {
    /// Must match [`crate::constants::CACHE_VERSION`] or the cache is
    /// discarded on load
    pub cache_version: u32,
    /// Build timestamp
    pub generated_at: DateTime<Utc>,
    /// Label of the source that won the priority race
    pub source: String,
    /// Convenience count, equal to `recipes.len()`
    pub recipe_count: usize,
    /// One recipe per item id
    pub recipes: Vec<Recipe>,
}

/// Suffix a base id with an enchantment level. Ids that already carry a
/// suffix marker are left alone, as is level 0.
pub fn item_id_with_enchantment(base: &str, level: u32) -> String {
    if base.contains(ENCHANT_SEPARATOR) || level == 0 {
        base.to_string()
    } else {
        format!("{}{}{}", base, ENCHANT_SEPARATOR, level)
    }
}
