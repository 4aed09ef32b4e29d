//! Heuristic recipe extraction from arbitrary JSON trees.
//!
//! The extractor does not assume any particular dump schema. It discovers
//! candidate ingredient lists by scanning for attribute-suffixed resource
//! tuples and contextually named subtrees, normalizes every candidate, and
//! keeps the option with the fewest distinct ingredients per item.

use std::collections::HashMap;

use lazy_static::lazy_static;
use regex::Regex;
use serde_json::Value;

use crate::constants::{MAX_SCAN_DEPTH, PLACEHOLDER_MARKER};
use crate::heuristics::{self, item_id, localized_name, number_field, string_field};
use crate::model::{IngredientRef, Recipe};

lazy_static! {
    /// Field family naming one resource tuple: an identifier prefix plus an
    /// optional numeric suffix shared with the matching amount field.
    static ref RESOURCE_KEY_RE: Regex =
        Regex::new(r"(?i)^@?(?:uniquename|itemtype|itemid|item|identifier)(\d*)$").unwrap();

    /// Parent keys that mark a node as resource-bearing on their own.
    static ref RESOURCE_CONTEXT_RE: Regex = Regex::new(r"(?i)resource|ingredient|material|craft").unwrap();

    /// Child keys worth recursing into when hunting for ingredient lists.
    static ref CRAFT_CONTEXT_RE: Regex =
        Regex::new(r"(?i)craft|requirement|recipe|ingredient|resource|material|component|enchant").unwrap();
}

/// Amount field bases paired with a resource key's numeric suffix.
const AMOUNT_KEY_BASES: &[&str] = &["count", "amount", "quantity", "value"];

/// Id aliases for the single-pair fallback parse.
const SINGLE_ID_KEYS: &[&str] = &[
    "identifier",
    "itemType",
    "itemtype",
    "itemId",
    "item_id",
    "uniqueName",
    "UniqueName",
    "@uniquename",
    "@itemtype",
    "@item",
];

/// Amount aliases for the single-pair fallback parse.
const SINGLE_AMOUNT_KEYS: &[&str] = &[
    "value", "count", "amount", "quantity", "@count", "@amount", "@value",
];

/// Parse a node's own fields into resource tuples.
///
/// Strategy (a): every field matching the resource key family contributes
/// one tuple, paired with the same-suffixed amount field. Strategy (b):
/// when no suffixed tuples are found, the whole node is tried as a single
/// `{id, amount}` pair.
pub fn parse_resource_tuples(node: &Value) -> Vec<IngredientRef> {
    let Some(map) = node.as_object() else {
        return Vec::new();
    };

    let mut out = Vec::new();
    for (key, value) in map {
        let Some(caps) = RESOURCE_KEY_RE.captures(key) else {
            continue;
        };
        let Some(ingredient_id) = value.as_str().map(str::trim).filter(|s| !s.is_empty()) else {
            continue;
        };

        let suffix = caps.get(1).map(|m| m.as_str()).unwrap_or("");
        let amount_keys: Vec<String> = AMOUNT_KEY_BASES
            .iter()
            .flat_map(|base| [format!("@{base}{suffix}"), format!("{base}{suffix}")])
            .collect();

        if let Some(amount) = number_field(node, &amount_keys) {
            out.push(IngredientRef::new(ingredient_id, amount));
        }
    }

    if !out.is_empty() {
        return out;
    }

    let single_id = string_field(node, SINGLE_ID_KEYS);
    let single_amount = number_field(node, SINGLE_AMOUNT_KEYS);
    if let (Some(ingredient_id), Some(amount)) = (single_id, single_amount) {
        return vec![IngredientRef::new(ingredient_id, amount)];
    }

    Vec::new()
}

/// Fold one candidate option into a deduplicated ingredient list.
///
/// Amounts are summed per ingredient id; entries with a non-positive or
/// non-finite amount, a self-reference, or a placeholder-marker id are
/// dropped. First-seen order is preserved.
pub fn normalize_option(owner_id: &str, option: &[IngredientRef]) -> Vec<IngredientRef> {
    let mut folded: Vec<IngredientRef> = Vec::new();
    for ingredient in option {
        if !ingredient.amount.is_finite() || ingredient.amount <= 0.0 {
            continue;
        }
        if ingredient.item_id == owner_id || ingredient.item_id.starts_with(PLACEHOLDER_MARKER) {
            continue;
        }
        match folded
            .iter_mut()
            .find(|existing| existing.item_id == ingredient.item_id)
        {
            Some(existing) => existing.amount += ingredient.amount,
            None => folded.push(ingredient.clone()),
        }
    }
    folded
}

/// Depth-bounded heuristic recipe extractor for JSON dumps.
pub struct JsonRecipeExtractor {
    max_depth: usize,
}

impl JsonRecipeExtractor {
    pub fn new() -> Self {
        Self {
            max_depth: MAX_SCAN_DEPTH,
        }
    }

    /// Override the recursion bound (used by tests with deep fixtures).
    pub fn with_max_depth(max_depth: usize) -> Self {
        Self { max_depth }
    }

    /// Discover candidate ingredient options under `node`.
    ///
    /// Arrays whose every element parses as resource tuples become one
    /// concatenated option. Objects contribute their own tuple parse when
    /// it yields more than one tuple or the parent key suggests resource
    /// context, then recurse into contextually named children; when no
    /// contextual key matches at a level, every child is recursed as a
    /// fallback.
    pub fn find_ingredient_options(&self, node: &Value) -> Vec<Vec<IngredientRef>> {
        self.find_options(node, 0, "")
    }

    fn find_options(&self, node: &Value, depth: usize, parent_key: &str) -> Vec<Vec<IngredientRef>> {
        if depth > self.max_depth {
            return Vec::new();
        }

        match node {
            Value::Array(entries) => {
                if !entries.is_empty()
                    && entries.iter().all(|e| !parse_resource_tuples(e).is_empty())
                {
                    return vec![entries.iter().flat_map(|e| parse_resource_tuples(e)).collect()];
                }
                entries
                    .iter()
                    .flat_map(|e| self.find_options(e, depth + 1, parent_key))
                    .collect()
            }
            Value::Object(map) => {
                let mut out = Vec::new();

                let direct = parse_resource_tuples(node);
                if direct.len() > 1 || RESOURCE_CONTEXT_RE.is_match(parent_key) {
                    out.push(direct);
                }

                for (key, value) in map {
                    if CRAFT_CONTEXT_RE.is_match(key) {
                        out.extend(self.find_options(value, depth + 1, key));
                    }
                }

                if out.is_empty() {
                    for (key, value) in map {
                        out.extend(self.find_options(value, depth + 1, key));
                    }
                }

                out
            }
            _ => Vec::new(),
        }
    }

    /// Build one recipe per identifiable entry, then deduplicate across
    /// entries keeping the option with fewer ingredients.
    pub fn extract_recipes_from_entries(
        &self,
        entries: &[&Value],
        names: &HashMap<String, String>,
    ) -> Vec<Recipe> {
        let mut recipes = Vec::new();

        for entry in entries {
            if !entry.is_object() {
                continue;
            }
            let Some(owner_id) = item_id(entry) else {
                continue;
            };
            if owner_id.starts_with(PLACEHOLDER_MARKER) {
                continue;
            }

            // Roots: the entry itself plus every contextually named child.
            let mut roots: Vec<&Value> = vec![entry];
            if let Some(map) = entry.as_object() {
                for (key, value) in map {
                    if CRAFT_CONTEXT_RE.is_match(key) {
                        roots.push(value);
                    }
                }
            }

            let mut options: Vec<Vec<IngredientRef>> = roots
                .iter()
                .flat_map(|root| self.find_ingredient_options(root))
                .map(|option| normalize_option(&owner_id, &option))
                .filter(|option| !option.is_empty())
                .collect();

            if options.is_empty() {
                continue;
            }
            options.sort_by_key(|option| option.len());

            let name = names
                .get(&owner_id)
                .cloned()
                .unwrap_or_else(|| localized_name(entry, &owner_id));

            recipes.push(Recipe {
                item_id: owner_id,
                name,
                tier: None,
                enchantment: None,
                ingredients: options.into_iter().next().unwrap_or_default(),
            });
        }

        dedup_by_item_id(recipes)
    }
}

impl Default for JsonRecipeExtractor {
    fn default() -> Self {
        Self::new()
    }
}

/// Keep one recipe per item id; on conflict the recipe with fewer
/// ingredients wins, ties keep the first discovered. Empty recipes are
/// dropped.
pub fn dedup_by_item_id(recipes: Vec<Recipe>) -> Vec<Recipe> {
    let mut order: Vec<Recipe> = Vec::new();
    let mut index: HashMap<String, usize> = HashMap::new();

    for recipe in recipes {
        if recipe.ingredients.is_empty() {
            continue;
        }
        match index.get(&recipe.item_id) {
            Some(&slot) => {
                if recipe.ingredients.len() < order[slot].ingredients.len() {
                    order[slot] = recipe;
                }
            }
            None => {
                index.insert(recipe.item_id.clone(), order.len());
                order.push(recipe);
            }
        }
    }

    order
}

/// Validate an already-structured manual recipe list: an array (or an
/// object with a `recipes` array) of `{itemId, name?, ingredients}` rows
/// with positive finite amounts. Returns `None` when the document does not
/// have that shape or yields nothing usable.
pub fn validate_manual_recipes(raw: &Value) -> Option<Vec<Recipe>> {
    let list = match raw {
        Value::Array(rows) => rows,
        Value::Object(map) => match map.get("recipes") {
            Some(Value::Array(rows)) => rows,
            _ => return None,
        },
        _ => return None,
    };
    if list.is_empty() {
        return None;
    }

    let mut recipes = Vec::new();
    for row in list {
        let Some(item_id) = row.get("itemId").and_then(Value::as_str) else {
            continue;
        };
        let name = row
            .get("name")
            .and_then(Value::as_str)
            .unwrap_or(item_id)
            .to_string();

        let ingredients: Vec<IngredientRef> = row
            .get("ingredients")
            .and_then(Value::as_array)
            .map(|rows| {
                rows.iter()
                    .filter_map(|ingredient| {
                        let id = ingredient.get("itemId").and_then(Value::as_str)?;
                        let amount = ingredient.get("amount").and_then(Value::as_f64)?;
                        (amount.is_finite() && amount > 0.0)
                            .then(|| IngredientRef::new(id, amount))
                    })
                    .collect()
            })
            .unwrap_or_default();

        if !ingredients.is_empty() {
            recipes.push(Recipe {
                item_id: item_id.to_string(),
                name,
                tier: None,
                enchantment: None,
                ingredients,
            });
        }
    }

    if recipes.is_empty() {
        None
    } else {
        Some(recipes)
    }
}
