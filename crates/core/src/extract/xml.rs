//! Stateful parser for attribute-flattened recipe XML.
//!
//! The dumps' XML dialect nests item elements, `enchantment` level scopes,
//! `craftingrequirements` blocks, and `craftresource` leaves. A single
//! left-to-right scan over the tag stream drives a state machine with three
//! stacks (items, open requirements, enchantment scopes); parsing is
//! permissive and never fails on malformed tags, it just skips them.
//!
//! The machine consumes [`TagEvent`]s so individual transitions can be
//! exercised with synthetic event sequences in tests; [`XmlRecipeParser::parse`]
//! drives it from raw text.

use std::collections::{BTreeMap, HashMap};

use lazy_static::lazy_static;
use regex::Regex;

use crate::model::{item_id_with_enchantment, IngredientRef, Recipe};

use super::json::{dedup_by_item_id, normalize_option};

lazy_static! {
    static ref TAG_RE: Regex = Regex::new(r"<\s*(/?)\s*([A-Za-z0-9_:-]+)\b([^>]*)>").unwrap();
    static ref ATTR_RE: Regex =
        Regex::new(r#"([A-Za-z0-9_:-]+)\s*=\s*["']([^"']*)["']"#).unwrap();
    static ref RESOURCE_ATTR_RE: Regex =
        Regex::new(r"(?i)^(?:uniquename|itemtype|itemid|item|identifier)(\d*)$").unwrap();
}

/// Attribute names an item element may use for its id, in priority order.
const ITEM_ID_ATTRS: &[&str] = &["uniquename", "uniquename0", "itemtype", "itemid", "id"];

/// Amount attribute bases paired with a resource attribute's suffix.
const AMOUNT_ATTR_BASES: &[&str] = &["count", "amount", "quantity", "value"];

/// Attributes are stored lowercased in a sorted map so resource iteration
/// order is deterministic.
pub type Attributes = BTreeMap<String, String>;

/// One event from the tag scanner.
#[derive(Clone, Debug)]
pub enum TagEvent {
    Open {
        name: String,
        attrs: Attributes,
        self_closing: bool,
    },
    Close {
        name: String,
    },
}

/// Scan raw text into tag events. Anything that is not a recognizable tag
/// is ignored.
pub fn scan_tags(xml: &str) -> impl Iterator<Item = TagEvent> + '_ {
    TAG_RE.captures_iter(xml).map(|caps| {
        let closing = &caps[1] == "/";
        let name = caps[2].to_lowercase();
        let raw_attrs = caps.get(3).map(|m| m.as_str()).unwrap_or("");

        if closing {
            TagEvent::Close { name }
        } else {
            let self_closing = raw_attrs.trim_end().ends_with('/');
            let mut attrs = Attributes::new();
            for attr in ATTR_RE.captures_iter(raw_attrs) {
                attrs.insert(attr[1].to_lowercase(), attr[2].to_string());
            }
            TagEvent::Open {
                name,
                attrs,
                self_closing,
            }
        }
    })
}

/// One resource tuple parsed from element attributes, with an optional
/// per-resource enchantment level.
#[derive(Clone, Debug, PartialEq)]
pub struct XmlResource {
    pub item_id: String,
    pub amount: f64,
    pub enchantment: Option<u32>,
}

/// Parse the attribute-indexed resource family (`uniquename`/`count`,
/// `uniquename1`/`count1`, ...) out of one element's attributes.
pub fn resources_from_attrs(attrs: &Attributes) -> Vec<XmlResource> {
    let mut out = Vec::new();
    for (key, value) in attrs {
        let Some(caps) = RESOURCE_ATTR_RE.captures(key) else {
            continue;
        };
        let resource_id = value.trim();
        if resource_id.is_empty() {
            continue;
        }

        let suffix = caps.get(1).map(|m| m.as_str()).unwrap_or("");
        let amount = AMOUNT_ATTR_BASES
            .iter()
            .find_map(|base| attrs.get(&format!("{base}{suffix}")))
            .and_then(|raw| raw.trim().parse::<f64>().ok());
        let Some(amount) = amount.filter(|a| a.is_finite() && *a > 0.0) else {
            continue;
        };

        let enchantment = attrs
            .get(&format!("enchantmentlevel{suffix}"))
            .or_else(|| attrs.get("enchantmentlevel"))
            .and_then(|raw| parse_level(raw));

        out.push(XmlResource {
            item_id: resource_id.to_string(),
            amount,
            enchantment,
        });
    }
    out
}

fn parse_level(raw: &str) -> Option<u32> {
    let value = raw.trim().parse::<f64>().ok()?;
    (value.is_finite() && value >= 0.0).then(|| value as u32)
}

fn attr_level(attrs: &Attributes) -> Option<u32> {
    attrs.get("enchantmentlevel").and_then(|raw| parse_level(raw))
}

/// One currently open item element.
#[derive(Debug)]
struct ItemFrame {
    tag_name: String,
    item_id: String,
    tier: Option<u32>,
    base_enchantment: u32,
    /// `(enchantment, resources)` pairs gathered from finalized
    /// requirement blocks.
    options: Vec<(u32, Vec<XmlResource>)>,
}

/// One currently open crafting-requirement element, bound to the item
/// frame that was innermost when it opened.
#[derive(Debug)]
struct RequirementFrame {
    /// Index into the item stack; `None` when orphaned (no item in scope,
    /// or the owner closed before this block did).
    item_index: Option<usize>,
    resources: Vec<XmlResource>,
    explicit_enchantment: Option<u32>,
}

/// Tag-stream state machine emitting one recipe per (item, enchantment)
/// pair.
pub struct XmlRecipeParser<'a> {
    names: &'a HashMap<String, String>,
    items: Vec<ItemFrame>,
    requirements: Vec<RequirementFrame>,
    enchantments: Vec<u32>,
    recipes: Vec<Recipe>,
}

impl<'a> XmlRecipeParser<'a> {
    pub fn new(names: &'a HashMap<String, String>) -> Self {
        Self {
            names,
            items: Vec::new(),
            requirements: Vec::new(),
            enchantments: Vec::new(),
            recipes: Vec::new(),
        }
    }

    /// Parse raw text end to end. Input without any tag yields no recipes.
    pub fn parse(xml: &str, names: &HashMap<String, String>) -> Vec<Recipe> {
        if !xml.contains('<') {
            return Vec::new();
        }
        let mut parser = XmlRecipeParser::new(names);
        for event in scan_tags(xml) {
            parser.handle_event(&event);
        }
        parser.finish()
    }

    /// Apply one tag event to the machine.
    pub fn handle_event(&mut self, event: &TagEvent) {
        match event {
            TagEvent::Open {
                name,
                attrs,
                self_closing,
            } => self.handle_open(name, attrs, *self_closing),
            TagEvent::Close { name } => self.handle_close(name),
        }
    }

    fn handle_open(&mut self, name: &str, attrs: &Attributes, self_closing: bool) {
        match name {
            "enchantment" => {
                // Self-closing enchantment tags contribute no scope.
                if !self_closing {
                    self.enchantments.push(attr_level(attrs).unwrap_or(0));
                }
            }
            "craftingrequirements" => {
                let frame = RequirementFrame {
                    item_index: self.items.len().checked_sub(1),
                    resources: resources_from_attrs(attrs),
                    explicit_enchantment: attr_level(attrs)
                        .or_else(|| self.enchantments.last().copied()),
                };
                if self_closing {
                    self.finalize_requirement(frame);
                } else {
                    self.requirements.push(frame);
                }
            }
            "craftresource" => {
                let resources = resources_from_attrs(attrs);
                if !resources.is_empty() {
                    if let Some(frame) = self.requirements.last_mut() {
                        frame.resources.extend(resources);
                    }
                }
            }
            _ => {
                let Some(item_id) = ITEM_ID_ATTRS
                    .iter()
                    .find_map(|key| attrs.get(*key))
                    .map(|raw| raw.trim())
                    .filter(|raw| !raw.is_empty())
                else {
                    return;
                };

                let frame = ItemFrame {
                    tag_name: name.to_string(),
                    item_id: item_id.to_string(),
                    tier: attrs
                        .get("tier")
                        .and_then(|raw| raw.trim().parse::<f64>().ok())
                        .filter(|t| t.is_finite() && *t > 0.0)
                        .map(|t| t as u32),
                    base_enchantment: attr_level(attrs).unwrap_or(0),
                    options: Vec::new(),
                };

                if self_closing {
                    // No nested requirement can exist, so the item
                    // finalizes with zero options and emits nothing.
                    self.finalize_item(frame);
                } else {
                    self.items.push(frame);
                }
            }
        }
    }

    fn handle_close(&mut self, name: &str) {
        match name {
            "craftingrequirements" => {
                if let Some(frame) = self.requirements.pop() {
                    self.finalize_requirement(frame);
                }
            }
            "enchantment" => {
                self.enchantments.pop();
            }
            _ => {
                let closes_current = self
                    .items
                    .last()
                    .is_some_and(|frame| frame.tag_name == name);
                if closes_current {
                    let Some(frame) = self.items.pop() else {
                        return;
                    };
                    // Requirement frames bound to the popped item (or
                    // deeper) can no longer deliver their options.
                    for requirement in &mut self.requirements {
                        if requirement
                            .item_index
                            .is_some_and(|index| index >= self.items.len())
                        {
                            requirement.item_index = None;
                        }
                    }
                    self.finalize_item(frame);
                }
            }
        }
    }

    /// Drain still-open frames (requirements first, then items, LIFO) and
    /// return the deduplicated recipe list.
    pub fn finish(mut self) -> Vec<Recipe> {
        while let Some(frame) = self.requirements.pop() {
            self.finalize_requirement(frame);
        }
        self.enchantments.clear();
        while let Some(frame) = self.items.pop() {
            self.finalize_item(frame);
        }

        dedup_by_item_id(std::mem::take(&mut self.recipes))
    }

    /// Deliver a finished requirement block to its owning item frame.
    ///
    /// The block's enchantment resolves as: its own explicit level, else
    /// the first per-resource level in iteration order, else the owner's
    /// base level.
    fn finalize_requirement(&mut self, frame: RequirementFrame) {
        let Some(index) = frame.item_index.filter(|i| *i < self.items.len()) else {
            return;
        };
        if frame.resources.is_empty() {
            return;
        }

        let owner = &mut self.items[index];
        let enchantment = frame
            .explicit_enchantment
            .or_else(|| {
                frame
                    .resources
                    .iter()
                    .find_map(|resource| resource.enchantment)
            })
            .unwrap_or(owner.base_enchantment);

        owner.options.push((enchantment, frame.resources));
    }

    /// Emit one recipe per enchantment level, keeping the smallest
    /// normalized ingredient list per level.
    fn finalize_item(&mut self, frame: ItemFrame) {
        if frame.options.is_empty() {
            return;
        }

        let mut by_level: BTreeMap<u32, Vec<IngredientRef>> = BTreeMap::new();
        for (level, resources) in &frame.options {
            let ingredients: Vec<IngredientRef> = resources
                .iter()
                .map(|resource| IngredientRef::new(resource.item_id.clone(), resource.amount))
                .collect();
            let normalized = normalize_option(&frame.item_id, &ingredients);
            if normalized.is_empty() {
                continue;
            }
            match by_level.get(level) {
                Some(existing) if existing.len() <= normalized.len() => {}
                _ => {
                    by_level.insert(*level, normalized);
                }
            }
        }

        for (level, ingredients) in by_level {
            self.recipes.push(Recipe {
                item_id: item_id_with_enchantment(&frame.item_id, level),
                name: self
                    .names
                    .get(&frame.item_id)
                    .cloned()
                    .unwrap_or_else(|| frame.item_id.clone()),
                tier: frame.tier,
                enchantment: Some(level),
                ingredients,
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(xml: &str) -> Vec<Recipe> {
        XmlRecipeParser::parse(xml, &HashMap::new())
    }

    #[test]
    fn test_single_item_two_resources() {
        let recipes = parse(
            r#"
            <item uniquename="T4_SWORD" tier="4">
              <craftingrequirements>
                <craftresource uniquename="T4_PLANKS" count="4" />
                <craftresource uniquename="T4_METALBAR" count="8" />
              </craftingrequirements>
            </item>
            "#,
        );

        assert_eq!(recipes.len(), 1);
        let recipe = &recipes[0];
        assert_eq!(recipe.item_id, "T4_SWORD");
        assert_eq!(recipe.tier, Some(4));
        assert_eq!(recipe.enchantment, Some(0));
        assert_eq!(recipe.ingredients.len(), 2);
    }

    #[test]
    fn test_duplicate_resources_summed() {
        let recipes = parse(
            r#"
            <item uniquename="T4_SWORD">
              <craftingrequirements>
                <craftresource uniquename="T4_PLANKS" count="4" />
                <craftresource uniquename="T4_PLANKS" count="2" />
              </craftingrequirements>
            </item>
            "#,
        );

        assert_eq!(recipes.len(), 1);
        assert_eq!(
            recipes[0].ingredients,
            vec![IngredientRef::new("T4_PLANKS", 6.0)]
        );
    }

    #[test]
    fn test_nested_enchantment_scopes_emit_variants() {
        let recipes = parse(
            r#"
            <item uniquename="T4_SWORD">
              <craftingrequirements>
                <craftresource uniquename="T4_PLANKS" count="4" />
              </craftingrequirements>
              <enchantments>
                <enchantment enchantmentlevel="1">
                  <craftingrequirements>
                    <craftresource uniquename="T4_PLANKS_LEVEL1" count="4" />
                  </craftingrequirements>
                </enchantment>
              </enchantments>
            </item>
            "#,
        );

        assert_eq!(recipes.len(), 2);
        let ids: Vec<_> = recipes.iter().map(|r| r.item_id.as_str()).collect();
        assert!(ids.contains(&"T4_SWORD"));
        assert!(ids.contains(&"T4_SWORD@1"));
    }

    #[test]
    fn test_requirement_attr_level_beats_scope() {
        let recipes = parse(
            r#"
            <item uniquename="T4_SWORD">
              <enchantment enchantmentlevel="1">
                <craftingrequirements enchantmentlevel="2">
                  <craftresource uniquename="T4_PLANKS" count="4" />
                </craftingrequirements>
              </enchantment>
            </item>
            "#,
        );

        assert_eq!(recipes.len(), 1);
        assert_eq!(recipes[0].item_id, "T4_SWORD@2");
    }

    #[test]
    fn test_per_resource_level_fallback() {
        let recipes = parse(
            r#"
            <item uniquename="T4_SWORD">
              <craftingrequirements>
                <craftresource uniquename="T4_PLANKS" count="4" enchantmentlevel="3" />
              </craftingrequirements>
            </item>
            "#,
        );

        assert_eq!(recipes.len(), 1);
        assert_eq!(recipes[0].item_id, "T4_SWORD@3");
    }

    #[test]
    fn test_requirement_tuples_on_own_attributes() {
        let recipes = parse(
            r#"
            <item uniquename="T4_SWORD">
              <craftingrequirements uniquename="T4_PLANKS" count="4" uniquename1="T4_METALBAR" count1="8" />
            </item>
            "#,
        );

        assert_eq!(recipes.len(), 1);
        assert_eq!(recipes[0].ingredients.len(), 2);
    }

    #[test]
    fn test_self_closing_item_emits_nothing() {
        let recipes = parse(r#"<item uniquename="T4_SWORD" tier="4" />"#);
        assert!(recipes.is_empty());
    }

    #[test]
    fn test_smallest_option_per_level_wins() {
        let recipes = parse(
            r#"
            <item uniquename="T4_SWORD">
              <craftingrequirements>
                <craftresource uniquename="T4_PLANKS" count="4" />
                <craftresource uniquename="T4_METALBAR" count="8" />
              </craftingrequirements>
              <craftingrequirements>
                <craftresource uniquename="T4_METALBAR" count="16" />
              </craftingrequirements>
            </item>
            "#,
        );

        assert_eq!(recipes.len(), 1);
        assert_eq!(
            recipes[0].ingredients,
            vec![IngredientRef::new("T4_METALBAR", 16.0)]
        );
    }

    #[test]
    fn test_unclosed_frames_finalize_at_end_of_stream() {
        let recipes = parse(
            r#"
            <item uniquename="T4_SWORD">
              <craftingrequirements>
                <craftresource uniquename="T4_PLANKS" count="4" />
            "#,
        );

        assert_eq!(recipes.len(), 1);
        assert_eq!(recipes[0].item_id, "T4_SWORD");
    }

    #[test]
    fn test_nested_items_keep_their_own_requirements() {
        let recipes = parse(
            r#"
            <item uniquename="OUTER">
              <craftingrequirements>
                <craftresource uniquename="A" count="1" />
              </craftingrequirements>
              <item uniquename="INNER">
                <craftingrequirements>
                  <craftresource uniquename="B" count="2" />
                </craftingrequirements>
              </item>
            </item>
            "#,
        );

        assert_eq!(recipes.len(), 2);
        let outer = recipes.iter().find(|r| r.item_id == "OUTER").unwrap();
        let inner = recipes.iter().find(|r| r.item_id == "INNER").unwrap();
        assert_eq!(outer.ingredients[0].item_id, "A");
        assert_eq!(inner.ingredients[0].item_id, "B");
    }

    #[test]
    fn test_already_suffixed_id_not_resuffixed() {
        let recipes = parse(
            r#"
            <item uniquename="T4_SWORD@1">
              <craftingrequirements enchantmentlevel="2">
                <craftresource uniquename="T4_PLANKS" count="4" />
              </craftingrequirements>
            </item>
            "#,
        );

        assert_eq!(recipes.len(), 1);
        assert_eq!(recipes[0].item_id, "T4_SWORD@1");
    }

    #[test]
    fn test_names_map_used_for_display_name() {
        let names = HashMap::from([("T4_SWORD".to_string(), "Broadsword".to_string())]);
        let recipes = XmlRecipeParser::parse(
            r#"
            <item uniquename="T4_SWORD">
              <craftingrequirements>
                <craftresource uniquename="T4_PLANKS" count="4" />
              </craftingrequirements>
            </item>
            "#,
            &names,
        );

        assert_eq!(recipes[0].name, "Broadsword");
    }

    #[test]
    fn test_non_xml_input_yields_nothing() {
        assert!(parse("just some text without tags").is_empty());
        assert!(parse("").is_empty());
    }

    #[test]
    fn test_synthetic_event_sequence() {
        let names = HashMap::new();
        let mut parser = XmlRecipeParser::new(&names);

        let mut item_attrs = Attributes::new();
        item_attrs.insert("uniquename".to_string(), "T4_SWORD".to_string());
        parser.handle_event(&TagEvent::Open {
            name: "item".to_string(),
            attrs: item_attrs,
            self_closing: false,
        });

        parser.handle_event(&TagEvent::Open {
            name: "craftingrequirements".to_string(),
            attrs: Attributes::new(),
            self_closing: false,
        });

        let mut resource_attrs = Attributes::new();
        resource_attrs.insert("uniquename".to_string(), "T4_PLANKS".to_string());
        resource_attrs.insert("count".to_string(), "4".to_string());
        parser.handle_event(&TagEvent::Open {
            name: "craftresource".to_string(),
            attrs: resource_attrs,
            self_closing: true,
        });

        parser.handle_event(&TagEvent::Close {
            name: "craftingrequirements".to_string(),
        });
        parser.handle_event(&TagEvent::Close {
            name: "item".to_string(),
        });

        let recipes = parser.finish();
        assert_eq!(recipes.len(), 1);
        assert_eq!(
            recipes[0].ingredients,
            vec![IngredientRef::new("T4_PLANKS", 4.0)]
        );
    }
}
