//! Recipe extraction from the two source formats.
//!
//! [`json`] walks arbitrary JSON shapes with schema heuristics; [`xml`]
//! runs a tag-stream state machine over attribute-flattened XML.

pub mod json;
pub mod xml;

pub use json::{dedup_by_item_id, normalize_option, validate_manual_recipes, JsonRecipeExtractor};
pub use xml::XmlRecipeParser;
