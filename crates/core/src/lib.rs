//! Recipe dataset construction for heterogeneous game-data dumps.
//!
//! The crate turns a prioritized list of JSON and XML sources into one
//! canonical, deduplicated item-to-recipe mapping:
//!
//! - [`sources`] names the fallback sources and hides I/O behind the
//!   [`sources::SourceReader`] seam;
//! - [`heuristics`] and [`extract`] recover recipe shapes from dumps whose
//!   schemas were never designed for this;
//! - [`service::RecipeService`] orchestrates the build with single-flight
//!   semantics and layers a memory holder over the versioned disk cache in
//!   [`cache`].
//!
//! Market price fetching lives in the sibling `craftbook-market-data`
//! crate; the two share nothing but the item-id convention.

pub mod cache;
pub mod constants;
pub mod errors;
pub mod extract;
pub mod heuristics;
pub mod model;
pub mod service;
pub mod sources;

pub use cache::RecipeCacheStore;
pub use errors::BuildError;
pub use model::{IngredientRef, Recipe, RecipeDataset};
pub use service::RecipeService;
pub use sources::{
    default_name_sources, default_recipe_sources, HttpSourceReader, SourceContent, SourceFormat,
    SourceLocation, SourceReader, SourceSpec,
};
