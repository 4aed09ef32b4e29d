//! Shared constants for the recipe build pipeline.

use std::time::Duration;

/// Version stamped into the persisted dataset; a mismatch invalidates the
/// cache on load.
pub const CACHE_VERSION: u32 = 2;

/// Default recursion bound for heuristic tree walks. The dump formats have
/// no true cycles, but the bound keeps pathological nesting from recursing
/// without limit.
pub const MAX_SCAN_DEPTH: usize = 12;

/// Timeout applied to every remote source read.
pub const SOURCE_TIMEOUT: Duration = Duration::from_secs(25);

/// Ids starting with this character are attribute placeholders, not real
/// item references.
pub const PLACEHOLDER_MARKER: char = '@';

/// Separator between a base item id and its enchantment level suffix.
pub const ENCHANT_SEPARATOR: char = '@';

/// User agent sent with remote source reads.
pub const USER_AGENT: &str = "craftbook/0.2";
