//! Slug derivation: the identity rule for every entity in the graph.

use regex::Regex;
use std::sync::LazyLock;

static NON_ALNUM: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[^a-z0-9]+").expect("slug pattern is valid"));

/// Lowercase `text`, collapse every run of characters outside `[a-z0-9]`
/// into a single `-` and trim leading/trailing `-`.
///
/// Idempotent: `slugify(&slugify(x)) == slugify(x)`.
pub fn slugify(text: &str) -> String {
    let lowered = text.to_lowercase();
    NON_ALNUM
        .replace_all(&lowered, "-")
        .trim_matches('-')
        .to_string()
}

/// True when `text` is already in slug form.
pub fn is_slug(text: &str) -> bool {
    !text.is_empty() && slugify(text) == text
}
