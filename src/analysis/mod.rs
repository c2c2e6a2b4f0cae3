//! Local risk-convergence analysis.
//!
//! Everything here is synchronous and makes no external calls:
//! - [`normalize_text`]: canonical form critique text is matched against
//! - [`ThemeCatalog`]: compiled risk themes (builtin or loaded from JSON)
//! - [`RiskAnalyzer`]: scores critiques against the catalog

mod risk;
mod themes;

pub use risk::*;
pub use themes::*;

/// Normalize text for theme matching.
///
/// Lowercases, replaces every character outside `[a-z0-9 ]` with a space,
/// collapses whitespace runs and trims. Idempotent.
pub fn normalize_text(text: &str) -> String {
    let replaced: String = text
        .to_lowercase()
        .chars()
        .map(|c| {
            if c.is_ascii_lowercase() || c.is_ascii_digit() {
                c
            } else {
                ' '
            }
        })
        .collect();

    replaced.split_whitespace().collect::<Vec<_>>().join(" ")
}
