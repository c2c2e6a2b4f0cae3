use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::debug;

use super::{normalize_text, ThemeCatalog};
use crate::config::{AnalysisConfig, DEFAULT_RISK_THRESHOLD};
use crate::error::{AppError, AppResult};
use crate::personas::Persona;

/// Number of ranked themes surfaced as top themes.
pub const TOP_THEME_COUNT: usize = 3;

/// How often one theme was raised, and by whom.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ThemeScore {
    pub key: String,
    pub label: String,
    /// Number of distinct personas whose critique hit the theme.
    pub count: usize,
    /// Those personas, in persona order.
    pub personas: Vec<Persona>,
}

/// Risk-convergence signals for one run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RiskSignals {
    pub top_themes: Vec<ThemeScore>,
    pub high_confidence_risks: Vec<ThemeScore>,
    /// Every theme, count descending, ties in definition order.
    pub ranked_themes: Vec<ThemeScore>,
    pub theme_counts: BTreeMap<String, usize>,
    pub threshold: usize,
    pub personas_analyzed: usize,
    pub confidence_note: String,
}

/// Scores critiques against a theme catalog.
#[derive(Debug, Clone)]
pub struct RiskAnalyzer {
    catalog: Arc<ThemeCatalog>,
    threshold: usize,
}

impl RiskAnalyzer {
    /// Create an analyzer over a catalog with a convergence threshold
    pub fn new(catalog: Arc<ThemeCatalog>, threshold: usize) -> Self {
        Self { catalog, threshold }
    }

    /// Analyzer over the builtin themes with the default threshold
    pub fn builtin() -> Self {
        Self::new(
            Arc::new(ThemeCatalog::builtin().clone()),
            DEFAULT_RISK_THRESHOLD,
        )
    }

    /// Analyzer for the configured threshold and theme table.
    ///
    /// A configured themes file replaces the builtin catalog entirely.
    pub fn from_config(config: &AnalysisConfig) -> AppResult<Self> {
        if config.threshold == 0 {
            return Err(AppError::Config {
                message: "Risk threshold must be at least 1".to_string(),
            });
        }

        let catalog = match &config.themes_file {
            Some(path) => ThemeCatalog::load_from_file(path)?,
            None => ThemeCatalog::builtin().clone(),
        };

        Ok(Self::new(Arc::new(catalog), config.threshold))
    }

    pub fn threshold(&self) -> usize {
        self.threshold
    }

    pub fn catalog(&self) -> &ThemeCatalog {
        &self.catalog
    }

    /// Analyze with the configured threshold
    pub fn analyze(&self, critiques: &BTreeMap<Persona, String>) -> RiskSignals {
        analyze_risk(critiques, self.threshold, &self.catalog)
    }
}

/// Compute risk signals from critiques.
///
/// Pure and deterministic: the critique map iterates in persona order, and
/// ranking is a stable sort over definition order.
pub fn analyze_risk(
    critiques: &BTreeMap<Persona, String>,
    threshold: usize,
    catalog: &ThemeCatalog,
) -> RiskSignals {
    let normalized: Vec<(Persona, String)> = critiques
        .iter()
        .map(|(persona, text)| (*persona, normalize_text(text)))
        .collect();

    let scored: Vec<ThemeScore> = catalog
        .themes()
        .iter()
        .map(|theme| {
            let personas: Vec<Persona> = normalized
                .iter()
                .filter(|(_, text)| theme.hits(text))
                .map(|(persona, _)| *persona)
                .collect();
            ThemeScore {
                key: theme.key.clone(),
                label: theme.label.clone(),
                count: personas.len(),
                personas,
            }
        })
        .collect();

    let theme_counts = scored
        .iter()
        .map(|score| (score.key.clone(), score.count))
        .collect();

    let mut ranked = scored;
    ranked.sort_by(|a, b| b.count.cmp(&a.count));

    let top_themes: Vec<ThemeScore> = ranked.iter().take(TOP_THEME_COUNT).cloned().collect();
    let high_confidence_risks: Vec<ThemeScore> = ranked
        .iter()
        .filter(|score| score.count >= threshold)
        .cloned()
        .collect();

    let personas_analyzed = critiques.len();
    let confidence_note = match high_confidence_risks.first() {
        Some(top) => format!(
            "High confidence risk: {} (mentioned by {}/{} personas).",
            top.label, top.count, personas_analyzed
        ),
        None => format!(
            "No high-confidence convergence (no theme mentioned by ≥{} personas).",
            threshold
        ),
    };

    debug!(
        personas = personas_analyzed,
        threshold,
        high_confidence = high_confidence_risks.len(),
        "Risk signals computed"
    );

    RiskSignals {
        top_themes,
        high_confidence_risks,
        ranked_themes: ranked,
        theme_counts,
        threshold,
        personas_analyzed,
        confidence_note,
    }
}

#[cfg(test)]
#[path = "risk_tests.rs"]
mod risk_tests;
