//! Risk theme catalog.
//!
//! Themes are plain data: [`ThemeDefinition`] tables that compile into a
//! [`ThemeCatalog`]. The builtin table is below; a JSON file with the same shape
//! can replace it at startup.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;

use super::normalize_text;
use crate::error::{AppError, AppResult};

/// One match pattern, as written in a theme table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PatternSpec {
    /// Substring containment against normalized text.
    Literal(String),
    /// Regular expression, matched anywhere in normalized text.
    Regex(String),
}

/// A risk theme as plain data.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ThemeDefinition {
    pub key: String,
    pub label: String,
    pub patterns: Vec<PatternSpec>,
}

struct BuiltinTheme {
    key: &'static str,
    label: &'static str,
    literals: &'static [&'static str],
    regexes: &'static [&'static str],
}

const BUILTIN_THEMES: &[BuiltinTheme] = &[
    BuiltinTheme {
        key: "distribution_adoption",
        label: "Distribution / adoption friction",
        literals: &[
            "distribution",
            "acquisition",
            "marketing",
            "onboarding",
            "adoption",
            "retention",
            "growth",
        ],
        regexes: &[r"go to market"],
    },
    BuiltinTheme {
        key: "trust_credibility",
        label: "Trust / credibility",
        literals: &[
            "trust",
            "credible",
            "accuracy",
            "hallucination",
            "reliability",
            "confidence",
            "wrong",
            "false",
            "misleading",
        ],
        regexes: &[],
    },
    BuiltinTheme {
        key: "privacy_compliance",
        label: "Privacy / compliance risk",
        literals: &[
            "privacy",
            "pii",
            "gdpr",
            "hipaa",
            "consent",
            "compliance",
            "data leak",
            "breach",
            "sensitive",
        ],
        regexes: &[],
    },
    BuiltinTheme {
        key: "security_abuse",
        label: "Security / misuse / abuse",
        literals: &[
            "security",
            "abuse",
            "misuse",
            "fraud",
            "spam",
            "scam",
            "attack",
            "prompt injection",
            "jailbreak",
        ],
        regexes: &[],
    },
    BuiltinTheme {
        key: "moat_competition",
        label: "Weak moat / competition will copy",
        literals: &[
            "moat",
            "defensible",
            "differentiation",
            "commodity",
            "copy",
            "clone",
            "competition",
            "incumbent",
        ],
        regexes: &[],
    },
    BuiltinTheme {
        key: "scalability_cost",
        label: "Scalability / cost",
        literals: &[
            "scale",
            "scalability",
            "latency",
            "cost",
            "token",
            "inference",
            "throughput",
            "rate limit",
        ],
        regexes: &[],
    },
    BuiltinTheme {
        key: "product_scope",
        label: "Too broad / unclear scope",
        literals: &[
            "scope",
            "too broad",
            "vague",
            "unclear",
            "who is this for",
            "not specific",
            "undefined",
        ],
        regexes: &[],
    },
];

/// The builtin theme table as [`ThemeDefinition`]s, in definition order.
pub fn builtin_definitions() -> Vec<ThemeDefinition> {
    BUILTIN_THEMES
        .iter()
        .map(|theme| ThemeDefinition {
            key: theme.key.to_string(),
            label: theme.label.to_string(),
            patterns: theme
                .literals
                .iter()
                .map(|p| PatternSpec::Literal(p.to_string()))
                .chain(theme.regexes.iter().map(|p| PatternSpec::Regex(p.to_string())))
                .collect(),
        })
        .collect()
}

static BUILTIN_CATALOG: Lazy<ThemeCatalog> = Lazy::new(|| {
    ThemeCatalog::from_definitions(builtin_definitions())
        .expect("builtin risk themes must compile")
});

/// A compiled pattern.
#[derive(Debug, Clone)]
pub enum Matcher {
    Literal(String),
    Regex(Regex),
}

impl Matcher {
    /// Whether the pattern hits already-normalized text.
    pub fn is_match(&self, normalized: &str) -> bool {
        match self {
            Matcher::Literal(needle) => normalized.contains(needle.as_str()),
            Matcher::Regex(re) => re.is_match(normalized),
        }
    }
}

/// A compiled risk theme.
#[derive(Debug, Clone)]
pub struct Theme {
    pub key: String,
    pub label: String,
    pub matchers: Vec<Matcher>,
}

impl Theme {
    /// Whether any pattern hits already-normalized text.
    pub fn hits(&self, normalized: &str) -> bool {
        self.matchers.iter().any(|m| m.is_match(normalized))
    }
}

/// Ordered, compiled set of themes. Definition order breaks ranking ties.
#[derive(Debug, Clone)]
pub struct ThemeCatalog {
    themes: Vec<Theme>,
}

impl ThemeCatalog {
    /// The seven builtin themes, compiled once per process.
    pub fn builtin() -> &'static ThemeCatalog {
        &BUILTIN_CATALOG
    }

    /// Compile a catalog from definitions.
    ///
    /// Literal patterns are normalized the same way critique text is, so a
    /// literal like `"Go-To-Market"` still matches.
    pub fn from_definitions(definitions: Vec<ThemeDefinition>) -> AppResult<Self> {
        if definitions.is_empty() {
            return Err(AppError::Config {
                message: "Risk theme catalog must define at least one theme".to_string(),
            });
        }

        let mut seen = HashSet::new();
        let mut themes = Vec::with_capacity(definitions.len());

        for definition in definitions {
            if !seen.insert(definition.key.clone()) {
                return Err(AppError::Config {
                    message: format!("Duplicate risk theme key: {}", definition.key),
                });
            }
            if definition.patterns.is_empty() {
                return Err(AppError::Config {
                    message: format!("Risk theme '{}' has no patterns", definition.key),
                });
            }

            let mut matchers = Vec::with_capacity(definition.patterns.len());
            for pattern in definition.patterns {
                let matcher = match pattern {
                    PatternSpec::Literal(literal) => {
                        let normalized = normalize_text(&literal);
                        if normalized.is_empty() {
                            return Err(AppError::Config {
                                message: format!(
                                    "Risk theme '{}' has a literal pattern that normalizes to nothing: '{}'",
                                    definition.key, literal
                                ),
                            });
                        }
                        Matcher::Literal(normalized)
                    }
                    PatternSpec::Regex(source) => {
                        Matcher::Regex(Regex::new(&source).map_err(|e| AppError::Config {
                            message: format!(
                                "Risk theme '{}' has an invalid regex '{}': {}",
                                definition.key, source, e
                            ),
                        })?)
                    }
                };
                matchers.push(matcher);
            }

            themes.push(Theme {
                key: definition.key,
                label: definition.label,
                matchers,
            });
        }

        Ok(Self { themes })
    }

    /// Load definitions from a JSON file and compile them.
    pub fn load_from_file(path: &Path) -> AppResult<Self> {
        let raw = std::fs::read_to_string(path).map_err(|e| AppError::Config {
            message: format!("Failed to read risk themes file {}: {}", path.display(), e),
        })?;
        let definitions: Vec<ThemeDefinition> =
            serde_json::from_str(&raw).map_err(|e| AppError::Config {
                message: format!("Invalid risk themes file {}: {}", path.display(), e),
            })?;
        Self::from_definitions(definitions)
    }

    /// Themes in definition order.
    pub fn themes(&self) -> &[Theme] {
        &self.themes
    }

    pub fn len(&self) -> usize {
        self.themes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.themes.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_catalog_has_seven_themes_in_order() {
        let keys: Vec<&str> = ThemeCatalog::builtin()
            .themes()
            .iter()
            .map(|t| t.key.as_str())
            .collect();
        assert_eq!(
            keys,
            vec![
                "distribution_adoption",
                "trust_credibility",
                "privacy_compliance",
                "security_abuse",
                "moat_competition",
                "scalability_cost",
                "product_scope",
            ]
        );
    }

    #[test]
    fn test_regex_pattern_matches_anywhere() {
        let catalog = ThemeCatalog::builtin();
        let distribution = &catalog.themes()[0];
        assert!(distribution.hits("the go to market plan is thin"));
        assert!(!distribution.hits("go market to"));
    }

    #[test]
    fn test_literal_patterns_are_normalized_on_load() {
        let catalog = ThemeCatalog::from_definitions(vec![ThemeDefinition {
            key: "gtm".to_string(),
            label: "GTM".to_string(),
            patterns: vec![PatternSpec::Literal("Go-To-Market".to_string())],
        }])
        .unwrap();
        assert!(catalog.themes()[0].hits("weak go to market motion"));
    }

    #[test]
    fn test_invalid_regex_is_config_error() {
        let result = ThemeCatalog::from_definitions(vec![ThemeDefinition {
            key: "broken".to_string(),
            label: "Broken".to_string(),
            patterns: vec![PatternSpec::Regex("(unclosed".to_string())],
        }]);
        assert!(matches!(result, Err(AppError::Config { .. })));
    }

    #[test]
    fn test_duplicate_keys_rejected() {
        let def = ThemeDefinition {
            key: "dup".to_string(),
            label: "Dup".to_string(),
            patterns: vec![PatternSpec::Literal("x".to_string())],
        };
        let result = ThemeCatalog::from_definitions(vec![def.clone(), def]);
        assert!(result.is_err());
    }

    #[test]
    fn test_empty_catalog_rejected() {
        assert!(ThemeCatalog::from_definitions(Vec::new()).is_err());
    }

    #[test]
    fn test_definitions_deserialize_from_json() {
        let json = r#"[
            {"key": "pricing", "label": "Pricing risk",
             "patterns": [{"literal": "price"}, {"regex": "pay(ing)? for"}]}
        ]"#;
        let definitions: Vec<ThemeDefinition> = serde_json::from_str(json).unwrap();
        assert_eq!(
            definitions[0].patterns[1],
            PatternSpec::Regex("pay(ing)? for".to_string())
        );

        let catalog = ThemeCatalog::from_definitions(definitions).unwrap();
        assert!(catalog.themes()[0].hits("nobody is paying for this"));
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("themes.json");
        let definitions = builtin_definitions();
        std::fs::write(&path, serde_json::to_string(&definitions).unwrap()).unwrap();

        let catalog = ThemeCatalog::load_from_file(&path).unwrap();
        assert_eq!(catalog.len(), 7);
    }

    #[test]
    fn test_load_missing_file_is_config_error() {
        let result = ThemeCatalog::load_from_file(Path::new("/nonexistent/themes.json"));
        assert!(matches!(result, Err(AppError::Config { .. })));
    }
}
