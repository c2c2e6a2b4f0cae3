use serde::{Deserialize, Serialize};
use std::env;
use std::path::PathBuf;

use crate::error::AppError;
use crate::personas::Persona;

/// Default provider for every role.
pub const DEFAULT_PROVIDER: &str = "openai";
/// Default model for every role.
pub const DEFAULT_MODEL: &str = "gpt-4o";
/// Default number of personas that must raise a theme for it to count.
pub const DEFAULT_RISK_THRESHOLD: usize = 3;

/// Application configuration loaded from environment variables
#[derive(Debug, Clone)]
pub struct Config {
    pub gateway: GatewayConfig,
    pub database: DatabaseConfig,
    pub logging: LoggingConfig,
    pub request: RequestConfig,
    pub models: ModelConfig,
    pub analysis: AnalysisConfig,
}

/// Backboard API configuration
#[derive(Debug, Clone)]
pub struct GatewayConfig {
    pub api_key: String,
    pub base_url: String,
}

/// Database configuration
#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    pub path: PathBuf,
    pub max_connections: u32,
}

/// Logging configuration
#[derive(Debug, Clone)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
}

/// Log output format
#[derive(Debug, Clone, PartialEq)]
pub enum LogFormat {
    Pretty,
    Json,
}

/// HTTP request and run timing configuration
#[derive(Debug, Clone)]
pub struct RequestConfig {
    /// Per-call HTTP timeout.
    pub timeout_ms: u64,
    /// Retries for context deletion. Message submission is never retried.
    pub max_retries: u32,
    pub retry_delay_ms: u64,
    /// Upper bound for a whole stress-test run.
    pub run_timeout_ms: u64,
    /// Upper bound for a critic's context cleanup once the run is cancelled.
    pub cleanup_timeout_ms: u64,
}

/// A provider/model pair the gateway routes a message to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelBinding {
    pub llm_provider: String,
    pub model_name: String,
}

/// Model bindings for the main line and each persona
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelConfig {
    pub main: ModelBinding,
    pub vc: ModelBinding,
    pub engineer: ModelBinding,
    pub ethicist: ModelBinding,
    pub user: ModelBinding,
    pub competitor: ModelBinding,
}

/// Risk analysis configuration
#[derive(Debug, Clone)]
pub struct AnalysisConfig {
    pub threshold: usize,
    /// Optional JSON file replacing the builtin theme table.
    pub themes_file: Option<PathBuf>,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, AppError> {
        // Load .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();

        let api_key = env::var("BACKBOARD_API_KEY").unwrap_or_default();
        if api_key.trim().is_empty() {
            return Err(AppError::Config {
                message: "BACKBOARD_API_KEY is required".to_string(),
            });
        }

        let gateway = GatewayConfig {
            api_key,
            base_url: env::var("BACKBOARD_BASE_URL")
                .unwrap_or_else(|_| "https://app.backboard.io/api".to_string()),
        };

        let database = DatabaseConfig {
            path: PathBuf::from(
                env::var("DATABASE_PATH").unwrap_or_else(|_| "./data/stress_tests.db".to_string()),
            ),
            max_connections: env_parse("DATABASE_MAX_CONNECTIONS", 5),
        };

        let logging = LoggingConfig {
            level: env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),
            format: match env::var("LOG_FORMAT")
                .unwrap_or_else(|_| "pretty".to_string())
                .to_lowercase()
                .as_str()
            {
                "json" => LogFormat::Json,
                _ => LogFormat::Pretty,
            },
        };

        let defaults = RequestConfig::default();
        let request = RequestConfig {
            timeout_ms: env_parse("REQUEST_TIMEOUT_MS", defaults.timeout_ms),
            max_retries: env_parse("MAX_RETRIES", defaults.max_retries),
            retry_delay_ms: env_parse("RETRY_DELAY_MS", defaults.retry_delay_ms),
            run_timeout_ms: env_parse("RUN_TIMEOUT_MS", defaults.run_timeout_ms),
            cleanup_timeout_ms: env_parse("CLEANUP_TIMEOUT_MS", defaults.cleanup_timeout_ms),
        };

        let models = ModelConfig {
            main: binding_from_env("MAIN"),
            vc: binding_from_env("VC"),
            engineer: binding_from_env("ENGINEER"),
            ethicist: binding_from_env("ETHICIST"),
            user: binding_from_env("USER"),
            competitor: binding_from_env("COMPETITOR"),
        };

        let threshold = match env::var("RISK_THRESHOLD") {
            Ok(raw) => raw.trim().parse::<usize>().map_err(|_| AppError::Config {
                message: format!("RISK_THRESHOLD must be a positive integer, got '{}'", raw),
            })?,
            Err(_) => DEFAULT_RISK_THRESHOLD,
        };
        if threshold == 0 {
            return Err(AppError::Config {
                message: "RISK_THRESHOLD must be at least 1".to_string(),
            });
        }

        let analysis = AnalysisConfig {
            threshold,
            themes_file: env::var("RISK_THEMES_FILE")
                .ok()
                .filter(|s| !s.trim().is_empty())
                .map(PathBuf::from),
        };

        Ok(Config {
            gateway,
            database,
            logging,
            request,
            models,
            analysis,
        })
    }
}

fn env_parse<T: std::str::FromStr>(key: &str, default: T) -> T {
    env::var(key)
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(default)
}

fn binding_from_env(role: &str) -> ModelBinding {
    ModelBinding {
        llm_provider: env::var(format!("LLM_PROVIDER_{}", role))
            .unwrap_or_else(|_| DEFAULT_PROVIDER.to_string()),
        model_name: env::var(format!("MODEL_{}", role))
            .unwrap_or_else(|_| DEFAULT_MODEL.to_string()),
    }
}

impl ModelBinding {
    /// Create a binding for a provider/model pair
    pub fn new(llm_provider: impl Into<String>, model_name: impl Into<String>) -> Self {
        Self {
            llm_provider: llm_provider.into(),
            model_name: model_name.into(),
        }
    }
}

impl Default for ModelBinding {
    fn default() -> Self {
        Self::new(DEFAULT_PROVIDER, DEFAULT_MODEL)
    }
}

impl ModelConfig {
    /// Binding used by a persona's critique
    pub fn for_persona(&self, persona: Persona) -> &ModelBinding {
        match persona {
            Persona::Vc => &self.vc,
            Persona::Engineer => &self.engineer,
            Persona::Ethicist => &self.ethicist,
            Persona::User => &self.user,
            Persona::Competitor => &self.competitor,
        }
    }
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            main: ModelBinding::default(),
            vc: ModelBinding::default(),
            engineer: ModelBinding::default(),
            ethicist: ModelBinding::default(),
            user: ModelBinding::default(),
            competitor: ModelBinding::default(),
        }
    }
}

impl Default for RequestConfig {
    fn default() -> Self {
        Self {
            timeout_ms: 120_000,
            max_retries: 2,
            retry_delay_ms: 500,
            run_timeout_ms: 300_000,
            cleanup_timeout_ms: 5_000,
        }
    }
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            threshold: DEFAULT_RISK_THRESHOLD,
            themes_file: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_model_config_routes_personas() {
        let mut models = ModelConfig::default();
        models.ethicist = ModelBinding::new("google", "gemini-2.5-pro");

        assert_eq!(models.for_persona(Persona::Ethicist).llm_provider, "google");
        assert_eq!(models.for_persona(Persona::Vc), &ModelBinding::default());
    }

    #[test]
    fn test_request_config_defaults() {
        let request = RequestConfig::default();
        assert_eq!(request.run_timeout_ms, 300_000);
        assert!(request.cleanup_timeout_ms < request.run_timeout_ms);
    }

    #[test]
    fn test_model_binding_serializes_with_gateway_field_names() {
        let json = serde_json::to_value(ModelBinding::new("cohere", "command-a-03-2025")).unwrap();
        assert_eq!(json["llm_provider"], "cohere");
        assert_eq!(json["model_name"], "command-a-03-2025");
    }
}
