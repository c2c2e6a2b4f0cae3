//! Server module for MCP protocol handling.
//!
//! This module provides:
//! - MCP server implementation over stdio
//! - Tool call handlers and routing
//! - Shared application state management

mod handlers;
mod mcp;

pub use handlers::*;
pub use mcp::*;

use std::sync::Arc;
use tracing::info;

use crate::analysis::RiskAnalyzer;
use crate::config::Config;
use crate::error::AppResult;
use crate::gateway::ConversationGateway;
use crate::storage::Storage;
use crate::workflow::StressTestOrchestrator;

/// Application state shared across handlers.
pub struct AppState {
    /// Application configuration.
    pub config: Config,
    /// Stress-test orchestrator; owns the assistant identity.
    pub orchestrator: StressTestOrchestrator,
}

impl AppState {
    /// Create new application state.
    ///
    /// Fails when the configured risk themes file cannot be loaded.
    pub fn new(
        config: Config,
        storage: Arc<dyn Storage>,
        gateway: Arc<dyn ConversationGateway>,
    ) -> AppResult<Self> {
        let analyzer = RiskAnalyzer::from_config(&config.analysis)?;

        info!(
            threshold = analyzer.threshold(),
            themes = analyzer.catalog().len(),
            main_model = %config.models.main.model_name,
            "AppState initializing"
        );

        let orchestrator = StressTestOrchestrator::new(
            gateway,
            storage,
            config.models.clone(),
            config.request.clone(),
            analyzer,
        );

        Ok(Self {
            config,
            orchestrator,
        })
    }
}

/// Shared application state handle
pub type SharedState = Arc<AppState>;

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;
    use crate::config::{
        AnalysisConfig, DatabaseConfig, GatewayConfig, LogFormat, LoggingConfig, ModelConfig,
        RequestConfig,
    };
    use crate::gateway::MockConversationGateway;
    use crate::storage::SqliteStorage;
    use std::path::PathBuf;

    pub fn create_test_config() -> Config {
        Config {
            gateway: GatewayConfig {
                api_key: "test-key".to_string(),
                base_url: "https://app.backboard.io/api".to_string(),
            },
            database: DatabaseConfig {
                path: PathBuf::from(":memory:"),
                max_connections: 1,
            },
            logging: LoggingConfig {
                level: "info".to_string(),
                format: LogFormat::Pretty,
            },
            request: RequestConfig::default(),
            models: ModelConfig::default(),
            analysis: AnalysisConfig::default(),
        }
    }

    pub async fn create_test_state(gateway: MockConversationGateway) -> SharedState {
        let storage = SqliteStorage::new_in_memory().await.unwrap();
        Arc::new(AppState::new(create_test_config(), Arc::new(storage), Arc::new(gateway)).unwrap())
    }
}

#[cfg(test)]
mod tests {
    use super::test_support::*;
    use super::*;
    use crate::config::AnalysisConfig;
    use crate::gateway::MockConversationGateway;
    use crate::storage::SqliteStorage;
    use std::path::PathBuf;

    #[tokio::test]
    async fn test_app_state_new() {
        let state = create_test_state(MockConversationGateway::new()).await;
        assert_eq!(state.orchestrator.analyzer().threshold(), 3);
        assert_eq!(state.orchestrator.analyzer().catalog().len(), 7);
    }

    #[tokio::test]
    async fn test_app_state_uses_configured_threshold() {
        let mut config = create_test_config();
        config.analysis = AnalysisConfig {
            threshold: 2,
            themes_file: None,
        };
        let storage = SqliteStorage::new_in_memory().await.unwrap();
        let state = AppState::new(
            config,
            Arc::new(storage),
            Arc::new(MockConversationGateway::new()),
        )
        .unwrap();
        assert_eq!(state.orchestrator.analyzer().threshold(), 2);
    }

    #[tokio::test]
    async fn test_app_state_rejects_missing_themes_file() {
        let mut config = create_test_config();
        config.analysis.themes_file = Some(PathBuf::from("/does/not/exist.json"));
        let storage = SqliteStorage::new_in_memory().await.unwrap();
        let result = AppState::new(
            config,
            Arc::new(storage),
            Arc::new(MockConversationGateway::new()),
        );
        assert!(result.is_err());
    }
}
