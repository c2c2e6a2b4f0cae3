//! Integration tests for SQLite storage layer
//!
//! Tests database operations using in-memory and on-disk SQLite databases.

use chrono::{Duration, Utc};
use pretty_assertions::assert_eq;
use serde_json::json;

use idea_stress_tester::config::{DatabaseConfig, ModelBinding};
use idea_stress_tester::storage::{
    FollowUpRecord, Invocation, RunRecord, SqliteStorage, Storage,
};

/// Create an in-memory storage instance for testing
async fn create_test_storage() -> SqliteStorage {
    SqliteStorage::new_in_memory()
        .await
        .expect("Failed to create in-memory storage")
}

fn run_record(id: &str, context_id: &str, minutes_ago: i64) -> RunRecord {
    RunRecord {
        id: id.to_string(),
        context_id: context_id.to_string(),
        assistant_id: "asst-1".to_string(),
        input_idea: "Uber for dog walking, but revolutionary".to_string(),
        neutral_idea: "An app that matches dog owners with walkers.".to_string(),
        assumptions: "1) Owners trust strangers with pets.".to_string(),
        critiques: json!({"vc": "Low margins.", "user": "Trust issues."}),
        risk_signals: json!({"threshold": 3, "personas_analyzed": 2}),
        verdict: "PRIMARY FAILURE MODE: trust".to_string(),
        personas: vec!["vc".to_string(), "user".to_string()],
        latency_ms: 1234,
        created_at: Utc::now() - Duration::minutes(minutes_ago),
    }
}

#[cfg(test)]
mod run_tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[tokio::test]
    async fn test_save_and_get_run() {
        let storage = create_test_storage().await;
        let run = run_record("run-1", "ctx-1", 0);

        storage.save_run(&run).await.unwrap();
        let retrieved = storage.get_run("run-1").await.unwrap().unwrap();

        assert_eq!(retrieved.id, run.id);
        assert_eq!(retrieved.critiques, run.critiques);
        assert_eq!(retrieved.risk_signals, run.risk_signals);
        assert_eq!(retrieved.personas, run.personas);
        assert_eq!(retrieved.latency_ms, 1234);
    }

    #[tokio::test]
    async fn test_get_nonexistent_run() {
        let storage = create_test_storage().await;
        assert!(storage.get_run("missing").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_context_runs_oldest_first() {
        let storage = create_test_storage().await;
        storage.save_run(&run_record("newer", "ctx", 1)).await.unwrap();
        storage.save_run(&run_record("older", "ctx", 10)).await.unwrap();
        storage
            .save_run(&run_record("elsewhere", "other", 5))
            .await
            .unwrap();

        let runs = storage.get_context_runs("ctx").await.unwrap();
        let ids: Vec<&str> = runs.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, vec!["older", "newer"]);
    }

    #[tokio::test]
    async fn test_recent_runs_newest_first_with_limit() {
        let storage = create_test_storage().await;
        for (id, minutes) in [("a", 30), ("b", 20), ("c", 10)] {
            storage
                .save_run(&run_record(id, &format!("ctx-{id}"), minutes))
                .await
                .unwrap();
        }

        let runs = storage.list_recent_runs(2).await.unwrap();
        let ids: Vec<&str> = runs.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, vec!["c", "b"]);
    }

    #[tokio::test]
    async fn test_duplicate_run_id_fails() {
        let storage = create_test_storage().await;
        let run = run_record("dup", "ctx", 0);
        storage.save_run(&run).await.unwrap();
        assert!(storage.save_run(&run).await.is_err());
    }
}

#[cfg(test)]
mod follow_up_tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[tokio::test]
    async fn test_follow_ups_by_context() {
        let storage = create_test_storage().await;
        storage
            .save_follow_up(&FollowUpRecord::new("ctx", "First question?", "First.", 10))
            .await
            .unwrap();
        storage
            .save_follow_up(&FollowUpRecord::new("ctx", "Second question?", "Second.", 12))
            .await
            .unwrap();
        storage
            .save_follow_up(&FollowUpRecord::new("other", "Unrelated?", "No.", 5))
            .await
            .unwrap();

        let follow_ups = storage.get_follow_ups("ctx").await.unwrap();
        assert_eq!(follow_ups.len(), 2);
        assert_eq!(follow_ups[0].question, "First question?");
        assert_eq!(follow_ups[1].answer, "Second.");
    }
}

#[cfg(test)]
mod invocation_tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[tokio::test]
    async fn test_invocation_ledger_round_trip() {
        let storage = create_test_storage().await;
        let model = ModelBinding::new("anthropic", "claude-3-5-sonnet");

        let ok = Invocation::new("critic", &model)
            .with_run("run-1")
            .with_context("ctx")
            .with_persona("engineer")
            .success(420);
        let failed = Invocation::new("verdict", &model)
            .with_run("run-1")
            .with_context("ctx")
            .failure("API error: 500 - boom", 90);

        storage.log_invocation(&ok).await.unwrap();
        storage.log_invocation(&failed).await.unwrap();

        let ledger = storage.get_context_invocations("ctx").await.unwrap();
        assert_eq!(ledger.len(), 2);

        let critic = ledger.iter().find(|i| i.stage == "critic").unwrap();
        assert!(critic.success);
        assert_eq!(critic.persona.as_deref(), Some("engineer"));
        assert_eq!(critic.llm_provider, "anthropic");
        assert_eq!(critic.latency_ms, Some(420));

        let verdict = ledger.iter().find(|i| i.stage == "verdict").unwrap();
        assert!(!verdict.success);
        assert_eq!(verdict.error.as_deref(), Some("API error: 500 - boom"));
    }

    #[tokio::test]
    async fn test_ledger_for_unknown_context_is_empty() {
        let storage = create_test_storage().await;
        assert!(storage
            .get_context_invocations("nothing")
            .await
            .unwrap()
            .is_empty());
    }
}

#[cfg(test)]
mod file_storage_tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_on_disk_database_persists_across_connections() {
        let dir = TempDir::new().unwrap();
        let config = DatabaseConfig {
            path: dir.path().join("nested").join("stress_tests.db"),
            max_connections: 2,
        };

        {
            let storage = SqliteStorage::new(&config).await.unwrap();
            storage.save_run(&run_record("kept", "ctx", 0)).await.unwrap();
            storage.pool().close().await;
        }

        let reopened = SqliteStorage::new(&config).await.unwrap();
        let run = reopened.get_run("kept").await.unwrap();
        assert!(run.is_some());
        assert!(config.path.exists());
    }
}
