//! Shared helpers for integration tests

#![allow(dead_code)]

pub mod mocks;

use compass::runs::Run;
use compass::utils::toml_config::CompassConfig;
use compass::{AppState, Company, ConfigManager};
use mocks::MockAgents;
use std::sync::Arc;
use std::time::Duration;

/// Fast retries and short timeouts so failure paths finish quickly
pub const FAST_PIPELINE: &str = r#"
[pipeline]
max_retries = 1
retry_backoff_ms = 10
default_timeout_secs = 5
"#;

pub fn config(extra: &str) -> CompassConfig {
    CompassConfig::parse(&format!("{}\n{}", FAST_PIPELINE, extra)).expect("valid test config")
}

pub fn test_state(agents: &MockAgents, extra_config: &str) -> AppState {
    let manager = Arc::new(ConfigManager::from_config(config(extra_config)));
    AppState::new(manager, agents.registry())
}

pub fn acme() -> Company {
    Company::new("Acme", Some("acme.com".to_string()))
}

/// Poll until the run reaches a terminal status
pub async fn wait_for_terminal(state: &AppState, run_id: &str) -> Run {
    let deadline = tokio::time::Instant::now() + Duration::from_secs(10);
    loop {
        let run = state.store.get(run_id).expect("run exists");
        if run.status.is_terminal() {
            return run;
        }
        assert!(
            tokio::time::Instant::now() < deadline,
            "run {} stuck in {} (phase {:?})",
            run_id,
            run.status,
            run.current_phase
        );
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}

/// Poll until the run has entered `phase`
pub async fn wait_for_phase(state: &AppState, run_id: &str, phase: compass::runs::Phase) {
    let deadline = tokio::time::Instant::now() + Duration::from_secs(10);
    while state.store.get(run_id).expect("run exists").current_phase != Some(phase) {
        assert!(tokio::time::Instant::now() < deadline, "run never reached {}", phase);
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
}
