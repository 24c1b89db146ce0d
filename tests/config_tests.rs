//! Integration tests for the TOML configuration system
//!
//! Loads configs from disk, wires a full `AppState` from them and checks
//! that a reload moves the budget caps of the running engine.

mod common;

use common::mocks::MockAgents;
use common::wait_for_terminal;
use compass::agents::AgentKind;
use compass::utils::toml_config::{CompassConfig, ConfigError, ConfigWarningKind};
use compass::{AppState, Company, ConfigManager};
use std::fs;
use std::sync::Arc;
use tempfile::TempDir;

const BASE: &str = r#"
[budget]
search_credit_cap = 12
llm_usd_cap = 2.5

[pipeline]
retry_backoff_ms = 10

[agents.patent]
timeout_secs = 30

[providers.search]
api_key_env = "COMPASS_TEST_UNSET_SEARCH_KEY"

[providers.llm]
api_key_env = "COMPASS_TEST_UNSET_LLM_KEY"
model = "gpt-4o-mini"
"#;

fn write_config(dir: &TempDir, content: &str) -> std::path::PathBuf {
    let path = dir.path().join("compass.toml");
    fs::write(&path, content).unwrap();
    path
}

#[test]
fn test_builtin_registry_from_file() {
    let dir = TempDir::new().unwrap();
    let path = write_config(&dir, BASE);

    let manager = Arc::new(ConfigManager::new(&path).unwrap());
    let state = AppState::from_config(manager).unwrap();

    for kind in AgentKind::ALL {
        assert!(state.registry.has_agent(kind), "{} missing", kind);
    }
    let caps = state.ledger.caps();
    assert_eq!(caps.search_credits, 12.0);
    assert_eq!(caps.llm_usd, 2.5);
}

#[test]
fn test_missing_secrets_are_warnings() {
    let config = CompassConfig::parse(BASE).unwrap();
    let warnings = config.validate_with_warnings().unwrap();

    let missing: Vec<_> = warnings
        .iter()
        .filter(|w| w.kind == ConfigWarningKind::MissingSecret)
        .collect();
    assert_eq!(missing.len(), 2);
}

#[test]
fn test_unknown_agent_section_is_rejected() {
    let err = CompassConfig::parse("[agents.weather]\ntimeout_secs = 5\n").unwrap_err();
    assert!(matches!(err, ConfigError::UnknownAgent(name) if name == "weather"));
}

#[tokio::test]
async fn test_reload_moves_caps_for_new_runs() {
    let dir = TempDir::new().unwrap();
    let path = write_config(&dir, BASE);

    let agents = MockAgents::succeeding();
    let manager = ConfigManager::new(&path).unwrap();
    let state = AppState::new(Arc::new(manager), agents.registry());

    let ledger = Arc::clone(&state.ledger);
    let store = Arc::clone(&state.store);
    let reloader = (*state.config_manager).clone().with_reload_hook(move |c| {
        ledger.set_caps(c.budget_caps());
        store.set_caps(c.budget_caps());
    });

    let first = state
        .orchestrator
        .start_run(Company::new("Acme", None))
        .unwrap();
    let first = wait_for_terminal(&state, &first.run_id).await;
    assert_eq!(first.cost.search_credit_cap, 12.0);

    write_config(&dir, &BASE.replace("search_credit_cap = 12", "search_credit_cap = 30"));
    reloader.reload().unwrap();

    assert_eq!(state.config_manager.config().budget.search_credit_cap, 30.0);
    assert_eq!(state.ledger.caps().search_credits, 30.0);
    // Consumption survives the reload
    assert_eq!(state.ledger.snapshot().search_credits, 8.0);

    let second = state
        .orchestrator
        .start_run(Company::new("Globex", None))
        .unwrap();
    let second = wait_for_terminal(&state, &second.run_id).await;
    assert_eq!(second.cost.search_credit_cap, 30.0);
}

#[test]
fn test_broken_reload_keeps_previous_config() {
    let dir = TempDir::new().unwrap();
    let path = write_config(&dir, BASE);
    let manager = ConfigManager::new(&path).unwrap();

    write_config(&dir, "[budget\nsearch_credit_cap = ");
    assert!(manager.reload().is_err());
    assert_eq!(manager.config().budget.search_credit_cap, 12.0);
}
