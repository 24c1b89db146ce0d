//! Init command implementation
//!
//! Scaffolds `compass.toml` and `.env.example` in a directory.

use super::output::Output;
use std::fs;
use std::path::{Path, PathBuf};

/// Result of the init operation
#[derive(Debug, PartialEq)]
pub enum InitResult {
    /// Initialization completed successfully
    Success,
    /// compass.toml already exists and --force was not given
    AlreadyExists,
    /// An error occurred during initialization
    Error(String),
}

/// Configuration for the init command
pub struct InitConfig {
    /// Directory to initialize
    pub path: PathBuf,
    /// Overwrite existing files
    pub force: bool,
}

/// Run the init command
pub fn run(config: InitConfig, output: &Output) -> InitResult {
    output.banner();
    output.header("Initializing Compass");

    let base_path = &config.path;
    if !base_path.exists() {
        if let Err(e) = fs::create_dir_all(base_path) {
            output.error(&format!("Failed to create {}: {}", base_path.display(), e));
            return InitResult::Error(e.to_string());
        }
    }

    let config_path = base_path.join("compass.toml");
    if config_path.exists() && !config.force {
        output.warning("compass.toml already exists!");
        output.hint("Use --force to overwrite existing files");
        return InitResult::AlreadyExists;
    }

    let files = [
        ("config", "compass.toml", generate_compass_toml()),
        ("env", ".env.example", generate_env_example()),
    ];
    for (file_type, name, content) in files {
        match write_file(&base_path.join(name), &content, config.force) {
            Ok(true) => output.created(file_type, name),
            Ok(false) => output.skipped(name, "already exists"),
            Err(e) => {
                output.error(&format!("Failed to create {}: {}", name, e));
                return InitResult::Error(e.to_string());
            }
        }
    }

    output.success(&format!("Compass initialized in {}", base_path.display()));

    output.header("Next Steps");
    output.info("1. Add your API keys:");
    output.command("cp .env.example .env");
    output.info("2. Start the server:");
    output.command("compass-server");
    output.hint("Or run a single analysis: compass-server analyze \"Acme\" --domain acme.com");

    InitResult::Success
}

/// Returns whether the file was written
fn write_file(path: &Path, content: &str, force: bool) -> std::io::Result<bool> {
    if path.exists() && !force {
        return Ok(false);
    }
    fs::write(path, content)?;
    Ok(true)
}

fn generate_compass_toml() -> String {
    r#"# Compass configuration
#
# Secrets are never stored here; each provider names the environment
# variable that holds its key (see .env.example).

[server]
host = "127.0.0.1"
port = 3000
log_level = "info"          # overridden by RUST_LOG

[budget]
search_credit_cap = 20      # search API credits per process
llm_usd_cap = 10.0          # LLM spend in USD per process
warning_percent = 80
critical_percent = 95
recent_operations = 10

[pipeline]
max_retries = 1             # transient failures only; 0 or 1
retry_backoff_ms = 500
default_timeout_secs = 120
run_cache_ttl_hours = 24    # serve a finished run for the same company
max_finished_runs = 1000    # oldest finished runs are dropped past this

# Per-agent timeout overrides:
# discovery, news, patent, founder, competitive, deepdive, verification, synthesis
[agents.discovery]
timeout_secs = 60

[agents.deepdive]
timeout_secs = 180

[agents.synthesis]
timeout_secs = 180

# USD per million tokens
[pricing.gpt-4o]
input_per_million = 2.5
output_per_million = 10.0

[pricing.gpt-4o-mini]
input_per_million = 0.15
output_per_million = 0.6

[providers.search]
base_url = "https://api.tavily.com"
api_key_env = "TAVILY_API_KEY"

# Any OpenAI-compatible chat completions endpoint
[providers.llm]
base_url = "https://api.openai.com/v1"
api_key_env = "OPENAI_API_KEY"
model = "gpt-4o"
temperature = 0.2
max_tokens = 4096
json_mode = true
"#
    .to_string()
}

fn generate_env_example() -> String {
    r#"# Copy to .env and fill in
TAVILY_API_KEY=
OPENAI_API_KEY=

# Log filter, e.g. compass=debug,tower_http=info
RUST_LOG=info
"#
    .to_string()
}
