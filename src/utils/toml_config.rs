//! TOML-based configuration for Compass
//!
//! Budget caps, pipeline timing, per-agent timeouts, model prices and the
//! upstream providers are declared in `compass.toml`. Secrets never live in
//! the file; each provider names the environment variable that holds its key.
//!
//! # Hot Reloading
//!
//! Configuration changes are detected and applied at runtime. Use
//! `ConfigManager` for thread-safe access to the current configuration.

use crate::agents::{AdapterPolicy, AgentKind};
use crate::budget::{BudgetCaps, HealthThresholds, ModelPrice, PriceTable};
use arc_swap::ArcSwap;
use notify::{Event, RecommendedWatcher, RecursiveMode, Watcher};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{error, info, warn};

/// Root configuration structure loaded from compass.toml
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CompassConfig {
    #[serde(default)]
    pub server: ServerConfig,

    #[serde(default)]
    pub budget: BudgetConfig,

    #[serde(default)]
    pub pipeline: PipelineConfig,

    /// Per-agent overrides keyed by agent name (`news`, `deepdive`, ...)
    #[serde(default)]
    pub agents: HashMap<String, AgentConfig>,

    /// USD prices keyed by model name
    #[serde(default)]
    pub pricing: HashMap<String, ModelPrice>,

    #[serde(default)]
    pub providers: ProvidersConfig,
}

// ============= Server Configuration =============

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,

    #[serde(default = "default_log_level")]
    pub log_level: String,
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    3000
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            log_level: default_log_level(),
        }
    }
}

// ============= Budget Configuration =============

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BudgetConfig {
    #[serde(default = "default_search_credit_cap")]
    pub search_credit_cap: f64,

    #[serde(default = "default_llm_usd_cap")]
    pub llm_usd_cap: f64,

    #[serde(default = "default_warning_percent")]
    pub warning_percent: f64,

    #[serde(default = "default_critical_percent")]
    pub critical_percent: f64,

    /// Length of the rolling operation log reported by the budget status
    #[serde(default = "default_recent_operations")]
    pub recent_operations: usize,
}

fn default_search_credit_cap() -> f64 {
    20.0
}

fn default_llm_usd_cap() -> f64 {
    10.0
}

fn default_warning_percent() -> f64 {
    80.0
}

fn default_critical_percent() -> f64 {
    95.0
}

fn default_recent_operations() -> usize {
    10
}

impl Default for BudgetConfig {
    fn default() -> Self {
        Self {
            search_credit_cap: default_search_credit_cap(),
            llm_usd_cap: default_llm_usd_cap(),
            warning_percent: default_warning_percent(),
            critical_percent: default_critical_percent(),
            recent_operations: default_recent_operations(),
        }
    }
}

// ============= Pipeline Configuration =============

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    #[serde(default = "default_retry_backoff_ms")]
    pub retry_backoff_ms: u64,

    #[serde(default = "default_timeout_secs")]
    pub default_timeout_secs: u64,

    /// How long a finished run is served for the same company
    #[serde(default = "default_run_cache_ttl_hours")]
    pub run_cache_ttl_hours: u64,

    /// Finished runs kept in memory; the oldest are evicted past this
    #[serde(default = "default_max_finished_runs")]
    pub max_finished_runs: usize,
}

fn default_max_retries() -> u32 {
    1
}

fn default_retry_backoff_ms() -> u64 {
    500
}

fn default_timeout_secs() -> u64 {
    120
}

fn default_run_cache_ttl_hours() -> u64 {
    24
}

fn default_max_finished_runs() -> usize {
    1000
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            max_retries: default_max_retries(),
            retry_backoff_ms: default_retry_backoff_ms(),
            default_timeout_secs: default_timeout_secs(),
            run_cache_ttl_hours: default_run_cache_ttl_hours(),
            max_finished_runs: default_max_finished_runs(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentConfig {
    pub timeout_secs: Option<u64>,
}

// ============= Provider Configuration =============

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProvidersConfig {
    #[serde(default)]
    pub search: SearchProviderConfig,

    #[serde(default)]
    pub llm: LlmProviderConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchProviderConfig {
    #[serde(default = "default_search_base_url")]
    pub base_url: String,

    /// Environment variable containing the API key
    #[serde(default = "default_search_api_key_env")]
    pub api_key_env: String,
}

fn default_search_base_url() -> String {
    "https://api.tavily.com".to_string()
}

fn default_search_api_key_env() -> String {
    "TAVILY_API_KEY".to_string()
}

impl Default for SearchProviderConfig {
    fn default() -> Self {
        Self {
            base_url: default_search_base_url(),
            api_key_env: default_search_api_key_env(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmProviderConfig {
    #[serde(default = "default_llm_base_url")]
    pub base_url: String,

    /// Environment variable containing the API key
    #[serde(default = "default_llm_api_key_env")]
    pub api_key_env: String,

    #[serde(default = "default_llm_model")]
    pub model: String,

    #[serde(default = "default_temperature")]
    pub temperature: f32,

    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,

    /// Ask the provider for a JSON object response
    #[serde(default = "default_true")]
    pub json_mode: bool,
}

fn default_llm_base_url() -> String {
    "https://api.openai.com/v1".to_string()
}

fn default_llm_api_key_env() -> String {
    "OPENAI_API_KEY".to_string()
}

fn default_llm_model() -> String {
    "gpt-4o".to_string()
}

fn default_temperature() -> f32 {
    0.2
}

fn default_max_tokens() -> u32 {
    4096
}

fn default_true() -> bool {
    true
}

impl Default for LlmProviderConfig {
    fn default() -> Self {
        Self {
            base_url: default_llm_base_url(),
            api_key_env: default_llm_api_key_env(),
            model: default_llm_model(),
            temperature: default_temperature(),
            max_tokens: default_max_tokens(),
            json_mode: default_true(),
        }
    }
}

// ============= Configuration Loading & Validation =============

/// Configuration warnings that don't prevent operation but may indicate issues
#[derive(Debug, Clone)]
pub struct ConfigWarning {
    pub kind: ConfigWarningKind,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ConfigWarningKind {
    MissingSecret,
    UnpricedModel,
}

impl std::fmt::Display for ConfigWarning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)
    }
}

/// Errors that can occur during configuration loading
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Configuration file not found: {0}")]
    FileNotFound(PathBuf),

    #[error("Failed to read configuration file: {0}")]
    ReadError(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    ParseError(#[from] toml::de::Error),

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Unknown agent '{0}' in [agents]")]
    UnknownAgent(String),

    #[error("Watch error: {0}")]
    WatchError(#[from] notify::Error),
}

impl CompassConfig {
    /// Load and validate configuration from a TOML file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();

        if !path.exists() {
            return Err(ConfigError::FileNotFound(path.to_path_buf()));
        }

        let content = fs::read_to_string(path)?;
        Self::parse(&content)
    }

    /// Parse and validate configuration from TOML text
    pub fn parse(content: &str) -> Result<Self, ConfigError> {
        let config: CompassConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate value ranges and agent names
    pub fn validate(&self) -> Result<(), ConfigError> {
        let budget = &self.budget;
        for (name, cap) in [
            ("search_credit_cap", budget.search_credit_cap),
            ("llm_usd_cap", budget.llm_usd_cap),
        ] {
            if !cap.is_finite() || cap < 0.0 {
                return Err(ConfigError::ValidationError(format!(
                    "budget.{} must be a non-negative number, got {}",
                    name, cap
                )));
            }
        }

        if !(0.0 < budget.warning_percent
            && budget.warning_percent < budget.critical_percent
            && budget.critical_percent <= 100.0)
        {
            return Err(ConfigError::ValidationError(format!(
                "budget thresholds must satisfy 0 < warning_percent < critical_percent <= 100, got {} and {}",
                budget.warning_percent, budget.critical_percent
            )));
        }

        if self.pipeline.max_retries > 1 {
            return Err(ConfigError::ValidationError(format!(
                "pipeline.max_retries may be 0 or 1, got {}",
                self.pipeline.max_retries
            )));
        }

        if self.pipeline.max_finished_runs == 0 {
            return Err(ConfigError::ValidationError(
                "pipeline.max_finished_runs must be at least 1".to_string(),
            ));
        }

        if self.pipeline.default_timeout_secs == 0 {
            return Err(ConfigError::ValidationError(
                "pipeline.default_timeout_secs must be greater than zero".to_string(),
            ));
        }

        for (name, agent) in &self.agents {
            name.parse::<AgentKind>()
                .map_err(|_| ConfigError::UnknownAgent(name.clone()))?;
            if agent.timeout_secs == Some(0) {
                return Err(ConfigError::ValidationError(format!(
                    "agents.{}.timeout_secs must be greater than zero",
                    name
                )));
            }
        }

        for (model, price) in &self.pricing {
            if price.input_per_million < 0.0 || price.output_per_million < 0.0 {
                return Err(ConfigError::ValidationError(format!(
                    "pricing.{} must not be negative",
                    model
                )));
            }
        }

        Ok(())
    }

    /// Validate and collect non-fatal warnings
    pub fn validate_with_warnings(&self) -> Result<Vec<ConfigWarning>, ConfigError> {
        self.validate()?;

        let mut warnings = Vec::new();
        for env in [
            &self.providers.search.api_key_env,
            &self.providers.llm.api_key_env,
        ] {
            if self.resolve_env(env).is_none() {
                warnings.push(ConfigWarning {
                    kind: ConfigWarningKind::MissingSecret,
                    message: format!("Environment variable '{}' is not set", env),
                });
            }
        }

        if !self.pricing.is_empty() && !self.pricing.contains_key(&self.providers.llm.model) {
            warnings.push(ConfigWarning {
                kind: ConfigWarningKind::UnpricedModel,
                message: format!(
                    "Model '{}' has no [pricing] entry; spend is estimated at the highest listed price",
                    self.providers.llm.model
                ),
            });
        }

        Ok(warnings)
    }

    /// Get a resolved value from an env var reference
    pub fn resolve_env(&self, env_name: &str) -> Option<String> {
        std::env::var(env_name).ok().filter(|v| !v.is_empty())
    }

    pub fn budget_caps(&self) -> BudgetCaps {
        BudgetCaps {
            search_credits: self.budget.search_credit_cap,
            llm_usd: self.budget.llm_usd_cap,
        }
    }

    pub fn health_thresholds(&self) -> HealthThresholds {
        HealthThresholds {
            warning_percent: self.budget.warning_percent,
            critical_percent: self.budget.critical_percent,
        }
    }

    pub fn price_table(&self) -> PriceTable {
        PriceTable::new(self.pricing.clone())
    }

    pub fn adapter_policy(&self) -> AdapterPolicy {
        let timeouts = self
            .agents
            .iter()
            .filter_map(|(name, agent)| {
                let kind = name.parse::<AgentKind>().ok()?;
                Some((kind, Duration::from_secs(agent.timeout_secs?)))
            })
            .collect();

        AdapterPolicy {
            max_retries: self.pipeline.max_retries,
            retry_backoff: Duration::from_millis(self.pipeline.retry_backoff_ms),
            default_timeout: Duration::from_secs(self.pipeline.default_timeout_secs),
            timeouts,
        }
    }

    pub fn cache_ttl(&self) -> chrono::Duration {
        chrono::Duration::hours(self.pipeline.run_cache_ttl_hours.min(i64::MAX as u64) as i64)
    }
}

// ============= Hot Reloading Configuration Manager =============

type ReloadHook = Arc<dyn Fn(&CompassConfig) + Send + Sync>;

/// Thread-safe configuration manager with hot reloading support
pub struct ConfigManager {
    config: Arc<ArcSwap<CompassConfig>>,
    config_path: PathBuf,
    watcher: RwLock<Option<RecommendedWatcher>>,
    reload_tx: Option<mpsc::UnboundedSender<()>>,
    on_reload: Option<ReloadHook>,
}

impl ConfigManager {
    /// Create a new configuration manager and load the initial config
    pub fn new<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        // Absolute path for reliable file watching
        let path = path.as_ref();
        let path = if path.is_absolute() {
            path.to_path_buf()
        } else {
            std::env::current_dir()
                .map_err(ConfigError::ReadError)?
                .join(path)
        };

        let config = CompassConfig::load(&path)?;

        Ok(Self {
            config: Arc::new(ArcSwap::from_pointee(config)),
            config_path: path,
            watcher: RwLock::new(None),
            reload_tx: None,
            on_reload: None,
        })
    }

    /// Create a config manager directly from a config, without file watching
    pub fn from_config(config: CompassConfig) -> Self {
        Self {
            config: Arc::new(ArcSwap::from_pointee(config)),
            config_path: PathBuf::from("compass.toml"),
            watcher: RwLock::new(None),
            reload_tx: None,
            on_reload: None,
        }
    }

    /// Run `hook` after every successful reload
    pub fn with_reload_hook(mut self, hook: impl Fn(&CompassConfig) + Send + Sync + 'static) -> Self {
        self.on_reload = Some(Arc::new(hook));
        self
    }

    /// Get the current configuration (lockless read)
    pub fn config(&self) -> Arc<CompassConfig> {
        self.config.load_full()
    }

    pub fn path(&self) -> &Path {
        &self.config_path
    }

    /// Manually reload the configuration from disk
    pub fn reload(&self) -> Result<(), ConfigError> {
        info!("Reloading configuration from {:?}", self.config_path);

        let new_config = Arc::new(CompassConfig::load(&self.config_path)?);
        self.config.store(Arc::clone(&new_config));
        if let Some(hook) = &self.on_reload {
            hook(&new_config);
        }

        info!("Configuration reloaded successfully");
        Ok(())
    }

    /// Start watching for configuration file changes
    pub fn start_watching(&mut self) -> Result<(), ConfigError> {
        let (tx, mut rx) = mpsc::unbounded_channel::<()>();
        self.reload_tx = Some(tx.clone());

        let config_path = self.config_path.clone();
        let config_arc = Arc::clone(&self.config);
        let on_reload = self.on_reload.clone();
        let file_name = config_path.file_name().map(|n| n.to_os_string());

        let mut watcher = notify::recommended_watcher(move |res: Result<Event, notify::Error>| {
            match res {
                Ok(event) => {
                    let touches_config = event
                        .paths
                        .iter()
                        .any(|p| p.file_name().map(|n| n.to_os_string()) == file_name);
                    if touches_config && (event.kind.is_modify() || event.kind.is_create()) {
                        // Debounced in the receiver
                        let _ = tx.send(());
                    }
                }
                Err(e) => {
                    error!("Config watcher error: {:?}", e);
                }
            }
        })?;

        // Editors often replace the file, so watch its directory
        if let Some(parent) = self.config_path.parent() {
            watcher.watch(parent, RecursiveMode::NonRecursive)?;
        }

        *self.watcher.write() = Some(watcher);

        tokio::spawn(async move {
            let mut last_reload: Option<std::time::Instant> = None;
            let debounce_duration = Duration::from_millis(500);

            while rx.recv().await.is_some() {
                if last_reload.is_some_and(|t| t.elapsed() < debounce_duration) {
                    continue;
                }

                // Let the write finish
                tokio::time::sleep(Duration::from_millis(100)).await;

                match CompassConfig::load(&config_path) {
                    Ok(new_config) => {
                        let new_config = Arc::new(new_config);
                        config_arc.store(Arc::clone(&new_config));
                        if let Some(hook) = &on_reload {
                            hook(&new_config);
                        }
                        info!("Configuration hot-reloaded successfully");
                        last_reload = Some(std::time::Instant::now());
                    }
                    Err(e) => {
                        warn!(
                            "Failed to hot-reload config: {}. Keeping previous config.",
                            e
                        );
                    }
                }
            }
        });

        info!("Configuration hot-reload watcher started");
        Ok(())
    }

    /// Stop watching for configuration changes
    pub fn stop_watching(&self) {
        *self.watcher.write() = None;
        info!("Configuration hot-reload watcher stopped");
    }
}

impl Clone for ConfigManager {
    fn clone(&self) -> Self {
        Self {
            config: Arc::clone(&self.config),
            config_path: self.config_path.clone(),
            watcher: RwLock::new(None), // Watcher is not cloned
            reload_tx: self.reload_tx.clone(),
            on_reload: self.on_reload.clone(),
        }
    }
}
