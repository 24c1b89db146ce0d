use anyhow::Context;
use compass::cli::init::{InitConfig, InitResult};
use compass::cli::output::Output;
use compass::cli::{analyze, init, Cli, Commands};
use compass::utils::toml_config::{CompassConfig, ConfigError};
use compass::{api, AppState, ConfigManager, RunRequest};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let cli = Cli::parse_args();
    let output = if cli.no_color {
        Output::no_color()
    } else {
        Output::new()
    };

    match cli.command {
        Some(Commands::Init { path, force }) => match init::run(InitConfig { path, force }, &output) {
            InitResult::Success | InitResult::AlreadyExists => Ok(()),
            InitResult::Error(e) => Err(anyhow::anyhow!(e)),
        },
        Some(Commands::Analyze {
            company,
            domain,
            poll_ms,
        }) => {
            let manager = load_config(&cli.config, &output)?;
            init_tracing(&manager.config().server.log_level, cli.json);

            let state = AppState::from_config(Arc::new(manager))?;
            let company = RunRequest { company, domain }.into_company()?;
            let run = analyze::run(&state, company, Duration::from_millis(poll_ms.max(10)), &output).await?;

            println!("{}", serde_json::to_string_pretty(&run)?);
            Ok(())
        }
        Some(Commands::Serve) | None => {
            let manager = load_config(&cli.config, &output)?;
            let config = manager.config();
            init_tracing(&config.server.log_level, cli.json);
            serve(manager, &config).await
        }
    }
}

fn load_config(path: &Path, output: &Output) -> anyhow::Result<ConfigManager> {
    match ConfigManager::new(path) {
        Ok(manager) => Ok(manager),
        Err(ConfigError::FileNotFound(path)) => {
            output.error(&format!("{} not found", path.display()));
            output.hint("Create one with: compass-server init");
            anyhow::bail!("configuration file not found: {}", path.display())
        }
        Err(e) => Err(e).with_context(|| format!("failed to load {}", path.display())),
    }
}

/// `RUST_LOG` wins over `server.log_level`. Logs go to stderr so `analyze`
/// output stays clean on stdout.
fn init_tracing(level: &str, json: bool) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("compass={level},compass_server={level},tower_http={level}")));
    let registry = tracing_subscriber::registry().with(filter);

    if json {
        registry
            .with(tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        registry
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .init();
    }
}

async fn serve(manager: ConfigManager, config: &CompassConfig) -> anyhow::Result<()> {
    for warning in config.validate_with_warnings()? {
        tracing::warn!("{}", warning);
    }

    let state = AppState::from_config(Arc::new(manager))?;

    // Shares the live config with `state`; reloaded caps reach the ledger and store
    let ledger = Arc::clone(&state.ledger);
    let store = Arc::clone(&state.store);
    let mut watcher = (*state.config_manager).clone().with_reload_hook(move |c| {
        ledger.set_caps(c.budget_caps());
        store.set_caps(c.budget_caps());
    });
    if let Err(e) = watcher.start_watching() {
        tracing::warn!("Config hot reload disabled: {}", e);
    }

    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("failed to bind {}", addr))?;
    tracing::info!("Compass listening on http://{}", addr);

    axum::serve(listener, api::routes::app(state))
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    watcher.stop_watching();
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutting down");
}
