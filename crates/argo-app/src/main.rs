//! Argo application binary - composition root.
//!
//! 1. Load configuration from TOML and apply CLI/env overrides
//! 2. Open the SQLite database
//! 3. Build the model and bank clients
//! 4. Serve the axum API until Ctrl-C, then flush pending transcript saves

mod cli;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use clap::Parser;

use argo_api::auth::issue_token;
use argo_api::state::AppState;
use argo_bank::PlaidClient;
use argo_chat::{AnthropicClient, LanguageModel};
use argo_core::config::ArgoConfig;
use argo_core::services::{BankData, BankLink};
use argo_storage::{Database, UserRepository};

use cli::CliArgs;

/// Create the data directory and open the database inside it.
fn open_database(data_dir: &Path, file_name: &str) -> Result<Database, Box<dyn std::error::Error>> {
    std::fs::create_dir_all(data_dir)?;
    let db_path = data_dir.join(file_name);
    let db = Database::new(&db_path)?;
    tracing::info!(path = %db_path.display(), "SQLite database opened");
    Ok(db)
}

/// Bank clients, or `None` when aggregator credentials are not set.
fn bank_clients(config: &ArgoConfig) -> (Option<Arc<dyn BankData>>, Option<Arc<dyn BankLink>>) {
    match PlaidClient::from_config(&config.bank) {
        Ok(client) => {
            let client = Arc::new(client);
            tracing::info!(base_url = %config.bank.base_url, "Bank client ready");
            (Some(client.clone()), Some(client))
        }
        Err(e) => {
            tracing::warn!(error = %e, "Bank integration disabled");
            (None, None)
        }
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for Ctrl-C");
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown requested");
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = CliArgs::parse();

    let config_file = args.resolve_config_path();
    let mut config = ArgoConfig::load_or_default(&config_file);
    if let Some(dir) = args.resolve_data_dir() {
        config.general.data_dir = dir;
    }
    if let Some(level) = args.resolve_log_level() {
        config.general.log_level = level;
    }
    config.general.port = args.resolve_port(config.general.port);

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&config.general.log_level)),
        )
        .init();

    tracing::info!("Starting Argo v{}", env!("CARGO_PKG_VERSION"));
    tracing::info!(path = %config_file.display(), "Configuration resolved");

    if args.write_config {
        config.save(&config_file)?;
        println!("{}", config_file.display());
        return Ok(());
    }

    let data_dir: PathBuf = cli::expand_home(&config.general.data_dir);
    let database = Arc::new(open_database(&data_dir, &config.storage.database_file)?);

    if let Some(email) = args.issue_token.as_deref() {
        let users = UserRepository::new(database.clone());
        let token = issue_token(&users, email)?;
        println!("{}", token);
        return Ok(());
    }

    let model: Arc<dyn LanguageModel> = match AnthropicClient::from_config(&config.model) {
        Ok(client) => Arc::new(client),
        Err(e) => {
            tracing::error!(error = %e, env = %config.model.api_key_env, "Model client unavailable");
            return Err(e.into());
        }
    };
    let (bank, bank_link) = bank_clients(&config);

    let state = AppState::new(config.clone(), database, model, bank, bank_link);
    let autosaver = state.orchestrator.autosaver().clone();

    if let Err(e) = argo_api::start_server(&config, state, shutdown_signal()).await {
        tracing::error!(port = config.general.port, error = %e, "API server stopped");
        autosaver.flush().await;
        return Err(e.into());
    }

    let pending = autosaver.pending_count();
    autosaver.flush().await;
    tracing::info!(flushed = pending, "Pending transcripts saved");

    Ok(())
}
