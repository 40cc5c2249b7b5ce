//! scriptvault server binary.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use figment::Figment;
use figment::providers::{Env, Format, Toml};
use scriptvault_core::config::AppConfig;
use scriptvault_metadata::models::UserRow;
use scriptvault_server::auth::{generate_token, hash_token};
use scriptvault_server::reconcile::spawn_reconciler;
use scriptvault_server::{AppState, create_router};
use std::net::SocketAddr;
use time::OffsetDateTime;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use uuid::Uuid;

/// scriptvault - userscript ingestion and delivery server
#[derive(Parser, Debug)]
#[command(name = "scriptvaultd")]
#[command(version, about, long_about = None)]
struct Args {
    /// Path to configuration file
    #[arg(
        short,
        long,
        env = "SCRIPTVAULT_CONFIG",
        default_value = "config/server.toml"
    )]
    config: String,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the HTTP server (default)
    Serve,
    /// Create an author account and print its upload token
    AddUser {
        /// Author name, used as the first install-name segment
        name: String,
        /// Repository-host username whose push notifications belong to this author
        #[arg(long)]
        github_username: Option<String>,
        /// Create the account without an upload token (webhook-only authors)
        #[arg(long)]
        no_token: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = load_config(&args.config)?;

    match args.command.unwrap_or(Command::Serve) {
        Command::Serve => serve(config).await,
        Command::AddUser {
            name,
            github_username,
            no_token,
        } => add_user(&config, name, github_username, no_token).await,
    }
}

/// Load configuration: optional TOML file, then `SCRIPTVAULT_` environment
/// variables (`__` separates nested keys).
fn load_config(path: &str) -> Result<AppConfig> {
    let config_path = std::path::Path::new(path);
    let mut figment = Figment::new();

    if config_path.exists() {
        tracing::info!(config_path = %path, "Loading configuration from file");
        figment = figment.merge(Toml::file(config_path));
    } else {
        tracing::debug!("No config file found at {}, using defaults and environment", path);
    }

    let config: AppConfig = figment
        .merge(Env::prefixed("SCRIPTVAULT_").split("__"))
        .extract()
        .context("failed to load configuration")?;

    let warnings = config
        .validate()
        .map_err(|e| anyhow::anyhow!("invalid configuration: {e}"))?;
    for warning in warnings {
        tracing::warn!("{warning}");
    }

    Ok(config)
}

async fn serve(config: AppConfig) -> Result<()> {
    tracing::info!("scriptvault v{}", env!("CARGO_PKG_VERSION"));

    scriptvault_server::metrics::register_metrics();

    let storage = scriptvault_storage::from_config(&config.storage)
        .await
        .context("failed to initialize storage")?;

    // Catch configuration and connectivity errors before accepting requests.
    storage
        .health_check()
        .await
        .context("storage health check failed")?;
    tracing::info!(backend = storage.backend_name(), "Storage backend ready");

    let metadata = scriptvault_metadata::from_config(&config.metadata)
        .await
        .context("failed to initialize metadata store")?;
    tracing::info!("Metadata store initialized");

    match spawn_reconciler(metadata.clone(), storage.clone(), &config.reconcile) {
        Some(_) => tracing::info!(
            interval_secs = config.reconcile.interval_secs,
            batch_size = config.reconcile.batch_size,
            "Blob reconciliation enabled"
        ),
        None => tracing::info!("Blob reconciliation disabled"),
    }

    let addr: SocketAddr = config.server.bind.parse().context("invalid bind address")?;
    let state = AppState::new(config, storage, metadata).context("failed to build HTTP client")?;
    let app = create_router(state);

    tracing::info!("Listening on {}", addr);

    // ConnectInfo carries the peer address checked by the push webhook.
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind to {}", addr))?;
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await?;

    Ok(())
}

async fn add_user(
    config: &AppConfig,
    name: String,
    github_username: Option<String>,
    no_token: bool,
) -> Result<()> {
    let metadata = scriptvault_metadata::from_config(&config.metadata)
        .await
        .context("failed to initialize metadata store")?;

    let token = (!no_token).then(generate_token);
    let row = UserRow {
        user_id: Uuid::new_v4(),
        name,
        github_username,
        token_hash: token.as_deref().map(hash_token),
        created_at: OffsetDateTime::now_utc(),
    };

    metadata
        .create_user(&row)
        .await
        .with_context(|| format!("failed to create user {}", row.name))?;
    tracing::info!(user = %row.name, user_id = %row.user_id, "User created");

    if let Some(token) = token {
        // The token is only ever shown here; the store keeps its hash.
        println!("{token}");
    }
    Ok(())
}
