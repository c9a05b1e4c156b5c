//! yamdb-api - Review service
//!
//! `serve` (default) runs the HTTP API; `create-admin` creates or promotes a
//! superuser account.

use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use tokio::signal;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use yamdb_api::mail::Mailer;
use yamdb_api::token::TokenIssuer;
use yamdb_api::{build_router, AppState};
use yamdb_common::auth::load_signing_secret;
use yamdb_common::config::Settings;
use yamdb_common::db::{init_database, users};
use yamdb_common::validators::validate_username;

/// Command-line arguments for yamdb-api
#[derive(Parser, Debug)]
#[command(name = "yamdb-api")]
#[command(about = "Review service API for YaMDb")]
#[command(version)]
struct Args {
    /// TOML configuration file
    #[arg(short, long, env = "YAMDB_CONFIG")]
    config: Option<PathBuf>,

    /// Address to bind
    #[arg(long, env = "YAMDB_HOST")]
    host: Option<String>,

    /// Port to listen on
    #[arg(short, long, env = "YAMDB_PORT")]
    port: Option<u16>,

    /// SQLite database file
    #[arg(short, long, env = "YAMDB_DATABASE")]
    database: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the HTTP server
    Serve,
    /// Create a superuser, or promote an existing account with the same identity
    CreateAdmin {
        #[arg(long)]
        username: String,
        #[arg(long)]
        email: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let mut settings =
        Settings::load(args.config.as_deref()).context("Failed to load configuration")?;
    if let Some(host) = args.host {
        settings.server.host = host;
    }
    if let Some(port) = args.port {
        settings.server.port = port;
    }
    if let Some(database) = args.database {
        settings.database.path = database;
    }

    // Initialize tracing; RUST_LOG wins over the configured level
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| settings.logging.level.clone().into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting YaMDb API (yamdb-api) v{}", env!("CARGO_PKG_VERSION"));
    info!("Database path: {}", settings.database.path.display());

    let pool = match init_database(&settings.database.path).await {
        Ok(pool) => {
            info!("✓ Database ready");
            pool
        }
        Err(e) => {
            error!("Failed to open database: {}", e);
            return Err(e.into());
        }
    };

    match args.command.unwrap_or(Command::Serve) {
        Command::Serve => serve(settings, pool).await,
        Command::CreateAdmin { username, email } => {
            if let Err(e) = validate_username(&username) {
                bail!("Invalid username {:?}: {}", username, e);
            }
            let user = users::upsert_superuser(&pool, &username, &email)
                .await
                .context("Failed to create admin")?;
            info!("✓ Superuser {} ({}) ready", user.username, user.email);
            Ok(())
        }
    }
}

async fn serve(settings: Settings, pool: sqlx::SqlitePool) -> Result<()> {
    let secret = load_signing_secret(&pool, settings.auth.secret_key.as_deref())
        .await
        .context("Failed to load token signing secret")?;
    let tokens = TokenIssuer::new(&secret, settings.auth.token_lifetime_secs);

    let mailer = Mailer::from_settings(&settings.email).context("Failed to configure mail")?;
    info!("Mail backend: {}", mailer.backend_name());

    let state = AppState::new(pool, tokens, mailer, settings.api.page_size);
    let app = build_router(state);

    let listener =
        tokio::net::TcpListener::bind((settings.server.host.as_str(), settings.server.port))
            .await
            .context("Failed to bind to address")?;
    let addr = listener.local_addr()?;
    info!("yamdb-api listening on http://{}", addr);
    info!("Health check: http://{}/health", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    info!("Server shutdown complete");
    Ok(())
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                error!("Failed to install signal handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, shutting down");
        },
        _ = terminate => {
            info!("Received terminate signal, shutting down");
        },
    }
}
