//! ildhvp-gs (Grade Service) - H5P xAPI scoring bridge
//!
//! Serves the `setgrade` web service and per-view scoring sessions over
//! HTTP, backed by the SQLite gradebook in the root folder.

use anyhow::{Context, Result};
use clap::Parser;
use ildhvp_common::config::{
    default_config_path, resolve_root_folder, TomlConfig, ROOT_ENV_VAR,
};
use ildhvp_common::db::{create_token, init_database};
use ildhvp_gs::session::SessionRegistry;
use ildhvp_gs::sink::HttpResultSink;
use ildhvp_gs::{build_router, AppState};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::signal;
use tracing::{error, info};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

#[derive(Parser, Debug)]
#[command(name = "ildhvp-gs")]
#[command(about = "H5P grade service: xAPI scoring sessions and setgrade web service")]
#[command(version)]
struct Args {
    /// Port to listen on (overrides the config file)
    #[arg(short, long, env = "ILDHVP_GS_PORT")]
    port: Option<u16>,

    /// Root folder holding the database
    #[arg(short, long)]
    root_folder: Option<PathBuf>,

    /// Config file (defaults to the platform config dir)
    #[arg(short, long, env = "ILDHVP_CONFIG")]
    config: Option<PathBuf>,

    /// Issue a web-service token for this user id, print it and exit
    #[arg(long, value_name = "USER_ID")]
    issue_token: Option<i64>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let config_path = args.config.clone().or_else(default_config_path);
    let config = config_path
        .as_deref()
        .map(TomlConfig::load_or_default)
        .unwrap_or_default();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| config.logging.level.as_str().into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Build identification first, before any database delays
    info!(
        "Starting ILDHVP Grade Service (ildhvp-gs) v{} [{}] built {} ({})",
        env!("CARGO_PKG_VERSION"),
        env!("GIT_HASH"),
        env!("BUILD_TIMESTAMP"),
        env!("BUILD_PROFILE")
    );

    match &config_path {
        Some(path) if path.exists() => info!("Config file: {}", path.display()),
        _ => info!("No config file found, using defaults"),
    }

    let root_folder = resolve_root_folder(args.root_folder.as_deref(), ROOT_ENV_VAR, &config);
    info!("Root folder: {}", root_folder.display());

    let db_path = config.database_path(&root_folder);
    info!("Database path: {}", db_path.display());

    let pool = match init_database(&db_path).await {
        Ok(pool) => {
            info!("✓ Database ready");
            pool
        }
        Err(e) => {
            error!("Failed to initialize database: {}", e);
            return Err(e).context("Database initialization failed");
        }
    };

    if let Some(user_id) = args.issue_token {
        let token = create_token(&pool, user_id)
            .await
            .with_context(|| format!("Failed to issue token for user {}", user_id))?;
        println!("{}", token);
        return Ok(());
    }

    let state = match (&config.gradebook.url, &config.gradebook.token) {
        (Some(url), Some(token)) => {
            let sink = HttpResultSink::new(url, token.clone())
                .context("Failed to configure remote gradebook")?;
            info!("Session results go to remote gradebook {}", sink.endpoint());
            AppState::with_sink(pool, Arc::new(sink))
        }
        (Some(url), None) => {
            anyhow::bail!("[gradebook] url {} is set but token is missing", url);
        }
        _ => {
            info!("Session results go to the local gradebook");
            AppState::new(pool)
        }
    };

    let state = state.with_sessions(SessionRegistry::with_idle_ttl(
        config.sessions.idle_timeout(),
    ));
    info!(
        "Scoring sessions expire after {}s idle",
        config.sessions.idle_timeout_secs
    );

    // Periodic sweep for sessions whose page went away without closing them
    let sessions = Arc::clone(&state.sessions);
    let sweep_interval = config.sessions.sweep_interval();
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(sweep_interval);
        loop {
            ticker.tick().await;
            sessions.evict_idle().await;
        }
    });

    let app = build_router(state);

    let mut bind_config = config.clone();
    if let Some(port) = args.port {
        bind_config.server.port = port;
    }
    let addr = bind_config.bind_addr();

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind to {}", addr))?;
    info!("ildhvp-gs listening on http://{}", addr);
    info!("Health check: http://{}/health", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    info!("Server shutdown complete");
    Ok(())
}

/// Resolves on Ctrl+C or SIGTERM
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
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!("Failed to install SIGTERM handler: {}", e);
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
