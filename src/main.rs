use std::path::PathBuf;

use anyhow::Context;
use axum::Router;
use clap::Parser;
use tokio::net::TcpListener;

use deptqa::core::config::{discover_project_root, AppPaths, ConfigService};
use deptqa::core::logging;
use deptqa::server;
use deptqa::state::AppState;

/// Department Q&A web server
#[derive(Parser, Debug)]
#[command(name = "deptqa")]
#[command(about = "Serve department-scoped document Q&A", long_about = None)]
struct Args {
    /// Address to bind (overrides server.host / DEPTQA_HOST)
    #[arg(long)]
    host: Option<String>,

    /// Port to bind (overrides server.port / DEPTQA_PORT)
    #[arg(long)]
    port: Option<u16>,

    /// YAML settings file (defaults to ./config.yml)
    #[arg(long)]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();
    let args = Args::parse();

    let config = ConfigService::new(discover_project_root()).with_config_path(args.config);
    let mut settings = config
        .load_settings()
        .with_context(|| format!("Failed to load settings from {}", config.config_path().display()))?;
    if let Some(host) = args.host {
        settings.server.host = host;
    }
    if let Some(port) = args.port {
        settings.server.port = port;
    }

    let paths = AppPaths::new(config.project_root().to_path_buf(), &settings.storage);
    logging::init(&paths.log_dir, "deptqa.log");

    if let Ok(value) = serde_json::to_value(&settings) {
        tracing::info!("Settings: {}", config.redact_sensitive_values(&value));
    }

    let bind_addr = format!("{}:{}", settings.server.host, settings.server.port);
    let state = AppState::initialize(settings, paths).await?;

    let listener = TcpListener::bind(&bind_addr)
        .await
        .with_context(|| format!("Failed to bind to {}", bind_addr))?;
    let addr = listener.local_addr()?;
    tracing::info!("Listening on http://{}", addr);

    let sessions = state.sessions.clone();
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(std::time::Duration::from_secs(300));
        loop {
            ticker.tick().await;
            let removed = sessions.prune_expired().await;
            if removed > 0 {
                tracing::debug!("Pruned {} idle sessions", removed);
            }
        }
    });

    let app: Router = server::router::router(state);

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            tracing::info!("Shutting down");
        })
        .await
        .context("Server error")?;

    Ok(())
}
