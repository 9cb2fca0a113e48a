//! Boy or Girl? HTTP server
//!
//! Loads the model artifact once, then serves the prediction API.
//!
//! Configuration: `--config` / `BOY_OR_GIRL_CONFIG` (YAML), then
//! `BOY_OR_GIRL_*` environment overrides (see `boy_or_girl::config`), then
//! command-line flags.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use boy_or_girl::{
    api::{build_router, AppState},
    AppConfig, PredictionService, SubmissionPipeline, SuffixModelPredictor,
};

#[derive(Debug, Parser)]
#[command(name = "boy_or_girl_server", about = "Name to gender prediction server")]
struct Args {
    /// YAML config file
    #[arg(long, env = "BOY_OR_GIRL_CONFIG")]
    config: Option<PathBuf>,

    /// Listen address, overrides config
    #[arg(long)]
    bind: Option<String>,

    /// Model version directory under the artifact root, overrides config
    #[arg(long)]
    model_version: Option<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "boy_or_girl=info,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let args = Args::parse();

    let mut config =
        AppConfig::load(args.config.as_deref()).context("Failed to load configuration")?;
    if let Some(bind) = args.bind {
        config.server.bind_addr = bind;
    }
    if let Some(version) = args.model_version {
        config.model.version = version;
    }
    config.validate().context("Invalid configuration")?;

    tracing::info!(
        artifact_dir = %config.model.artifact_dir.display(),
        version = %config.model.version,
        timeout_ms = config.predictor.timeout_ms,
        session_ttl_secs = config.server.session_ttl_secs,
        "Configuration loaded"
    );

    let predictor: Arc<dyn PredictionService> = Arc::new(
        SuffixModelPredictor::load(&config.model.artifact_dir, &config.model.version)
            .context("Failed to load prediction model")?,
    );

    let pipeline = SubmissionPipeline::new(predictor, config.predictor.timeout());
    let state = AppState::new(pipeline);
    let _sweep = state.sessions.spawn_expiry_sweep(
        config.server.session_ttl(),
        config.server.session_sweep_interval(),
    );
    let app = build_router(state);

    let listener = tokio::net::TcpListener::bind(&config.server.bind_addr)
        .await
        .with_context(|| format!("Failed to bind to {}", config.server.bind_addr))?;
    tracing::info!("Listening on {}", config.server.bind_addr);

    axum::serve(listener, app).await.context("Server error")?;

    Ok(())
}
