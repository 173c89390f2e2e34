use std::sync::Arc;

use anyhow::{Context, Result};
use tracing_subscriber::EnvFilter;
use wardgate_face::OnnxFaceEncoder;
use wardgate_store::{MediaStore, RecordStore};
use wardgated::config::Config;
use wardgated::engine::{spawn_engine, EngineHandle};
use wardgated::mailer::Mailer;
use wardgated::AppState;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    tracing::info!("wardgated starting");

    let config = Config::from_env();
    tracing::info!(
        bind = %config.bind_addr,
        db = %config.db_path.display(),
        media = %config.media_dir.display(),
        models = %config.model_dir.display(),
        threshold = config.similarity_threshold,
        "configuration loaded"
    );

    let store = RecordStore::open(&config.db_path)
        .await
        .with_context(|| format!("opening database {}", config.db_path.display()))?;
    let media = MediaStore::open(&config.media_dir)
        .with_context(|| format!("preparing media directory {}", config.media_dir.display()))?;

    let engine = start_engine(&config, media.clone());
    let mailer = Mailer::from_config(&config.smtp).context("configuring smtp")?;
    if mailer.is_none() {
        tracing::warn!("smtp host or sender not set, patient codes will not be emailed");
    }

    let state = Arc::new(AppState { store, media, engine, mailer });
    let app = wardgated::router(state, config.max_upload_bytes);

    let listener = tokio::net::TcpListener::bind(&config.bind_addr)
        .await
        .with_context(|| format!("binding {}", config.bind_addr))?;
    tracing::info!(addr = %config.bind_addr, "wardgated ready");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("wardgated shutting down");
    Ok(())
}

/// Load the models and start the engine thread. Without models the daemon
/// still serves registration; exit checks report the engine as unavailable.
fn start_engine(config: &Config, media: MediaStore) -> Option<EngineHandle> {
    let encoder = match OnnxFaceEncoder::load(&config.model_dir) {
        Ok(encoder) => encoder,
        Err(e) => {
            tracing::warn!(error = %e, "face models not loaded, exit verification disabled");
            return None;
        }
    };
    match spawn_engine(Box::new(encoder), media, config.similarity_threshold) {
        Ok(handle) => Some(handle),
        Err(e) => {
            tracing::error!(error = %e, "failed to start face engine");
            None
        }
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "failed to listen for ctrl-c");
        std::future::pending::<()>().await;
    }
}
