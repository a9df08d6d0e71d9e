//! Service entry point: wire config, generator, and export store into the
//! HTTP router.

use anyhow::Context;
use deckgen::config::Config;
use deckgen::export::ArtifactStore;
use deckgen::generate::Generator;
use deckgen::http::{create_router, AppState};
use std::sync::Arc;
use tracing::{info, warn};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file if present
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let config = Config::from_env();

    let store = ArtifactStore::new(&config.export_dir)
        .with_context(|| format!("failed to open export directory {}", config.export_dir))?;

    let generator = match &config.api_key {
        Some(key) => {
            let generator = Generator::builder(&config.base_url)
                .anthropic_with_key(key.clone())
                .model(&config.model)
                .concurrency(config.concurrency)
                .build();
            info!(model = %config.model, concurrency = config.concurrency, "generator ready");
            Some(Arc::new(generator))
        }
        None => {
            warn!("ANTHROPIC_API_KEY is not set; /generate will answer 503");
            None
        }
    };

    let state = AppState {
        generator,
        store: Arc::new(store),
    };

    let listener = tokio::net::TcpListener::bind(&config.addr)
        .await
        .with_context(|| format!("failed to bind {}", config.addr))?;
    info!(addr = %config.addr, "listening");

    axum::serve(listener, create_router(state))
        .await
        .context("server exited")?;
    Ok(())
}
