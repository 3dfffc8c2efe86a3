use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use listing_price_api::app::{self, AppState};
use listing_price_api::artifacts::{ArtifactCache, ArtifactStatus};
use listing_price_api::config::Config;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(EnvFilter::from_default_env().add_directive("listing_price_api=info".parse()?))
        .init();

    let config = Config::parse();

    // artifacts are read once; a failure leaves the server up with prediction disabled
    let cache = Arc::new(ArtifactCache::new());
    let artifacts = ArtifactStatus::load(&config, cache).await;

    let state = AppState { artifacts };

    let app = app::create_router(state);
    let listener = tokio::net::TcpListener::bind(&config.bind)
        .await
        .with_context(|| format!("failed to bind {}", config.bind))?;

    info!("listening on {}", config.bind);
    axum::serve(listener, app).await?;

    Ok(())
}
