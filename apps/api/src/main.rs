mod config;
mod errors;
mod render;
mod routes;
mod state;

use anyhow::Result;
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::Config;
use crate::render::{ChromeLauncher, DocumentFamily, RenderPipeline};
use crate::routes::build_router;
use crate::state::AppState;

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration first (fails on malformed env vars)
    let config = Config::from_env()?;

    // Initialize structured logging
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new(format!(
                "{}={}",
                env!("CARGO_CRATE_NAME"),
                &config.rust_log
            ))
        }))
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting Quill API v{}", env!("CARGO_PKG_VERSION"));

    // One browser process per render; the launcher only holds launch settings.
    let launcher = Arc::new(ChromeLauncher::new(config.chrome_executable.clone()));
    let pipeline = RenderPipeline::new(
        launcher,
        config.timings.clone(),
        config.max_concurrent_renders,
    );
    info!(
        "Render pipeline ready: {} concurrent renders, {:?} page timeout",
        config.max_concurrent_renders, config.timings.page_timeout
    );

    let state = AppState {
        pipeline: Arc::new(pipeline),
        resumes: Arc::new(
            DocumentFamily::resumes().with_trailing_buffers(config.resume_trailing_buffers.clone()),
        ),
        cover_letters: Arc::new(
            DocumentFamily::cover_letters()
                .with_trailing_buffers(config.cover_letter_trailing_buffers.clone()),
        ),
    };

    // Build router
    let app = build_router(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive());

    let addr: SocketAddr = format!("0.0.0.0:{}", config.port).parse()?;
    info!("Listening on {addr}");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
