use anyhow::Result;
use dotenvy::dotenv;
use tracing_subscriber::EnvFilter;

use cyclesense_backend::{ai::GeminiClient, app, config::Config, db, shutdown::shutdown_signal, AppState};

#[tokio::main]
async fn main() -> Result<()> {
    dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = Config::from_env()?;
    let pool = db::connect(&config).await?;
    tracing::info!("🗄️ Database ready");

    if config.gemini_api_key.is_none() {
        tracing::warn!("⚠️ GEMINI_API_KEY not set, AI endpoints will fail");
    }
    let ai = GeminiClient::new(
        config.gemini_api_key.clone(),
        config.gemini_api_base.clone(),
        config.gemini_model.clone(),
    )
    .with_retry_policy(config.ai_retry);

    let state = AppState::new(pool.clone(), ai);
    let app = app(state);

    tracing::info!("🧠 Server running at {}", config.bind_addr);

    axum::serve(
        tokio::net::TcpListener::bind(config.bind_addr).await?,
        app.into_make_service(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    pool.close().await;
    tracing::info!("👋 Server stopped");

    Ok(())
}
