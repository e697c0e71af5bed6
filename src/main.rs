use std::net::SocketAddr;
use std::sync::Arc;
use tracing::{info, warn};

use search_aggregator::{config::Config, routes, AppState};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    // Get configuration from environment
    let config = Config::from_env();

    info!("Starting search aggregator");
    for (name, value) in [
        ("GOOGLE_API_KEY", &config.google_api_key),
        ("GOOGLE_CX", &config.google_cx),
        ("COHERE_API_KEY", &config.cohere_api_key),
        ("GEMINI_API_KEY", &config.gemini_api_key),
        ("NEWS_API_KEY", &config.news_api_key),
        ("OPENWEATHER_API_KEY", &config.openweather_api_key),
    ] {
        if value.is_none() {
            warn!("{} is not set; routes that need it will answer 503", name);
        }
    }

    let bind_addr = config.bind_addr.clone();
    let state = Arc::new(AppState::new(config)?);
    let app = routes::router(state);

    // Start server
    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    info!("Search aggregator listening on http://{}", bind_addr);

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await?;

    Ok(())
}
