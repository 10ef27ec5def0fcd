use std::sync::Arc;

use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use fitlife::api::router;
use fitlife::config::AppConfig;
use fitlife::session::Session;
use fitlife::state::AppState;
use fitlife::store::SqliteStore;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = AppConfig::from_env()?;

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "fitlife=debug".to_string()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let store = Arc::new(SqliteStore::connect(&config.database_url).await?);

    let session = match &config.owner {
        Some(owner) => Session::signed_in(owner.clone()),
        None => Session::signed_out(),
    };

    let state = AppState::new(store, session);
    state.start_listening();

    let app = router(state.clone());

    info!("listening on http://{}", config.bind_addr);
    let listener = tokio::net::TcpListener::bind(config.bind_addr).await?;
    axum::serve(listener, app).await?;

    state.stop_listening();
    Ok(())
}
