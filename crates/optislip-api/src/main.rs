mod auth;
mod config;
mod error;
mod rate_limit;
mod routes;

use std::sync::Arc;

use config::AppConfig;
use optislip_core::services::DatabaseService;
use optislip_core::SystemClock;
use routes::{app_router, AppState};

/// Owners visited per background dispatch tick.
const AUTO_DISPATCH_MAX_OWNERS: usize = 100;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Only load .env in development; production uses platform-native env injection.
    #[cfg(debug_assertions)]
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("optislip_api=info".parse()?)
                .add_directive("optislip_core=info".parse()?),
        )
        .init();

    let config = Arc::new(AppConfig::from_env()?);
    tracing::info!("Starting optislip-api with config: {:?}", config);

    let db = DatabaseService::open_path(&config.database_path).await?;
    let state = AppState::new(Arc::clone(&config), db, Arc::new(SystemClock));

    let _auto_dispatch = config.auto_dispatch_interval.map(|interval| {
        tracing::info!(
            interval_secs = interval.as_secs(),
            "Background sync dispatch enabled"
        );
        state
            .sync
            .spawn_auto_dispatch(interval, AUTO_DISPATCH_MAX_OWNERS)
    });

    let bind_addr = state.config.bind_addr.clone();
    let router = app_router(state);

    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    tracing::info!("optislip-api listening on {}", bind_addr);
    axum::serve(listener, router).await?;
    Ok(())
}
