use std::net::SocketAddr;
use std::sync::Arc;

use trekora_api::{app, state::AppState};
use trekora_core::EngineStore;
use trekora_store::{seed, Config, MemoryStore, PostgresStore};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "trekora_api=debug,trekora_core=debug,trekora_store=debug,tower_http=debug,axum::rejection=trace".into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::load()?;
    tracing::info!("Starting Trekora API on port {}", config.server.port);

    let store: Arc<dyn EngineStore> = if config.database.url.is_empty() {
        tracing::info!("No database URL configured; using the in-memory store");
        Arc::new(MemoryStore::new())
    } else {
        let store =
            PostgresStore::connect(&config.database.url, config.database.max_connections).await?;
        store.migrate().await?;
        Arc::new(store)
    };

    if config.business_rules.seed_demo_data {
        seed::seed_demo_data(store.as_ref()).await?;
    }

    let app_state = AppState::new(store, config.business_rules.clone());
    let app = app(app_state);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.server.port));
    tracing::info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}
