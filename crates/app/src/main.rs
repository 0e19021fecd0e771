mod api;
mod openapi;
mod problem;
mod router;
mod telemetry;

use std::net::SocketAddr;

use garage_storage::{seed_demo_catalog, Database};
use garage_util::{load_env_file, AppConfig};
use tracing::info;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    load_env_file();
    let config = AppConfig::from_env()?;

    telemetry::init_tracing(&config)?;
    let metrics = telemetry::init_metrics()?;

    let database = Database::connect(&config.database_url, config.database_max_connections).await?;
    database.run_migrations().await?;
    info!(stage = "storage", max_connections = config.database_max_connections, "database ready");

    if config.seed_demo_data && config.environment.is_development() {
        let outcome = seed_demo_catalog(&database).await?;
        info!(stage = "storage", ?outcome, "demo seed finished");
    }

    let state = router::AppState::new(metrics, database)
        .with_allowed_origins(config.cors_allowed_origins.clone())
        .with_openapi(config.environment.is_development());

    let addr: SocketAddr = config.bind_addr;
    info!(stage = "app", %addr, env = %config.environment.as_str(), "starting HTTP server");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, router::app_router(state))
        .await
        .map_err(|err| err.into())
}
