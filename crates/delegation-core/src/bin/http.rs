#[cfg(feature = "http_api")]
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    use std::net::SocketAddr;
    use std::sync::Arc;

    use sped_delegation::http_api::{self, SharedStore};
    use sped_delegation::logging::init_tracing;
    use sped_delegation::{EngineConfig, InMemoryStore, SchedulingEngine};

    init_tracing();

    let addr: SocketAddr = std::env::var("SPED_HTTP_ADDR")
        .unwrap_or_else(|_| "0.0.0.0:3000".to_string())
        .parse()?;

    let config = match std::env::var("SPED_CONFIG") {
        Ok(path) => EngineConfig::load(path)?,
        Err(_) => EngineConfig::default(),
    };
    let engine = SchedulingEngine::from_config(&config);
    for err in engine.config_errors() {
        tracing::warn!(error = %err, "configuration entry skipped");
    }

    let store: SharedStore = match std::env::var("SPED_DB") {
        #[cfg(feature = "sqlite")]
        Ok(path) => Arc::new(sped_delegation::SqliteTaskStore::new(path)?),
        #[cfg(not(feature = "sqlite"))]
        Ok(path) => Arc::new(sped_delegation::persistence::load_snapshot_json(path)?),
        Err(_) => Arc::new(InMemoryStore::new()),
    };

    tracing::info!(%addr, "SPED delegation HTTP API listening");
    http_api::serve(addr, engine, store).await?;
    Ok(())
}

#[cfg(not(feature = "http_api"))]
fn main() {
    eprintln!("Rebuild with the `http_api` feature to enable the HTTP server.");
}
