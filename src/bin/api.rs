use std::sync::Arc;
use tracing::info;
use tracing_subscriber::EnvFilter;
use voice_task_assistant::{api::start_server, AssistantConfig, SqliteStore, Store};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load environment variables
    dotenv::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = AssistantConfig::from_env();

    info!("Voice Task Assistant - API Server");
    info!(port = config.port, db = %config.db_path.display(), "Configuration loaded");

    let store: Arc<dyn Store> = Arc::new(SqliteStore::open(&config.db_path).await?);

    info!("Store initialized");
    info!("Starting API server...");

    start_server(store, config).await?;

    Ok(())
}
