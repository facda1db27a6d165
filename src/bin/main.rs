//! Console driver
//!
//! Plain lines are treated as committed utterances. `!name {json}` calls a
//! function directly, the way the reasoning engine would.

use serde_json::Value;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;
use voice_task_assistant::{
    tools::create_default_registry, transcript::InMemorySession, Assistant, AssistantConfig,
    SessionOrchestrator, SqliteStore,
};

async fn print_new_items(orchestrator: &SessionOrchestrator<InMemorySession>, offset: usize) {
    for item in orchestrator.realtime().items_since(offset).await {
        println!("[{}] {}", item.role.as_str(), item.content.trim());
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenv::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .init();

    let config = AssistantConfig::from_env();
    let store = SqliteStore::open(&config.db_path).await?;
    info!(db = %config.db_path.display(), "Voice Task Assistant console starting");

    let assistant = Arc::new(Assistant::new(
        create_default_registry(),
        Arc::new(store),
        config,
    ));
    let orchestrator = SessionOrchestrator::new(assistant.clone(), InMemorySession::new());

    orchestrator.start().await?;
    print_new_items(&orchestrator, 0).await;

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        if let Some(call) = line.strip_prefix('!') {
            let (name, raw_args) = call.split_once(' ').unwrap_or((call, ""));
            let args = if raw_args.trim().is_empty() {
                Value::Object(Default::default())
            } else {
                match serde_json::from_str::<Value>(raw_args) {
                    Ok(args) => args,
                    Err(e) => {
                        warn!(error = %e, "Arguments are not valid JSON");
                        println!("usage: !function_name {{\"arg\": \"value\"}}");
                        continue;
                    }
                }
            };
            println!("[function] {}", assistant.invoke(name, args).await);
            continue;
        }

        let offset = orchestrator.realtime().len().await;
        orchestrator.on_user_message(line).await?;
        print_new_items(&orchestrator, offset).await;
    }

    Ok(())
}
