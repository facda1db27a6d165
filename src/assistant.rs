//! Function dispatch
//!
//! Owns the registry, the store handle and the one session context. Every
//! call is turned into the text handed back to the reasoning engine.

use crate::classifier::IntentAnalysis;
use crate::config::AssistantConfig;
use crate::error::AssistantError;
use crate::models::{FunctionSpec, ToolInput, ToolOutput};
use crate::state::SessionContext;
use crate::store::Store;
use crate::tools::{ToolContext, ToolRegistry};
use serde_json::Value;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

pub struct Assistant {
    registry: ToolRegistry,
    store: Arc<dyn Store>,
    session: Mutex<SessionContext>,
    config: AssistantConfig,
}

impl Assistant {
    pub fn new(registry: ToolRegistry, store: Arc<dyn Store>, config: AssistantConfig) -> Self {
        let session = SessionContext::new(config.pending_action_policy);
        Self {
            registry,
            store,
            session: Mutex::new(session),
            config,
        }
    }

    pub fn config(&self) -> &AssistantConfig {
        &self.config
    }

    pub fn function_specs(&self) -> Vec<FunctionSpec> {
        self.registry.specs()
    }

    /// Run a function and return only its text
    pub async fn invoke(&self, name: &str, args: Value) -> String {
        self.call(name, args).await.message
    }

    /// Run a function. Infrastructure errors are folded into a failed output.
    pub async fn call(&self, name: &str, args: Value) -> ToolOutput {
        let input = ToolInput {
            tool_name: name.to_string(),
            parameters: args,
        };

        let start = Instant::now();
        let mut session = self.session.lock().await;
        let mut ctx = ToolContext {
            session: &mut *session,
            store: self.store.as_ref(),
            config: &self.config,
        };

        let output = match self.registry.execute(&mut ctx, &input).await {
            Ok(output) => output,
            Err(AssistantError::ToolNotFound(_)) => {
                warn!(tool_name = name, "Function not registered");
                ToolOutput::failure(format!("Unknown function: {}", name))
            }
            Err(e) => {
                warn!(tool_name = name, error = %e, "Function failed");
                ToolOutput::failure(format!("Error running {}: {}", name, e))
            }
        };

        let execution_time_ms = start.elapsed().as_millis() as u64;
        info!(
            tool_name = name,
            success = output.success,
            execution_time_ms,
            "Function executed"
        );
        debug!(tool_name = name, result = %output.message, "Function result");

        output
    }

    pub async fn has_profile(&self) -> bool {
        self.session.lock().await.has_profile()
    }

    pub async fn has_pending_action(&self) -> bool {
        !self.session.lock().await.pending_action.is_empty()
    }

    pub async fn pending_action_description(&self) -> Option<String> {
        self.session
            .lock()
            .await
            .pending_action
            .peek()
            .map(|a| a.describe())
    }

    /// Classify with the active profile's installed apps
    pub async fn classify(&self, text: &str) -> IntentAnalysis {
        self.session.lock().await.classifier().classify(text)
    }

    pub async fn session_snapshot(&self) -> SessionContext {
        self.session.lock().await.clone()
    }
}
