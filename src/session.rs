//! Session orchestration
//!
//! Routes each committed utterance: profile lookup first, then the pending
//! action confirmation, then intent classification. Every route ends with
//! exactly one response request.

use crate::assistant::Assistant;
use crate::prompts;
use crate::transcript::{ItemRole, RealtimeSession};
use crate::Result;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;
use tracing::{debug, info};

/// Words that approve a pending action
pub const CONFIRM_WORDS: &[&str] = &["confirm", "yes", "approve"];

const IMAGE_PLACEHOLDER: &str = "[image]";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "lowercase")]
pub enum ContentPart {
    Text(String),
    /// Image payloads are not forwarded, only marked
    Image(Option<String>),
}

/// Content of a committed utterance
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum UtteranceContent {
    Text(String),
    Parts(Vec<ContentPart>),
}

impl UtteranceContent {
    pub fn flatten(&self) -> String {
        match self {
            UtteranceContent::Text(text) => text.clone(),
            UtteranceContent::Parts(parts) => parts
                .iter()
                .map(|part| match part {
                    ContentPart::Text(text) => text.as_str(),
                    ContentPart::Image(_) => IMAGE_PLACEHOLDER,
                })
                .collect::<Vec<_>>()
                .join("\n"),
        }
    }
}

/// How an utterance was handled
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "route", content = "task_type", rename_all = "snake_case")]
pub enum Route {
    ProfileLookup,
    ActionApproved,
    ActionDeclined,
    Task(String),
    Query,
}

fn is_confirmation(text: &str) -> bool {
    text.to_lowercase()
        .split(|c: char| !c.is_alphanumeric())
        .any(|word| CONFIRM_WORDS.contains(&word))
}

pub struct SessionOrchestrator<R: RealtimeSession> {
    assistant: Arc<Assistant>,
    realtime: R,
}

impl<R: RealtimeSession> SessionOrchestrator<R> {
    pub fn new(assistant: Arc<Assistant>, realtime: R) -> Self {
        Self {
            assistant,
            realtime,
        }
    }

    pub fn assistant(&self) -> &Arc<Assistant> {
        &self.assistant
    }

    pub fn realtime(&self) -> &R {
        &self.realtime
    }

    /// Greet the driver
    pub async fn start(&self) -> Result<()> {
        self.realtime
            .create_item(ItemRole::Assistant, prompts::WELCOME_MESSAGE.to_string())
            .await?;
        self.realtime.create_response().await
    }

    pub async fn on_user_speech_committed(&self, content: UtteranceContent) -> Result<Route> {
        self.on_user_message(&content.flatten()).await
    }

    pub async fn on_user_message(&self, text: &str) -> Result<Route> {
        let route = self.route(text).await?;
        self.realtime.create_response().await?;
        info!(?route, "Utterance routed");
        Ok(route)
    }

    async fn route(&self, text: &str) -> Result<Route> {
        if !self.assistant.has_profile().await {
            self.realtime
                .create_item(ItemRole::System, prompts::lookup_vin_message(text))
                .await?;
            return Ok(Route::ProfileLookup);
        }

        if let Some(description) = self.assistant.pending_action_description().await {
            return self.resolve_pending_action(&description, text).await;
        }

        let analysis = self.assistant.classify(text).await;
        debug!(
            task_type = %analysis.task_type,
            confidence = analysis.confidence.as_str(),
            "Utterance classified"
        );

        if analysis.is_task {
            self.realtime
                .create_item(
                    ItemRole::System,
                    prompts::task_execution_prompt(&analysis.task_type, text),
                )
                .await?;
            self.realtime
                .create_item(ItemRole::User, text.to_string())
                .await?;
            return Ok(Route::Task(analysis.task_type));
        }

        self.realtime
            .create_item(ItemRole::User, text.to_string())
            .await?;
        Ok(Route::Query)
    }

    async fn resolve_pending_action(&self, description: &str, text: &str) -> Result<Route> {
        let (system_message, route) = if is_confirmation(text) {
            let outcome = self
                .assistant
                .invoke("confirm_pending_action", json!({}))
                .await;
            (
                prompts::action_approved_message(description, &outcome),
                Route::ActionApproved,
            )
        } else {
            self.assistant
                .invoke("cancel_pending_action", json!({}))
                .await;
            (
                prompts::action_declined_message(description),
                Route::ActionDeclined,
            )
        };

        self.realtime
            .create_item(ItemRole::System, system_message)
            .await?;
        self.realtime
            .create_item(ItemRole::User, text.to_string())
            .await?;
        Ok(route)
    }
}
