//! Conversation transcript
//!
//! The realtime speech engine is reached through `RealtimeSession`: the
//! orchestrator only ever adds conversation items and asks for a response.
//! `InMemorySession` records both, for the console, the HTTP bridge and tests.

use crate::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::RwLock;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ItemRole {
    System,
    User,
    Assistant,
}

impl ItemRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            ItemRole::System => "system",
            ItemRole::User => "user",
            ItemRole::Assistant => "assistant",
        }
    }
}

/// A single conversation item
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TranscriptItem {
    pub item_id: Uuid,
    pub timestamp: DateTime<Utc>,
    pub role: ItemRole,
    pub content: String,
}

impl TranscriptItem {
    pub fn new(role: ItemRole, content: impl Into<String>) -> Self {
        Self {
            item_id: Uuid::new_v4(),
            timestamp: Utc::now(),
            role,
            content: content.into(),
        }
    }
}

/// Ordered conversation items plus the number of responses requested
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Transcript {
    items: Vec<TranscriptItem>,
    responses_requested: usize,
}

impl Transcript {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, item: TranscriptItem) {
        self.items.push(item);
    }

    pub fn request_response(&mut self) {
        self.responses_requested += 1;
    }

    pub fn items(&self) -> &[TranscriptItem] {
        &self.items
    }

    /// Items added after the first `offset`
    pub fn items_since(&self, offset: usize) -> &[TranscriptItem] {
        self.items.get(offset..).unwrap_or(&[])
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn responses_requested(&self) -> usize {
        self.responses_requested
    }
}

/// Conversation side of the realtime speech engine
#[async_trait::async_trait]
pub trait RealtimeSession: Send + Sync {
    async fn create_item(&self, role: ItemRole, content: String) -> Result<()>;
    async fn create_response(&self) -> Result<()>;
}

/// Realtime session that only records what it is asked to do
#[derive(Clone, Default)]
pub struct InMemorySession {
    transcript: Arc<RwLock<Transcript>>,
}

impl InMemorySession {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn snapshot(&self) -> Transcript {
        self.transcript.read().await.clone()
    }

    pub async fn len(&self) -> usize {
        self.transcript.read().await.len()
    }

    pub async fn items_since(&self, offset: usize) -> Vec<TranscriptItem> {
        self.transcript.read().await.items_since(offset).to_vec()
    }
}

#[async_trait::async_trait]
impl RealtimeSession for InMemorySession {
    async fn create_item(&self, role: ItemRole, content: String) -> Result<()> {
        self.transcript
            .write()
            .await
            .push(TranscriptItem::new(role, content));
        Ok(())
    }

    async fn create_response(&self) -> Result<()> {
        self.transcript.write().await.request_response();
        Ok(())
    }
}
