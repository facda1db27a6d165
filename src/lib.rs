//! Voice Task Assistant
//!
//! Core of an in-car voice assistant:
//! - Keyword intent classifier over an ordered rule table
//! - Callable functions for vehicle profiles, apps, calendar, metrics and transactions
//! - Approval flow for pending tasks and a single pending action per session
//! - Local SQLite store
//! - Session orchestration over an abstract realtime conversation
//!
//! TURN FLOW:
//! UTTERANCE → ROUTE (profile? pending action? task?) → CONVERSATION ITEMS → RESPONSE → FUNCTION CALLS

pub mod api;
pub mod assistant;
pub mod classifier;
pub mod config;
pub mod error;
pub mod models;
pub mod prompts;
pub mod session;
pub mod state;
pub mod store;
pub mod tools;
pub mod transcript;

pub use error::{AssistantError, Result};

// Re-export common types
pub use assistant::Assistant;
pub use classifier::{Confidence, IntentAnalysis, IntentClassifier};
pub use config::AssistantConfig;
pub use models::*;
pub use session::{Route, SessionOrchestrator, UtteranceContent};
pub use state::{PendingAction, PendingActionPolicy, SessionContext};
pub use store::{SqliteStore, Store};
