//! Intent Classifier
//!
//! Flat keyword rule table that decides whether an utterance is a task
//! request and which feature it targets. Rules are evaluated in order and the
//! first match wins; there is no scoring across categories.

use crate::models::AppCategory;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Confidence {
    High,
    Medium,
    Low,
}

impl Confidence {
    pub fn as_str(&self) -> &'static str {
        match self {
            Confidence::High => "high",
            Confidence::Medium => "medium",
            Confidence::Low => "low",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskCategory {
    Calendar,
    Messages,
    Maps,
    Settings,
    Metrics,
    Transactions,
}

impl TaskCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskCategory::Calendar => "calendar",
            TaskCategory::Messages => "messages",
            TaskCategory::Maps => "maps",
            TaskCategory::Settings => "settings",
            TaskCategory::Metrics => "metrics",
            TaskCategory::Transactions => "transactions",
        }
    }
}

pub const UNKNOWN_TASK: &str = "unknown";

/// Ordered rule table. Order is the tie-break.
pub const CATEGORY_RULES: &[(TaskCategory, &[&str])] = &[
    (
        TaskCategory::Calendar,
        &["calendar", "schedule", "appointment", "meeting", "event"],
    ),
    (TaskCategory::Messages, &["message", "text", "sms", "chat"]),
    (TaskCategory::Maps, &["map", "directions", "navigate", "location"]),
    (TaskCategory::Settings, &["settings", "configure", "preferences"]),
    (
        TaskCategory::Metrics,
        &["metrics", "statistics", "analysis", "data", "report"],
    ),
    (
        TaskCategory::Transactions,
        &["transaction", "payment", "purchase", "buy", "send money"],
    ),
];

pub const ACTION_KEYWORDS: &[&str] = &[
    "open", "switch", "go to", "launch", "start", "run", "execute", "show", "display",
];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IntentAnalysis {
    pub is_task: bool,
    pub task_type: String,
    pub confidence: Confidence,
    pub normalized_message: String,
}

/// Keyword classifier, optionally extended with the session's installed apps.
///
/// App rules are consulted only after every fixed category rule missed, in
/// catalog order. A matching app reports its category as the task type.
#[derive(Debug, Clone, Default)]
pub struct IntentClassifier {
    app_rules: Vec<(String, AppCategory)>,
}

impl IntentClassifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_apps<I, S>(apps: I) -> Self
    where
        I: IntoIterator<Item = (S, AppCategory)>,
        S: Into<String>,
    {
        Self {
            app_rules: apps
                .into_iter()
                .map(|(name, category)| (name.into().to_lowercase(), category))
                .filter(|(name, _)| !name.is_empty())
                .collect(),
        }
    }

    pub fn classify(&self, text: &str) -> IntentAnalysis {
        let message = text.to_lowercase();

        let action_match = ACTION_KEYWORDS.iter().any(|kw| message.contains(kw));

        let task_type = CATEGORY_RULES
            .iter()
            .find(|(_, keywords)| keywords.iter().any(|kw| message.contains(kw)))
            .map(|(category, _)| category.as_str())
            .or_else(|| {
                self.app_rules
                    .iter()
                    .find(|(name, _)| message.contains(name.as_str()))
                    .map(|(_, category)| category.as_str())
            });

        let is_task = task_type.is_some();
        let confidence = match (action_match, is_task) {
            (true, true) => Confidence::High,
            (false, true) => Confidence::Medium,
            _ => Confidence::Low,
        };

        IntentAnalysis {
            is_task,
            task_type: task_type.unwrap_or(UNKNOWN_TASK).to_string(),
            confidence,
            normalized_message: message,
        }
    }
}
