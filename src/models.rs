//! Core data models for the assistant

use serde::{Deserialize, Serialize};
use std::fmt;

//
// ================= Enums =================
//

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum AppCategory {
    Social,
    Productivity,
    Entertainment,
    Finance,
    Health,
    Utility,
}

impl AppCategory {
    pub const ALL: [AppCategory; 6] = [
        AppCategory::Social,
        AppCategory::Productivity,
        AppCategory::Entertainment,
        AppCategory::Finance,
        AppCategory::Health,
        AppCategory::Utility,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            AppCategory::Social => "social",
            AppCategory::Productivity => "productivity",
            AppCategory::Entertainment => "entertainment",
            AppCategory::Finance => "finance",
            AppCategory::Health => "health",
            AppCategory::Utility => "utility",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        let value = value.trim().to_lowercase();
        Self::ALL.into_iter().find(|c| c.as_str() == value)
    }
}

/// Lifecycle of anything that needs explicit approval: calendar events,
/// transactions and the feedback rows that track them.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ApprovalStatus {
    Pending,
    Approved,
    Rejected,
    Completed,
}

impl ApprovalStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ApprovalStatus::Pending => "pending",
            ApprovalStatus::Approved => "approved",
            ApprovalStatus::Rejected => "rejected",
            ApprovalStatus::Completed => "completed",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_lowercase().as_str() {
            "pending" => Some(ApprovalStatus::Pending),
            "approved" => Some(ApprovalStatus::Approved),
            "rejected" => Some(ApprovalStatus::Rejected),
            "completed" => Some(ApprovalStatus::Completed),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum TaskType {
    Calendar,
    Transaction,
}

impl TaskType {
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskType::Calendar => "calendar",
            TaskType::Transaction => "transaction",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "calendar" => Some(TaskType::Calendar),
            "transaction" => Some(TaskType::Transaction),
            _ => None,
        }
    }
}

//
// ================= Profile & Apps =================
//

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VehicleProfile {
    pub profile_id: i64,
    pub vin: String,
    pub make: String,
    pub model: String,
    pub year: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppRecord {
    pub app_id: i64,
    pub profile_id: i64,
    pub name: String,
    pub category: AppCategory,
    pub is_running: bool,
    pub last_used: Option<String>,
}

//
// ================= Calendar =================
//

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CalendarEvent {
    pub event_id: i64,
    pub profile_id: i64,
    pub title: String,
    /// YYYY-MM-DD
    pub date: String,
    /// HH:MM
    pub time: String,
    pub duration_minutes: i64,
    pub status: ApprovalStatus,
    pub reminder: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CalendarEventChanges {
    pub date: Option<String>,
    pub time: Option<String>,
    pub duration_minutes: Option<i64>,
}

impl CalendarEventChanges {
    pub fn is_empty(&self) -> bool {
        self.date.is_none() && self.time.is_none() && self.duration_minutes.is_none()
    }

    /// Spoken form, e.g. "date to 2025-03-10, time to 14:00"
    pub fn describe(&self) -> String {
        let mut updates = Vec::new();
        if let Some(date) = &self.date {
            updates.push(format!("date to {}", date));
        }
        if let Some(time) = &self.time {
            updates.push(format!("time to {}", time));
        }
        if let Some(duration) = self.duration_minutes {
            updates.push(format!("duration to {} minutes", duration));
        }
        updates.join(", ")
    }
}

//
// ================= Transactions =================
//

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Transaction {
    pub transaction_id: i64,
    pub profile_id: i64,
    pub transaction_type: String,
    pub amount: f64,
    pub recipient: Option<String>,
    pub notes: String,
    pub timestamp: String,
    pub status: ApprovalStatus,
    pub approval_needed: bool,
}

impl Transaction {
    /// "payment of $12.50 to Alice"
    pub fn describe(&self) -> String {
        match &self.recipient {
            Some(recipient) => format!(
                "{} of ${:.2} to {}",
                self.transaction_type, self.amount, recipient
            ),
            None => format!("{} of ${:.2}", self.transaction_type, self.amount),
        }
    }
}

//
// ================= Metrics =================
//

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricSummary {
    pub metric_name: String,
    pub count: i64,
    pub average: f64,
    pub min: f64,
    pub max: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppUsage {
    pub app_name: String,
    pub category: AppCategory,
    pub sessions: i64,
    pub total_seconds: f64,
    pub average_seconds: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CategoryUsage {
    pub category: AppCategory,
    pub total_seconds: f64,
    pub unique_apps: i64,
}

//
// ================= Approvals =================
//

/// Stable identifier of a pending task. Backed by the feedback row id, so it
/// survives removal of other tasks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct TaskId(pub i64);

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum PendingTaskDetail {
    Calendar(CalendarEvent),
    Transaction(Transaction),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PendingTask {
    pub task_id: TaskId,
    pub detail: PendingTaskDetail,
}

impl PendingTask {
    pub fn task_type(&self) -> TaskType {
        match self.detail {
            PendingTaskDetail::Calendar(_) => TaskType::Calendar,
            PendingTaskDetail::Transaction(_) => TaskType::Transaction,
        }
    }

    pub fn describe(&self) -> String {
        match &self.detail {
            PendingTaskDetail::Calendar(event) => format!(
                "Calendar event: {} on {} at {} for {} minutes",
                event.title, event.date, event.time, event.duration_minutes
            ),
            PendingTaskDetail::Transaction(transaction) => {
                format!("Transaction: {}", transaction.describe())
            }
        }
    }
}

//
// ================= Tool I/O =================
//

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolInput {
    pub tool_name: String,
    pub parameters: serde_json::Value,
}

/// Natural-language outcome of a callable function.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolOutput {
    pub success: bool,
    pub message: String,
}

impl ToolOutput {
    pub fn success(message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: message.into(),
        }
    }

    pub fn failure(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: message.into(),
        }
    }
}

/// Registration record handed to the reasoning engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FunctionSpec {
    pub name: String,
    pub description: String,
    pub parameters: serde_json::Value,
}

impl fmt::Display for AppCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl fmt::Display for ApprovalStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_category_parse_is_case_insensitive() {
        assert_eq!(AppCategory::parse("Finance"), Some(AppCategory::Finance));
        assert_eq!(AppCategory::parse(" utility "), Some(AppCategory::Utility));
        assert_eq!(AppCategory::parse("games"), None);
    }

    #[test]
    fn test_transaction_describe() {
        let mut transaction = Transaction {
            transaction_id: 1,
            profile_id: 1,
            transaction_type: "payment".to_string(),
            amount: 12.5,
            recipient: Some("Alice".to_string()),
            notes: String::new(),
            timestamp: "2025-03-10 10:00:00".to_string(),
            status: ApprovalStatus::Pending,
            approval_needed: true,
        };
        assert_eq!(transaction.describe(), "payment of $12.50 to Alice");

        transaction.recipient = None;
        assert_eq!(transaction.describe(), "payment of $12.50");
    }

    #[test]
    fn test_changes_describe() {
        let changes = CalendarEventChanges {
            date: Some("2025-03-10".to_string()),
            time: None,
            duration_minutes: Some(30),
        };
        assert_eq!(changes.describe(), "date to 2025-03-10, duration to 30 minutes");
        assert!(CalendarEventChanges::default().is_empty());
    }
}
