//! Persistence layer
//!
//! `Store` is the seam the callable functions talk to. `SqliteStore` is the
//! only production backend: one local database file, one connection per
//! operation, schema created on startup.

use crate::models::{
    AppCategory, AppRecord, AppUsage, ApprovalStatus, CalendarEvent, CalendarEventChanges,
    CategoryUsage, MetricSummary, PendingTask, TaskId, Transaction, VehicleProfile,
};
use crate::Result;
use chrono::NaiveDateTime;

pub mod sqlite;
pub use sqlite::SqliteStore;

/// Timestamp layout used in every table. Comparable with SQLite's
/// `datetime('now', ...)`.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Metric name under which app sessions are recorded.
pub const APP_SESSION_METRIC: &str = "app_session";

/// Apps installed for every new profile.
pub const DEFAULT_APP_CATALOG: &[(&str, AppCategory)] = &[
    ("calendar", AppCategory::Productivity),
    ("messages", AppCategory::Social),
    ("maps", AppCategory::Utility),
    ("settings", AppCategory::Utility),
    ("weather", AppCategory::Utility),
    ("spotify", AppCategory::Entertainment),
    ("podcasts", AppCategory::Entertainment),
    ("wallet", AppCategory::Finance),
    ("fitness", AppCategory::Health),
];

#[derive(Debug, Clone)]
pub struct NewCalendarEvent {
    pub title: String,
    pub date: String,
    pub time: String,
    pub duration_minutes: i64,
    pub reminder: bool,
}

#[derive(Debug, Clone)]
pub struct NewTransaction {
    pub transaction_type: String,
    pub amount: f64,
    pub recipient: Option<String>,
    pub notes: String,
    pub approval_needed: bool,
}

/// Trait for assistant persistence
#[async_trait::async_trait]
pub trait Store: Send + Sync {
    /// Create missing tables
    async fn init(&self) -> Result<()>;

    // ---- vehicles ----

    /// `None` when the VIN is already registered
    async fn create_vehicle(
        &self,
        vin: &str,
        make: &str,
        model: &str,
        year: i64,
    ) -> Result<Option<VehicleProfile>>;
    async fn vehicle_by_vin(&self, vin: &str) -> Result<Option<VehicleProfile>>;

    // ---- apps ----

    async fn seed_apps(
        &self,
        profile_id: i64,
        catalog: &[(&str, AppCategory)],
    ) -> Result<Vec<AppRecord>>;
    async fn apps_for_profile(&self, profile_id: i64) -> Result<Vec<AppRecord>>;
    /// Close every running app, open this one and start a usage session
    async fn open_app(&self, profile_id: i64, app_id: i64) -> Result<bool>;
    /// Stop the app and finalize its open usage session
    async fn close_app(&self, profile_id: i64, app_id: i64) -> Result<bool>;

    // ---- calendar ----

    /// Inserts the event as pending together with its feedback row
    async fn add_calendar_event(
        &self,
        profile_id: i64,
        event: NewCalendarEvent,
    ) -> Result<(CalendarEvent, TaskId)>;
    async fn calendar_events(
        &self,
        profile_id: i64,
        status: Option<ApprovalStatus>,
    ) -> Result<Vec<CalendarEvent>>;
    async fn update_calendar_event(
        &self,
        event_id: i64,
        changes: &CalendarEventChanges,
    ) -> Result<bool>;
    async fn set_calendar_event_status(&self, event_id: i64, status: ApprovalStatus)
        -> Result<bool>;
    /// Removes the feedback row and the event
    async fn delete_calendar_event(&self, event_id: i64) -> Result<bool>;

    // ---- transactions ----

    /// Feedback row (and task id) only when approval is needed
    async fn create_transaction(
        &self,
        profile_id: i64,
        transaction: NewTransaction,
    ) -> Result<(Transaction, Option<TaskId>)>;
    async fn transactions(
        &self,
        profile_id: i64,
        status: Option<ApprovalStatus>,
    ) -> Result<Vec<Transaction>>;
    async fn set_transaction_status(
        &self,
        transaction_id: i64,
        status: ApprovalStatus,
    ) -> Result<bool>;

    // ---- metrics ----

    async fn record_metric(
        &self,
        profile_id: i64,
        metric_name: &str,
        value: f64,
        recorded_at: NaiveDateTime,
    ) -> Result<i64>;
    async fn metric_summary(
        &self,
        profile_id: i64,
        metric_name: &str,
    ) -> Result<Option<MetricSummary>>;
    async fn usage_by_app(&self, profile_id: i64, days: u32) -> Result<Vec<AppUsage>>;
    async fn usage_by_category(&self, profile_id: i64, days: u32) -> Result<Vec<CategoryUsage>>;

    // ---- approvals ----

    async fn pending_tasks(&self, profile_id: i64) -> Result<Vec<PendingTask>>;
    /// Resolve a pending feedback row and move the referenced item to the
    /// same status. `false` when the task is unknown or already resolved.
    async fn submit_task_feedback(
        &self,
        task_id: TaskId,
        status: ApprovalStatus,
        feedback: Option<&str>,
    ) -> Result<bool>;
}
