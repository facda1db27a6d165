//! SQLite backend
//!
//! Every operation opens its own connection and closes it before returning.
//! Operations touching more than one row set run inside a single sqlx
//! transaction on that connection.

use super::{
    NewCalendarEvent, NewTransaction, Store, APP_SESSION_METRIC, TIMESTAMP_FORMAT,
};
use crate::error::AssistantError;
use crate::models::{
    AppCategory, AppRecord, AppUsage, ApprovalStatus, CalendarEvent, CalendarEventChanges,
    CategoryUsage, MetricSummary, PendingTask, PendingTaskDetail, TaskId, TaskType, Transaction,
    VehicleProfile,
};
use crate::Result;
use chrono::{NaiveDateTime, Utc};
use sqlx::sqlite::{SqliteConnectOptions, SqliteConnection, SqliteRow};
use sqlx::{Connection, Row};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

const SCHEMA: &[&str] = &[
    r#"
    CREATE TABLE IF NOT EXISTS vehicles (
      profile_id INTEGER PRIMARY KEY AUTOINCREMENT,
      vin TEXT NOT NULL UNIQUE,
      make TEXT NOT NULL,
      model TEXT NOT NULL,
      year INTEGER NOT NULL
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS apps (
      app_id INTEGER PRIMARY KEY AUTOINCREMENT,
      profile_id INTEGER NOT NULL,
      name TEXT NOT NULL,
      category TEXT NOT NULL,
      is_running INTEGER NOT NULL DEFAULT 0,
      last_used TEXT,
      FOREIGN KEY (profile_id) REFERENCES vehicles (profile_id)
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS calendar_events (
      event_id INTEGER PRIMARY KEY AUTOINCREMENT,
      profile_id INTEGER NOT NULL,
      title TEXT NOT NULL,
      date TEXT NOT NULL,
      time TEXT NOT NULL,
      duration INTEGER NOT NULL,
      status TEXT NOT NULL DEFAULT 'pending',
      reminder INTEGER NOT NULL DEFAULT 0,
      FOREIGN KEY (profile_id) REFERENCES vehicles (profile_id)
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS transactions (
      transaction_id INTEGER PRIMARY KEY AUTOINCREMENT,
      profile_id INTEGER NOT NULL,
      type TEXT NOT NULL,
      amount REAL NOT NULL,
      recipient TEXT,
      notes TEXT NOT NULL DEFAULT '',
      timestamp TEXT NOT NULL,
      status TEXT NOT NULL DEFAULT 'pending',
      approval_needed INTEGER NOT NULL DEFAULT 1,
      FOREIGN KEY (profile_id) REFERENCES vehicles (profile_id)
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS usage_metrics (
      metric_id INTEGER PRIMARY KEY AUTOINCREMENT,
      profile_id INTEGER NOT NULL,
      metric_name TEXT NOT NULL,
      value REAL NOT NULL DEFAULT 0,
      app_id INTEGER,
      recorded_at TEXT NOT NULL,
      ended_at TEXT,
      FOREIGN KEY (profile_id) REFERENCES vehicles (profile_id),
      FOREIGN KEY (app_id) REFERENCES apps (app_id)
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS task_feedback (
      feedback_id INTEGER PRIMARY KEY AUTOINCREMENT,
      task_type TEXT NOT NULL,
      task_id INTEGER NOT NULL,
      profile_id INTEGER NOT NULL,
      status TEXT NOT NULL DEFAULT 'pending',
      feedback TEXT,
      timestamp TEXT,
      FOREIGN KEY (profile_id) REFERENCES vehicles (profile_id)
    )
    "#,
];

const CALENDAR_COLUMNS: &str =
    "c.event_id, c.profile_id, c.title, c.date, c.time, c.duration, c.status, c.reminder";

const TRANSACTION_COLUMNS: &str = "t.transaction_id, t.profile_id, t.type, t.amount, \
     t.recipient, t.notes, t.timestamp, t.status, t.approval_needed";

fn now_timestamp() -> String {
    Utc::now().naive_utc().format(TIMESTAMP_FORMAT).to_string()
}

fn lookback_modifier(days: u32) -> String {
    format!("-{} days", days)
}

fn parse_status(raw: &str) -> Result<ApprovalStatus> {
    ApprovalStatus::parse(raw)
        .ok_or_else(|| AssistantError::StoreError(format!("Unknown status in store: {}", raw)))
}

fn parse_category(raw: &str) -> Result<AppCategory> {
    AppCategory::parse(raw)
        .ok_or_else(|| AssistantError::StoreError(format!("Unknown app category in store: {}", raw)))
}

fn vehicle_from_row(row: &SqliteRow) -> Result<VehicleProfile> {
    Ok(VehicleProfile {
        profile_id: row.try_get("profile_id")?,
        vin: row.try_get("vin")?,
        make: row.try_get("make")?,
        model: row.try_get("model")?,
        year: row.try_get("year")?,
    })
}

fn app_from_row(row: &SqliteRow) -> Result<AppRecord> {
    let category: String = row.try_get("category")?;
    let is_running: i64 = row.try_get("is_running")?;
    Ok(AppRecord {
        app_id: row.try_get("app_id")?,
        profile_id: row.try_get("profile_id")?,
        name: row.try_get("name")?,
        category: parse_category(&category)?,
        is_running: is_running != 0,
        last_used: row.try_get("last_used")?,
    })
}

fn event_from_row(row: &SqliteRow) -> Result<CalendarEvent> {
    let status: String = row.try_get("status")?;
    let reminder: i64 = row.try_get("reminder")?;
    Ok(CalendarEvent {
        event_id: row.try_get("event_id")?,
        profile_id: row.try_get("profile_id")?,
        title: row.try_get("title")?,
        date: row.try_get("date")?,
        time: row.try_get("time")?,
        duration_minutes: row.try_get("duration")?,
        status: parse_status(&status)?,
        reminder: reminder != 0,
    })
}

fn transaction_from_row(row: &SqliteRow) -> Result<Transaction> {
    let status: String = row.try_get("status")?;
    let approval_needed: i64 = row.try_get("approval_needed")?;
    Ok(Transaction {
        transaction_id: row.try_get("transaction_id")?,
        profile_id: row.try_get("profile_id")?,
        transaction_type: row.try_get("type")?,
        amount: row.try_get("amount")?,
        recipient: row.try_get("recipient")?,
        notes: row.try_get("notes")?,
        timestamp: row.try_get("timestamp")?,
        status: parse_status(&status)?,
        approval_needed: approval_needed != 0,
    })
}

/// SQLite-backed store over a single database file
pub struct SqliteStore {
    path: PathBuf,
    options: SqliteConnectOptions,
}

impl SqliteStore {
    pub fn new(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref().to_path_buf();
        let options = SqliteConnectOptions::new()
            .filename(&path)
            .create_if_missing(true)
            .foreign_keys(true);

        Self { path, options }
    }

    /// Build the store and create its tables
    pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
        let store = Self::new(path);
        store.init().await?;
        Ok(store)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn connect(&self) -> Result<SqliteConnection> {
        SqliteConnection::connect_with(&self.options)
            .await
            .map_err(|e| {
                AssistantError::StoreError(format!(
                    "Failed to open database {}: {}",
                    self.path.display(),
                    e
                ))
            })
    }
}

#[async_trait::async_trait]
impl Store for SqliteStore {
    async fn init(&self) -> Result<()> {
        let mut conn = self.connect().await?;

        for statement in SCHEMA {
            sqlx::query(statement).execute(&mut conn).await?;
        }

        conn.close().await?;
        info!(path = %self.path.display(), "Assistant store ready");
        Ok(())
    }

    // =============================
    // Vehicles
    // =============================

    async fn create_vehicle(
        &self,
        vin: &str,
        make: &str,
        model: &str,
        year: i64,
    ) -> Result<Option<VehicleProfile>> {
        let mut conn = self.connect().await?;

        let result = sqlx::query(
            "INSERT OR IGNORE INTO vehicles (vin, make, model, year) VALUES (?, ?, ?, ?)",
        )
        .bind(vin)
        .bind(make)
        .bind(model)
        .bind(year)
        .execute(&mut conn)
        .await?;

        conn.close().await?;

        if result.rows_affected() == 0 {
            debug!(vin, "Vehicle already registered");
            return Ok(None);
        }

        Ok(Some(VehicleProfile {
            profile_id: result.last_insert_rowid(),
            vin: vin.to_string(),
            make: make.to_string(),
            model: model.to_string(),
            year,
        }))
    }

    async fn vehicle_by_vin(&self, vin: &str) -> Result<Option<VehicleProfile>> {
        let mut conn = self.connect().await?;

        let row = sqlx::query(
            "SELECT profile_id, vin, make, model, year FROM vehicles WHERE vin = ?",
        )
        .bind(vin)
        .fetch_optional(&mut conn)
        .await?;

        conn.close().await?;
        row.as_ref().map(vehicle_from_row).transpose()
    }

    // =============================
    // Apps
    // =============================

    async fn seed_apps(
        &self,
        profile_id: i64,
        catalog: &[(&str, AppCategory)],
    ) -> Result<Vec<AppRecord>> {
        let mut conn = self.connect().await?;
        let mut tx = conn.begin().await?;

        let mut apps = Vec::with_capacity(catalog.len());
        for (name, category) in catalog {
            let result = sqlx::query(
                "INSERT INTO apps (profile_id, name, category, is_running) VALUES (?, ?, ?, 0)",
            )
            .bind(profile_id)
            .bind(*name)
            .bind(category.as_str())
            .execute(&mut *tx)
            .await?;

            apps.push(AppRecord {
                app_id: result.last_insert_rowid(),
                profile_id,
                name: name.to_string(),
                category: *category,
                is_running: false,
                last_used: None,
            });
        }

        tx.commit().await?;
        conn.close().await?;
        Ok(apps)
    }

    async fn apps_for_profile(&self, profile_id: i64) -> Result<Vec<AppRecord>> {
        let mut conn = self.connect().await?;

        let rows = sqlx::query(
            "SELECT app_id, profile_id, name, category, is_running, last_used
             FROM apps WHERE profile_id = ? ORDER BY app_id",
        )
        .bind(profile_id)
        .fetch_all(&mut conn)
        .await?;

        conn.close().await?;
        rows.iter().map(app_from_row).collect()
    }

    async fn open_app(&self, profile_id: i64, app_id: i64) -> Result<bool> {
        let now = now_timestamp();
        let mut conn = self.connect().await?;
        let mut tx = conn.begin().await?;

        // Finish whatever session was running before
        sqlx::query(
            "UPDATE usage_metrics
             SET ended_at = ?, value = ROUND((JULIANDAY(?) - JULIANDAY(recorded_at)) * 86400)
             WHERE profile_id = ? AND metric_name = ? AND ended_at IS NULL",
        )
        .bind(&now)
        .bind(&now)
        .bind(profile_id)
        .bind(APP_SESSION_METRIC)
        .execute(&mut *tx)
        .await?;

        sqlx::query("UPDATE apps SET is_running = 0 WHERE profile_id = ?")
            .bind(profile_id)
            .execute(&mut *tx)
            .await?;

        let opened = sqlx::query(
            "UPDATE apps SET is_running = 1, last_used = ? WHERE app_id = ? AND profile_id = ?",
        )
        .bind(&now)
        .bind(app_id)
        .bind(profile_id)
        .execute(&mut *tx)
        .await?;

        if opened.rows_affected() == 0 {
            tx.rollback().await?;
            conn.close().await?;
            return Ok(false);
        }

        sqlx::query(
            "INSERT INTO usage_metrics (profile_id, metric_name, value, app_id, recorded_at)
             VALUES (?, ?, 0, ?, ?)",
        )
        .bind(profile_id)
        .bind(APP_SESSION_METRIC)
        .bind(app_id)
        .bind(&now)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        conn.close().await?;
        Ok(true)
    }

    async fn close_app(&self, profile_id: i64, app_id: i64) -> Result<bool> {
        let now = now_timestamp();
        let mut conn = self.connect().await?;
        let mut tx = conn.begin().await?;

        let closed = sqlx::query(
            "UPDATE apps SET is_running = 0 WHERE app_id = ? AND profile_id = ? AND is_running = 1",
        )
        .bind(app_id)
        .bind(profile_id)
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            "UPDATE usage_metrics
             SET ended_at = ?, value = ROUND((JULIANDAY(?) - JULIANDAY(recorded_at)) * 86400)
             WHERE app_id = ? AND profile_id = ? AND metric_name = ? AND ended_at IS NULL",
        )
        .bind(&now)
        .bind(&now)
        .bind(app_id)
        .bind(profile_id)
        .bind(APP_SESSION_METRIC)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        conn.close().await?;
        Ok(closed.rows_affected() > 0)
    }

    // =============================
    // Calendar
    // =============================

    async fn add_calendar_event(
        &self,
        profile_id: i64,
        event: NewCalendarEvent,
    ) -> Result<(CalendarEvent, TaskId)> {
        let now = now_timestamp();
        let mut conn = self.connect().await?;
        let mut tx = conn.begin().await?;

        let inserted = sqlx::query(
            "INSERT INTO calendar_events (profile_id, title, date, time, duration, status, reminder)
             VALUES (?, ?, ?, ?, ?, 'pending', ?)",
        )
        .bind(profile_id)
        .bind(&event.title)
        .bind(&event.date)
        .bind(&event.time)
        .bind(event.duration_minutes)
        .bind(event.reminder)
        .execute(&mut *tx)
        .await?;
        let event_id = inserted.last_insert_rowid();

        let feedback = sqlx::query(
            "INSERT INTO task_feedback (task_type, task_id, profile_id, status, timestamp)
             VALUES (?, ?, ?, 'pending', ?)",
        )
        .bind(TaskType::Calendar.as_str())
        .bind(event_id)
        .bind(profile_id)
        .bind(&now)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        conn.close().await?;

        Ok((
            CalendarEvent {
                event_id,
                profile_id,
                title: event.title,
                date: event.date,
                time: event.time,
                duration_minutes: event.duration_minutes,
                status: ApprovalStatus::Pending,
                reminder: event.reminder,
            },
            TaskId(feedback.last_insert_rowid()),
        ))
    }

    async fn calendar_events(
        &self,
        profile_id: i64,
        status: Option<ApprovalStatus>,
    ) -> Result<Vec<CalendarEvent>> {
        let mut conn = self.connect().await?;

        let rows = match status {
            Some(status) => {
                sqlx::query(&format!(
                    "SELECT {} FROM calendar_events c
                     WHERE c.profile_id = ? AND c.status = ? ORDER BY c.date, c.time",
                    CALENDAR_COLUMNS
                ))
                .bind(profile_id)
                .bind(status.as_str())
                .fetch_all(&mut conn)
                .await?
            }
            None => {
                sqlx::query(&format!(
                    "SELECT {} FROM calendar_events c
                     WHERE c.profile_id = ? ORDER BY c.date, c.time",
                    CALENDAR_COLUMNS
                ))
                .bind(profile_id)
                .fetch_all(&mut conn)
                .await?
            }
        };

        conn.close().await?;
        rows.iter().map(event_from_row).collect()
    }

    async fn update_calendar_event(
        &self,
        event_id: i64,
        changes: &CalendarEventChanges,
    ) -> Result<bool> {
        let mut conn = self.connect().await?;

        let result = sqlx::query(
            "UPDATE calendar_events
             SET date = COALESCE(?, date), time = COALESCE(?, time), duration = COALESCE(?, duration)
             WHERE event_id = ?",
        )
        .bind(changes.date.as_deref())
        .bind(changes.time.as_deref())
        .bind(changes.duration_minutes)
        .bind(event_id)
        .execute(&mut conn)
        .await?;

        conn.close().await?;
        Ok(result.rows_affected() > 0)
    }

    async fn set_calendar_event_status(
        &self,
        event_id: i64,
        status: ApprovalStatus,
    ) -> Result<bool> {
        let mut conn = self.connect().await?;
        let mut tx = conn.begin().await?;

        let result = sqlx::query("UPDATE calendar_events SET status = ? WHERE event_id = ?")
            .bind(status.as_str())
            .bind(event_id)
            .execute(&mut *tx)
            .await?;

        sqlx::query(
            "UPDATE task_feedback SET status = ?, timestamp = ? WHERE task_type = ? AND task_id = ?",
        )
        .bind(status.as_str())
        .bind(now_timestamp())
        .bind(TaskType::Calendar.as_str())
        .bind(event_id)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        conn.close().await?;
        Ok(result.rows_affected() > 0)
    }

    async fn delete_calendar_event(&self, event_id: i64) -> Result<bool> {
        let mut conn = self.connect().await?;
        let mut tx = conn.begin().await?;

        sqlx::query("DELETE FROM task_feedback WHERE task_type = ? AND task_id = ?")
            .bind(TaskType::Calendar.as_str())
            .bind(event_id)
            .execute(&mut *tx)
            .await?;

        let result = sqlx::query("DELETE FROM calendar_events WHERE event_id = ?")
            .bind(event_id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        conn.close().await?;
        Ok(result.rows_affected() > 0)
    }

    // =============================
    // Transactions
    // =============================

    async fn create_transaction(
        &self,
        profile_id: i64,
        transaction: NewTransaction,
    ) -> Result<(Transaction, Option<TaskId>)> {
        let now = now_timestamp();
        let status = if transaction.approval_needed {
            ApprovalStatus::Pending
        } else {
            ApprovalStatus::Approved
        };

        let mut conn = self.connect().await?;
        let mut tx = conn.begin().await?;

        let inserted = sqlx::query(
            "INSERT INTO transactions
               (profile_id, type, amount, recipient, notes, timestamp, status, approval_needed)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(profile_id)
        .bind(&transaction.transaction_type)
        .bind(transaction.amount)
        .bind(transaction.recipient.as_deref())
        .bind(&transaction.notes)
        .bind(&now)
        .bind(status.as_str())
        .bind(transaction.approval_needed)
        .execute(&mut *tx)
        .await?;
        let transaction_id = inserted.last_insert_rowid();

        let task_id = if transaction.approval_needed {
            let feedback = sqlx::query(
                "INSERT INTO task_feedback (task_type, task_id, profile_id, status, timestamp)
                 VALUES (?, ?, ?, 'pending', ?)",
            )
            .bind(TaskType::Transaction.as_str())
            .bind(transaction_id)
            .bind(profile_id)
            .bind(&now)
            .execute(&mut *tx)
            .await?;
            Some(TaskId(feedback.last_insert_rowid()))
        } else {
            None
        };

        tx.commit().await?;
        conn.close().await?;

        Ok((
            Transaction {
                transaction_id,
                profile_id,
                transaction_type: transaction.transaction_type,
                amount: transaction.amount,
                recipient: transaction.recipient,
                notes: transaction.notes,
                timestamp: now,
                status,
                approval_needed: transaction.approval_needed,
            },
            task_id,
        ))
    }

    async fn transactions(
        &self,
        profile_id: i64,
        status: Option<ApprovalStatus>,
    ) -> Result<Vec<Transaction>> {
        let mut conn = self.connect().await?;

        let rows = match status {
            Some(status) => {
                sqlx::query(&format!(
                    "SELECT {} FROM transactions t
                     WHERE t.profile_id = ? AND t.status = ?
                     ORDER BY t.timestamp DESC, t.transaction_id DESC",
                    TRANSACTION_COLUMNS
                ))
                .bind(profile_id)
                .bind(status.as_str())
                .fetch_all(&mut conn)
                .await?
            }
            None => {
                sqlx::query(&format!(
                    "SELECT {} FROM transactions t
                     WHERE t.profile_id = ?
                     ORDER BY t.timestamp DESC, t.transaction_id DESC",
                    TRANSACTION_COLUMNS
                ))
                .bind(profile_id)
                .fetch_all(&mut conn)
                .await?
            }
        };

        conn.close().await?;
        rows.iter().map(transaction_from_row).collect()
    }

    async fn set_transaction_status(
        &self,
        transaction_id: i64,
        status: ApprovalStatus,
    ) -> Result<bool> {
        let mut conn = self.connect().await?;
        let mut tx = conn.begin().await?;

        let result = sqlx::query("UPDATE transactions SET status = ? WHERE transaction_id = ?")
            .bind(status.as_str())
            .bind(transaction_id)
            .execute(&mut *tx)
            .await?;

        sqlx::query(
            "UPDATE task_feedback SET status = ?, timestamp = ? WHERE task_type = ? AND task_id = ?",
        )
        .bind(status.as_str())
        .bind(now_timestamp())
        .bind(TaskType::Transaction.as_str())
        .bind(transaction_id)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        conn.close().await?;
        Ok(result.rows_affected() > 0)
    }

    // =============================
    // Metrics
    // =============================

    async fn record_metric(
        &self,
        profile_id: i64,
        metric_name: &str,
        value: f64,
        recorded_at: NaiveDateTime,
    ) -> Result<i64> {
        let mut conn = self.connect().await?;

        let result = sqlx::query(
            "INSERT INTO usage_metrics (profile_id, metric_name, value, recorded_at)
             VALUES (?, ?, ?, ?)",
        )
        .bind(profile_id)
        .bind(metric_name)
        .bind(value)
        .bind(recorded_at.format(TIMESTAMP_FORMAT).to_string())
        .execute(&mut conn)
        .await?;

        conn.close().await?;
        Ok(result.last_insert_rowid())
    }

    async fn metric_summary(
        &self,
        profile_id: i64,
        metric_name: &str,
    ) -> Result<Option<MetricSummary>> {
        let mut conn = self.connect().await?;

        let row = sqlx::query(
            "SELECT COUNT(metric_id) AS sample_count,
                    AVG(value) AS average,
                    MIN(value) AS min_value,
                    MAX(value) AS max_value
             FROM usage_metrics
             WHERE profile_id = ? AND metric_name = ?",
        )
        .bind(profile_id)
        .bind(metric_name)
        .fetch_one(&mut conn)
        .await?;

        conn.close().await?;

        let count: i64 = row.try_get("sample_count")?;
        if count == 0 {
            return Ok(None);
        }

        let average: Option<f64> = row.try_get("average")?;
        let min: Option<f64> = row.try_get("min_value")?;
        let max: Option<f64> = row.try_get("max_value")?;

        Ok(Some(MetricSummary {
            metric_name: metric_name.to_string(),
            count,
            average: average.unwrap_or_default(),
            min: min.unwrap_or_default(),
            max: max.unwrap_or_default(),
        }))
    }

    async fn usage_by_app(&self, profile_id: i64, days: u32) -> Result<Vec<AppUsage>> {
        let mut conn = self.connect().await?;

        let rows = sqlx::query(
            "SELECT a.name AS app_name, a.category AS category,
                    COUNT(m.metric_id) AS sessions,
                    COALESCE(SUM(m.value), 0.0) AS total_seconds,
                    COALESCE(AVG(m.value), 0.0) AS average_seconds
             FROM usage_metrics m
             JOIN apps a ON m.app_id = a.app_id
             WHERE m.profile_id = ? AND m.metric_name = ?
               AND m.recorded_at >= datetime('now', ?)
             GROUP BY a.app_id
             ORDER BY total_seconds DESC",
        )
        .bind(profile_id)
        .bind(APP_SESSION_METRIC)
        .bind(lookback_modifier(days))
        .fetch_all(&mut conn)
        .await?;

        conn.close().await?;

        rows.iter()
            .map(|row| -> Result<AppUsage> {
                let category: String = row.try_get("category")?;
                Ok(AppUsage {
                    app_name: row.try_get("app_name")?,
                    category: parse_category(&category)?,
                    sessions: row.try_get("sessions")?,
                    total_seconds: row.try_get("total_seconds")?,
                    average_seconds: row.try_get("average_seconds")?,
                })
            })
            .collect()
    }

    async fn usage_by_category(&self, profile_id: i64, days: u32) -> Result<Vec<CategoryUsage>> {
        let mut conn = self.connect().await?;

        let rows = sqlx::query(
            "SELECT a.category AS category,
                    COALESCE(SUM(m.value), 0.0) AS total_seconds,
                    COUNT(DISTINCT a.app_id) AS unique_apps
             FROM usage_metrics m
             JOIN apps a ON m.app_id = a.app_id
             WHERE m.profile_id = ? AND m.metric_name = ?
               AND m.recorded_at >= datetime('now', ?)
             GROUP BY a.category
             ORDER BY total_seconds DESC",
        )
        .bind(profile_id)
        .bind(APP_SESSION_METRIC)
        .bind(lookback_modifier(days))
        .fetch_all(&mut conn)
        .await?;

        conn.close().await?;

        rows.iter()
            .map(|row| -> Result<CategoryUsage> {
                let category: String = row.try_get("category")?;
                Ok(CategoryUsage {
                    category: parse_category(&category)?,
                    total_seconds: row.try_get("total_seconds")?,
                    unique_apps: row.try_get("unique_apps")?,
                })
            })
            .collect()
    }

    // =============================
    // Approvals
    // =============================

    async fn pending_tasks(&self, profile_id: i64) -> Result<Vec<PendingTask>> {
        let mut conn = self.connect().await?;

        let calendar_rows = sqlx::query(&format!(
            "SELECT f.feedback_id, {}
             FROM task_feedback f
             JOIN calendar_events c ON c.event_id = f.task_id
             WHERE f.profile_id = ? AND f.status = 'pending' AND f.task_type = ?",
            CALENDAR_COLUMNS
        ))
        .bind(profile_id)
        .bind(TaskType::Calendar.as_str())
        .fetch_all(&mut conn)
        .await?;

        let transaction_rows = sqlx::query(&format!(
            "SELECT f.feedback_id, {}
             FROM task_feedback f
             JOIN transactions t ON t.transaction_id = f.task_id
             WHERE f.profile_id = ? AND f.status = 'pending' AND f.task_type = ?",
            TRANSACTION_COLUMNS
        ))
        .bind(profile_id)
        .bind(TaskType::Transaction.as_str())
        .fetch_all(&mut conn)
        .await?;

        conn.close().await?;

        let mut tasks = Vec::with_capacity(calendar_rows.len() + transaction_rows.len());
        for row in &calendar_rows {
            tasks.push(PendingTask {
                task_id: TaskId(row.try_get("feedback_id")?),
                detail: PendingTaskDetail::Calendar(event_from_row(row)?),
            });
        }
        for row in &transaction_rows {
            tasks.push(PendingTask {
                task_id: TaskId(row.try_get("feedback_id")?),
                detail: PendingTaskDetail::Transaction(transaction_from_row(row)?),
            });
        }

        tasks.sort_by_key(|t| t.task_id);
        Ok(tasks)
    }

    async fn submit_task_feedback(
        &self,
        task_id: TaskId,
        status: ApprovalStatus,
        feedback: Option<&str>,
    ) -> Result<bool> {
        let mut conn = self.connect().await?;
        let mut tx = conn.begin().await?;

        let updated = sqlx::query(
            "UPDATE task_feedback SET status = ?, feedback = ?, timestamp = ?
             WHERE feedback_id = ? AND status = 'pending'",
        )
        .bind(status.as_str())
        .bind(feedback)
        .bind(now_timestamp())
        .bind(task_id.0)
        .execute(&mut *tx)
        .await?;

        if updated.rows_affected() == 0 {
            tx.rollback().await?;
            conn.close().await?;
            return Ok(false);
        }

        let task = sqlx::query("SELECT task_type, task_id FROM task_feedback WHERE feedback_id = ?")
            .bind(task_id.0)
            .fetch_one(&mut *tx)
            .await?;

        let task_type: String = task.try_get("task_type")?;
        let reference_id: i64 = task.try_get("task_id")?;

        match TaskType::parse(&task_type) {
            Some(TaskType::Calendar) => {
                sqlx::query("UPDATE calendar_events SET status = ? WHERE event_id = ?")
                    .bind(status.as_str())
                    .bind(reference_id)
                    .execute(&mut *tx)
                    .await?;
            }
            Some(TaskType::Transaction) => {
                sqlx::query("UPDATE transactions SET status = ? WHERE transaction_id = ?")
                    .bind(status.as_str())
                    .bind(reference_id)
                    .execute(&mut *tx)
                    .await?;
            }
            None => {
                return Err(AssistantError::StoreError(format!(
                    "Unknown task type in store: {}",
                    task_type
                )));
            }
        }

        tx.commit().await?;
        conn.close().await?;

        debug!(task_id = %task_id, status = %status, "Task feedback recorded");
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::DEFAULT_APP_CATALOG;
    use chrono::{Duration, NaiveDate};
    use tempfile::TempDir;

    async fn test_store() -> (TempDir, SqliteStore) {
        let dir = TempDir::new().unwrap();
        let store = SqliteStore::open(dir.path().join("assistant.sqlite"))
            .await
            .unwrap();
        (dir, store)
    }

    async fn test_profile(store: &SqliteStore) -> VehicleProfile {
        store
            .create_vehicle("1HGCM82633A004352", "Honda", "Accord", 2003)
            .await
            .unwrap()
            .unwrap()
    }

    fn meeting(title: &str, date: &str) -> NewCalendarEvent {
        NewCalendarEvent {
            title: title.to_string(),
            date: date.to_string(),
            time: "09:30".to_string(),
            duration_minutes: 45,
            reminder: true,
        }
    }

    fn payment(amount: f64) -> NewTransaction {
        NewTransaction {
            transaction_type: "payment".to_string(),
            amount,
            recipient: Some("Alice".to_string()),
            notes: String::new(),
            approval_needed: true,
        }
    }

    #[tokio::test]
    async fn test_vehicle_roundtrip_and_duplicate_vin() {
        let (_dir, store) = test_store().await;
        let created = test_profile(&store).await;

        let found = store.vehicle_by_vin("1HGCM82633A004352").await.unwrap();
        assert_eq!(found, Some(created));

        let duplicate = store
            .create_vehicle("1HGCM82633A004352", "Ford", "Focus", 2010)
            .await
            .unwrap();
        assert!(duplicate.is_none());

        assert!(store.vehicle_by_vin("UNKNOWN").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_open_app_switches_running_flag() {
        let (_dir, store) = test_store().await;
        let profile = test_profile(&store).await;
        let apps = store
            .seed_apps(profile.profile_id, DEFAULT_APP_CATALOG)
            .await
            .unwrap();
        assert_eq!(apps.len(), DEFAULT_APP_CATALOG.len());

        let spotify = apps.iter().find(|a| a.name == "spotify").unwrap();
        let maps = apps.iter().find(|a| a.name == "maps").unwrap();

        assert!(store.open_app(profile.profile_id, spotify.app_id).await.unwrap());
        assert!(store.open_app(profile.profile_id, maps.app_id).await.unwrap());

        let apps = store.apps_for_profile(profile.profile_id).await.unwrap();
        let running: Vec<_> = apps.iter().filter(|a| a.is_running).collect();
        assert_eq!(running.len(), 1);
        assert_eq!(running[0].name, "maps");
        assert!(running[0].last_used.is_some());

        assert!(store.close_app(profile.profile_id, maps.app_id).await.unwrap());
        assert!(!store.close_app(profile.profile_id, maps.app_id).await.unwrap());
        assert!(!store.open_app(profile.profile_id, 9999).await.unwrap());

        let usage = store.usage_by_app(profile.profile_id, 7).await.unwrap();
        assert_eq!(usage.len(), 2);
        assert!(usage.iter().all(|u| u.sessions == 1));

        let categories = store.usage_by_category(profile.profile_id, 7).await.unwrap();
        assert_eq!(categories.len(), 2);
    }

    #[tokio::test]
    async fn test_usage_lookback_window() {
        let (_dir, store) = test_store().await;
        let profile = test_profile(&store).await;
        let apps = store
            .seed_apps(profile.profile_id, DEFAULT_APP_CATALOG)
            .await
            .unwrap();
        let spotify = apps.iter().find(|a| a.name == "spotify").unwrap();
        let wallet = apps.iter().find(|a| a.name == "wallet").unwrap();

        assert!(store.open_app(profile.profile_id, spotify.app_id).await.unwrap());

        let ten_days_ago = (Utc::now() - Duration::days(10))
            .naive_utc()
            .format(TIMESTAMP_FORMAT)
            .to_string();
        let mut conn = store.connect().await.unwrap();
        sqlx::query(
            "INSERT INTO usage_metrics (profile_id, metric_name, value, app_id, recorded_at)
             VALUES (?, ?, 300, ?, ?)",
        )
        .bind(profile.profile_id)
        .bind(APP_SESSION_METRIC)
        .bind(wallet.app_id)
        .bind(&ten_days_ago)
        .execute(&mut conn)
        .await
        .unwrap();
        conn.close().await.unwrap();

        let recent = store.usage_by_app(profile.profile_id, 7).await.unwrap();
        assert_eq!(recent.len(), 1);
        assert_eq!(recent[0].app_name, "spotify");

        let categories = store.usage_by_category(profile.profile_id, 7).await.unwrap();
        assert_eq!(categories.len(), 1);
        assert_eq!(categories[0].category, AppCategory::Entertainment);

        let wide = store.usage_by_app(profile.profile_id, 30).await.unwrap();
        assert_eq!(wide.len(), 2);
        assert_eq!(wide[0].app_name, "wallet");
        assert_eq!(wide[0].total_seconds, 300.0);

        let categories = store.usage_by_category(profile.profile_id, 30).await.unwrap();
        assert!(categories
            .iter()
            .any(|c| c.category == AppCategory::Finance && c.total_seconds == 300.0));
    }

    #[tokio::test]
    async fn test_calendar_event_lifecycle() {
        let (_dir, store) = test_store().await;
        let profile = test_profile(&store).await;

        let (event, task_id) = store
            .add_calendar_event(profile.profile_id, meeting("Service", "2025-03-10"))
            .await
            .unwrap();
        assert_eq!(event.status, ApprovalStatus::Pending);

        let pending = store.pending_tasks(profile.profile_id).await.unwrap();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].task_id, task_id);

        let changes = CalendarEventChanges {
            time: Some("15:00".to_string()),
            ..Default::default()
        };
        assert!(store.update_calendar_event(event.event_id, &changes).await.unwrap());

        assert!(store
            .submit_task_feedback(task_id, ApprovalStatus::Approved, Some("ok"))
            .await
            .unwrap());
        assert!(!store
            .submit_task_feedback(task_id, ApprovalStatus::Approved, None)
            .await
            .unwrap());

        let approved = store
            .calendar_events(profile.profile_id, Some(ApprovalStatus::Approved))
            .await
            .unwrap();
        assert_eq!(approved.len(), 1);
        assert_eq!(approved[0].time, "15:00");
        assert_eq!(approved[0].date, "2025-03-10");
        assert!(approved[0].reminder);

        assert!(store
            .set_calendar_event_status(event.event_id, ApprovalStatus::Completed)
            .await
            .unwrap());
        let completed = store
            .calendar_events(profile.profile_id, Some(ApprovalStatus::Completed))
            .await
            .unwrap();
        assert_eq!(completed.len(), 1);
    }

    #[tokio::test]
    async fn test_delete_calendar_event_removes_feedback() {
        let (_dir, store) = test_store().await;
        let profile = test_profile(&store).await;

        let (event, _) = store
            .add_calendar_event(profile.profile_id, meeting("Tyres", "2025-04-01"))
            .await
            .unwrap();

        assert!(store.delete_calendar_event(event.event_id).await.unwrap());
        assert!(store
            .calendar_events(profile.profile_id, None)
            .await
            .unwrap()
            .is_empty());
        assert!(store.pending_tasks(profile.profile_id).await.unwrap().is_empty());

        let mut conn = store.connect().await.unwrap();
        let remaining: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM task_feedback WHERE task_type = 'calendar' AND task_id = ?",
        )
        .bind(event.event_id)
        .fetch_one(&mut conn)
        .await
        .unwrap();
        assert_eq!(remaining, 0);
    }

    #[tokio::test]
    async fn test_events_are_ordered_by_date_and_time() {
        let (_dir, store) = test_store().await;
        let profile = test_profile(&store).await;

        store
            .add_calendar_event(profile.profile_id, meeting("Later", "2025-05-02"))
            .await
            .unwrap();
        store
            .add_calendar_event(profile.profile_id, meeting("Sooner", "2025-05-01"))
            .await
            .unwrap();

        let events = store.calendar_events(profile.profile_id, None).await.unwrap();
        let titles: Vec<_> = events.iter().map(|e| e.title.as_str()).collect();
        assert_eq!(titles, vec!["Sooner", "Later"]);
    }

    #[tokio::test]
    async fn test_transaction_approval_and_rejection() {
        let (_dir, store) = test_store().await;
        let profile = test_profile(&store).await;

        let (first, first_task) = store
            .create_transaction(profile.profile_id, payment(20.0))
            .await
            .unwrap();
        let (_, second_task) = store
            .create_transaction(profile.profile_id, payment(5.0))
            .await
            .unwrap();
        assert_eq!(first.status, ApprovalStatus::Pending);

        assert!(store
            .submit_task_feedback(first_task.unwrap(), ApprovalStatus::Approved, None)
            .await
            .unwrap());
        assert!(store
            .submit_task_feedback(second_task.unwrap(), ApprovalStatus::Rejected, Some("too much"))
            .await
            .unwrap());

        let approved = store
            .transactions(profile.profile_id, Some(ApprovalStatus::Approved))
            .await
            .unwrap();
        assert_eq!(approved.len(), 1);
        assert_eq!(approved[0].transaction_id, first.transaction_id);

        let rejected = store
            .transactions(profile.profile_id, Some(ApprovalStatus::Rejected))
            .await
            .unwrap();
        assert_eq!(rejected.len(), 1);

        assert!(store
            .set_transaction_status(first.transaction_id, ApprovalStatus::Completed)
            .await
            .unwrap());
        assert!(store.pending_tasks(profile.profile_id).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_transaction_without_approval_is_approved() {
        let (_dir, store) = test_store().await;
        let profile = test_profile(&store).await;

        let mut new = payment(3.5);
        new.approval_needed = false;
        let (transaction, task_id) = store
            .create_transaction(profile.profile_id, new)
            .await
            .unwrap();

        assert!(task_id.is_none());
        assert_eq!(transaction.status, ApprovalStatus::Approved);
        assert!(store.pending_tasks(profile.profile_id).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_metric_summary() {
        let (_dir, store) = test_store().await;
        let profile = test_profile(&store).await;
        let at = NaiveDate::from_ymd_opt(2025, 3, 10)
            .unwrap()
            .and_hms_opt(8, 0, 0)
            .unwrap();

        for value in [10.0, 20.0, 60.0] {
            store
                .record_metric(profile.profile_id, "fuel_level", value, at)
                .await
                .unwrap();
        }

        let summary = store
            .metric_summary(profile.profile_id, "fuel_level")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(summary.count, 3);
        assert_eq!(summary.average, 30.0);
        assert_eq!(summary.min, 10.0);
        assert_eq!(summary.max, 60.0);

        assert!(store
            .metric_summary(profile.profile_id, "tyre_pressure")
            .await
            .unwrap()
            .is_none());
    }
}
