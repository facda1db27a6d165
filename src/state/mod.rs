//! Per-session state
//!
//! Everything a callable function may read or mutate besides the store.
//! Passed explicitly to every function; there is no global session.

use crate::classifier::IntentClassifier;
use crate::models::{
    AppCategory, AppRecord, CalendarEventChanges, PendingTask, TaskId, Transaction,
    VehicleProfile,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Feature currently shown by the assistant front end.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum AppState {
    #[default]
    Home,
    Calendar,
    Messages,
    Maps,
    Settings,
    Metrics,
    Transactions,
}

impl AppState {
    pub const ALL: [AppState; 7] = [
        AppState::Home,
        AppState::Calendar,
        AppState::Messages,
        AppState::Maps,
        AppState::Settings,
        AppState::Metrics,
        AppState::Transactions,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            AppState::Home => "home",
            AppState::Calendar => "calendar",
            AppState::Messages => "messages",
            AppState::Maps => "maps",
            AppState::Settings => "settings",
            AppState::Metrics => "metrics",
            AppState::Transactions => "transactions",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        let value = value.trim().to_lowercase();
        Self::ALL.into_iter().find(|s| s.as_str() == value)
    }
}

//
// ================= Pending action =================
//

/// A proposed mutation waiting for the user to say yes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum PendingAction {
    SwitchApp {
        app_id: i64,
        app_name: String,
    },
    DeleteCalendarEvent {
        event_id: i64,
        title: String,
        date: String,
        time: String,
    },
    UpdateCalendarEvent {
        event_id: i64,
        title: String,
        changes: CalendarEventChanges,
    },
    AnalyzeAppMetrics {
        app_name: String,
        metric_type: String,
    },
}

impl PendingAction {
    pub fn describe(&self) -> String {
        match self {
            PendingAction::SwitchApp { app_name, .. } => format!("Switch to {} app", app_name),
            PendingAction::DeleteCalendarEvent {
                title, date, time, ..
            } => format!("Delete event '{}' on {} at {}", title, date, time),
            PendingAction::UpdateCalendarEvent { title, changes, .. } => {
                format!("Update event '{}' ({})", title, changes.describe())
            }
            PendingAction::AnalyzeAppMetrics {
                app_name,
                metric_type,
            } => format!("Analyze {} metrics for {}", metric_type, app_name),
        }
    }
}

/// What happens when an action is proposed while another one is waiting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PendingActionPolicy {
    /// Last write wins; the waiting action is dropped.
    ReplaceLast,
    /// The waiting action must be confirmed or cancelled first.
    KeepFirst,
}

impl PendingActionPolicy {
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_lowercase().as_str() {
            "replace" | "replace-last" | "replace_last" => Some(PendingActionPolicy::ReplaceLast),
            "keep" | "keep-first" | "keep_first" => Some(PendingActionPolicy::KeepFirst),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Proposal {
    Accepted,
    Replaced(PendingAction),
    Refused(PendingAction),
}

/// Single-slot holder for the pending action.
#[derive(Debug, Clone)]
pub struct PendingActionSlot {
    policy: PendingActionPolicy,
    action: Option<PendingAction>,
}

impl PendingActionSlot {
    pub fn new(policy: PendingActionPolicy) -> Self {
        Self {
            policy,
            action: None,
        }
    }

    pub fn policy(&self) -> PendingActionPolicy {
        self.policy
    }

    pub fn propose(&mut self, action: PendingAction) -> Proposal {
        match (self.policy, self.action.take()) {
            (_, None) => {
                self.action = Some(action);
                Proposal::Accepted
            }
            (PendingActionPolicy::ReplaceLast, Some(previous)) => {
                self.action = Some(action);
                Proposal::Replaced(previous)
            }
            (PendingActionPolicy::KeepFirst, Some(existing)) => {
                self.action = Some(existing.clone());
                Proposal::Refused(existing)
            }
        }
    }

    pub fn peek(&self) -> Option<&PendingAction> {
        self.action.as_ref()
    }

    pub fn take(&mut self) -> Option<PendingAction> {
        self.action.take()
    }

    pub fn is_empty(&self) -> bool {
        self.action.is_none()
    }
}

//
// ================= Pending tasks =================
//

/// Approval queue keyed by stable task ids.
#[derive(Debug, Clone, Default)]
pub struct PendingTasks {
    tasks: BTreeMap<TaskId, PendingTask>,
}

impl PendingTasks {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, task: PendingTask) {
        self.tasks.insert(task.task_id, task);
    }

    pub fn get(&self, task_id: TaskId) -> Option<&PendingTask> {
        self.tasks.get(&task_id)
    }

    pub fn remove(&mut self, task_id: TaskId) -> Option<PendingTask> {
        self.tasks.remove(&task_id)
    }

    /// Replace the whole queue, e.g. after loading a profile.
    pub fn replace_all(&mut self, tasks: Vec<PendingTask>) {
        self.tasks = tasks.into_iter().map(|t| (t.task_id, t)).collect();
    }

    /// Tasks in creation order
    pub fn iter(&self) -> impl Iterator<Item = &PendingTask> {
        self.tasks.values()
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }
}

//
// ================= Session context =================
//

#[derive(Debug, Clone)]
pub struct SessionContext {
    pub profile: Option<VehicleProfile>,
    pub app_state: AppState,
    pub apps: Vec<AppRecord>,
    pub pending_action: PendingActionSlot,
    pub pending_tasks: PendingTasks,
    /// Transactions approved during this session
    pub transaction_history: Vec<Transaction>,
}

impl SessionContext {
    pub fn new(policy: PendingActionPolicy) -> Self {
        Self {
            profile: None,
            app_state: AppState::Home,
            apps: Vec::new(),
            pending_action: PendingActionSlot::new(policy),
            pending_tasks: PendingTasks::new(),
            transaction_history: Vec::new(),
        }
    }

    pub fn has_profile(&self) -> bool {
        self.profile.is_some()
    }

    /// Install a freshly loaded profile and reset everything scoped to the
    /// previous one.
    pub fn load_profile(
        &mut self,
        profile: VehicleProfile,
        apps: Vec<AppRecord>,
        pending: Vec<PendingTask>,
    ) {
        self.profile = Some(profile);
        self.app_state = AppState::Home;
        self.apps = apps;
        self.pending_action.take();
        self.pending_tasks.replace_all(pending);
        self.transaction_history.clear();
    }

    /// Profile details as the assistant reads them out
    pub fn profile_summary(&self) -> String {
        match &self.profile {
            Some(p) => format!(
                "vin: {}\nmake: {}\nmodel: {}\nyear: {}\n",
                p.vin, p.make, p.model, p.year
            ),
            None => "vin: \nmake: \nmodel: \nyear: \n".to_string(),
        }
    }

    /// Exact name match first, then the first partial match either way round.
    pub fn find_app(&self, name: &str) -> Option<&AppRecord> {
        let name = name.trim().to_lowercase();
        if name.is_empty() {
            return None;
        }
        self.apps
            .iter()
            .find(|app| app.name.to_lowercase() == name)
            .or_else(|| {
                self.apps.iter().find(|app| {
                    let app_name = app.name.to_lowercase();
                    app_name.contains(&name) || name.contains(&app_name)
                })
            })
    }

    pub fn app_names(&self) -> Vec<&str> {
        self.apps.iter().map(|a| a.name.as_str()).collect()
    }

    pub fn classifier(&self) -> IntentClassifier {
        IntentClassifier::with_apps(
            self.apps
                .iter()
                .map(|app| (app.name.clone(), app.category))
                .collect::<Vec<(String, AppCategory)>>(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ApprovalStatus, PendingTaskDetail};

    fn switch(name: &str) -> PendingAction {
        PendingAction::SwitchApp {
            app_id: 1,
            app_name: name.to_string(),
        }
    }

    fn app(app_id: i64, name: &str, category: AppCategory) -> AppRecord {
        AppRecord {
            app_id,
            profile_id: 1,
            name: name.to_string(),
            category,
            is_running: false,
            last_used: None,
        }
    }

    #[test]
    fn test_replace_last_overwrites() {
        let mut slot = PendingActionSlot::new(PendingActionPolicy::ReplaceLast);
        assert_eq!(slot.propose(switch("spotify")), Proposal::Accepted);
        assert_eq!(
            slot.propose(switch("maps")),
            Proposal::Replaced(switch("spotify"))
        );
        assert_eq!(slot.peek(), Some(&switch("maps")));
    }

    #[test]
    fn test_keep_first_refuses() {
        let mut slot = PendingActionSlot::new(PendingActionPolicy::KeepFirst);
        assert_eq!(slot.propose(switch("spotify")), Proposal::Accepted);
        assert_eq!(
            slot.propose(switch("maps")),
            Proposal::Refused(switch("spotify"))
        );
        assert_eq!(slot.take(), Some(switch("spotify")));
        assert!(slot.is_empty());
        assert_eq!(slot.propose(switch("maps")), Proposal::Accepted);
    }

    #[test]
    fn test_policy_parse() {
        assert_eq!(
            PendingActionPolicy::parse("keep-first"),
            Some(PendingActionPolicy::KeepFirst)
        );
        assert_eq!(
            PendingActionPolicy::parse("Replace"),
            Some(PendingActionPolicy::ReplaceLast)
        );
        assert_eq!(PendingActionPolicy::parse("queue"), None);
    }

    #[test]
    fn test_task_ids_are_stable_after_removal() {
        let task = |id: i64| PendingTask {
            task_id: TaskId(id),
            detail: PendingTaskDetail::Transaction(Transaction {
                transaction_id: id,
                profile_id: 1,
                transaction_type: "payment".to_string(),
                amount: 10.0,
                recipient: None,
                notes: String::new(),
                timestamp: String::new(),
                status: ApprovalStatus::Pending,
                approval_needed: true,
            }),
        };

        let mut tasks = PendingTasks::new();
        tasks.insert(task(4));
        tasks.insert(task(7));
        tasks.insert(task(9));

        assert!(tasks.remove(TaskId(4)).is_some());
        assert!(tasks.get(TaskId(7)).is_some());
        assert!(tasks.get(TaskId(9)).is_some());
        assert!(tasks.remove(TaskId(4)).is_none());
        assert_eq!(tasks.len(), 2);
    }

    #[test]
    fn test_find_app_prefers_exact_match() {
        let mut session = SessionContext::new(PendingActionPolicy::ReplaceLast);
        session.apps = vec![
            app(1, "apple music", AppCategory::Entertainment),
            app(2, "music", AppCategory::Entertainment),
        ];

        assert_eq!(session.find_app("Music").map(|a| a.app_id), Some(2));
        assert_eq!(session.find_app("apple").map(|a| a.app_id), Some(1));
        assert!(session.find_app("netflix").is_none());
        assert!(session.find_app("  ").is_none());
    }

    #[test]
    fn test_app_state_parse() {
        assert_eq!(AppState::parse("Calendar"), Some(AppState::Calendar));
        assert_eq!(AppState::parse("spotify"), None);
        assert_eq!(AppState::default(), AppState::Home);
    }
}
