//! Approval queue and pending action functions

use super::{i64_param, metrics, str_param, Tool, ToolContext};
use crate::error::AssistantError;
use crate::models::{ApprovalStatus, PendingTaskDetail, TaskId, ToolInput, ToolOutput};
use crate::state::{AppState, PendingAction, Proposal, SessionContext};
use crate::Result;
use serde_json::{json, Value};
use tracing::{debug, info};

pub const NOTHING_PENDING_MESSAGE: &str = "There is no action waiting for confirmation";

/// Offer `action` for confirmation, honoring the session's pending action
/// policy. `prompt` is returned when the action was taken.
pub(crate) fn propose(
    session: &mut SessionContext,
    action: PendingAction,
    prompt: String,
) -> ToolOutput {
    let description = action.describe();

    match session.pending_action.propose(action) {
        Proposal::Accepted => {
            debug!(action = %description, "Pending action set");
            ToolOutput::success(prompt)
        }
        Proposal::Replaced(previous) => {
            info!(
                dropped = %previous.describe(),
                action = %description,
                "Pending action replaced"
            );
            ToolOutput::success(prompt)
        }
        Proposal::Refused(existing) => ToolOutput::failure(format!(
            "Another action is still waiting for confirmation: {}. Please confirm or cancel it first.",
            existing.describe()
        )),
    }
}

fn task_id_schema(verb: &str) -> Value {
    json!({
        "type": "object",
        "properties": {
            "task_id": { "type": "integer", "description": format!("ID of the task to {}", verb) },
            "feedback": { "type": "string", "description": "Optional note stored with the decision" }
        },
        "required": ["task_id"]
    })
}

async fn resolve_task(
    ctx: &mut ToolContext<'_>,
    input: &ToolInput,
    status: ApprovalStatus,
) -> Result<ToolOutput> {
    let raw_id = i64_param(input, "task_id").ok_or_else(|| {
        AssistantError::InvalidToolInput(format!("Expected integer 'task_id' for {}", input.tool_name))
    })?;
    let task_id = TaskId(raw_id);
    info!(task_id = %task_id, status = %status, "Resolving task");

    if ctx.session.pending_tasks.get(task_id).is_none() {
        return Ok(ToolOutput::failure(format!("Invalid task ID: {}", task_id)));
    }

    let recorded = ctx
        .store
        .submit_task_feedback(task_id, status, str_param(input, "feedback"))
        .await?;

    let Some(task) = ctx.session.pending_tasks.remove(task_id) else {
        return Ok(ToolOutput::failure(format!("Invalid task ID: {}", task_id)));
    };
    if !recorded {
        // Resolved outside this session
        return Ok(ToolOutput::failure(format!("Invalid task ID: {}", task_id)));
    }

    let verdict = match status {
        ApprovalStatus::Approved => "approved",
        _ => "rejected",
    };

    let message = match task.detail {
        PendingTaskDetail::Transaction(mut transaction) => {
            transaction.status = status;
            let text = format!("Transaction {}: {}", verdict, transaction.describe());
            if status == ApprovalStatus::Approved {
                ctx.session.transaction_history.push(transaction);
            }
            text
        }
        PendingTaskDetail::Calendar(event) => format!(
            "Calendar event {}: {} on {} at {}",
            verdict, event.title, event.date, event.time
        ),
    };

    Ok(ToolOutput::success(message))
}

pub struct ListPendingTasksTool;

#[async_trait::async_trait]
impl Tool for ListPendingTasksTool {
    fn name(&self) -> &'static str {
        "list_pending_tasks"
    }

    fn description(&self) -> &'static str {
        "List calendar events and transactions waiting for approval"
    }

    async fn execute(&self, ctx: &mut ToolContext<'_>, _input: &ToolInput) -> Result<ToolOutput> {
        if ctx.session.pending_tasks.is_empty() {
            return Ok(ToolOutput::success("No pending tasks"));
        }

        let mut text = String::from("Pending tasks:\n");
        for task in ctx.session.pending_tasks.iter() {
            text.push_str(&format!("{}. {}\n", task.task_id, task.describe()));
        }
        Ok(ToolOutput::success(text))
    }
}

pub struct ApproveTaskTool;

#[async_trait::async_trait]
impl Tool for ApproveTaskTool {
    fn name(&self) -> &'static str {
        "approve_task"
    }

    fn description(&self) -> &'static str {
        "Approve a pending task by its ID"
    }

    fn parameters(&self) -> Value {
        task_id_schema("approve")
    }

    async fn execute(&self, ctx: &mut ToolContext<'_>, input: &ToolInput) -> Result<ToolOutput> {
        resolve_task(ctx, input, ApprovalStatus::Approved).await
    }
}

pub struct RejectTaskTool;

#[async_trait::async_trait]
impl Tool for RejectTaskTool {
    fn name(&self) -> &'static str {
        "reject_task"
    }

    fn description(&self) -> &'static str {
        "Reject a pending task by its ID"
    }

    fn parameters(&self) -> Value {
        task_id_schema("reject")
    }

    async fn execute(&self, ctx: &mut ToolContext<'_>, input: &ToolInput) -> Result<ToolOutput> {
        resolve_task(ctx, input, ApprovalStatus::Rejected).await
    }
}

pub struct ConfirmPendingActionTool;

#[async_trait::async_trait]
impl Tool for ConfirmPendingActionTool {
    fn name(&self) -> &'static str {
        "confirm_pending_action"
    }

    fn description(&self) -> &'static str {
        "Carry out the action the user was asked to confirm"
    }

    async fn execute(&self, ctx: &mut ToolContext<'_>, _input: &ToolInput) -> Result<ToolOutput> {
        let Some(action) = ctx.session.pending_action.take() else {
            return Ok(ToolOutput::failure(NOTHING_PENDING_MESSAGE));
        };
        let profile_id = ctx.profile_id()?;
        info!(action = %action.describe(), "Executing pending action");

        match action {
            PendingAction::SwitchApp { app_id, app_name } => {
                if !ctx.store.open_app(profile_id, app_id).await? {
                    return Ok(ToolOutput::failure(format!(
                        "{} is no longer installed",
                        app_name
                    )));
                }
                ctx.session.apps = ctx.store.apps_for_profile(profile_id).await?;
                if let Some(state) = AppState::parse(&app_name) {
                    ctx.session.app_state = state;
                }
                Ok(ToolOutput::success(format!("Switched to {}", app_name)))
            }
            PendingAction::DeleteCalendarEvent {
                event_id, title, ..
            } => {
                if !ctx.store.delete_calendar_event(event_id).await? {
                    return Ok(ToolOutput::failure(format!(
                        "The event '{}' no longer exists",
                        title
                    )));
                }
                let pending = ctx.store.pending_tasks(profile_id).await?;
                ctx.session.pending_tasks.replace_all(pending);
                Ok(ToolOutput::success(format!("Deleted event '{}'", title)))
            }
            PendingAction::UpdateCalendarEvent {
                event_id,
                title,
                changes,
            } => {
                if !ctx.store.update_calendar_event(event_id, &changes).await? {
                    return Ok(ToolOutput::failure(format!(
                        "The event '{}' no longer exists",
                        title
                    )));
                }
                let pending = ctx.store.pending_tasks(profile_id).await?;
                ctx.session.pending_tasks.replace_all(pending);
                Ok(ToolOutput::success(format!(
                    "Updated event '{}': {}",
                    title,
                    changes.describe()
                )))
            }
            PendingAction::AnalyzeAppMetrics {
                app_name,
                metric_type,
            } => metrics::app_metrics_report(ctx, &app_name, &metric_type).await,
        }
    }
}

pub struct CancelPendingActionTool;

#[async_trait::async_trait]
impl Tool for CancelPendingActionTool {
    fn name(&self) -> &'static str {
        "cancel_pending_action"
    }

    fn description(&self) -> &'static str {
        "Drop the action the user was asked to confirm"
    }

    async fn execute(&self, ctx: &mut ToolContext<'_>, _input: &ToolInput) -> Result<ToolOutput> {
        match ctx.session.pending_action.take() {
            Some(action) => Ok(ToolOutput::success(format!(
                "Cancelled: {}",
                action.describe()
            ))),
            None => Ok(ToolOutput::failure(NOTHING_PENDING_MESSAGE)),
        }
    }
}
