//! Calendar functions
//!
//! New events are stored as pending and queued for approval. Updates and
//! deletions of existing events go through the pending action instead.

use super::tasks::propose;
use super::{bool_param, i64_param, str_param, Tool, ToolContext};
use crate::error::AssistantError;
use crate::models::{
    ApprovalStatus, CalendarEvent, CalendarEventChanges, PendingTask, PendingTaskDetail,
    ToolInput, ToolOutput,
};
use crate::state::PendingAction;
use crate::store::NewCalendarEvent;
use crate::Result;
use chrono::{NaiveDate, NaiveTime};
use serde_json::{json, Value};
use tracing::info;

const DATE_FORMAT: &str = "%Y-%m-%d";
const TIME_FORMAT: &str = "%H:%M";
const DEFAULT_TIME: &str = "12:00";
const DEFAULT_DURATION_MINUTES: i64 = 60;

const MISSING_TITLE_OR_DATE: &str =
    "I need at least an event title and date to add to your calendar.";
const BAD_DATE: &str = "Please provide the date in YYYY-MM-DD format.";
const BAD_TIME: &str = "Please provide the time in HH:MM format.";
const BAD_DURATION: &str = "Please provide the duration as a positive number of minutes.";

fn valid_date(value: &str) -> bool {
    NaiveDate::parse_from_str(value, DATE_FORMAT).is_ok()
}

fn valid_time(value: &str) -> bool {
    NaiveTime::parse_from_str(value, TIME_FORMAT).is_ok()
}

/// Events whose title contains `title`, optionally narrowed to one date
async fn matching_events(
    ctx: &ToolContext<'_>,
    title: &str,
    on_date: Option<&str>,
) -> Result<Vec<CalendarEvent>> {
    let needle = title.to_lowercase();
    let events = ctx.store.calendar_events(ctx.profile_id()?, None).await?;

    Ok(events
        .into_iter()
        .filter(|e| e.status != ApprovalStatus::Rejected)
        .filter(|e| e.title.to_lowercase().contains(&needle))
        .filter(|e| on_date.map_or(true, |d| e.date == d))
        .collect())
}

fn disambiguation(events: &[CalendarEvent], verb: &str) -> ToolOutput {
    let mut text = format!(
        "I found multiple matching events. Please specify which one to {}:\n",
        verb
    );
    for (i, event) in events.iter().enumerate() {
        text.push_str(&format!(
            "{}. {} on {} at {}\n",
            i + 1,
            event.title,
            event.date,
            event.time
        ));
    }
    ToolOutput::failure(text)
}

fn no_match(title: &str) -> ToolOutput {
    ToolOutput::failure(format!(
        "I couldn't find any events with the title '{}'.",
        title
    ))
}

pub struct AddCalendarEventTool;

#[async_trait::async_trait]
impl Tool for AddCalendarEventTool {
    fn name(&self) -> &'static str {
        "add_calendar_event"
    }

    fn description(&self) -> &'static str {
        "Add a calendar event; it stays pending until approved"
    }

    fn parameters(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "title": { "type": "string", "description": "Event title" },
                "date": { "type": "string", "description": "Event date (YYYY-MM-DD)" },
                "time": { "type": "string", "description": "Event time (HH:MM), defaults to 12:00" },
                "duration": { "type": "integer", "description": "Duration in minutes, defaults to 60" },
                "reminder": { "type": "boolean", "description": "Remind the driver before the event" }
            },
            "required": ["title", "date"]
        })
    }

    async fn execute(&self, ctx: &mut ToolContext<'_>, input: &ToolInput) -> Result<ToolOutput> {
        let (Some(title), Some(date)) = (str_param(input, "title"), str_param(input, "date")) else {
            return Ok(ToolOutput::failure(MISSING_TITLE_OR_DATE));
        };
        if !valid_date(date) {
            return Ok(ToolOutput::failure(BAD_DATE));
        }

        let time = str_param(input, "time").unwrap_or(DEFAULT_TIME);
        if !valid_time(time) {
            return Ok(ToolOutput::failure(BAD_TIME));
        }

        let duration = i64_param(input, "duration").unwrap_or(DEFAULT_DURATION_MINUTES);
        if duration <= 0 {
            return Ok(ToolOutput::failure(BAD_DURATION));
        }

        info!(title, date, time, duration, "Adding calendar event");

        let profile_id = ctx.profile_id()?;
        let new_event = NewCalendarEvent {
            title: title.to_string(),
            date: date.to_string(),
            time: time.to_string(),
            duration_minutes: duration,
            reminder: bool_param(input, "reminder").unwrap_or(false),
        };
        let (event, task_id) = ctx.store.add_calendar_event(profile_id, new_event).await?;

        let message = format!(
            "Added '{}' on {} at {} for {} minutes. It is waiting for approval as task {}.",
            event.title, event.date, event.time, event.duration_minutes, task_id
        );
        ctx.session.pending_tasks.insert(PendingTask {
            task_id,
            detail: PendingTaskDetail::Calendar(event),
        });

        Ok(ToolOutput::success(message))
    }
}

pub struct ListCalendarEventsTool;

#[async_trait::async_trait]
impl Tool for ListCalendarEventsTool {
    fn name(&self) -> &'static str {
        "list_calendar_events"
    }

    fn description(&self) -> &'static str {
        "List calendar events, optionally filtered by status"
    }

    fn parameters(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "status": {
                    "type": "string",
                    "enum": ["pending", "approved", "rejected", "completed"]
                }
            }
        })
    }

    async fn execute(&self, ctx: &mut ToolContext<'_>, input: &ToolInput) -> Result<ToolOutput> {
        let status = match str_param(input, "status") {
            Some(raw) => match ApprovalStatus::parse(raw) {
                Some(status) => Some(status),
                None => {
                    return Ok(ToolOutput::failure(format!(
                        "Unknown status '{}'. Use pending, approved, rejected or completed.",
                        raw
                    )))
                }
            },
            None => None,
        };

        let events = ctx
            .store
            .calendar_events(ctx.profile_id()?, status)
            .await?;
        if events.is_empty() {
            return Ok(ToolOutput::success(
                "You don't have any events scheduled in your calendar.",
            ));
        }

        let mut text = String::from("Here are your scheduled events:\n");
        for (i, event) in events.iter().enumerate() {
            text.push_str(&format!(
                "{}. {} on {} at {} ({} minutes, {})\n",
                i + 1,
                event.title,
                event.date,
                event.time,
                event.duration_minutes,
                event.status
            ));
        }
        Ok(ToolOutput::success(text))
    }
}

pub struct UpdateCalendarEventTool;

#[async_trait::async_trait]
impl Tool for UpdateCalendarEventTool {
    fn name(&self) -> &'static str {
        "update_calendar_event"
    }

    fn description(&self) -> &'static str {
        "Change the date, time or duration of an event found by title"
    }

    fn parameters(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "title": { "type": "string", "description": "Title (or part of it) of the event" },
                "event_date": { "type": "string", "description": "Current date of the event, to pick between matches" },
                "date": { "type": "string", "description": "New date (YYYY-MM-DD)" },
                "time": { "type": "string", "description": "New time (HH:MM)" },
                "duration": { "type": "integer", "description": "New duration in minutes" }
            },
            "required": ["title"]
        })
    }

    async fn execute(&self, ctx: &mut ToolContext<'_>, input: &ToolInput) -> Result<ToolOutput> {
        let Some(title) = str_param(input, "title") else {
            return Ok(ToolOutput::failure(
                "I need at least the event title to find the event you want to update.",
            ));
        };

        let changes = CalendarEventChanges {
            date: str_param(input, "date").map(str::to_string),
            time: str_param(input, "time").map(str::to_string),
            duration_minutes: i64_param(input, "duration"),
        };
        if changes.is_empty() {
            return Ok(ToolOutput::failure(
                "Please specify what you want to update (date, time, or duration).",
            ));
        }
        if changes.date.as_deref().is_some_and(|d| !valid_date(d)) {
            return Ok(ToolOutput::failure(BAD_DATE));
        }
        if changes.time.as_deref().is_some_and(|t| !valid_time(t)) {
            return Ok(ToolOutput::failure(BAD_TIME));
        }
        if changes.duration_minutes.is_some_and(|d| d <= 0) {
            return Ok(ToolOutput::failure(BAD_DURATION));
        }

        let mut events = matching_events(ctx, title, str_param(input, "event_date")).await?;
        match events.len() {
            0 => Ok(no_match(title)),
            1 => {
                let event = events.remove(0);
                let prompt = format!(
                    "I'm ready to update the event '{}' on {} at {}. I'll change {}. Would you like to proceed?",
                    event.title,
                    event.date,
                    event.time,
                    changes.describe()
                );
                let action = PendingAction::UpdateCalendarEvent {
                    event_id: event.event_id,
                    title: event.title,
                    changes,
                };
                Ok(propose(ctx.session, action, prompt))
            }
            _ => Ok(disambiguation(&events, "update")),
        }
    }
}

pub struct DeleteCalendarEventTool;

#[async_trait::async_trait]
impl Tool for DeleteCalendarEventTool {
    fn name(&self) -> &'static str {
        "delete_calendar_event"
    }

    fn description(&self) -> &'static str {
        "Delete an event found by title"
    }

    fn parameters(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "title": { "type": "string", "description": "Title (or part of it) of the event" },
                "event_date": { "type": "string", "description": "Date of the event, to pick between matches" }
            },
            "required": ["title"]
        })
    }

    async fn execute(&self, ctx: &mut ToolContext<'_>, input: &ToolInput) -> Result<ToolOutput> {
        let title = str_param(input, "title").ok_or_else(|| {
            AssistantError::InvalidToolInput("Expected 'title' for delete_calendar_event".to_string())
        })?;

        let mut events = matching_events(ctx, title, str_param(input, "event_date")).await?;
        match events.len() {
            0 => Ok(no_match(title)),
            1 => {
                let event = events.remove(0);
                let prompt = format!(
                    "I'm ready to delete the event '{}' on {} at {}. Would you like to proceed?",
                    event.title, event.date, event.time
                );
                let action = PendingAction::DeleteCalendarEvent {
                    event_id: event.event_id,
                    title: event.title,
                    date: event.date,
                    time: event.time,
                };
                Ok(propose(ctx.session, action, prompt))
            }
            _ => Ok(disambiguation(&events, "delete")),
        }
    }
}
