//! Metric recording and analysis functions

use super::apps::app_not_found;
use super::tasks::propose;
use super::{f64_param, i64_param, require_str, str_param, Tool, ToolContext};
use crate::error::AssistantError;
use crate::models::{MetricSummary, ToolInput, ToolOutput};
use crate::state::PendingAction;
use crate::Result;
use chrono::{NaiveDateTime, Utc};
use serde_json::{json, Value};
use tracing::info;

const METRIC_TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M";
const DEFAULT_APP_METRIC: &str = "usage";

fn minutes(seconds: f64) -> String {
    format!("{:.1}", seconds / 60.0)
}

fn summary_text(label: &str, summary: &MetricSummary) -> String {
    format!(
        "Analysis for {}:\nCount: {}\nAverage: {:.2}\nMin: {}\nMax: {}",
        label, summary.count, summary.average, summary.min, summary.max
    )
}

/// Metric name under which per-app samples other than usage are recorded
pub fn app_metric_name(app_name: &str, metric_type: &str) -> String {
    format!("{}.{}", app_name.to_lowercase(), metric_type.to_lowercase())
}

/// Report for one app. `usage` comes from recorded app sessions, every
/// other metric type from samples named by `app_metric_name`.
pub(crate) async fn app_metrics_report(
    ctx: &mut ToolContext<'_>,
    app_name: &str,
    metric_type: &str,
) -> Result<ToolOutput> {
    let profile_id = ctx.profile_id()?;
    let days = ctx.config.usage_lookback_days;

    if metric_type == DEFAULT_APP_METRIC {
        let usage = ctx.store.usage_by_app(profile_id, days).await?;
        let Some(app) = usage.iter().find(|u| u.app_name == app_name) else {
            return Ok(ToolOutput::success(format!(
                "No usage recorded for {} in the last {} days",
                app_name, days
            )));
        };

        return Ok(ToolOutput::success(format!(
            "Usage for {} over the last {} days: {} sessions, {} minutes in total, {} minutes on average",
            app.app_name,
            days,
            app.sessions,
            minutes(app.total_seconds),
            minutes(app.average_seconds)
        )));
    }

    let name = app_metric_name(app_name, metric_type);
    match ctx.store.metric_summary(profile_id, &name).await? {
        Some(summary) => Ok(ToolOutput::success(summary_text(
            &format!("{} {}", app_name, metric_type),
            &summary,
        ))),
        None => Ok(ToolOutput::success(format!(
            "No {} data recorded for {}",
            metric_type, app_name
        ))),
    }
}

pub struct AddMetricsDataTool;

#[async_trait::async_trait]
impl Tool for AddMetricsDataTool {
    fn name(&self) -> &'static str {
        "add_metrics_data"
    }

    fn description(&self) -> &'static str {
        "Record a metric sample for later analysis"
    }

    fn parameters(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "metric_name": { "type": "string", "description": "Name of the metric" },
                "metric_value": { "type": "number", "description": "Value of the metric" },
                "timestamp": { "type": "string", "description": "Timestamp (YYYY-MM-DD HH:MM), defaults to now" }
            },
            "required": ["metric_name", "metric_value"]
        })
    }

    async fn execute(&self, ctx: &mut ToolContext<'_>, input: &ToolInput) -> Result<ToolOutput> {
        let metric_name = require_str(input, "metric_name")?;
        let value = f64_param(input, "metric_value").ok_or_else(|| {
            AssistantError::InvalidToolInput(
                "Expected numeric 'metric_value' for add_metrics_data".to_string(),
            )
        })?;

        let recorded_at = match str_param(input, "timestamp") {
            Some(raw) => match NaiveDateTime::parse_from_str(raw, METRIC_TIMESTAMP_FORMAT) {
                Ok(ts) => ts,
                Err(_) => {
                    return Ok(ToolOutput::failure(
                        "Please provide the timestamp in YYYY-MM-DD HH:MM format.",
                    ))
                }
            },
            None => Utc::now().naive_utc(),
        };

        info!(metric_name, value, "Recording metric");
        ctx.store
            .record_metric(ctx.profile_id()?, metric_name, value, recorded_at)
            .await?;

        Ok(ToolOutput::success(format!(
            "Successfully added metric: {} = {} at {}",
            metric_name,
            value,
            recorded_at.format(METRIC_TIMESTAMP_FORMAT)
        )))
    }
}

pub struct AnalyzeMetricsTool;

#[async_trait::async_trait]
impl Tool for AnalyzeMetricsTool {
    fn name(&self) -> &'static str {
        "analyze_metrics"
    }

    fn description(&self) -> &'static str {
        "Summarize a metric: count, average, minimum and maximum"
    }

    fn parameters(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "metric_name": { "type": "string", "description": "Name of the metric to analyze" }
            },
            "required": ["metric_name"]
        })
    }

    async fn execute(&self, ctx: &mut ToolContext<'_>, input: &ToolInput) -> Result<ToolOutput> {
        let metric_name = require_str(input, "metric_name")?;

        match ctx
            .store
            .metric_summary(ctx.profile_id()?, metric_name)
            .await?
        {
            Some(summary) => Ok(ToolOutput::success(summary_text(metric_name, &summary))),
            None => Ok(ToolOutput::failure(format!(
                "No data found for metric: {}",
                metric_name
            ))),
        }
    }
}

pub struct AnalyzeAppUsageTool;

#[async_trait::async_trait]
impl Tool for AnalyzeAppUsageTool {
    fn name(&self) -> &'static str {
        "analyze_app_usage"
    }

    fn description(&self) -> &'static str {
        "Summarize recent app usage by app and by category"
    }

    fn parameters(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "days": { "type": "integer", "description": "Lookback window in days" }
            }
        })
    }

    async fn execute(&self, ctx: &mut ToolContext<'_>, input: &ToolInput) -> Result<ToolOutput> {
        let days = i64_param(input, "days")
            .filter(|d| *d > 0)
            .and_then(|d| u32::try_from(d).ok())
            .unwrap_or(ctx.config.usage_lookback_days);
        let profile_id = ctx.profile_id()?;

        let by_app = ctx.store.usage_by_app(profile_id, days).await?;
        if by_app.is_empty() {
            return Ok(ToolOutput::success(format!(
                "No app usage recorded in the last {} days",
                days
            )));
        }
        let by_category = ctx.store.usage_by_category(profile_id, days).await?;

        let mut text = format!("App usage over the last {} days:\n", days);
        for app in &by_app {
            text.push_str(&format!(
                "- {} ({}): {} sessions, {} minutes\n",
                app.app_name,
                app.category,
                app.sessions,
                minutes(app.total_seconds)
            ));
        }
        text.push_str("By category:\n");
        for category in &by_category {
            text.push_str(&format!(
                "- {}: {} minutes across {} apps\n",
                category.category,
                minutes(category.total_seconds),
                category.unique_apps
            ));
        }

        Ok(ToolOutput::success(text))
    }
}

pub struct AnalyzeAppMetricsTool;

#[async_trait::async_trait]
impl Tool for AnalyzeAppMetricsTool {
    fn name(&self) -> &'static str {
        "analyze_app_metrics"
    }

    fn description(&self) -> &'static str {
        "Analyze metrics for one app after the user confirms"
    }

    fn parameters(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "app_name": { "type": "string", "description": "Name of the app to analyze" },
                "metric_type": {
                    "type": "string",
                    "description": "Type of metrics to analyze (usage, performance, battery, data)"
                }
            },
            "required": ["app_name"]
        })
    }

    async fn execute(&self, ctx: &mut ToolContext<'_>, input: &ToolInput) -> Result<ToolOutput> {
        let app_name = require_str(input, "app_name")?;
        let metric_type = str_param(input, "metric_type")
            .unwrap_or(DEFAULT_APP_METRIC)
            .to_lowercase();

        let Some(app) = ctx.session.find_app(app_name) else {
            return Ok(app_not_found(ctx.session, app_name));
        };

        let prompt = format!(
            "I'm ready to analyze {} metrics for {}. This will access your app usage data. Would you like me to proceed?",
            metric_type, app.name
        );
        let action = PendingAction::AnalyzeAppMetrics {
            app_name: app.name.clone(),
            metric_type,
        };

        Ok(propose(ctx.session, action, prompt))
    }
}

#[cfg(test)]
mod tests {
    use super::super::testing::Harness;
    use super::*;

    #[tokio::test]
    async fn test_add_and_analyze_metric() {
        let mut harness = Harness::with_profile().await;

        for (value, ts) in [(40, "2025-03-10 08:00"), (60, "2025-03-10 09:00")] {
            let output = harness
                .call(
                    "add_metrics_data",
                    json!({ "metric_name": "fuel_level", "metric_value": value, "timestamp": ts }),
                )
                .await;
            assert!(output.success, "{}", output.message);
        }

        let output = harness
            .call("analyze_metrics", json!({ "metric_name": "fuel_level" }))
            .await;
        assert_eq!(
            output.message,
            "Analysis for fuel_level:\nCount: 2\nAverage: 50.00\nMin: 40\nMax: 60"
        );

        let output = harness
            .call("analyze_metrics", json!({ "metric_name": "oil" }))
            .await;
        assert_eq!(output.message, "No data found for metric: oil");
    }

    #[tokio::test]
    async fn test_bad_metric_timestamp() {
        let mut harness = Harness::with_profile().await;
        let output = harness
            .call(
                "add_metrics_data",
                json!({ "metric_name": "speed", "metric_value": 1, "timestamp": "yesterday" }),
            )
            .await;
        assert!(!output.success);
    }

    #[tokio::test]
    async fn test_app_usage_after_switch() {
        let mut harness = Harness::with_profile().await;

        let output = harness.call("analyze_app_usage", json!({})).await;
        assert_eq!(output.message, "No app usage recorded in the last 7 days");

        harness.call("switch_app", json!({ "app_name": "spotify" })).await;
        harness.call("confirm_pending_action", json!({})).await;

        let output = harness.call("analyze_app_usage", json!({ "days": 3 })).await;
        assert!(output.message.starts_with("App usage over the last 3 days:"));
        assert!(output.message.contains("- spotify (entertainment): 1 sessions"));
        assert!(output.message.contains("- entertainment:"));
    }

    #[tokio::test]
    async fn test_analyze_app_metrics_is_confirmed_first() {
        let mut harness = Harness::with_profile().await;

        let output = harness
            .call(
                "analyze_app_metrics",
                json!({ "app_name": "wallet", "metric_type": "Battery" }),
            )
            .await;
        assert!(output.message.starts_with("I'm ready to analyze battery metrics for wallet"));
        assert!(matches!(
            harness.session.pending_action.peek(),
            Some(PendingAction::AnalyzeAppMetrics { .. })
        ));

        harness
            .call(
                "add_metrics_data",
                json!({ "metric_name": app_metric_name("wallet", "battery"), "metric_value": 3 }),
            )
            .await;

        let output = harness.call("confirm_pending_action", json!({})).await;
        assert!(output.message.starts_with("Analysis for wallet battery:\nCount: 1"));
    }
}
