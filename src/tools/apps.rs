//! App switching and intent functions

use super::tasks::propose;
use super::{require_str, Tool, ToolContext};
use crate::models::{ToolInput, ToolOutput};
use crate::state::{AppState, PendingAction, SessionContext};
use crate::Result;
use serde_json::{json, Value};
use tracing::info;

fn app_name_schema(description: &str) -> Value {
    json!({
        "type": "object",
        "properties": {
            "app_name": { "type": "string", "description": description }
        },
        "required": ["app_name"]
    })
}

pub(crate) fn app_not_found(session: &SessionContext, app_name: &str) -> ToolOutput {
    ToolOutput::failure(format!(
        "I couldn't find an app matching '{}'. Available apps are: {}",
        app_name,
        session.app_names().join(", ")
    ))
}

pub struct SwitchAppTool;

#[async_trait::async_trait]
impl Tool for SwitchAppTool {
    fn name(&self) -> &'static str {
        "switch_app"
    }

    fn description(&self) -> &'static str {
        "Switch to an assistant feature (home, calendar, messages, maps, settings, metrics, transactions) or an installed app"
    }

    fn parameters(&self) -> Value {
        app_name_schema("Feature or app to switch to")
    }

    async fn execute(&self, ctx: &mut ToolContext<'_>, input: &ToolInput) -> Result<ToolOutput> {
        let app_name = require_str(input, "app_name")?.to_lowercase();
        info!(app_name = %app_name, "Switching app");

        // An installed app with the exact name wins over the feature of the same name
        let installed = ctx
            .session
            .apps
            .iter()
            .any(|app| app.name.to_lowercase() == app_name);

        if !installed {
            if let Some(state) = AppState::parse(&app_name) {
                ctx.session.app_state = state;
                return Ok(ToolOutput::success(format!(
                    "Successfully switched to {}",
                    state.as_str()
                )));
            }
        }

        let Some(app) = ctx.session.find_app(&app_name) else {
            let features: Vec<&str> = AppState::ALL.iter().map(|s| s.as_str()).collect();
            return Ok(ToolOutput::failure(format!(
                "App '{}' not found. Available features: {}. Installed apps: {}",
                app_name,
                features.join(", "),
                ctx.session.app_names().join(", ")
            )));
        };

        let prompt = format!(
            "I'm ready to switch to {}. Would you like me to proceed?",
            app.name
        );
        let action = PendingAction::SwitchApp {
            app_id: app.app_id,
            app_name: app.name.clone(),
        };

        Ok(propose(ctx.session, action, prompt))
    }
}

pub struct GetAppStateTool;

#[async_trait::async_trait]
impl Tool for GetAppStateTool {
    fn name(&self) -> &'static str {
        "get_app_state"
    }

    fn description(&self) -> &'static str {
        "Get the feature the assistant is currently showing"
    }

    fn requires_profile(&self) -> bool {
        false
    }

    async fn execute(&self, ctx: &mut ToolContext<'_>, _input: &ToolInput) -> Result<ToolOutput> {
        Ok(ToolOutput::success(format!(
            "Currently in {} app",
            ctx.session.app_state.as_str()
        )))
    }
}

pub struct ListAppsTool;

#[async_trait::async_trait]
impl Tool for ListAppsTool {
    fn name(&self) -> &'static str {
        "list_apps"
    }

    fn description(&self) -> &'static str {
        "List the apps installed for the active car"
    }

    async fn execute(&self, ctx: &mut ToolContext<'_>, _input: &ToolInput) -> Result<ToolOutput> {
        if ctx.session.apps.is_empty() {
            return Ok(ToolOutput::success("No apps installed"));
        }

        let mut text = String::from("Installed apps:\n");
        for app in &ctx.session.apps {
            let running = if app.is_running { ", running" } else { "" };
            text.push_str(&format!("- {} ({}{})\n", app.name, app.category, running));
        }
        Ok(ToolOutput::success(text))
    }
}

pub struct CloseAppTool;

#[async_trait::async_trait]
impl Tool for CloseAppTool {
    fn name(&self) -> &'static str {
        "close_app"
    }

    fn description(&self) -> &'static str {
        "Close a running app and record how long it was used"
    }

    fn parameters(&self) -> Value {
        app_name_schema("App to close")
    }

    async fn execute(&self, ctx: &mut ToolContext<'_>, input: &ToolInput) -> Result<ToolOutput> {
        let app_name = require_str(input, "app_name")?;
        let profile_id = ctx.profile_id()?;

        let Some(app) = ctx.session.find_app(app_name) else {
            return Ok(app_not_found(ctx.session, app_name));
        };
        let (app_id, name) = (app.app_id, app.name.clone());

        if !ctx.store.close_app(profile_id, app_id).await? {
            return Ok(ToolOutput::failure(format!("{} is not running", name)));
        }

        ctx.session.apps = ctx.store.apps_for_profile(profile_id).await?;
        info!(app = %name, "App closed");
        Ok(ToolOutput::success(format!("Closed {}", name)))
    }
}

pub struct AnalyzeIntentTool;

#[async_trait::async_trait]
impl Tool for AnalyzeIntentTool {
    fn name(&self) -> &'static str {
        "analyze_intent"
    }

    fn description(&self) -> &'static str {
        "Analyze the user's message to decide whether it is a task request"
    }

    fn parameters(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "message": { "type": "string", "description": "The user's message" }
            },
            "required": ["message"]
        })
    }

    fn requires_profile(&self) -> bool {
        false
    }

    async fn execute(&self, ctx: &mut ToolContext<'_>, input: &ToolInput) -> Result<ToolOutput> {
        let message = require_str(input, "message")?;
        let analysis = ctx.session.classifier().classify(message);
        info!(
            task_type = %analysis.task_type,
            confidence = analysis.confidence.as_str(),
            "Intent analyzed"
        );

        Ok(ToolOutput::success(serde_json::to_string(&analysis)?))
    }
}

#[cfg(test)]
mod tests {
    use super::super::testing::Harness;
    use crate::classifier::{Confidence, IntentAnalysis};
    use crate::state::{AppState, PendingAction};
    use crate::store::Store;
    use serde_json::json;

    #[tokio::test]
    async fn test_switch_to_feature_is_immediate() {
        let mut harness = Harness::with_profile().await;

        let output = harness
            .call("switch_app", json!({ "app_name": "Metrics" }))
            .await;
        assert_eq!(output.message, "Successfully switched to metrics");
        assert_eq!(harness.session.app_state, AppState::Metrics);
        assert!(harness.session.pending_action.is_empty());

        let output = harness.call("get_app_state", json!({})).await;
        assert_eq!(output.message, "Currently in metrics app");
    }

    #[tokio::test]
    async fn test_feature_switch_when_app_not_installed() {
        let mut harness = Harness::with_profile().await;
        harness.session.apps.clear();

        let output = harness.call("switch_app", json!({ "app_name": "maps" })).await;
        assert_eq!(output.message, "Successfully switched to maps");
        assert_eq!(harness.session.app_state, AppState::Maps);
    }

    #[tokio::test]
    async fn test_installed_app_sharing_a_feature_name_is_opened() {
        let mut harness = Harness::with_profile().await;

        let output = harness.call("switch_app", json!({ "app_name": "maps" })).await;
        assert!(output.message.contains("switch to maps"));
        assert!(matches!(
            harness.session.pending_action.peek(),
            Some(PendingAction::SwitchApp { app_name, .. }) if app_name == "maps"
        ));

        let output = harness.call("confirm_pending_action", json!({})).await;
        assert_eq!(output.message, "Switched to maps");
        assert_eq!(harness.session.app_state, AppState::Maps);
        assert!(harness
            .session
            .apps
            .iter()
            .any(|a| a.name == "maps" && a.is_running));

        let profile_id = harness.session.profile.as_ref().unwrap().profile_id;
        let usage = harness.store.usage_by_app(profile_id, 7).await.unwrap();
        assert!(usage.iter().any(|u| u.app_name == "maps"));

        let output = harness.call("close_app", json!({ "app_name": "maps" })).await;
        assert_eq!(output.message, "Closed maps");
    }

    #[tokio::test]
    async fn test_switch_to_installed_app_waits_for_confirmation() {
        let mut harness = Harness::with_profile().await;

        let output = harness.call("switch_app", json!({ "app_name": "spot" })).await;
        assert!(output.success);
        assert!(output.message.contains("switch to spotify"));
        assert!(matches!(
            harness.session.pending_action.peek(),
            Some(PendingAction::SwitchApp { app_name, .. }) if app_name == "spotify"
        ));
        assert!(harness.session.apps.iter().all(|a| !a.is_running));
    }

    #[tokio::test]
    async fn test_switch_to_unknown_app() {
        let mut harness = Harness::with_profile().await;
        let output = harness
            .call("switch_app", json!({ "app_name": "netflix" }))
            .await;
        assert!(!output.success);
        assert!(output.message.contains("not found"));
        assert!(output.message.contains("spotify"));
    }

    #[tokio::test]
    async fn test_close_app_that_is_not_running() {
        let mut harness = Harness::with_profile().await;
        let output = harness.call("close_app", json!({ "app_name": "maps" })).await;
        assert!(!output.success);
        assert_eq!(output.message, "maps is not running");
    }

    #[tokio::test]
    async fn test_analyze_intent_uses_installed_apps() {
        let mut harness = Harness::with_profile().await;
        let output = harness
            .call("analyze_intent", json!({ "message": "open spotify" }))
            .await;

        let analysis: IntentAnalysis = serde_json::from_str(&output.message).unwrap();
        assert!(analysis.is_task);
        assert_eq!(analysis.task_type, "entertainment");
        assert_eq!(analysis.confidence, Confidence::High);
    }

    #[tokio::test]
    async fn test_list_apps() {
        let mut harness = Harness::with_profile().await;
        let output = harness.call("list_apps", json!({})).await;
        assert!(output.message.contains("- wallet (finance)"));
    }
}
