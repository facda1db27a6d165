//! Callable function surface
//!
//! Every function the reasoning engine may call is a `Tool`. Tools read and
//! mutate the explicit `SessionContext` and the store, and always answer in
//! natural language. Domain failures (not found, bad input, invalid task id)
//! come back as a failed `ToolOutput`, never as an `Err`.

use crate::config::AssistantConfig;
use crate::error::AssistantError;
use crate::models::{FunctionSpec, ToolInput, ToolOutput, VehicleProfile};
use crate::state::SessionContext;
use crate::store::Store;
use crate::Result;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

pub mod apps;
pub mod calendar;
pub mod metrics;
pub mod profile;
pub mod tasks;
pub mod transactions;

pub const NO_PROFILE_MESSAGE: &str =
    "No vehicle profile is loaded yet. Please look up or create a car with its VIN first.";

/// Everything a function call may touch.
pub struct ToolContext<'a> {
    pub session: &'a mut SessionContext,
    pub store: &'a dyn Store,
    pub config: &'a AssistantConfig,
}

impl ToolContext<'_> {
    pub fn profile(&self) -> Result<&VehicleProfile> {
        self.session
            .profile
            .as_ref()
            .ok_or_else(|| AssistantError::SessionError("no active profile".to_string()))
    }

    pub fn profile_id(&self) -> Result<i64> {
        self.profile().map(|p| p.profile_id)
    }
}

/// Trait for a single callable function
#[async_trait::async_trait]
pub trait Tool: Send + Sync {
    fn name(&self) -> &'static str;
    fn description(&self) -> &'static str;

    /// JSON schema of the arguments
    fn parameters(&self) -> Value {
        json!({ "type": "object", "properties": {} })
    }

    /// Functions answering without a loaded profile override this
    fn requires_profile(&self) -> bool {
        true
    }

    async fn execute(&self, ctx: &mut ToolContext<'_>, input: &ToolInput) -> Result<ToolOutput>;
}

/// Tool registry for looking up and executing functions
pub struct ToolRegistry {
    tools: HashMap<String, Arc<dyn Tool>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self {
            tools: HashMap::new(),
        }
    }

    pub fn register(&mut self, tool: Arc<dyn Tool>) {
        self.tools.insert(tool.name().to_string(), tool);
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn Tool>> {
        self.tools.get(name).cloned()
    }

    /// Registered names, sorted
    pub fn list(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.tools.keys().map(|s| s.as_str()).collect();
        names.sort_unstable();
        names
    }

    pub fn specs(&self) -> Vec<FunctionSpec> {
        self.list()
            .into_iter()
            .filter_map(|name| self.tools.get(name))
            .map(|tool| FunctionSpec {
                name: tool.name().to_string(),
                description: tool.description().to_string(),
                parameters: tool.parameters(),
            })
            .collect()
    }

    /// Look up and run a function, applying the profile guard.
    pub async fn execute(&self, ctx: &mut ToolContext<'_>, input: &ToolInput) -> Result<ToolOutput> {
        let tool = self
            .get(&input.tool_name)
            .ok_or_else(|| AssistantError::ToolNotFound(input.tool_name.clone()))?;

        if tool.requires_profile() && !ctx.session.has_profile() {
            debug!(tool_name = %input.tool_name, "Rejected call without profile");
            return Ok(ToolOutput::failure(NO_PROFILE_MESSAGE));
        }

        ensure_object_parameters(input)?;
        tool.execute(ctx, input).await
    }
}

impl Default for ToolRegistry {
    fn default() -> Self {
        Self::new()
    }
}

// =============================
// Argument helpers
// =============================

fn ensure_object_parameters(input: &ToolInput) -> Result<()> {
    if input.parameters.is_object() || input.parameters.is_null() {
        Ok(())
    } else {
        Err(AssistantError::InvalidToolInput(format!(
            "arguments for {} must be a JSON object",
            input.tool_name
        )))
    }
}

/// Trimmed, non-empty string argument
pub(crate) fn str_param<'a>(input: &'a ToolInput, key: &str) -> Option<&'a str> {
    input
        .parameters
        .get(key)
        .and_then(|v| v.as_str())
        .map(str::trim)
        .filter(|s| !s.is_empty())
}

pub(crate) fn require_str<'a>(input: &'a ToolInput, key: &str) -> Result<&'a str> {
    str_param(input, key).ok_or_else(|| {
        AssistantError::InvalidToolInput(format!("Expected '{}' for {}", key, input.tool_name))
    })
}

/// Integer argument; numeric strings are accepted since speech engines
/// frequently send them.
pub(crate) fn i64_param(input: &ToolInput, key: &str) -> Option<i64> {
    match input.parameters.get(key)? {
        Value::Number(n) => n.as_i64().or_else(|| n.as_f64().map(|f| f as i64)),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

pub(crate) fn f64_param(input: &ToolInput, key: &str) -> Option<f64> {
    match input.parameters.get(key)? {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().trim_start_matches('$').parse().ok(),
        _ => None,
    }
}

pub(crate) fn bool_param(input: &ToolInput, key: &str) -> Option<bool> {
    match input.parameters.get(key)? {
        Value::Bool(b) => Some(*b),
        Value::String(s) => match s.trim().to_lowercase().as_str() {
            "true" | "yes" | "1" => Some(true),
            "false" | "no" | "0" => Some(false),
            _ => None,
        },
        Value::Number(n) => n.as_i64().map(|v| v != 0),
        _ => None,
    }
}

/// Create the registry with every assistant function.
pub fn create_default_registry() -> ToolRegistry {
    let mut registry = ToolRegistry::new();

    // Profile
    registry.register(Arc::new(profile::LookupCarTool));
    registry.register(Arc::new(profile::GetCarDetailsTool));
    registry.register(Arc::new(profile::CreateCarTool));

    // Apps and intent
    registry.register(Arc::new(apps::SwitchAppTool));
    registry.register(Arc::new(apps::GetAppStateTool));
    registry.register(Arc::new(apps::ListAppsTool));
    registry.register(Arc::new(apps::CloseAppTool));
    registry.register(Arc::new(apps::AnalyzeIntentTool));

    // Calendar
    registry.register(Arc::new(calendar::AddCalendarEventTool));
    registry.register(Arc::new(calendar::ListCalendarEventsTool));
    registry.register(Arc::new(calendar::UpdateCalendarEventTool));
    registry.register(Arc::new(calendar::DeleteCalendarEventTool));

    // Metrics
    registry.register(Arc::new(metrics::AddMetricsDataTool));
    registry.register(Arc::new(metrics::AnalyzeMetricsTool));
    registry.register(Arc::new(metrics::AnalyzeAppUsageTool));
    registry.register(Arc::new(metrics::AnalyzeAppMetricsTool));

    // Transactions
    registry.register(Arc::new(transactions::CreateTransactionTool));
    registry.register(Arc::new(transactions::ListTransactionsTool));
    registry.register(Arc::new(transactions::TransactionHistoryTool));

    // Approvals
    registry.register(Arc::new(tasks::ListPendingTasksTool));
    registry.register(Arc::new(tasks::ApproveTaskTool));
    registry.register(Arc::new(tasks::RejectTaskTool));
    registry.register(Arc::new(tasks::ConfirmPendingActionTool));
    registry.register(Arc::new(tasks::CancelPendingActionTool));

    registry
}


#[cfg(test)]
mod tests {
    use super::testing::Harness;
    use super::*;

    #[test]
    fn test_default_registry_lists_every_function() {
        let registry = create_default_registry();
        let names = registry.list();

        for expected in [
            "lookup_car",
            "create_car",
            "switch_app",
            "analyze_intent",
            "add_calendar_event",
            "delete_calendar_event",
            "analyze_app_metrics",
            "create_transaction",
            "approve_task",
            "confirm_pending_action",
        ] {
            assert!(names.contains(&expected), "{expected} missing");
        }
        assert_eq!(names.len(), 24);

        let specs = registry.specs();
        assert!(specs.iter().all(|s| s.parameters["type"] == "object"));
    }

    #[test]
    fn test_numeric_params_accept_strings() {
        let input = ToolInput {
            tool_name: "approve_task".to_string(),
            parameters: json!({ "task_id": "7", "amount": "$12.50", "reminder": "yes" }),
        };
        assert_eq!(i64_param(&input, "task_id"), Some(7));
        assert_eq!(f64_param(&input, "amount"), Some(12.5));
        assert_eq!(bool_param(&input, "reminder"), Some(true));
        assert!(str_param(&input, "missing").is_none());
    }

    #[tokio::test]
    async fn test_guard_without_profile() {
        let mut harness = Harness::new().await;

        let output = harness.call("list_calendar_events", json!({})).await;
        assert!(!output.success);
        assert_eq!(output.message, NO_PROFILE_MESSAGE);

        let output = harness.call("get_app_state", json!({})).await;
        assert!(output.success);
    }

    #[tokio::test]
    async fn test_unknown_function_is_an_error() {
        let harness = Harness::new().await;
        let mut session = harness.session.clone();
        let mut ctx = ToolContext {
            session: &mut session,
            store: &harness.store,
            config: &harness.config,
        };
        let input = ToolInput {
            tool_name: "fly_to_moon".to_string(),
            parameters: json!({}),
        };

        let err = harness.registry.execute(&mut ctx, &input).await.unwrap_err();
        assert!(matches!(err, AssistantError::ToolNotFound(_)));
    }
}
