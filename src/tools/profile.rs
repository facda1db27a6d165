//! Vehicle profile functions

use super::{i64_param, require_str, Tool, ToolContext};
use crate::error::AssistantError;
use crate::models::{ToolInput, ToolOutput, VehicleProfile};
use crate::store::DEFAULT_APP_CATALOG;
use crate::Result;
use serde_json::{json, Value};
use tracing::info;

async fn activate(ctx: &mut ToolContext<'_>, profile: VehicleProfile) -> Result<()> {
    let apps = ctx.store.apps_for_profile(profile.profile_id).await?;
    let pending = ctx.store.pending_tasks(profile.profile_id).await?;

    info!(
        profile_id = profile.profile_id,
        apps = apps.len(),
        pending_tasks = pending.len(),
        "Profile loaded"
    );

    ctx.session.load_profile(profile, apps, pending);
    Ok(())
}

pub struct LookupCarTool;

#[async_trait::async_trait]
impl Tool for LookupCarTool {
    fn name(&self) -> &'static str {
        "lookup_car"
    }

    fn description(&self) -> &'static str {
        "Look up a car by its VIN and make it the active profile"
    }

    fn parameters(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "vin": { "type": "string", "description": "VIN of the car to look up" }
            },
            "required": ["vin"]
        })
    }

    fn requires_profile(&self) -> bool {
        false
    }

    async fn execute(&self, ctx: &mut ToolContext<'_>, input: &ToolInput) -> Result<ToolOutput> {
        let vin = require_str(input, "vin")?;
        info!(vin, "Looking up car");

        let Some(profile) = ctx.store.vehicle_by_vin(vin).await? else {
            return Ok(ToolOutput::failure("Car not found"));
        };

        activate(ctx, profile).await?;
        Ok(ToolOutput::success(format!(
            "The car details are: {}",
            ctx.session.profile_summary()
        )))
    }
}

pub struct GetCarDetailsTool;

#[async_trait::async_trait]
impl Tool for GetCarDetailsTool {
    fn name(&self) -> &'static str {
        "get_car_details"
    }

    fn description(&self) -> &'static str {
        "Get the details of the active car"
    }

    async fn execute(&self, ctx: &mut ToolContext<'_>, _input: &ToolInput) -> Result<ToolOutput> {
        Ok(ToolOutput::success(format!(
            "The car details are: {}",
            ctx.session.profile_summary()
        )))
    }
}

pub struct CreateCarTool;

#[async_trait::async_trait]
impl Tool for CreateCarTool {
    fn name(&self) -> &'static str {
        "create_car"
    }

    fn description(&self) -> &'static str {
        "Register a new car and make it the active profile"
    }

    fn parameters(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "vin": { "type": "string", "description": "VIN of the car" },
                "make": { "type": "string", "description": "Make of the car" },
                "model": { "type": "string", "description": "Model of the car" },
                "year": { "type": "integer", "description": "Model year" }
            },
            "required": ["vin", "make", "model", "year"]
        })
    }

    fn requires_profile(&self) -> bool {
        false
    }

    async fn execute(&self, ctx: &mut ToolContext<'_>, input: &ToolInput) -> Result<ToolOutput> {
        let vin = require_str(input, "vin")?;
        let make = require_str(input, "make")?;
        let model = require_str(input, "model")?;
        let year = i64_param(input, "year").ok_or_else(|| {
            AssistantError::InvalidToolInput("Expected integer 'year' for create_car".to_string())
        })?;

        info!(vin, make, model, year, "Creating car");

        let Some(profile) = ctx.store.create_vehicle(vin, make, model, year).await? else {
            return Ok(ToolOutput::failure(
                "Failed to create car: a car with this VIN is already registered",
            ));
        };

        ctx.store
            .seed_apps(profile.profile_id, DEFAULT_APP_CATALOG)
            .await?;
        activate(ctx, profile).await?;

        Ok(ToolOutput::success(format!(
            "Car created! {} apps are set up. What would you like to do?",
            ctx.session.apps.len()
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::super::testing::{Harness, TEST_VIN};
    use crate::store::Store;
    use serde_json::json;

    #[tokio::test]
    async fn test_unknown_vin_is_not_found_and_changes_nothing() {
        let mut harness = Harness::new().await;

        let output = harness.call("lookup_car", json!({ "vin": "NOPE123" })).await;
        assert!(!output.success);
        assert_eq!(output.message, "Car not found");
        assert!(!harness.session.has_profile());
        assert!(harness.store.vehicle_by_vin("NOPE123").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_create_then_lookup_returns_same_car() {
        let mut harness = Harness::with_profile().await;
        let created = harness.session.profile.clone().unwrap();
        assert!(!harness.session.apps.is_empty());

        let output = harness.call("lookup_car", json!({ "vin": TEST_VIN })).await;
        assert!(output.success);
        assert!(output.message.contains("make: Honda"));
        assert!(output.message.contains("year: 2003"));
        assert_eq!(harness.session.profile, Some(created));
    }

    #[tokio::test]
    async fn test_duplicate_vin_fails() {
        let mut harness = Harness::with_profile().await;
        let output = harness
            .call(
                "create_car",
                json!({ "vin": TEST_VIN, "make": "Ford", "model": "Focus", "year": "2010" }),
            )
            .await;
        assert!(!output.success);
        assert!(output.message.starts_with("Failed to create car"));
    }

    #[tokio::test]
    async fn test_get_car_details() {
        let mut harness = Harness::with_profile().await;
        let output = harness.call("get_car_details", json!({})).await;
        assert!(output.message.contains(&format!("vin: {}", TEST_VIN)));
    }
}
