use anyhow::{Context, Result};
use rtb_hooks::ExecutionPlan;
use std::path::Path;
use tracing::info;

/// Parse a plan file and check every hook it names against the built-in modules
pub fn execute(plan_file: &Path) -> Result<()> {
    let content = std::fs::read_to_string(plan_file)
        .context(format!("Failed to read plan file: {:?}", plan_file))?;

    let plan = ExecutionPlan::parse(&content)?;
    let catalog = rtb_modules::builtin_catalog()?;
    plan.validate(&catalog)?;

    let groups: usize = plan
        .endpoints
        .values()
        .flat_map(|endpoint| endpoint.stages.values())
        .map(|stage| stage.groups.len())
        .sum();
    info!(?plan_file, endpoints = plan.endpoints.len(), groups, "Plan validated");

    println!(
        "Plan is valid: {} endpoint(s), {} group(s)",
        plan.endpoints.len(),
        groups
    );
    Ok(())
}
