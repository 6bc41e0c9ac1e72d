use std::collections::HashMap;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::execution::ExecutionPlan;

/// Host-wide hooks configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HooksConfig {
    /// JSON execution plan applied to every request
    #[serde(default)]
    pub host_execution_plan: String,

    /// JSON execution plan for accounts that do not carry their own
    #[serde(default)]
    pub default_account_execution_plan: String,

    /// Module enablement that accounts cannot override
    #[serde(default)]
    pub host_module_execution: HashMap<String, bool>,

    /// Only run modules the account explicitly enables or configures
    #[serde(default)]
    pub config_to_invoke_required: bool,
}

impl HooksConfig {
    pub fn from_toml_str(content: &str) -> Result<Self> {
        toml::from_str(content).context("Failed to parse hooks config")
    }
}

/// Publisher account, as far as hooks are concerned
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Account {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hooks: Option<AccountHooksConfig>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct AccountHooksConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub execution_plan: Option<ExecutionPlan>,

    /// Per-module configuration, handed to that module's hooks
    #[serde(default)]
    pub modules: HashMap<String, Value>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub admin: Option<HooksAdminConfig>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct HooksAdminConfig {
    #[serde(default)]
    pub module_execution: HashMap<String, bool>,
}

impl Account {
    /// Account without any hooks configuration
    pub fn empty(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            hooks: None,
        }
    }

    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json).context("Failed to parse account")
    }

    pub fn execution_plan(&self) -> Option<&ExecutionPlan> {
        self.hooks.as_ref()?.execution_plan.as_ref()
    }

    pub fn module_config(&self, module_code: &str) -> Option<&Value> {
        self.hooks.as_ref()?.modules.get(module_code)
    }

    /// Codes of every module the account configures
    pub fn configured_modules(&self) -> impl Iterator<Item = &str> {
        self.hooks
            .iter()
            .flat_map(|hooks| hooks.modules.keys().map(String::as_str))
    }

    pub fn module_execution(&self) -> Option<&HashMap<String, bool>> {
        Some(&self.hooks.as_ref()?.admin.as_ref()?.module_execution)
    }
}
