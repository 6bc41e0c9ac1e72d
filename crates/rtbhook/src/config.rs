use anyhow::{Context, Result};
use rtb_hooks::HooksConfig;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

#[derive(Debug, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub hooks: HooksConfig,

    #[serde(default)]
    pub plans: PlanFiles,
}

/// Execution plans kept in their own JSON files. A file, when set, takes
/// precedence over the inline plan of the `[hooks]` section.
#[derive(Debug, Default, Deserialize, Serialize)]
pub struct PlanFiles {
    #[serde(default)]
    pub host: Option<String>,

    #[serde(default)]
    pub default_account: Option<String>,
}

impl Config {
    /// Hooks configuration with plan files read in
    pub fn hooks_config(&self) -> Result<HooksConfig> {
        let mut hooks = self.hooks.clone();
        if let Some(path) = &self.plans.host {
            hooks.host_execution_plan = read_plan(path)?;
        }
        if let Some(path) = &self.plans.default_account {
            hooks.default_account_execution_plan = read_plan(path)?;
        }
        Ok(hooks)
    }
}

fn read_plan(path: &str) -> Result<String> {
    let path = shellexpand::tilde(path).to_string();
    fs::read_to_string(&path).context(format!("Failed to read execution plan: {}", path))
}

/// Load config from file or use defaults
pub fn load_config(path: Option<&Path>) -> Result<Config> {
    if let Some(path) = path {
        let content =
            fs::read_to_string(path).context(format!("Failed to read config file: {:?}", path))?;

        let config: Config = toml::from_str(&content).context("Failed to parse TOML config")?;

        Ok(config)
    } else {
        Ok(Config::default())
    }
}
