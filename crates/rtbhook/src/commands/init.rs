use anyhow::Result;
use std::path::Path;

const DEFAULT_CONFIG: &str = r#"# rtbhook configuration

[hooks]
# Only run modules the account enables or configures
config_to_invoke_required = false
# Inline JSON plans; left empty when the [plans] files below are used
host_execution_plan = ""
default_account_execution_plan = ""

[hooks.host_module_execution]
# ortb2-blocking = false

[plans]
# host = "~/.rtbhook/host-plan.json"
# default_account = "~/.rtbhook/default-account-plan.json"
"#;

/// Initialize a new config file
pub fn run_init(path: &Path) -> Result<()> {
    if path.exists() {
        anyhow::bail!("Config already exists at {:?}", path);
    }
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, DEFAULT_CONFIG)?;
    println!("Created config at {:?}", path);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_parses() {
        let config: crate::config::Config = toml::from_str(DEFAULT_CONFIG).unwrap();
        assert!(config.plans.host.is_none());
        assert!(config.hooks.host_module_execution.is_empty());
    }

    #[test]
    fn test_init_refuses_to_overwrite() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("rtbhook.toml");
        run_init(&path).unwrap();
        assert!(path.exists());
        assert!(run_init(&path).is_err());
    }
}
