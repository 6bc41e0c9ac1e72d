use std::collections::HashMap;

/// Which modules may run for one request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModulesExecution {
    modules: HashMap<String, bool>,
    default_enabled: bool,
}

impl ModulesExecution {
    pub fn new(modules: HashMap<String, bool>, default_enabled: bool) -> Self {
        Self {
            modules,
            default_enabled,
        }
    }

    /// Every module enabled
    pub fn all_enabled() -> Self {
        Self::new(HashMap::new(), true)
    }

    pub fn is_enabled(&self, module_code: &str) -> bool {
        self.modules
            .get(module_code)
            .copied()
            .unwrap_or(self.default_enabled)
    }
}

impl Default for ModulesExecution {
    fn default() -> Self {
        Self::all_enabled()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_explicit_entries_win_over_default() {
        let modules = ModulesExecution::new(
            HashMap::from([("alpha".to_string(), false), ("beta".to_string(), true)]),
            false,
        );
        assert!(!modules.is_enabled("alpha"));
        assert!(modules.is_enabled("beta"));
        assert!(!modules.is_enabled("gamma"));
        assert!(ModulesExecution::all_enabled().is_enabled("gamma"));
    }
}
