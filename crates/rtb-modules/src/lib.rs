pub mod ortb2_blocking;
pub mod request_guard;

pub use ortb2_blocking::Ortb2BlockingModule;
pub use request_guard::RequestGuardModule;

use anyhow::Result;
use rtb_hooks::HookCatalog;

/// Register every built-in module on the catalog.
pub fn register_builtin_modules(catalog: &HookCatalog) -> Result<()> {
    catalog.register_module(&Ortb2BlockingModule)?;
    catalog.register_module(&RequestGuardModule)?;
    Ok(())
}

/// Catalog holding the built-in modules only.
pub fn builtin_catalog() -> Result<HookCatalog> {
    let catalog = HookCatalog::new();
    register_builtin_modules(&catalog)?;
    Ok(catalog)
}
