use std::any::Any;
use std::marker::PhantomData;
use std::sync::Arc;

use anyhow::{bail, Result};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use tracing::info;

use crate::execution::{HookId, Stage, StageHook, StageKind};
use crate::hooks::{Hook, HookProvider};

/// A named bundle of hooks, registered into the catalog in one go
pub trait Module: Send + Sync {
    /// Module code, the `module-code` half of every hook id it registers
    fn code(&self) -> &str;

    fn register_hooks(&self, hooks: &mut ModuleHooks<'_>) -> Result<()>;
}

/// Registration handle passed to [`Module::register_hooks`]
pub struct ModuleHooks<'a> {
    catalog: &'a HookCatalog,
    module_code: String,
}

impl ModuleHooks<'_> {
    /// Register `hook` for the stage of kind `K` under this module's code
    pub fn add<K: StageKind>(&mut self, hook: StageHook<K>) -> Result<()> {
        self.catalog.register::<K>(&self.module_code, hook)
    }
}

/// All hook implementations known to the host, keyed by stage and hook id.
///
/// The same hook id may appear under several stages, each with its own
/// implementation typed for that stage.
pub struct HookCatalog {
    hooks: DashMap<(Stage, HookId), Box<dyn Any + Send + Sync>>,
}

impl HookCatalog {
    pub fn new() -> Self {
        Self { hooks: DashMap::new() }
    }

    /// Register a hook for stage kind `K`. Fails if the id is already taken
    /// for that stage.
    pub fn register<K: StageKind>(&self, module_code: &str, hook: StageHook<K>) -> Result<()> {
        let hook_id = HookId::new(module_code, hook.code());
        let key = (K::STAGE, hook_id.clone());

        match self.hooks.entry(key) {
            Entry::Occupied(_) => {
                bail!("Hook already registered: stage={}, hookId={}", K::STAGE, hook_id)
            }
            Entry::Vacant(slot) => {
                slot.insert(Box::new(hook));
            }
        }

        info!(stage = %K::STAGE, hook = %hook_id, "Registered hook");
        Ok(())
    }

    pub fn register_module(&self, module: &dyn Module) -> Result<()> {
        let mut hooks = ModuleHooks {
            catalog: self,
            module_code: module.code().to_string(),
        };
        module.register_hooks(&mut hooks)
    }

    pub fn hook_by_id<K: StageKind>(&self, hook_id: &HookId) -> Option<StageHook<K>> {
        self.hooks
            .get(&(K::STAGE, hook_id.clone()))
            .and_then(|entry| entry.value().downcast_ref::<StageHook<K>>().cloned())
    }

    pub fn contains(&self, stage: Stage, hook_id: &HookId) -> bool {
        self.hooks.contains_key(&(stage, hook_id.clone()))
    }

    /// Every registered (stage, hook id), in stage order
    pub fn hook_ids(&self) -> Vec<(Stage, HookId)> {
        let mut ids: Vec<_> = self.hooks.iter().map(|entry| entry.key().clone()).collect();
        ids.sort();
        ids
    }

    /// Hook lookup restricted to stage kind `K`
    pub fn provider<K: StageKind>(&self) -> StageHookProvider<'_, K> {
        StageHookProvider {
            catalog: self,
            _kind: PhantomData,
        }
    }

    pub fn len(&self) -> usize {
        self.hooks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.hooks.is_empty()
    }
}

impl Default for HookCatalog {
    fn default() -> Self {
        Self::new()
    }
}

pub struct StageHookProvider<'a, K> {
    catalog: &'a HookCatalog,
    _kind: PhantomData<fn() -> K>,
}

impl<K: StageKind> HookProvider<K::Payload, K::Context> for StageHookProvider<'_, K> {
    fn hook(&self, id: &HookId) -> Option<Arc<dyn Hook<K::Payload, K::Context>>> {
        self.catalog.hook_by_id::<K>(id)
    }
}
