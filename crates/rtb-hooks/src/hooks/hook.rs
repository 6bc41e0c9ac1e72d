use std::collections::HashMap;
use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;

use super::invocation::InvocationResult;
use crate::execution::HookId;

/// Pluggable unit of work invoked at one stage of request processing.
///
/// `P` is the stage payload, `C` the invocation context built for every call.
/// Returning `Err` or panicking never aborts the request: the engine records
/// the failure against this hook and carries on with the unchanged payload.
#[async_trait]
pub trait Hook<P: Send + 'static, C: Send + 'static>: Send + Sync {
    /// Hook implementation code, unique within its module
    fn code(&self) -> &str;

    /// Inspect the payload and describe what should happen to it
    async fn call(&self, payload: P, ctx: C) -> Result<InvocationResult<P>>;
}

/// Resolves a hook id to a concrete hook for one stage
pub trait HookProvider<P: Send + 'static, C: Send + 'static>: Send + Sync {
    fn hook(&self, id: &HookId) -> Option<Arc<dyn Hook<P, C>>>;
}

impl<P: Send + 'static, C: Send + 'static> HookProvider<P, C>
    for HashMap<HookId, Arc<dyn Hook<P, C>>>
{
    fn hook(&self, id: &HookId) -> Option<Arc<dyn Hook<P, C>>> {
        self.get(id).cloned()
    }
}
