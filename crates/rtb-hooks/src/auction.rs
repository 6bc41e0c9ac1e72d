use std::sync::Arc;

use serde_json::Value;

use crate::config::Account;
use crate::execution::HookExecutionContext;

/// Request-scoped state available to every post-entrypoint stage
#[derive(Debug, Clone)]
pub struct AuctionContext {
    pub bid_request: Value,
    pub account: Account,
    pub debug_enabled: bool,
    /// Outcomes and module contexts accumulated over the request
    pub hook_execution_context: Arc<HookExecutionContext>,
}

impl AuctionContext {
    pub fn new(
        bid_request: Value,
        account: Account,
        hook_execution_context: Arc<HookExecutionContext>,
    ) -> Self {
        Self {
            bid_request,
            account,
            debug_enabled: false,
            hook_execution_context,
        }
    }

    pub fn with_debug(mut self, debug_enabled: bool) -> Self {
        self.debug_enabled = debug_enabled;
        self
    }
}
