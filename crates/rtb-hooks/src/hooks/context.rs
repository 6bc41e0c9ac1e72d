use std::time::Duration;

use serde_json::Value;
use tokio::time::Instant;

use crate::auction::AuctionContext;
use crate::execution::{Endpoint, HookId};

/// Deadline handed to a hook so it can budget its own work
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timeout {
    deadline: Instant,
}

impl Timeout {
    /// Deadline `budget` from now
    pub fn new(budget: Duration) -> Self {
        Self {
            deadline: Instant::now() + budget,
        }
    }

    /// Time left before the engine stops waiting for the hook
    pub fn remaining(&self) -> Duration {
        self.deadline.saturating_duration_since(Instant::now())
    }

    pub fn is_expired(&self) -> bool {
        self.remaining().is_zero()
    }
}

/// Context passed to entrypoint hooks
#[derive(Debug, Clone)]
pub struct InvocationContext {
    pub timeout: Timeout,
    pub endpoint: Endpoint,
}

/// Context passed to hooks running once an auction context exists
#[derive(Debug, Clone)]
pub struct AuctionInvocationContext {
    pub base: InvocationContext,
    pub account_id: String,
    pub debug_enabled: bool,
    /// Account configuration of the hook's module
    pub account_config: Option<Value>,
    /// Module state left by earlier hooks of the same module
    pub module_context: Option<Value>,
}

/// Context passed to per-bidder hooks
#[derive(Debug, Clone)]
pub struct BidderInvocationContext {
    pub auction: AuctionInvocationContext,
    pub bidder: String,
}

/// Builds the context for one hook call. Must be cheap and non-blocking.
pub trait InvocationContextProvider<C>: Send + Sync {
    fn context(&self, budget: Duration, hook_id: &HookId, module_context: Option<Value>) -> C;
}

impl<C, F> InvocationContextProvider<C> for F
where
    F: Fn(Duration, &HookId, Option<Value>) -> C + Send + Sync,
{
    fn context(&self, budget: Duration, hook_id: &HookId, module_context: Option<Value>) -> C {
        self(budget, hook_id, module_context)
    }
}

/// Entrypoint contexts: no account is known yet
pub struct EntrypointContextProvider {
    endpoint: Endpoint,
}

impl EntrypointContextProvider {
    pub fn new(endpoint: Endpoint) -> Self {
        Self { endpoint }
    }
}

impl InvocationContextProvider<InvocationContext> for EntrypointContextProvider {
    fn context(
        &self,
        budget: Duration,
        _hook_id: &HookId,
        _module_context: Option<Value>,
    ) -> InvocationContext {
        InvocationContext {
            timeout: Timeout::new(budget),
            endpoint: self.endpoint,
        }
    }
}

pub struct AuctionContextProvider<'a> {
    auction: &'a AuctionContext,
}

impl<'a> AuctionContextProvider<'a> {
    pub fn new(auction: &'a AuctionContext) -> Self {
        Self { auction }
    }
}

impl InvocationContextProvider<AuctionInvocationContext> for AuctionContextProvider<'_> {
    fn context(
        &self,
        budget: Duration,
        hook_id: &HookId,
        module_context: Option<Value>,
    ) -> AuctionInvocationContext {
        AuctionInvocationContext {
            base: InvocationContext {
                timeout: Timeout::new(budget),
                endpoint: self.auction.hook_execution_context.endpoint(),
            },
            account_id: self.auction.account.id.clone(),
            debug_enabled: self.auction.debug_enabled,
            account_config: self.auction.account.module_config(&hook_id.module_code).cloned(),
            module_context,
        }
    }
}

pub struct BidderContextProvider<'a> {
    auction: AuctionContextProvider<'a>,
    bidder: &'a str,
}

impl<'a> BidderContextProvider<'a> {
    pub fn new(auction: &'a AuctionContext, bidder: &'a str) -> Self {
        Self {
            auction: AuctionContextProvider::new(auction),
            bidder,
        }
    }
}

impl InvocationContextProvider<BidderInvocationContext> for BidderContextProvider<'_> {
    fn context(
        &self,
        budget: Duration,
        hook_id: &HookId,
        module_context: Option<Value>,
    ) -> BidderInvocationContext {
        BidderInvocationContext {
            auction: self.auction.context(budget, hook_id, module_context),
            bidder: self.bidder.to_string(),
        }
    }
}
