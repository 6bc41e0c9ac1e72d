use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use rtb_hooks::execution::{Entrypoint, RawAuctionRequest};
use rtb_hooks::{
    AuctionInvocationContext, AuctionRequestPayload, EntrypointPayload, Hook, InvocationContext,
    InvocationResult, Module, ModuleHooks,
};
use serde_json::Value;
use tracing::debug;

pub const MODULE_CODE: &str = "request-guard";
pub const ENTRYPOINT_HOOK: &str = "request-guard-entrypoint";
pub const RAW_AUCTION_REQUEST_HOOK: &str = "request-guard-raw-auction-request";

/// Cheap sanity checks that stop obviously unusable requests early
pub struct RequestGuardModule;

impl Module for RequestGuardModule {
    fn code(&self) -> &str {
        MODULE_CODE
    }

    fn register_hooks(&self, hooks: &mut ModuleHooks<'_>) -> Result<()> {
        hooks.add::<Entrypoint>(Arc::new(EmptyBodyGuard))?;
        hooks.add::<RawAuctionRequest>(Arc::new(ImpressionGuard))
    }
}

pub struct EmptyBodyGuard;

#[async_trait]
impl Hook<EntrypointPayload, InvocationContext> for EmptyBodyGuard {
    fn code(&self) -> &str {
        ENTRYPOINT_HOOK
    }

    async fn call(
        &self,
        payload: EntrypointPayload,
        ctx: InvocationContext,
    ) -> Result<InvocationResult<EntrypointPayload>> {
        if payload.body.trim().is_empty() {
            debug!(endpoint = %ctx.endpoint, "Rejecting request with empty body");
            return Ok(InvocationResult::rejected("Request body is empty"));
        }
        Ok(InvocationResult::no_action())
    }
}

pub struct ImpressionGuard;

#[async_trait]
impl Hook<AuctionRequestPayload, AuctionInvocationContext> for ImpressionGuard {
    fn code(&self) -> &str {
        RAW_AUCTION_REQUEST_HOOK
    }

    async fn call(
        &self,
        payload: AuctionRequestPayload,
        _ctx: AuctionInvocationContext,
    ) -> Result<InvocationResult<AuctionRequestPayload>> {
        let has_imps = payload
            .bid_request
            .get("imp")
            .and_then(Value::as_array)
            .is_some_and(|imps| !imps.is_empty());
        if !has_imps {
            return Ok(InvocationResult::rejected("Bid request has no impressions"));
        }

        let result = InvocationResult::no_action();
        if payload.bid_request.get("id").and_then(Value::as_str).is_none() {
            return Ok(result.with_warnings(vec!["Bid request has no id".to_string()]));
        }
        Ok(result)
    }
}
