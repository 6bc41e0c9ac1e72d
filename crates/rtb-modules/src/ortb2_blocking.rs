//! Advertiser and category blocking driven by account configuration.
//!
//! The bidder request hook pushes the account's `badv`/`bcat` lists into each
//! bidder request and remembers the blocked domains in the module context;
//! the raw bidder response hook then drops bids advertising a blocked domain.

use std::sync::Arc;

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use rtb_hooks::execution::{BidderRequest, RawBidderResponse};
use rtb_hooks::hooks::ActivityResult;
use rtb_hooks::{
    BidderInvocationContext, BidderRequestPayload, BidderResponsePayload, Hook, InvocationResult,
    Module, ModuleHooks, Tags,
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::debug;

pub const MODULE_CODE: &str = "ortb2-blocking";
pub const BIDDER_REQUEST_HOOK: &str = "ortb2-blocking-bidder-request";
pub const RAW_BIDDER_RESPONSE_HOOK: &str = "ortb2-blocking-raw-bidder-response";

/// Account configuration of the module
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BlockingConfig {
    /// Blocked advertiser domains
    #[serde(default)]
    pub badv: Vec<String>,
    /// Blocked IAB content categories
    #[serde(default)]
    pub bcat: Vec<String>,
}

impl BlockingConfig {
    fn from_account(config: Option<&Value>) -> Result<Self> {
        match config {
            Some(config) => serde_json::from_value(config.clone())
                .context("Invalid ortb2-blocking account config"),
            None => Ok(Self::default()),
        }
    }

    fn is_empty(&self) -> bool {
        self.badv.is_empty() && self.bcat.is_empty()
    }
}

pub struct Ortb2BlockingModule;

impl Module for Ortb2BlockingModule {
    fn code(&self) -> &str {
        MODULE_CODE
    }

    fn register_hooks(&self, hooks: &mut ModuleHooks<'_>) -> Result<()> {
        hooks.add::<BidderRequest>(Arc::new(BlockingBidderRequestHook))?;
        hooks.add::<RawBidderResponse>(Arc::new(BlockingRawBidderResponseHook))
    }
}

pub struct BlockingBidderRequestHook;

#[async_trait]
impl Hook<BidderRequestPayload, BidderInvocationContext> for BlockingBidderRequestHook {
    fn code(&self) -> &str {
        BIDDER_REQUEST_HOOK
    }

    async fn call(
        &self,
        _payload: BidderRequestPayload,
        ctx: BidderInvocationContext,
    ) -> Result<InvocationResult<BidderRequestPayload>> {
        let config = BlockingConfig::from_account(ctx.auction.account_config.as_ref())?;
        if config.is_empty() {
            return Ok(InvocationResult::no_action());
        }

        debug!(
            bidder = %ctx.bidder,
            badv = config.badv.len(),
            bcat = config.bcat.len(),
            "Applying blocking attributes"
        );

        let module_context = json!({ "badv": config.badv });
        Ok(InvocationResult::succeeded(move |payload: &BidderRequestPayload| {
            let mut bid_request = payload.bid_request.clone();
            let Some(request) = bid_request.as_object_mut() else {
                bail!("Bid request is not a JSON object");
            };
            merge_list(request, "badv", &config.badv);
            merge_list(request, "bcat", &config.bcat);
            Ok(BidderRequestPayload { bid_request })
        })
        .with_module_context(module_context))
    }
}

/// Append `values` to the string array `request[field]`, skipping duplicates
fn merge_list(request: &mut serde_json::Map<String, Value>, field: &str, values: &[String]) {
    if values.is_empty() {
        return;
    }

    let mut merged: Vec<String> = request
        .get(field)
        .and_then(Value::as_array)
        .map(|existing| existing.iter().filter_map(|v| v.as_str().map(str::to_string)).collect())
        .unwrap_or_default();
    for value in values {
        if !merged.contains(value) {
            merged.push(value.clone());
        }
    }

    request.insert(field.to_string(), json!(merged));
}

pub struct BlockingRawBidderResponseHook;

#[async_trait]
impl Hook<BidderResponsePayload, BidderInvocationContext> for BlockingRawBidderResponseHook {
    fn code(&self) -> &str {
        RAW_BIDDER_RESPONSE_HOOK
    }

    async fn call(
        &self,
        payload: BidderResponsePayload,
        ctx: BidderInvocationContext,
    ) -> Result<InvocationResult<BidderResponsePayload>> {
        let blocked = blocked_domains(&ctx)?;
        if blocked.is_empty() {
            return Ok(InvocationResult::no_action());
        }

        let removed: Vec<Value> = payload
            .bids
            .iter()
            .filter(|bid| is_blocked(bid, &blocked))
            .map(|bid| bid.get("id").cloned().unwrap_or(Value::Null))
            .collect();
        if removed.is_empty() {
            return Ok(InvocationResult::no_action());
        }

        let tags = Tags::activity(
            "enforce-blocking",
            "success",
            vec![ActivityResult {
                status: "success-blocked".to_string(),
                values: Some(json!({
                    "bidder": ctx.bidder,
                    "removed": removed.len(),
                    "bids": removed,
                })),
            }],
        );

        Ok(InvocationResult::succeeded(move |payload: &BidderResponsePayload| {
            Ok(BidderResponsePayload {
                bids: payload
                    .bids
                    .iter()
                    .filter(|bid| !is_blocked(bid, &blocked))
                    .cloned()
                    .collect(),
            })
        })
        .with_analytics_tags(tags))
    }
}

/// Domains recorded by the bidder request hook, else the account's list
fn blocked_domains(ctx: &BidderInvocationContext) -> Result<Vec<String>> {
    let recorded = ctx
        .auction
        .module_context
        .as_ref()
        .and_then(|module_context| module_context.get("badv"))
        .and_then(Value::as_array);

    match recorded {
        Some(domains) => Ok(domains
            .iter()
            .filter_map(|d| d.as_str().map(str::to_string))
            .collect()),
        None => Ok(BlockingConfig::from_account(ctx.auction.account_config.as_ref())?.badv),
    }
}

fn is_blocked(bid: &Value, blocked: &[String]) -> bool {
    bid.get("adomain")
        .and_then(Value::as_array)
        .map(|domains| {
            domains
                .iter()
                .filter_map(Value::as_str)
                .any(|domain| blocked.iter().any(|b| b == domain))
        })
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rtb_hooks::{
        AuctionInvocationContext, Endpoint, InvocationAction, InvocationContext, Timeout,
    };
    use std::time::Duration;

    fn ctx(
        account_config: Option<Value>,
        module_context: Option<Value>,
    ) -> BidderInvocationContext {
        BidderInvocationContext {
            auction: AuctionInvocationContext {
                base: InvocationContext {
                    timeout: Timeout::new(Duration::from_millis(50)),
                    endpoint: Endpoint::Openrtb2Auction,
                },
                account_id: "acc-1".to_string(),
                debug_enabled: false,
                account_config,
                module_context,
            },
            bidder: "appnexus".to_string(),
        }
    }

    #[tokio::test]
    async fn test_bidder_request_merges_blocking_lists() {
        let hook = BlockingBidderRequestHook;
        let payload = BidderRequestPayload {
            bid_request: json!({"id": "req-1", "badv": ["existing.com"]}),
        };
        let config = json!({"badv": ["bad.com", "existing.com"], "bcat": ["IAB25"]});

        let result = hook.call(payload.clone(), ctx(Some(config), None)).await.unwrap();

        assert_eq!(result.action, Some(InvocationAction::Update));
        assert_eq!(result.module_context, Some(json!({"badv": ["bad.com", "existing.com"]})));
        let updated = (result.payload_update.unwrap())(&payload).unwrap();
        assert_eq!(updated.bid_request["badv"], json!(["existing.com", "bad.com"]));
        assert_eq!(updated.bid_request["bcat"], json!(["IAB25"]));
    }

    #[tokio::test]
    async fn test_bidder_request_without_config_does_nothing() {
        let payload = BidderRequestPayload {
            bid_request: json!({"id": "req-1"}),
        };
        let result = BlockingBidderRequestHook.call(payload, ctx(None, None)).await.unwrap();
        assert_eq!(result.action, Some(InvocationAction::NoAction));
        assert!(result.payload_update.is_none());
    }

    #[tokio::test]
    async fn test_invalid_config_is_an_error() {
        let payload = BidderRequestPayload {
            bid_request: json!({"id": "req-1"}),
        };
        let err = BlockingBidderRequestHook
            .call(payload, ctx(Some(json!({"badv": "not-a-list"})), None))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("Invalid ortb2-blocking account config"));
    }

    #[tokio::test]
    async fn test_non_object_bid_request_fails_update() {
        let payload = BidderRequestPayload { bid_request: json!([]) };
        let result = BlockingBidderRequestHook
            .call(payload.clone(), ctx(Some(json!({"badv": ["bad.com"]})), None))
            .await
            .unwrap();
        let err = (result.payload_update.unwrap())(&payload).unwrap_err();
        assert_eq!(err.to_string(), "Bid request is not a JSON object");
    }

    #[tokio::test]
    async fn test_raw_bidder_response_drops_blocked_bids() {
        let payload = BidderResponsePayload {
            bids: vec![
                json!({"id": "bid-1", "adomain": ["bad.com"]}),
                json!({"id": "bid-2", "adomain": ["good.com"]}),
                json!({"id": "bid-3"}),
            ],
        };

        let result = BlockingRawBidderResponseHook
            .call(payload.clone(), ctx(None, Some(json!({"badv": ["bad.com"]}))))
            .await
            .unwrap();

        let tags = result.analytics_tags.clone().unwrap();
        assert_eq!(tags.activities[0].name, "enforce-blocking");
        assert_eq!(
            tags.activities[0].results[0].values,
            Some(json!({"bidder": "appnexus", "removed": 1, "bids": ["bid-1"]}))
        );

        let updated = (result.payload_update.unwrap())(&payload).unwrap();
        let ids: Vec<&str> = updated.bids.iter().map(|b| b["id"].as_str().unwrap()).collect();
        assert_eq!(ids, vec!["bid-2", "bid-3"]);
    }

    #[tokio::test]
    async fn test_raw_bidder_response_falls_back_to_account_config() {
        let payload = BidderResponsePayload {
            bids: vec![json!({"id": "bid-1", "adomain": ["good.com"]})],
        };
        let result = BlockingRawBidderResponseHook
            .call(payload, ctx(Some(json!({"badv": ["bad.com"]})), None))
            .await
            .unwrap();
        assert_eq!(result.action, Some(InvocationAction::NoAction));
    }
}
