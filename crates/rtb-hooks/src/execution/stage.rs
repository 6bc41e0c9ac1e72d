use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use anyhow::{anyhow, Result};
use serde::{Deserialize, Serialize};

use crate::hooks::{AuctionInvocationContext, BidderInvocationContext, Hook, InvocationContext};
use crate::payload::{
    AllProcessedBidResponsesPayload, AuctionRequestPayload, AuctionResponsePayload,
    BidderRequestPayload, BidderResponsePayload, EntrypointPayload, ExitpointPayload,
};

/// Points in request processing where a stage execution plan runs
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Entrypoint,
    RawAuctionRequest,
    ProcessedAuctionRequest,
    BidderRequest,
    RawBidderResponse,
    ProcessedBidderResponse,
    AllProcessedBidResponses,
    AuctionResponse,
    Exitpoint,
}

impl Stage {
    pub const ALL: [Stage; 9] = [
        Stage::Entrypoint,
        Stage::RawAuctionRequest,
        Stage::ProcessedAuctionRequest,
        Stage::BidderRequest,
        Stage::RawBidderResponse,
        Stage::ProcessedBidderResponse,
        Stage::AllProcessedBidResponses,
        Stage::AuctionResponse,
        Stage::Exitpoint,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Stage::Entrypoint => "entrypoint",
            Stage::RawAuctionRequest => "raw_auction_request",
            Stage::ProcessedAuctionRequest => "processed_auction_request",
            Stage::BidderRequest => "bidder_request",
            Stage::RawBidderResponse => "raw_bidder_response",
            Stage::ProcessedBidderResponse => "processed_bidder_response",
            Stage::AllProcessedBidResponses => "all_processed_bid_responses",
            Stage::AuctionResponse => "auction_response",
            Stage::Exitpoint => "exitpoint",
        }
    }

    /// Once bids are collected the auction can no longer be rejected
    pub fn reject_allowed(self) -> bool {
        !matches!(
            self,
            Stage::AllProcessedBidResponses | Stage::AuctionResponse | Stage::Exitpoint
        )
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Stage {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        Stage::ALL
            .into_iter()
            .find(|stage| stage.as_str() == s)
            .ok_or_else(|| anyhow!("Unknown stage '{}'", s))
    }
}

/// Binds a stage to the payload and context types its hooks work with
pub trait StageKind: Send + Sync + 'static {
    type Payload: Clone + Send + Sync + 'static;
    type Context: Send + 'static;

    const STAGE: Stage;
}

/// Hook registered for stage kind `K`
pub type StageHook<K> = Arc<dyn Hook<<K as StageKind>::Payload, <K as StageKind>::Context>>;

macro_rules! stage_kind {
    ($(#[$doc:meta])* $name:ident, $stage:expr, $payload:ty, $context:ty) => {
        $(#[$doc])*
        pub struct $name;

        impl StageKind for $name {
            type Payload = $payload;
            type Context = $context;

            const STAGE: Stage = $stage;
        }
    };
}

stage_kind!(
    /// Raw HTTP request, before any parsing
    Entrypoint, Stage::Entrypoint, EntrypointPayload, InvocationContext
);
stage_kind!(
    RawAuctionRequest,
    Stage::RawAuctionRequest,
    AuctionRequestPayload,
    AuctionInvocationContext
);
stage_kind!(
    /// Bid request after stored-request merging and validation
    ProcessedAuctionRequest,
    Stage::ProcessedAuctionRequest,
    AuctionRequestPayload,
    AuctionInvocationContext
);
stage_kind!(
    BidderRequest,
    Stage::BidderRequest,
    BidderRequestPayload,
    BidderInvocationContext
);
stage_kind!(
    RawBidderResponse,
    Stage::RawBidderResponse,
    BidderResponsePayload,
    BidderInvocationContext
);
stage_kind!(
    ProcessedBidderResponse,
    Stage::ProcessedBidderResponse,
    BidderResponsePayload,
    BidderInvocationContext
);
stage_kind!(
    AllProcessedBidResponses,
    Stage::AllProcessedBidResponses,
    AllProcessedBidResponsesPayload,
    AuctionInvocationContext
);
stage_kind!(
    AuctionResponse,
    Stage::AuctionResponse,
    AuctionResponsePayload,
    AuctionInvocationContext
);
stage_kind!(
    /// HTTP response about to be written
    Exitpoint, Stage::Exitpoint, ExitpointPayload, AuctionInvocationContext
);
