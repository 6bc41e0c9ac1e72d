//! Typed payloads threaded through each stage.
//!
//! OpenRTB documents are kept as raw JSON; hooks read and rewrite the parts
//! they care about.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EntrypointPayload {
    #[serde(default)]
    pub query_params: BTreeMap<String, String>,
    #[serde(default)]
    pub headers: BTreeMap<String, String>,
    #[serde(default)]
    pub body: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuctionRequestPayload {
    pub bid_request: Value,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BidderRequestPayload {
    pub bid_request: Value,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BidderResponsePayload {
    #[serde(default)]
    pub bids: Vec<Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AllProcessedBidResponsesPayload {
    #[serde(default)]
    pub bid_responses: Vec<BidderResponse>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuctionResponsePayload {
    pub bid_response: Value,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExitpointPayload {
    #[serde(default)]
    pub headers: BTreeMap<String, String>,
    #[serde(default)]
    pub body: String,
}

/// Request prepared for one bidder
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BidderRequest {
    pub bidder: String,
    pub bid_request: Value,
}

/// Bids returned by one bidder
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BidderResponse {
    pub bidder: String,
    #[serde(default)]
    pub bids: Vec<Value>,
}
