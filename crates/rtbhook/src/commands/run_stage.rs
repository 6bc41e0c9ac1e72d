use crate::config::Config;
use anyhow::{Context, Result};
use rtb_hooks::{
    Account, AllProcessedBidResponsesPayload, AuctionContext, BidderRequest, BidderResponse,
    BidderResponsePayload, Endpoint, EntrypointPayload, ExitpointPayload, HookExecutionContext,
    HookStageExecutionResult, HookStageExecutor, Stage,
};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{json, Value};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::info;

pub struct RunStageArgs {
    pub stage: Stage,
    pub payload: PathBuf,
    pub account: Option<PathBuf>,
    pub endpoint: Endpoint,
    pub bidder: Option<String>,
}

pub async fn execute(args: RunStageArgs, config: &Config) -> Result<()> {
    info!(stage = %args.stage, endpoint = %args.endpoint, "Running stage");

    let catalog = rtb_modules::builtin_catalog()?;
    let executor = HookStageExecutor::new(&config.hooks_config()?, Arc::new(catalog))?;

    let payload: Value = read_json(&args.payload)?;
    let account = match &args.account {
        Some(path) => read_json::<Account>(path)?,
        None => Account::empty(""),
    };

    let execution_context = Arc::new(HookExecutionContext::new(args.endpoint));
    let output = run(&executor, &args, payload, account, execution_context.clone()).await?;

    let report = json!({
        "result": output,
        "outcomes": execution_context.all_stage_outcomes(),
    });
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}

async fn run(
    executor: &HookStageExecutor,
    args: &RunStageArgs,
    payload: Value,
    account: Account,
    execution_context: Arc<HookExecutionContext>,
) -> Result<Value> {
    let stage = args.stage;

    // auction request stages run over the bid request itself
    let bid_request = match stage {
        Stage::RawAuctionRequest | Stage::ProcessedAuctionRequest => payload.clone(),
        _ => json!({}),
    };
    let auction = AuctionContext::new(bid_request, account, execution_context.clone());

    match stage {
        Stage::Entrypoint => {
            let payload: EntrypointPayload = from_payload(payload, stage)?;
            let result = executor
                .execute_entrypoint_stage(
                    payload.query_params,
                    payload.headers,
                    payload.body,
                    &execution_context,
                )
                .await;
            render(result)
        }
        Stage::RawAuctionRequest => {
            render(executor.execute_raw_auction_request_stage(&auction).await)
        }
        Stage::ProcessedAuctionRequest => {
            render(executor.execute_processed_auction_request_stage(&auction).await)
        }
        Stage::BidderRequest => {
            let bidder_request = BidderRequest {
                bidder: required_bidder(args)?,
                bid_request: payload,
            };
            render(executor.execute_bidder_request_stage(&bidder_request, &auction).await)
        }
        Stage::RawBidderResponse | Stage::ProcessedBidderResponse => {
            let bids: BidderResponsePayload = from_payload(payload, stage)?;
            let bidder_response = BidderResponse {
                bidder: required_bidder(args)?,
                bids: bids.bids,
            };
            let result = if stage == Stage::RawBidderResponse {
                executor
                    .execute_raw_bidder_response_stage(&bidder_response, &auction)
                    .await
            } else {
                executor
                    .execute_processed_bidder_response_stage(&bidder_response, &auction)
                    .await
            };
            render(result)
        }
        Stage::AllProcessedBidResponses => {
            let responses: AllProcessedBidResponsesPayload = from_payload(payload, stage)?;
            render(
                executor
                    .execute_all_processed_bid_responses_stage(&responses.bid_responses, &auction)
                    .await,
            )
        }
        Stage::AuctionResponse => {
            render(executor.execute_auction_response_stage(payload, &auction).await)
        }
        Stage::Exitpoint => {
            let exitpoint: ExitpointPayload = from_payload(payload, stage)?;
            render(
                executor
                    .execute_exitpoint_stage(exitpoint.headers, exitpoint.body, &auction)
                    .await,
            )
        }
    }
}

fn render<P: Serialize>(result: HookStageExecutionResult<P>) -> Result<Value> {
    Ok(match result {
        HookStageExecutionResult::Success(payload) => json!({
            "status": "success",
            "payload": serde_json::to_value(payload)?,
        }),
        HookStageExecutionResult::Reject => json!({ "status": "reject" }),
    })
}

fn required_bidder(args: &RunStageArgs) -> Result<String> {
    args.bidder
        .clone()
        .context(format!("--bidder is required for stage {}", args.stage))
}

fn from_payload<T: DeserializeOwned>(payload: Value, stage: Stage) -> Result<T> {
    serde_json::from_value(payload).context(format!("Payload does not fit stage {}", stage))
}

fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let content = std::fs::read_to_string(path).context(format!("Failed to read {:?}", path))?;
    serde_json::from_str(&content).context(format!("Failed to parse JSON in {:?}", path))
}
