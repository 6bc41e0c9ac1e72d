use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use anyhow::Result;
use serde_json::Value;
use tracing::info;

use super::ab_test::AbTestHookProvider;
use super::modules::ModulesExecution;
use super::outcome::HookExecutionContext;
use super::plan::{AbTest, Endpoint, ExecutionPlan, StageExecutionPlan};
use super::stage::{self, Stage, StageKind};
use super::stage_executor::{HookStageExecutionResult, StageExecutor};
use crate::auction::AuctionContext;
use crate::catalog::HookCatalog;
use crate::config::{Account, HooksConfig};
use crate::hooks::{
    AuctionContextProvider, BidderContextProvider, EntrypointContextProvider, InvocationContext,
    InvocationContextProvider,
};
use crate::payload::{
    AllProcessedBidResponsesPayload, AuctionRequestPayload, AuctionResponsePayload, BidderRequest,
    BidderRequestPayload, BidderResponse, BidderResponsePayload, EntrypointPayload,
    ExitpointPayload,
};

const ENTITY_HTTP_REQUEST: &str = "http-request";
const ENTITY_HTTP_RESPONSE: &str = "http-response";
const ENTITY_AUCTION_REQUEST: &str = "auction-request";
const ENTITY_AUCTION_RESPONSE: &str = "auction-response";
const ENTITY_ALL_PROCESSED_BID_RESPONSES: &str = "all-processed-bid-responses";

/// Entry point of the hooks engine for request processing code.
///
/// One method per stage: each resolves the stage plan for the request's
/// endpoint and account, decides which modules may run or sit out an A/B
/// test, and executes the plan over the stage payload. Outcomes land in the request's
/// [`HookExecutionContext`].
pub struct HookStageExecutor {
    host_execution_plan: ExecutionPlan,
    default_account_execution_plan: ExecutionPlan,
    host_module_execution: HashMap<String, bool>,
    config_to_invoke_required: bool,
    catalog: Arc<HookCatalog>,
}

impl HookStageExecutor {
    /// Parse both configured plans and check every hook they name is known
    pub fn new(config: &HooksConfig, catalog: Arc<HookCatalog>) -> Result<Self> {
        let host_execution_plan = parse_and_validate(&config.host_execution_plan, &catalog)?;
        let default_account_execution_plan =
            parse_and_validate(&config.default_account_execution_plan, &catalog)?;

        info!(
            hooks = catalog.len(),
            host_endpoints = host_execution_plan.endpoints.len(),
            config_to_invoke_required = config.config_to_invoke_required,
            "Hook stage executor ready"
        );

        Ok(Self {
            host_execution_plan,
            default_account_execution_plan,
            host_module_execution: config.host_module_execution.clone(),
            config_to_invoke_required: config.config_to_invoke_required,
            catalog,
        })
    }

    pub async fn execute_entrypoint_stage(
        &self,
        query_params: BTreeMap<String, String>,
        headers: BTreeMap<String, String>,
        body: String,
        execution_context: &HookExecutionContext,
    ) -> HookStageExecutionResult<EntrypointPayload> {
        let endpoint = execution_context.endpoint();
        // no account is known yet: host plan and host module switches only
        let plan = self.host_execution_plan.stage_plan(endpoint, Stage::Entrypoint);
        let catalog_hooks = self.catalog.provider::<stage::Entrypoint>();
        let hooks: AbTestHookProvider<'_, EntrypointPayload, InvocationContext> =
            AbTestHookProvider::new(
                &catalog_hooks,
                self.ab_tests_for_entrypoint(),
                execution_context,
            );
        let contexts = EntrypointContextProvider::new(endpoint);

        StageExecutor::new(Stage::Entrypoint, &hooks, &contexts)
            .with_entity(ENTITY_HTTP_REQUEST)
            .with_modules_execution(ModulesExecution::new(self.host_module_execution.clone(), true))
            .execute(
                &plan,
                EntrypointPayload {
                    query_params,
                    headers,
                    body,
                },
                execution_context,
            )
            .await
    }

    pub async fn execute_raw_auction_request_stage(
        &self,
        auction: &AuctionContext,
    ) -> HookStageExecutionResult<AuctionRequestPayload> {
        let payload = AuctionRequestPayload {
            bid_request: auction.bid_request.clone(),
        };
        self.execute_stage::<stage::RawAuctionRequest>(
            ENTITY_AUCTION_REQUEST,
            auction,
            &AuctionContextProvider::new(auction),
            payload,
        )
        .await
    }

    pub async fn execute_processed_auction_request_stage(
        &self,
        auction: &AuctionContext,
    ) -> HookStageExecutionResult<AuctionRequestPayload> {
        let payload = AuctionRequestPayload {
            bid_request: auction.bid_request.clone(),
        };
        self.execute_stage::<stage::ProcessedAuctionRequest>(
            ENTITY_AUCTION_REQUEST,
            auction,
            &AuctionContextProvider::new(auction),
            payload,
        )
        .await
    }

    pub async fn execute_bidder_request_stage(
        &self,
        bidder_request: &BidderRequest,
        auction: &AuctionContext,
    ) -> HookStageExecutionResult<BidderRequestPayload> {
        let payload = BidderRequestPayload {
            bid_request: bidder_request.bid_request.clone(),
        };
        self.execute_stage::<stage::BidderRequest>(
            &bidder_request.bidder,
            auction,
            &BidderContextProvider::new(auction, &bidder_request.bidder),
            payload,
        )
        .await
    }

    pub async fn execute_raw_bidder_response_stage(
        &self,
        bidder_response: &BidderResponse,
        auction: &AuctionContext,
    ) -> HookStageExecutionResult<BidderResponsePayload> {
        let payload = BidderResponsePayload {
            bids: bidder_response.bids.clone(),
        };
        self.execute_stage::<stage::RawBidderResponse>(
            &bidder_response.bidder,
            auction,
            &BidderContextProvider::new(auction, &bidder_response.bidder),
            payload,
        )
        .await
    }

    pub async fn execute_processed_bidder_response_stage(
        &self,
        bidder_response: &BidderResponse,
        auction: &AuctionContext,
    ) -> HookStageExecutionResult<BidderResponsePayload> {
        let payload = BidderResponsePayload {
            bids: bidder_response.bids.clone(),
        };
        self.execute_stage::<stage::ProcessedBidderResponse>(
            &bidder_response.bidder,
            auction,
            &BidderContextProvider::new(auction, &bidder_response.bidder),
            payload,
        )
        .await
    }

    pub async fn execute_all_processed_bid_responses_stage(
        &self,
        bidder_responses: &[BidderResponse],
        auction: &AuctionContext,
    ) -> HookStageExecutionResult<AllProcessedBidResponsesPayload> {
        let payload = AllProcessedBidResponsesPayload {
            bid_responses: bidder_responses.to_vec(),
        };
        self.execute_stage::<stage::AllProcessedBidResponses>(
            ENTITY_ALL_PROCESSED_BID_RESPONSES,
            auction,
            &AuctionContextProvider::new(auction),
            payload,
        )
        .await
    }

    pub async fn execute_auction_response_stage(
        &self,
        bid_response: Value,
        auction: &AuctionContext,
    ) -> HookStageExecutionResult<AuctionResponsePayload> {
        self.execute_stage::<stage::AuctionResponse>(
            ENTITY_AUCTION_RESPONSE,
            auction,
            &AuctionContextProvider::new(auction),
            AuctionResponsePayload { bid_response },
        )
        .await
    }

    pub async fn execute_exitpoint_stage(
        &self,
        headers: BTreeMap<String, String>,
        body: String,
        auction: &AuctionContext,
    ) -> HookStageExecutionResult<ExitpointPayload> {
        self.execute_stage::<stage::Exitpoint>(
            ENTITY_HTTP_RESPONSE,
            auction,
            &AuctionContextProvider::new(auction),
            ExitpointPayload { headers, body },
        )
        .await
    }

    async fn execute_stage<K: StageKind>(
        &self,
        entity: &str,
        auction: &AuctionContext,
        contexts: &dyn InvocationContextProvider<K::Context>,
        payload: K::Payload,
    ) -> HookStageExecutionResult<K::Payload> {
        let execution_context = auction.hook_execution_context.as_ref();
        let plan = self.plan_for_stage(&auction.account, execution_context.endpoint(), K::STAGE);
        let catalog_hooks = self.catalog.provider::<K>();
        let hooks: AbTestHookProvider<'_, K::Payload, K::Context> = AbTestHookProvider::new(
            &catalog_hooks,
            self.ab_tests_for(&auction.account),
            execution_context,
        );

        StageExecutor::new(K::STAGE, &hooks, contexts)
            .with_entity(entity)
            .with_modules_execution(self.modules_execution_for(&auction.account))
            .execute(&plan, payload, execution_context)
            .await
    }

    /// Host groups first, then the account's own plan or the default one
    pub fn plan_for_stage(
        &self,
        account: &Account,
        endpoint: Endpoint,
        stage: Stage,
    ) -> StageExecutionPlan {
        self.host_execution_plan
            .stage_plan(endpoint, stage)
            .concat(&self.account_plan(account).stage_plan(endpoint, stage))
    }

    fn account_plan<'a>(&'a self, account: &'a Account) -> &'a ExecutionPlan {
        account
            .execution_plan()
            .unwrap_or(&self.default_account_execution_plan)
    }

    /// Enabled host A/B tests. The entrypoint runs before any account is known.
    pub fn ab_tests_for_entrypoint(&self) -> Vec<AbTest> {
        self.host_execution_plan
            .enabled_ab_tests()
            .unwrap_or_default()
    }

    /// A/B tests declared by the account's plan, or else the host tests that
    /// apply to the account
    pub fn ab_tests_for(&self, account: &Account) -> Vec<AbTest> {
        self.account_plan(account)
            .enabled_ab_tests()
            .unwrap_or_else(|| {
                self.ab_tests_for_entrypoint()
                    .into_iter()
                    .filter(|ab_test| ab_test.applies_to(&account.id))
                    .collect()
            })
    }

    /// Module switches for an account.
    ///
    /// Account admin switches come first, modules the account configures are
    /// switched on when configuration is required to invoke, and host switches
    /// override both. Unlisted modules run unless configuration is required.
    pub fn modules_execution_for(&self, account: &Account) -> ModulesExecution {
        let mut modules = account.module_execution().cloned().unwrap_or_default();

        if self.config_to_invoke_required {
            for module in account.configured_modules() {
                modules.entry(module.to_string()).or_insert(true);
            }
        }

        modules.extend(
            self.host_module_execution
                .iter()
                .map(|(module, enabled)| (module.clone(), *enabled)),
        );

        ModulesExecution::new(modules, !self.config_to_invoke_required)
    }
}

fn parse_and_validate(json: &str, catalog: &HookCatalog) -> Result<ExecutionPlan> {
    let plan = ExecutionPlan::parse(json)?;
    plan.validate(catalog)?;
    Ok(plan)
}
