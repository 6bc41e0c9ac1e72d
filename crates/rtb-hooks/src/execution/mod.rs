pub mod ab_test;
pub mod executor;
pub mod group;
pub mod modules;
pub mod outcome;
pub mod plan;
pub mod stage;
pub mod stage_executor;

#[cfg(test)]
mod test_support;

pub use ab_test::AbTestHookProvider;
pub use executor::HookStageExecutor;
pub use group::{GroupExecutor, GroupResult};
pub use modules::ModulesExecution;
pub use outcome::{
    ExecutionAction, ExecutionStatus, GroupExecutionOutcome, HookExecutionContext,
    HookExecutionOutcome, StageExecutionOutcome,
};
pub use plan::{
    AbTest, Endpoint, EndpointExecutionPlan, ExecutionGroup, ExecutionPlan, HookId,
    StageExecutionPlan,
};
pub use stage::{
    AllProcessedBidResponses, AuctionResponse, BidderRequest, Entrypoint, Exitpoint,
    ProcessedAuctionRequest, ProcessedBidderResponse, RawAuctionRequest, RawBidderResponse, Stage,
    StageHook, StageKind,
};
pub use stage_executor::{HookStageExecutionResult, StageExecutor};
