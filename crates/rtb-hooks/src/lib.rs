pub mod auction;
pub mod catalog;
pub mod config;
pub mod execution;
pub mod hooks;
pub mod payload;

pub use auction::AuctionContext;
pub use catalog::{HookCatalog, Module, ModuleHooks, StageHookProvider};
pub use config::{Account, AccountHooksConfig, HooksAdminConfig, HooksConfig};
pub use execution::{
    AbTest, Endpoint, ExecutionAction, ExecutionGroup, ExecutionPlan, ExecutionStatus,
    GroupExecutionOutcome, HookExecutionContext, HookExecutionOutcome, HookId,
    HookStageExecutionResult, HookStageExecutor, ModulesExecution, Stage, StageExecutionOutcome,
    StageExecutionPlan, StageKind,
};
pub use hooks::{
    AuctionInvocationContext, BidderInvocationContext, Hook, HookProvider, InvocationAction,
    InvocationContext, InvocationContextProvider, InvocationResult, InvocationStatus, Tags,
    Timeout,
};
pub use payload::{
    AllProcessedBidResponsesPayload, AuctionRequestPayload, AuctionResponsePayload, BidderRequest,
    BidderRequestPayload, BidderResponse, BidderResponsePayload, EntrypointPayload,
    ExitpointPayload,
};

/// Initialize structured JSON logging on stderr, filtered by `RUST_LOG`
pub fn init_logging() {
    use tracing_subscriber::{fmt, EnvFilter};

    fmt()
        .json()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();
}
