pub mod context;
pub mod hook;
pub mod invocation;

pub use context::{
    AuctionContextProvider, AuctionInvocationContext, BidderContextProvider,
    BidderInvocationContext, EntrypointContextProvider, InvocationContext,
    InvocationContextProvider, Timeout,
};
pub use hook::{Hook, HookProvider};
pub use invocation::{
    Activity, ActivityResult, InvocationAction, InvocationResult, InvocationStatus, PayloadUpdate,
    Tags,
};
