use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::time::Duration;

use futures::future::{self, BoxFuture};
use futures::stream::{FuturesOrdered, StreamExt};
use futures::FutureExt;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use super::modules::ModulesExecution;
use super::outcome::{
    ExecutionStatus, GroupExecutionOutcome, HookExecutionContext, HookExecutionOutcome,
};
use super::plan::{ExecutionGroup, HookId};
use crate::hooks::{
    HookProvider, InvocationAction, InvocationContextProvider, InvocationResult, InvocationStatus,
    PayloadUpdate,
};

pub(crate) const HOOK_NOT_FOUND: &str = "Hook implementation does not exist or disabled";
pub(crate) const TIMED_OUT: &str = "Timed out while executing action";
pub(crate) const UPDATE_MISSING: &str = "Payload update is missing in invocation result";
pub(crate) const UPDATE_FAILED: &str = "Payload update has thrown an exception";
pub(crate) const REJECT_NOT_SUPPORTED: &str = "Rejection is not supported during this stage";

/// How one hook call ended, before it is folded into the group
struct HookInvocation<P> {
    hook_id: HookId,
    elapsed: Duration,
    output: InvocationOutput<P>,
}

enum InvocationOutput<P> {
    Skipped,
    Completed(InvocationResult<P>),
    Failed { status: ExecutionStatus, message: String },
}

impl<P> HookInvocation<P> {
    fn failed(
        hook_id: HookId,
        elapsed: Duration,
        status: ExecutionStatus,
        message: impl Into<String>,
    ) -> Self {
        Self {
            hook_id,
            elapsed,
            output: InvocationOutput::Failed {
                status,
                message: message.into(),
            },
        }
    }
}

/// Running state of one group: the payload so far and one outcome per hook
/// folded in, in hook-sequence order.
pub struct GroupResult<P> {
    payload: Option<P>,
    should_reject: bool,
    reject_allowed: bool,
    hook_outcomes: Vec<HookExecutionOutcome>,
}

impl<P> GroupResult<P> {
    pub fn new(payload: P, reject_allowed: bool) -> Self {
        Self {
            payload: Some(payload),
            should_reject: false,
            reject_allowed,
            hook_outcomes: Vec::new(),
        }
    }

    /// Current payload, `None` once a hook rejected
    pub fn payload(&self) -> Option<&P> {
        self.payload.as_ref()
    }

    pub fn should_reject(&self) -> bool {
        self.should_reject
    }

    pub fn hook_outcomes(&self) -> &[HookExecutionOutcome] {
        &self.hook_outcomes
    }

    pub fn into_parts(self) -> (Option<P>, bool, GroupExecutionOutcome) {
        (
            self.payload,
            self.should_reject,
            GroupExecutionOutcome {
                hooks: self.hook_outcomes,
            },
        )
    }

    fn apply(&mut self, invocation: HookInvocation<P>, execution_context: &HookExecutionContext) {
        let HookInvocation {
            hook_id,
            elapsed,
            output,
        } = invocation;

        let outcome = match output {
            InvocationOutput::Skipped => HookExecutionOutcome::not_invoked(hook_id),
            InvocationOutput::Failed { status, message } => {
                warn!(
                    hook = %hook_id,
                    status = ?status,
                    elapsed_ms = elapsed.as_millis() as u64,
                    error = %message,
                    "Hook invocation failed"
                );
                HookExecutionOutcome::failed(hook_id, status, elapsed, message)
            }
            InvocationOutput::Completed(result) => {
                self.apply_result(hook_id, elapsed, result, execution_context)
            }
        };

        self.hook_outcomes.push(outcome);
    }

    fn apply_result(
        &mut self,
        hook_id: HookId,
        elapsed: Duration,
        mut result: InvocationResult<P>,
        execution_context: &HookExecutionContext,
    ) -> HookExecutionOutcome {
        let outcome = HookExecutionOutcome::capture(&hook_id, elapsed, &result);

        // results drained after a rejection are reported but never applied
        if self.should_reject {
            return outcome;
        }

        if let Some(module_context) = result.module_context.take() {
            execution_context.set_module_context(&hook_id.module_code, module_context);
        }

        if result.status != InvocationStatus::Success {
            return outcome;
        }

        match self.apply_action(result.action, result.payload_update) {
            Ok(()) => {
                if self.should_reject {
                    info!(hook = %hook_id, "Hook requested rejection");
                }
                outcome
            }
            Err(message) => {
                warn!(hook = %hook_id, error = %message, "Hook result could not be applied");
                outcome.into_execution_failure(message)
            }
        }
    }

    fn apply_action(
        &mut self,
        action: Option<InvocationAction>,
        update: Option<PayloadUpdate<P>>,
    ) -> Result<(), String> {
        match action {
            None
            | Some(InvocationAction::NoAction)
            | Some(InvocationAction::NoInvocation) => Ok(()),
            Some(InvocationAction::Update) => {
                let update = update.ok_or_else(|| UPDATE_MISSING.to_string())?;
                let Some(current) = self.payload.as_ref() else {
                    return Ok(());
                };

                let updated = match panic::catch_unwind(AssertUnwindSafe(|| update(current))) {
                    Ok(Ok(updated)) => updated,
                    Ok(Err(err)) => return Err(format!("{}: {}", UPDATE_FAILED, err)),
                    Err(panic) => {
                        return Err(format!(
                            "{}: {}",
                            UPDATE_FAILED,
                            panic_message(panic.as_ref())
                        ))
                    }
                };
                self.payload = Some(updated);
                Ok(())
            }
            Some(InvocationAction::Reject) => {
                if !self.reject_allowed {
                    return Err(REJECT_NOT_SUPPORTED.to_string());
                }
                self.should_reject = true;
                self.payload = None;
                Ok(())
            }
        }
    }
}

/// Runs the hooks of one execution group against a payload.
///
/// Never fails: every way a hook can misbehave ends up as that hook's outcome.
pub struct GroupExecutor<'a, P: Send + 'static, C: Send + 'static> {
    hook_provider: &'a dyn HookProvider<P, C>,
    context_provider: &'a dyn InvocationContextProvider<C>,
    modules_execution: &'a ModulesExecution,
    execution_context: &'a HookExecutionContext,
    reject_allowed: bool,
}

impl<'a, P, C> GroupExecutor<'a, P, C>
where
    P: Clone + Send + Sync + 'static,
    C: Send + 'static,
{
    pub fn new(
        hook_provider: &'a dyn HookProvider<P, C>,
        context_provider: &'a dyn InvocationContextProvider<C>,
        modules_execution: &'a ModulesExecution,
        execution_context: &'a HookExecutionContext,
        reject_allowed: bool,
    ) -> Self {
        Self {
            hook_provider,
            context_provider,
            modules_execution,
            execution_context,
            reject_allowed,
        }
    }

    pub async fn execute(&self, group: &ExecutionGroup, payload: P) -> GroupResult<P> {
        let budget = group.hook_budget();

        if group.synchronous {
            self.execute_sequentially(group, payload, budget).await
        } else {
            self.execute_fan_out(group, payload, budget).await
        }
    }

    async fn execute_sequentially(
        &self,
        group: &ExecutionGroup,
        payload: P,
        budget: Duration,
    ) -> GroupResult<P> {
        let mut result = GroupResult::new(payload, self.reject_allowed);

        for hook_id in &group.hook_sequence {
            let Some(payload) = result.payload().cloned() else {
                break;
            };
            let invocation = self.invoke(hook_id, payload, budget).await;
            result.apply(invocation, self.execution_context);

            if result.should_reject() {
                break;
            }
        }

        result
    }

    async fn execute_fan_out(
        &self,
        group: &ExecutionGroup,
        payload: P,
        budget: Duration,
    ) -> GroupResult<P> {
        // every hook starts now against the same payload; results are folded
        // in declaration order as they become available
        let mut pending: FuturesOrdered<_> = group
            .hook_sequence
            .iter()
            .map(|hook_id| self.invoke(hook_id, payload.clone(), budget))
            .collect();

        let mut result = GroupResult::new(payload, self.reject_allowed);
        while let Some(invocation) = pending.next().await {
            result.apply(invocation, self.execution_context);
        }

        result
    }

    /// Resolve and start one hook call. The call and its deadline start
    /// before this returns; awaiting the future only collects the result.
    fn invoke(
        &self,
        hook_id: &HookId,
        payload: P,
        budget: Duration,
    ) -> BoxFuture<'static, HookInvocation<P>> {
        let hook_id = hook_id.clone();

        if !self.modules_execution.is_enabled(&hook_id.module_code) {
            debug!(hook = %hook_id, "Module disabled, hook not invoked");
            return future::ready(HookInvocation {
                hook_id,
                elapsed: Duration::ZERO,
                output: InvocationOutput::Skipped,
            })
            .boxed();
        }

        let Some(hook) = self.hook_provider.hook(&hook_id) else {
            return future::ready(HookInvocation::failed(
                hook_id,
                Duration::ZERO,
                ExecutionStatus::InvocationFailure,
                HOOK_NOT_FOUND,
            ))
            .boxed();
        };

        let module_context = self.execution_context.module_context(&hook_id.module_code);
        let ctx = self.context_provider.context(budget, &hook_id, module_context);

        debug!(hook = %hook_id, budget_ms = budget.as_millis() as u64, "Invoking hook");
        let started = Instant::now();

        // a spawned call outlives its deadline: on timeout the result is
        // dropped, the work itself is not cancelled
        let call = tokio::spawn(async move { hook.call(payload, ctx).await });
        let deadline = tokio::time::timeout(budget, call);

        async move {
            let invocation = match deadline.await {
                Ok(Ok(Ok(result))) => HookInvocation {
                    hook_id,
                    elapsed: started.elapsed(),
                    output: InvocationOutput::Completed(result),
                },
                Ok(Ok(Err(err))) => HookInvocation::failed(
                    hook_id,
                    started.elapsed(),
                    ExecutionStatus::ExecutionFailure,
                    err.to_string(),
                ),
                Ok(Err(join_err)) if join_err.is_panic() => {
                    let message = panic_message(join_err.into_panic().as_ref());
                    HookInvocation::failed(
                        hook_id,
                        started.elapsed(),
                        ExecutionStatus::InvocationFailure,
                        format!("Hook implementation panicked: {}", message),
                    )
                }
                Ok(Err(join_err)) => HookInvocation::failed(
                    hook_id,
                    started.elapsed(),
                    ExecutionStatus::ExecutionFailure,
                    join_err.to_string(),
                ),
                Err(_) => HookInvocation::failed(
                    hook_id,
                    started.elapsed(),
                    ExecutionStatus::Timeout,
                    TIMED_OUT,
                ),
            };

            debug!(
                hook = %invocation.hook_id,
                elapsed_ms = invocation.elapsed.as_millis() as u64,
                "Hook finished"
            );
            invocation
        }
        .boxed()
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(message) = panic.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic payload".to_string()
    }
}
