use std::ops::ControlFlow;

use tracing::{debug, info};

use super::group::{GroupExecutor, GroupResult};
use super::modules::ModulesExecution;
use super::outcome::{GroupExecutionOutcome, HookExecutionContext, StageExecutionOutcome};
use super::plan::StageExecutionPlan;
use super::stage::Stage;
use crate::hooks::{HookProvider, InvocationContextProvider};

/// What the caller does next after a stage ran
#[derive(Debug, Clone, PartialEq)]
pub enum HookStageExecutionResult<P> {
    /// Continue with this payload
    Success(P),
    /// A hook rejected: abandon the entity the stage was processing
    Reject,
}

impl<P> HookStageExecutionResult<P> {
    pub fn should_reject(&self) -> bool {
        matches!(self, HookStageExecutionResult::Reject)
    }

    pub fn payload(&self) -> Option<&P> {
        match self {
            HookStageExecutionResult::Success(payload) => Some(payload),
            HookStageExecutionResult::Reject => None,
        }
    }

    pub fn into_payload(self) -> Option<P> {
        match self {
            HookStageExecutionResult::Success(payload) => Some(payload),
            HookStageExecutionResult::Reject => None,
        }
    }

    pub fn map<Q>(self, f: impl FnOnce(P) -> Q) -> HookStageExecutionResult<Q> {
        match self {
            HookStageExecutionResult::Success(payload) => {
                HookStageExecutionResult::Success(f(payload))
            }
            HookStageExecutionResult::Reject => HookStageExecutionResult::Reject,
        }
    }
}

struct StageResult<P> {
    payload: Option<P>,
    should_reject: bool,
    groups: Vec<GroupExecutionOutcome>,
}

impl<P> StageResult<P> {
    fn new(payload: P) -> Self {
        Self {
            payload: Some(payload),
            should_reject: false,
            groups: Vec::new(),
        }
    }

    fn apply_group(&mut self, group: GroupResult<P>) -> ControlFlow<()> {
        let (payload, should_reject, outcome) = group.into_parts();
        self.groups.push(outcome);
        self.payload = payload;
        self.should_reject = should_reject;

        if should_reject {
            ControlFlow::Break(())
        } else {
            ControlFlow::Continue(())
        }
    }

    fn finish(self, entity: String) -> (StageExecutionOutcome, HookStageExecutionResult<P>) {
        let outcome = StageExecutionOutcome {
            entity,
            groups: self.groups,
        };
        let result = match self.payload {
            Some(payload) if !self.should_reject => HookStageExecutionResult::Success(payload),
            _ => HookStageExecutionResult::Reject,
        };
        (outcome, result)
    }
}

/// Runs the groups of one stage plan in order.
///
/// Each group starts from the payload the previous group produced; a group
/// that rejects ends the stage. The stage outcome is recorded whatever happens,
/// including for an empty plan.
pub struct StageExecutor<'a, P: Send + 'static, C: Send + 'static> {
    stage: Stage,
    entity: String,
    hook_provider: &'a dyn HookProvider<P, C>,
    context_provider: &'a dyn InvocationContextProvider<C>,
    modules_execution: ModulesExecution,
    reject_allowed: bool,
}

impl<'a, P, C> StageExecutor<'a, P, C>
where
    P: Clone + Send + Sync + 'static,
    C: Send + 'static,
{
    pub fn new(
        stage: Stage,
        hook_provider: &'a dyn HookProvider<P, C>,
        context_provider: &'a dyn InvocationContextProvider<C>,
    ) -> Self {
        Self {
            stage,
            entity: stage.as_str().to_string(),
            hook_provider,
            context_provider,
            modules_execution: ModulesExecution::all_enabled(),
            reject_allowed: stage.reject_allowed(),
        }
    }

    pub fn with_entity(mut self, entity: impl Into<String>) -> Self {
        self.entity = entity.into();
        self
    }

    pub fn with_modules_execution(mut self, modules_execution: ModulesExecution) -> Self {
        self.modules_execution = modules_execution;
        self
    }

    pub fn with_reject_allowed(mut self, reject_allowed: bool) -> Self {
        self.reject_allowed = reject_allowed;
        self
    }

    pub async fn execute(
        &self,
        plan: &StageExecutionPlan,
        payload: P,
        execution_context: &HookExecutionContext,
    ) -> HookStageExecutionResult<P> {
        let group_executor = GroupExecutor::new(
            self.hook_provider,
            self.context_provider,
            &self.modules_execution,
            execution_context,
            self.reject_allowed,
        );

        debug!(
            stage = %self.stage,
            entity = %self.entity,
            groups = plan.groups.len(),
            "Executing stage"
        );

        let mut stage_result = StageResult::new(payload);
        for (index, group) in plan.groups.iter().enumerate() {
            let Some(payload) = stage_result.payload.take() else {
                break;
            };
            let group_result = group_executor.execute(group, payload).await;

            if stage_result.apply_group(group_result).is_break() {
                info!(
                    stage = %self.stage,
                    entity = %self.entity,
                    group = index,
                    "Stage rejected by hook"
                );
                break;
            }
        }

        let (outcome, result) = stage_result.finish(self.entity.clone());
        execution_context.record_stage_outcome(self.stage, outcome);
        result
    }
}
