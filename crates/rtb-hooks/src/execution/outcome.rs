//! Observability records produced while executing stages.
//!
//! Records are plain data: they are built once, appended, and never consulted
//! for control flow.

use std::collections::{BTreeMap, HashMap};
use std::panic::{self, AssertUnwindSafe};
use std::time::Duration;

use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::plan::{Endpoint, HookId};
use super::stage::Stage;
use crate::hooks::{InvocationAction, InvocationResult, InvocationStatus, Tags};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionStatus {
    Success,
    /// Hook ran and reported it could not do its job
    Failure,
    Timeout,
    /// Hook could not be resolved or blew up instead of producing a result
    InvocationFailure,
    /// Hook produced an error, or its result could not be applied
    ExecutionFailure,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionAction {
    NoAction,
    Update,
    Reject,
    /// Hook skipped: its module is disabled or sits out an A/B test
    NoInvocation,
}

impl From<InvocationAction> for ExecutionAction {
    fn from(action: InvocationAction) -> Self {
        match action {
            InvocationAction::NoAction => ExecutionAction::NoAction,
            InvocationAction::Update => ExecutionAction::Update,
            InvocationAction::Reject => ExecutionAction::Reject,
            InvocationAction::NoInvocation => ExecutionAction::NoInvocation,
        }
    }
}

/// What happened to one hook call
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HookExecutionOutcome {
    pub hook_id: HookId,
    pub execution_time_ms: u64,
    pub status: ExecutionStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub action: Option<ExecutionAction>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub errors: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub debug_messages: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub analytics_tags: Option<Tags>,
}

impl HookExecutionOutcome {
    /// Outcome for a hook that never produced an invocation result
    pub fn failed(
        hook_id: HookId,
        status: ExecutionStatus,
        elapsed: Duration,
        message: impl Into<String>,
    ) -> Self {
        Self {
            hook_id,
            execution_time_ms: millis(elapsed),
            status,
            action: None,
            message: Some(message.into()),
            errors: Vec::new(),
            warnings: Vec::new(),
            debug_messages: Vec::new(),
            analytics_tags: None,
        }
    }

    /// Outcome for a hook skipped because its module is disabled
    pub fn not_invoked(hook_id: HookId) -> Self {
        Self {
            hook_id,
            execution_time_ms: 0,
            status: ExecutionStatus::Success,
            action: Some(ExecutionAction::NoInvocation),
            message: None,
            errors: Vec::new(),
            warnings: Vec::new(),
            debug_messages: Vec::new(),
            analytics_tags: None,
        }
    }

    /// Outcome mirroring a completed invocation. Pure: the result is only read.
    pub fn from_invocation<P>(
        hook_id: HookId,
        elapsed: Duration,
        result: &InvocationResult<P>,
    ) -> Self {
        Self {
            hook_id,
            execution_time_ms: millis(elapsed),
            status: match result.status {
                InvocationStatus::Success => ExecutionStatus::Success,
                InvocationStatus::Failure => ExecutionStatus::Failure,
            },
            action: result.action.map(ExecutionAction::from),
            message: result.message.clone(),
            errors: result.errors.clone(),
            warnings: result.warnings.clone(),
            debug_messages: result.debug_messages.clone(),
            analytics_tags: result.analytics_tags.clone(),
        }
    }

    /// Same as [`from_invocation`](Self::from_invocation), but never panics:
    /// a record that cannot be built degrades to a minimal failure record.
    pub fn capture<P>(hook_id: &HookId, elapsed: Duration, result: &InvocationResult<P>) -> Self {
        panic::catch_unwind(AssertUnwindSafe(|| {
            Self::from_invocation(hook_id.clone(), elapsed, result)
        }))
        .unwrap_or_else(|_| {
            Self::failed(
                hook_id.clone(),
                ExecutionStatus::ExecutionFailure,
                elapsed,
                "Failed to build hook execution outcome",
            )
        })
    }

    /// Mark the hook's result as not applied
    pub fn into_execution_failure(self, message: impl Into<String>) -> Self {
        Self {
            status: ExecutionStatus::ExecutionFailure,
            action: None,
            message: Some(message.into()),
            ..self
        }
    }
}

fn millis(elapsed: Duration) -> u64 {
    u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX)
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GroupExecutionOutcome {
    pub hooks: Vec<HookExecutionOutcome>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StageExecutionOutcome {
    /// What the stage processed: `http-request`, a bidder code, ...
    pub entity: String,
    pub groups: Vec<GroupExecutionOutcome>,
}

/// Per-request accumulator shared by every stage of one request.
///
/// Stage outcomes are appended, never replaced, so a stage that runs more than
/// once per request (one run per bidder) keeps every run.
#[derive(Debug)]
pub struct HookExecutionContext {
    endpoint: Endpoint,
    stage_outcomes: DashMap<Stage, Vec<StageExecutionOutcome>>,
    module_contexts: DashMap<String, Value>,
    ab_test_decisions: DashMap<String, bool>,
}

impl HookExecutionContext {
    pub fn new(endpoint: Endpoint) -> Self {
        Self {
            endpoint,
            stage_outcomes: DashMap::new(),
            module_contexts: DashMap::new(),
            ab_test_decisions: DashMap::new(),
        }
    }

    pub fn endpoint(&self) -> Endpoint {
        self.endpoint
    }

    pub fn record_stage_outcome(&self, stage: Stage, outcome: StageExecutionOutcome) {
        self.stage_outcomes.entry(stage).or_default().push(outcome);
    }

    pub fn stage_outcomes(&self, stage: Stage) -> Vec<StageExecutionOutcome> {
        self.stage_outcomes
            .get(&stage)
            .map(|outcomes| outcomes.clone())
            .unwrap_or_default()
    }

    /// Snapshot of every stage recorded so far, in pipeline order
    pub fn all_stage_outcomes(&self) -> BTreeMap<Stage, Vec<StageExecutionOutcome>> {
        self.stage_outcomes
            .iter()
            .map(|entry| (*entry.key(), entry.value().clone()))
            .collect()
    }

    pub fn module_context(&self, module_code: &str) -> Option<Value> {
        self.module_contexts.get(module_code).map(|value| value.clone())
    }

    pub fn set_module_context(&self, module_code: &str, value: Value) {
        self.module_contexts.insert(module_code.to_string(), value);
    }

    /// Whether an A/B tested module runs for this request. `decide` is only
    /// consulted the first time a module is asked about.
    pub fn ab_test_decision(&self, module_code: &str, decide: impl FnOnce() -> bool) -> bool {
        *self
            .ab_test_decisions
            .entry(module_code.to_string())
            .or_insert_with(decide)
    }

    pub fn module_contexts(&self) -> HashMap<String, Value> {
        self.module_contexts
            .iter()
            .map(|entry| (entry.key().clone(), entry.value().clone()))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample_result() -> InvocationResult<String> {
        InvocationResult::succeeded(|payload: &String| Ok(format!("{payload}!")))
            .with_message("Updated the request")
            .with_errors(vec!["There have been some errors though".into()])
            .with_warnings(vec!["Not without warnings too".into()])
            .with_debug_messages(vec!["And chatty debug messages of course".into()])
            .with_analytics_tags(Tags::activity("enrich", "success", Vec::new()))
    }

    #[test]
    fn test_from_invocation_copies_result_fields() {
        let outcome = HookExecutionOutcome::from_invocation(
            HookId::new("m", "h"),
            Duration::from_millis(12),
            &sample_result(),
        );

        assert_eq!(outcome.status, ExecutionStatus::Success);
        assert_eq!(outcome.action, Some(ExecutionAction::Update));
        assert_eq!(outcome.execution_time_ms, 12);
        assert_eq!(outcome.message.as_deref(), Some("Updated the request"));
        assert_eq!(outcome.errors, vec!["There have been some errors though"]);
        assert_eq!(outcome.warnings, vec!["Not without warnings too"]);
        assert_eq!(outcome.debug_messages, vec!["And chatty debug messages of course"]);
        assert_eq!(outcome.analytics_tags.unwrap().activities[0].name, "enrich");
    }

    #[test]
    fn test_from_invocation_is_pure() {
        let result = sample_result();
        let hook_id = HookId::new("m", "h");
        let first = HookExecutionOutcome::capture(&hook_id, Duration::from_millis(3), &result);
        let second = HookExecutionOutcome::capture(&hook_id, Duration::from_millis(3), &result);
        assert_eq!(first, second);

        // the update is still there and still applicable
        let update = result.payload_update.unwrap();
        assert_eq!(update(&"body".to_string()).unwrap(), "body!");
    }

    #[test]
    fn test_failed_status_maps_to_failure() {
        let result = InvocationResult::<String>::failed("Failed to contact service ACME");
        let outcome =
            HookExecutionOutcome::from_invocation(HookId::new("m", "h"), Duration::ZERO, &result);
        assert_eq!(outcome.status, ExecutionStatus::Failure);
        assert_eq!(outcome.action, None);
        assert_eq!(outcome.message.as_deref(), Some("Failed to contact service ACME"));
    }

    #[test]
    fn test_into_execution_failure_drops_action() {
        let outcome = HookExecutionOutcome::from_invocation(
            HookId::new("m", "h"),
            Duration::ZERO,
            &sample_result(),
        )
        .into_execution_failure("Payload update is missing in invocation result");
        assert_eq!(outcome.status, ExecutionStatus::ExecutionFailure);
        assert_eq!(outcome.action, None);
        assert_eq!(outcome.errors.len(), 1);
    }

    #[test]
    fn test_outcome_serializes_compactly() {
        let outcome = HookExecutionOutcome::not_invoked(HookId::new("m", "h"));
        let json = serde_json::to_value(&outcome).unwrap();
        assert_eq!(
            json,
            json!({
                "hook_id": {"module-code": "m", "hook-impl-code": "h"},
                "execution_time_ms": 0,
                "status": "success",
                "action": "no_invocation"
            })
        );
    }

    #[test]
    fn test_context_appends_stage_outcomes() {
        let ctx = HookExecutionContext::new(Endpoint::Openrtb2Auction);
        for bidder in ["appnexus", "rubicon"] {
            ctx.record_stage_outcome(
                Stage::BidderRequest,
                StageExecutionOutcome {
                    entity: bidder.to_string(),
                    groups: Vec::new(),
                },
            );
        }

        let outcomes = ctx.stage_outcomes(Stage::BidderRequest);
        assert_eq!(outcomes.len(), 2);
        assert_eq!(outcomes[1].entity, "rubicon");
        assert!(ctx.stage_outcomes(Stage::Entrypoint).is_empty());
        assert_eq!(ctx.all_stage_outcomes().len(), 1);
    }

    #[test]
    fn test_module_contexts_overwrite() {
        let ctx = HookExecutionContext::new(Endpoint::Openrtb2Auction);
        assert!(ctx.module_context("alpha").is_none());
        ctx.set_module_context("alpha", json!("a"));
        ctx.set_module_context("alpha", json!("aa"));
        assert_eq!(ctx.module_context("alpha"), Some(json!("aa")));
        assert_eq!(ctx.module_contexts().len(), 1);
    }

    #[test]
    fn test_ab_test_decision_taken_once() {
        let ctx = HookExecutionContext::new(Endpoint::Openrtb2Auction);
        assert!(ctx.ab_test_decision("alpha", || true));
        assert!(ctx.ab_test_decision("alpha", || false));
        assert!(!ctx.ab_test_decision("beta", || false));
    }
}
