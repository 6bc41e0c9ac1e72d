//! A/B testing of modules: a module under test runs for a share of requests
//! and sits out the rest.

use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use tracing::debug;

use super::outcome::HookExecutionContext;
use super::plan::{AbTest, HookId};
use crate::hooks::{ActivityResult, Hook, HookProvider, InvocationResult, Tags};

pub const AB_TEST_ACTIVITY: &str = "core-module-abtests";

/// Wraps a hook provider so hooks of modules under test run only when the
/// request falls into the test's active share.
///
/// The decision is taken once per module and request and kept in the
/// [`HookExecutionContext`], so every stage agrees on it.
pub struct AbTestHookProvider<'a, P: Send + 'static, C: Send + 'static> {
    inner: &'a dyn HookProvider<P, C>,
    ab_tests: Vec<AbTest>,
    execution_context: &'a HookExecutionContext,
}

impl<'a, P: Send + 'static, C: Send + 'static> AbTestHookProvider<'a, P, C> {
    pub fn new(
        inner: &'a dyn HookProvider<P, C>,
        ab_tests: Vec<AbTest>,
        execution_context: &'a HookExecutionContext,
    ) -> Self {
        Self {
            inner,
            ab_tests,
            execution_context,
        }
    }

    fn ab_test(&self, module_code: &str) -> Option<&AbTest> {
        self.ab_tests
            .iter()
            .find(|ab_test| ab_test.module_code == module_code)
    }
}

impl<P: Send + 'static, C: Send + 'static> HookProvider<P, C> for AbTestHookProvider<'_, P, C> {
    fn hook(&self, id: &HookId) -> Option<Arc<dyn Hook<P, C>>> {
        let hook = self.inner.hook(id)?;
        let Some(ab_test) = self.ab_test(&id.module_code) else {
            return Some(hook);
        };

        let should_invoke = self
            .execution_context
            .ab_test_decision(&id.module_code, || roll(ab_test.percent_active));
        debug!(hook = %id, should_invoke, "A/B test decision");

        Some(Arc::new(AbTestHook {
            inner: hook,
            should_invoke,
            log_analytics_tag: ab_test.log_analytics_tag,
        }))
    }
}

/// True for `percent_active` percent of calls
fn roll(percent_active: u8) -> bool {
    let draw = uuid::Uuid::new_v4().as_u128() % 100;
    draw < u128::from(percent_active)
}

struct AbTestHook<P, C> {
    inner: Arc<dyn Hook<P, C>>,
    should_invoke: bool,
    log_analytics_tag: bool,
}

impl<P, C> AbTestHook<P, C> {
    fn tags(status: &str) -> Tags {
        Tags::activity(
            AB_TEST_ACTIVITY,
            "success",
            vec![ActivityResult {
                status: status.to_string(),
                values: None,
            }],
        )
    }
}

#[async_trait]
impl<P: Send + 'static, C: Send + 'static> Hook<P, C> for AbTestHook<P, C> {
    fn code(&self) -> &str {
        self.inner.code()
    }

    async fn call(&self, payload: P, ctx: C) -> Result<InvocationResult<P>> {
        if !self.should_invoke {
            let result = InvocationResult::not_invoked();
            return Ok(if self.log_analytics_tag {
                result.with_analytics_tags(Self::tags("skipped"))
            } else {
                result
            });
        }

        let mut result = self.inner.call(payload, ctx).await?;
        if self.log_analytics_tag {
            let run = Self::tags("run");
            match result.analytics_tags.as_mut() {
                Some(tags) => tags.activities.extend(run.activities),
                None => result.analytics_tags = Some(run),
            }
        }
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::execution::outcome::{ExecutionAction, ExecutionStatus};
    use crate::execution::test_support::{
        hooks, Behavior, Calls, TestContext, TestContextProvider, TestHook, TestHooks,
    };
    use crate::execution::{Endpoint, ExecutionGroup, Stage, StageExecutionPlan, StageExecutor};
    use std::time::Duration;

    fn provider(calls: &Calls) -> TestHooks {
        hooks(vec![
            (
                HookId::new("alpha", "a"),
                TestHook::new("a", Duration::ZERO, Behavior::Append("a"), calls.clone()),
            ),
            (
                HookId::new("beta", "b"),
                TestHook::new("b", Duration::ZERO, Behavior::Append("b"), calls.clone()),
            ),
        ])
    }

    async fn run(
        ab_tests: Vec<AbTest>,
        calls: &Calls,
        ctx: &HookExecutionContext,
    ) -> Option<String> {
        let inner = provider(calls);
        let ab_provider: AbTestHookProvider<'_, String, TestContext> =
            AbTestHookProvider::new(&inner, ab_tests, ctx);
        let plan = StageExecutionPlan::new(vec![ExecutionGroup::sequential(
            100,
            vec![HookId::new("alpha", "a"), HookId::new("beta", "b")],
        )]);

        let executor: StageExecutor<'_, String, TestContext> =
            StageExecutor::new(Stage::Entrypoint, &ab_provider, &TestContextProvider);
        executor
            .execute(&plan, "body".to_string(), ctx)
            .await
            .into_payload()
    }

    #[tokio::test]
    async fn test_inactive_module_is_skipped_with_tags() {
        let calls = Calls::default();
        let ctx = HookExecutionContext::new(Endpoint::Openrtb2Auction);

        let payload = run(vec![AbTest::new("alpha", 0)], &calls, &ctx).await;

        assert_eq!(payload.as_deref(), Some("body-b"));
        assert_eq!(calls.all().len(), 1);
        let hooks = &ctx.stage_outcomes(Stage::Entrypoint)[0].groups[0].hooks;
        assert_eq!(hooks[0].status, ExecutionStatus::Success);
        assert_eq!(hooks[0].action, Some(ExecutionAction::NoInvocation));
        let activity = &hooks[0].analytics_tags.as_ref().unwrap().activities[0];
        assert_eq!(activity.name, AB_TEST_ACTIVITY);
        assert_eq!(activity.results[0].status, "skipped");

        // modules outside any test are left alone
        assert_eq!(hooks[1].action, Some(ExecutionAction::Update));
        assert!(hooks[1].analytics_tags.is_none());
    }

    #[tokio::test]
    async fn test_active_module_runs_and_is_tagged() {
        let calls = Calls::default();
        let ctx = HookExecutionContext::new(Endpoint::Openrtb2Auction);

        let payload = run(vec![AbTest::new("alpha", 100)], &calls, &ctx).await;

        assert_eq!(payload.as_deref(), Some("body-a-b"));
        let hooks = &ctx.stage_outcomes(Stage::Entrypoint)[0].groups[0].hooks;
        assert_eq!(hooks[0].action, Some(ExecutionAction::Update));
        let activity = &hooks[0].analytics_tags.as_ref().unwrap().activities[0];
        assert_eq!(activity.results[0].status, "run");
    }

    #[tokio::test]
    async fn test_tags_left_out_when_logging_is_off() {
        let calls = Calls::default();
        let ctx = HookExecutionContext::new(Endpoint::Openrtb2Auction);
        let ab_test = AbTest {
            log_analytics_tag: false,
            ..AbTest::new("alpha", 0)
        };

        run(vec![ab_test], &calls, &ctx).await;

        let hooks = &ctx.stage_outcomes(Stage::Entrypoint)[0].groups[0].hooks;
        assert_eq!(hooks[0].action, Some(ExecutionAction::NoInvocation));
        assert!(hooks[0].analytics_tags.is_none());
    }

    #[tokio::test]
    async fn test_decision_is_kept_for_the_request() {
        let calls = Calls::default();
        let ctx = HookExecutionContext::new(Endpoint::Openrtb2Auction);
        assert!(!ctx.ab_test_decision("alpha", || false));

        // an earlier decision wins over the test's own percentage
        let payload = run(vec![AbTest::new("alpha", 100)], &calls, &ctx).await;
        assert_eq!(payload.as_deref(), Some("body-b"));
    }

    #[test]
    fn test_roll_bounds() {
        assert!((0..50).all(|_| !roll(0)));
        assert!((0..50).all(|_| roll(100)));
    }
}
