//! String-payload hooks with scripted behaviour for engine tests.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use serde_json::{json, Value};

use super::plan::HookId;
use super::stage::Stage;
use super::stage_executor::StageExecutor;
use crate::hooks::{
    Hook, InvocationAction, InvocationContextProvider, InvocationResult, InvocationStatus,
};

#[derive(Debug, Clone)]
pub(crate) struct TestContext {
    pub budget: Duration,
    pub module_context: Option<Value>,
}

pub(crate) struct TestContextProvider;

impl InvocationContextProvider<TestContext> for TestContextProvider {
    fn context(
        &self,
        budget: Duration,
        _hook_id: &HookId,
        module_context: Option<Value>,
    ) -> TestContext {
        TestContext { budget, module_context }
    }
}

#[derive(Debug, Clone)]
pub(crate) struct Call {
    pub hook: String,
    pub payload: String,
    pub budget: Duration,
}

/// Shared log of hook calls, and of how many of them ran to completion
#[derive(Clone, Default)]
pub(crate) struct Calls {
    started: Arc<Mutex<Vec<Call>>>,
    finished: Arc<Mutex<usize>>,
}

impl Calls {
    pub fn all(&self) -> Vec<Call> {
        self.started.lock().unwrap().clone()
    }

    pub fn finished(&self) -> usize {
        *self.finished.lock().unwrap()
    }

    fn start(&self, hook: &str, payload: &str, ctx: &TestContext) {
        self.started.lock().unwrap().push(Call {
            hook: hook.to_string(),
            payload: payload.to_string(),
            budget: ctx.budget,
        });
    }

    fn finish(&self) {
        *self.finished.lock().unwrap() += 1;
    }
}

#[derive(Debug, Clone)]
pub(crate) enum Behavior {
    /// Update the payload to `<payload>-<suffix>`
    Append(&'static str),
    NoAction,
    /// Success with no action at all
    Bare,
    Reject(&'static str),
    Fail(&'static str),
    Error(&'static str),
    Panic,
    MissingUpdate,
    BrokenUpdate,
    PanickingUpdate,
    /// Leave the payload alone, append to the module context string
    ContextAppend(&'static str),
}

pub(crate) struct TestHook {
    code: String,
    delay: Duration,
    behavior: Behavior,
    calls: Calls,
}

impl TestHook {
    pub fn new(code: &str, delay: Duration, behavior: Behavior, calls: Calls) -> Self {
        Self {
            code: code.to_string(),
            delay,
            behavior,
            calls,
        }
    }
}

#[async_trait]
impl Hook<String, TestContext> for TestHook {
    fn code(&self) -> &str {
        &self.code
    }

    async fn call(&self, payload: String, ctx: TestContext) -> Result<InvocationResult<String>> {
        self.calls.start(&self.code, &payload, &ctx);
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        self.calls.finish();

        match self.behavior {
            Behavior::Append(suffix) => Ok(InvocationResult::succeeded(move |p: &String| {
                Ok(format!("{p}-{suffix}"))
            })),
            Behavior::NoAction => Ok(InvocationResult::no_action()),
            Behavior::Bare => Ok(InvocationResult::of(InvocationStatus::Success, None)),
            Behavior::Reject(message) => Ok(InvocationResult::rejected(message)),
            Behavior::Fail(message) => Ok(InvocationResult::failed(message)),
            Behavior::Error(message) => Err(anyhow!(message)),
            Behavior::Panic => panic!("hook exploded"),
            Behavior::MissingUpdate => Ok(InvocationResult::of(
                InvocationStatus::Success,
                Some(InvocationAction::Update),
            )),
            Behavior::BrokenUpdate => Ok(InvocationResult::succeeded(|_: &String| {
                Err(anyhow!("Can not alter payload"))
            })),
            Behavior::PanickingUpdate => {
                Ok(InvocationResult::succeeded(|_: &String| -> Result<String> {
                    panic!("update exploded")
                }))
            }
            Behavior::ContextAppend(suffix) => {
                let previous = ctx
                    .module_context
                    .as_ref()
                    .and_then(Value::as_str)
                    .unwrap_or_default()
                    .to_string();
                Ok(InvocationResult::no_action()
                    .with_module_context(json!(format!("{previous}{suffix}"))))
            }
        }
    }
}

pub(crate) type TestHooks = HashMap<HookId, Arc<dyn Hook<String, TestContext>>>;

pub(crate) fn hooks(registered: Vec<(HookId, TestHook)>) -> TestHooks {
    registered
        .into_iter()
        .map(|(id, hook)| (id, Arc::new(hook) as Arc<dyn Hook<String, TestContext>>))
        .collect()
}

pub(crate) fn stage_executor(
    stage: Stage,
    provider: &TestHooks,
) -> StageExecutor<'_, String, TestContext> {
    StageExecutor::new(stage, provider, &TestContextProvider)
}
