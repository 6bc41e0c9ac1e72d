use std::fmt;

use anyhow::Result;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Whether the hook managed to do its job
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InvocationStatus {
    Success,
    Failure,
}

/// What the hook asks the engine to do with the payload
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InvocationAction {
    NoAction,
    Update,
    Reject,
    /// The hook was skipped without running its logic
    NoInvocation,
}

/// Deferred payload mutation. Receives the payload as it stands when the
/// result is applied, which for fan-out groups may differ from the payload
/// the hook was invoked with.
pub type PayloadUpdate<P> = Box<dyn FnOnce(&P) -> Result<P> + Send>;

/// Analytics tags attached to a hook outcome
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Tags {
    #[serde(default)]
    pub activities: Vec<Activity>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Activity {
    pub name: String,
    pub status: String,
    #[serde(default)]
    pub results: Vec<ActivityResult>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActivityResult {
    pub status: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub values: Option<Value>,
}

impl Tags {
    /// Tags holding a single activity
    pub fn activity(
        name: impl Into<String>,
        status: impl Into<String>,
        results: Vec<ActivityResult>,
    ) -> Self {
        Self {
            activities: vec![Activity {
                name: name.into(),
                status: status.into(),
                results,
            }],
        }
    }
}

/// Result returned by a single hook call
pub struct InvocationResult<P> {
    pub status: InvocationStatus,
    pub action: Option<InvocationAction>,
    pub payload_update: Option<PayloadUpdate<P>>,
    pub message: Option<String>,
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
    pub debug_messages: Vec<String>,
    pub analytics_tags: Option<Tags>,
    /// Opaque per-module state carried to later invocations of the same module
    pub module_context: Option<Value>,
}

impl<P> InvocationResult<P> {
    fn new(status: InvocationStatus, action: Option<InvocationAction>) -> Self {
        Self {
            status,
            action,
            payload_update: None,
            message: None,
            errors: Vec::new(),
            warnings: Vec::new(),
            debug_messages: Vec::new(),
            analytics_tags: None,
            module_context: None,
        }
    }

    /// Successful result that replaces the payload with `update(payload)`
    pub fn succeeded<F>(update: F) -> Self
    where
        F: FnOnce(&P) -> Result<P> + Send + 'static,
    {
        let mut result = Self::new(InvocationStatus::Success, Some(InvocationAction::Update));
        result.payload_update = Some(Box::new(update));
        result
    }

    pub fn no_action() -> Self {
        Self::new(InvocationStatus::Success, Some(InvocationAction::NoAction))
    }

    /// Result of a hook that was skipped, not run
    pub fn not_invoked() -> Self {
        Self::new(InvocationStatus::Success, Some(InvocationAction::NoInvocation))
    }

    pub fn rejected(message: impl Into<String>) -> Self {
        Self::new(InvocationStatus::Success, Some(InvocationAction::Reject)).with_message(message)
    }

    pub fn failed(message: impl Into<String>) -> Self {
        Self::new(InvocationStatus::Failure, None).with_message(message)
    }

    /// Bare result with the given status and action and nothing else set
    pub fn of(status: InvocationStatus, action: Option<InvocationAction>) -> Self {
        Self::new(status, action)
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    pub fn with_errors(mut self, errors: Vec<String>) -> Self {
        self.errors = errors;
        self
    }

    pub fn with_warnings(mut self, warnings: Vec<String>) -> Self {
        self.warnings = warnings;
        self
    }

    pub fn with_debug_messages(mut self, debug_messages: Vec<String>) -> Self {
        self.debug_messages = debug_messages;
        self
    }

    pub fn with_analytics_tags(mut self, tags: Tags) -> Self {
        self.analytics_tags = Some(tags);
        self
    }

    pub fn with_module_context(mut self, module_context: Value) -> Self {
        self.module_context = Some(module_context);
        self
    }
}

impl<P> fmt::Debug for InvocationResult<P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InvocationResult")
            .field("status", &self.status)
            .field("action", &self.action)
            .field("payload_update", &self.payload_update.as_ref().map(|_| "<fn>"))
            .field("message", &self.message)
            .field("errors", &self.errors)
            .field("warnings", &self.warnings)
            .field("debug_messages", &self.debug_messages)
            .field("analytics_tags", &self.analytics_tags)
            .field("module_context", &self.module_context)
            .finish()
    }
}
