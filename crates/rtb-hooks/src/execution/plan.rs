use std::collections::{BTreeSet, HashMap};
use std::fmt;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};

use super::stage::Stage;
use crate::catalog::HookCatalog;

/// Identity of one hook implementation
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct HookId {
    pub module_code: String,
    pub hook_impl_code: String,
}

impl HookId {
    pub fn new(module_code: impl Into<String>, hook_impl_code: impl Into<String>) -> Self {
        Self {
            module_code: module_code.into(),
            hook_impl_code: hook_impl_code.into(),
        }
    }
}

impl fmt::Display for HookId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.module_code, self.hook_impl_code)
    }
}

/// Hooks sharing one time budget and one concurrency policy
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct ExecutionGroup {
    /// Group budget in milliseconds
    pub timeout: u64,
    /// Run hooks one after another instead of dispatching them all at once
    #[serde(default)]
    pub synchronous: bool,
    pub hook_sequence: Vec<HookId>,
}

impl ExecutionGroup {
    /// Fan-out group: every hook dispatched at once with the full budget
    pub fn new(timeout_ms: u64, hook_sequence: Vec<HookId>) -> Self {
        Self {
            timeout: timeout_ms,
            synchronous: false,
            hook_sequence,
        }
    }

    /// Sequential group: hooks see each other's updates and split the budget
    pub fn sequential(timeout_ms: u64, hook_sequence: Vec<HookId>) -> Self {
        Self {
            synchronous: true,
            ..Self::new(timeout_ms, hook_sequence)
        }
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout)
    }

    /// Deadline each hook of this group runs under.
    ///
    /// Sequential groups give every hook the same share of the total,
    /// regardless of how long earlier hooks took.
    pub fn hook_budget(&self) -> Duration {
        if self.synchronous && !self.hook_sequence.is_empty() {
            Duration::from_millis(self.timeout / self.hook_sequence.len() as u64)
        } else {
            self.timeout()
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StageExecutionPlan {
    #[serde(default)]
    pub groups: Vec<ExecutionGroup>,
}

impl StageExecutionPlan {
    pub fn new(groups: Vec<ExecutionGroup>) -> Self {
        Self { groups }
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    /// Groups of `self` followed by groups of `other`
    pub fn concat(&self, other: &StageExecutionPlan) -> StageExecutionPlan {
        if self.is_empty() {
            return other.clone();
        }
        if other.is_empty() {
            return self.clone();
        }
        StageExecutionPlan::new(self.groups.iter().chain(&other.groups).cloned().collect())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EndpointExecutionPlan {
    #[serde(default)]
    pub stages: HashMap<Stage, StageExecutionPlan>,
}

/// HTTP endpoints hooks can be configured for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Endpoint {
    #[serde(rename = "/openrtb2/auction")]
    Openrtb2Auction,
    #[serde(rename = "/openrtb2/amp")]
    Openrtb2Amp,
    #[serde(rename = "/openrtb2/video")]
    Openrtb2Video,
    #[serde(rename = "/cookie_sync")]
    CookieSync,
    #[serde(rename = "/setuid")]
    Setuid,
}

impl Endpoint {
    pub const ALL: [Endpoint; 5] = [
        Endpoint::Openrtb2Auction,
        Endpoint::Openrtb2Amp,
        Endpoint::Openrtb2Video,
        Endpoint::CookieSync,
        Endpoint::Setuid,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Endpoint::Openrtb2Auction => "/openrtb2/auction",
            Endpoint::Openrtb2Amp => "/openrtb2/amp",
            Endpoint::Openrtb2Video => "/openrtb2/video",
            Endpoint::CookieSync => "/cookie_sync",
            Endpoint::Setuid => "/setuid",
        }
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Endpoint {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        Endpoint::ALL
            .into_iter()
            .find(|endpoint| endpoint.as_str() == s)
            .with_context(|| format!("Unknown endpoint '{}'", s))
    }
}

/// Runs a module for a share of requests only
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct AbTest {
    #[serde(default)]
    pub enabled: bool,
    pub module_code: String,
    /// Accounts a host-level test applies to; empty means every account
    #[serde(default, skip_serializing_if = "BTreeSet::is_empty")]
    pub accounts: BTreeSet<String>,
    /// Share of requests, in percent, that run the module
    #[serde(default = "default_percent_active")]
    pub percent_active: u8,
    /// Tag every hook outcome of the module with whether it ran
    #[serde(default = "default_log_analytics_tag")]
    pub log_analytics_tag: bool,
}

fn default_percent_active() -> u8 {
    100
}

fn default_log_analytics_tag() -> bool {
    true
}

impl AbTest {
    pub fn new(module_code: impl Into<String>, percent_active: u8) -> Self {
        Self {
            enabled: true,
            module_code: module_code.into(),
            accounts: BTreeSet::new(),
            percent_active,
            log_analytics_tag: true,
        }
    }

    pub fn applies_to(&self, account_id: &str) -> bool {
        self.accounts.is_empty() || self.accounts.contains(account_id)
    }
}

/// Host- or account-level hook configuration for every endpoint and stage
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutionPlan {
    /// Absent and empty differ: an account plan without tests falls back to
    /// the host tests, an account plan with an empty list does not
    #[serde(default, rename = "ab-tests", skip_serializing_if = "Option::is_none")]
    pub ab_tests: Option<Vec<AbTest>>,

    #[serde(default)]
    pub endpoints: HashMap<Endpoint, EndpointExecutionPlan>,
}

impl ExecutionPlan {
    /// Parse a JSON plan. A blank string is an empty plan.
    pub fn parse(json: &str) -> Result<Self> {
        if json.trim().is_empty() {
            return Ok(Self::default());
        }
        serde_json::from_str(json).context("Hooks execution plan could not be parsed")
    }

    pub fn stage_plan(&self, endpoint: Endpoint, stage: Stage) -> StageExecutionPlan {
        self.endpoints
            .get(&endpoint)
            .and_then(|plan| plan.stages.get(&stage))
            .cloned()
            .unwrap_or_default()
    }

    /// Enabled A/B tests of this plan, `None` when the plan declares none
    pub fn enabled_ab_tests(&self) -> Option<Vec<AbTest>> {
        self.ab_tests
            .as_ref()
            .map(|tests| tests.iter().filter(|test| test.enabled).cloned().collect())
    }

    /// Check every group is well formed and every hook resolves for its stage
    pub fn validate(&self, catalog: &HookCatalog) -> Result<()> {
        for ab_test in self.ab_tests.iter().flatten() {
            if ab_test.percent_active > 100 {
                bail!(
                    "Hooks execution plan has an A/B test with percent-active above 100: module={}",
                    ab_test.module_code
                );
            }
        }

        for (endpoint, endpoint_plan) in &self.endpoints {
            for (stage, stage_plan) in &endpoint_plan.stages {
                for group in &stage_plan.groups {
                    validate_group(*endpoint, *stage, group, catalog)?;
                }
            }
        }
        Ok(())
    }
}

fn validate_group(
    endpoint: Endpoint,
    stage: Stage,
    group: &ExecutionGroup,
    catalog: &HookCatalog,
) -> Result<()> {
    if group.timeout == 0 {
        bail!(
            "Hooks execution plan has a group without timeout: endpoint={}, stage={}",
            endpoint,
            stage
        );
    }
    if group.hook_sequence.is_empty() {
        bail!(
            "Hooks execution plan has an empty group: endpoint={}, stage={}",
            endpoint,
            stage
        );
    }
    for hook_id in &group.hook_sequence {
        if !catalog.contains(stage, hook_id) {
            bail!(
                "Hooks execution plan contains unknown or disabled hook: stage={}, hookId={}",
                stage,
                hook_id
            );
        }
    }
    Ok(())
}
