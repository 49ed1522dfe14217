//! Agents
//!
//! An agent assesses a query, turns it into a [`Plan`], runs the plan and
//! formats the outcome. `process` never fails: errors come back as an error
//! [`Response`].

use crate::execution::{DebugHook, DebugLevel};
use crate::llm::LlmContext;
use crate::models::{AgentDescriptor, Assessment, ChatMessage, Plan, Response};
use async_trait::async_trait;

pub mod banking;
pub mod format;
pub mod planning;
pub mod uncertain;

pub use planning::{AgentProfile, DefaultPlanner, PlanningAgent, Scoring, Toolset};
pub use uncertain::{Specialist, UncertainAgent};

/// Per-request collaborators handed to every agent call.
#[derive(Clone)]
pub struct RequestContext {
    llm: LlmContext,
    debug_hook: Option<DebugHook>,
}

impl RequestContext {
    pub fn new(llm: LlmContext) -> Self {
        Self {
            llm,
            debug_hook: None,
        }
    }

    pub fn with_debug_hook(mut self, hook: DebugHook) -> Self {
        self.debug_hook = Some(hook);
        self
    }

    pub fn llm(&self) -> &LlmContext {
        &self.llm
    }

    pub fn debug_hook(&self) -> Option<DebugHook> {
        self.debug_hook.clone()
    }

    pub fn debug(&self, message: &str, level: DebugLevel) {
        if let Some(hook) = &self.debug_hook {
            hook(message, level);
        }
    }
}

impl std::fmt::Debug for RequestContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RequestContext")
            .field("llm", &self.llm)
            .field("debug_hook", &self.debug_hook.is_some())
            .finish()
    }
}

#[async_trait]
pub trait Agent: Send + Sync {
    fn name(&self) -> &str;
    fn description(&self) -> &str;
    fn capabilities(&self) -> Vec<String>;

    async fn can_handle(&self, query: &str, ctx: &RequestContext) -> Assessment;

    async fn create_plan(&self, query: &str, history: &[ChatMessage], ctx: &RequestContext) -> Plan;

    async fn process(&self, query: &str, history: &[ChatMessage], ctx: &RequestContext) -> Response;

    fn descriptor(&self) -> AgentDescriptor {
        AgentDescriptor {
            name: self.name().to_string(),
            description: self.description().to_string(),
            capabilities: self.capabilities(),
        }
    }
}
