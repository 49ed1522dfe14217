//! Agent Router
//!
//! Routes a natural-language query to the best-suited specialist agent,
//! lets that agent turn the query into a plan of tool calls, executes the
//! plan step by step and formats the outcome:
//! - Local agent self-assessment with LLM escalation and a default agent
//! - Declarative plans with `${path}` references between steps
//! - Per-step failure capture and adaptation instead of aborting
//! - A response for every query, including failed ones
//!
//! FLOW:
//! REGISTRY → ROUTE → PLAN → EXECUTE (resolve → validate → call) → FORMAT

pub mod agent;
pub mod config;
pub mod error;
pub mod execution;
pub mod llm;
pub mod models;
pub mod plan;
pub mod registry;
pub mod router;
pub mod tools;

#[cfg(test)]
mod test_support;

pub use error::{OrchestrationError, Result};

// Re-export common types
pub use agent::{Agent, RequestContext};
pub use config::{RouterConfig, Settings};
pub use execution::{DebugHook, DebugLevel, PlanExecutor};
pub use llm::{LlmClient, LlmContext};
pub use models::*;
pub use registry::AgentRegistry;
pub use router::{AgentRouter, RouteDecision, RouteSource};
