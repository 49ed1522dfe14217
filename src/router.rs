//! Query routing
//!
//! Every agent scores the query locally. When the best score is weak the
//! LLM is asked to pick an agent, and when the result is still weak the
//! default agent takes the query.

use crate::agent::{Agent, RequestContext};
use crate::config::RouterConfig;
use crate::error::OrchestrationError;
use crate::execution::DebugLevel;
use crate::models::{AgentDescriptor, ChatMessage, Response};
use crate::plan::extract_json_object;
use crate::Result;
use serde::Serialize;
use serde_json::Value;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RouteSource {
    /// Won on its own self-assessment.
    Local,
    /// Picked by the LLM routing pass.
    Llm,
    /// Nothing was confident enough; default agent.
    Fallback,
}

#[derive(Clone)]
pub struct RouteDecision {
    pub agent: Arc<dyn Agent>,
    pub confidence: f32,
    pub source: RouteSource,
}

impl fmt::Debug for RouteDecision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RouteDecision")
            .field("agent", &self.agent.name())
            .field("confidence", &self.confidence)
            .field("source", &self.source)
            .finish()
    }
}

#[derive(Default)]
pub struct AgentRouterBuilder {
    agents: Vec<Arc<dyn Agent>>,
    default_index: Option<usize>,
    config: RouterConfig,
}

impl AgentRouterBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn agent(mut self, agent: Arc<dyn Agent>) -> Self {
        self.agents.push(agent);
        self
    }

    /// Register `agent` and mark it as the default. A later call replaces the mark.
    pub fn default_agent(mut self, agent: Arc<dyn Agent>) -> Self {
        self.default_index = Some(self.agents.len());
        self.agents.push(agent);
        self
    }

    pub fn config(mut self, config: RouterConfig) -> Self {
        self.config = config;
        self
    }

    pub fn build(self) -> Result<AgentRouter> {
        let default_index = self.default_index.ok_or_else(|| {
            OrchestrationError::Routing("Router needs a default agent".to_string())
        })?;

        Ok(AgentRouter {
            agents: self.agents,
            default_index,
            config: self.config,
        })
    }
}

/// Immutable after build; safe to share across requests.
pub struct AgentRouter {
    agents: Vec<Arc<dyn Agent>>,
    default_index: usize,
    config: RouterConfig,
}

impl AgentRouter {
    pub fn builder() -> AgentRouterBuilder {
        AgentRouterBuilder::new()
    }

    pub fn agents(&self) -> &[Arc<dyn Agent>] {
        &self.agents
    }

    pub fn default_agent(&self) -> Arc<dyn Agent> {
        Arc::clone(&self.agents[self.default_index])
    }

    pub fn config(&self) -> &RouterConfig {
        &self.config
    }

    /// Case-insensitive lookup.
    pub fn agent_by_name(&self, name: &str) -> Option<Arc<dyn Agent>> {
        self.agents
            .iter()
            .find(|a| a.name().eq_ignore_ascii_case(name))
            .cloned()
    }

    pub async fn route(&self, query: &str, ctx: &RequestContext) -> RouteDecision {
        let mut best: Option<(Arc<dyn Agent>, f32, RouteSource)> = None;
        let mut best_confidence = 0.0_f32;

        for agent in &self.agents {
            let assessment = agent.can_handle(query, ctx).await;
            debug!(
                agent = %agent.name(),
                can_handle = assessment.can_handle,
                confidence = assessment.confidence,
                "Agent self-assessment"
            );
            // Strict comparison: earlier registration wins ties
            if assessment.can_handle && assessment.confidence > best_confidence {
                best_confidence = assessment.confidence;
                best = Some((Arc::clone(agent), assessment.confidence, RouteSource::Local));
            }
        }

        if best_confidence < self.config.escalation_threshold {
            if let Some((agent, confidence)) = self.llm_route(query, ctx).await {
                if confidence > best_confidence {
                    best_confidence = confidence;
                    best = Some((agent, confidence, RouteSource::Llm));
                }
            }
        }

        let decision = match best {
            Some((agent, confidence, source)) if confidence >= self.config.fallback_threshold => {
                RouteDecision {
                    agent,
                    confidence,
                    source,
                }
            }
            _ => RouteDecision {
                agent: self.default_agent(),
                confidence: self.config.fallback_confidence,
                source: RouteSource::Fallback,
            },
        };

        info!(
            agent = %decision.agent.name(),
            confidence = decision.confidence,
            source = ?decision.source,
            "Routed query"
        );
        ctx.debug(
            &format!(
                "Routed to {} (confidence {:.2})",
                decision.agent.name(),
                decision.confidence
            ),
            DebugLevel::Info,
        );

        decision
    }

    /// Route, then let the chosen agent process the query.
    pub async fn dispatch(
        &self,
        query: &str,
        history: &[ChatMessage],
        ctx: &RequestContext,
    ) -> (RouteDecision, Response) {
        let decision = self.route(query, ctx).await;
        let response = decision.agent.process(query, history, ctx).await;
        (decision, response)
    }

    fn routing_messages(&self, query: &str) -> Vec<ChatMessage> {
        let descriptors: Vec<AgentDescriptor> = self.agents.iter().map(|a| a.descriptor()).collect();
        let catalog = serde_json::to_string_pretty(&descriptors).unwrap_or_default();

        let prompt = format!(
            r#"You are a query router for a banking system. Analyze the user query and determine which agent should handle it.

Available agents:
{catalog}

User query: "{query}"

Respond with ONLY a JSON object in this format:
{{
    "agent_name": "name of the most appropriate agent",
    "confidence": 0.0 to 1.0,
    "reasoning": "brief explanation"
}}"#,
            catalog = catalog,
            query = query,
        );

        vec![
            ChatMessage::system("You are a precise query routing system. Always respond with valid JSON."),
            ChatMessage::user(prompt),
        ]
    }

    /// Any failure here means "no opinion".
    async fn llm_route(&self, query: &str, ctx: &RequestContext) -> Option<(Arc<dyn Agent>, f32)> {
        let messages = self.routing_messages(query);
        let reply = match ctx
            .llm()
            .complete(&messages, self.config.routing_temperature, None)
            .await
        {
            Ok(reply) => reply,
            Err(e) => {
                warn!(error = %e, "LLM routing failed");
                return None;
            }
        };

        let Some(choice) = extract_json_object(&reply) else {
            debug!(reply = %reply, "LLM routing reply had no JSON object");
            return None;
        };

        let name = choice.get("agent_name").and_then(Value::as_str)?;
        let confidence = match choice.get("confidence") {
            Some(Value::Number(n)) => n.as_f64().unwrap_or(0.0) as f32,
            Some(Value::String(s)) => s.trim().parse().unwrap_or(0.0),
            _ => 0.0,
        };

        match self.agent_by_name(name) {
            Some(agent) => Some((agent, confidence.clamp(0.0, 1.0))),
            None => {
                debug!(agent_name = %name, "LLM picked an unknown agent");
                None
            }
        }
    }
}
