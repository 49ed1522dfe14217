//! Catch-all agent for queries no specialist claims
//!
//! Always reports a low confidence so it only wins by default. Instead of
//! running tools it asks the user to clarify and points at specialists.

use crate::agent::{Agent, RequestContext};
use crate::execution::DebugLevel;
use crate::models::{Adaptations, Assessment, ChatMessage, Plan, PlanStep, Response};
use async_trait::async_trait;
use serde_json::json;
use tracing::warn;

pub const UNCERTAIN_CONFIDENCE: f32 = 0.1;
const CLARIFICATION_TEMPERATURE: f32 = 0.7;

/// A specialist the clarification text can point the user to.
#[derive(Debug, Clone)]
pub struct Specialist {
    pub name: String,
    pub summary: String,
    pub keywords: Vec<String>,
}

impl Specialist {
    pub fn new(name: &str, summary: &str, keywords: &[&str]) -> Self {
        Self {
            name: name.to_string(),
            summary: summary.to_string(),
            keywords: keywords.iter().map(|k| k.to_string()).collect(),
        }
    }
}

pub struct UncertainAgent {
    name: String,
    specialists: Vec<Specialist>,
}

impl UncertainAgent {
    pub fn new(specialists: Vec<Specialist>) -> Self {
        Self {
            name: "UncertainAgent".to_string(),
            specialists,
        }
    }

    /// Specialists whose keywords appear in the query, or all of them.
    pub fn suggestions(&self, query: &str) -> Vec<String> {
        let query = query.to_lowercase();
        let matched: Vec<String> = self
            .specialists
            .iter()
            .filter(|s| s.keywords.iter().any(|k| query.contains(k.as_str())))
            .map(|s| s.name.clone())
            .collect();

        if matched.is_empty() {
            self.specialists.iter().map(|s| s.name.clone()).collect()
        } else {
            matched
        }
    }

    fn specialist_list(&self) -> String {
        self.specialists
            .iter()
            .map(|s| format!("- **{}**: {}", s.name, s.summary))
            .collect::<Vec<_>>()
            .join("\n")
    }

    fn system_prompt(&self) -> String {
        format!(
            "You are a helpful banking assistant designed to clarify unclear requests \
             and guide users to the right specialist.\n\n\
             When a user's request is unclear:\n\
             1. Acknowledge that you need clarification\n\
             2. Identify possible interpretations of their request\n\
             3. Ask specific clarifying questions\n\
             4. Explain the available specialists and what they can help with\n\n\
             Available specialists:\n{}",
            self.specialist_list()
        )
    }

    fn fallback_text(&self) -> String {
        format!(
            "I'm having trouble understanding your request. Could you please provide more details?\n\n\
             I can help you with:\n{}\n\nWhat would you like to know more about?",
            self.specialist_list()
        )
    }
}

#[async_trait]
impl Agent for UncertainAgent {
    fn name(&self) -> &str {
        &self.name
    }

    fn description(&self) -> &str {
        "Handles unclear queries and helps users clarify their needs"
    }

    fn capabilities(&self) -> Vec<String> {
        ["Query clarification", "Intent disambiguation", "Agent recommendation", "General assistance"]
            .iter()
            .map(|c| c.to_string())
            .collect()
    }

    async fn can_handle(&self, _query: &str, _ctx: &RequestContext) -> Assessment {
        Assessment::handles(UNCERTAIN_CONFIDENCE)
    }

    async fn create_plan(&self, query: &str, _history: &[ChatMessage], _ctx: &RequestContext) -> Plan {
        Plan::new(
            "Clarify user intent and guide to appropriate specialist",
            vec![PlanStep::new(1, "DirectResponse", "Ask clarifying questions")
                .input("query", query)
                .output("clarification")],
        )
        .with_adaptations(Adaptations::new(
            "Show available specialists",
            "Provide general help options",
        ))
    }

    async fn process(&self, query: &str, history: &[ChatMessage], ctx: &RequestContext) -> Response {
        ctx.debug("UncertainAgent processing unclear query", DebugLevel::Info);

        let mut messages = vec![ChatMessage::system(self.system_prompt())];
        messages.extend(history.iter().cloned());
        messages.push(ChatMessage::user(format!(
            "The user asked: \"{}\"\n\n\
             This request is unclear. Please:\n\
             1. Acknowledge that you need more information\n\
             2. Identify what they might be asking about\n\
             3. Ask clarifying questions\n\
             4. Suggest which specialist could help once clarified",
            query
        )));

        let plan = self.create_plan(query, history, ctx).await;
        let response = match ctx.llm().complete(&messages, CLARIFICATION_TEMPERATURE, None).await {
            Ok(text) => Response::new(&self.name, text)
                .with_metadata("potential_agents", json!(self.suggestions(query))),
            Err(e) => {
                warn!(error = %e, "Clarification request failed, using canned help text");
                ctx.debug(&format!("Error in UncertainAgent: {}", e), DebugLevel::Error);
                Response::new(&self.name, self.fallback_text())
                    .with_metadata("error", e.to_string())
            }
        };

        response
            .with_metadata("agent_type", "clarification_specialist")
            .with_metadata("needs_clarification", true)
            .with_metadata("original_query", query)
            .with_plan(plan)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::LlmContext;
    use crate::test_support::ScriptedLlm;
    use std::sync::Arc;

    fn agent() -> UncertainAgent {
        UncertainAgent::new(vec![
            Specialist::new("LoanPortfolioAgent", "Loans and credit", &["loan", "mortgage"]),
            Specialist::new("DepositAnalyticsAgent", "Accounts and balances", &["account", "balance"]),
        ])
    }

    fn context(llm: Arc<ScriptedLlm>) -> RequestContext {
        RequestContext::new(LlmContext::new(llm, "test-model"))
    }

    #[tokio::test]
    async fn test_always_low_confidence() {
        let ctx = context(Arc::new(ScriptedLlm::new(vec![])));
        let assessment = agent().can_handle("anything at all", &ctx).await;
        assert!(assessment.can_handle);
        assert_eq!(assessment.confidence, UNCERTAIN_CONFIDENCE);
    }

    #[test]
    fn test_suggestions_fall_back_to_everyone() {
        let agent = agent();
        assert_eq!(agent.suggestions("my Balance is wrong"), vec!["DepositAnalyticsAgent"]);
        assert_eq!(agent.suggestions("hello").len(), 2);
    }

    #[tokio::test]
    async fn test_clarification_plan_is_single_step() {
        let ctx = context(Arc::new(ScriptedLlm::new(vec![])));
        let plan = agent().create_plan("huh?", &[], &ctx).await;

        assert_eq!(plan.steps.len(), 1);
        assert_eq!(plan.steps[0].tool_name, "DirectResponse");
        assert_eq!(plan.steps[0].inputs["query"], "huh?");
        assert!(plan.adaptations.error.is_some() && plan.adaptations.no_data.is_some());
    }

    #[tokio::test]
    async fn test_process_uses_llm_text() {
        let llm = Arc::new(ScriptedLlm::new(vec!["Could you clarify which account?"]));
        let response = agent().process("the account thing", &[], &context(llm)).await;

        assert_eq!(response.text, "Could you clarify which account?");
        assert_eq!(response.metadata["needs_clarification"], true);
        assert_eq!(response.metadata["potential_agents"], json!(["DepositAnalyticsAgent"]));
        assert!(!response.is_error());
    }

    #[tokio::test]
    async fn test_process_falls_back_to_canned_text() {
        let response = agent()
            .process("???", &[], &context(Arc::new(ScriptedLlm::failing())))
            .await;

        assert!(response.text.starts_with("I'm having trouble understanding your request."));
        assert!(response.text.contains("**LoanPortfolioAgent**"));
        assert!(response.metadata.contains_key("error"));
    }
}
