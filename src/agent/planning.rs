//! Planning agent
//!
//! Keyword self-assessment, LLM planning with a deterministic fallback, and
//! execution against a tool set built fresh for every call.

use crate::agent::format::build_response;
use crate::agent::{Agent, RequestContext};
use crate::execution::{DebugLevel, PlanExecutor};
use crate::llm::LlmContext;
use crate::models::{Adaptations, Assessment, ChatMessage, Plan, Response};
use crate::plan::parse_plan;
use crate::tools::ToolRegistry;
use crate::Result;
use async_trait::async_trait;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Builds the tools an agent may use for one call.
pub type Toolset = Arc<dyn Fn(&LlmContext) -> Result<ToolRegistry> + Send + Sync>;

/// Plan used when the LLM does not produce a usable one.
pub type DefaultPlanner = fn(&str) -> Plan;

const PLANNING_TEMPERATURE: f32 = 0.1;
const CLASSIFICATION_TEMPERATURE: f32 = 0.1;
const HISTORY_WINDOW: usize = 3;
const HISTORY_SNIPPET_CHARS: usize = 100;

/// How keyword and phrase hits become a confidence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Scoring {
    /// Two or more keywords 0.9, one keyword the single-match confidence,
    /// a phrase alone 0.8.
    #[default]
    Tiered,
    /// Each keyword counts once and any phrase counts twice. One or two
    /// points give 0.4 + 0.15 per point, three or more 0.7 + 0.05 per point
    /// capped at 0.95.
    Cumulative,
}

/// Static description of a planning agent.
#[derive(Debug, Clone)]
pub struct AgentProfile {
    pub name: String,
    pub description: String,
    pub agent_type: String,
    /// Subject used in prompts, e.g. "loan portfolio".
    pub domain: String,
    pub capabilities: Vec<String>,
    pub keywords: Vec<String>,
    pub phrases: Vec<String>,
    pub single_match_confidence: f32,
    pub scoring: Scoring,
    pub llm_classification: bool,
    pub planner_role: String,
    pub planning_notes: Vec<String>,
    pub default_adaptations: Adaptations,
}

impl AgentProfile {
    pub fn new(name: &str, description: &str) -> Self {
        Self {
            name: name.to_string(),
            description: description.to_string(),
            agent_type: "analytics_specialist".to_string(),
            domain: name.to_string(),
            capabilities: Vec::new(),
            keywords: Vec::new(),
            phrases: Vec::new(),
            single_match_confidence: 0.7,
            scoring: Scoring::Tiered,
            llm_classification: false,
            planner_role: "You are a planning expert. Create detailed execution plans.".to_string(),
            planning_notes: Vec::new(),
            default_adaptations: Adaptations::default(),
        }
    }

    pub fn agent_type(mut self, agent_type: &str) -> Self {
        self.agent_type = agent_type.to_string();
        self
    }

    pub fn domain(mut self, domain: &str) -> Self {
        self.domain = domain.to_string();
        self
    }

    pub fn capabilities(mut self, capabilities: &[&str]) -> Self {
        self.capabilities = to_strings(capabilities);
        self
    }

    pub fn keywords(mut self, keywords: &[&str]) -> Self {
        self.keywords = to_strings(keywords);
        self
    }

    pub fn phrases(mut self, phrases: &[&str]) -> Self {
        self.phrases = to_strings(phrases);
        self
    }

    pub fn single_match_confidence(mut self, confidence: f32) -> Self {
        self.single_match_confidence = confidence;
        self
    }

    pub fn scoring(mut self, scoring: Scoring) -> Self {
        self.scoring = scoring;
        self
    }

    pub fn llm_classification(mut self, enabled: bool) -> Self {
        self.llm_classification = enabled;
        self
    }

    pub fn planner_role(mut self, role: &str) -> Self {
        self.planner_role = role.to_string();
        self
    }

    pub fn planning_note(mut self, note: &str) -> Self {
        self.planning_notes.push(note.to_string());
        self
    }

    pub fn default_adaptations(mut self, error: &str, no_data: &str) -> Self {
        self.default_adaptations = Adaptations::new(error, no_data);
        self
    }

    /// Keyword score per [`Scoring`]. `None` when nothing matched.
    pub fn keyword_assessment(&self, query: &str) -> Option<Assessment> {
        let query = query.to_lowercase();
        let hits = self
            .keywords
            .iter()
            .filter(|k| query.contains(k.as_str()))
            .count();
        let phrase = self.phrases.iter().any(|p| query.contains(p.as_str()));

        match self.scoring {
            Scoring::Tiered => match hits {
                0 if phrase => Some(Assessment::handles(0.8)),
                0 => None,
                1 => Some(Assessment::handles(self.single_match_confidence)),
                _ => Some(Assessment::handles(0.9)),
            },
            Scoring::Cumulative => {
                let points = hits + if phrase { 2 } else { 0 };
                match points {
                    0 => None,
                    1 | 2 => Some(Assessment::handles(0.4 + 0.15 * points as f32)),
                    _ => Some(Assessment::handles((0.7 + 0.05 * points as f32).min(0.95))),
                }
            }
        }
    }
}

fn to_strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

/// Agent that plans with the LLM and executes against its own tool set.
pub struct PlanningAgent {
    profile: AgentProfile,
    toolset: Toolset,
    default_planner: DefaultPlanner,
}

impl PlanningAgent {
    pub fn new(profile: AgentProfile, toolset: Toolset, default_planner: DefaultPlanner) -> Self {
        Self {
            profile,
            toolset,
            default_planner,
        }
    }

    pub fn profile(&self) -> &AgentProfile {
        &self.profile
    }

    fn tools(&self, llm: &LlmContext) -> Result<ToolRegistry> {
        (self.toolset)(llm)
    }

    async fn classify(&self, query: &str, ctx: &RequestContext) -> Assessment {
        let prompt = format!(
            "Determine if this query is related to {domain}.\nQuery: \"{query}\"\n\n\
             Respond with ONLY a number between 0 and 1 indicating confidence that this is {domain}-related.",
            domain = self.profile.domain,
            query = query,
        );

        match ctx
            .llm()
            .complete(&[ChatMessage::user(prompt)], CLASSIFICATION_TEMPERATURE, Some(10))
            .await
        {
            Ok(reply) => match reply.trim().parse::<f32>() {
                Ok(confidence) => Assessment::new(confidence > 0.5, confidence),
                Err(_) => {
                    debug!(agent = %self.profile.name, reply = %reply, "Classification reply was not a number");
                    Assessment::declines()
                }
            },
            Err(e) => {
                warn!(agent = %self.profile.name, error = %e, "Classification request failed");
                Assessment::declines()
            }
        }
    }

    fn planning_messages(
        &self,
        query: &str,
        history: &[ChatMessage],
        tools: &ToolRegistry,
    ) -> Vec<ChatMessage> {
        let mut notes = String::new();
        for note in &self.profile.planning_notes {
            notes.push_str("IMPORTANT: ");
            notes.push_str(note);
            notes.push_str("\n\n");
        }

        let prompt = format!(
            r#"Create an execution plan to answer this {domain} query: "{query}"

Available tools:
{catalog}

Create a JSON plan with:
- goal: What we're trying to achieve
- steps: Array of steps, each with:
  - step: Step number
  - tool: Tool name to use
  - description: What this step does
  - inputs: Tool inputs (can reference previous outputs with ${{output_key}})
  - output_key: Key to store this step's output
- adaptations: Dictionary with keys:
  - error: What to do if a step fails
  - no_data: What to do if no data is available

{notes}Respond with ONLY valid JSON."#,
            domain = self.profile.domain,
            query = query,
            catalog = tools.catalog(),
            notes = notes,
        );

        let mut system = self.profile.planner_role.clone();
        let recent = &history[history.len().saturating_sub(HISTORY_WINDOW)..];
        if !recent.is_empty() {
            system.push_str("\n\nPrevious conversation context:\n");
            for message in recent {
                let snippet: String = message.content.chars().take(HISTORY_SNIPPET_CHARS).collect();
                system.push_str(&format!("{}: {}...\n", message.role, snippet));
            }
        }

        vec![ChatMessage::system(system), ChatMessage::user(prompt)]
    }

    async fn plan_with(
        &self,
        query: &str,
        history: &[ChatMessage],
        ctx: &RequestContext,
        tools: &ToolRegistry,
    ) -> Plan {
        let messages = self.planning_messages(query, history, tools);

        let planned = match ctx.llm().complete(&messages, PLANNING_TEMPERATURE, None).await {
            Ok(reply) => parse_plan(&reply),
            Err(e) => Err(e),
        };

        let mut plan = match planned {
            Ok(plan) => plan,
            Err(e) => {
                warn!(agent = %self.profile.name, error = %e, "Planning failed, using default plan");
                ctx.debug(
                    &format!("Planning failed ({}), using default plan", e),
                    DebugLevel::Warning,
                );
                (self.default_planner)(query)
            }
        };

        if plan.goal.trim().is_empty() {
            plan.goal = format!("Answer {} query: {}", self.profile.domain, query);
        }
        if plan.adaptations.is_empty() {
            plan.adaptations = self.profile.default_adaptations.clone();
        }

        plan
    }

    async fn run(&self, query: &str, history: &[ChatMessage], ctx: &RequestContext) -> Result<Response> {
        let tools = self.tools(ctx.llm())?;
        ctx.debug(
            &format!("{} processing with tools: {}", self.profile.name, tools.list().join(", ")),
            DebugLevel::Info,
        );

        let plan = self.plan_with(query, history, ctx, &tools).await;
        info!(
            agent = %self.profile.name,
            model = %ctx.llm().model(),
            goal = %plan.goal,
            steps = plan.steps.len(),
            "Executing plan"
        );

        let executor = PlanExecutor::new(tools).with_debug_hook(ctx.debug_hook());
        let execution = executor.execute_plan(&plan).await;

        Ok(build_response(
            &self.profile.name,
            &self.profile.agent_type,
            plan,
            execution,
        ))
    }
}

#[async_trait]
impl Agent for PlanningAgent {
    fn name(&self) -> &str {
        &self.profile.name
    }

    fn description(&self) -> &str {
        &self.profile.description
    }

    fn capabilities(&self) -> Vec<String> {
        self.profile.capabilities.clone()
    }

    async fn can_handle(&self, query: &str, ctx: &RequestContext) -> Assessment {
        if let Some(assessment) = self.profile.keyword_assessment(query) {
            return assessment;
        }
        if self.profile.llm_classification {
            return self.classify(query, ctx).await;
        }
        Assessment::declines()
    }

    async fn create_plan(&self, query: &str, history: &[ChatMessage], ctx: &RequestContext) -> Plan {
        match self.tools(ctx.llm()) {
            Ok(tools) => self.plan_with(query, history, ctx, &tools).await,
            Err(e) => {
                warn!(agent = %self.profile.name, error = %e, "Tool set unavailable, using default plan");
                let mut plan = (self.default_planner)(query);
                if plan.adaptations.is_empty() {
                    plan.adaptations = self.profile.default_adaptations.clone();
                }
                plan
            }
        }
    }

    async fn process(&self, query: &str, history: &[ChatMessage], ctx: &RequestContext) -> Response {
        match self.run(query, history, ctx).await {
            Ok(response) => response,
            Err(e) => {
                warn!(agent = %self.profile.name, error = %e, "Processing failed");
                ctx.debug(&format!("Error in {}: {}", self.profile.name, e), DebugLevel::Error);
                Response::failed(&self.profile.name, e)
            }
        }
    }
}
