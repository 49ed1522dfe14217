//! Core data models shared by the router, the agents and the executor

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use uuid::Uuid;

//
// ================= Plan =================
//

/// Declarative list of tool invocations produced by an agent.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Plan {
    #[serde(default)]
    pub goal: String,
    #[serde(default)]
    pub steps: Vec<PlanStep>,
    #[serde(default)]
    pub adaptations: Adaptations,
}

impl Plan {
    pub fn new(goal: impl Into<String>, steps: Vec<PlanStep>) -> Self {
        Self {
            goal: goal.into(),
            steps,
            adaptations: Adaptations::default(),
        }
    }

    pub fn with_adaptations(mut self, adaptations: Adaptations) -> Self {
        self.adaptations = adaptations;
        self
    }
}

/// Recovery hints consulted when a step fails or a run yields nothing.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Adaptations {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub no_data: Option<String>,
}

impl Adaptations {
    pub fn new(error: impl Into<String>, no_data: impl Into<String>) -> Self {
        Self {
            error: Some(error.into()),
            no_data: Some(no_data.into()),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.error.is_none() && self.no_data.is_none()
    }
}

/// One planned tool call. Field names on the wire follow what planning
/// prompts ask the model for (`step`, `tool`, `inputs`).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PlanStep {
    #[serde(rename = "step", alias = "index")]
    pub index: u32,
    #[serde(rename = "tool", alias = "tool_name")]
    pub tool_name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default, alias = "parameters")]
    pub inputs: Map<String, Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output_key: Option<String>,
}

impl PlanStep {
    pub fn new(index: u32, tool_name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            index,
            tool_name: tool_name.into(),
            description: description.into(),
            inputs: Map::new(),
            output_key: None,
        }
    }

    pub fn input(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.inputs.insert(key.into(), value.into());
        self
    }

    pub fn output(mut self, key: impl Into<String>) -> Self {
        self.output_key = Some(key.into());
        self
    }

    /// Key under which a successful result is stored.
    pub fn effective_output_key(&self) -> String {
        match &self.output_key {
            Some(key) if !key.trim().is_empty() => key.clone(),
            _ => format!("step_{}_output", self.index),
        }
    }
}

//
// ================= Execution =================
//

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum StepStatus {
    Succeeded,
    Failed,
    Adapted,
}

/// Outcome of one step attempt (or of a synthetic adaptation).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StepResult {
    pub index: u32,
    pub tool_name: String,
    pub description: String,
    pub status: StepStatus,
    pub success: bool,
    pub output: Option<Value>,
    pub error: Option<String>,
}

impl StepResult {
    pub fn succeeded(step: &PlanStep, output: Value) -> Self {
        Self {
            index: step.index,
            tool_name: step.tool_name.clone(),
            description: step.description.clone(),
            status: StepStatus::Succeeded,
            success: true,
            output: Some(output),
            error: None,
        }
    }

    pub fn failed(step: &PlanStep, error: impl Into<String>) -> Self {
        Self {
            index: step.index,
            tool_name: step.tool_name.clone(),
            description: step.description.clone(),
            status: StepStatus::Failed,
            success: false,
            output: None,
            error: Some(error.into()),
        }
    }

    /// Synthetic result standing in for a failed step.
    pub fn adapted(step: &PlanStep, strategy: &str, original_error: &str) -> Self {
        Self {
            index: step.index,
            tool_name: "adaptation".to_string(),
            description: format!("Adaptation: {}", strategy),
            status: StepStatus::Adapted,
            success: true,
            output: Some(serde_json::json!({
                "adaptation_applied": strategy,
                "original_error": original_error,
                "message": strategy,
            })),
            error: None,
        }
    }
}

/// Aggregate outcome of one `execute_plan` call.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ExecutionResult {
    pub run_id: Uuid,
    pub goal: String,
    pub steps_executed: Vec<StepResult>,
    pub final_output: Option<Value>,
    pub success: bool,
    pub errors: Vec<String>,
    /// Snapshot of the execution context when the run ended.
    #[serde(default)]
    pub outputs: Map<String, Value>,
}

//
// ================= Agents =================
//

/// Agent summary used in the routing prompt.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AgentDescriptor {
    pub name: String,
    pub description: String,
    pub capabilities: Vec<String>,
}

/// An agent's self-assessment for a query.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Assessment {
    pub can_handle: bool,
    pub confidence: f32,
}

impl Assessment {
    pub fn new(can_handle: bool, confidence: f32) -> Self {
        Self {
            can_handle,
            confidence: confidence.clamp(0.0, 1.0),
        }
    }

    pub fn handles(confidence: f32) -> Self {
        Self::new(true, confidence)
    }

    pub fn declines() -> Self {
        Self::new(false, 0.0)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: "system".into(),
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".into(),
            content: content.into(),
        }
    }
}

//
// ================= Response =================
//

/// User-facing answer. Always produced, even when processing failed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Response {
    pub response_id: Uuid,
    pub agent: String,
    #[serde(rename = "response")]
    pub text: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub metadata: Map<String, Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub plan: Option<Plan>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub execution: Option<ExecutionResult>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl Response {
    pub fn new(agent: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            response_id: Uuid::new_v4(),
            agent: agent.into(),
            text: text.into(),
            data: None,
            metadata: Map::new(),
            plan: None,
            execution: None,
            error: None,
            created_at: Utc::now(),
        }
    }

    pub fn failed(agent: impl Into<String>, error: impl fmt::Display) -> Self {
        let message = error.to_string();
        let mut response = Self::new(
            agent,
            format!("I encountered an error while processing your request: {}", message),
        );
        response.error = Some(message);
        response
    }

    pub fn with_data(mut self, data: Value) -> Self {
        self.data = Some(data);
        self
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    pub fn with_plan(mut self, plan: Plan) -> Self {
        self.plan = Some(plan);
        self
    }

    pub fn with_execution(mut self, execution: ExecutionResult) -> Self {
        self.execution = Some(execution);
        self
    }

    pub fn is_error(&self) -> bool {
        self.error.is_some()
    }
}
