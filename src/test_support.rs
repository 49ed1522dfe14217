//! Test doubles shared by unit tests

use crate::agent::{Agent, RequestContext};
use crate::error::OrchestrationError;
use crate::llm::LlmClient;
use crate::models::{Assessment, ChatMessage, Plan, PlanStep, Response};
use crate::tools::{Parameter, Tool, ToolOutput};
use crate::Result;
use async_trait::async_trait;
use serde_json::{json, Map, Value};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

enum StubBehavior {
    Return(Value),
    Echo,
    Fail(Option<String>),
    Error(String),
}

/// Tool with scripted behavior that records every call's arguments.
pub struct StubTool {
    name: String,
    params: Vec<Parameter>,
    behavior: StubBehavior,
    calls: Arc<Mutex<Vec<Map<String, Value>>>>,
}

impl StubTool {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            params: Vec::new(),
            behavior: StubBehavior::Return(json!({ "tool": name })),
            calls: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn returning(mut self, value: Value) -> Self {
        self.behavior = StubBehavior::Return(value);
        self
    }

    pub fn echoing(mut self) -> Self {
        self.behavior = StubBehavior::Echo;
        self
    }

    pub fn failing(mut self, error: Option<&str>) -> Self {
        self.behavior = StubBehavior::Fail(error.map(str::to_string));
        self
    }

    pub fn erroring(mut self, error: &str) -> Self {
        self.behavior = StubBehavior::Error(error.to_string());
        self
    }

    pub fn param(mut self, param: Parameter) -> Self {
        self.params.push(param);
        self
    }

    pub fn calls(&self) -> Vec<Map<String, Value>> {
        self.calls.lock().unwrap().clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }
}

#[async_trait]
impl Tool for StubTool {
    fn name(&self) -> &str {
        &self.name
    }

    fn description(&self) -> &str {
        "Stub tool"
    }

    fn parameters(&self) -> Vec<Parameter> {
        self.params.clone()
    }

    async fn execute(&self, args: &Map<String, Value>) -> Result<ToolOutput> {
        self.calls.lock().unwrap().push(args.clone());
        match &self.behavior {
            StubBehavior::Return(value) => Ok(ToolOutput::ok(value.clone())),
            StubBehavior::Echo => Ok(ToolOutput::ok(Value::Object(args.clone()))),
            StubBehavior::Fail(error) => Ok(ToolOutput {
                success: false,
                result: Value::Null,
                error: error.clone(),
            }),
            StubBehavior::Error(error) => Err(OrchestrationError::DataSource(error.clone())),
        }
    }
}

/// LLM returning queued replies in order. Errors when the queue is empty.
pub struct ScriptedLlm {
    replies: Mutex<VecDeque<String>>,
    always_fail: bool,
    calls: AtomicUsize,
}

impl ScriptedLlm {
    pub fn new(replies: Vec<&str>) -> Self {
        Self {
            replies: Mutex::new(replies.into_iter().map(str::to_string).collect()),
            always_fail: false,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn failing() -> Self {
        Self {
            always_fail: true,
            ..Self::new(vec![])
        }
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl LlmClient for ScriptedLlm {
    async fn complete(
        &self,
        _messages: &[ChatMessage],
        _model: &str,
        _temperature: f32,
        _max_tokens: Option<u32>,
    ) -> Result<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.always_fail {
            return Err(OrchestrationError::LlmError("scripted failure".to_string()));
        }
        self.replies
            .lock()
            .unwrap()
            .pop_front()
            .ok_or_else(|| OrchestrationError::LlmError("no scripted reply left".to_string()))
    }
}

/// Agent with a fixed self-assessment.
pub struct StaticAgent {
    name: String,
    assessment: Assessment,
}

impl StaticAgent {
    pub fn new(name: &str, assessment: Assessment) -> Self {
        Self {
            name: name.to_string(),
            assessment,
        }
    }
}

#[async_trait]
impl Agent for StaticAgent {
    fn name(&self) -> &str {
        &self.name
    }

    fn description(&self) -> &str {
        "Static test agent"
    }

    fn capabilities(&self) -> Vec<String> {
        vec![format!("{} things", self.name)]
    }

    async fn can_handle(&self, _query: &str, _ctx: &RequestContext) -> Assessment {
        self.assessment
    }

    async fn create_plan(&self, query: &str, _history: &[ChatMessage], _ctx: &RequestContext) -> Plan {
        Plan::new(query, vec![PlanStep::new(1, "Noop", "noop")])
    }

    async fn process(&self, query: &str, _history: &[ChatMessage], _ctx: &RequestContext) -> Response {
        Response::new(&self.name, format!("{} handled: {}", self.name, query))
    }
}
