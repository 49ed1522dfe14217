//! Tool trait and registry
//!
//! A tool is a single-purpose callable with a declared parameter schema.
//! Registries are built per call and never mutated afterwards.

use crate::error::OrchestrationError;
use crate::Result;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

pub mod banking;
pub mod data;

pub use banking::{AnalysisTool, FreshnessTool, RecordQueryTool};
pub use data::{DataSource, InMemoryDataSource};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ParamType {
    String,
    Number,
    Boolean,
    Dict,
    List,
}

impl fmt::Display for ParamType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ParamType::String => "string",
            ParamType::Number => "number",
            ParamType::Boolean => "boolean",
            ParamType::Dict => "dict",
            ParamType::List => "list",
        };
        write!(f, "{}", s)
    }
}

/// One declared tool parameter.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Parameter {
    pub name: String,
    #[serde(rename = "type")]
    pub kind: ParamType,
    pub description: String,
    #[serde(default)]
    pub optional: bool,
}

impl Parameter {
    pub fn required(name: &str, kind: ParamType, description: &str) -> Self {
        Self {
            name: name.to_string(),
            kind,
            description: description.to_string(),
            optional: false,
        }
    }

    pub fn optional(name: &str, kind: ParamType, description: &str) -> Self {
        Self {
            optional: true,
            ..Self::required(name, kind, description)
        }
    }
}

/// What a tool reports back to the executor.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ToolOutput {
    pub success: bool,
    pub result: Value,
    pub error: Option<String>,
}

impl ToolOutput {
    pub fn ok(result: Value) -> Self {
        Self {
            success: true,
            result,
            error: None,
        }
    }

    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            success: false,
            result: Value::Null,
            error: Some(error.into()),
        }
    }
}

/// Trait for a single tool
#[async_trait::async_trait]
pub trait Tool: Send + Sync {
    fn name(&self) -> &str;
    fn description(&self) -> &str;
    fn parameters(&self) -> Vec<Parameter>;

    /// Presence check only: every non-optional parameter must be supplied.
    fn validate(&self, args: &Map<String, Value>) -> Result<()> {
        let missing: Vec<String> = self
            .parameters()
            .into_iter()
            .filter(|p| !p.optional && !args.contains_key(&p.name))
            .map(|p| p.name)
            .collect();

        if missing.is_empty() {
            Ok(())
        } else {
            Err(OrchestrationError::Validation(format!(
                "Missing required parameters: {}",
                missing.join(", ")
            )))
        }
    }

    async fn execute(&self, args: &Map<String, Value>) -> Result<ToolOutput>;

    /// One-line catalog entry used in planning prompts.
    fn signature(&self) -> String {
        let params: Vec<String> = self
            .parameters()
            .iter()
            .map(|p| {
                if p.optional {
                    format!("{} ({}, optional)", p.name, p.kind)
                } else {
                    format!("{} ({})", p.name, p.kind)
                }
            })
            .collect();
        format!("{} - {}. Requires: {}", self.name(), self.description(), params.join(", "))
    }
}

/// Tool registry for looking up tools by name
pub struct ToolRegistry {
    tools: HashMap<String, Arc<dyn Tool>>,
    order: Vec<String>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self {
            tools: HashMap::new(),
            order: Vec::new(),
        }
    }

    pub fn register(&mut self, tool: Arc<dyn Tool>) {
        let name = tool.name().to_string();
        if self.tools.insert(name.clone(), tool).is_none() {
            self.order.push(name);
        }
    }

    pub fn with_tool(mut self, tool: Arc<dyn Tool>) -> Self {
        self.register(tool);
        self
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn Tool>> {
        self.tools.get(name).cloned()
    }

    /// Tool names in registration order.
    pub fn list(&self) -> Vec<&str> {
        self.order.iter().map(|s| s.as_str()).collect()
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    /// Numbered tool catalog for planning prompts.
    pub fn catalog(&self) -> String {
        self.order
            .iter()
            .filter_map(|name| self.tools.get(name))
            .enumerate()
            .map(|(i, tool)| format!("{}. {}", i + 1, tool.signature()))
            .collect::<Vec<_>>()
            .join("\n")
    }
}

impl Default for ToolRegistry {
    fn default() -> Self {
        Self::new()
    }
}
