//! Plan executor
//!
//! Runs plan steps strictly in order against a fresh execution context.
//! Step failures are recorded, never raised: the adaptation hint decides
//! whether the run continues or halts.

use crate::error::OrchestrationError;
use crate::models::{ExecutionResult, Plan, PlanStep, StepResult};
use crate::tools::ToolRegistry;
use serde_json::Value;
use std::fmt;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, warn};
use uuid::Uuid;

pub mod context;
pub mod resolver;

pub use context::ExecutionContext;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DebugLevel {
    Info,
    Warning,
    Error,
}

impl DebugLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            DebugLevel::Info => "INFO",
            DebugLevel::Warning => "WARNING",
            DebugLevel::Error => "ERROR",
        }
    }
}

impl fmt::Display for DebugLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Caller-supplied observer. Must not influence control flow.
pub type DebugHook = Arc<dyn Fn(&str, DebugLevel) + Send + Sync>;

/// Executes a plan step-by-step against an immutable tool set
pub struct PlanExecutor {
    tools: ToolRegistry,
    debug_hook: Option<DebugHook>,
}

impl PlanExecutor {
    pub fn new(tools: ToolRegistry) -> Self {
        Self {
            tools,
            debug_hook: None,
        }
    }

    pub fn with_debug_hook(mut self, hook: Option<DebugHook>) -> Self {
        self.debug_hook = hook;
        self
    }

    fn emit(&self, message: &str, level: DebugLevel) {
        if let Some(hook) = &self.debug_hook {
            hook(message, level);
        }
    }

    /// Execute all steps in order.
    pub async fn execute_plan(&self, plan: &Plan) -> ExecutionResult {
        let run_id = Uuid::new_v4();
        let mut ctx = ExecutionContext::new();
        let mut steps_executed = Vec::with_capacity(plan.steps.len());
        let mut errors = Vec::new();
        let mut success = true;

        debug!(%run_id, goal = %plan.goal, step_count = plan.steps.len(), "Starting plan execution");
        self.emit(
            &format!("Executing plan with {} steps", plan.steps.len()),
            DebugLevel::Info,
        );

        for step in &plan.steps {
            self.emit(
                &format!("Executing step {}: {}", step.index, step.tool_name),
                DebugLevel::Info,
            );

            let start = Instant::now();
            let outcome = self.execute_step(step, &mut ctx).await;
            let elapsed_ms = start.elapsed().as_millis() as u64;

            match outcome {
                Ok(output) => {
                    debug!(%run_id, step = step.index, tool_name = %step.tool_name, elapsed_ms, "Step succeeded");
                    self.emit(
                        &format!("Step {} completed successfully", step.index),
                        DebugLevel::Info,
                    );
                    steps_executed.push(StepResult::succeeded(step, output));
                }
                Err(error) => {
                    success = false;
                    let message = format!("Step {} failed: {}", step.index, error);
                    warn!(%run_id, step = step.index, tool_name = %step.tool_name, elapsed_ms, %error, "Step failed");
                    self.emit(&message, DebugLevel::Error);
                    errors.push(message);
                    steps_executed.push(StepResult::failed(step, error.clone()));

                    match &plan.adaptations.error {
                        Some(strategy) => {
                            self.emit("Trying adaptation strategy...", DebugLevel::Info);
                            steps_executed.push(StepResult::adapted(step, strategy, &error));
                        }
                        None => {
                            warn!(%run_id, step = step.index, "Halting execution due to step failure");
                            self.emit(
                                &format!("Halting plan after step {}", step.index),
                                DebugLevel::Warning,
                            );
                            break;
                        }
                    }
                }
            }
        }

        let final_output = steps_executed
            .last()
            .filter(|s| s.success)
            .and_then(|s| s.output.clone())
            .filter(|v| !v.is_null());

        debug!(
            %run_id,
            executed = steps_executed.len(),
            success,
            "Plan execution completed"
        );

        ExecutionResult {
            run_id,
            goal: plan.goal.clone(),
            steps_executed,
            final_output,
            success,
            errors,
            outputs: ctx.into_map(),
        }
    }

    /// RESOLVING → VALIDATING → EXECUTING for one step. The error string is
    /// what ends up in the step result.
    async fn execute_step(
        &self,
        step: &PlanStep,
        ctx: &mut ExecutionContext,
    ) -> std::result::Result<Value, String> {
        let resolved = resolver::resolve_inputs(&step.inputs, ctx);

        let tool = self
            .tools
            .get(&step.tool_name)
            .ok_or_else(|| OrchestrationError::ToolNotFound(step.tool_name.clone()).to_string())?;

        tool.validate(&resolved).map_err(|e| e.to_string())?;

        let output = tool.execute(&resolved).await.map_err(|e| e.to_string())?;

        if output.success {
            ctx.insert(step.effective_output_key(), output.result.clone());
            Ok(output.result)
        } else {
            Err(output
                .error
                .filter(|e| !e.trim().is_empty())
                .unwrap_or_else(|| "Tool execution failed".to_string()))
        }
    }
}
