//! Turning an execution result into user-facing text

use crate::models::{ExecutionResult, Plan, Response};
use serde_json::Value;

const HEADLINE_KEYS: [&str; 5] = ["summary", "response", "message", "answer", "analysis"];

/// Attach text, data and the diagnostic trace to a response.
pub fn build_response(agent: &str, agent_type: &str, plan: Plan, execution: ExecutionResult) -> Response {
    let text = render_text(&plan, &execution);
    let steps_executed = execution.steps_executed.len();

    let mut response = Response::new(agent, text)
        .with_metadata("agent_type", agent_type)
        .with_metadata("success", execution.success)
        .with_metadata("steps_executed", steps_executed)
        .with_metadata("goal", plan.goal.clone());

    if let Some(output) = &execution.final_output {
        response = response.with_data(output.clone());
    }

    response.with_plan(plan).with_execution(execution)
}

pub fn render_text(plan: &Plan, execution: &ExecutionResult) -> String {
    let mut out = match &execution.final_output {
        Some(output) if output.get("adaptation_applied").is_some() => render_adaptation(output),
        Some(output) => render_output(output),
        None if !execution.errors.is_empty() => render_errors(&execution.errors),
        None => "The analysis completed but produced no results.".to_string(),
    };

    let empty = execution.final_output.as_ref().map_or(true, is_empty_value);
    if execution.success && empty {
        if let Some(note) = &plan.adaptations.no_data {
            out.push_str("\n\n");
            out.push_str(note);
        }
    }

    out
}

fn render_adaptation(output: &Value) -> String {
    let mut out = String::new();
    if let Some(message) = output.get("message").and_then(Value::as_str) {
        out.push_str(message);
    }
    if let Some(error) = output.get("original_error").and_then(Value::as_str) {
        if !out.is_empty() {
            out.push_str("\n\n");
        }
        out.push_str(&format!("Some data could not be retrieved: {}", error));
    }
    out
}

fn render_output(output: &Value) -> String {
    let mut out = String::new();

    if let Some(headline) = HEADLINE_KEYS
        .iter()
        .find_map(|key| output.get(*key).and_then(Value::as_str))
    {
        out.push_str(headline);
    }

    for (key, title) in [("insights", "**Key Insights:**"), ("recommendations", "**Recommendations:**")] {
        let Some(items) = output.get(key).and_then(Value::as_array) else {
            continue;
        };
        if items.is_empty() {
            continue;
        }
        if !out.is_empty() {
            out.push_str("\n\n");
        }
        out.push_str(title);
        for item in items {
            out.push_str("\n- ");
            out.push_str(&text_of(item));
        }
    }

    if out.is_empty() {
        let dump = serde_json::to_string_pretty(output).unwrap_or_else(|_| output.to_string());
        out.push_str("Here is what I found:\n\n```json\n");
        out.push_str(&dump);
        out.push_str("\n```");
    }

    out
}

fn render_errors(errors: &[String]) -> String {
    let mut out = String::from("I wasn't able to complete the analysis.\n\nErrors encountered:");
    for error in errors {
        out.push_str("\n- ");
        out.push_str(error);
    }
    out
}

fn is_empty_value(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(s) => s.trim().is_empty(),
        Value::Array(items) => items.is_empty(),
        Value::Object(map) => map.is_empty(),
        _ => false,
    }
}

fn text_of(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
