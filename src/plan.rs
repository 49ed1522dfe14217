//! Plan parsing
//!
//! Planning models answer with JSON, often wrapped in prose or code fences.
//! Replies are turned into a strict [`Plan`] here, so malformed plans are
//! rejected before anything executes.

use crate::error::OrchestrationError;
use crate::models::Plan;
use crate::Result;
use serde_json::{Map, Value};
use std::collections::HashSet;

/// First well-formed JSON object embedded in `text`.
pub fn extract_json_object(text: &str) -> Option<Value> {
    let mut offset = 0;

    while let Some(pos) = text[offset..].find('{') {
        let start = offset + pos;
        let mut stream = serde_json::Deserializer::from_str(&text[start..]).into_iter::<Value>();
        if let Some(Ok(value @ Value::Object(_))) = stream.next() {
            return Some(value);
        }
        offset = start + 1;
    }

    None
}

/// Parse a planner reply into a validated plan.
pub fn parse_plan(response: &str) -> Result<Plan> {
    let value = serde_json::from_str::<Value>(response.trim())
        .ok()
        .filter(Value::is_object)
        .or_else(|| extract_json_object(response))
        .ok_or_else(|| {
            OrchestrationError::PlanMalformed("No JSON object in planner response".to_string())
        })?;

    plan_from_value(value)
}

pub fn plan_from_value(value: Value) -> Result<Plan> {
    let Value::Object(mut root) = value else {
        return Err(OrchestrationError::PlanMalformed("Plan is not a map".to_string()));
    };

    let steps = match root.remove("steps") {
        None | Some(Value::Null) => {
            return Err(OrchestrationError::PlanMalformed("No steps in plan".to_string()))
        }
        Some(Value::Array(steps)) if steps.is_empty() => {
            return Err(OrchestrationError::PlanMalformed("Plan has no steps".to_string()))
        }
        Some(Value::Array(steps)) => steps,
        Some(_) => {
            return Err(OrchestrationError::PlanMalformed("Steps is not a list".to_string()))
        }
    };

    let steps = steps
        .into_iter()
        .enumerate()
        .map(|(position, step)| normalize_step(position, step))
        .collect::<Result<Vec<_>>>()?;
    root.insert("steps".to_string(), Value::Array(steps));

    if !matches!(root.get("goal"), Some(Value::String(_))) {
        root.remove("goal");
    }
    normalize_adaptations(&mut root);

    let plan: Plan = serde_json::from_value(Value::Object(root))
        .map_err(|e| OrchestrationError::PlanMalformed(e.to_string()))?;

    let mut seen = HashSet::new();
    for step in &plan.steps {
        let key = step.effective_output_key();
        if !seen.insert(key.clone()) {
            return Err(OrchestrationError::PlanMalformed(format!(
                "Duplicate output key '{}' at step {}",
                key, step.index
            )));
        }
    }

    Ok(plan)
}

fn normalize_step(position: usize, step: Value) -> Result<Value> {
    let Value::Object(mut step) = step else {
        return Err(OrchestrationError::PlanMalformed(format!(
            "Step {} is not a map",
            position + 1
        )));
    };

    let parse_index = |value: Option<Value>| match value {
        Some(Value::Number(n)) => n.as_u64(),
        Some(Value::String(s)) => s.trim().parse::<u64>().ok(),
        _ => None,
    };
    let primary = parse_index(step.remove("step"));
    let alias = parse_index(step.remove("index"));
    let index = primary.or(alias).unwrap_or(position as u64 + 1);
    step.insert("step".to_string(), Value::from(index));

    // Canonical keys win over their aliases
    collapse_alias(&mut step, "tool", "tool_name");
    collapse_alias(&mut step, "inputs", "parameters");
    if step.get("output_key").is_some_and(|v| !v.is_string()) {
        step.remove("output_key");
    }
    if step.get("description").is_some_and(|v| !v.is_string()) {
        step.remove("description");
    }

    Ok(Value::Object(step))
}

/// Null values count as absent. Leaves at most one of the two keys.
fn collapse_alias(step: &mut Map<String, Value>, canonical: &str, alias: &str) {
    if step.get(canonical).is_some_and(Value::is_null) {
        step.remove(canonical);
    }
    if step.get(alias).is_some_and(Value::is_null) {
        step.remove(alias);
    }
    if step.contains_key(canonical) {
        step.remove(alias);
    }
}

fn normalize_adaptations(root: &mut Map<String, Value>) {
    if !matches!(root.get("adaptations"), Some(Value::Object(_))) {
        root.remove("adaptations");
        return;
    }
    let Some(Value::Object(adaptations)) = root.get_mut("adaptations") else {
        return;
    };

    for key in ["error", "no_data"] {
        let replacement = match adaptations.get(key) {
            Some(Value::String(_)) | None => continue,
            Some(Value::Null) => None,
            Some(other) => Some(Value::String(other.to_string())),
        };
        match replacement {
            Some(text) => {
                adaptations.insert(key.to_string(), text);
            }
            None => {
                adaptations.remove(key);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_extract_first_object_from_prose() {
        let text = "Sure! Here is the routing:\n{\"agent_name\": \"LoanAgent\", \"confidence\": 0.8} and {\"other\": 1}";
        let value = extract_json_object(text).unwrap();
        assert_eq!(value["agent_name"], "LoanAgent");
    }

    #[test]
    fn test_extract_skips_broken_braces() {
        let text = "{not json} then ```json\n{\"a\": {\"b\": 2}}\n```";
        assert_eq!(extract_json_object(text), Some(json!({ "a": { "b": 2 } })));
        assert_eq!(extract_json_object("no braces here"), None);
    }

    #[test]
    fn test_parse_plan_from_fenced_reply() {
        let reply = r#"```json
{
  "goal": "Analyze loan portfolio",
  "steps": [
    {"step": "1", "tool": "LoanQuery", "description": "Get data",
     "inputs": {"query_type": "portfolio_summary"}, "output_key": "portfolio_data"},
    {"tool": "AnalyzeLoanPortfolio", "inputs": {"portfolio_data": "${portfolio_data}"}, "output_key": "analysis"}
  ],
  "adaptations": {"error": "Provide general insights", "no_data": null}
}
```"#;

        let plan = parse_plan(reply).unwrap();
        assert_eq!(plan.goal, "Analyze loan portfolio");
        assert_eq!(plan.steps[0].index, 1);
        assert_eq!(plan.steps[1].index, 2);
        assert_eq!(plan.steps[1].inputs["portfolio_data"], "${portfolio_data}");
        assert_eq!(plan.adaptations.error.as_deref(), Some("Provide general insights"));
        assert!(plan.adaptations.no_data.is_none());
    }

    #[test]
    fn test_rejects_missing_or_empty_steps() {
        assert!(matches!(
            parse_plan(r#"{"goal": "x"}"#),
            Err(OrchestrationError::PlanMalformed(_))
        ));
        assert!(matches!(
            parse_plan(r#"{"goal": "x", "steps": []}"#),
            Err(OrchestrationError::PlanMalformed(_))
        ));
        assert!(matches!(
            parse_plan(r#"{"goal": "x", "steps": "LoanQuery"}"#),
            Err(OrchestrationError::PlanMalformed(_))
        ));
        assert!(matches!(
            parse_plan("I cannot help with that."),
            Err(OrchestrationError::PlanMalformed(_))
        ));
    }

    #[test]
    fn test_rejects_step_without_tool() {
        let err = parse_plan(r#"{"steps": [{"step": 1, "inputs": {}}]}"#).unwrap_err();
        assert!(matches!(err, OrchestrationError::PlanMalformed(_)));
    }

    #[test]
    fn test_canonical_keys_win_over_aliases() {
        let plan = parse_plan(
            r#"{"steps": [
                {"step": 1, "index": 7, "tool": "LoanQuery", "tool_name": "DepositQuery",
                 "inputs": {"query_type": "portfolio_summary"},
                 "parameters": {"query_type": "risk_analysis"}},
                {"index": "2", "tool_name": "AnalyzeLoanPortfolio",
                 "inputs": null, "parameters": {"portfolio_data": "${step_1_output}"}}
            ]}"#,
        )
        .unwrap();

        assert_eq!(plan.steps[0].index, 1);
        assert_eq!(plan.steps[0].tool_name, "LoanQuery");
        assert_eq!(plan.steps[0].inputs["query_type"], "portfolio_summary");
        assert_eq!(plan.steps[1].index, 2);
        assert_eq!(plan.steps[1].tool_name, "AnalyzeLoanPortfolio");
        assert_eq!(plan.steps[1].inputs["portfolio_data"], "${step_1_output}");
    }

    #[test]
    fn test_rejects_duplicate_output_keys() {
        let err = parse_plan(
            r#"{"steps": [
                {"step": 1, "tool": "A", "output_key": "data"},
                {"step": 2, "tool": "B", "output_key": "data"}
            ]}"#,
        )
        .unwrap_err();
        assert!(err.to_string().contains("Duplicate output key"));
    }

    #[test]
    fn test_non_map_adaptations_are_dropped() {
        let plan = parse_plan(r#"{"steps": [{"tool": "A"}], "adaptations": "retry"}"#).unwrap();
        assert!(plan.adaptations.is_empty());
        assert_eq!(plan.goal, "");
    }
}
