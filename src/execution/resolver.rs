//! `${path}` references in step inputs
//!
//! A string input is parsed into a [`Template`]. A string that is exactly one
//! reference resolves to the referenced value itself, keeping its type. Any
//! other string is interpolated: each reference is replaced by the text form
//! of its value, and references that do not resolve stay as written.

use crate::execution::context::ExecutionContext;
use serde_json::{Map, Value};
use std::fmt;
use tracing::warn;

/// Dot-separated path into the execution context.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reference {
    raw: String,
    segments: Vec<String>,
}

impl Reference {
    pub fn new(path: &str) -> Self {
        Self {
            raw: path.to_string(),
            segments: path.split('.').map(str::to_string).collect(),
        }
    }

    pub fn segments(&self) -> &[String] {
        &self.segments
    }
}

impl fmt::Display for Reference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Segment {
    Text(String),
    Ref(Reference),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Template {
    /// The whole string is `${path}`.
    Whole(Reference),
    /// Literal text with zero or more embedded references.
    Interpolated(Vec<Segment>),
}

impl Template {
    pub fn parse(text: &str) -> Self {
        if let Some(inner) = text
            .strip_prefix("${")
            .and_then(|rest| rest.strip_suffix('}'))
        {
            if !inner.is_empty() && !inner.contains('}') {
                return Template::Whole(Reference::new(inner));
            }
        }

        let mut segments = Vec::new();
        let mut literal = String::new();
        let mut rest = text;

        while let Some(start) = rest.find("${") {
            let after = &rest[start + 2..];
            match after.find('}') {
                Some(end) if end > 0 => {
                    literal.push_str(&rest[..start]);
                    if !literal.is_empty() {
                        segments.push(Segment::Text(std::mem::take(&mut literal)));
                    }
                    segments.push(Segment::Ref(Reference::new(&after[..end])));
                    rest = &after[end + 1..];
                }
                // `${}` is not a reference
                Some(_) => {
                    literal.push_str(&rest[..start + 2]);
                    rest = after;
                }
                None => break,
            }
        }

        literal.push_str(rest);
        if !literal.is_empty() {
            segments.push(Segment::Text(literal));
        }

        Template::Interpolated(segments)
    }

    pub fn render(&self, ctx: &ExecutionContext) -> Value {
        match self {
            Template::Whole(reference) => match ctx.lookup(reference) {
                Some(value) => value.clone(),
                None => {
                    warn!(path = %reference, "Unresolved reference, substituting null");
                    Value::Null
                }
            },
            Template::Interpolated(segments) => {
                let mut out = String::new();
                for segment in segments {
                    match segment {
                        Segment::Text(text) => out.push_str(text),
                        Segment::Ref(reference) => match ctx.lookup(reference) {
                            Some(value) if !value.is_null() => out.push_str(&text_form(value)),
                            _ => {
                                warn!(path = %reference, "Unresolved reference left in text");
                                out.push_str("${");
                                out.push_str(&reference.raw);
                                out.push('}');
                            }
                        },
                    }
                }
                Value::String(out)
            }
        }
    }
}

fn text_form(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Resolve every input of a step against the current context.
pub fn resolve_inputs(inputs: &Map<String, Value>, ctx: &ExecutionContext) -> Map<String, Value> {
    inputs
        .iter()
        .map(|(key, value)| (key.clone(), resolve_value(value, ctx)))
        .collect()
}

pub fn resolve_value(value: &Value, ctx: &ExecutionContext) -> Value {
    match value {
        Value::String(text) => {
            if !text.contains("${") {
                return value.clone();
            }
            Template::parse(text).render(ctx)
        }
        Value::Object(map) => Value::Object(resolve_inputs(map, ctx)),
        Value::Array(items) => Value::Array(items.iter().map(|v| resolve_value(v, ctx)).collect()),
        other => other.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn context() -> ExecutionContext {
        let mut ctx = ExecutionContext::new();
        ctx.insert(
            "portfolio_data",
            json!({ "summary": { "total_loans": 120, "segment": "retail" }, "rows": [1, 2] }),
        );
        ctx.insert("label", json!("Q3"));
        ctx
    }

    #[test]
    fn test_parse_whole_reference() {
        assert_eq!(
            Template::parse("${a.b}"),
            Template::Whole(Reference::new("a.b"))
        );
    }

    #[test]
    fn test_parse_embedded_references() {
        let template = Template::parse("Total: ${a.b} in ${c}");
        assert_eq!(
            template,
            Template::Interpolated(vec![
                Segment::Text("Total: ".into()),
                Segment::Ref(Reference::new("a.b")),
                Segment::Text(" in ".into()),
                Segment::Ref(Reference::new("c")),
            ])
        );
    }

    #[test]
    fn test_parse_ignores_empty_and_unclosed() {
        assert_eq!(
            Template::parse("${} and ${open"),
            Template::Interpolated(vec![Segment::Text("${} and ${open".into())])
        );
        // Two references back to back are not a whole reference
        assert!(matches!(Template::parse("${a}${b}"), Template::Interpolated(_)));
    }

    #[test]
    fn test_whole_reference_preserves_type() {
        let ctx = context();
        let resolved = resolve_value(&json!("${portfolio_data.summary}"), &ctx);
        assert_eq!(resolved, json!({ "total_loans": 120, "segment": "retail" }));

        let number = resolve_value(&json!("${portfolio_data.summary.total_loans}"), &ctx);
        assert_eq!(number, json!(120));
    }

    #[test]
    fn test_whole_reference_miss_is_null() {
        let ctx = context();
        assert_eq!(resolve_value(&json!("${nothing.here}"), &ctx), Value::Null);
    }

    #[test]
    fn test_embedded_reference_degrades_to_text() {
        let ctx = context();
        let resolved = resolve_value(
            &json!("Loans: ${portfolio_data.summary.total_loans} for ${label}"),
            &ctx,
        );
        assert_eq!(resolved, json!("Loans: 120 for Q3"));

        let object_text = resolve_value(&json!("rows=${portfolio_data.rows}"), &ctx);
        assert_eq!(object_text, json!("rows=[1,2]"));
    }

    #[test]
    fn test_embedded_miss_keeps_literal() {
        let ctx = context();
        let resolved = resolve_value(&json!("Value: ${missing.path} / ${label}"), &ctx);
        assert_eq!(resolved, json!("Value: ${missing.path} / Q3"));
    }

    #[test]
    fn test_nested_structures_recurse() {
        let ctx = context();
        let mut inputs = Map::new();
        inputs.insert("data".into(), json!({ "current": "${portfolio_data.summary}", "limit": 5 }));
        inputs.insert("labels".into(), json!(["${label}", { "inner": "${label}" }, true]));
        inputs.insert("plain".into(), json!("no references"));

        let resolved = resolve_inputs(&inputs, &ctx);
        assert_eq!(resolved["data"]["current"]["segment"], "retail");
        assert_eq!(resolved["data"]["limit"], 5);
        assert_eq!(resolved["labels"], json!(["Q3", { "inner": "Q3" }, true]));
        assert_eq!(resolved["plain"], "no references");
    }
}
