//! Banking tools
//!
//! [`RecordQueryTool`] aggregates one dataset of a [`DataSource`] in process.
//! [`FreshnessTool`] reads the load job log to tell how current each dataset
//! is. [`AnalysisTool`] hands query output to the LLM and asks for structured
//! findings.

use crate::llm::LlmContext;
use crate::models::ChatMessage;
use crate::plan::extract_json_object;
use crate::tools::data::{DataSource, Record};
use crate::tools::{ParamType, Parameter, Tool, ToolOutput};
use crate::Result;
use serde_json::{json, Map, Value};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, warn};

const DEFAULT_LIMIT: usize = 100;
const MAX_ITEMS_FOR_LLM: usize = 10;
const DEFAULT_MAX_AGE_HOURS: f64 = 24.0;

/// Dataset holding one record per load job run.
pub const JOB_RUNS_DATASET: &str = "job_runs";

/// Which record fields carry which meaning in a dataset.
#[derive(Debug, Clone)]
pub struct RecordSchema {
    pub dataset: String,
    pub category_field: String,
    pub amount_field: String,
    pub rate_field: Option<String>,
    pub status_field: Option<String>,
    pub risk_field: Option<String>,
    pub period_field: String,
}

impl RecordSchema {
    pub fn loans() -> Self {
        Self {
            dataset: "loans".into(),
            category_field: "loan_type".into(),
            amount_field: "amount".into(),
            rate_field: Some("interest_rate".into()),
            status_field: Some("status".into()),
            risk_field: Some("risk_tier".into()),
            period_field: "origination_year".into(),
        }
    }

    pub fn deposits() -> Self {
        Self {
            dataset: "deposits".into(),
            category_field: "account_type".into(),
            amount_field: "balance".into(),
            rate_field: Some("interest_rate".into()),
            status_field: Some("status".into()),
            risk_field: None,
            period_field: "opened_year".into(),
        }
    }

    pub fn customers() -> Self {
        Self {
            dataset: "customers".into(),
            category_field: "segment".into(),
            amount_field: "lifetime_value".into(),
            rate_field: None,
            status_field: None,
            risk_field: Some("churn_risk".into()),
            period_field: "joined_year".into(),
        }
    }

    pub fn transactions() -> Self {
        Self {
            dataset: "transactions".into(),
            category_field: "category".into(),
            amount_field: "amount".into(),
            rate_field: None,
            status_field: None,
            risk_field: Some("channel".into()),
            period_field: "month".into(),
        }
    }

    /// Load job log. Grouping by risk groups runs by target dataset.
    pub fn job_runs() -> Self {
        Self {
            dataset: JOB_RUNS_DATASET.into(),
            category_field: "job_name".into(),
            amount_field: "rows_processed".into(),
            rate_field: None,
            status_field: Some("status".into()),
            risk_field: Some("target_dataset".into()),
            period_field: "hours_ago".into(),
        }
    }
}

pub struct RecordQueryTool {
    name: String,
    description: String,
    schema: RecordSchema,
    data: Arc<dyn DataSource>,
}

impl RecordQueryTool {
    pub fn new(
        name: impl Into<String>,
        description: impl Into<String>,
        schema: RecordSchema,
        data: Arc<dyn DataSource>,
    ) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            schema,
            data,
        }
    }

    async fn run_query(&self, args: &Map<String, Value>) -> Result<Value> {
        let query_type = args.get("query_type").and_then(Value::as_str).unwrap_or("");
        let filters = args.get("filters").and_then(Value::as_object);
        let time_period = args.get("time_period").and_then(Value::as_object);
        let limit = args.get("limit").and_then(as_usize).unwrap_or(DEFAULT_LIMIT);

        let records = self.data.fetch(&self.schema.dataset).await?;
        let records = apply_filters(records, filters);
        debug!(tool = %self.name, query_type, matched = records.len(), "Running record query");

        let result = match query_type {
            "portfolio_summary" => {
                let current = self.in_period(&records, time_period);
                json!({
                    "summary": self.summarize(&current),
                    "by_category": self.group(&current, &self.schema.category_field),
                    "by_status": self.schema.status_field.as_ref()
                        .map(|field| self.group(&current, field))
                        .unwrap_or_default(),
                    "period": period_label(time_period),
                })
            }
            "performance_metrics" => {
                let comparison_period = args.get("comparison_period").and_then(Value::as_object);
                let current = self.summarize(&self.in_period(&records, time_period));
                let comparison = comparison_period.map(|period| {
                    let previous = self.summarize(&self.in_period(&records, Some(period)));
                    json!({
                        "previous": previous,
                        "change": change_between(&current, &previous),
                    })
                });
                json!({
                    "current_period": current,
                    "comparison": comparison,
                    "period_labels": {
                        "current": period_label(time_period),
                        "comparison": comparison_period.map(|p| period_label(Some(p))),
                    },
                })
            }
            "risk_analysis" => {
                let field = args
                    .get("group_by")
                    .and_then(Value::as_array)
                    .and_then(|fields| fields.first())
                    .and_then(Value::as_str)
                    .map(str::to_string)
                    .or_else(|| self.schema.risk_field.clone())
                    .unwrap_or_else(|| self.schema.category_field.clone());
                json!({
                    "group_by": field,
                    "by_group": self.group(&records, &field),
                    "summary": self.summarize(&records),
                })
            }
            "trend_analysis" => {
                let current = self.in_period(&records, time_period);
                let mut trend = self.group(&current, &self.schema.period_field);
                if let Value::Array(rows) = &mut trend {
                    rows.sort_by(|a, b| match (as_f64(&a["group"]), as_f64(&b["group"])) {
                        (Some(x), Some(y)) => x.total_cmp(&y),
                        _ => text_of(&a["group"]).cmp(&text_of(&b["group"])),
                    });
                }
                json!({
                    "period_field": self.schema.period_field,
                    "trend": trend,
                })
            }
            _ => {
                let current = self.in_period(&records, time_period);
                let total = current.len();
                let rows: Vec<Value> = current
                    .into_iter()
                    .take(limit)
                    .map(Value::Object)
                    .collect();
                json!({
                    "records": rows,
                    "count": rows.len(),
                    "total_matching": total,
                })
            }
        };

        Ok(result)
    }

    /// `time_period` accepts `{"year": N}` or `{"start": N, "end": M}` on the period field.
    fn in_period(&self, records: &[Record], period: Option<&Map<String, Value>>) -> Vec<Record> {
        let Some(period) = period else {
            return records.to_vec();
        };
        let year = period.get("year").and_then(as_f64);
        let start = period.get("start").and_then(as_f64);
        let end = period.get("end").and_then(as_f64);

        records
            .iter()
            .filter(|r| {
                let Some(value) = r.get(&self.schema.period_field).and_then(as_f64) else {
                    return false;
                };
                year.map_or(true, |y| value == y)
                    && start.map_or(true, |s| value >= s)
                    && end.map_or(true, |e| value <= e)
            })
            .cloned()
            .collect()
    }

    fn summarize(&self, records: &[Record]) -> Value {
        let mut summary = self.metrics(records);
        if let (Some(field), Value::Object(map)) = (&self.schema.status_field, &mut summary) {
            let mut counts: BTreeMap<String, u64> = BTreeMap::new();
            for record in records {
                if let Some(status) = record.get(field) {
                    *counts.entry(text_of(status)).or_default() += 1;
                }
            }
            map.insert("status_counts".into(), json!(counts));
        }
        summary
    }

    fn metrics(&self, records: &[Record]) -> Value {
        let amounts: Vec<f64> = records
            .iter()
            .filter_map(|r| r.get(&self.schema.amount_field).and_then(as_f64))
            .collect();
        let total: f64 = amounts.iter().sum();

        let mut metrics = json!({
            "total_records": records.len(),
            "total_amount": round2(total),
            "avg_amount": round2(mean(&amounts)),
        });

        if let Some(rate_field) = &self.schema.rate_field {
            let rates: Vec<f64> = records
                .iter()
                .filter_map(|r| r.get(rate_field).and_then(as_f64))
                .collect();
            metrics["avg_rate"] = json!(round2(mean(&rates)));
        }

        metrics
    }

    fn group(&self, records: &[Record], field: &str) -> Value {
        let mut groups: BTreeMap<String, Vec<Record>> = BTreeMap::new();
        for record in records {
            if let Some(key) = record.get(field) {
                groups.entry(text_of(key)).or_default().push(record.clone());
            }
        }

        Value::Array(
            groups
                .into_iter()
                .map(|(key, members)| {
                    let mut row = self.metrics(&members);
                    row["group"] = json!(key);
                    row
                })
                .collect(),
        )
    }
}

#[async_trait::async_trait]
impl Tool for RecordQueryTool {
    fn name(&self) -> &str {
        &self.name
    }

    fn description(&self) -> &str {
        &self.description
    }

    fn parameters(&self) -> Vec<Parameter> {
        vec![
            Parameter::required(
                "query_type",
                ParamType::String,
                "portfolio_summary, performance_metrics, risk_analysis, trend_analysis, or any other value to list records",
            ),
            Parameter::optional("filters", ParamType::Dict, "Field equality filters"),
            Parameter::optional(
                "time_period",
                ParamType::Dict,
                "Period to analyze ({\"year\": N} or {\"start\": N, \"end\": M})",
            ),
            Parameter::optional("comparison_period", ParamType::Dict, "Period to compare against"),
            Parameter::optional("group_by", ParamType::List, "Fields to group by"),
            Parameter::optional("limit", ParamType::Number, "Limit number of records"),
        ]
    }

    async fn execute(&self, args: &Map<String, Value>) -> Result<ToolOutput> {
        match self.run_query(args).await {
            Ok(result) => Ok(ToolOutput::ok(result)),
            Err(e) => {
                warn!(tool = %self.name, error = %e, "Record query failed");
                Ok(ToolOutput::failed(e.to_string()))
            }
        }
    }
}

/// Judges each dataset by its most recent successful load. A dataset is
/// stale when that load is older than `max_age_hours`, when its latest run
/// failed, or when it was never loaded.
pub struct FreshnessTool {
    name: String,
    description: String,
    data: Arc<dyn DataSource>,
}

impl FreshnessTool {
    pub fn new(name: impl Into<String>, description: impl Into<String>, data: Arc<dyn DataSource>) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            data,
        }
    }

    async fn assess(&self, args: &Map<String, Value>) -> Result<Value> {
        let max_age = args
            .get("max_age_hours")
            .and_then(as_f64)
            .unwrap_or(DEFAULT_MAX_AGE_HOURS);
        let runs = self.data.fetch(JOB_RUNS_DATASET).await?;

        let targets: Vec<String> = match args
            .get("dataset")
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|s| !s.is_empty())
        {
            Some(name) => vec![name.to_lowercase()],
            None => self
                .data
                .datasets()
                .into_iter()
                .filter(|d| d != JOB_RUNS_DATASET)
                .collect(),
        };

        let mut reports = Vec::with_capacity(targets.len());
        let mut stale = Vec::new();

        for dataset in &targets {
            let record_count = self.data.fetch(dataset).await?.len();

            let mut history: Vec<&Record> = runs
                .iter()
                .filter(|r| r.get("target_dataset").map(text_of).as_deref() == Some(dataset.as_str()))
                .collect();
            history.sort_by(|a, b| hours_ago(a).total_cmp(&hours_ago(b)));

            let last_run = history.first();
            let last_status = last_run.map(|r| run_status(r));
            let age = history
                .iter()
                .find(|r| run_status(r) == "success")
                .map(|r| hours_ago(r));
            let failures_since_success = history
                .iter()
                .take_while(|r| run_status(r) != "success")
                .count();

            let is_stale = age.map_or(true, |hours| hours > max_age)
                || last_status.as_deref() == Some("failed");
            if is_stale {
                stale.push(dataset.clone());
            }

            reports.push(json!({
                "dataset": dataset,
                "record_count": record_count,
                "runs_seen": history.len(),
                "last_run_status": last_status,
                "last_success_hours_ago": age,
                "failures_since_success": failures_since_success,
                "last_error": last_run
                    .and_then(|r| r.get("error_message"))
                    .filter(|e| !e.is_null()),
                "stale": is_stale,
            }));
        }

        let stalest = reports
            .iter()
            .filter(|r| r["stale"].as_bool() == Some(true))
            .max_by(|a, b| {
                let age = |v: &Value| v["last_success_hours_ago"].as_f64().unwrap_or(f64::INFINITY);
                age(*a).total_cmp(&age(*b))
            })
            .map(|r| r["dataset"].clone());

        debug!(tool = %self.name, checked = targets.len(), stale = stale.len(), "Freshness assessed");

        Ok(json!({
            "max_age_hours": max_age,
            "datasets": reports,
            "stale_datasets": stale,
            "stalest_dataset": stalest,
        }))
    }
}

#[async_trait::async_trait]
impl Tool for FreshnessTool {
    fn name(&self) -> &str {
        &self.name
    }

    fn description(&self) -> &str {
        &self.description
    }

    fn parameters(&self) -> Vec<Parameter> {
        vec![
            Parameter::optional("dataset", ParamType::String, "Dataset to check (all datasets if omitted)"),
            Parameter::optional("max_age_hours", ParamType::Number, "Age after which data counts as stale (default 24)"),
        ]
    }

    async fn execute(&self, args: &Map<String, Value>) -> Result<ToolOutput> {
        match self.assess(args).await {
            Ok(result) => Ok(ToolOutput::ok(result)),
            Err(e) => {
                warn!(tool = %self.name, error = %e, "Freshness check failed");
                Ok(ToolOutput::failed(e.to_string()))
            }
        }
    }
}

fn hours_ago(run: &Record) -> f64 {
    run.get("hours_ago").and_then(as_f64).unwrap_or(f64::MAX)
}

fn run_status(run: &Record) -> String {
    run.get("status").map(text_of).unwrap_or_default().to_lowercase()
}

/// Filter keys naming fields the dataset does not have are ignored.
fn apply_filters(records: Vec<Record>, filters: Option<&Map<String, Value>>) -> Vec<Record> {
    let Some(filters) = filters else {
        return records;
    };
    let Some(first) = records.first() else {
        return records;
    };

    let active: Vec<(&String, &Value)> = filters
        .iter()
        .filter(|(field, value)| {
            let known = first.contains_key(field.as_str());
            if !known {
                debug!(field = %field, "Ignoring filter on unknown field");
            }
            known && !value.is_null()
        })
        .collect();

    records
        .into_iter()
        .filter(|record| {
            active.iter().all(|(field, expected)| {
                record
                    .get(field.as_str())
                    .is_some_and(|actual| values_match(actual, expected))
            })
        })
        .collect()
}

fn values_match(actual: &Value, expected: &Value) -> bool {
    match (actual, expected) {
        (Value::Number(_), _) | (_, Value::Number(_)) => {
            matches!((as_f64(actual), as_f64(expected)), (Some(a), Some(b)) if a == b)
        }
        _ => text_of(actual).eq_ignore_ascii_case(&text_of(expected)),
    }
}

fn change_between(current: &Value, previous: &Value) -> Value {
    let pct = |key: &str| {
        let now = current[key].as_f64().unwrap_or(0.0);
        let before = previous[key].as_f64().unwrap_or(0.0);
        if before > 0.0 {
            round2((now - before) / before * 100.0)
        } else {
            0.0
        }
    };

    let mut change = json!({
        "count_change_pct": pct("total_records"),
        "amount_change_pct": pct("total_amount"),
    });
    if let (Some(now), Some(before)) = (current["avg_rate"].as_f64(), previous["avg_rate"].as_f64()) {
        change["rate_change"] = json!(round2(now - before));
    }
    change
}

fn period_label(period: Option<&Map<String, Value>>) -> String {
    let Some(period) = period else {
        return "All time".to_string();
    };
    if let Some(year) = period.get("year") {
        return text_of(year);
    }
    match (period.get("start"), period.get("end")) {
        (Some(start), Some(end)) => format!("{} to {}", text_of(start), text_of(end)),
        (Some(start), None) => format!("From {}", text_of(start)),
        (None, Some(end)) => format!("Until {}", text_of(end)),
        (None, None) => "All time".to_string(),
    }
}

fn text_of(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn as_f64(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn as_usize(value: &Value) -> Option<usize> {
    as_f64(value).filter(|n| *n >= 0.0).map(|n| n as usize)
}

fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        0.0
    } else {
        values.iter().sum::<f64>() / values.len() as f64
    }
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// LLM-backed analysis of query output.
pub struct AnalysisTool {
    name: String,
    description: String,
    data_param: String,
    analyst_role: String,
    llm: LlmContext,
}

impl AnalysisTool {
    pub fn new(
        name: impl Into<String>,
        description: impl Into<String>,
        data_param: impl Into<String>,
        analyst_role: impl Into<String>,
        llm: LlmContext,
    ) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            data_param: data_param.into(),
            analyst_role: analyst_role.into(),
            llm,
        }
    }

    fn build_prompt(
        &self,
        data: &Value,
        analysis_type: &str,
        comparison: Option<&Value>,
        context: Option<&str>,
    ) -> String {
        let limited = limit_for_llm(data, MAX_ITEMS_FOR_LLM);
        let comparison = comparison
            .filter(|v| !v.is_null())
            .map(|v| pretty(&limit_for_llm(v, MAX_ITEMS_FOR_LLM)))
            .unwrap_or_else(|| "No comparison data available".to_string());

        format!(
            r#"Perform a {analysis_type} analysis of this data:

{data}

Comparison data:
{comparison}

Additional context: {context}

Respond with a JSON object containing:
- summary: two or three sentence overview
- insights: list of key findings
- recommendations: list of specific actions
- metrics: the figures the findings are based on"#,
            analysis_type = analysis_type,
            data = pretty(&limited),
            comparison = comparison,
            context = context.unwrap_or("none"),
        )
    }
}

#[async_trait::async_trait]
impl Tool for AnalysisTool {
    fn name(&self) -> &str {
        &self.name
    }

    fn description(&self) -> &str {
        &self.description
    }

    fn parameters(&self) -> Vec<Parameter> {
        vec![
            Parameter::required(&self.data_param, ParamType::Dict, "Data from query results"),
            Parameter::optional(
                "analysis_type",
                ParamType::String,
                "Kind of analysis, e.g. risk_assessment, performance_review or comprehensive",
            ),
            Parameter::optional("comparison_data", ParamType::Dict, "Historical or benchmark data"),
            Parameter::optional("context", ParamType::String, "What the user asked for"),
        ]
    }

    async fn execute(&self, args: &Map<String, Value>) -> Result<ToolOutput> {
        let data = match args.get(&self.data_param) {
            None | Some(Value::Null) => {
                return Ok(ToolOutput::failed(format!(
                    "No data provided in '{}'",
                    self.data_param
                )))
            }
            Some(data) => data,
        };
        let analysis_type = args
            .get("analysis_type")
            .and_then(Value::as_str)
            .unwrap_or("comprehensive");
        let context = args.get("context").and_then(Value::as_str);

        let prompt = self.build_prompt(data, analysis_type, args.get("comparison_data"), context);
        let messages = [
            ChatMessage::system(self.analyst_role.as_str()),
            ChatMessage::user(prompt),
        ];

        let reply = match self.llm.complete(&messages, 0.3, Some(1500)).await {
            Ok(reply) => reply,
            Err(e) => {
                warn!(tool = %self.name, error = %e, "Analysis request failed");
                return Ok(ToolOutput::failed(format!("Analysis failed: {}", e)));
            }
        };

        let analysis = match serde_json::from_str::<Value>(reply.trim())
            .ok()
            .filter(Value::is_object)
            .or_else(|| extract_json_object(&reply))
        {
            Some(analysis) => analysis,
            None => {
                debug!(tool = %self.name, "Analysis reply was not JSON, using fallback");
                fallback_analysis(data, &reply)
            }
        };

        Ok(ToolOutput::ok(analysis))
    }
}

/// Cut every list (top level or nested in maps) to `max_items`, noting how many were dropped.
pub fn limit_for_llm(data: &Value, max_items: usize) -> Value {
    match data {
        Value::Array(items) if items.len() > max_items => {
            let mut kept: Vec<Value> = items
                .iter()
                .take(max_items)
                .map(|v| limit_for_llm(v, max_items))
                .collect();
            kept.push(json!({
                "note": format!("... and {} more items (truncated for analysis)", items.len() - max_items)
            }));
            Value::Array(kept)
        }
        Value::Array(items) => Value::Array(items.iter().map(|v| limit_for_llm(v, max_items)).collect()),
        Value::Object(map) => Value::Object(
            map.iter()
                .map(|(k, v)| (k.clone(), limit_for_llm(v, max_items)))
                .collect(),
        ),
        other => other.clone(),
    }
}

fn fallback_analysis(data: &Value, reply: &str) -> Value {
    let summary = data.get("summary").unwrap_or(data);
    let total_records = summary.get("total_records").and_then(Value::as_u64);
    let total_amount = summary.get("total_amount").and_then(Value::as_f64);

    let mut insights = Vec::new();
    if let (Some(count), Some(amount)) = (total_records, total_amount) {
        insights.push(format!("{} records totalling {:.2}", count, amount));
    }
    if let Some(rows) = data.get("by_category").and_then(Value::as_array) {
        let largest = rows.iter().max_by(|a, b| {
            let a = a["total_amount"].as_f64().unwrap_or(0.0);
            let b = b["total_amount"].as_f64().unwrap_or(0.0);
            a.total_cmp(&b)
        });
        if let Some(row) = largest {
            insights.push(format!(
                "'{}' is the largest category by amount",
                text_of(&row["group"])
            ));
        }
    }
    if insights.is_empty() {
        insights.push("Data was retrieved but could not be analyzed in detail".to_string());
    }

    let reply = reply.trim();
    let summary_text = if reply.is_empty() {
        match total_records {
            Some(count) => format!("Analysis based on {} records.", count),
            None => "Analysis based on the provided data.".to_string(),
        }
    } else {
        reply.to_string()
    };

    json!({
        "summary": summary_text,
        "insights": insights,
        "recommendations": [
            "Review the largest categories for concentration",
            "Track these figures over consecutive periods"
        ],
        "metrics": {
            "total_records": total_records,
            "total_amount": total_amount,
        },
    })
}

fn pretty(value: &Value) -> String {
    serde_json::to_string_pretty(value).unwrap_or_else(|_| value.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::ScriptedLlm;
    use crate::tools::InMemoryDataSource;

    fn loan_records() -> Vec<Record> {
        [
            json!({"loan_id": "L1", "loan_type": "auto", "amount": 1000, "interest_rate": 5.0, "status": "current", "risk_tier": "A", "origination_year": 2023}),
            json!({"loan_id": "L2", "loan_type": "auto", "amount": 3000, "interest_rate": 7.0, "status": "late", "risk_tier": "C", "origination_year": 2024}),
            json!({"loan_id": "L3", "loan_type": "mortgage", "amount": 6000, "interest_rate": 4.0, "status": "current", "risk_tier": "A", "origination_year": 2024}),
        ]
        .into_iter()
        .filter_map(|v| v.as_object().cloned())
        .collect()
    }

    fn loan_query() -> RecordQueryTool {
        let data = InMemoryDataSource::new().with_dataset("loans", loan_records());
        RecordQueryTool::new("LoanQuery", "Query loans", RecordSchema::loans(), Arc::new(data))
    }

    fn args(value: Value) -> Map<String, Value> {
        value.as_object().cloned().unwrap_or_default()
    }

    #[tokio::test]
    async fn test_portfolio_summary_aggregates() {
        let output = loan_query()
            .execute(&args(json!({"query_type": "portfolio_summary"})))
            .await
            .unwrap();

        assert!(output.success);
        let summary = &output.result["summary"];
        assert_eq!(summary["total_records"], 3);
        assert_eq!(summary["total_amount"], 10000.0);
        assert_eq!(summary["status_counts"]["current"], 2);
        assert_eq!(output.result["by_category"].as_array().unwrap().len(), 2);
        assert_eq!(output.result["period"], "All time");
    }

    #[tokio::test]
    async fn test_filters_and_time_period() {
        let output = loan_query()
            .execute(&args(json!({
                "query_type": "portfolio_summary",
                "filters": {"loan_type": "AUTO", "origination_date_range": "ignored"},
                "time_period": {"year": "2024"}
            })))
            .await
            .unwrap();

        assert_eq!(output.result["summary"]["total_records"], 1);
        assert_eq!(output.result["summary"]["total_amount"], 3000.0);
        assert_eq!(output.result["period"], "2024");
    }

    #[tokio::test]
    async fn test_performance_metrics_compares_periods() {
        let output = loan_query()
            .execute(&args(json!({
                "query_type": "performance_metrics",
                "time_period": {"year": 2024},
                "comparison_period": {"year": 2023}
            })))
            .await
            .unwrap();

        let change = &output.result["comparison"]["change"];
        assert_eq!(change["count_change_pct"], 100.0);
        assert_eq!(change["amount_change_pct"], 800.0);
        assert_eq!(output.result["period_labels"]["comparison"], "2023");
    }

    #[tokio::test]
    async fn test_risk_analysis_groups_by_risk_field() {
        let output = loan_query()
            .execute(&args(json!({"query_type": "risk_analysis"})))
            .await
            .unwrap();

        assert_eq!(output.result["group_by"], "risk_tier");
        let groups = output.result["by_group"].as_array().unwrap();
        assert_eq!(groups[0]["group"], "A");
        assert_eq!(groups[0]["total_records"], 2);
    }

    #[tokio::test]
    async fn test_unknown_query_type_lists_records_with_limit() {
        let output = loan_query()
            .execute(&args(json!({"query_type": "anything", "limit": 2})))
            .await
            .unwrap();

        assert_eq!(output.result["count"], 2);
        assert_eq!(output.result["total_matching"], 3);
    }

    #[tokio::test]
    async fn test_missing_dataset_is_reported_not_raised() {
        let tool = RecordQueryTool::new(
            "DepositQuery",
            "Query deposits",
            RecordSchema::deposits(),
            Arc::new(InMemoryDataSource::new()),
        );
        let output = tool
            .execute(&args(json!({"query_type": "portfolio_summary"})))
            .await
            .unwrap();

        assert!(!output.success);
        assert!(output.error.unwrap().contains("deposits"));
    }

    #[tokio::test]
    async fn test_freshness_flags_failed_loads() {
        let tool = FreshnessTool::new(
            "AnalyzeDataFreshness",
            "Check data freshness",
            Arc::new(InMemoryDataSource::banking_sample()),
        );
        let output = tool.execute(&Map::new()).await.unwrap();
        assert!(output.success);

        let result = output.result;
        assert_eq!(result["stale_datasets"], json!(["deposits"]));
        assert_eq!(result["stalest_dataset"], "deposits");
        assert_eq!(result["datasets"].as_array().unwrap().len(), 4);

        let deposits = &result["datasets"][1];
        assert_eq!(deposits["dataset"], "deposits");
        assert_eq!(deposits["last_run_status"], "failed");
        assert_eq!(deposits["failures_since_success"], 2);
        assert_eq!(deposits["last_success_hours_ago"], 51.0);
        assert_eq!(deposits["last_error"], "Source extract not received");
        assert_eq!(deposits["record_count"], 80);
    }

    #[tokio::test]
    async fn test_freshness_single_dataset_and_threshold() {
        let tool = FreshnessTool::new(
            "AnalyzeDataFreshness",
            "Check data freshness",
            Arc::new(InMemoryDataSource::banking_sample()),
        );
        let output = tool
            .execute(&args(json!({"dataset": "Transactions", "max_age_hours": 4})))
            .await
            .unwrap();

        let report = &output.result["datasets"][0];
        assert_eq!(output.result["datasets"].as_array().unwrap().len(), 1);
        assert_eq!(report["last_success_hours_ago"], 7.0);
        assert_eq!(report["stale"], true);
        assert!(report["last_error"].is_null());
    }

    #[tokio::test]
    async fn test_freshness_without_job_log_fails() {
        let data = InMemoryDataSource::new().with_dataset("loans", loan_records());
        let tool = FreshnessTool::new("AnalyzeDataFreshness", "Check data freshness", Arc::new(data));

        let output = tool.execute(&Map::new()).await.unwrap();
        assert!(!output.success);
        assert!(output.error.unwrap().contains(JOB_RUNS_DATASET));
    }

    #[tokio::test]
    async fn test_job_runs_group_by_target_dataset() {
        let tool = RecordQueryTool::new(
            "CheckJobStatus",
            "Check load jobs",
            RecordSchema::job_runs(),
            Arc::new(InMemoryDataSource::banking_sample()),
        );
        let output = tool
            .execute(&args(json!({"query_type": "risk_analysis"})))
            .await
            .unwrap();

        assert_eq!(output.result["group_by"], "target_dataset");
        assert_eq!(output.result["by_group"].as_array().unwrap().len(), 4);
        assert_eq!(output.result["summary"]["status_counts"]["failed"], 2);
    }

    #[test]
    fn test_limit_for_llm_truncates_nested_lists() {
        let rows: Vec<Value> = (0..15).map(|i| json!(i)).collect();
        let limited = limit_for_llm(&json!({"rows": rows, "inner": {"rows": [1, 2]}}), 10);

        let kept = limited["rows"].as_array().unwrap();
        assert_eq!(kept.len(), 11);
        assert!(kept[10]["note"].as_str().unwrap().contains("5 more items"));
        assert_eq!(limited["inner"]["rows"], json!([1, 2]));
    }

    fn analysis_tool(llm: Arc<ScriptedLlm>) -> AnalysisTool {
        AnalysisTool::new(
            "AnalyzeLoanPortfolio",
            "Analyze loan data",
            "portfolio_data",
            "You are a credit analyst.",
            LlmContext::new(llm, "test-model"),
        )
    }

    #[tokio::test]
    async fn test_analysis_parses_json_reply() {
        let llm = Arc::new(ScriptedLlm::new(vec![
            r#"Here you go: {"summary": "Healthy book", "insights": ["Low defaults"], "recommendations": ["Grow auto"]}"#,
        ]));
        let output = analysis_tool(llm.clone())
            .execute(&args(json!({"portfolio_data": {"summary": {"total_records": 3}}})))
            .await
            .unwrap();

        assert!(output.success);
        assert_eq!(output.result["summary"], "Healthy book");
        assert_eq!(llm.call_count(), 1);
    }

    #[tokio::test]
    async fn test_analysis_falls_back_on_prose() {
        let llm = Arc::new(ScriptedLlm::new(vec!["The portfolio looks stable."]));
        let output = analysis_tool(llm)
            .execute(&args(json!({"portfolio_data": {
                "summary": {"total_records": 3, "total_amount": 10000.0},
                "by_category": [
                    {"group": "auto", "total_amount": 4000.0},
                    {"group": "mortgage", "total_amount": 6000.0}
                ]
            }})))
            .await
            .unwrap();

        assert!(output.success);
        assert_eq!(output.result["summary"], "The portfolio looks stable.");
        let insights = output.result["insights"].as_array().unwrap();
        assert!(insights.iter().any(|i| i.as_str().unwrap().contains("mortgage")));
    }

    #[tokio::test]
    async fn test_analysis_reports_llm_failure_and_null_data() {
        let output = analysis_tool(Arc::new(ScriptedLlm::failing()))
            .execute(&args(json!({"portfolio_data": {"rows": []}})))
            .await
            .unwrap();
        assert!(!output.success);
        assert!(output.error.unwrap().starts_with("Analysis failed:"));

        let output = analysis_tool(Arc::new(ScriptedLlm::new(vec![])))
            .execute(&args(json!({"portfolio_data": null})))
            .await
            .unwrap();
        assert!(!output.success);
    }
}
