//! Banking agents: loan portfolio, deposit analytics, customer analytics,
//! data status and the clarification fallback.

use crate::agent::planning::{AgentProfile, PlanningAgent, Scoring, Toolset};
use crate::agent::uncertain::{Specialist, UncertainAgent};
use crate::llm::LlmContext;
use crate::models::{Adaptations, Plan, PlanStep};
use crate::tools::banking::{AnalysisTool, FreshnessTool, RecordQueryTool, RecordSchema};
use crate::tools::{DataSource, ToolRegistry};
use crate::Result;
use serde_json::json;
use std::sync::Arc;

pub const LOAN_AGENT: &str = "LoanPortfolioAgent";
pub const DEPOSIT_AGENT: &str = "DepositAnalyticsAgent";
pub const CUSTOMER_AGENT: &str = "CustomerAnalyticsAgent";
pub const DATA_STATUS_AGENT: &str = "DataStatusAgent";

const COMPARISON_PHRASES: [&str; 7] = [
    "compared to",
    " vs",
    "versus",
    "last year",
    "last quarter",
    "year over year",
    "quarter over quarter",
];

fn mentions(query: &str, words: &[&str]) -> bool {
    let query = query.to_lowercase();
    words.iter().any(|w| query.contains(w))
}

/// Transaction lookup plus pattern analysis, shared by the deposit and
/// customer tool sets.
fn with_transaction_tools(
    registry: ToolRegistry,
    data: &Arc<dyn DataSource>,
    llm: &LlmContext,
) -> ToolRegistry {
    registry
        .with_tool(Arc::new(RecordQueryTool::new(
            "TransactionQuery",
            "Execute transaction activity queries",
            RecordSchema::transactions(),
            Arc::clone(data),
        )))
        .with_tool(Arc::new(AnalysisTool::new(
            "AnalyzeTransactionPatterns",
            "Analyze transaction patterns for behavioral insights and anomaly detection",
            "transaction_data",
            "You are a transaction analytics expert specializing in behavioral insights and anomaly detection.",
            llm.clone(),
        )))
}

//
// ================= Loans =================
//

pub fn loan_tools(data: Arc<dyn DataSource>) -> Toolset {
    Arc::new(move |llm: &LlmContext| -> Result<ToolRegistry> {
        Ok(ToolRegistry::new()
            .with_tool(Arc::new(RecordQueryTool::new(
                "LoanQuery",
                "Execute loan portfolio queries",
                RecordSchema::loans(),
                Arc::clone(&data),
            )))
            .with_tool(Arc::new(AnalysisTool::new(
                "AnalyzeLoanPortfolio",
                "Analyze loan portfolio data and provide risk and performance insights",
                "portfolio_data",
                "You are a senior credit risk analyst specializing in loan portfolio management.",
                llm.clone(),
            ))))
    })
}

pub fn loan_portfolio_agent(data: Arc<dyn DataSource>) -> PlanningAgent {
    let profile = AgentProfile::new(
        LOAN_AGENT,
        "Performs loan portfolio analysis, risk assessment, and performance metrics using real data",
    )
    .agent_type("loan_specialist")
    .domain("loan")
    .capabilities(&[
        "Loan portfolio analysis with real-time data",
        "Risk assessment and concentration analysis",
        "Default and delinquency trend analysis",
        "Interest rate and yield analysis",
        "Portfolio quality metrics",
        "Performance benchmarking and comparisons",
    ])
    .keywords(&[
        "loan", "mortgage", "interest rate", "apr", "principal", "lending", "borrow", "credit",
        "refinance", "amortization", "default", "delinquency", "origination", "underwriting",
        "collateral", "debt", "repayment", "installment",
    ])
    .llm_classification(true)
    .planner_role("You are a loan analysis planning expert. Create detailed execution plans.")
    .planning_note(
        "If the query compares time periods, fetch the current period and the comparison \
         period in separate steps, then analyze them together.",
    )
    .planning_note("When using AnalyzeLoanPortfolio as the final step, set output_key to \"analysis\".")
    .default_adaptations(
        "Provide general loan portfolio insights based on available data",
        "Explain what loan data would be needed for this analysis",
    );

    PlanningAgent::new(profile, loan_tools(data), loan_default_plan)
}

pub fn loan_default_plan(query: &str) -> Plan {
    if mentions(query, &COMPARISON_PHRASES) {
        return Plan::new(
            format!("Compare loan performance across time periods: {}", query),
            vec![
                PlanStep::new(1, "LoanQuery", "Get current period loan performance")
                    .input("query_type", "performance_metrics")
                    .input("time_period", json!({"year": 2025}))
                    .input("comparison_period", json!({"year": 2024}))
                    .output("performance_data"),
                PlanStep::new(2, "LoanQuery", "Get loan risk distribution")
                    .input("query_type", "risk_analysis")
                    .output("risk_data"),
                PlanStep::new(3, "AnalyzeLoanPortfolio", "Compare loan performance between periods")
                    .input("portfolio_data", "${performance_data}")
                    .input("analysis_type", "performance_review")
                    .input("comparison_data", "${risk_data}")
                    .input("context", query)
                    .output("analysis"),
            ],
        )
        .with_adaptations(Adaptations::new(
            "Provide general insights on loan performance comparisons",
            "Explain typical loan performance trends",
        ));
    }

    if mentions(query, &["portfolio", "analysis", "performance", "trend"]) {
        return Plan::new(
            format!("Analyze loan portfolio to answer: {}", query),
            vec![
                PlanStep::new(1, "LoanQuery", "Get loan portfolio summary data")
                    .input("query_type", "portfolio_summary")
                    .output("portfolio_data"),
                PlanStep::new(2, "AnalyzeLoanPortfolio", "Analyze loan portfolio composition and performance")
                    .input("portfolio_data", "${portfolio_data}")
                    .input("analysis_type", "comprehensive")
                    .input("context", query)
                    .output("analysis"),
            ],
        )
        .with_adaptations(Adaptations::new(
            "Provide general loan portfolio insights",
            "Explain what loan data would be needed",
        ));
    }

    if mentions(query, &["rate", "interest", "apr"]) {
        return Plan::new(
            format!("Analyze interest rates to answer: {}", query),
            vec![
                PlanStep::new(1, "LoanQuery", "Get interest rates by loan type")
                    .input("query_type", "portfolio_summary")
                    .output("rate_data"),
                PlanStep::new(2, "AnalyzeLoanPortfolio", "Analyze interest rate distribution and yield")
                    .input("portfolio_data", "${rate_data}")
                    .input("analysis_type", "performance_review")
                    .input("context", query)
                    .output("analysis"),
            ],
        )
        .with_adaptations(Adaptations::new(
            "Explain typical rate ranges",
            "Provide general interest rate guidance",
        ));
    }

    Plan::new(
        format!("Provide loan portfolio insights for: {}", query),
        vec![
            PlanStep::new(1, "LoanQuery", "Get comprehensive loan portfolio data")
                .input("query_type", "portfolio_summary")
                .output("portfolio_data"),
            PlanStep::new(2, "LoanQuery", "Get loan risk metrics")
                .input("query_type", "risk_analysis")
                .output("risk_data"),
            PlanStep::new(3, "AnalyzeLoanPortfolio", "Provide comprehensive portfolio analysis")
                .input("portfolio_data", "${portfolio_data}")
                .input("analysis_type", "comprehensive")
                .input("comparison_data", "${risk_data}")
                .input("context", query)
                .output("analysis"),
        ],
    )
    .with_adaptations(Adaptations::new(
        "Offer alternative information sources",
        "Provide general loan guidance",
    ))
}

//
// ================= Deposits =================
//

pub fn deposit_tools(data: Arc<dyn DataSource>) -> Toolset {
    Arc::new(move |llm: &LlmContext| -> Result<ToolRegistry> {
        let registry = ToolRegistry::new()
            .with_tool(Arc::new(RecordQueryTool::new(
                "DepositQuery",
                "Execute deposit account queries",
                RecordSchema::deposits(),
                Arc::clone(&data),
            )))
            .with_tool(Arc::new(AnalysisTool::new(
                "AnalyzeDepositTrends",
                "Analyze deposit data for trends and insights",
                "deposit_data",
                "You are a deposit analytics expert at a retail bank.",
                llm.clone(),
            )));
        Ok(with_transaction_tools(registry, &data, llm))
    })
}

pub fn deposit_analytics_agent(data: Arc<dyn DataSource>) -> PlanningAgent {
    let profile = AgentProfile::new(
        DEPOSIT_AGENT,
        "Analyzes deposit accounts, balances, transaction activity and deposit growth",
    )
    .agent_type("deposit_specialist")
    .domain("deposit and account")
    .capabilities(&[
        "Deposit balance and mix analysis",
        "Account activity and transaction volume analysis",
        "Deposit growth and trend tracking",
        "Interest rate and product comparison",
    ])
    .keywords(&[
        "deposit", "saving", "account", "balance", "transaction", "checking", "withdrawal",
        "transfer", "interest", "cd", "certificate", "atm", "branch", "statement", "overdraft",
        "minimum balance", "monthly fee", "direct deposit",
    ])
    .single_match_confidence(0.6)
    .llm_classification(true)
    .planner_role("You are a deposit analytics planning expert. Create detailed execution plans.")
    .planning_note("Analyze TransactionQuery output with AnalyzeTransactionPatterns, deposit data with AnalyzeDepositTrends.")
    .planning_note("Set output_key to \"analysis\" on the final analysis step.")
    .default_adaptations(
        "Provide general deposit insights based on available data",
        "Explain what deposit data would be needed for this analysis",
    );

    PlanningAgent::new(profile, deposit_tools(data), deposit_default_plan)
}

pub fn deposit_default_plan(query: &str) -> Plan {
    if mentions(query, &["transaction", "activity", "history"]) {
        return Plan::new(
            format!("Analyze transaction data for: {}", query),
            vec![
                PlanStep::new(1, "TransactionQuery", "Get transaction volume by category")
                    .input("query_type", "portfolio_summary")
                    .output("transaction_data"),
                PlanStep::new(2, "AnalyzeTransactionPatterns", "Analyze transaction patterns")
                    .input("transaction_data", "${transaction_data}")
                    .input("analysis_type", "behavioral_insights")
                    .input("context", query)
                    .output("analysis"),
            ],
        )
        .with_adaptations(Adaptations::new(
            "Provide general transaction insights",
            "Explain transaction tracking best practices",
        ));
    }

    if mentions(query, &["growth", "trend", "savings"]) {
        return Plan::new(
            format!("Analyze deposit growth trends for: {}", query),
            vec![
                PlanStep::new(1, "DepositQuery", "Get deposit balances by year opened")
                    .input("query_type", "trend_analysis")
                    .output("growth_data"),
                PlanStep::new(2, "AnalyzeDepositTrends", "Analyze deposit growth")
                    .input("deposit_data", "${growth_data}")
                    .input("analysis_type", "growth")
                    .input("context", query)
                    .output("analysis"),
            ],
        )
        .with_adaptations(Adaptations::new(
            "Provide general deposit growth insights",
            "Explain how deposit growth is usually measured",
        ));
    }

    Plan::new(
        format!("Get account balance information for: {}", query),
        vec![
            PlanStep::new(1, "DepositQuery", "Get deposit summary by account type")
                .input("query_type", "portfolio_summary")
                .output("balance_data"),
            PlanStep::new(2, "AnalyzeDepositTrends", "Analyze deposit composition")
                .input("deposit_data", "${balance_data}")
                .input("analysis_type", "comprehensive")
                .input("context", query)
                .output("analysis"),
        ],
    )
    .with_adaptations(Adaptations::new(
        "Provide general balance inquiry guidance",
        "Explain how to check account balances",
    ))
}

//
// ================= Customers =================
//

pub fn customer_tools(data: Arc<dyn DataSource>) -> Toolset {
    Arc::new(move |llm: &LlmContext| -> Result<ToolRegistry> {
        let registry = ToolRegistry::new()
            .with_tool(Arc::new(RecordQueryTool::new(
                "CustomerQuery",
                "Execute customer analytics queries",
                RecordSchema::customers(),
                Arc::clone(&data),
            )))
            .with_tool(Arc::new(AnalysisTool::new(
                "AnalyzeCustomerSegments",
                "Analyze customer segments, value and churn risk",
                "customer_data",
                "You are a customer analytics expert specializing in retail banking.",
                llm.clone(),
            )));
        Ok(with_transaction_tools(registry, &data, llm))
    })
}

pub fn customer_analytics_agent(data: Arc<dyn DataSource>) -> PlanningAgent {
    let profile = AgentProfile::new(
        CUSTOMER_AGENT,
        "Performs customer analytics, segmentation, CLV, and churn analysis with real data",
    )
    .agent_type("customer_specialist")
    .domain("customer analytics")
    .capabilities(&[
        "Customer segmentation analysis with real data",
        "Customer lifetime value (CLV) calculation",
        "Churn risk assessment and prediction",
        "Customer demographics and behavior analysis",
        "Retention strategy development",
    ])
    .keywords(&[
        "customer", "client", "user", "member", "account holder", "churn", "retention",
        "attrition", "lifetime value", "clv", "ltv", "segment", "segmentation", "demographic",
        "behavior", "behavioural", "cross-sell", "upsell", "product adoption", "relationship",
        "satisfaction", "nps", "experience", "engagement",
    ])
    .phrases(&["who are our", "which customers", "customer analysis"])
    .planner_role("You are a customer analytics planning expert. Create detailed execution plans.")
    .planning_note("Analyze TransactionQuery output with AnalyzeTransactionPatterns, customer data with AnalyzeCustomerSegments.")
    .planning_note("Set output_key to \"analysis\" on the final analysis step.")
    .default_adaptations(
        "Provide general customer insights based on available data",
        "Explain what customer data would be needed for this analysis",
    );

    PlanningAgent::new(profile, customer_tools(data), customer_default_plan)
}

pub fn customer_default_plan(query: &str) -> Plan {
    if mentions(query, &["churn", "retention", "leaving", "risk"]) {
        return Plan::new(
            format!("Analyze customer churn patterns for: {}", query),
            vec![
                PlanStep::new(1, "CustomerQuery", "Get customers grouped by churn risk")
                    .input("query_type", "risk_analysis")
                    .output("churn_data"),
                PlanStep::new(2, "AnalyzeCustomerSegments", "Analyze churn drivers")
                    .input("customer_data", "${churn_data}")
                    .input("analysis_type", "churn")
                    .input("context", query)
                    .output("analysis"),
            ],
        )
        .with_adaptations(Adaptations::new(
            "Provide general retention insights",
            "Explain which customer signals predict churn",
        ));
    }

    if mentions(query, &["transaction", "spending", "spend", "channel"]) {
        return Plan::new(
            format!("Analyze customer spending patterns for: {}", query),
            vec![
                PlanStep::new(1, "TransactionQuery", "Get transaction volume by channel")
                    .input("query_type", "risk_analysis")
                    .input("group_by", json!(["channel"]))
                    .output("channel_data"),
                PlanStep::new(2, "TransactionQuery", "Get transaction volume by category")
                    .input("query_type", "portfolio_summary")
                    .output("transaction_data"),
                PlanStep::new(3, "AnalyzeTransactionPatterns", "Analyze spending behavior")
                    .input("transaction_data", "${transaction_data}")
                    .input("analysis_type", "spending_analysis")
                    .input("comparison_data", "${channel_data}")
                    .input("context", query)
                    .output("analysis"),
            ],
        )
        .with_adaptations(Adaptations::new(
            "Provide general spending behavior insights",
            "Explain which transaction data would reveal spending patterns",
        ));
    }

    Plan::new(
        format!("Analyze customer segments for: {}", query),
        vec![
            PlanStep::new(1, "CustomerQuery", "Get customer segment summary")
                .input("query_type", "portfolio_summary")
                .output("segment_data"),
            PlanStep::new(2, "AnalyzeCustomerSegments", "Analyze customer segments")
                .input("customer_data", "${segment_data}")
                .input("analysis_type", "segmentation")
                .input("context", query)
                .output("analysis"),
        ],
    )
    .with_adaptations(Adaptations::new(
        "Provide general customer insights",
        "Explain customer segmentation best practices",
    ))
}

//
// ================= Data status =================
//

const DATASET_MENTIONS: [(&str, &str); 4] = [
    ("loan", "loans"),
    ("deposit", "deposits"),
    ("customer", "customers"),
    ("transaction", "transactions"),
];

fn mentioned_dataset(query: &str) -> Option<&'static str> {
    let query = query.to_lowercase();
    DATASET_MENTIONS
        .iter()
        .find(|(word, _)| query.contains(word))
        .map(|(_, dataset)| *dataset)
}

pub fn data_status_tools(data: Arc<dyn DataSource>) -> Toolset {
    Arc::new(move |llm: &LlmContext| -> Result<ToolRegistry> {
        Ok(ToolRegistry::new()
            .with_tool(Arc::new(FreshnessTool::new(
                "AnalyzeDataFreshness",
                "Check when each dataset was last loaded and flag stale data",
                Arc::clone(&data),
            )))
            .with_tool(Arc::new(RecordQueryTool::new(
                "CheckJobStatus",
                "Check execution status and history of data loading jobs",
                RecordSchema::job_runs(),
                Arc::clone(&data),
            )))
            .with_tool(Arc::new(AnalysisTool::new(
                "AnalyzeDataQuality",
                "Analyze investigation findings and identify the root cause of data issues",
                "investigation_data",
                "You are a data quality specialist for a banking data platform.",
                llm.clone(),
            ))))
    })
}

pub fn data_status_agent(data: Arc<dyn DataSource>) -> PlanningAgent {
    let profile = AgentProfile::new(
        DATA_STATUS_AGENT,
        "Investigates data quality issues, load job status and data freshness to find root causes",
    )
    .agent_type("data_quality_specialist")
    .domain("data quality")
    .capabilities(&[
        "Investigate data quality issues in datasets",
        "Check load job execution status and history",
        "Monitor data freshness",
        "Identify root causes of stale or incorrect data",
        "Validate data concerns",
    ])
    .keywords(&[
        "data quality", "data issue", "job status", "job fail", "failed job", "stale", "fresh",
        "updated", "refresh", "pipeline", "loaded", "wrong data", "incorrect", "missing", "delay",
    ])
    .phrases(&["data in", "why is", "when was", "check the data", "investigate", "data looks"])
    .scoring(Scoring::Cumulative)
    .planner_role("You are a data investigation expert. Create detailed plans to trace and diagnose data issues.")
    .planning_note("Start by validating the concern with AnalyzeDataFreshness, then check the job history of the affected dataset.")
    .planning_note("Set output_key to \"analysis\" on the final AnalyzeDataQuality step.")
    .default_adaptations(
        "Explain the likely causes from the job history alone",
        "Explain which job logs would be needed to investigate",
    );

    PlanningAgent::new(profile, data_status_tools(data), data_status_default_plan)
}

pub fn data_status_default_plan(query: &str) -> Plan {
    let mut freshness = PlanStep::new(1, "AnalyzeDataFreshness", "Check when the data was last loaded");
    let mut jobs = PlanStep::new(2, "CheckJobStatus", "Check recent load job runs");

    match mentioned_dataset(query) {
        Some(dataset) => {
            freshness = freshness.input("dataset", dataset);
            jobs = jobs
                .input("query_type", "job_history")
                .input("filters", json!({ "target_dataset": dataset }))
                .input("limit", 10);
        }
        None => {
            jobs = jobs.input("query_type", "portfolio_summary");
        }
    }

    Plan::new(
        format!("Investigate data issue: {}", query),
        vec![
            freshness.output("freshness"),
            jobs.output("job_history"),
            PlanStep::new(3, "AnalyzeDataQuality", "Analyze findings and identify the root cause")
                .input("investigation_data", "${freshness}")
                .input("analysis_type", "root_cause_analysis")
                .input("comparison_data", "${job_history}")
                .input("context", query)
                .output("analysis"),
        ],
    )
    .with_adaptations(Adaptations::new(
        "Explain the likely causes from the job history alone",
        "Explain which job logs would be needed to investigate",
    ))
}

//
// ================= Fallback =================
//

pub fn uncertain_agent() -> UncertainAgent {
    UncertainAgent::new(vec![
        Specialist::new(
            LOAN_AGENT,
            "Loans, mortgages, interest rates, credit risk and delinquency",
            &["loan", "borrow", "mortgage", "interest", "rate", "refinance"],
        ),
        Specialist::new(
            DEPOSIT_AGENT,
            "Deposit accounts, balances, transactions and savings",
            &["account", "balance", "deposit", "saving", "checking", "transaction"],
        ),
        Specialist::new(
            CUSTOMER_AGENT,
            "Customer segmentation, lifetime value and churn",
            &["customer", "client", "segment", "analytics", "demographic"],
        ),
        Specialist::new(
            DATA_STATUS_AGENT,
            "Data freshness, load jobs and data quality issues",
            &["data", "stale", "job", "quality", "fresh"],
        ),
    ])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::{Agent, RequestContext};
    use crate::execution::PlanExecutor;
    use crate::test_support::ScriptedLlm;
    use crate::tools::InMemoryDataSource;

    fn data() -> Arc<dyn DataSource> {
        Arc::new(InMemoryDataSource::banking_sample())
    }

    fn context(llm: Arc<ScriptedLlm>) -> RequestContext {
        RequestContext::new(LlmContext::new(llm, "test-model"))
    }

    #[test]
    fn test_loan_default_plan_by_query_shape() {
        assert!(loan_default_plan("loans this year vs last year").goal.starts_with("Compare"));
        assert!(loan_default_plan("loan portfolio health").goal.starts_with("Analyze loan portfolio"));
        assert!(loan_default_plan("what APR do we charge").goal.starts_with("Analyze interest rates"));
        assert_eq!(loan_default_plan("tell me about loans").steps.len(), 3);
    }

    #[test]
    fn test_default_plans_end_with_analysis() {
        for plan in [
            loan_default_plan("x vs y"),
            loan_default_plan("anything"),
            deposit_default_plan("transaction history"),
            deposit_default_plan("savings growth"),
            deposit_default_plan("balances"),
            customer_default_plan("churn risk"),
            customer_default_plan("spending by channel"),
            customer_default_plan("segments"),
            data_status_default_plan("is the deposit data stale"),
            data_status_default_plan("are the loads late"),
        ] {
            let last = plan.steps.last().unwrap();
            assert_eq!(last.effective_output_key(), "analysis");
            assert!(!plan.adaptations.is_empty());
        }
    }

    #[tokio::test]
    async fn test_deposit_single_keyword_confidence() {
        let ctx = context(Arc::new(ScriptedLlm::new(vec![])));
        let agent = deposit_analytics_agent(data());
        assert_eq!(agent.can_handle("show the overdraft figures", &ctx).await.confidence, 0.6);
    }

    #[tokio::test]
    async fn test_customer_agent_never_calls_llm() {
        let llm = Arc::new(ScriptedLlm::new(vec!["0.9"]));
        let agent = customer_analytics_agent(data());
        let assessment = agent.can_handle("what is the weather", &context(llm.clone())).await;
        assert!(!assessment.can_handle);
        assert_eq!(llm.call_count(), 0);
    }

    #[tokio::test]
    async fn test_default_loan_plan_runs_against_sample_data() {
        let llm = Arc::new(ScriptedLlm::new(vec![
            r#"{"summary": "Mortgages dominate", "insights": ["Tier A is largest"], "recommendations": []}"#,
        ]));
        let ctx = context(llm);
        let tools = loan_tools(data())(ctx.llm()).unwrap();

        let result = PlanExecutor::new(tools)
            .execute_plan(&loan_default_plan("loan portfolio health"))
            .await;

        assert!(result.success, "{:?}", result.errors);
        assert_eq!(result.final_output.unwrap()["summary"], "Mortgages dominate");
        assert!(result.outputs["portfolio_data"]["summary"]["total_records"].as_u64().unwrap() > 0);
    }

    #[tokio::test]
    async fn test_loan_agent_process_end_to_end_with_fallback_plan() {
        let llm = Arc::new(ScriptedLlm::new(vec![
            "no plan today",
            r#"{"summary": "Book is stable", "insights": ["Defaults are rare"], "recommendations": ["Keep pricing"]}"#,
        ]));
        let agent = loan_portfolio_agent(data());

        let response = agent.process("loan portfolio health", &[], &context(llm.clone())).await;

        assert!(!response.is_error());
        assert!(response.text.starts_with("Book is stable"));
        assert_eq!(response.metadata["agent_type"], "loan_specialist");
        assert_eq!(llm.call_count(), 2);
    }

    #[test]
    fn test_transaction_patterns_tool_is_shared() {
        let ctx = context(Arc::new(ScriptedLlm::new(vec![])));
        for toolset in [deposit_tools(data()), customer_tools(data())] {
            let tools = toolset(ctx.llm()).unwrap();
            assert!(tools.get("TransactionQuery").is_some());
            assert!(tools.get("AnalyzeTransactionPatterns").is_some());
        }

        let plan = deposit_default_plan("recent transaction activity");
        assert_eq!(plan.steps[1].tool_name, "AnalyzeTransactionPatterns");
        assert_eq!(plan.steps[1].inputs["transaction_data"], "${transaction_data}");
    }

    #[tokio::test]
    async fn test_customer_spending_plan_runs_against_sample_data() {
        let llm = Arc::new(ScriptedLlm::new(vec![
            r#"{"summary": "Mobile leads spending", "insights": [], "recommendations": []}"#,
        ]));
        let ctx = context(llm);
        let tools = customer_tools(data())(ctx.llm()).unwrap();

        let result = PlanExecutor::new(tools)
            .execute_plan(&customer_default_plan("customer spending by channel"))
            .await;

        assert!(result.success, "{:?}", result.errors);
        assert_eq!(result.outputs["channel_data"]["group_by"], "channel");
        assert_eq!(result.final_output.unwrap()["summary"], "Mobile leads spending");
    }

    #[tokio::test]
    async fn test_data_status_scoring() {
        let llm = Arc::new(ScriptedLlm::new(vec![]));
        let ctx = context(llm.clone());
        let agent = data_status_agent(data());

        let strong = agent.can_handle("why is the deposit data stale", &ctx).await;
        assert!((strong.confidence - 0.85).abs() < 1e-6);
        let weak = agent.can_handle("did the pipeline run", &ctx).await;
        assert!((weak.confidence - 0.55).abs() < 1e-6);
        assert!(!agent.can_handle("what is the weather", &ctx).await.can_handle);
        assert_eq!(llm.call_count(), 0);
    }

    #[test]
    fn test_data_status_plan_targets_mentioned_dataset() {
        let plan = data_status_default_plan("Why is the deposit data stale?");
        assert_eq!(plan.steps[0].inputs["dataset"], "deposits");
        assert_eq!(plan.steps[1].inputs["filters"]["target_dataset"], "deposits");

        let plan = data_status_default_plan("are the loads late");
        assert!(!plan.steps[0].inputs.contains_key("dataset"));
        assert_eq!(plan.steps[1].inputs["query_type"], "portfolio_summary");
    }

    #[tokio::test]
    async fn test_data_status_agent_finds_failed_deposit_load() {
        let llm = Arc::new(ScriptedLlm::new(vec![
            "not a plan",
            r#"{"summary": "Deposit load failed twice", "insights": ["Source extract missing"], "recommendations": ["Rerun load_deposits"]}"#,
        ]));
        let ctx = context(llm);
        let agent = data_status_agent(data());

        let response = agent.process("why is the deposit data stale", &[], &ctx).await;

        assert!(!response.is_error());
        assert!(response.text.starts_with("Deposit load failed twice"));
        assert_eq!(response.metadata["agent_type"], "data_quality_specialist");

        let execution = response.execution.unwrap();
        assert!(execution.success, "{:?}", execution.errors);
        assert_eq!(execution.outputs["freshness"]["stale_datasets"], json!(["deposits"]));
        assert_eq!(execution.outputs["job_history"]["count"], 6);
    }
}
