//! Record sources backing the query tools
//!
//! The core never sees SQL. Query tools ask a [`DataSource`] for whole
//! datasets and aggregate in process.

use crate::error::OrchestrationError;
use crate::Result;
use async_trait::async_trait;
use serde_json::{json, Map, Value};
use std::collections::HashMap;

pub type Record = Map<String, Value>;

#[async_trait]
pub trait DataSource: Send + Sync {
    fn datasets(&self) -> Vec<String>;
    async fn fetch(&self, dataset: &str) -> Result<Vec<Record>>;
}

/// Fixed in-memory datasets
#[derive(Debug, Default, Clone)]
pub struct InMemoryDataSource {
    datasets: HashMap<String, Vec<Record>>,
}

impl InMemoryDataSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_dataset(mut self, name: impl Into<String>, records: Vec<Record>) -> Self {
        self.datasets.insert(name.into(), records);
        self
    }

    /// Deterministic banking sample: loans, deposits, customers, transactions
    /// and the `job_runs` log of the loads that filled them.
    pub fn banking_sample() -> Self {
        Self::new()
            .with_dataset("loans", sample_loans(60))
            .with_dataset("deposits", sample_deposits(80))
            .with_dataset("customers", sample_customers(40))
            .with_dataset("transactions", sample_transactions(120))
            .with_dataset("job_runs", sample_job_runs(6))
    }
}

#[async_trait]
impl DataSource for InMemoryDataSource {
    fn datasets(&self) -> Vec<String> {
        let mut names: Vec<String> = self.datasets.keys().cloned().collect();
        names.sort();
        names
    }

    async fn fetch(&self, dataset: &str) -> Result<Vec<Record>> {
        self.datasets
            .get(dataset)
            .cloned()
            .ok_or_else(|| OrchestrationError::DataSource(format!("Unknown dataset '{}'", dataset)))
    }
}

fn record(value: Value) -> Record {
    match value {
        Value::Object(map) => map,
        _ => Record::new(),
    }
}

fn pick<'a>(options: &[&'a str], seed: usize) -> &'a str {
    options[seed % options.len()]
}

fn sample_loans(count: usize) -> Vec<Record> {
    (0..count)
        .map(|i| {
            let amount = 5_000 + (i * 7_919 % 97) * 2_500;
            let remaining = amount * (30 + i * 13 % 70) / 100;
            record(json!({
                "loan_id": format!("L{:04}", i + 1),
                "customer_id": format!("C{:04}", i % 40 + 1),
                "loan_type": pick(&["mortgage", "personal", "auto", "business"], i),
                "amount": amount,
                "remaining_balance": remaining,
                "interest_rate": 3.5 + (i * 37 % 60) as f64 / 10.0,
                "status": pick(&["current", "current", "current", "late", "current", "default", "paid"], i * 3),
                "risk_tier": pick(&["A", "B", "C"], i * 7),
                "origination_year": 2021 + (i % 5) as i64,
            }))
        })
        .collect()
}

fn sample_deposits(count: usize) -> Vec<Record> {
    (0..count)
        .map(|i| {
            record(json!({
                "account_id": format!("D{:04}", i + 1),
                "customer_id": format!("C{:04}", i % 40 + 1),
                "account_type": pick(&["checking", "savings", "cd", "money_market"], i),
                "balance": 250 + (i * 4_513 % 211) * 300,
                "interest_rate": (i * 17 % 45) as f64 / 10.0,
                "status": pick(&["active", "active", "active", "dormant", "active", "closed"], i * 5),
                "opened_year": 2018 + (i % 7) as i64,
            }))
        })
        .collect()
}

fn sample_customers(count: usize) -> Vec<Record> {
    (0..count)
        .map(|i| {
            record(json!({
                "customer_id": format!("C{:04}", i + 1),
                "segment": pick(&["retail", "retail", "premium", "business", "private"], i),
                "region": pick(&["north", "south", "east", "west"], i * 3),
                "age": 22 + (i * 11 % 50) as i64,
                "tenure_years": (i * 7 % 15) as i64,
                "products_held": 1 + (i * 5 % 4) as i64,
                "lifetime_value": 1_200 + (i * 2_741 % 173) * 150,
                "churn_risk": pick(&["low", "low", "medium", "high"], i * 3),
                "joined_year": 2010 + (i % 14) as i64,
            }))
        })
        .collect()
}

fn sample_transactions(count: usize) -> Vec<Record> {
    (0..count)
        .map(|i| {
            record(json!({
                "transaction_id": format!("T{:05}", i + 1),
                "customer_id": format!("C{:04}", i % 40 + 1),
                "category": pick(&["groceries", "utilities", "travel", "dining", "transfer", "payroll"], i),
                "channel": pick(&["mobile", "online", "branch", "atm"], i * 7),
                "amount": 15 + (i * 3_137 % 409) * 3,
                "month": 1 + (i % 12) as i64,
                "year": 2025,
            }))
        })
        .collect()
}

/// Daily load runs per dataset, most recent first. The deposit load has
/// failed for the last two days.
fn sample_job_runs(runs_per_job: usize) -> Vec<Record> {
    let jobs = [
        ("load_loans", "loans"),
        ("load_deposits", "deposits"),
        ("load_customers", "customers"),
        ("load_transactions", "transactions"),
    ];

    jobs.iter()
        .enumerate()
        .flat_map(|(j, (job, target))| {
            (0..runs_per_job).map(move |r| {
                let failed = *target == "deposits" && r < 2;
                record(json!({
                    "run_id": format!("R{:03}", j * runs_per_job + r + 1),
                    "job_name": job,
                    "target_dataset": target,
                    "status": if failed { "failed" } else { "success" },
                    "rows_processed": if failed { 0 } else { 1_000 + (j * 37 + r * 13) % 200 * 5 },
                    "hours_ago": (r * 24 + j * 2 + 1) as i64,
                    "error_message": if failed { json!("Source extract not received") } else { Value::Null },
                }))
            })
        })
        .collect()
}
