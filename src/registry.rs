//! Agent registry
//!
//! Holds agent factories under stable names and builds the router once, on
//! first request. Constructed explicitly and passed to whoever needs it.

use crate::agent::banking::{
    customer_analytics_agent, data_status_agent, deposit_analytics_agent, loan_portfolio_agent,
    uncertain_agent, CUSTOMER_AGENT, DATA_STATUS_AGENT, DEPOSIT_AGENT, LOAN_AGENT,
};
use crate::agent::Agent;
use crate::config::RouterConfig;
use crate::error::OrchestrationError;
use crate::models::AgentDescriptor;
use crate::router::AgentRouter;
use crate::tools::DataSource;
use crate::Result;
use std::sync::Arc;
use tokio::sync::OnceCell;
use tracing::info;

pub type AgentFactory = Box<dyn Fn() -> Arc<dyn Agent> + Send + Sync>;

pub const UNCERTAIN_AGENT: &str = "UncertainAgent";

pub struct AgentRegistry {
    factories: Vec<(String, AgentFactory)>,
    default_name: Option<String>,
    config: RouterConfig,
    router: OnceCell<AgentRouter>,
}

impl AgentRegistry {
    pub fn new(config: RouterConfig) -> Self {
        Self {
            factories: Vec::new(),
            default_name: None,
            config,
            router: OnceCell::new(),
        }
    }

    /// Loan, deposit, customer and data status specialists over `data`, with
    /// the clarification agent as default.
    pub fn banking(data: Arc<dyn DataSource>, config: RouterConfig) -> Result<Self> {
        let mut registry = Self::new(config);

        let loans = Arc::clone(&data);
        registry.register(LOAN_AGENT, move || {
            Arc::new(loan_portfolio_agent(Arc::clone(&loans))) as Arc<dyn Agent>
        })?;
        let deposits = Arc::clone(&data);
        registry.register(DEPOSIT_AGENT, move || {
            Arc::new(deposit_analytics_agent(Arc::clone(&deposits))) as Arc<dyn Agent>
        })?;
        let customers = Arc::clone(&data);
        registry.register(CUSTOMER_AGENT, move || {
            Arc::new(customer_analytics_agent(Arc::clone(&customers))) as Arc<dyn Agent>
        })?;
        let status = data;
        registry.register(DATA_STATUS_AGENT, move || {
            Arc::new(data_status_agent(Arc::clone(&status))) as Arc<dyn Agent>
        })?;
        registry.register(UNCERTAIN_AGENT, || Arc::new(uncertain_agent()) as Arc<dyn Agent>)?;
        registry.set_default(UNCERTAIN_AGENT)?;

        Ok(registry)
    }

    /// Re-registering a name replaces its factory. Fails once the router exists.
    pub fn register<F>(&mut self, name: &str, factory: F) -> Result<()>
    where
        F: Fn() -> Arc<dyn Agent> + Send + Sync + 'static,
    {
        if self.router.initialized() {
            return Err(OrchestrationError::Config(format!(
                "Cannot register '{}' after the router was built",
                name
            )));
        }

        let factory: AgentFactory = Box::new(factory);
        match self.factories.iter_mut().find(|(n, _)| n == name) {
            Some(entry) => entry.1 = factory,
            None => self.factories.push((name.to_string(), factory)),
        }
        Ok(())
    }

    pub fn set_default(&mut self, name: &str) -> Result<()> {
        if self.router.initialized() {
            return Err(OrchestrationError::Config(
                "Cannot change the default agent after the router was built".to_string(),
            ));
        }
        if !self.factories.iter().any(|(n, _)| n == name) {
            return Err(OrchestrationError::UnknownAgent(name.to_string()));
        }
        self.default_name = Some(name.to_string());
        Ok(())
    }

    /// A fresh instance, independent of the router's.
    pub fn create_agent(&self, name: &str) -> Result<Arc<dyn Agent>> {
        self.factories
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, factory)| factory())
            .ok_or_else(|| OrchestrationError::UnknownAgent(name.to_string()))
    }

    pub fn agent_names(&self) -> Vec<&str> {
        self.factories.iter().map(|(n, _)| n.as_str()).collect()
    }

    pub fn agent_info(&self) -> Vec<AgentDescriptor> {
        self.factories
            .iter()
            .map(|(_, factory)| factory().descriptor())
            .collect()
    }

    /// Built on first call; later calls return the same router.
    pub async fn router(&self) -> Result<&AgentRouter> {
        self.router
            .get_or_try_init(|| async {
                let mut builder = AgentRouter::builder().config(self.config);
                for (name, factory) in &self.factories {
                    let agent = factory();
                    builder = if self.default_name.as_deref() == Some(name.as_str()) {
                        builder.default_agent(agent)
                    } else {
                        builder.agent(agent)
                    };
                }
                let router = builder.build()?;
                info!(agents = router.agents().len(), default = %router.default_agent().name(), "Router initialized");
                Ok::<_, OrchestrationError>(router)
            })
            .await
    }
}
