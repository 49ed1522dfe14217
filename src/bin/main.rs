use agent_router::{
    llm::OpenAiClient,
    tools::InMemoryDataSource,
    AgentRegistry, ChatMessage, DebugHook, DebugLevel, LlmContext, RequestContext, Settings,
};
use clap::{Parser, Subcommand};
use std::sync::Arc;
use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "agent-router")]
#[command(about = "Route banking questions to specialist agents and run their plans", long_about = None)]
struct Cli {
    /// Print executor progress as it happens
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Route a query and answer it
    Ask {
        query: String,
        /// Skip routing and use this agent
        #[arg(short, long)]
        agent: Option<String>,
        /// Override OPENAI_MODEL
        #[arg(short, long)]
        model: Option<String>,
        /// Print the full response as JSON
        #[arg(long)]
        json: bool,
    },
    /// List registered agents
    Agents,
    /// Show which agent a query would go to
    Route {
        query: String,
        #[arg(short, long)]
        model: Option<String>,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();
    let settings = Settings::from_env()?;

    let data = Arc::new(InMemoryDataSource::banking_sample());
    let registry = AgentRegistry::banking(data, settings.router)?;

    match cli.command {
        Commands::Agents => {
            for info in registry.agent_info() {
                println!("{} - {}", info.name, info.description);
                for capability in &info.capabilities {
                    println!("    • {}", capability);
                }
            }
            Ok(())
        }
        Commands::Route { query, model } => {
            let ctx = request_context(&settings, model, cli.verbose)?;
            let router = registry.router().await?;
            let decision = router.route(&query, &ctx).await;
            println!(
                "{} (confidence {:.2}, {:?})",
                decision.agent.name(),
                decision.confidence,
                decision.source
            );
            Ok(())
        }
        Commands::Ask {
            query,
            agent,
            model,
            json,
        } => {
            let ctx = request_context(&settings, model, cli.verbose)?;
            let history: Vec<ChatMessage> = Vec::new();

            let response = match agent {
                Some(name) => {
                    let router = registry.router().await?;
                    let agent = router
                        .agent_by_name(&name)
                        .ok_or_else(|| agent_router::OrchestrationError::UnknownAgent(name.clone()))?;
                    info!(agent = %agent.name(), "Routing bypassed");
                    agent.process(&query, &history, &ctx).await
                }
                None => {
                    let (decision, response) = registry.router().await?.dispatch(&query, &history, &ctx).await;
                    debug!(agent = %decision.agent.name(), confidence = decision.confidence, "Query dispatched");
                    response
                }
            };

            if json {
                println!("{}", serde_json::to_string_pretty(&response)?);
            } else {
                println!("\n=== {} ===\n", response.agent);
                println!("{}", response.text);
                if let Some(execution) = &response.execution {
                    println!(
                        "\n({} step(s), success: {})",
                        execution.steps_executed.len(),
                        execution.success
                    );
                }
            }

            if response.is_error() {
                warn!("Query finished with an error response");
            }
            Ok(())
        }
    }
}

fn request_context(
    settings: &Settings,
    model: Option<String>,
    verbose: bool,
) -> Result<RequestContext, Box<dyn std::error::Error>> {
    let client = OpenAiClient::from_settings(settings).map_err(|e| {
        eprintln!("⚠️  OPENAI_API_KEY not set in .env");
        e
    })?;
    let model = model.unwrap_or_else(|| settings.openai_model.clone());
    let ctx = RequestContext::new(LlmContext::new(Arc::new(client), model));

    if verbose {
        let hook: DebugHook = Arc::new(|message: &str, level: DebugLevel| {
            eprintln!("[{}] {}", level, message);
        });
        Ok(ctx.with_debug_hook(hook))
    } else {
        Ok(ctx)
    }
}
