//! Mailwise: customer segmentation, RFM scoring and agent-driven email
//! marketing automation.
//!
//! Main entry point that wires the stores, the optional agent orchestrator
//! and the HTTP server.

use std::sync::Arc;

use clap::Parser;
use mailwise_agents::{AnthropicClient, LanguageModel, WorkflowOrchestrator};
use mailwise_api::ApiServer;
use mailwise_core::config::AppConfig;
use mailwise_management::ManagementStore;
use mailwise_segmentation::AudienceStore;
use tracing::{error, info, warn};

#[derive(Parser, Debug)]
#[command(name = "mailwise")]
#[command(about = "Segment-driven email marketing automation service")]
#[command(version)]
struct Cli {
    /// Node identifier (overrides config)
    #[arg(long, env = "MAILWISE__NODE_ID")]
    node_id: Option<String>,

    /// HTTP port (overrides config)
    #[arg(long, env = "MAILWISE__API__HTTP_PORT")]
    http_port: Option<u16>,

    /// Seed demo customers at startup (overrides config)
    #[arg(long, conflicts_with = "no_seed")]
    seed: bool,

    /// Skip demo customer seeding
    #[arg(long)]
    no_seed: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "mailwise=info,tower_http=info".into()),
        )
        .json()
        .init();

    let cli = Cli::parse();

    info!("Mailwise starting up");

    let mut config = AppConfig::load().unwrap_or_else(|e| {
        warn!(error = %e, "Failed to load config, using defaults");
        AppConfig::default()
    });

    if let Some(node_id) = cli.node_id {
        config.node_id = node_id;
    }
    if let Some(port) = cli.http_port {
        config.api.http_port = port;
    }
    if cli.seed {
        config.seed.enabled = true;
    }
    if cli.no_seed {
        config.seed.enabled = false;
    }

    info!(
        node_id = %config.node_id,
        http_port = config.api.http_port,
        model = %config.llm.model,
        "Configuration loaded"
    );

    let audience = Arc::new(AudienceStore::new());
    if config.seed.enabled {
        let inserted = audience.seed_customers(
            &config.seed.demo_user_id,
            config.seed.customers_per_user,
            config.seed.rng_seed,
        );
        info!(user_id = %config.seed.demo_user_id, inserted, "Demo customers seeded");
    }
    let management = Arc::new(ManagementStore::new(audience));

    let orchestrator = match AnthropicClient::new(&config.llm) {
        Ok(client) => {
            let model: Arc<dyn LanguageModel> = Arc::new(client);
            Some(Arc::new(WorkflowOrchestrator::with_tool_agents(
                model,
                management.clone(),
                &config.llm,
            )))
        }
        Err(e) => {
            warn!(error = %e, "Agent endpoint disabled");
            None
        }
    };

    let metrics_enabled = config.metrics.enabled;
    let api_server = ApiServer::new(config, management, orchestrator);

    if metrics_enabled {
        if let Err(e) = api_server.start_metrics().await {
            error!(error = %e, "Failed to start metrics exporter");
        }
    }

    info!("Mailwise is ready to serve traffic");

    api_server.start_http().await?;

    Ok(())
}
