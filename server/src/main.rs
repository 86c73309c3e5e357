//! Documentation injection agent entry point.
//!
//! `serve` (default) speaks MCP over stdio for the editor; `register` prints
//! the settings snippet that tells the editor how to launch it.

use std::sync::Arc;

use docagent_mcp::config::{load_cli, Command, ServeArgs};
use docagent_mcp::mcp::McpServer;
use docagent_mcp::{AgentConfig, DocAgent, RegistrationRecord};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

const DEFAULT_LOG_FILTER: &str = "docagent_mcp=info,docagent_memory=info";

#[tokio::main]
async fn main() {
    // Env files may set RUST_LOG, so they load before logging starts
    let cli = load_cli();

    // Stdout carries the protocol; logs must go to stderr
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| DEFAULT_LOG_FILTER.into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = match cli {
        Ok(cli) => cli,
        Err(e) => {
            tracing::error!("{}", e);
            std::process::exit(1);
        }
    };

    match cli.into_command() {
        Command::Serve(args) => serve(args).await,
        Command::Register(args) => match RegistrationRecord::from_args(&args) {
            Ok(record) => match serde_json::to_string_pretty(&record.to_settings()) {
                Ok(json) => println!("{}", json),
                Err(e) => {
                    tracing::error!("Failed to render registration: {}", e);
                    std::process::exit(1);
                }
            },
            Err(e) => {
                tracing::error!("Failed to build registration: {}", e);
                std::process::exit(1);
            }
        },
    }
}

async fn serve(args: ServeArgs) {
    let config = match AgentConfig::from_args(args) {
        Ok(config) => config,
        Err(e) => {
            tracing::error!("{}", e);
            std::process::exit(1);
        }
    };

    tracing::info!("Starting Documentation Injection Agent...");
    let agent = match DocAgent::new(config) {
        Ok(agent) => agent,
        Err(e) => {
            tracing::error!("Failed to initialize agent: {}", e);
            std::process::exit(1);
        }
    };

    if let Err(e) = agent.check_services().await {
        tracing::error!("MemMachine is not reachable: {}", e);
        tracing::error!("Start MemMachine or pass --skip-health-check");
        std::process::exit(1);
    }

    tracing::info!("Agent ready! Waiting for requests from the editor...");
    let mut server = McpServer::new(Arc::new(agent));
    if let Err(e) = server.run().await {
        tracing::error!("MCP server error: {}", e);
        std::process::exit(1);
    }
}
