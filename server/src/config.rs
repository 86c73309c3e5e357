//! Command line and environment configuration.
//!
//! Every setting can come from a flag or from the environment; a `.env`
//! file in the working directory is loaded before parsing.

use clap::{Args, Parser, Subcommand};
use serde_json::json;
use std::path::PathBuf;

use crate::analytics::{AnalyticsConfig, DEFAULT_PROJECT};
use crate::completion::CompletionConfig;
use crate::docs::{DocsClientConfig, DEFAULT_ENDPOINT, DEFAULT_TOKENS};
use crate::error::{AgentError, AgentResult};
use docagent_memory::MemoryClientConfig;

pub const DEFAULT_USER: &str = "zed_user";

#[derive(Debug, Parser)]
#[command(name = "docagent-mcp")]
#[command(about = "Documentation injection agent: MCP server backed by Context7, MemMachine and Opik")]
#[command(version)]
pub struct Cli {
    /// Load environment variables from this file (in addition to ./.env)
    #[arg(long, global = true)]
    pub env_file: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Command>,

    #[command(flatten)]
    pub serve: ServeArgs,
}

impl Cli {
    /// Subcommand to run; `serve` when none was given
    pub fn into_command(self) -> Command {
        self.command.unwrap_or(Command::Serve(self.serve))
    }
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Serve MCP over stdio (default)
    Serve(ServeArgs),
    /// Print the editor registration snippet for this server
    Register(RegisterArgs),
}

#[derive(Debug, Clone, Args)]
pub struct ServeArgs {
    /// Context7 API key
    #[arg(long, env = "CONTEXT7_API_KEY", hide_env_values = true)]
    pub context7_api_key: Option<String>,

    /// Context7 MCP endpoint
    #[arg(long, env = "CONTEXT7_URL", default_value = DEFAULT_ENDPOINT)]
    pub context7_url: String,

    /// Token budget requested per documentation fetch (minimum 1000)
    #[arg(long, env = "DOCS_TOKENS", default_value_t = DEFAULT_TOKENS)]
    pub docs_tokens: u32,

    /// MemMachine base URL
    #[arg(long, env = "MEMMACHINE_URL", default_value = docagent_memory::DEFAULT_BASE_URL)]
    pub memmachine_url: String,

    /// Opik API key; analytics are disabled when neither this nor a URL override is set
    #[arg(long, env = "OPIK_API_KEY", hide_env_values = true)]
    pub opik_api_key: Option<String>,

    /// Opik workspace name
    #[arg(long, env = "OPIK_WORKSPACE")]
    pub opik_workspace: Option<String>,

    /// Base URL of a self-hosted Opik API
    #[arg(long, env = "OPIK_URL_OVERRIDE")]
    pub opik_url_override: Option<String>,

    /// Opik project traces are filed under
    #[arg(long, env = "OPIK_PROJECT_NAME", default_value = DEFAULT_PROJECT)]
    pub opik_project_name: String,

    /// Completion service key, enables model-assisted library selection
    #[arg(long, env = "OPENAI_API_KEY", hide_env_values = true)]
    pub openai_api_key: Option<String>,

    #[arg(long, env = "OPENAI_BASE_URL", default_value = crate::completion::DEFAULT_BASE_URL)]
    pub openai_base_url: String,

    #[arg(long, env = "OPENAI_MODEL", default_value = crate::completion::DEFAULT_MODEL)]
    pub openai_model: String,

    /// User id applied when a tool call does not name one
    #[arg(long, env = "DOCAGENT_DEFAULT_USER", default_value = DEFAULT_USER)]
    pub default_user: String,

    /// Number of resolved library ids kept in memory
    #[arg(long, env = "LIBRARY_CACHE_SIZE", default_value_t = crate::cache::DEFAULT_CAPACITY)]
    pub library_cache_size: usize,

    /// Start even if MemMachine does not report healthy
    #[arg(long)]
    pub skip_health_check: bool,
}

#[derive(Debug, Clone, Args)]
pub struct RegisterArgs {
    /// Name the editor lists the server under
    #[arg(long, default_value = crate::registration::DEFAULT_IDENTIFIER)]
    pub identifier: String,

    /// Executable to launch (defaults to this binary)
    #[arg(long)]
    pub command: Option<PathBuf>,

    /// Arguments passed to the executable
    #[arg(long = "arg", default_values_t = vec!["serve".to_string()])]
    pub args: Vec<String>,

    /// Extra environment entries, KEY=VALUE
    #[arg(long = "env", value_parser = parse_env_pair)]
    pub env: Vec<(String, String)>,

    /// Copy API keys from the current environment into the snippet
    #[arg(long)]
    pub include_secrets: bool,
}

fn parse_env_pair(raw: &str) -> Result<(String, String), String> {
    match raw.split_once('=') {
        Some((key, value)) if !key.is_empty() => Ok((key.to_string(), value.to_string())),
        _ => Err(format!("expected KEY=VALUE, got '{}'", raw)),
    }
}

/// Parse the command line, honouring `--env-file` for environment fallbacks.
///
/// Runs before logging is set up so `RUST_LOG` from an env file applies.
pub fn load_cli() -> AgentResult<Cli> {
    load_cli_from(std::env::args_os().collect::<Vec<_>>())
}

pub fn load_cli_from<I, T>(args: I) -> AgentResult<Cli>
where
    I: IntoIterator<Item = T> + Clone,
    T: Into<std::ffi::OsString> + Clone,
{
    dotenv::dotenv().ok();
    let cli = Cli::parse_from(args.clone());
    match &cli.env_file {
        Some(path) => {
            dotenv::from_path(path).map_err(|e| {
                AgentError::config(format!("Failed to load env file {:?}: {}", path, e))
            })?;
            // Re-parse so values from the file become visible as fallbacks
            Ok(Cli::parse_from(args))
        }
        None => Ok(cli),
    }
}

/// Fully resolved settings for the agent
#[derive(Debug, Clone)]
pub struct AgentConfig {
    pub docs: DocsClientConfig,
    pub docs_tokens: u32,
    pub memory: MemoryClientConfig,
    pub analytics: AnalyticsConfig,
    pub completion: Option<CompletionConfig>,
    pub default_user: String,
    pub library_cache_size: usize,
    pub skip_health_check: bool,
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

impl AgentConfig {
    pub fn from_args(args: ServeArgs) -> AgentResult<Self> {
        let api_key = non_empty(args.context7_api_key)
            .ok_or_else(|| AgentError::config("CONTEXT7_API_KEY not found in environment"))?;

        let completion = non_empty(args.openai_api_key).map(|key| {
            let mut config = CompletionConfig::new(key);
            config.base_url = args.openai_base_url;
            config.model = args.openai_model;
            config
        });

        Ok(Self {
            docs: DocsClientConfig::new(api_key).with_endpoint(args.context7_url),
            docs_tokens: args.docs_tokens,
            memory: MemoryClientConfig::default().with_base_url(args.memmachine_url),
            analytics: AnalyticsConfig {
                api_key: non_empty(args.opik_api_key),
                workspace: non_empty(args.opik_workspace),
                url_override: non_empty(args.opik_url_override),
                project_name: args.opik_project_name,
                ..Default::default()
            },
            completion,
            default_user: args.default_user,
            library_cache_size: args.library_cache_size,
            skip_health_check: args.skip_health_check,
        })
    }

    /// Effective configuration without secrets
    pub fn summary(&self) -> serde_json::Value {
        json!({
            "context7": {
                "endpoint": self.docs.endpoint,
                "tokens": self.docs_tokens,
            },
            "memmachine": {
                "baseUrl": self.memory.base_url,
            },
            "opik": {
                "enabled": self.analytics.is_configured(),
                "baseUrl": self.analytics.base_url(),
                "project": self.analytics.project_name,
                "workspace": self.analytics.workspace,
            },
            "completion": {
                "enabled": self.completion.is_some(),
                "model": self.completion.as_ref().map(|c| c.model.clone()),
            },
            "defaultUser": self.default_user,
            "libraryCacheSize": self.library_cache_size,
        })
    }
}
