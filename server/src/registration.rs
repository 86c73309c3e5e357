//! Editor registration record.
//!
//! The editor launches context servers from its settings file. This module
//! renders the entry for this server so it can be pasted under
//! `context_servers`.

use serde::Serialize;
use serde_json::json;
use std::collections::BTreeMap;
use std::path::PathBuf;

use crate::config::RegisterArgs;
use crate::error::AgentResult;

pub const DEFAULT_IDENTIFIER: &str = "doc-injection-agent";

/// Variables copied from the environment when secrets are requested
const SECRET_VARS: &[&str] = &[
    "CONTEXT7_API_KEY",
    "OPENAI_API_KEY",
    "OPIK_API_KEY",
    "OPIK_WORKSPACE",
];

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CommandSpec {
    pub path: PathBuf,
    pub args: Vec<String>,
    pub env: BTreeMap<String, String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RegistrationRecord {
    #[serde(skip)]
    pub identifier: String,
    pub command: CommandSpec,
}

impl RegistrationRecord {
    pub fn new(identifier: impl Into<String>, path: PathBuf, args: Vec<String>) -> Self {
        Self {
            identifier: identifier.into(),
            command: CommandSpec {
                path,
                args,
                env: BTreeMap::new(),
            },
        }
    }

    pub fn with_env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.command.env.insert(key.into(), value.into());
        self
    }

    /// Build from CLI arguments and the current process environment
    pub fn from_args(args: &RegisterArgs) -> AgentResult<Self> {
        let path = match &args.command {
            Some(path) => path.clone(),
            None => std::env::current_exe()?,
        };

        let mut record = Self::new(&args.identifier, path, args.args.clone())
            .with_env("PATH", std::env::var("PATH").unwrap_or_default());

        if args.include_secrets {
            for var in SECRET_VARS {
                if let Ok(value) = std::env::var(var) {
                    record = record.with_env(*var, value);
                }
            }
        }
        for (key, value) in &args.env {
            record = record.with_env(key, value);
        }

        Ok(record)
    }

    /// `context_servers` fragment for the editor settings file
    pub fn to_settings(&self) -> serde_json::Value {
        let mut servers = serde_json::Map::new();
        servers.insert(
            self.identifier.clone(),
            serde_json::to_value(self).unwrap_or_default(),
        );
        json!({ "context_servers": servers })
    }
}
