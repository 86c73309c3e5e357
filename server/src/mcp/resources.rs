//! Resources exposed alongside the tools.

use super::protocol::{Resource, ResourceContent, ResourceReadResult};
use crate::pipeline::DocAgent;

pub const STATUS_URI: &str = "doc-agent://status";
pub const CONFIG_URI: &str = "doc-agent://config";

const JSON_MIME: &str = "application/json";

pub fn get_all_resources() -> Vec<Resource> {
    vec![
        Resource {
            uri: STATUS_URI.to_string(),
            name: "Agent Status".to_string(),
            description: Some(
                "Availability of Context7, MemMachine, Opik and the completion service"
                    .to_string(),
            ),
            mime_type: Some(JSON_MIME.to_string()),
        },
        Resource {
            uri: CONFIG_URI.to_string(),
            name: "Agent Configuration".to_string(),
            description: Some("Effective configuration without secrets".to_string()),
            mime_type: Some(JSON_MIME.to_string()),
        },
    ]
}

/// Read a resource by URI; `None` for unknown URIs
pub async fn read_resource(uri: &str, agent: &DocAgent) -> Option<ResourceReadResult> {
    let value = match uri {
        STATUS_URI => agent.status().await,
        CONFIG_URI => agent.config().summary(),
        _ => return None,
    };

    Some(ResourceReadResult {
        contents: vec![ResourceContent {
            uri: uri.to_string(),
            mime_type: Some(JSON_MIME.to_string()),
            text: serde_json::to_string_pretty(&value).unwrap_or_else(|_| value.to_string()),
        }],
    })
}
