use std::sync::atomic::{AtomicU64, Ordering};

use serde_json::{Value, json};
use url::Url;

use helpdesk_core::config::{ConfigError, ConfigStore};
use helpdesk_mcp_runtime::{
    ACTIONS_URI, INTENTS_URI, KNOWLEDGE_SEARCH_PREFIX, PERSONA_URI, knowledge_search_uri,
};

#[derive(Debug, thiserror::Error)]
pub enum McpClientError {
    #[error("MCP transport error: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("MCP server returned HTTP {status}")]
    Http { status: u16 },
    #[error("MCP error {code}: {message}")]
    Rpc { code: i64, message: String },
    #[error("tool '{tool}' failed with {code}: {message}")]
    Tool {
        tool: String,
        code: String,
        message: String,
    },
    #[error("malformed MCP response: {0}")]
    Malformed(String),
    #[error(transparent)]
    Config(#[from] ConfigError),
}

/// JSON-RPC client for the helpdesk MCP server's HTTP endpoint.
#[derive(Debug)]
pub struct McpHttpClient {
    client: reqwest::Client,
    endpoint: Url,
    next_id: AtomicU64,
}

impl McpHttpClient {
    pub fn new(endpoint: Url) -> Self {
        Self {
            client: reqwest::Client::new(),
            endpoint,
            next_id: AtomicU64::new(1),
        }
    }

    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }

    pub async fn request(&self, method: &str, params: Value) -> Result<Value, McpClientError> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let body = json!({
            "jsonrpc": "2.0",
            "id": id,
            "method": method,
            "params": params,
        });

        let response = self
            .client
            .post(self.endpoint.clone())
            .json(&body)
            .send()
            .await?;
        let status = response.status();
        if !status.is_success() {
            return Err(McpClientError::Http {
                status: status.as_u16(),
            });
        }
        let payload: Value = response.json().await?;
        unwrap_rpc_result(payload)
    }

    pub async fn initialize(&self) -> Result<Value, McpClientError> {
        self.request(
            "initialize",
            json!({
                "protocolVersion": "2024-11-05",
                "capabilities": {},
                "clientInfo": { "name": "helpdesk-agent", "version": env!("CARGO_PKG_VERSION") }
            }),
        )
        .await
    }

    /// Parsed JSON body of the first content item of a resource.
    pub async fn read_resource_json(&self, uri: &str) -> Result<Value, McpClientError> {
        let result = self.request("resources/read", json!({ "uri": uri })).await?;
        let text = result["contents"][0]["text"]
            .as_str()
            .ok_or_else(|| McpClientError::Malformed(format!("resource '{uri}' has no text")))?;
        serde_json::from_str(text)
            .map_err(|e| McpClientError::Malformed(format!("resource '{uri}': {e}")))
    }

    /// Structured result of a tool call. Tool-level failures become
    /// [`McpClientError::Tool`].
    pub async fn call_tool(&self, name: &str, arguments: Value) -> Result<Value, McpClientError> {
        let result = self
            .request("tools/call", json!({ "name": name, "arguments": arguments }))
            .await?;
        let structured = result
            .get("structuredContent")
            .cloned()
            .ok_or_else(|| McpClientError::Malformed(format!("tool '{name}' returned no structuredContent")))?;
        if result.get("isError").and_then(Value::as_bool) == Some(true) {
            return Err(McpClientError::Tool {
                tool: name.to_string(),
                code: structured["error"].as_str().unwrap_or("tool_error").to_string(),
                message: structured["message"].as_str().unwrap_or_default().to_string(),
            });
        }
        Ok(structured)
    }

    /// Knowledge entries matching `query`, as served.
    pub async fn search_knowledge(&self, query: &str) -> Result<Vec<Value>, McpClientError> {
        let payload = self.read_resource_json(&knowledge_search_uri(query)).await?;
        Ok(matches_of(&payload))
    }

    /// Read every configuration resource once and build a local store.
    pub async fn load_config(&self) -> Result<ConfigStore, McpClientError> {
        let persona = self.read_resource_json(PERSONA_URI).await?;
        let intents = self.read_resource_json(INTENTS_URI).await?;
        let actions = self.read_resource_json(ACTIONS_URI).await?;
        let knowledge = self.read_resource_json(KNOWLEDGE_SEARCH_PREFIX).await?;
        let entries = Value::Array(matches_of(&knowledge));
        let store = ConfigStore::from_documents(persona, intents, actions, entries)?;
        tracing::info!(
            event = "mcp_config_loaded",
            endpoint = %self.endpoint,
            intents = store.intents.intents.len(),
            knowledge_entries = store.knowledge.len(),
            "Configuration loaded over MCP"
        );
        Ok(store)
    }
}

fn matches_of(payload: &Value) -> Vec<Value> {
    payload["matches"].as_array().cloned().unwrap_or_default()
}

fn unwrap_rpc_result(payload: Value) -> Result<Value, McpClientError> {
    if let Some(error) = payload.get("error") {
        return Err(McpClientError::Rpc {
            code: error["code"].as_i64().unwrap_or(-32603),
            message: error["message"].as_str().unwrap_or_default().to_string(),
        });
    }
    payload
        .get("result")
        .cloned()
        .ok_or_else(|| McpClientError::Malformed("response has neither result nor error".to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rpc_errors_are_surfaced() {
        let err = unwrap_rpc_result(json!({
            "jsonrpc": "2.0",
            "id": 1,
            "error": { "code": -32602, "message": "Unknown resource uri" }
        }))
        .unwrap_err();
        assert!(matches!(err, McpClientError::Rpc { code: -32602, .. }));
    }

    #[test]
    fn results_are_unwrapped() {
        let result = unwrap_rpc_result(json!({ "jsonrpc": "2.0", "id": 1, "result": { "ok": true } })).unwrap();
        assert_eq!(result["ok"], true);
        assert!(matches!(
            unwrap_rpc_result(json!({ "jsonrpc": "2.0", "id": 1 })),
            Err(McpClientError::Malformed(_))
        ));
    }

    #[test]
    fn client_reports_its_endpoint() {
        let client = McpHttpClient::new(Url::parse("http://localhost:3000/mcp").unwrap());
        assert_eq!(client.endpoint().as_str(), "http://localhost:3000/mcp");
    }

    #[test]
    fn matches_default_to_empty() {
        assert!(matches_of(&json!({ "search_mode": "keyword" })).is_empty());
        assert_eq!(matches_of(&json!({ "matches": [{ "id": "kb-1" }] })).len(), 1);
    }

    #[tokio::test]
    async fn unreachable_server_is_transport_error() {
        let client = McpHttpClient::new(Url::parse("http://127.0.0.1:9/mcp").unwrap());
        let err = client.initialize().await.unwrap_err();
        assert!(matches!(err, McpClientError::Transport(_)));
    }
}
