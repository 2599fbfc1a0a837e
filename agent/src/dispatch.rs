use std::sync::Arc;

use async_trait::async_trait;
use serde_json::json;

use helpdesk_core::escalation::ActionKind;
use helpdesk_mcp_runtime::{TicketDesk, TicketReceipt};

use crate::mcp_client::{McpClientError, McpHttpClient};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DispatchRequest {
    pub action: ActionKind,
    pub session_id: String,
    pub intent: String,
    pub issue: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DispatchReceipt {
    pub ticket_id: String,
    /// The backend already held a ticket for this session.
    pub duplicate: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DispatchError {
    #[error("action backend unavailable: {0}")]
    Unavailable(String),
    #[error("action rejected: {0}")]
    Rejected(String),
}

/// Performs the side effect of an escalation. Called at most once per
/// session, and never retried.
#[async_trait]
pub trait ActionDispatcher: Send + Sync {
    async fn dispatch(&self, request: &DispatchRequest) -> Result<DispatchReceipt, DispatchError>;
}

/// Opens tickets on an in-process [`TicketDesk`], the one the MCP server
/// in the same process serves.
#[derive(Debug, Clone)]
pub struct LocalActionDispatcher {
    tickets: Arc<TicketDesk>,
}

impl LocalActionDispatcher {
    pub fn new(tickets: Arc<TicketDesk>) -> Self {
        Self { tickets }
    }
}

#[async_trait]
impl ActionDispatcher for LocalActionDispatcher {
    async fn dispatch(&self, request: &DispatchRequest) -> Result<DispatchReceipt, DispatchError> {
        match request.action {
            ActionKind::CreateTicket => {
                let receipt = self.tickets.open(
                    &request.issue,
                    Some(&request.session_id),
                    Some(&request.intent),
                );
                let duplicate = matches!(receipt, TicketReceipt::Duplicate(_));
                Ok(DispatchReceipt {
                    ticket_id: receipt.ticket().ticket_id.clone(),
                    duplicate,
                })
            }
        }
    }
}

/// Invokes the action as an MCP tool call over HTTP.
#[derive(Debug, Clone)]
pub struct McpActionDispatcher {
    client: Arc<McpHttpClient>,
}

impl McpActionDispatcher {
    pub fn new(client: Arc<McpHttpClient>) -> Self {
        Self { client }
    }
}

#[async_trait]
impl ActionDispatcher for McpActionDispatcher {
    async fn dispatch(&self, request: &DispatchRequest) -> Result<DispatchReceipt, DispatchError> {
        let arguments = json!({
            "issue": request.issue,
            "session_id": request.session_id,
            "intent": request.intent,
        });
        let result = self
            .client
            .call_tool(request.action.as_str(), arguments)
            .await
            .map_err(|err| match err {
                McpClientError::Transport(_) | McpClientError::Http { .. } => {
                    DispatchError::Unavailable(err.to_string())
                }
                other => DispatchError::Rejected(other.to_string()),
            })?;

        let ticket_id = result["ticket_id"]
            .as_str()
            .ok_or_else(|| DispatchError::Rejected("response carried no ticket_id".to_string()))?;
        Ok(DispatchReceipt {
            ticket_id: ticket_id.to_string(),
            duplicate: result["status"] == "duplicate",
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use url::Url;

    fn request(session_id: &str) -> DispatchRequest {
        DispatchRequest {
            action: ActionKind::CreateTicket,
            session_id: session_id.to_string(),
            intent: "billing".to_string(),
            issue: "refund missing".to_string(),
        }
    }

    #[tokio::test]
    async fn local_dispatch_is_idempotent_per_session() {
        let desk = Arc::new(TicketDesk::new());
        let dispatcher = LocalActionDispatcher::new(desk.clone());

        let first = dispatcher.dispatch(&request("s-1")).await.unwrap();
        let second = dispatcher.dispatch(&request("s-1")).await.unwrap();
        assert!(!first.duplicate);
        assert!(second.duplicate);
        assert_eq!(first.ticket_id, second.ticket_id);
        assert_eq!(desk.len(), 1);
        assert_eq!(desk.find(&first.ticket_id).unwrap().intent.as_deref(), Some("billing"));
    }

    #[tokio::test]
    async fn unreachable_mcp_server_is_unavailable() {
        let client = McpHttpClient::new(Url::parse("http://127.0.0.1:9/mcp").unwrap());
        let dispatcher = McpActionDispatcher::new(Arc::new(client));
        let err = dispatcher.dispatch(&request("s-1")).await.unwrap_err();
        assert!(matches!(err, DispatchError::Unavailable(_)));
    }
}
