use std::sync::Arc;

use helpdesk_agent::pipeline::Pipeline;
use helpdesk_mcp_runtime::McpState;

#[derive(Clone)]
pub struct AppState {
    /// Configuration and ticket desk, served over `/mcp`.
    pub mcp: McpState,
    /// Chat pipeline sharing the same configuration and ticket desk.
    pub pipeline: Arc<Pipeline>,
}
