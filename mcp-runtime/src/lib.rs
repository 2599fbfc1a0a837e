use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use clap::{Args, Subcommand};
use serde_json::{Map, Value, json};
use tokio::io::{
    self, AsyncBufRead, AsyncBufReadExt, AsyncReadExt, AsyncWrite, AsyncWriteExt, BufReader,
};
use uuid::Uuid;

use helpdesk_core::config::ConfigStore;
use helpdesk_core::knowledge::KnowledgeEntry;
use helpdesk_core::trace::millis;

mod tickets;

pub use tickets::{Ticket, TicketDesk, TicketReceipt};

const MCP_PROTOCOL_VERSION: &str = "2024-11-05";
const MCP_SERVER_NAME: &str = "helpdesk-mcp";

pub const PERSONA_URI: &str = "config://persona";
pub const INTENTS_URI: &str = "config://intents";
pub const ACTIONS_URI: &str = "config://actions";
pub const KNOWLEDGE_SEARCH_PREFIX: &str = "knowledge://search/";
const KNOWLEDGE_SEARCH_TEMPLATE: &str = "knowledge://search/{query}";

/// URI of the knowledge search resource for `query`. An empty query lists
/// the whole collection.
pub fn knowledge_search_uri(query: &str) -> String {
    let encoded: String = url::form_urlencoded::byte_serialize(query.as_bytes()).collect();
    format!("{KNOWLEDGE_SEARCH_PREFIX}{encoded}")
}

fn decode_search_query(raw: &str) -> String {
    // Keep literal separators inside the single decoded key.
    let escaped = raw.replace('&', "%26").replace('=', "%3D");
    url::form_urlencoded::parse(escaped.as_bytes())
        .map(|(key, _)| key.into_owned())
        .next()
        .unwrap_or_default()
}

#[derive(Subcommand)]
pub enum McpCommands {
    /// Run the helpdesk MCP server over stdio
    Serve(McpServeArgs),
    /// Load the configuration and report what would be served
    Check(McpServeArgs),
}

#[derive(Args, Clone, Debug)]
pub struct McpServeArgs {
    /// Directory holding persona.yaml, intents.yaml and actions.yaml
    #[arg(long, env = "HELPDESK_CONFIG_DIR", default_value = "config")]
    pub config_dir: PathBuf,
    /// Directory holding knowledge.json
    #[arg(long, env = "HELPDESK_DATA_DIR", default_value = "data")]
    pub data_dir: PathBuf,
}

pub async fn run(command: McpCommands) -> i32 {
    match command {
        McpCommands::Serve(args) => {
            let state = match McpState::load(&args) {
                Ok(state) => state,
                Err(err) => return report_error("config_error", &err),
            };
            let mut server = McpServer::new(state);
            match server.serve_stdio().await {
                Ok(()) => 0,
                Err(err) => report_error("mcp_server_error", &err),
            }
        }
        McpCommands::Check(args) => match McpState::load(&args) {
            Ok(state) => {
                println!("{}", to_pretty_json(&state.summary()));
                0
            }
            Err(err) => report_error("config_error", &err),
        },
    }
}

fn report_error(code: &str, message: &str) -> i32 {
    let payload = json!({
        "error": code,
        "message": message,
    });
    eprintln!("{}", to_pretty_json(&payload));
    1
}

/// Everything a server instance reads from: the loaded configuration and the
/// ticket backend. Cheap to clone; shared across HTTP requests.
#[derive(Clone, Debug)]
pub struct McpState {
    pub store: Arc<ConfigStore>,
    pub tickets: Arc<TicketDesk>,
}

impl McpState {
    pub fn new(store: Arc<ConfigStore>) -> Self {
        Self {
            store,
            tickets: Arc::new(TicketDesk::new()),
        }
    }

    pub fn load(args: &McpServeArgs) -> Result<Self, String> {
        ConfigStore::load(&args.config_dir, &args.data_dir)
            .map(|store| Self::new(Arc::new(store)))
            .map_err(|e| e.to_string())
    }

    pub fn summary(&self) -> Value {
        json!({
            "server": MCP_SERVER_NAME,
            "version": env!("CARGO_PKG_VERSION"),
            "intents": self.store.intents.intents.len(),
            "rules": self.store.policy.rules().len(),
            "knowledge_entries": self.store.knowledge.len(),
            "search_mode": self.store.knowledge.mode().as_str(),
            "resources": resource_definitions().iter().map(|r| r.uri).collect::<Vec<_>>(),
            "tools": tool_definitions().iter().map(|t| t.name).collect::<Vec<_>>(),
        })
    }
}

/// Handle one HTTP-delivered JSON-RPC message (single or batch).
pub fn handle_http_jsonrpc(state: &McpState, incoming: Value) -> Vec<Value> {
    let server = McpServer::new(state.clone());
    server.handle_incoming_message(incoming)
}

struct McpServer {
    state: McpState,
    session_id: String,
}

impl McpServer {
    fn new(state: McpState) -> Self {
        Self {
            state,
            session_id: format!("mcp-{}", Uuid::now_v7()),
        }
    }

    async fn serve_stdio(&mut self) -> Result<(), String> {
        tracing::info!(
            event = "mcp_server_started",
            server = MCP_SERVER_NAME,
            version = env!("CARGO_PKG_VERSION"),
            session_id = %self.session_id,
            "MCP server listening on stdio"
        );

        let mut reader = BufReader::new(io::stdin());
        let mut stdout = io::stdout();
        self.serve(&mut reader, &mut stdout).await
    }

    /// Answer framed messages until EOF. A message that cannot be parsed gets
    /// a `-32700` response; only I/O failures end the loop early.
    async fn serve<R, W>(&mut self, reader: &mut R, writer: &mut W) -> Result<(), String>
    where
        R: AsyncBufRead + Unpin,
        W: AsyncWrite + Unpin,
    {
        loop {
            let frame = read_framed_json(reader)
                .await
                .map_err(|e| format!("Failed to read MCP message: {e}"))?;
            let Some((incoming, framing)) = frame else {
                break;
            };

            let responses = match incoming {
                Ok(incoming) => self.handle_incoming_message(incoming),
                Err(message) => {
                    tracing::warn!(
                        event = "mcp_parse_error",
                        error = %message,
                        "Malformed MCP message"
                    );
                    vec![error_response(Value::Null, RpcError::parse_error(message))]
                }
            };
            for response in responses {
                write_framed_json(writer, &response, framing)
                    .await
                    .map_err(|e| format!("Failed to write MCP response: {e}"))?;
            }
        }

        Ok(())
    }

    fn handle_incoming_message(&self, incoming: Value) -> Vec<Value> {
        let mut responses = Vec::new();

        if let Some(batch) = incoming.as_array() {
            if batch.is_empty() {
                responses.push(error_response(
                    Value::Null,
                    RpcError::invalid_request("Batch request must not be empty"),
                ));
                return responses;
            }
            for item in batch {
                if let Some(response) = self.handle_single_message(item.clone()) {
                    responses.push(response);
                }
            }
            return responses;
        }

        if let Some(response) = self.handle_single_message(incoming) {
            responses.push(response);
        }
        responses
    }

    fn handle_single_message(&self, incoming: Value) -> Option<Value> {
        let Some(obj) = incoming.as_object() else {
            return Some(error_response(
                Value::Null,
                RpcError::invalid_request("Request must be a JSON object"),
            ));
        };

        if obj.get("jsonrpc").and_then(Value::as_str) != Some("2.0") {
            let id = obj.get("id").cloned().unwrap_or(Value::Null);
            return Some(error_response(
                id,
                RpcError::invalid_request("jsonrpc must be '2.0'"),
            ));
        }

        let Some(method) = obj.get("method").and_then(Value::as_str) else {
            // A client response; this server never issues requests.
            return None;
        };

        let params = obj.get("params").cloned().unwrap_or(Value::Null);
        // Notifications carry no id and get no response.
        let id = obj.get("id").cloned()?;
        Some(match self.handle_request(method, params) {
            Ok(payload) => success_response(id, payload),
            Err(err) => error_response(id, err),
        })
    }

    fn handle_request(&self, method: &str, params: Value) -> Result<Value, RpcError> {
        match method {
            "initialize" => Ok(self.initialize_payload()),
            "ping" => Ok(json!({})),
            "tools/list" => Ok(tools_list_payload()),
            "tools/call" => self.handle_tools_call(params),
            "resources/list" => Ok(resources_list_payload()),
            "resources/templates/list" => Ok(resource_templates_payload()),
            "resources/read" => self.handle_resources_read(params),
            "prompts/list" => Ok(json!({ "prompts": [] })),
            _ => Err(RpcError::method_not_found(method)),
        }
    }

    fn initialize_payload(&self) -> Value {
        json!({
            "protocolVersion": MCP_PROTOCOL_VERSION,
            "capabilities": {
                "tools": { "listChanged": false },
                "resources": { "listChanged": false },
                "prompts": { "listChanged": false }
            },
            "serverInfo": {
                "name": MCP_SERVER_NAME,
                "version": env!("CARGO_PKG_VERSION")
            },
            "instructions": "Read config://persona, config://intents and config://actions once per session. \
                Search knowledge with knowledge://search/{query}. Call resolve_intent for every user turn. \
                Escalation is decided by the client from the actions document; call create_ticket only when a rule fires, passing the session_id."
        })
    }

    fn handle_tools_call(&self, params: Value) -> Result<Value, RpcError> {
        let params = params
            .as_object()
            .ok_or_else(|| RpcError::invalid_params("tools/call params must be an object"))?;

        let name = params
            .get("name")
            .and_then(Value::as_str)
            .ok_or_else(|| RpcError::invalid_params("tools/call requires string field 'name'"))?;

        let args = match params.get("arguments") {
            Some(Value::Object(map)) => map.clone(),
            Some(Value::Null) | None => Map::new(),
            Some(_) => {
                return Err(RpcError::invalid_params(
                    "tools/call 'arguments' must be an object",
                ));
            }
        };

        let result = match name {
            "resolve_intent" => self.tool_resolve_intent(&args),
            "create_ticket" => self.tool_create_ticket(&args),
            "update_record" => self.tool_update_record(&args),
            "send_notification" => self.tool_send_notification(&args),
            _ => return Err(RpcError::invalid_params(format!("Unknown tool '{name}'"))),
        };

        Ok(match result {
            Ok(envelope) => build_tool_call_response(envelope, false),
            Err(err) => {
                tracing::warn!(
                    event = "mcp_tool_error",
                    tool = name,
                    error = %err.code,
                    message = %err.message,
                    "MCP tool call failed"
                );
                build_tool_call_response(err.to_value(), true)
            }
        })
    }

    fn tool_resolve_intent(&self, args: &Map<String, Value>) -> Result<Value, ToolError> {
        let query = required_string(args, "user_query")?;
        let resolved = self.state.store.resolver.resolve(&query);
        serde_json::to_value(resolved)
            .map_err(|e| ToolError::new("internal_error", format!("Failed to encode intent: {e}")))
    }

    fn tool_create_ticket(&self, args: &Map<String, Value>) -> Result<Value, ToolError> {
        let issue = required_string(args, "issue")?;
        let session_id = arg_optional_string(args, "session_id")?;
        let intent = arg_optional_string(args, "intent")?;

        let receipt = self
            .state
            .tickets
            .open(&issue, session_id.as_deref(), intent.as_deref());
        let ticket = receipt.ticket();
        tracing::info!(
            event = "ticket_requested",
            status = receipt.status(),
            ticket_id = %ticket.ticket_id,
            session_id = ?ticket.session_id,
            "create_ticket handled"
        );

        let mut payload = json!({
            "status": receipt.status(),
            "ticket_id": ticket.ticket_id,
            "issue": ticket.issue,
            "created_at": ticket.created_at,
        });
        if let Some(sid) = &ticket.session_id {
            payload["session_id"] = Value::String(sid.clone());
        }
        if let Some(intent) = &ticket.intent {
            payload["intent"] = Value::String(intent.clone());
        }
        Ok(payload)
    }

    fn tool_update_record(&self, args: &Map<String, Value>) -> Result<Value, ToolError> {
        let record_id = required_string(args, "record_id")?;
        let fields = match args.get("fields") {
            Some(Value::Object(fields)) => Value::Object(fields.clone()),
            Some(_) => {
                return Err(
                    ToolError::new("validation_failed", "'fields' must be an object")
                        .with_field("fields"),
                );
            }
            None => {
                return Err(
                    ToolError::new("validation_failed", "Missing required field 'fields'")
                        .with_field("fields"),
                );
            }
        };
        Ok(json!({
            "status": "updated",
            "record_id": record_id,
            "fields": fields,
        }))
    }

    fn tool_send_notification(&self, args: &Map<String, Value>) -> Result<Value, ToolError> {
        let channel = required_string(args, "channel")?;
        let payload = required_string(args, "payload")?;
        Ok(json!({
            "status": "sent",
            "channel": channel,
            "payload": payload,
        }))
    }

    fn handle_resources_read(&self, params: Value) -> Result<Value, RpcError> {
        let params = params
            .as_object()
            .ok_or_else(|| RpcError::invalid_params("resources/read params must be an object"))?;
        let uri = params.get("uri").and_then(Value::as_str).ok_or_else(|| {
            RpcError::invalid_params("resources/read requires string field 'uri'")
        })?;

        let store = &self.state.store;
        let content_payload = match uri {
            PERSONA_URI => store.raw.persona.clone(),
            INTENTS_URI => store.raw.intents.clone(),
            ACTIONS_URI => store.raw.actions.clone(),
            _ => match uri.strip_prefix(KNOWLEDGE_SEARCH_PREFIX) {
                Some("") => self.all_knowledge_payload(),
                Some(raw_query) => self.search_payload(&decode_search_query(raw_query)),
                None => {
                    return Err(RpcError::invalid_params(format!(
                        "Unknown resource uri '{uri}'"
                    )));
                }
            },
        };

        Ok(json!({
            "contents": [{
                "uri": uri,
                "mimeType": "application/json",
                "text": to_pretty_json(&content_payload)
            }]
        }))
    }

    fn search_payload(&self, query: &str) -> Value {
        let start = Instant::now();
        let knowledge = &self.state.store.knowledge;
        let matches: Vec<Value> = knowledge.search(query).into_iter().map(entry_payload).collect();
        json!({
            "search_mode": knowledge.mode().as_str(),
            "query": query,
            "matches": matches,
            "response_time_ms": millis(start.elapsed()),
        })
    }

    fn all_knowledge_payload(&self) -> Value {
        let knowledge = &self.state.store.knowledge;
        let matches: Vec<Value> = knowledge.entries().map(entry_payload).collect();
        json!({
            "search_mode": knowledge.mode().as_str(),
            "matches": matches,
            "response_time_ms": 0,
        })
    }
}

fn entry_payload(entry: &KnowledgeEntry) -> Value {
    serde_json::to_value(entry).unwrap_or(Value::Null)
}

fn build_tool_call_response(envelope: Value, is_error: bool) -> Value {
    let text = to_pretty_json(&envelope);
    if is_error {
        json!({
            "isError": true,
            "content": [{ "type": "text", "text": text }],
            "structuredContent": envelope
        })
    } else {
        json!({
            "content": [{ "type": "text", "text": text }],
            "structuredContent": envelope
        })
    }
}

#[derive(Debug)]
struct RpcError {
    code: i64,
    message: String,
}

impl RpcError {
    fn parse_error(message: impl Into<String>) -> Self {
        Self {
            code: -32700,
            message: message.into(),
        }
    }

    fn invalid_request(message: impl Into<String>) -> Self {
        Self {
            code: -32600,
            message: message.into(),
        }
    }

    fn method_not_found(method: &str) -> Self {
        Self {
            code: -32601,
            message: format!("Method not found: {method}"),
        }
    }

    fn invalid_params(message: impl Into<String>) -> Self {
        Self {
            code: -32602,
            message: message.into(),
        }
    }
}

#[derive(Debug, Clone)]
struct ToolError {
    code: String,
    message: String,
    field: Option<String>,
}

impl ToolError {
    fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
            field: None,
        }
    }

    fn with_field(mut self, field: impl Into<String>) -> Self {
        self.field = Some(field.into());
        self
    }

    fn to_value(&self) -> Value {
        let mut payload = json!({
            "error": self.code,
            "message": self.message
        });
        if let Some(field) = &self.field {
            payload["field"] = Value::String(field.clone());
        }
        payload
    }
}

#[derive(Debug)]
struct ToolDefinition {
    name: &'static str,
    description: &'static str,
    input_schema: Value,
}

#[derive(Debug)]
struct ResourceDefinition {
    uri: &'static str,
    name: &'static str,
    description: &'static str,
}

fn tool_definitions() -> Vec<ToolDefinition> {
    vec![
        ToolDefinition {
            name: "resolve_intent",
            description: "Deterministic intent resolution: first configured intent whose trigger appears in the query, else the fallback intent.",
            input_schema: json!({
                "type": "object",
                "properties": {
                    "user_query": { "type": "string" }
                },
                "required": ["user_query"],
                "additionalProperties": false
            }),
        },
        ToolDefinition {
            name: "create_ticket",
            description: "Open a support ticket. At most one ticket per session_id; repeats return the existing ticket with status 'duplicate'.",
            input_schema: json!({
                "type": "object",
                "properties": {
                    "issue": { "type": "string" },
                    "session_id": { "type": "string" },
                    "intent": { "type": "string" }
                },
                "required": ["issue"],
                "additionalProperties": false
            }),
        },
        ToolDefinition {
            name: "update_record",
            description: "Update fields on a customer record.",
            input_schema: json!({
                "type": "object",
                "properties": {
                    "record_id": { "type": "string" },
                    "fields": { "type": "object" }
                },
                "required": ["record_id", "fields"],
                "additionalProperties": false
            }),
        },
        ToolDefinition {
            name: "send_notification",
            description: "Send a notification payload to a channel.",
            input_schema: json!({
                "type": "object",
                "properties": {
                    "channel": { "type": "string" },
                    "payload": { "type": "string" }
                },
                "required": ["channel", "payload"],
                "additionalProperties": false
            }),
        },
    ]
}

fn resource_definitions() -> Vec<ResourceDefinition> {
    vec![
        ResourceDefinition {
            uri: PERSONA_URI,
            name: "Persona",
            description: "Tone, verbosity, style and search behaviour",
        },
        ResourceDefinition {
            uri: INTENTS_URI,
            name: "Intent Taxonomy",
            description: "Intents with triggers and severity, plus resolution settings",
        },
        ResourceDefinition {
            uri: ACTIONS_URI,
            name: "Action Rules",
            description: "Escalation phrases and rule table",
        },
        ResourceDefinition {
            uri: KNOWLEDGE_SEARCH_PREFIX,
            name: "Knowledge Base",
            description: "Every knowledge entry in configuration order",
        },
    ]
}

fn tools_list_payload() -> Value {
    let tools: Vec<Value> = tool_definitions()
        .into_iter()
        .map(|tool| {
            json!({
                "name": tool.name,
                "description": tool.description,
                "inputSchema": tool.input_schema,
            })
        })
        .collect();
    json!({ "tools": tools })
}

fn resources_list_payload() -> Value {
    let resources: Vec<Value> = resource_definitions()
        .into_iter()
        .map(|res| {
            json!({
                "uri": res.uri,
                "name": res.name,
                "description": res.description,
                "mimeType": "application/json"
            })
        })
        .collect();
    json!({ "resources": resources })
}

fn resource_templates_payload() -> Value {
    json!({
        "resourceTemplates": [{
            "uriTemplate": KNOWLEDGE_SEARCH_TEMPLATE,
            "name": "Knowledge Search",
            "description": "Knowledge entries matching a percent-encoded query",
            "mimeType": "application/json"
        }]
    })
}

fn required_string(args: &Map<String, Value>, key: &str) -> Result<String, ToolError> {
    let value = args.get(key).ok_or_else(|| {
        ToolError::new(
            "validation_failed",
            format!("Missing required field '{key}'"),
        )
        .with_field(key)
    })?;
    match value {
        Value::String(v) if !v.trim().is_empty() => Ok(v.clone()),
        Value::String(_) => Err(ToolError::new(
            "validation_failed",
            format!("'{key}' must not be empty"),
        )
        .with_field(key)),
        _ => Err(
            ToolError::new("validation_failed", format!("'{key}' must be a string"))
                .with_field(key),
        ),
    }
}

fn arg_optional_string(args: &Map<String, Value>, key: &str) -> Result<Option<String>, ToolError> {
    match args.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(v)) if v.trim().is_empty() => Ok(None),
        Some(Value::String(v)) => Ok(Some(v.clone())),
        Some(_) => Err(
            ToolError::new("validation_failed", format!("'{key}' must be a string"))
                .with_field(key),
        ),
    }
}

fn success_response(id: Value, result: Value) -> Value {
    json!({
        "jsonrpc": "2.0",
        "id": id,
        "result": result
    })
}

fn error_response(id: Value, error: RpcError) -> Value {
    json!({
        "jsonrpc": "2.0",
        "id": id,
        "error": {
            "code": error.code,
            "message": error.message
        }
    })
}

/// How a stdio message was delimited; responses mirror it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Framing {
    ContentLength,
    NewlineDelimited,
}

/// Upper bound for one Content-Length framed message body.
pub const MAX_MESSAGE_BYTES: usize = 4 * 1024 * 1024;

/// One message and the framing it arrived in. The inner `Err` is a message
/// that could not be parsed; the reader is left at the start of the next one.
type Frame = (Result<Value, String>, Framing);

async fn read_framed_json<R>(reader: &mut R) -> Result<Option<Frame>, std::io::Error>
where
    R: AsyncBufRead + Unpin,
{
    let mut content_length: Option<usize> = None;

    loop {
        let mut line = String::new();
        let bytes_read = reader.read_line(&mut line).await?;
        if bytes_read == 0 {
            if content_length.is_none() {
                return Ok(None);
            }
            return Err(std::io::Error::new(
                std::io::ErrorKind::UnexpectedEof,
                "Unexpected EOF while reading MCP headers",
            ));
        }

        if line == "\r\n" || line == "\n" {
            if content_length.is_some() {
                break;
            }
            continue;
        }

        let line = line.trim_end_matches(['\r', '\n']);
        if content_length.is_none() && line.trim_start().starts_with(['{', '[']) {
            let parsed: Result<Value, String> =
                serde_json::from_str(line).map_err(|e| format!("Invalid JSON payload: {e}"));
            return Ok(Some((parsed, Framing::NewlineDelimited)));
        }

        if line.to_ascii_lowercase().starts_with("content-length:") {
            let raw_len = line
                .split_once(':')
                .map(|(_, right)| right.trim())
                .unwrap_or_default();
            match raw_len.parse::<usize>() {
                Ok(parsed) => content_length = Some(parsed),
                Err(_) => {
                    return Ok(Some((
                        Err(format!("Invalid Content-Length header: '{raw_len}'")),
                        Framing::ContentLength,
                    )));
                }
            }
        }
    }

    let Some(content_length) = content_length else {
        return Ok(Some((
            Err("Missing Content-Length header".to_string()),
            Framing::ContentLength,
        )));
    };

    if content_length > MAX_MESSAGE_BYTES {
        // Skip the body without buffering it so the next message lines up.
        let mut body = (&mut *reader).take(content_length as u64);
        io::copy(&mut body, &mut io::sink()).await?;
        return Ok(Some((
            Err(format!(
                "Message of {content_length} bytes exceeds the {MAX_MESSAGE_BYTES} byte limit"
            )),
            Framing::ContentLength,
        )));
    }

    let mut payload = vec![0_u8; content_length];
    reader.read_exact(&mut payload).await?;

    let parsed: Result<Value, String> =
        serde_json::from_slice(&payload).map_err(|e| format!("Invalid JSON payload: {e}"));
    Ok(Some((parsed, Framing::ContentLength)))
}

async fn write_framed_json<W>(
    writer: &mut W,
    value: &Value,
    framing: Framing,
) -> Result<(), std::io::Error>
where
    W: AsyncWrite + Unpin,
{
    let body = serde_json::to_vec(value).map_err(|e| {
        std::io::Error::new(
            std::io::ErrorKind::InvalidData,
            format!("Failed to serialize JSON: {e}"),
        )
    })?;
    match framing {
        Framing::ContentLength => {
            let header = format!(
                "Content-Length: {}\r\nContent-Type: application/json\r\n\r\n",
                body.len()
            );
            writer.write_all(header.as_bytes()).await?;
            writer.write_all(&body).await?;
        }
        Framing::NewlineDelimited => {
            writer.write_all(&body).await?;
            writer.write_all(b"\n").await?;
        }
    }
    writer.flush().await?;
    Ok(())
}

fn to_pretty_json(value: &Value) -> String {
    serde_json::to_string_pretty(value).unwrap_or_else(|_| "{}".to_string())
}
