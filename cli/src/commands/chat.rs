use std::sync::Arc;

use clap::Args;
use tokio::io::{self, AsyncBufReadExt, AsyncWriteExt, BufReader};

use helpdesk_agent::dispatch::McpActionDispatcher;
use helpdesk_agent::pipeline::{ChatReply, Pipeline, PipelineError};
use helpdesk_agent::settings::AgentSettings;

use crate::util::{exit_error, mcp_client, pretty, print_json};

const MCP_HINT: &str = "Is the helpdesk API running? Check HELPDESK_MCP_URL.";

#[derive(Args, Clone, Debug)]
pub struct AskArgs {
    /// The question to ask
    pub query: String,

    /// Session to attribute the question to (new session when omitted)
    #[arg(long)]
    pub session_id: Option<String>,

    #[command(flatten)]
    pub agent: AgentSettings,
}

#[derive(Args, Clone, Debug)]
pub struct ChatArgs {
    /// Session id for the conversation (new session when omitted)
    #[arg(long)]
    pub session_id: Option<String>,

    /// Print each request trace to stderr
    #[arg(long)]
    pub show_trace: bool,

    #[command(flatten)]
    pub agent: AgentSettings,
}

/// Pipeline whose configuration is read from the MCP server and whose
/// actions are dispatched back to it.
async fn connect(mcp_url: &str, settings: &AgentSettings) -> Pipeline {
    let client = Arc::new(mcp_client(mcp_url));
    if let Err(err) = client.initialize().await {
        exit_error(
            &format!("MCP handshake with {} failed: {err}", client.endpoint()),
            Some(MCP_HINT),
        );
    }
    let store = match client.load_config().await {
        Ok(store) => Arc::new(store),
        Err(err) => exit_error(
            &format!("Failed to load configuration over MCP: {err}"),
            Some(MCP_HINT),
        ),
    };
    settings.build_pipeline(store, Arc::new(McpActionDispatcher::new(client)))
}

pub async fn ask(mcp_url: &str, args: AskArgs) -> i32 {
    let pipeline = connect(mcp_url, &args.agent).await;
    match pipeline.handle(args.session_id.as_deref(), &args.query).await {
        Ok(reply) => {
            print_json(&reply);
            0
        }
        Err(err) => exit_error(&err.to_string(), None),
    }
}

#[derive(Debug, PartialEq, Eq)]
enum Line<'a> {
    Quit,
    Empty,
    Query(&'a str),
}

fn classify(line: &str) -> Line<'_> {
    let line = line.trim();
    match line {
        "" => Line::Empty,
        "exit" | "quit" => Line::Quit,
        _ => Line::Query(line),
    }
}

/// Message shown when a reply ends the conversation.
fn closing_notice(reply: &ChatReply) -> Option<String> {
    let cause = reply.escalation?;
    let ticket = match &reply.ticket_id {
        Some(id) => format!("ticket {id}"),
        None => "no ticket could be opened".to_string(),
    };
    Some(format!(
        "Escalated to a human agent ({}), {ticket}. This session is closed.",
        cause.as_str()
    ))
}

pub async fn chat(mcp_url: &str, args: ChatArgs) -> i32 {
    let pipeline = connect(mcp_url, &args.agent).await;
    let mut session_id = args.session_id;
    let mut lines = BufReader::new(io::stdin()).lines();
    let mut stdout = io::stdout();

    loop {
        let _ = stdout.write_all(b"> ").await;
        let _ = stdout.flush().await;

        let line = match lines.next_line().await {
            Ok(Some(line)) => line,
            Ok(None) => return 0,
            Err(e) => exit_error(&format!("Failed to read stdin: {e}"), None),
        };

        let query = match classify(&line) {
            Line::Quit => return 0,
            Line::Empty => {
                eprintln!("Empty query.");
                continue;
            }
            Line::Query(query) => query,
        };

        let reply = match pipeline.handle(session_id.as_deref(), query).await {
            Ok(reply) => reply,
            Err(PipelineError::SessionClosed(closed)) => {
                exit_error(&closed.to_string(), Some("Start a new session."))
            }
            Err(err) => {
                eprintln!("{err}");
                continue;
            }
        };

        println!("{}", reply.reply);
        if args.show_trace {
            eprintln!("{}", pretty(&reply.trace));
        }
        if let Some(notice) = closing_notice(&reply) {
            println!("{notice}");
            return 0;
        }
        session_id = Some(reply.session_id);
    }
}
