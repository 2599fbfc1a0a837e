mod commands;
mod util;

use clap::{Parser, Subcommand};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

use helpdesk_mcp_runtime::McpCommands;

#[derive(Parser)]
#[command(
    name = "helpdesk",
    version,
    about = "Helpdesk CLI: knowledge-powered answers with deterministic escalation"
)]
struct Cli {
    /// API base URL
    #[arg(long, env = "HELPDESK_API_URL", default_value = "http://localhost:3000", global = true)]
    api_url: String,

    /// MCP endpoint serving configuration, knowledge and action tools
    #[arg(long, env = "HELPDESK_MCP_URL", default_value = "http://localhost:3000/mcp", global = true)]
    mcp_url: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Check API health
    Health,
    /// Ask a single question and print the reply with its trace
    Ask(commands::chat::AskArgs),
    /// Interactive conversation on stdin until escalation or `exit`
    Chat(commands::chat::ChatArgs),
    /// Replay evaluation cases against the MCP server
    Eval(commands::eval::EvalArgs),
    /// Model Context Protocol server
    Mcp {
        #[command(subcommand)]
        command: McpCommands,
    },
}

#[tokio::main]
async fn main() {
    let _ = dotenvy::dotenv();

    // stdout is reserved for command output and the stdio protocol.
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| "warn".into()))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();

    let code = match cli.command {
        Commands::Health => commands::health::run(&cli.api_url).await,
        Commands::Ask(args) => commands::chat::ask(&cli.mcp_url, args).await,
        Commands::Chat(args) => commands::chat::chat(&cli.mcp_url, args).await,
        Commands::Eval(args) => commands::eval::run(&cli.mcp_url, args).await,
        Commands::Mcp { command } => helpdesk_mcp_runtime::run(command).await,
    };

    std::process::exit(code);
}
