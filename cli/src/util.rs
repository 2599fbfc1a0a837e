use serde::Serialize;
use serde_json::{Value, json};
use url::Url;

use helpdesk_agent::mcp_client::McpHttpClient;

pub fn client() -> reqwest::Client {
    reqwest::Client::new()
}

pub fn exit_error(message: &str, docs_hint: Option<&str>) -> ! {
    let mut err = json!({
        "error": "cli_error",
        "message": message
    });
    if let Some(hint) = docs_hint {
        err["docs_hint"] = json!(hint);
    }
    eprintln!("{}", pretty(&err));
    std::process::exit(1);
}

pub fn pretty<T: Serialize>(value: &T) -> String {
    serde_json::to_string_pretty(value).unwrap_or_else(|e| format!("{{\"error\":\"{e}\"}}"))
}

pub fn print_json<T: Serialize>(value: &T) {
    println!("{}", pretty(value));
}

/// MCP client for `mcp_url`; exits on an unparseable URL.
pub fn mcp_client(mcp_url: &str) -> McpHttpClient {
    match Url::parse(mcp_url) {
        Ok(url) => McpHttpClient::new(url),
        Err(e) => exit_error(
            &format!("Invalid MCP URL '{mcp_url}': {e}"),
            Some("Set --mcp-url or HELPDESK_MCP_URL, e.g. http://localhost:3000/mcp"),
        ),
    }
}

/// GET `{api_url}{path}` and print the JSON body.
///
/// Exit codes: 0 for 2xx, 1 for 4xx, 2 for 5xx, 3 for connection errors,
/// 4 for an invalid URL.
pub async fn api_get(api_url: &str, path: &str) -> i32 {
    let url = match Url::parse(&format!("{api_url}{path}")) {
        Ok(u) => u,
        Err(e) => {
            eprintln!(
                "{}",
                pretty(&json!({
                    "error": "cli_error",
                    "message": format!("Invalid URL: {api_url}{path}: {e}")
                }))
            );
            return 4;
        }
    };

    let resp = match client().get(url).send().await {
        Ok(r) => r,
        Err(e) => {
            eprintln!(
                "{}",
                pretty(&json!({
                    "error": "connection_error",
                    "message": format!("{e}"),
                    "docs_hint": "Is the API server running? Check HELPDESK_API_URL."
                }))
            );
            return 3;
        }
    };

    let status = resp.status().as_u16();
    let exit_code = match status {
        200..=299 => 0,
        400..=499 => 1,
        _ => 2,
    };
    let body: Value = resp
        .json()
        .await
        .unwrap_or_else(|_| json!({ "status": status }));
    if exit_code == 0 {
        print_json(&body);
    } else {
        eprintln!("{}", pretty(&body));
    }
    exit_code
}
