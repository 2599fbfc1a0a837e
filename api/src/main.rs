use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use axum::Router;
use clap::Parser;
use serde::Serialize;
use tower::ServiceBuilder;
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use helpdesk_agent::dispatch::LocalActionDispatcher;
use helpdesk_agent::settings::AgentSettings;
use helpdesk_core::config::ConfigStore;
use helpdesk_mcp_runtime::McpState;

mod error;
mod extract;
mod routes;
mod state;

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Helpdesk API",
        version = "0.1.0",
        description = "Knowledge-powered Q&A with deterministic escalation. Configuration and actions are also served over MCP at /mcp."
    ),
    paths(
        routes::health::health_check,
        routes::chat::chat,
        routes::chat::close_session,
    ),
    components(schemas(
        HealthResponse,
        routes::chat::ChatRequest,
        routes::chat::SessionClosedResponse,
        helpdesk_agent::pipeline::ChatReply,
        helpdesk_core::error::ApiError,
        helpdesk_core::intent::ResolvedIntent,
        helpdesk_core::intent::Severity,
        helpdesk_core::intent::ConfidenceTier,
        helpdesk_core::escalation::ActionKind,
        helpdesk_core::escalation::EscalationCause,
        helpdesk_core::trace::Trace,
        helpdesk_core::trace::StageLatencies,
        helpdesk_core::trace::ActionOutcome,
        helpdesk_core::trace::GenerationOutcome,
    ))
)]
struct ApiDoc;

#[derive(Serialize, utoipa::ToSchema)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub intents: usize,
    pub knowledge_entries: usize,
    pub open_sessions: usize,
}

#[derive(Parser)]
#[command(name = "helpdesk-api", version, about = "Helpdesk HTTP server")]
struct ServerArgs {
    /// Directory holding persona.yaml, intents.yaml and actions.yaml
    #[arg(long, env = "HELPDESK_CONFIG_DIR", default_value = "config")]
    config_dir: PathBuf,
    /// Directory holding knowledge.json
    #[arg(long, env = "HELPDESK_DATA_DIR", default_value = "data")]
    data_dir: PathBuf,
    /// Listen port
    #[arg(long, env = "PORT", default_value_t = 3000)]
    port: u16,
    #[command(flatten)]
    agent: AgentSettings,
}

fn build_router(app_state: state::AppState) -> Router {
    Router::new()
        .merge(SwaggerUi::new("/swagger-ui").url("/api-doc/openapi.json", ApiDoc::openapi()))
        .merge(routes::health::router())
        .merge(routes::mcp_http::router())
        .merge(routes::chat::router())
        .layer(ServiceBuilder::new().layer(TraceLayer::new_for_http()))
        .with_state(app_state)
}

#[tokio::main]
async fn main() {
    // Load .env if present (dev only)
    let _ = dotenvy::dotenv();

    // Structured JSON logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "helpdesk_api=debug,helpdesk_agent=info,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer().json())
        .init();

    let args = ServerArgs::parse();

    // Configuration errors are fatal: there is no partial configuration.
    let store = match ConfigStore::load(&args.config_dir, &args.data_dir) {
        Ok(store) => Arc::new(store),
        Err(err) => {
            tracing::error!(event = "config_load_failed", error = %err, "Failed to load configuration");
            std::process::exit(1);
        }
    };
    tracing::info!(
        event = "config_loaded",
        intents = store.intents.intents.len(),
        rules = store.policy.rules().len(),
        knowledge_entries = store.knowledge.len(),
        search_mode = store.knowledge.mode().as_str(),
        "Configuration loaded"
    );

    let mcp = McpState::new(store.clone());
    let dispatcher = Arc::new(LocalActionDispatcher::new(mcp.tickets.clone()));
    let pipeline = args.agent.build_pipeline(store, dispatcher);
    let app_state = state::AppState {
        mcp,
        pipeline: Arc::new(pipeline),
    };

    let app = build_router(app_state);

    let addr = SocketAddr::from(([0, 0, 0, 0], args.port));
    tracing::info!("Helpdesk API listening on {}", addr);

    let listener = match tokio::net::TcpListener::bind(addr).await {
        Ok(listener) => listener,
        Err(err) => {
            tracing::error!(event = "bind_failed", %addr, error = %err, "Failed to bind listener");
            std::process::exit(1);
        }
    };
    if let Err(err) = axum::serve(listener, app).await {
        tracing::error!(event = "server_error", error = %err, "Server exited with error");
        std::process::exit(1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use tower::ServiceExt;

    #[tokio::test]
    async fn openapi_document_lists_chat_routes() {
        let app = build_router(state::test_support::test_state());
        let response = app
            .oneshot(
                Request::builder()
                    .uri("/api-doc/openapi.json")
                    .body(Body::empty())
                    .expect("request should build"),
            )
            .await
            .expect("request should succeed");
        assert_eq!(response.status(), StatusCode::OK);

        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("body should read");
        let doc: serde_json::Value = serde_json::from_slice(&bytes).expect("body should be JSON");
        assert!(doc["paths"]["/v1/chat"]["post"].is_object());
        assert!(doc["paths"]["/v1/sessions/{session_id}"]["delete"].is_object());
    }
}
