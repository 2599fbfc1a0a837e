use axum::extract::{Path, State};
use axum::routing::{delete, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use helpdesk_agent::pipeline::ChatReply;

use crate::error::AppError;
use crate::extract::AppJson;
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/v1/chat", post(chat))
        .route("/v1/sessions/{session_id}", delete(close_session))
}

#[derive(Debug, Deserialize, ToSchema)]
#[serde(deny_unknown_fields)]
pub struct ChatRequest {
    /// Conversation to continue. A new session is opened when omitted.
    #[serde(default)]
    pub session_id: Option<String>,
    pub query: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct SessionClosedResponse {
    pub session_id: String,
    /// `false` when the session had already been closed.
    pub closed: bool,
}

/// Handle one user message
///
/// Resolves the intent, applies the escalation rules, phrases a reply and,
/// when a rule fires, opens a ticket and closes the session.
#[utoipa::path(
    post,
    path = "/v1/chat",
    request_body = ChatRequest,
    responses(
        (status = 200, description = "Reply with decision trace", body = ChatReply),
        (status = 400, description = "Empty or malformed query", body = helpdesk_core::error::ApiError),
        (status = 409, description = "Session is closed", body = helpdesk_core::error::ApiError)
    ),
    tag = "chat"
)]
pub async fn chat(
    State(state): State<AppState>,
    AppJson(req): AppJson<ChatRequest>,
) -> Result<Json<ChatReply>, AppError> {
    let reply = state
        .pipeline
        .handle(req.session_id.as_deref(), &req.query)
        .await?;
    Ok(Json(reply))
}

/// Close a session explicitly
#[utoipa::path(
    delete,
    path = "/v1/sessions/{session_id}",
    params(("session_id" = String, Path, description = "Session to close")),
    responses(
        (status = 200, description = "Session closed", body = SessionClosedResponse)
    ),
    tag = "chat"
)]
pub async fn close_session(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
) -> Json<SessionClosedResponse> {
    let closed = state.pipeline.close_session(&session_id);
    Json(SessionClosedResponse { session_id, closed })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::test_support::test_state;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use serde_json::Value;
    use tower::ServiceExt;

    async fn send(app: Router, method: &str, uri: &str, body: Option<&str>) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        if body.is_some() {
            builder = builder.header("content-type", "application/json");
        }
        let request = builder
            .body(body.map(|b| Body::from(b.to_string())).unwrap_or_else(Body::empty))
            .expect("request should build");
        let response = app.oneshot(request).await.expect("request should succeed");
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("body should read");
        (status, serde_json::from_slice(&bytes).expect("body should be JSON"))
    }

    #[tokio::test]
    async fn chat_replies_with_fallback_text_when_generation_is_unconfigured() {
        let app = router().with_state(test_state());
        let (status, body) = send(
            app,
            "POST",
            "/v1/chat",
            Some(r#"{"session_id":"s-1","query":"how do I track my parcel"}"#),
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["reply"], "Please hold on.");
        assert_eq!(body["intent"]["intent"], "shipping");
        assert_eq!(body["session_closed"], false);
        assert_eq!(body["trace"]["generation"]["status"], "fallback");
    }

    #[tokio::test]
    async fn escalation_opens_ticket_and_closes_session() {
        let state = test_state();
        let app = router().with_state(state.clone());

        let (status, body) = send(
            app.clone(),
            "POST",
            "/v1/chat",
            Some(r#"{"session_id":"s-9","query":"where is my refund"}"#),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["escalation"], "high_severity");
        assert_eq!(body["session_closed"], true);
        let ticket_id = body["ticket_id"].as_str().expect("ticket id");
        assert!(state.mcp.tickets.find(ticket_id).is_some());

        let (status, body) = send(
            app,
            "POST",
            "/v1/chat",
            Some(r#"{"session_id":"s-9","query":"hello?"}"#),
        )
        .await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(body["error"], "session_closed");
        assert_eq!(state.mcp.tickets.len(), 1);
    }

    #[tokio::test]
    async fn empty_query_is_validation_error() {
        let app = router().with_state(test_state());
        let (status, body) = send(app, "POST", "/v1/chat", Some(r#"{"query":"  "}"#)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "validation_failed");
        assert_eq!(body["field"], "query");
    }

    #[tokio::test]
    async fn malformed_body_is_validation_error() {
        let app = router().with_state(test_state());
        let (status, body) = send(app, "POST", "/v1/chat", Some(r#"{"session_id":"s-1"}"#)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["field"], "query");
    }

    #[tokio::test]
    async fn delete_closes_session() {
        let app = router().with_state(test_state());
        let (status, body) = send(app.clone(), "DELETE", "/v1/sessions/s-2", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["closed"], true);

        let (_, body) = send(app.clone(), "DELETE", "/v1/sessions/s-2", None).await;
        assert_eq!(body["closed"], false);

        let (status, _) = send(
            app,
            "POST",
            "/v1/chat",
            Some(r#"{"session_id":"s-2","query":"track it"}"#),
        )
        .await;
        assert_eq!(status, StatusCode::CONFLICT);
    }
}
