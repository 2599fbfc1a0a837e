use axum::body::Bytes;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::post;
use axum::{Json, Router};
use serde_json::{Value, json};

use crate::state::AppState;

const MCP_PATH: &str = "/mcp";

pub fn router() -> Router<AppState> {
    Router::new().route(MCP_PATH, post(mcp_post).get(mcp_get))
}

async fn mcp_get() -> Response {
    StatusCode::METHOD_NOT_ALLOWED.into_response()
}

async fn mcp_post(State(state): State<AppState>, body: Bytes) -> Response {
    let incoming: Value = match serde_json::from_slice(&body) {
        Ok(payload) => payload,
        Err(_) => {
            return (
                StatusCode::OK,
                Json(json!({
                    "jsonrpc": "2.0",
                    "id": null,
                    "error": {
                        "code": -32700,
                        "message": "Parse error"
                    }
                })),
            )
                .into_response();
        }
    };

    let responses = helpdesk_mcp_runtime::handle_http_jsonrpc(&state.mcp, incoming);

    if responses.is_empty() {
        return StatusCode::ACCEPTED.into_response();
    }

    if responses.len() == 1 {
        return (
            StatusCode::OK,
            Json(responses.into_iter().next().unwrap_or(Value::Null)),
        )
            .into_response();
    }

    (StatusCode::OK, Json(Value::Array(responses))).into_response()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::test_support::test_state;
    use axum::body::Body;
    use axum::http::Request;
    use tower::ServiceExt;

    async fn post_body(body: &str) -> (StatusCode, Option<Value>) {
        let response = router()
            .with_state(test_state())
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri(MCP_PATH)
                    .header("content-type", "application/json")
                    .body(Body::from(body.to_string()))
                    .expect("request should build"),
            )
            .await
            .expect("request should succeed");
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("body should read");
        (status, serde_json::from_slice(&bytes).ok())
    }

    #[tokio::test]
    async fn serves_json_rpc_requests() {
        let (status, body) = post_body(
            r#"{"jsonrpc":"2.0","id":1,"method":"tools/call","params":{"name":"resolve_intent","arguments":{"user_query":"refund me"}}}"#,
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        let body = body.expect("JSON body");
        assert_eq!(body["result"]["structuredContent"]["intent"], "billing");
    }

    #[tokio::test]
    async fn invalid_json_is_parse_error() {
        let (status, body) = post_body("{not json").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body.expect("JSON body")["error"]["code"], -32700);
    }

    #[tokio::test]
    async fn notifications_are_accepted_without_body() {
        let (status, body) =
            post_body(r#"{"jsonrpc":"2.0","method":"notifications/initialized"}"#).await;
        assert_eq!(status, StatusCode::ACCEPTED);
        assert!(body.is_none());
    }

    #[tokio::test]
    async fn batches_return_arrays() {
        let (_, body) = post_body(
            r#"[{"jsonrpc":"2.0","id":1,"method":"ping"},{"jsonrpc":"2.0","id":2,"method":"resources/list"}]"#,
        )
        .await;
        assert_eq!(body.expect("JSON body").as_array().map(Vec::len), Some(2));
    }
}
