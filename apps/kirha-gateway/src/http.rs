//! Streamable HTTP entry points.
//!
//! Thin adapters between axum and the session manager: extract the session
//! id and credential headers, parse the body, and translate outcomes into
//! HTTP responses. Session errors become `400` with a JSON-RPC error
//! envelope; internal faults become `500`; everything else is the session's
//! own response.

use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context as _;
use axum::body::Body;
use axum::extract::State;
use axum::http::{HeaderMap, HeaderValue, StatusCode};
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use kirha_mcp::{JsonRpcMessage, JsonRpcResponse, RequestContext};
use serde_json::Value;
use tokio_stream::StreamExt as _;
use tokio_stream::wrappers::ReceiverStream;
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::session::{PostOutcome, SessionError, SessionManager};

#[derive(Clone)]
struct HttpState {
    manager: Arc<SessionManager>,
}

pub fn router(manager: Arc<SessionManager>) -> Router {
    Router::new()
        .route("/mcp", post(post_mcp).get(get_mcp).delete(delete_mcp))
        .route("/health", get(health))
        .layer(TraceLayer::new_for_http())
        .with_state(HttpState { manager })
}

pub async fn serve(addr: SocketAddr, manager: Arc<SessionManager>) -> anyhow::Result<()> {
    let app = router(manager);

    info!(addr = %addr, "starting MCP HTTP server");
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("bind {addr}"))?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    Ok(())
}

async fn shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
    info!("received shutdown signal");
}

async fn health() -> Json<Value> {
    Json(serde_json::json!({ "status": "ok" }))
}

async fn post_mcp(State(st): State<HttpState>, headers: HeaderMap, body: String) -> Response {
    let ctx = request_context(&headers);
    let session_id = header_str(&headers, "mcp-session-id");

    let val: Value = match serde_json::from_str(&body) {
        Ok(v) => v,
        Err(_) => return error_response(StatusCode::BAD_REQUEST, -32700, "parse error"),
    };

    if val.is_array() {
        return error_response(StatusCode::BAD_REQUEST, -32600, "batching not supported");
    }

    let msg: JsonRpcMessage = match serde_json::from_value(val) {
        Ok(m) => m,
        Err(_) => return error_response(StatusCode::BAD_REQUEST, -32600, "invalid request"),
    };

    match st.manager.handle_post(session_id, &ctx, msg).await {
        Ok(PostOutcome::Response {
            response,
            new_session,
        }) => jsonrpc_http_response(response, new_session.as_deref().or(session_id)),
        Ok(PostOutcome::Accepted) => StatusCode::ACCEPTED.into_response(),
        Err(e @ SessionError::InvalidSession) => {
            error_response(StatusCode::BAD_REQUEST, -32000, &e.to_string())
        }
        Err(SessionError::StreamingUnsupported) => {
            error_response(StatusCode::INTERNAL_SERVER_ERROR, -32603, "internal error")
        }
    }
}

/// Resume (or open) the event stream for an existing session. No body parse
/// is attempted: a missing or unknown session id fails immediately.
async fn get_mcp(State(st): State<HttpState>, headers: HeaderMap) -> Response {
    let session_id = header_str(&headers, "mcp-session-id");
    let last_event_id =
        header_str(&headers, "last-event-id").and_then(|s| s.trim().parse::<u64>().ok());

    match st.manager.handle_resume(session_id, last_event_id).await {
        Ok(stream) => {
            let events = tokio_stream::iter(stream.replayed)
                .chain(ReceiverStream::new(stream.live))
                .map(|ev| {
                    Ok::<_, Infallible>(Event::default().id(ev.id.to_string()).data(ev.data))
                });
            Sse::new(events)
                .keep_alive(KeepAlive::default())
                .into_response()
        }
        Err(e @ SessionError::InvalidSession) => {
            error_response(StatusCode::BAD_REQUEST, -32000, &e.to_string())
        }
        Err(e @ SessionError::StreamingUnsupported) => {
            (StatusCode::METHOD_NOT_ALLOWED, e.to_string()).into_response()
        }
    }
}

/// Explicit session termination. Idempotent: deleting an unknown session is
/// still a 202.
async fn delete_mcp(State(st): State<HttpState>, headers: HeaderMap) -> Response {
    let Some(sid) = header_str(&headers, "mcp-session-id") else {
        return error_response(StatusCode::BAD_REQUEST, -32000, "missing mcp-session-id");
    };
    st.manager.teardown(sid).await;
    StatusCode::ACCEPTED.into_response()
}

fn request_context(headers: &HeaderMap) -> RequestContext {
    RequestContext {
        api_key_override: header_str(headers, "x-kirha-api-key").map(str::to_string),
    }
}

fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers.get(name).and_then(|h| h.to_str().ok())
}

fn error_response(status: StatusCode, code: i64, message: &str) -> Response {
    let body = serde_json::json!({
        "jsonrpc": "2.0",
        "error": { "code": code, "message": message },
        "id": null,
    });
    (status, Json(body)).into_response()
}

fn jsonrpc_http_response(resp: JsonRpcResponse, session_id: Option<&str>) -> Response {
    let Ok(body) = serde_json::to_string(&resp) else {
        return error_response(StatusCode::INTERNAL_SERVER_ERROR, -32603, "internal error");
    };

    let mut builder = Response::builder()
        .status(StatusCode::OK)
        .header("content-type", "application/json");

    if let Some(sid) = session_id
        && let Ok(v) = HeaderValue::from_str(sid)
    {
        builder = builder.header("mcp-session-id", v);
    }

    builder
        .body(Body::from(body))
        .unwrap_or_else(|_| StatusCode::INTERNAL_SERVER_ERROR.into_response())
}
