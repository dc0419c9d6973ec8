//! Model Context Protocol (MCP) primitives used by this repo.
//!
//! This crate is intentionally scoped to the parts the gateway needs:
//! - `apps/kirha-gateway` (MCP server surface over stdio and streamable HTTP)
//!
//! The implementation targets the MCP spec transports and lifecycle behaviors
//! (stdio + streamable HTTP with resumable event streams).

mod jsonrpc;
mod server;
mod sse;
mod types;

pub use jsonrpc::{
    JsonRpcError, JsonRpcId, JsonRpcMessage, JsonRpcNotification, JsonRpcRequest, JsonRpcResponse,
};
pub use server::{McpConnection, McpHandler, McpServerConfig, RequestContext, is_initialize_request};
pub use sse::decode_sse_events;
pub use types::{
    CallToolParams, CallToolResult, ContentBlock, InitializeParams, InitializeResult,
    ListToolsParams, ListToolsResult, McpClientInfo, McpServerInfo, Tool,
};

/// Latest protocol version supported by this implementation.
pub const PROTOCOL_VERSION_LATEST: &str = "2025-11-25";

/// Older protocol version still commonly used by clients.
pub const PROTOCOL_VERSION_2025_06_18: &str = "2025-06-18";
