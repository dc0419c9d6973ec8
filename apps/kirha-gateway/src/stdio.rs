//! Stdio transport: one process, one implicit session.
//!
//! Messages are newline-delimited JSON-RPC on stdin/stdout. Logs go to
//! stderr so the protocol channel stays clean.

use std::sync::Arc;

use kirha_mcp::{
    JsonRpcError, JsonRpcId, JsonRpcMessage, JsonRpcResponse, McpConnection, McpHandler,
    McpServerConfig, RequestContext,
};
use serde_json::Value;
use tokio::io::{AsyncBufReadExt as _, AsyncWriteExt as _, BufReader};

pub async fn run(cfg: McpServerConfig, handler: Arc<dyn McpHandler>) -> anyhow::Result<()> {
    let mut conn = McpConnection::new(cfg, handler);
    // Stdio has no per-request headers; the configured credential applies.
    let ctx = RequestContext::default();

    let stdin = tokio::io::stdin();
    let mut lines = BufReader::new(stdin).lines();
    let mut stdout = tokio::io::stdout();

    while let Some(line) = lines.next_line().await? {
        if line.trim().is_empty() {
            continue;
        }

        let val: Value = match serde_json::from_str(&line) {
            Ok(v) => v,
            Err(e) => {
                let resp = JsonRpcResponse::err(
                    JsonRpcId::Null,
                    JsonRpcError {
                        code: -32700,
                        message: "parse error".to_string(),
                        data: Some(serde_json::json!({ "detail": e.to_string() })),
                    },
                );
                write_jsonrpc(&mut stdout, &resp).await?;
                continue;
            }
        };

        if val.is_array() {
            let resp = JsonRpcResponse::err(
                JsonRpcId::Null,
                JsonRpcError {
                    code: -32600,
                    message: "batching not supported".to_string(),
                    data: None,
                },
            );
            write_jsonrpc(&mut stdout, &resp).await?;
            continue;
        }

        let msg: JsonRpcMessage = match serde_json::from_value(val) {
            Ok(m) => m,
            Err(e) => {
                let resp = JsonRpcResponse::err(
                    JsonRpcId::Null,
                    JsonRpcError {
                        code: -32600,
                        message: "invalid request".to_string(),
                        data: Some(serde_json::json!({ "detail": e.to_string() })),
                    },
                );
                write_jsonrpc(&mut stdout, &resp).await?;
                continue;
            }
        };

        if let Some(resp) = conn.handle_message(&ctx, msg).await {
            write_jsonrpc(&mut stdout, &resp).await?;
        }
    }

    Ok(())
}

async fn write_jsonrpc(
    stdout: &mut tokio::io::Stdout,
    resp: &JsonRpcResponse,
) -> anyhow::Result<()> {
    let out = serde_json::to_string(resp)?;
    stdout.write_all(out.as_bytes()).await?;
    stdout.write_all(b"\n").await?;
    stdout.flush().await?;
    Ok(())
}
