//! Tool registry and the MCP handler backed by the Kirha API.
//!
//! Handlers never let an upstream failure escape as a protocol error: every
//! failure (missing credential, schema mismatch, non-2xx status, network
//! fault) is converted into a well-formed tool result whose text payload
//! describes the error.

use std::sync::Arc;

use async_trait::async_trait;
use jsonschema::Validator;
use kirha_api::{
    CreatePlanRequest, KirhaApiError, KirhaClient, RunPlanRequest, SearchRequest,
    SummarizationOptions,
};
use kirha_mcp::{
    CallToolParams, CallToolResult, ListToolsParams, ListToolsResult, McpHandler, RequestContext,
    Tool,
};
use tracing::{info, warn};

use crate::config::{Settings, ToolEntry, ToolName};

fn input_schema(name: ToolName) -> serde_json::Value {
    match name {
        ToolName::Search | ToolName::CreatePlan => serde_json::json!({
            "type": "object",
            "properties": {
                "query": {
                    "type": "string",
                    "minLength": 1,
                    "description": "Natural-language search query"
                }
            },
            "required": ["query"],
            "additionalProperties": false
        }),
        ToolName::RunPlan => serde_json::json!({
            "type": "object",
            "properties": {
                "planId": {
                    "type": "string",
                    "minLength": 1,
                    "description": "Id of a plan returned by createKirhaSearchPlan"
                }
            },
            "required": ["planId"],
            "additionalProperties": false
        }),
    }
}

struct ToolRuntime {
    entry: ToolEntry,
    schema: serde_json::Value,
    validator: Validator,
}

impl ToolRuntime {
    fn new(entry: ToolEntry) -> anyhow::Result<Self> {
        let schema = input_schema(entry.name);
        let validator =
            jsonschema::validator_for(&schema).map_err(|e| anyhow::anyhow!(e.to_string()))?;
        Ok(Self {
            entry,
            schema,
            validator,
        })
    }

    fn validate_args(&self, args: &serde_json::Value) -> Result<(), String> {
        if self.validator.is_valid(args) {
            return Ok(());
        }

        let msg = self
            .validator
            .iter_errors(args)
            .take(5)
            .map(|e| e.to_string())
            .collect::<Vec<_>>()
            .join("; ");
        if msg.is_empty() {
            return Err("invalid arguments".to_string());
        }
        Err(msg)
    }
}

/// MCP handler exposing the configured Kirha tools.
///
/// Registration order is the configured tool list order.
pub struct GatewayHandler {
    settings: Arc<Settings>,
    client: KirhaClient,
    tools: Vec<ToolRuntime>,
}

impl GatewayHandler {
    pub fn new(settings: Arc<Settings>, client: KirhaClient) -> anyhow::Result<Self> {
        let tools = settings
            .tools
            .iter()
            .cloned()
            .map(ToolRuntime::new)
            .collect::<anyhow::Result<Vec<_>>>()?;
        Ok(Self {
            settings,
            client,
            tools,
        })
    }

    /// Header-supplied key takes precedence over the configured default.
    fn effective_api_key(&self, ctx: &RequestContext) -> Option<String> {
        ctx.api_key_override
            .clone()
            .or_else(|| self.settings.api_key.clone())
    }

    fn search_summarization(&self) -> Option<SummarizationOptions> {
        self.settings
            .summarization_enabled
            .then(|| SummarizationOptions::new(self.settings.summarization_model.clone()))
    }

    async fn dispatch(
        &self,
        name: ToolName,
        api_key: &str,
        args: &serde_json::Value,
    ) -> Result<serde_json::Value, KirhaApiError> {
        match name {
            ToolName::Search => {
                let query = args.get("query").and_then(|v| v.as_str()).unwrap_or_default();
                self.client
                    .search(
                        api_key,
                        &SearchRequest {
                            query: query.to_string(),
                            vertical_id: self.settings.vertical_id.clone(),
                            summarization: self.search_summarization(),
                        },
                    )
                    .await
            }
            ToolName::CreatePlan => {
                let query = args.get("query").and_then(|v| v.as_str()).unwrap_or_default();
                self.client
                    .create_plan(
                        api_key,
                        &CreatePlanRequest {
                            query: query.to_string(),
                            vertical_id: self.settings.vertical_id.clone(),
                        },
                    )
                    .await
            }
            ToolName::RunPlan => {
                let plan_id = args
                    .get("planId")
                    .and_then(|v| v.as_str())
                    .unwrap_or_default();
                self.client
                    .run_plan(
                        api_key,
                        &RunPlanRequest {
                            plan_id: plan_id.to_string(),
                            summarization: SummarizationOptions::new(
                                self.settings.summarization_model.clone(),
                            ),
                        },
                    )
                    .await
            }
        }
    }
}

fn describe_api_error(err: &KirhaApiError) -> String {
    match err {
        KirhaApiError::Status { status, .. } => {
            format!("Error: HTTP status {}", status.as_u16())
        }
        other => format!("Error: {other}"),
    }
}

#[async_trait]
impl McpHandler for GatewayHandler {
    async fn list_tools(&self, _params: ListToolsParams) -> anyhow::Result<ListToolsResult> {
        let tools = self
            .tools
            .iter()
            .map(|t| Tool {
                name: t.entry.name.as_str().to_string(),
                title: Some(t.entry.title.clone()),
                description: Some(t.entry.description.clone()),
                input_schema: t.schema.clone(),
            })
            .collect();
        Ok(ListToolsResult {
            tools,
            next_cursor: None,
        })
    }

    async fn call_tool(
        &self,
        ctx: &RequestContext,
        params: CallToolParams,
    ) -> anyhow::Result<CallToolResult> {
        let Some(tool) = self
            .tools
            .iter()
            .find(|t| t.entry.name.as_str() == params.name)
        else {
            anyhow::bail!("tool not found: {}", params.name);
        };

        let args = params.arguments.unwrap_or_else(|| serde_json::json!({}));
        if let Err(detail) = tool.validate_args(&args) {
            return Ok(CallToolResult::error_text(format!(
                "Error: invalid arguments: {detail}"
            )));
        }

        let Some(api_key) = self.effective_api_key(ctx) else {
            warn!(tool = params.name, "no effective API key for tool call");
            return Ok(CallToolResult::error_text(
                "Error: API key is missing; set KIRHA_API_KEY or send the x-kirha-api-key header",
            ));
        };

        match self.dispatch(tool.entry.name, &api_key, &args).await {
            Ok(result) => {
                info!(tool = params.name, "tool executed successfully");
                Ok(CallToolResult::text(result.to_string()))
            }
            Err(e) => {
                warn!(tool = params.name, error = %e, "tool execution failed");
                Ok(CallToolResult::error_text(describe_api_error(&e)))
            }
        }
    }
}
