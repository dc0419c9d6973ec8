//! Gateway settings: environment/CLI inputs plus the vertical/tool catalog.
//!
//! The catalog maps each vertical to the tool entries it exposes; which of
//! those entries are actually served depends on the plan-mode switch. All
//! validation happens here, before any transport starts: a bad setting is a
//! startup failure, never a runtime one.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::Context as _;
use serde::Deserialize;
use url::Url;

/// Catalog compiled into the binary; `--catalog` overrides it.
pub const DEFAULT_CATALOG: &str = include_str!("../catalog.json");

/// Tools known to the gateway. The catalog may only reference these names;
/// anything else fails catalog parsing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub enum ToolName {
    #[serde(rename = "searchKirha")]
    Search,
    #[serde(rename = "createKirhaSearchPlan")]
    CreatePlan,
    #[serde(rename = "runKirhaSearchPlan")]
    RunPlan,
}

impl ToolName {
    pub fn as_str(&self) -> &'static str {
        match self {
            ToolName::Search => "searchKirha",
            ToolName::CreatePlan => "createKirhaSearchPlan",
            ToolName::RunPlan => "runKirhaSearchPlan",
        }
    }
}

const SEARCH_MODE_TOOLS: &[ToolName] = &[ToolName::Search];
const PLAN_MODE_TOOLS: &[ToolName] = &[ToolName::CreatePlan, ToolName::RunPlan];

#[derive(Debug, Clone, Deserialize)]
pub struct ToolEntry {
    pub name: ToolName,
    pub title: String,
    pub description: String,
}

#[derive(Debug, Deserialize)]
struct CatalogFile {
    mcp: McpSection,
    api: ApiSection,
    verticals: Vec<VerticalSection>,
}

#[derive(Debug, Deserialize)]
struct McpSection {
    name: String,
    version: String,
}

#[derive(Debug, Deserialize)]
struct ApiSection {
    summarization: SummarizationSection,
}

#[derive(Debug, Deserialize)]
struct SummarizationSection {
    enable: bool,
    model: String,
}

#[derive(Debug, Deserialize)]
struct VerticalSection {
    id: String,
    tools: Vec<ToolEntry>,
}

/// Environment/CLI inputs shared by both transports.
#[derive(Debug, Clone, clap::Args)]
pub struct GatewayArgs {
    /// Default Kirha API key, used when a request does not supply one.
    #[arg(long, env = "KIRHA_API_KEY")]
    pub api_key: Option<String>,

    /// Vertical whose tool catalog is exposed.
    #[arg(long, env = "KIRHA_VERTICAL", default_value = "crypto")]
    pub vertical: String,

    /// Expose planning tools (create/run plan) instead of direct search.
    #[arg(long, env = "PLAN_MODE_ENABLED", default_value_t = false)]
    pub plan_mode: bool,

    /// Kirha API base URL.
    #[arg(long, env = "KIRHA_BASE_URL", default_value = kirha_api::DEFAULT_BASE_URL)]
    pub base_url: Url,

    /// Upstream request timeout in seconds.
    #[arg(long, env = "KIRHA_TIMEOUT_SECONDS", default_value_t = 120)]
    pub timeout_seconds: u64,

    /// Path to an alternate vertical/tool catalog file.
    #[arg(long, env = "KIRHA_CATALOG")]
    pub catalog: Option<PathBuf>,
}

/// Immutable, process-wide settings. Built once at startup.
#[derive(Debug, Clone)]
pub struct Settings {
    pub server_name: String,
    pub server_version: String,
    pub api_key: Option<String>,
    pub vertical_id: String,
    pub plan_mode_enabled: bool,
    pub base_url: Url,
    pub timeout: Duration,
    pub summarization_enabled: bool,
    pub summarization_model: String,
    /// Tools to register, in catalog order, already filtered by mode.
    pub tools: Vec<ToolEntry>,
}

impl Settings {
    pub fn resolve(args: &GatewayArgs) -> anyhow::Result<Self> {
        let catalog_text = match &args.catalog {
            Some(path) => std::fs::read_to_string(path)
                .with_context(|| format!("read catalog {}", path.display()))?,
            None => DEFAULT_CATALOG.to_string(),
        };

        let catalog: CatalogFile =
            serde_json::from_str(&catalog_text).context("parse tool catalog")?;

        let vertical = catalog
            .verticals
            .iter()
            .find(|v| v.id == args.vertical)
            .with_context(|| {
                format!("no tools configured for vertical ID: {}", args.vertical)
            })?;

        let mode_tools = if args.plan_mode {
            PLAN_MODE_TOOLS
        } else {
            SEARCH_MODE_TOOLS
        };
        let tools: Vec<ToolEntry> = vertical
            .tools
            .iter()
            .filter(|t| mode_tools.contains(&t.name))
            .cloned()
            .collect();

        if tools.is_empty() {
            anyhow::bail!(
                "vertical '{}' declares no tools for {} mode",
                args.vertical,
                if args.plan_mode { "plan" } else { "search" }
            );
        }

        for (i, t) in tools.iter().enumerate() {
            if tools[..i].iter().any(|other| other.name == t.name) {
                anyhow::bail!(
                    "vertical '{}' declares tool '{}' more than once",
                    args.vertical,
                    t.name.as_str()
                );
            }
        }

        if args.timeout_seconds == 0 {
            anyhow::bail!("invalid timeout configuration: KIRHA_TIMEOUT_SECONDS must be > 0");
        }

        Ok(Self {
            server_name: catalog.mcp.name,
            server_version: catalog.mcp.version,
            api_key: args.api_key.clone(),
            vertical_id: args.vertical.clone(),
            plan_mode_enabled: args.plan_mode,
            base_url: args.base_url.clone(),
            timeout: Duration::from_secs(args.timeout_seconds),
            summarization_enabled: catalog.api.summarization.enable,
            summarization_model: catalog.api.summarization.model,
            tools,
        })
    }
}
