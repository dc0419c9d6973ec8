use std::net::SocketAddr;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use kirha_api::{KirhaClient, KirhaClientOptions};
use kirha_mcp::{McpHandler, McpServerConfig};
use tracing::info;

use kirha_gateway::config::{GatewayArgs, Settings};
use kirha_gateway::session::{SessionManager, SessionMode};
use kirha_gateway::tools::GatewayHandler;
use kirha_gateway::{http, stdio};

#[derive(Debug, Parser)]
#[command(
    name = "kirha-mcp-gateway",
    version,
    about = "Kirha MCP Gateway - connect to Kirha AI tools via the MCP protocol"
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Serve MCP over stdin/stdout (for clients that spawn the gateway).
    Stdio {
        #[command(flatten)]
        gateway: GatewayArgs,
    },
    /// Serve MCP over streamable HTTP.
    Http {
        #[command(flatten)]
        gateway: GatewayArgs,

        /// Port to listen on.
        #[arg(long, env = "PORT", default_value_t = 3400)]
        port: u16,

        /// One-shot connection per request: no session ids, no event log.
        #[arg(long, env = "MCP_STATELESS", default_value_t = false)]
        stateless: bool,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Stdout is the protocol channel in stdio mode; logs always go to stderr.
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,hyper=warn,reqwest=warn".into()),
        )
        .json()
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    match cli.command {
        Command::Stdio { gateway } => {
            let (cfg, handler) = build_gateway(&gateway)?;
            info!("starting stdio MCP server");
            stdio::run(cfg, handler).await
        }
        Command::Http {
            gateway,
            port,
            stateless,
        } => {
            let (cfg, handler) = build_gateway(&gateway)?;
            let mode = if stateless {
                SessionMode::Stateless
            } else {
                SessionMode::Stateful
            };
            let manager = Arc::new(SessionManager::new(cfg, handler, mode));
            http::serve(SocketAddr::from(([0, 0, 0, 0], port)), manager).await
        }
    }
}

fn build_gateway(args: &GatewayArgs) -> anyhow::Result<(McpServerConfig, Arc<dyn McpHandler>)> {
    let settings = Arc::new(Settings::resolve(args)?);

    let client = KirhaClient::new(KirhaClientOptions {
        base_url: settings.base_url.clone(),
        timeout: settings.timeout,
    })?;
    let handler: Arc<dyn McpHandler> = Arc::new(GatewayHandler::new(settings.clone(), client)?);

    let mut cfg = McpServerConfig::default_for_binary(&settings.server_name, &settings.server_version);
    cfg.instructions =
        Some("Gateway to premium data providers for real time insights".to_string());

    Ok((cfg, handler))
}
