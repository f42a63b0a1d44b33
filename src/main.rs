//! wrapnode: multi-agent demo server
//!
//! Serves two HTTP agents and two WebSocket agents from one process.
//!
//! Usage:
//!   wrapnode                              # 0.0.0.0:9000
//!   wrapnode --port 8080 --host 127.0.0.1
//!   wrapnode --think-ms 0 --log-json      # instant chat replies, JSON logs

use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;
use wrapnode::multi_agent_config;
use wrapnode_server::{AgentService, EndpointKind, LogLevel, RequestLog};

#[derive(Parser, Debug)]
#[command(name = "wrapnode", about = "wrapnode multi-agent demo server")]
struct Cli {
    /// Address to bind to
    #[arg(long, default_value = "0.0.0.0")]
    host: String,

    /// Port to listen on (0 for OS-assigned)
    #[arg(long, default_value = "9000")]
    port: u16,

    /// debug, info, warning, error or critical (RUST_LOG takes precedence)
    #[arg(long, default_value = "info")]
    log_level: LogLevel,

    /// Disable CORS headers
    #[arg(long)]
    no_cors: bool,

    /// Simulated chat agent thinking time, in milliseconds
    #[arg(long, default_value = "1000")]
    think_ms: u64,

    /// Emit logs as JSON lines
    #[arg(long)]
    log_json: bool,
}

fn init_tracing(cli: &Cli) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(cli.log_level.as_filter()));
    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    if cli.log_json {
        builder.json().init();
    } else {
        builder.init();
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(&cli);

    let mut config = multi_agent_config(Duration::from_millis(cli.think_ms))
        .host(cli.host.clone())
        .port(cli.port)
        .log_level(cli.log_level)
        .middleware(RequestLog);
    if cli.no_cors {
        config = config.disable_cors();
    }

    let service = AgentService::new(config).context("invalid service configuration")?;

    println!();
    println!("╔══════════════════════════════════════════════════════════════╗");
    println!("║                   wrapnode multi-agent demo                  ║");
    println!("╚══════════════════════════════════════════════════════════════╝");
    println!();
    println!("  Binding:    {}:{}", cli.host, cli.port);
    println!("  CORS:       {}", if cli.no_cors { "disabled" } else { "enabled" });
    println!("  Think time: {} ms", cli.think_ms);
    println!();
    for endpoint in service.endpoints() {
        match endpoint.kind {
            EndpointKind::Stream => println!("    WS     {}", endpoint.path),
            _ => println!(
                "    {:<6} {}",
                endpoint.method.map(|m| m.as_str()).unwrap_or("-"),
                endpoint.path
            ),
        }
    }
    println!();

    let report = service
        .run_until(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                warn!("Failed to listen for ctrl-c: {e}");
            }
            info!("Shutting down...");
        })
        .await?;

    for failure in &report.failures {
        warn!("{failure}");
    }
    info!("Server stopped");
    Ok(())
}
