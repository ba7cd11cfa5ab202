mod init;
mod tools;

use rmcp::ServiceExt;
use tracing_subscriber::EnvFilter;

use protoforge_core::ProjectStore;
use tools::ProtoforgeServer;

const DEFAULT_PUBLIC_DIR: &str = "./public";

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let public_dir = std::env::var("PROTOFORGE_PUBLIC_DIR")
        .ok()
        .filter(|dir| !dir.trim().is_empty())
        .unwrap_or_else(|| DEFAULT_PUBLIC_DIR.to_string());

    // Handle `protoforge-mcp init` subcommand
    if std::env::args().nth(1).as_deref() == Some("init") {
        return init::init_project(&public_dir);
    }

    // stdout carries the protocol
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("protoforge=info")),
        )
        .with_writer(std::io::stderr)
        .with_ansi(false)
        .with_target(false)
        .compact()
        .init();

    tracing::info!(public_dir = %public_dir, "starting protoforge mcp server");

    let service = ProtoforgeServer::new(ProjectStore::new(public_dir))
        .serve(rmcp::transport::io::stdio())
        .await
        .inspect_err(|e| tracing::error!(error = %e, "MCP server error"))?;
    service.waiting().await?;
    Ok(())
}
