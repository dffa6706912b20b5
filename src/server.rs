//! MCP server initialization for stdio and streamable HTTP transports.
//!
//! Provides [`serve_stdio`] and [`serve_http`] entry points that build the
//! memory manager and wire it into the MCP tool handler. The vector index is
//! persisted once more when the server stops.

use anyhow::Result;
use lyra::config::LyraConfig;
use lyra::memory::manager::CombinedMemoryManager;
use rmcp::ServiceExt;
use std::sync::Arc;

use crate::tools::LyraTools;

/// Build the memory manager on the blocking pool (model loading and the
/// blocking HTTP client must stay off the async runtime).
pub async fn build_manager(config: LyraConfig) -> Result<Arc<CombinedMemoryManager>> {
    let manager =
        tokio::task::spawn_blocking(move || CombinedMemoryManager::from_config(&config)).await??;
    Ok(Arc::new(manager))
}

/// Flush the vector index; failures are logged only.
async fn persist_on_shutdown(manager: Arc<CombinedMemoryManager>) {
    match tokio::task::spawn_blocking(move || manager.persist()).await {
        Ok(Ok(())) => {}
        Ok(Err(e)) => tracing::warn!(error = %e, "final persist failed"),
        Err(e) => tracing::warn!(error = %e, "final persist task failed"),
    }
}

/// Start the MCP server over stdio transport.
pub async fn serve_stdio(config: LyraConfig) -> Result<()> {
    tracing::info!("starting Lyra MCP server on stdio");

    let manager = build_manager(config).await?;

    let tools = LyraTools::new(Arc::clone(&manager));
    let transport = rmcp::transport::stdio();

    let server = tools.serve(transport).await?;
    tracing::info!("MCP server running, waiting for client");

    server.waiting().await?;
    persist_on_shutdown(manager).await;
    tracing::info!("MCP server shut down");

    Ok(())
}

/// Start the MCP server over streamable HTTP transport.
pub async fn serve_http(config: LyraConfig) -> Result<()> {
    let bind_addr = format!("{}:{}", config.server.host, config.server.port);

    tracing::info!(addr = %bind_addr, "starting Lyra MCP server on HTTP");

    let manager = build_manager(config).await?;

    let shared = Arc::clone(&manager);
    let service = rmcp::transport::streamable_http_server::StreamableHttpService::new(
        move || Ok(LyraTools::new(Arc::clone(&shared))),
        rmcp::transport::streamable_http_server::session::local::LocalSessionManager::default()
            .into(),
        Default::default(),
    );

    let router = axum::Router::new().nest_service("/mcp", service);

    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    tracing::info!(addr = %bind_addr, "MCP server listening at http://{bind_addr}/mcp");

    axum::serve(listener, router)
        .with_graceful_shutdown(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!(error = %e, "failed to listen for ctrl-c");
                std::future::pending::<()>().await;
            }
            tracing::info!("shutting down HTTP server");
        })
        .await?;

    persist_on_shutdown(manager).await;
    Ok(())
}
