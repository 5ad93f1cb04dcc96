// Qalam - HTTP Server Module
// Serves the three rewrite operations as JSON over HTTP

mod handlers;

pub use handlers::{create_router, health_check, AppError};

use anyhow::Result;
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::trace::TraceLayer;

use crate::config::ServerConfig;
use crate::service::RewriteService;

/// HTTP server around a shared rewrite service
pub struct RewriteServer {
    /// Rewrite orchestrator (shared across requests)
    service: Arc<RewriteService>,
    /// Server configuration
    config: ServerConfig,
}

impl RewriteServer {
    pub fn new(service: RewriteService, config: ServerConfig) -> Self {
        Self {
            service: Arc::new(service),
            config,
        }
    }

    /// Start the HTTP server
    pub async fn serve(self) -> Result<()> {
        let addr: SocketAddr = self.config.bind_address.parse()?;

        let app = create_router(Arc::new(self)).layer(TraceLayer::new_for_http());

        tracing::info!("Starting Qalam server on {}", addr);

        let listener = tokio::net::TcpListener::bind(addr).await?;
        axum::serve(listener, app)
            .with_graceful_shutdown(shutdown_signal())
            .await?;

        tracing::info!("Server stopped");
        Ok(())
    }

    /// Get reference to the rewrite service
    pub fn service(&self) -> &Arc<RewriteService> {
        &self.service
    }

    /// Get server configuration
    pub fn config(&self) -> &ServerConfig {
        &self.config
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}
