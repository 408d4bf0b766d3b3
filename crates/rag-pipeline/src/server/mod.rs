//! HTTP server for the RAG pipeline

pub mod routes;
pub mod state;

use axum::Router;
use std::net::SocketAddr;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

use crate::config::ServiceConfig;
use crate::error::{Error, Result};
use state::AppState;

/// RAG HTTP Server
pub struct RagServer {
    config: ServiceConfig,
    state: AppState,
}

impl RagServer {
    /// Create a server, loading every configured model
    pub async fn new(config: ServiceConfig) -> Result<Self> {
        let state = AppState::new(config.clone()).await?;
        Ok(Self { config, state })
    }

    /// Create a server around existing state
    pub fn with_state(state: AppState) -> Self {
        Self {
            config: state.config().clone(),
            state,
        }
    }

    /// Build the router with all routes
    pub fn router(&self) -> Router {
        let router = routes::api_routes(self.config.server.max_upload_size)
            .with_state(self.state.clone())
            .layer(TraceLayer::new_for_http());

        if self.config.server.enable_cors {
            let cors = CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any);
            router.layer(cors)
        } else {
            router
        }
    }

    /// Start the server
    pub async fn start(self) -> Result<()> {
        let addr: SocketAddr = self
            .address()
            .parse()
            .map_err(|e| Error::invalid_config(format!("Invalid address: {}", e)))?;

        let router = self.router();

        tracing::info!("Starting RAG server on http://{}", addr);

        let listener = tokio::net::TcpListener::bind(addr)
            .await
            .map_err(|e| Error::internal(format!("Failed to bind {}: {}", addr, e)))?;

        axum::serve(listener, router)
            .await
            .map_err(|e| Error::internal(format!("Server error: {}", e)))?;

        Ok(())
    }

    /// Get the server address
    pub fn address(&self) -> String {
        format!("{}:{}", self.config.server.host, self.config.server.port)
    }
}
