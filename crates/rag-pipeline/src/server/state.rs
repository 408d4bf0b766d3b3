//! Application state for the RAG server

use std::sync::Arc;

use crate::config::ServiceConfig;
use crate::error::Result;
use crate::pipeline::{PipelineOrchestrator, Providers};

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    config: ServiceConfig,
    orchestrator: PipelineOrchestrator,
}

impl AppState {
    /// Load every configured model and build the state. Runs once at startup.
    pub async fn new(config: ServiceConfig) -> Result<Self> {
        tracing::info!("Initializing RAG application state...");
        let providers = Providers::load(&config).await?;
        let state = Self::with_providers(config, providers)?;
        tracing::info!("Application state ready");
        Ok(state)
    }

    /// Build the state around already-loaded providers
    pub fn with_providers(config: ServiceConfig, providers: Providers) -> Result<Self> {
        let orchestrator = PipelineOrchestrator::new(config.clone(), providers)?;
        Ok(Self {
            inner: Arc::new(AppStateInner {
                config,
                orchestrator,
            }),
        })
    }

    /// Service configuration
    pub fn config(&self) -> &ServiceConfig {
        &self.inner.config
    }

    /// Pipeline orchestrator
    pub fn orchestrator(&self) -> &PipelineOrchestrator {
        &self.inner.orchestrator
    }
}
