//! Shared state for HTTP handlers

use std::sync::Arc;

use crate::config::RagConfig;
use crate::error::Result;
use crate::service::RagService;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    config: RagConfig,
    service: RagService,
}

impl AppState {
    /// Build the service from configuration
    pub fn new(config: RagConfig) -> Result<Self> {
        let service = RagService::from_config(&config)?;
        Ok(Self::with_service(config, service))
    }

    /// Wrap an already built service
    pub fn with_service(config: RagConfig, service: RagService) -> Self {
        Self {
            inner: Arc::new(AppStateInner {
                config,
                service,
            }),
        }
    }

    pub fn config(&self) -> &RagConfig {
        &self.inner.config
    }

    pub fn service(&self) -> &RagService {
        &self.inner.service
    }

    /// Ready unless the database is being wiped
    pub fn is_ready(&self) -> bool {
        self.inner.service.is_ready()
    }
}
