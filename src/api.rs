//! HTTP API for wifi_doctor

mod handlers;
mod types;

pub use handlers::create_router;
#[allow(unused_imports)] // Public API re-exports
pub use types::*;

use crate::llm::ModelRegistry;
use crate::runtime::{ProductionRuntime, RegistryNarrator, RuntimeConfig, SessionStore};
use std::sync::Arc;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub runtime: Arc<ProductionRuntime>,
    pub llm_registry: Arc<ModelRegistry>,
}

impl AppState {
    pub fn new(
        store: Arc<dyn SessionStore>,
        llm_registry: Arc<ModelRegistry>,
        config: RuntimeConfig,
    ) -> Self {
        let narrator = Arc::new(RegistryNarrator::new(llm_registry.clone()));
        Self {
            runtime: Arc::new(ProductionRuntime::new(store, narrator, config)),
            llm_registry,
        }
    }
}
