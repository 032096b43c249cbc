use std::sync::Arc;

use dbexport_core::catalog::CatalogProvider;
use dbexport_core::{Config, RunEngine, SanitizedConfig};

use crate::api::WsBroadcaster;

/// Shared application state
pub struct AppState {
    config: Config,
    engine: RunEngine,
    catalog: Arc<dyn CatalogProvider>,
    ws_broadcaster: WsBroadcaster,
}

impl AppState {
    pub fn new(
        config: Config,
        engine: RunEngine,
        catalog: Arc<dyn CatalogProvider>,
        ws_broadcaster: WsBroadcaster,
    ) -> Self {
        Self {
            config,
            engine,
            catalog,
            ws_broadcaster,
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn sanitized_config(&self) -> SanitizedConfig {
        SanitizedConfig::from(&self.config)
    }

    pub fn engine(&self) -> &RunEngine {
        &self.engine
    }

    pub fn catalog(&self) -> &dyn CatalogProvider {
        self.catalog.as_ref()
    }

    pub fn ws_broadcaster(&self) -> &WsBroadcaster {
        &self.ws_broadcaster
    }
}
