pub mod config;
pub mod error;
pub mod models;
pub mod relay;
pub mod routes;
pub mod store;

use std::sync::Arc;

use config::Config;
use relay::hub::RelayHub;
use relay::registry::ConnectionRegistry;
use relay::responder::Responder;
use store::{MemoryStore, SessionStore};

/// Shared application state available to all route handlers.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub store: Arc<dyn SessionStore>,
    pub registry: Arc<ConnectionRegistry>,
    pub hub: RelayHub,
}

impl AppState {
    /// Build process state around an in-memory store and the given responder.
    pub fn new(config: Config, responder: Arc<dyn Responder>) -> Self {
        let store: Arc<dyn SessionStore> = Arc::new(MemoryStore::new());
        let registry = Arc::new(ConnectionRegistry::new());
        let hub = RelayHub::new(registry.clone(), store.clone(), responder);
        Self {
            config: Arc::new(config),
            store,
            registry,
            hub,
        }
    }
}
