//! Shared application state and the match-level state model.

pub mod phase;
pub mod presence;
pub mod snapshot;

use std::sync::Arc;

use crate::{config::AppConfig, dao::match_store::MatchStore};

/// Cheaply clonable handle to [`AppState`].
pub type SharedState = Arc<AppState>;

/// Central application state: the record store handle and runtime config.
pub struct AppState {
    store: Arc<dyn MatchStore>,
    config: AppConfig,
}

impl AppState {
    /// Construct the shared state wrapped in an [`Arc`].
    pub fn new(store: Arc<dyn MatchStore>, config: AppConfig) -> SharedState {
        Arc::new(Self { store, config })
    }

    /// Handle to the record store.
    pub fn store(&self) -> &Arc<dyn MatchStore> {
        &self.store
    }

    /// Runtime configuration.
    pub fn config(&self) -> &AppConfig {
        &self.config
    }
}
