//! services/api/src/web/state.rs
//!
//! Defines the application's shared state.

use crate::adapters::FireflyClient;
use crate::config::Config;
use firefly_core::UpdateCoordinator;
use std::sync::Arc;

//=========================================================================================
// AppState (Shared Across All Requests)
//=========================================================================================

/// The shared application state, created once at startup and passed to all handlers.
#[derive(Clone)]
pub struct AppState {
    pub coordinator: Arc<UpdateCoordinator>,
    pub firefly: Arc<FireflyClient>,
    pub config: Arc<Config>,
}
