//! Shared application state

use std::sync::Arc;

use sqlx::PgPool;

use crate::auth::TokenVerifier;
use crate::bus::BroadcastBus;
use crate::catalog::CatalogClient;
use crate::config::Config;

#[derive(Clone)]
pub struct AppState {
    pub pool: PgPool,
    pub config: Arc<Config>,
    pub verifier: TokenVerifier,
    pub bus: Arc<dyn BroadcastBus>,
    pub catalog: CatalogClient,
}
