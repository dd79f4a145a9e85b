//! StoreChat API Library
//!
//! This crate contains the real-time chat engine: the WebSocket gateway,
//! broadcast bus, message store and the read-model HTTP surface.

pub mod auth;
pub mod bus;
pub mod catalog;
pub mod config;
pub mod error;
pub mod routes;
pub mod state;
pub mod store;
pub mod ws;

pub use config::Config;
pub use error::{ApiError, ApiResult};
pub use state::AppState;
