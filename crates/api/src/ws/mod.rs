//! Live connection surface: gateway lifecycle, wire events, dispatch

pub mod events;
pub mod gateway;
pub mod router;

pub use gateway::ws_handler;
