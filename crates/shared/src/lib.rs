//! StoreChat Shared Types and Utilities
//!
//! This crate contains types and database utilities shared across the
//! StoreChat services.

pub mod db;
pub mod types;

pub use db::*;
pub use types::*;
