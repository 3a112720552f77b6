//! Service Layer
//!
//! Business logic sitting between the route handlers and the storage and
//! event crates.

mod item_service;

pub use item_service::*;
