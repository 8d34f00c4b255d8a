//! # Intervox Common Library
//!
//! Shared code for the Intervox mock-interview services:
//! - Domain models (Interview, Question, statuses, lip-sync types)
//! - Error taxonomy shared across the engine and its HTTP edge
//! - Configuration loading
//! - Per-user notification event types
//! - Pagination helpers

pub mod config;
pub mod error;
pub mod events;
pub mod models;
pub mod pagination;

pub use error::{Error, Result};
