//! # idlink Common Library
//!
//! Shared code for the idlink identity service:
//! - Contact models and the contact store seam (SQLite and in-memory)
//! - Database initialization
//! - Store configuration
//! - Lock retry helper for contended transactions

pub mod config;
pub mod db;
pub mod error;
pub mod retry;

pub use error::{Error, Result};
