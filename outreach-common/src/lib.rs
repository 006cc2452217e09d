//! Shared foundation for the outreach pipeline
//!
//! Holds the pieces every stage binary needs: error types, configuration
//! loading, the domain models, and the SQLite lead store.

pub mod config;
pub mod db;
pub mod error;
pub mod models;

pub use error::{Error, Result};
