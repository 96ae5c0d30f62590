//! # riplink common library
//!
//! Shared code for the riplink service and its tooling:
//! - Configuration loading and root folder resolution
//! - Database initialization
//! - Error type
//! - Timestamp helpers

pub mod config;
pub mod db;
pub mod error;
pub mod time;

pub use error::{Error, Result};
