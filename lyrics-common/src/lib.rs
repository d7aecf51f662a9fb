//! # Lyrics Common Library
//!
//! Shared code for the lyrics resolver workspace:
//! - Common error and result types
//! - TOML configuration loading with environment overrides
//! - Tracing subscriber bootstrap

pub mod config;
pub mod error;
pub mod logging;

pub use error::{Error, Result};
