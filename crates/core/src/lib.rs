//! Core types and utilities for the crypto stats service
//!
//! This crate provides shared types used across all components:
//! - Asset identifiers and the tracked asset table
//! - Price samples
//! - Service configuration
//! - Error taxonomy

pub mod types;
pub mod assets;
pub mod config;
pub mod errors;

pub use types::*;
pub use assets::*;
pub use config::*;
pub use errors::*;
