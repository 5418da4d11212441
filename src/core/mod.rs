//! Core infrastructure: shared foundation used across the whole crate.
//!
//! - **config**: configuration loading and the process-wide settings store.
//! - **error**: application-wide error enums.

pub mod config;
pub mod error;
