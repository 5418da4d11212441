//! Peer node: bootstrap and command dispatch for the `peer` binary.

pub mod bootstrap;
pub mod command;
pub mod commands;
pub mod core;

pub use self::core::{config, error};
