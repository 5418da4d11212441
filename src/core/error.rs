//! Application-wide error types.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("config error: {0}")]
    Config(String),

    #[error("identity error: {0}")]
    Identity(#[from] IdentityError),

    #[error("logger error: {0}")]
    Logger(String),

    #[error("runtime error: {0}")]
    Runtime(String),

    #[error("command error: {0}")]
    Command(#[from] CommandError),
}

/// Failures while loading or validating the local identity material.
#[derive(Debug, Error)]
pub enum IdentityError {
    #[error("missing identity material: {0}")]
    MissingMaterial(String),

    #[error("malformed identity material: {0}")]
    MalformedMaterial(String),

    #[error("organization mismatch: expected '{expected}', material belongs to '{found}'")]
    OrganizationMismatch { expected: String, found: String },
}

/// Errors raised while assembling the command tree or running a command.
#[derive(Debug, Error)]
pub enum CommandError {
    #[error("duplicate command name '{name}' under '{parent}'")]
    DuplicateName { parent: String, name: String },

    /// Argument parsing failed; the usage text has already been written.
    #[error("{0}")]
    Usage(String),

    #[error("{0}")]
    Failed(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl CommandError {
    pub fn failed(msg: impl Into<String>) -> Self {
        Self::Failed(msg.into())
    }
}
