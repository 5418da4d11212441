//! Configuration loading with env-var overrides.
//!
//! Reads `<root_key>.toml` from the config search path, then layers
//! `<ROOT_KEY>_*` environment variables on top of it.
//!
//! # Module layout
//!
//! - **settings**: the normalised key/value store (`Settings`) with typed getters.
//! - **load**: search path, file reading and parsing: `load`, `load_from`,
//!   `expand_home`.
//! - **types**: well-known keys and the resolved views (`PeerConfig`,
//!   `LoggingConfig`) consumed by the bootstrap sequence and commands.

mod load;
mod settings;
mod types;

pub use load::{CFG_PATH_ENV, config_search_path, expand_home, load, load_from};
pub use settings::{Settings, normalize_key};
pub use types::*;
