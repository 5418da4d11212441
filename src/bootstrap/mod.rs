//! Bootstrap layer: everything that runs before a command body.
//!
//! - **logspec**: logging spec resolution and parsing.
//! - **logger**: tracing-subscriber initialisation and in-place reconfiguration.
//! - **runtime**: tokio runtime sized from `peer.workerThreads`.
//! - **identity**: local identity material loading and validation.
//!
//! [`run`] strings them together in a fixed order; a step never starts before
//! the previous one has finished.

pub mod identity;
pub mod logger;
pub mod logspec;
pub mod runtime;

use std::ffi::OsString;

use tracing::{debug, error, info, warn};

use crate::command::{ExitOutcome, dispatch};
use crate::commands::{self, PeerContext};
use crate::config::{self, LOGGING_LEVEL, LoggingConfig, PeerConfig};
use crate::error::AppError;

use logger::{LogFormat, Logger};

/// Root configuration key; also names the env prefix (`CORE_`) and the
/// config file (`core.toml`).
pub const CMD_ROOT: &str = "core";

/// Run the whole bootstrap sequence and dispatch `argv`.
///
/// `Err` means the process never reached dispatch; command failures come
/// back as `Ok(ExitOutcome::Failure)`.
pub fn run(argv: Vec<OsString>) -> Result<ExitOutcome, AppError> {
    // .env is optional.
    let _ = dotenvy::dotenv();

    let settings = config::load(CMD_ROOT)?;
    let logging = LoggingConfig::from_settings(&settings);

    let spec = logspec::resolve(
        settings.get_string(LOGGING_LEVEL).as_deref(),
        Some(logging.peer_spec.as_str()),
    );
    let logger = Logger::install(&spec);

    debug!(
        source = %settings
            .source()
            .map(|p| p.display().to_string())
            .unwrap_or_else(|| "<defaults>".into()),
        logging_spec = %spec,
        "configuration loaded"
    );

    let tree = commands::assemble()?;

    let peer = PeerConfig::from_settings(&settings);
    let threads = runtime::worker_threads(peer.worker_threads);
    let runtime = runtime::build(threads)?;

    if let Err(e) = logger.configure_output(LogFormat::parse(&logging.format), &logging.output) {
        warn!(error = %e, "keeping previous log output");
    }

    let identity = identity::init(&peer.msp_config_path, &peer.local_msp_id).map_err(|e| {
        error!("Cannot run peer because {e}");
        e
    })?;
    info!(
        msp_id = %identity.msp_id(),
        node_id = %identity.node_id(),
        worker_threads = threads,
        "identity ready"
    );

    let ctx = PeerContext::new(settings, logger, identity, runtime);
    let outcome = dispatch(
        &tree,
        argv,
        &ctx,
        &mut std::io::stdout(),
        &mut std::io::stderr(),
    );

    if outcome.is_success() {
        info!("Exiting.....");
    }
    Ok(outcome)
}
