//! Peer node: process entry point.
//!
//! Startup sequence (see [`bootstrap::run`]):
//!   1. Load .env (if present)
//!   2. Load config (`core.toml` + `CORE_*` env)
//!   3. Resolve logging spec and init logger
//!   4. Assemble the command tree
//!   5. Build the async runtime
//!   6. Re-init logger with the configured format and sink
//!   7. Load the local identity
//!   8. Dispatch to one command
//!
//! Anything that fails before dispatch exits with status 1.

use std::process::ExitCode;

use peer_node::bootstrap;
use peer_node::error::AppError;

fn main() -> ExitCode {
    match bootstrap::run(std::env::args_os().collect()) {
        Ok(outcome) => outcome.into(),
        Err(AppError::Config(e)) => {
            eprintln!("Fatal error when initializing {} config : {e}", bootstrap::CMD_ROOT);
            ExitCode::FAILURE
        }
        // already logged by the bootstrap
        Err(AppError::Identity(_)) => ExitCode::FAILURE,
        Err(e) => {
            eprintln!("error: {e}");
            ExitCode::FAILURE
        }
    }
}
