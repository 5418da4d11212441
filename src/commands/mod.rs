//! The `peer` command tree.
//!
//! Each child command lives in its own module and exposes a `build()`
//! factory; [`assemble`] wires them under the root together with the
//! persistent flags and the logging hook.

pub mod chaincode;
pub mod channel;
pub mod logging;
pub mod node;
pub mod version;

use clap::{Arg, ArgAction};
use tokio::runtime::Runtime;
use tracing::debug;

use crate::bootstrap::identity::IdentityContext;
use crate::bootstrap::logger::Logger;
use crate::bootstrap::logspec;
use crate::command::{CommandNode, CommandTree, Invocation};
use crate::config::{LOGGING_LEVEL, LOGGING_PEER, PeerConfig, Settings};
use crate::error::CommandError;

pub const ROOT_NAME: &str = "peer";

const ROOT_ABOUT: &str = "Operate a peer node: peer node start.";

pub const FLAG_VERSION: &str = "version";
pub const FLAG_LOGGING_LEVEL: &str = "logging-level";
pub const FLAG_COVERPROFILE: &str = "test.coverprofile";

const DEFAULT_COVERPROFILE: &str = "coverage.cov";

/// Everything a command body may need, fully built before dispatch.
pub struct PeerContext {
    settings: Settings,
    peer: PeerConfig,
    logger: Logger,
    identity: IdentityContext,
    runtime: Runtime,
}

impl PeerContext {
    pub fn new(settings: Settings, logger: Logger, identity: IdentityContext, runtime: Runtime) -> Self {
        let peer = PeerConfig::from_settings(&settings);
        Self {
            settings,
            peer,
            logger,
            identity,
            runtime,
        }
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn peer(&self) -> &PeerConfig {
        &self.peer
    }

    pub fn logger(&self) -> &Logger {
        &self.logger
    }

    pub fn identity(&self) -> &IdentityContext {
        &self.identity
    }

    pub fn runtime(&self) -> &Runtime {
        &self.runtime
    }
}

/// Build the full command tree.
pub fn assemble() -> Result<CommandTree<PeerContext>, CommandError> {
    let root = CommandNode::new(ROOT_NAME, ROOT_ABOUT)
        .persistent_arg(
            Arg::new(FLAG_VERSION)
                .short('v')
                .long("version")
                .help("Display current version of the peer server")
                .action(ArgAction::SetTrue),
        )
        .persistent_arg(
            Arg::new(FLAG_LOGGING_LEVEL)
                .long("logging-level")
                .value_name("SPEC")
                .help("Default logging level and overrides, e.g. warning:peer_node::commands=debug"),
        )
        .persistent_arg(
            Arg::new(FLAG_COVERPROFILE)
                .long("test.coverprofile")
                .value_name("PATH")
                .default_value(DEFAULT_COVERPROFILE)
                .help("Done"),
        )
        .pre_run(apply_logging_spec)
        .run(|inv| {
            if inv.flag(FLAG_VERSION) {
                write!(inv.out(), "{}", version::info())?;
                Ok(())
            } else {
                inv.print_help()
            }
        })
        .subcommand(version::build())
        .subcommand(node::build())
        .subcommand(chaincode::build())
        .subcommand(logging::build())
        .subcommand(channel::build());

    CommandTree::new(root)
}

/// Re-resolve the logging spec now that flags are parsed and re-apply it.
fn apply_logging_spec(inv: &mut Invocation<'_, PeerContext>) -> Result<(), CommandError> {
    let ctx = inv.ctx();
    let bound = ctx
        .settings()
        .get_bound(LOGGING_LEVEL, inv.value(FLAG_LOGGING_LEVEL));
    let configured = ctx.settings().get_string(LOGGING_PEER);

    let spec = logspec::resolve(bound.as_deref(), configured.as_deref());
    ctx.logger().apply_spec(&spec);
    debug!(spec = %spec, command = %inv.path().join(" "), "logging spec applied");
    Ok(())
}

#[cfg(test)]
pub(crate) mod testing {
    //! Fixtures for command tests: a real context over temp material.

    use std::path::PathBuf;

    use tempfile::TempDir;

    use super::*;
    use crate::bootstrap::{identity, runtime};
    use crate::command::{ExitOutcome, dispatch};

    pub const MSP_ID: &str = "Org1MSP";

    /// Context whose identity lives under `dir/msp` and whose settings come
    /// from `file` (TOML) anchored at `dir`.
    pub fn context(dir: &TempDir, file: &str) -> PeerContext {
        let msp = dir.path().join("msp");
        identity::enroll(&msp, MSP_ID, "peer0.org1").unwrap();

        let value: toml::Value = toml::from_str(file).unwrap();
        let settings = Settings::new(
            "core",
            Some(value),
            None,
            PathBuf::from(dir.path()),
            std::iter::empty(),
        );
        let logger = Logger::install(&logspec::LoggingSpec::default());
        let identity = identity::init(&msp, MSP_ID).unwrap();
        let runtime = runtime::build(2).unwrap();
        PeerContext::new(settings, logger, identity, runtime)
    }

    /// Dispatch `argv` against the real tree; returns outcome, stdout, stderr.
    pub fn run(ctx: &PeerContext, argv: &[&str]) -> (ExitOutcome, String, String) {
        let tree = assemble().unwrap();
        let mut out = Vec::new();
        let mut err = Vec::new();
        let outcome = dispatch(&tree, argv, ctx, &mut out, &mut err);
        (
            outcome,
            String::from_utf8(out).unwrap(),
            String::from_utf8(err).unwrap(),
        )
    }
}
