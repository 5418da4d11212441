//! `peer logging`: inspect and adjust log levels of the running process.

use clap::Arg;

use crate::bootstrap::logspec::{self, level_name};
use crate::command::{CommandNode, Invocation};
use crate::error::CommandError;

use super::PeerContext;

const ARG_MODULE: &str = "module";
const ARG_LEVEL: &str = "level";

pub fn build() -> CommandNode<PeerContext> {
    CommandNode::new("logging", "Log levels: getlevel|setlevel|revertlevels.")
        .subcommand(
            CommandNode::new("getlevel", "Returns the logging level of the requested module logger.")
                .arg(module_arg())
                .run(get_level),
        )
        .subcommand(
            CommandNode::new("setlevel", "Sets the logging level for all modules that match the module name.")
                .arg(module_arg())
                .arg(Arg::new(ARG_LEVEL).required(true).help("Level name, e.g. debug"))
                .run(set_level),
        )
        .subcommand(
            CommandNode::new(
                "revertlevels",
                "Reverts the logging levels to the levels at the end of peer startup.",
            )
            .run(revert_levels),
        )
}

fn module_arg() -> Arg {
    Arg::new(ARG_MODULE)
        .required(true)
        .help("Module name (tracing target), e.g. peer_node::commands")
}

fn module(inv: &Invocation<'_, PeerContext>) -> Result<String, CommandError> {
    let module = inv.value(ARG_MODULE).unwrap_or_default().trim();
    if module.is_empty() {
        return Err(CommandError::failed("module name must not be empty"));
    }
    Ok(module.to_string())
}

fn get_level(inv: &mut Invocation<'_, PeerContext>) -> Result<(), CommandError> {
    let module = module(inv)?;
    let level = inv.ctx().logger().active_spec().level_for(&module);
    writeln!(
        inv.out(),
        "Current log level for module '{module}': {}",
        level_name(level).to_ascii_uppercase()
    )?;
    Ok(())
}

fn set_level(inv: &mut Invocation<'_, PeerContext>) -> Result<(), CommandError> {
    let module = module(inv)?;
    let raw = inv.value(ARG_LEVEL).unwrap_or_default();
    let level = logspec::parse_level(raw)
        .ok_or_else(|| CommandError::failed(format!("invalid log level provided - {raw}")))?;

    let logger = inv.ctx().logger();
    let mut spec = logger.active_spec();
    spec.set_module_level(&module, level);
    logger.apply_spec(&spec);

    writeln!(
        inv.out(),
        "Log level set for module '{module}': {}",
        level_name(level).to_ascii_uppercase()
    )?;
    writeln!(inv.out(), "Active spec: {spec}")?;
    Ok(())
}

fn revert_levels(inv: &mut Invocation<'_, PeerContext>) -> Result<(), CommandError> {
    let logger = inv.ctx().logger();
    logger.apply_spec(logger.startup_spec());
    writeln!(
        inv.out(),
        "Log levels reverted to the levels at the end of peer startup: {}",
        logger.startup_spec()
    )?;
    Ok(())
}
