//! `peer channel`: local channel membership bookkeeping.
//!
//! Joined channels are directories under `<peer.fileSystemPath>/channels`.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use clap::Arg;
use tracing::info;

use crate::command::{CommandNode, Invocation};
use crate::error::CommandError;

use super::PeerContext;

const CHANNELS_DIR: &str = "channels";
const ARG_CHANNEL: &str = "channelID";

pub fn build() -> CommandNode<PeerContext> {
    CommandNode::new("channel", "Operate a channel: join|list.")
        .subcommand(
            CommandNode::new("join", "Joins the peer to a channel.")
                .arg(
                    Arg::new(ARG_CHANNEL)
                        .short('c')
                        .long("channelID")
                        .value_name("CHANNEL")
                        .required(true)
                        .help("In case of a newChain command, the channel ID to create"),
                )
                .run(join),
        )
        .subcommand(CommandNode::new("list", "List of channels peer has joined.").run(list))
}

fn channels_dir(ctx: &PeerContext) -> PathBuf {
    ctx.peer().file_system_path.join(CHANNELS_DIR)
}

/// Lower-case letter first, then lower-case letters, digits, `.` or `-`.
pub fn valid_channel_id(id: &str) -> bool {
    let mut chars = id.chars();
    chars.next().is_some_and(|c| c.is_ascii_lowercase())
        && chars.all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '.' || c == '-')
}

/// Sorted names of joined channels; empty when nothing was joined yet.
pub fn joined_channels(dir: &Path) -> io::Result<Vec<String>> {
    let entries = match fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(e),
    };

    let mut names = Vec::new();
    for entry in entries {
        let entry = entry?;
        if entry.file_type()?.is_dir() {
            names.push(entry.file_name().to_string_lossy().into_owned());
        }
    }
    names.sort();
    Ok(names)
}

fn join(inv: &mut Invocation<'_, PeerContext>) -> Result<(), CommandError> {
    let id = inv.value(ARG_CHANNEL).unwrap_or_default();
    if !valid_channel_id(id) {
        return Err(CommandError::failed(format!("invalid channel ID '{id}'")));
    }

    let dir = channels_dir(inv.ctx());
    fs::create_dir_all(&dir)?;
    match fs::create_dir(dir.join(id)) {
        Ok(()) => {}
        Err(e) if e.kind() == io::ErrorKind::AlreadyExists => {
            return Err(CommandError::failed(format!("peer already joined channel '{id}'")));
        }
        Err(e) => return Err(e.into()),
    }

    info!(channel = %id, "joined channel");
    writeln!(inv.out(), "Successfully joined channel '{id}'")?;
    Ok(())
}

fn list(inv: &mut Invocation<'_, PeerContext>) -> Result<(), CommandError> {
    let channels = joined_channels(&channels_dir(inv.ctx()))?;
    let out = inv.out();
    writeln!(out, "Channels peers has joined: ")?;
    for channel in channels {
        writeln!(out, "{channel}")?;
    }
    Ok(())
}
