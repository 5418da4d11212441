//! `peer chaincode`: build and sign chaincode proposals.
//!
//! Proposals are not sent anywhere; the signed envelope is printed as JSON so
//! it can be inspected or handed to another tool.

use chrono::{DateTime, Utc};
use clap::Arg;
use serde::{Deserialize, Serialize};
use tracing::debug;
use uuid::Uuid;

use crate::bootstrap::identity::SerializedIdentity;
use crate::command::{CommandNode, Invocation};
use crate::error::CommandError;

use super::PeerContext;

const ARG_CHANNEL: &str = "channelID";
const ARG_NAME: &str = "name";
const ARG_CTOR: &str = "ctor";

const DEFAULT_CTOR: &str = "{}";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProposalKind {
    Invoke,
    Query,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Proposal {
    pub tx_id: String,
    pub kind: ProposalKind,
    pub channel_id: String,
    pub chaincode: String,
    /// Constructor message, as given on the command line.
    pub args: serde_json::Value,
    pub timestamp: DateTime<Utc>,
    pub creator: SerializedIdentity,
}

impl Proposal {
    /// Bytes covered by the signature.
    pub fn signing_bytes(&self) -> Result<Vec<u8>, CommandError> {
        serde_json::to_vec(self)
            .map_err(|e| CommandError::failed(format!("cannot encode proposal: {e}")))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SignedProposal {
    pub proposal: Proposal,
    /// Hex ed25519 signature over [`Proposal::signing_bytes`].
    pub signature: String,
}

pub fn build() -> CommandNode<PeerContext> {
    CommandNode::new("chaincode", "Operate a chaincode: invoke|query.")
        .subcommand(with_args(CommandNode::new("invoke", "Invoke the specified chaincode.")).run(
            |inv| propose(inv, ProposalKind::Invoke),
        ))
        .subcommand(with_args(CommandNode::new("query", "Query using the specified chaincode.")).run(
            |inv| propose(inv, ProposalKind::Query),
        ))
}

fn with_args(node: CommandNode<PeerContext>) -> CommandNode<PeerContext> {
    node.arg(
        Arg::new(ARG_CHANNEL)
            .short('C')
            .long("channelID")
            .value_name("CHANNEL")
            .required(true)
            .help("The channel on which this command should be executed"),
    )
    .arg(
        Arg::new(ARG_NAME)
            .short('n')
            .long("name")
            .value_name("NAME")
            .required(true)
            .help("Name of the chaincode"),
    )
    .arg(
        Arg::new(ARG_CTOR)
            .short('c')
            .long("ctor")
            .value_name("JSON")
            .default_value(DEFAULT_CTOR)
            .help("Constructor message for the chaincode in JSON format"),
    )
}

fn propose(inv: &mut Invocation<'_, PeerContext>, kind: ProposalKind) -> Result<(), CommandError> {
    let identity = inv.ctx().identity();
    let channel_id = inv.value(ARG_CHANNEL).unwrap_or_default();
    let chaincode = inv.value(ARG_NAME).unwrap_or_default();
    let ctor = inv.value(ARG_CTOR).unwrap_or(DEFAULT_CTOR);

    let args: serde_json::Value = serde_json::from_str(ctor)
        .map_err(|e| CommandError::failed(format!("chaincode argument error: {e}")))?;
    if !args.is_object() {
        return Err(CommandError::failed(
            "chaincode argument error: ctor must be a JSON object",
        ));
    }

    let proposal = Proposal {
        tx_id: Uuid::new_v4().to_string(),
        kind,
        channel_id: channel_id.to_string(),
        chaincode: chaincode.to_string(),
        args,
        timestamp: Utc::now(),
        creator: identity.serialize(),
    };
    let signature = identity.sign(&proposal.signing_bytes()?);
    debug!(tx_id = %proposal.tx_id, channel = %proposal.channel_id, "proposal signed");

    let signed = SignedProposal {
        proposal,
        signature: hex::encode(signature.to_bytes()),
    };
    let json = serde_json::to_string_pretty(&signed)
        .map_err(|e| CommandError::failed(format!("cannot encode proposal: {e}")))?;
    writeln!(inv.out(), "{json}")?;
    Ok(())
}
