//! `peer node`: start the node or report its local state.

use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::command::{CommandNode, Invocation};
use crate::error::CommandError;

use super::PeerContext;

pub fn build() -> CommandNode<PeerContext> {
    CommandNode::new("node", "Operate a peer node: start|status.")
        .subcommand(CommandNode::new("start", "Starts the node.").run(start))
        .subcommand(CommandNode::new("status", "Returns status of the node.").run(status))
}

fn start(inv: &mut Invocation<'_, PeerContext>) -> Result<(), CommandError> {
    let ctx = inv.ctx();
    ctx.runtime().block_on(run_peer(ctx))
}

async fn run_peer(ctx: &PeerContext) -> Result<(), CommandError> {
    let peer = ctx.peer();
    let identity = ctx.identity();

    let listener = TcpListener::bind(&peer.address)
        .await
        .map_err(|e| CommandError::failed(format!("bind failed on {}: {e}", peer.address)))?;
    let address = listener.local_addr()?;

    info!(
        peer_id = %peer.id,
        msp_id = %identity.msp_id(),
        node_id = %identity.node_id(),
        %address,
        "Started peer"
    );

    // Ctrl-C cancels the token; the accept loop watches it.
    let shutdown = CancellationToken::new();
    let ctrlc_token = shutdown.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("ctrl-c received, stopping peer");
            ctrlc_token.cancel();
        }
    });

    serve(listener, shutdown).await;
    Ok(())
}

/// Accept and drop connections until `shutdown` fires.
async fn serve(listener: TcpListener, shutdown: CancellationToken) {
    loop {
        tokio::select! {
            biased;

            _ = shutdown.cancelled() => {
                info!("peer listener shutting down");
                break;
            }

            accepted = listener.accept() => {
                match accepted {
                    Ok((socket, remote)) => {
                        debug!(%remote, "connection accepted");
                        drop(socket);
                    }
                    Err(e) => warn!("accept error: {e}"),
                }
            }
        }
    }
}

fn status(inv: &mut Invocation<'_, PeerContext>) -> Result<(), CommandError> {
    let ctx = inv.ctx();
    let peer = ctx.peer();
    let identity = ctx.identity();
    let out = inv.out();

    writeln!(out, "Peer: {}", peer.id)?;
    writeln!(out, "Node ID: {}", identity.node_id())?;
    writeln!(out, "MSP ID: {}", identity.msp_id())?;
    writeln!(out, "Subject: {}", identity.subject())?;
    writeln!(out, "Material: {}", identity.material_dir().display())?;
    writeln!(out, "Address: {}", peer.address)?;
    writeln!(out, "Worker threads: {}", ctx.runtime().metrics().num_workers())?;
    writeln!(out, "Logging spec: {}", ctx.logger().active_spec())?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command::ExitOutcome;
    use crate::commands::testing::{MSP_ID, context, run};
    use tempfile::TempDir;

    #[test]
    fn status_reports_identity_and_address() {
        let dir = TempDir::new().unwrap();
        let ctx = context(&dir, "[peer]\nid = \"peer7\"\naddress = \"127.0.0.1:9051\"\n");
        let (outcome, out, _) = run(&ctx, &["peer", "node", "status"]);
        assert_eq!(outcome, ExitOutcome::Success);
        assert!(out.contains("Peer: peer7"));
        assert!(out.contains(&format!("MSP ID: {MSP_ID}")));
        assert!(out.contains(&format!("Node ID: {}", ctx.identity().node_id())));
        assert!(out.contains("Address: 127.0.0.1:9051"));
        assert!(out.contains("Worker threads: 2"));
    }

    #[test]
    fn bare_node_prints_its_help() {
        let dir = TempDir::new().unwrap();
        let ctx = context(&dir, "");
        let (outcome, out, _) = run(&ctx, &["peer", "node"]);
        assert_eq!(outcome, ExitOutcome::Success);
        assert!(out.contains("start"));
        assert!(out.contains("status"));
    }

    #[test]
    fn start_fails_on_unusable_address() {
        let dir = TempDir::new().unwrap();
        let ctx = context(&dir, "[peer]\naddress = \"not-an-address\"\n");
        let (outcome, _, err) = run(&ctx, &["peer", "node", "start"]);
        assert_eq!(outcome, ExitOutcome::Failure);
        assert!(err.contains("bind failed on not-an-address"));
    }

    #[tokio::test]
    async fn serve_accepts_until_cancelled() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let address = listener.local_addr().unwrap();
        let shutdown = CancellationToken::new();
        let task = tokio::spawn(serve(listener, shutdown.clone()));

        tokio::net::TcpStream::connect(address).await.unwrap();
        shutdown.cancel();
        task.await.unwrap();
    }
}
