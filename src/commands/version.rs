//! `peer version`.

use crate::command::{CommandNode, Invocation};

use super::{PeerContext, ROOT_NAME};

/// Shown when the binary was built outside a git checkout.
const DEVELOPMENT_BUILD: &str = "development build";

pub fn build() -> CommandNode<PeerContext> {
    CommandNode::new("version", "Print current version of the peer node.").run(
        |inv: &mut Invocation<'_, PeerContext>| {
            write!(inv.out(), "{}", info())?;
            Ok(())
        },
    )
}

/// Multi-line version block.
pub fn info() -> String {
    let commit = option_env!("PEER_COMMIT_SHA")
        .filter(|sha| !sha.is_empty())
        .unwrap_or(DEVELOPMENT_BUILD);

    format!(
        "{ROOT_NAME}:\n Version: {}\n Commit SHA: {commit}\n OS/Arch: {}/{}\n",
        env!("CARGO_PKG_VERSION"),
        std::env::consts::OS,
        std::env::consts::ARCH,
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn info_has_every_line() {
        let info = info();
        let lines: Vec<_> = info.lines().collect();
        assert_eq!(lines[0], "peer:");
        assert_eq!(lines[1], format!(" Version: {}", env!("CARGO_PKG_VERSION")));
        assert!(lines[2].starts_with(" Commit SHA: "));
        assert!(lines[3].contains(std::env::consts::ARCH));
    }
}
