//! Command tree framework.
//!
//! [`CommandNode`] describes one invocable command; [`CommandTree`] holds a
//! validated root and runs argv against it. The framework knows nothing about
//! the peer: the dispatch context type `C` is supplied by the caller.

mod dispatch;
mod node;

pub use dispatch::{CommandTree, ExitOutcome, Invocation, dispatch};
pub use node::{CommandNode, Handler};
