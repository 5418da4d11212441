//! Command descriptors.
//!
//! A [`CommandNode`] is plain data: name, help text, flags, an optional
//! pre-run hook, an optional body and its children. Nodes are assembled once
//! by factory functions and only read afterwards.

use std::collections::HashSet;

use clap::{Arg, Command};

use crate::error::CommandError;

use super::dispatch::Invocation;

/// Hook or body of a command. Receives the dispatch context through the
/// [`Invocation`].
pub type Handler<C> =
    Box<dyn Fn(&mut Invocation<'_, C>) -> Result<(), CommandError> + Send + Sync>;

pub struct CommandNode<C> {
    name: &'static str,
    about: &'static str,
    args: Vec<Arg>,
    pre_run: Option<Handler<C>>,
    run: Option<Handler<C>>,
    children: Vec<CommandNode<C>>,
}

impl<C> CommandNode<C> {
    pub fn new(name: &'static str, about: &'static str) -> Self {
        Self {
            name,
            about,
            args: Vec::new(),
            pre_run: None,
            run: None,
            children: Vec::new(),
        }
    }

    /// Flag or positional local to this node.
    pub fn arg(mut self, arg: Arg) -> Self {
        self.args.push(arg);
        self
    }

    /// Flag inherited by every descendant.
    pub fn persistent_arg(self, arg: Arg) -> Self {
        self.arg(arg.global(true))
    }

    /// Hook run before the body of this node or of any descendant.
    pub fn pre_run<F>(mut self, hook: F) -> Self
    where
        F: Fn(&mut Invocation<'_, C>) -> Result<(), CommandError> + Send + Sync + 'static,
    {
        self.pre_run = Some(Box::new(hook));
        self
    }

    /// Body run when this node is the deepest match.
    pub fn run<F>(mut self, body: F) -> Self
    where
        F: Fn(&mut Invocation<'_, C>) -> Result<(), CommandError> + Send + Sync + 'static,
    {
        self.run = Some(Box::new(body));
        self
    }

    pub fn subcommand(mut self, child: CommandNode<C>) -> Self {
        self.children.push(child);
        self
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn about(&self) -> &'static str {
        self.about
    }

    pub fn children(&self) -> &[CommandNode<C>] {
        &self.children
    }

    pub fn child(&self, name: &str) -> Option<&CommandNode<C>> {
        self.children.iter().find(|c| c.name == name)
    }

    pub(crate) fn hook(&self) -> Option<&Handler<C>> {
        self.pre_run.as_ref()
    }

    pub(crate) fn body(&self) -> Option<&Handler<C>> {
        self.run.as_ref()
    }

    /// Sibling names must be unique at every level.
    pub(crate) fn validate(&self) -> Result<(), CommandError> {
        let mut seen = HashSet::new();
        for child in &self.children {
            if !seen.insert(child.name) {
                return Err(CommandError::DuplicateName {
                    parent: self.name.to_string(),
                    name: child.name.to_string(),
                });
            }
            child.validate()?;
        }
        Ok(())
    }

    /// Parser view of this subtree.
    pub(crate) fn to_clap(&self) -> Command {
        Command::new(self.name)
            .about(self.about)
            .disable_version_flag(true)
            .args(self.args.iter().cloned())
            .subcommands(self.children.iter().map(CommandNode::to_clap))
    }
}
