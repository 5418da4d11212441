//! Dispatcher: parse argv against the command tree and run one node.
//!
//! # Order of execution
//!
//! 1. argv is parsed with clap; help requests are written to `out`, parse
//!    errors (with usage) to `err`.
//! 2. The matched chain is walked root → leaf and every `pre_run` hook on it
//!    runs in that order.
//! 3. The leaf body runs; a leaf without a body prints its help.
//!
//! A failing hook or body gets `Error: <msg>` plus usage written to `err`.
//! [`dispatch`] itself writes nothing: it only maps the result to an
//! [`ExitOutcome`].

use std::ffi::OsString;
use std::io::Write;
use std::process::ExitCode;

use clap::{ArgMatches, Command};

use crate::error::CommandError;

use super::node::CommandNode;

/// Terminal result of the process.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitOutcome {
    Success,
    Failure,
}

impl ExitOutcome {
    pub fn code(self) -> u8 {
        match self {
            Self::Success => 0,
            Self::Failure => 1,
        }
    }

    pub fn is_success(self) -> bool {
        self == Self::Success
    }
}

impl From<ExitOutcome> for ExitCode {
    fn from(outcome: ExitOutcome) -> Self {
        ExitCode::from(outcome.code())
    }
}

/// What a hook or body sees while it runs.
pub struct Invocation<'a, C> {
    ctx: &'a C,
    path: Vec<&'static str>,
    matches: &'a ArgMatches,
    help: String,
    out: &'a mut dyn Write,
}

impl<'a, C> Invocation<'a, C> {
    /// Dependencies shared by all commands.
    pub fn ctx(&self) -> &'a C {
        self.ctx
    }

    /// Command names from the root to the matched node.
    pub fn path(&self) -> &[&'static str] {
        &self.path
    }

    /// Parsed arguments of the matched node, persistent flags included.
    pub fn matches(&self) -> &'a ArgMatches {
        self.matches
    }

    /// Value of a boolean flag; `false` when the node has no such flag.
    pub fn flag(&self, id: &str) -> bool {
        self.matches
            .try_get_one::<bool>(id)
            .ok()
            .flatten()
            .copied()
            .unwrap_or(false)
    }

    /// Value of a string argument, if present.
    pub fn value(&self, id: &str) -> Option<&'a str> {
        self.matches
            .try_get_one::<String>(id)
            .ok()
            .flatten()
            .map(String::as_str)
    }

    /// Normal output stream.
    pub fn out(&mut self) -> &mut dyn Write {
        &mut *self.out
    }

    /// Write the matched node's help text to the output stream.
    pub fn print_help(&mut self) -> Result<(), CommandError> {
        write!(self.out, "{}", self.help)?;
        Ok(())
    }
}

/// Validated, immutable command tree.
pub struct CommandTree<C> {
    root: CommandNode<C>,
}

impl<C> CommandTree<C> {
    pub fn new(root: CommandNode<C>) -> Result<Self, CommandError> {
        root.validate()?;
        Ok(Self { root })
    }

    pub fn root(&self) -> &CommandNode<C> {
        &self.root
    }

    /// Parse `argv` (program name first) and run the matched node.
    pub fn execute<I, T>(
        &self,
        argv: I,
        ctx: &C,
        out: &mut dyn Write,
        err: &mut dyn Write,
    ) -> Result<(), CommandError>
    where
        I: IntoIterator<Item = T>,
        T: Into<OsString> + Clone,
    {
        let mut cmd = self.root.to_clap();
        let matches = match cmd.try_get_matches_from_mut(argv) {
            Ok(matches) => matches,
            Err(e) => return report_parse_error(e, out, err),
        };

        let mut chain = vec![&self.root];
        let mut path = vec![self.root.name()];
        let mut node = &self.root;
        let mut leaf = &matches;
        while let Some((name, sub)) = leaf.subcommand() {
            let Some(child) = node.child(name) else {
                break;
            };
            node = child;
            leaf = sub;
            chain.push(child);
            path.push(child.name());
        }

        let (help, usage) = render_help(&mut cmd, &path[1..]);
        let mut invocation = Invocation {
            ctx,
            path,
            matches: leaf,
            help,
            out,
        };

        for hook in chain.iter().filter_map(|n| n.hook()) {
            hook(&mut invocation).map_err(|e| report_failure(e, &usage, err))?;
        }

        match node.body() {
            Some(body) => body(&mut invocation),
            None => invocation.print_help(),
        }
        .map_err(|e| report_failure(e, &usage, err))
    }
}

/// Run `argv` against `tree` and reduce the result to an exit status.
pub fn dispatch<C, I, T>(
    tree: &CommandTree<C>,
    argv: I,
    ctx: &C,
    out: &mut dyn Write,
    err: &mut dyn Write,
) -> ExitOutcome
where
    I: IntoIterator<Item = T>,
    T: Into<OsString> + Clone,
{
    match tree.execute(argv, ctx, out, err) {
        Ok(()) => ExitOutcome::Success,
        Err(_) => ExitOutcome::Failure,
    }
}

fn report_parse_error(
    e: clap::Error,
    out: &mut dyn Write,
    err: &mut dyn Write,
) -> Result<(), CommandError> {
    // --help and `help <cmd>` come back as "errors" that belong on stdout.
    if !e.use_stderr() {
        write!(out, "{}", e.render())?;
        return Ok(());
    }
    write!(err, "{}", e.render())?;
    Err(CommandError::Usage(e.kind().to_string()))
}

fn report_failure(e: CommandError, usage: &str, err: &mut dyn Write) -> CommandError {
    let _ = writeln!(err, "Error: {e}");
    let _ = writeln!(err, "{usage}");
    e
}

/// Help and usage text of the subcommand at `path` below `cmd`.
fn render_help(cmd: &mut Command, path: &[&str]) -> (String, String) {
    if let Some((name, rest)) = path.split_first() {
        if let Some(sub) = cmd.find_subcommand_mut(name) {
            return render_help(sub, rest);
        }
    }
    (cmd.render_help().to_string(), cmd.render_usage().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;

    use clap::{Arg, ArgAction};

    /// Records which hooks and bodies ran, in order.
    #[derive(Default)]
    struct Trace(RefCell<Vec<String>>);

    impl Trace {
        fn push(&self, entry: impl Into<String>) {
            self.0.borrow_mut().push(entry.into());
        }

        fn entries(&self) -> Vec<String> {
            self.0.borrow().clone()
        }
    }

    fn tree() -> CommandTree<Trace> {
        let root = CommandNode::new("peer", "test root")
            .persistent_arg(
                Arg::new("version")
                    .short('v')
                    .long("version")
                    .action(ArgAction::SetTrue),
            )
            .pre_run(|inv: &mut Invocation<'_, Trace>| {
                inv.ctx().push("hook:peer");
                Ok(())
            })
            .run(|inv| {
                if inv.flag("version") {
                    inv.ctx().push("version");
                } else {
                    inv.ctx().push("help");
                    inv.print_help()?;
                }
                Ok(())
            })
            .subcommand(
                CommandNode::new("node", "node ops")
                    .pre_run(|inv: &mut Invocation<'_, Trace>| {
                        inv.ctx().push("hook:node");
                        Ok(())
                    })
                    .subcommand(CommandNode::new("start", "start").run(|inv: &mut Invocation<'_, Trace>| {
                        inv.ctx().push(format!("start:{}", inv.flag("version")));
                        Ok(())
                    }))
                    .subcommand(CommandNode::new("fail", "fails").run(|_| {
                        Err(CommandError::failed("boom"))
                    })),
            )
            .subcommand(CommandNode::new("echo", "echo").arg(Arg::new("text")).run(|inv: &mut Invocation<'_, Trace>| {
                let text = inv.value("text").unwrap_or_default().to_string();
                writeln!(inv.out(), "{text}")?;
                Ok(())
            }));
        CommandTree::new(root).unwrap()
    }

    fn run(argv: &[&str]) -> (ExitOutcome, Vec<String>, String, String) {
        let trace = Trace::default();
        let mut out = Vec::new();
        let mut err = Vec::new();
        let outcome = dispatch(&tree(), argv, &trace, &mut out, &mut err);
        (
            outcome,
            trace.entries(),
            String::from_utf8(out).unwrap(),
            String::from_utf8(err).unwrap(),
        )
    }

    #[test]
    fn hooks_run_root_to_leaf_before_body() {
        let (outcome, trace, _, _) = run(&["peer", "node", "start"]);
        assert_eq!(outcome, ExitOutcome::Success);
        assert_eq!(trace, vec!["hook:peer", "hook:node", "start:false"]);
    }

    #[test]
    fn persistent_flag_reaches_leaf() {
        let (_, trace, _, _) = run(&["peer", "node", "start", "-v"]);
        assert_eq!(trace.last().map(String::as_str), Some("start:true"));
    }

    #[test]
    fn bare_root_prints_help() {
        let (outcome, trace, out, _) = run(&["peer"]);
        assert_eq!(outcome, ExitOutcome::Success);
        assert_eq!(trace, vec!["hook:peer", "help"]);
        assert!(out.contains("Usage: peer"));
    }

    #[test]
    fn root_version_flag() {
        let (outcome, trace, out, _) = run(&["peer", "-v"]);
        assert_eq!(outcome, ExitOutcome::Success);
        assert_eq!(trace, vec!["hook:peer", "version"]);
        assert!(out.is_empty());
    }

    #[test]
    fn node_without_body_prints_its_help() {
        let (outcome, trace, out, _) = run(&["peer", "node"]);
        assert_eq!(outcome, ExitOutcome::Success);
        assert_eq!(trace, vec!["hook:peer", "hook:node"]);
        assert!(out.contains("start"));
    }

    #[test]
    fn help_flag_goes_to_out() {
        let (outcome, trace, out, err) = run(&["peer", "--help"]);
        assert_eq!(outcome, ExitOutcome::Success);
        assert!(trace.is_empty());
        assert!(out.contains("Usage:"));
        assert!(err.is_empty());
    }

    #[test]
    fn unknown_subcommand_fails_without_running_anything() {
        let (outcome, trace, out, err) = run(&["peer", "bogus"]);
        assert_eq!(outcome, ExitOutcome::Failure);
        assert!(trace.is_empty());
        assert!(out.is_empty());
        assert!(err.contains("bogus"));
    }

    #[test]
    fn body_error_reports_and_fails() {
        let (outcome, trace, _, err) = run(&["peer", "node", "fail"]);
        assert_eq!(outcome, ExitOutcome::Failure);
        assert_eq!(trace, vec!["hook:peer", "hook:node"]);
        assert!(err.contains("Error: boom"));
        assert!(err.contains("Usage: peer node fail"));
    }

    #[test]
    fn body_writes_to_out() {
        let (_, _, out, _) = run(&["peer", "echo", "hello"]);
        assert_eq!(out, "hello\n");
    }

    #[test]
    fn exit_codes() {
        assert_eq!(ExitOutcome::Success.code(), 0);
        assert_eq!(ExitOutcome::Failure.code(), 1);
        assert!(ExitOutcome::Success.is_success());
    }
}
