//! Argument dispatch against a resolved command tree.
//!
//! Dispatch runs in three passes over the argument vector:
//!
//! 1. Global flags (including the implicit `--help`/`-h`) are pulled out
//!    wherever they appear.
//! 2. The remaining leading tokens are resolved to a command path. Exact
//!    names win, then unique prefixes among siblings. The first token may
//!    also name a command deeper in the tree when that name is unique
//!    tree-wide (command omission).
//! 3. The tokens after the path are bound to the command's flags and
//!    positional arguments. Flags may appear anywhere among the positionals.
//!
//! When help is requested the result is a [`HelpRequest`] scoped to the
//! deepest command reached, and binding is skipped.
//!
//! # Examples
//!
//! ```
//! use cmdtree_core::{compile, dispatch, Action};
//!
//! let tree = compile(r#"
//! flag verbose bool "Chatty output" v
//! cmd project init "Create a project"
//! arg name string "Project name"
//! flag bare bool "Skip templates"
//! "#).unwrap();
//!
//! // `init` is unique in the tree, so `project` can be left out.
//! let Action::Run(run) = dispatch(&tree, &["init", "demo", "--bare", "-v"]).unwrap() else {
//!     panic!("expected a runnable command");
//! };
//! assert_eq!(run.path, vec!["project", "init"]);
//! assert_eq!(run.arg("name"), Some("demo"));
//! assert!(run.is_set("bare"));
//! assert!(run.global_is_set("verbose"));
//! ```

use std::collections::BTreeMap;

use serde::Serialize;
use tracing::debug;

use crate::error::DispatchError;
use crate::resolve::ResolvedTree;
use crate::types::{CommandId, Declaration, Flag, FlagKind, HELP_FLAG};

type Result<T> = std::result::Result<T, DispatchError>;

/// Bound value of a flag.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum FlagValue {
    Bool(bool),
    Str(String),
}

impl FlagValue {
    /// Value of a flag that was not given on the command line.
    pub fn zero(kind: FlagKind) -> Self {
        match kind {
            FlagKind::Bool => Self::Bool(false),
            FlagKind::String => Self::Str(String::new()),
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(value) => Some(*value),
            Self::Str(_) => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Str(value) => Some(value),
            Self::Bool(_) => None,
        }
    }
}

/// Positional argument bound to a token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BoundArg {
    pub name: String,
    pub value: String,
}

/// A leaf command with its fully bound parameter bundle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Invocation {
    pub command: CommandId,
    pub path: Vec<String>,
    /// Identifier of the handler operation for this command.
    pub canonical: String,
    /// Every local flag, set or defaulted.
    pub flags: BTreeMap<String, FlagValue>,
    /// Positional arguments in declaration order.
    pub args: Vec<BoundArg>,
    /// Every global flag, set or defaulted.
    pub globals: BTreeMap<String, FlagValue>,
}

impl Invocation {
    pub fn flag(&self, name: &str) -> Option<&FlagValue> {
        self.flags.get(name)
    }

    /// True when a local bool flag was given.
    pub fn is_set(&self, name: &str) -> bool {
        self.flag(name).and_then(FlagValue::as_bool).unwrap_or(false)
    }

    pub fn string_flag(&self, name: &str) -> Option<&str> {
        self.flag(name).and_then(FlagValue::as_str)
    }

    pub fn arg(&self, name: &str) -> Option<&str> {
        self.args
            .iter()
            .find(|arg| arg.name == name)
            .map(|arg| arg.value.as_str())
    }

    pub fn global(&self, name: &str) -> Option<&FlagValue> {
        self.globals.get(name)
    }

    /// True when a global bool flag was given.
    pub fn global_is_set(&self, name: &str) -> bool {
        self.global(name).and_then(FlagValue::as_bool).unwrap_or(false)
    }
}

/// What a help request refers to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum HelpTarget {
    Root,
    Command { id: CommandId, path: Vec<String> },
    Topic { name: String },
}

/// Help action produced instead of running a command.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HelpRequest {
    pub target: HelpTarget,
    pub globals: BTreeMap<String, FlagValue>,
}

/// Outcome of a successful dispatch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "action", content = "detail", rename_all = "snake_case")]
pub enum Action {
    Run(Invocation),
    Help(HelpRequest),
}

/// Resolves an argument vector (without the program name) against a tree.
pub fn dispatch<S: AsRef<str>>(tree: &ResolvedTree, argv: &[S]) -> Result<Action> {
    let argv: Vec<&str> = argv.iter().map(AsRef::as_ref).collect();
    let decl = tree.declaration();

    let (globals, rest) = extract_globals(tree.global_flags(), &argv)?;
    let help = globals
        .get(HELP_FLAG)
        .and_then(FlagValue::as_bool)
        .unwrap_or(false);

    let (node, consumed) = match resolve_path(decl, &rest) {
        Ok(walk) => walk,
        Err(DispatchError::UnknownCommand { token, resolved }) if help && resolved.is_empty() => {
            if decl.find_topic(&token).is_some() {
                return Ok(Action::Help(HelpRequest {
                    target: HelpTarget::Topic { name: token },
                    globals,
                }));
            }
            return Err(DispatchError::UnknownCommand { token, resolved });
        }
        Err(err) => return Err(err),
    };
    let resolved = owned_path(decl, node);

    if help {
        let target = match node {
            Some(id) => HelpTarget::Command { id, path: resolved },
            None => HelpTarget::Root,
        };
        return Ok(Action::Help(HelpRequest { target, globals }));
    }

    let leftover = &rest[consumed..];
    let id = match node {
        Some(id) if decl.command(id).is_leaf() => id,
        _ => {
            // Only leaves execute; a bare group shows its help.
            return match leftover.first() {
                Some(token) if is_flag_shaped(token) => Err(DispatchError::UnknownFlag {
                    token: token.to_string(),
                    resolved,
                }),
                Some(token) => Err(DispatchError::UnknownCommand {
                    token: token.to_string(),
                    resolved,
                }),
                None => Ok(Action::Help(HelpRequest {
                    target: node.map_or(HelpTarget::Root, |id| HelpTarget::Command {
                        id,
                        path: resolved,
                    }),
                    globals,
                })),
            };
        }
    };

    let (flags, args) = bind(decl, id, leftover, &resolved)?;
    debug!(command = %resolved.join(" "), "dispatched");

    Ok(Action::Run(Invocation {
        command: id,
        canonical: tree.canonical_name(id).to_string(),
        path: resolved,
        flags,
        args,
        globals,
    }))
}

impl ResolvedTree {
    /// Shorthand for [`dispatch`].
    pub fn dispatch<S: AsRef<str>>(&self, argv: &[S]) -> Result<Action> {
        dispatch(self, argv)
    }
}

fn is_flag_shaped(token: &str) -> bool {
    token.len() > 1 && token.starts_with('-')
}

fn owned_path(decl: &Declaration, node: Option<CommandId>) -> Vec<String> {
    node.map(|id| decl.path(id).into_iter().map(String::from).collect())
        .unwrap_or_default()
}

/// Removes global flags from anywhere in the vector.
fn extract_globals<'a>(
    global_flags: &[Flag],
    argv: &[&'a str],
) -> Result<(BTreeMap<String, FlagValue>, Vec<&'a str>)> {
    let mut values: BTreeMap<String, FlagValue> = global_flags
        .iter()
        .map(|flag| (flag.name.clone(), FlagValue::zero(flag.kind)))
        .collect();
    let mut rest = Vec::with_capacity(argv.len());

    let mut tokens = argv.iter().copied();
    while let Some(token) = tokens.next() {
        let Some(flag) = global_flags.iter().find(|flag| flag.matches(token)) else {
            rest.push(token);
            continue;
        };
        let value = take_value(flag, token, &mut tokens, &[])?;
        values.insert(flag.name.clone(), value);
    }
    Ok((values, rest))
}

fn take_value<'a>(
    flag: &Flag,
    token: &str,
    tokens: &mut impl Iterator<Item = &'a str>,
    resolved: &[String],
) -> Result<FlagValue> {
    match flag.kind {
        FlagKind::Bool => Ok(FlagValue::Bool(true)),
        FlagKind::String => tokens
            .next()
            .map(|value| FlagValue::Str(value.to_string()))
            .ok_or_else(|| DispatchError::MissingFlagValue {
                flag: token.to_string(),
                resolved: resolved.to_vec(),
            }),
    }
}

enum ChildMatch {
    One(CommandId),
    Many(Vec<CommandId>),
    Nothing,
}

fn match_child(decl: &Declaration, children: &[CommandId], token: &str) -> ChildMatch {
    if let Some(exact) = children
        .iter()
        .copied()
        .find(|id| decl.command(*id).name == token)
    {
        return ChildMatch::One(exact);
    }
    if token.is_empty() {
        return ChildMatch::Nothing;
    }
    let mut prefixed: Vec<CommandId> = children
        .iter()
        .copied()
        .filter(|id| decl.command(*id).name.starts_with(token))
        .collect();
    match prefixed.len() {
        0 => ChildMatch::Nothing,
        1 => ChildMatch::One(prefixed.remove(0)),
        _ => ChildMatch::Many(prefixed),
    }
}

/// Walks leading tokens down the tree, returning the deepest command
/// reached (`None` for the root) and how many tokens it took.
fn resolve_path(decl: &Declaration, tokens: &[&str]) -> Result<(Option<CommandId>, usize)> {
    let mut node = None;
    let mut consumed = 0;

    while let Some(&token) = tokens.get(consumed) {
        let children = decl.children(node);
        if children.is_empty() || is_flag_shaped(token) {
            break;
        }
        let next = match match_child(decl, children, token) {
            ChildMatch::One(id) => id,
            ChildMatch::Many(ids) => {
                return Err(DispatchError::AmbiguousCommand {
                    token: token.to_string(),
                    candidates: ids
                        .iter()
                        .map(|id| decl.command(*id).name.clone())
                        .collect(),
                    resolved: owned_path(decl, node),
                });
            }
            ChildMatch::Nothing if consumed == 0 => find_anywhere(decl, token)?,
            ChildMatch::Nothing => break,
        };
        node = Some(next);
        consumed += 1;
    }

    Ok((node, consumed))
}

/// Command omission: finds a command by name at any depth.
fn find_anywhere(decl: &Declaration, token: &str) -> Result<CommandId> {
    let exact: Vec<CommandId> = decl
        .commands()
        .filter(|(_, cmd)| cmd.name == token)
        .map(|(id, _)| id)
        .collect();
    let mut candidates = if exact.is_empty() && !token.is_empty() {
        decl.commands()
            .filter(|(_, cmd)| cmd.name.starts_with(token))
            .map(|(id, _)| id)
            .collect()
    } else {
        exact
    };
    candidates.sort_by(|a, b| decl.path(*a).cmp(&decl.path(*b)));

    match candidates.as_slice() {
        [] => Err(DispatchError::UnknownCommand {
            token: token.to_string(),
            resolved: Vec::new(),
        }),
        [only] => {
            debug!(token, command = %decl.full_path(*only), "resolved by command omission");
            Ok(*only)
        }
        many => Err(DispatchError::AmbiguousCommand {
            token: token.to_string(),
            candidates: many.iter().map(|id| decl.full_path(*id)).collect(),
            resolved: Vec::new(),
        }),
    }
}

/// Binds the tokens after the command path to local flags and positional
/// arguments.
fn bind(
    decl: &Declaration,
    id: CommandId,
    tokens: &[&str],
    resolved: &[String],
) -> Result<(BTreeMap<String, FlagValue>, Vec<BoundArg>)> {
    let cmd = decl.command(id);
    let mut flags: BTreeMap<String, FlagValue> = cmd
        .flags
        .iter()
        .map(|flag| (flag.name.clone(), FlagValue::zero(flag.kind)))
        .collect();
    let mut positionals = Vec::new();

    let mut iter = tokens.iter().copied();
    while let Some(token) = iter.next() {
        if !is_flag_shaped(token) {
            positionals.push(token);
            continue;
        }
        let Some(flag) = cmd.find_flag(token) else {
            return Err(DispatchError::UnknownFlag {
                token: token.to_string(),
                resolved: resolved.to_vec(),
            });
        };
        let value = take_value(flag, token, &mut iter, resolved)?;
        flags.insert(flag.name.clone(), value);
    }

    if let Some(extra) = positionals.get(cmd.args.len()) {
        return Err(DispatchError::SurplusArgument {
            token: extra.to_string(),
            resolved: resolved.to_vec(),
        });
    }
    if let Some(missing) = cmd.args.get(positionals.len()) {
        return Err(DispatchError::MissingArgument {
            name: missing.name.clone(),
            resolved: resolved.to_vec(),
        });
    }

    let args = cmd
        .args
        .iter()
        .zip(positionals)
        .map(|(arg, value)| BoundArg {
            name: arg.name.clone(),
            value: value.to_string(),
        })
        .collect();
    Ok((flags, args))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compile;

    fn sample() -> ResolvedTree {
        compile(
            r#"
flag verbose bool "Chatty output" v
flag profile string "Profile name" p
cmd add "Add an item"
arg name string "Item name"
flag force bool "Overwrite" f
flag tag string "Tag to apply" t
cmd status "Show status"
cmd start "Start the service"
cmd remote add-url "Add a remote"
arg url string "Remote URL"
cmd remote list "List remotes"
topic auth "Authentication"
text "Use tokens."
"#,
        )
        .unwrap()
    }

    fn run(tree: &ResolvedTree, argv: &[&str]) -> Invocation {
        match dispatch(tree, argv).unwrap() {
            Action::Run(invocation) => invocation,
            other => panic!("expected run, got {other:?}"),
        }
    }

    fn help(tree: &ResolvedTree, argv: &[&str]) -> HelpTarget {
        match dispatch(tree, argv).unwrap() {
            Action::Help(request) => request.target,
            other => panic!("expected help, got {other:?}"),
        }
    }

    #[test]
    fn test_flag_position_is_irrelevant() {
        let tree = sample();
        let before = run(&tree, &["add", "--force", "alice"]);
        let after = run(&tree, &["add", "alice", "--force"]);
        assert_eq!(before, after);
        assert!(before.is_set("force"));
        assert_eq!(before.arg("name"), Some("alice"));
    }

    #[test]
    fn test_global_flag_anywhere() {
        let tree = sample();
        for argv in [
            ["--verbose", "add", "alice"],
            ["add", "--verbose", "alice"],
            ["add", "alice", "--verbose"],
        ] {
            let invocation = run(&tree, &argv);
            assert_eq!(invocation.path, vec!["add"]);
            assert!(invocation.global_is_set("verbose"));
        }
    }

    #[test]
    fn test_string_flags_take_next_token() {
        let tree = sample();
        let invocation = run(&tree, &["-p", "prod", "add", "-t", "v1", "bob"]);
        assert_eq!(
            invocation.global("profile"),
            Some(&FlagValue::Str("prod".into()))
        );
        assert_eq!(invocation.string_flag("tag"), Some("v1"));
        assert_eq!(invocation.arg("name"), Some("bob"));
    }

    #[test]
    fn test_unset_flags_default_to_zero_values() {
        let tree = sample();
        let invocation = run(&tree, &["add", "x"]);
        assert_eq!(invocation.flag("force"), Some(&FlagValue::Bool(false)));
        assert_eq!(invocation.string_flag("tag"), Some(""));
        assert_eq!(invocation.global("profile"), Some(&FlagValue::Str(String::new())));
        assert_eq!(invocation.global("help"), Some(&FlagValue::Bool(false)));
    }

    #[test]
    fn test_unique_prefix_resolves() {
        let tree = sample();
        assert_eq!(run(&tree, &["a", "x"]).path, vec!["add"]);
        assert_eq!(run(&tree, &["star"]).path, vec!["start"]);
        assert_eq!(run(&tree, &["r", "l"]).path, vec!["remote", "list"]);
    }

    #[test]
    fn test_ambiguous_prefix_lists_siblings() {
        let tree = sample();
        let err = dispatch(&tree, &["st"]).unwrap_err();
        assert_eq!(
            err,
            DispatchError::AmbiguousCommand {
                token: "st".into(),
                candidates: vec!["status".into(), "start".into()],
                resolved: vec![],
            }
        );
    }

    #[test]
    fn test_command_omission() {
        let tree = sample();
        let invocation = run(&tree, &["list"]);
        assert_eq!(invocation.path, vec!["remote", "list"]);
        assert_eq!(invocation.canonical, "RemoteList");

        let invocation = run(&tree, &["add-url", "https://x"]);
        assert_eq!(invocation.path, vec!["remote", "add-url"]);
    }

    #[test]
    fn test_omission_prefers_exact_over_prefix() {
        let tree = compile("cmd a init\ncmd b initialize").unwrap();
        assert_eq!(run(&tree, &["init"]).path, vec!["a", "init"]);
        assert_eq!(run(&tree, &["initi"]).path, vec!["b", "initialize"]);
    }

    #[test]
    fn test_omission_ambiguity_lists_full_paths() {
        let tree = compile("cmd x run\ncmd y run").unwrap();
        let err = dispatch(&tree, &["run"]).unwrap_err();
        assert_eq!(
            err,
            DispatchError::AmbiguousCommand {
                token: "run".into(),
                candidates: vec!["x run".into(), "y run".into()],
                resolved: vec![],
            }
        );
    }

    #[test]
    fn test_omission_prefix_ambiguity_spans_depths() {
        let tree = compile("cmd tools install\ncmd tools extra inspect").unwrap();
        let err = dispatch(&tree, &["ins"]).unwrap_err();
        assert_eq!(
            err,
            DispatchError::AmbiguousCommand {
                token: "ins".into(),
                candidates: vec!["tools extra inspect".into(), "tools install".into()],
                resolved: vec![],
            }
        );
        assert_eq!(run(&tree, &["inst"]).path, vec!["tools", "install"]);
    }

    #[test]
    fn test_omission_onto_group_keeps_descending() {
        let tree = compile("cmd a remote add\narg name string \"Remote name\"\ncmd a remote drop").unwrap();
        let invocation = run(&tree, &["remote", "add", "origin"]);
        assert_eq!(invocation.path, vec!["a", "remote", "add"]);
        assert_eq!(invocation.arg("name"), Some("origin"));
        assert_eq!(run(&tree, &["remote", "d"]).path, vec!["a", "remote", "drop"]);

        assert_eq!(help(&tree, &["remote"]), HelpTarget::Command {
            id: tree.find(&["a", "remote"]).unwrap(),
            path: vec!["a".into(), "remote".into()],
        });
    }

    #[test]
    fn test_unknown_command() {
        let tree = sample();
        assert_eq!(
            dispatch(&tree, &["bogus"]).unwrap_err(),
            DispatchError::UnknownCommand {
                token: "bogus".into(),
                resolved: vec![],
            }
        );
    }

    #[test]
    fn test_omission_not_retried_mid_path() {
        let tree = sample();
        let err = dispatch(&tree, &["remote", "status"]).unwrap_err();
        assert_eq!(
            err,
            DispatchError::UnknownCommand {
                token: "status".into(),
                resolved: vec!["remote".into()],
            }
        );
    }

    #[test]
    fn test_missing_and_surplus_arguments() {
        let tree = sample();
        assert_eq!(
            dispatch(&tree, &["add"]).unwrap_err(),
            DispatchError::MissingArgument {
                name: "name".into(),
                resolved: vec!["add".into()],
            }
        );
        assert_eq!(
            dispatch(&tree, &["add", "a", "b"]).unwrap_err(),
            DispatchError::SurplusArgument {
                token: "b".into(),
                resolved: vec!["add".into()],
            }
        );
    }

    #[test]
    fn test_missing_flag_value_at_end() {
        let tree = sample();
        assert_eq!(
            dispatch(&tree, &["add", "x", "--tag"]).unwrap_err(),
            DispatchError::MissingFlagValue {
                flag: "--tag".into(),
                resolved: vec!["add".into()],
            }
        );
        assert_eq!(
            dispatch(&tree, &["add", "x", "--profile"]).unwrap_err(),
            DispatchError::MissingFlagValue {
                flag: "--profile".into(),
                resolved: vec![],
            }
        );
    }

    #[test]
    fn test_unknown_flag() {
        let tree = sample();
        assert_eq!(
            dispatch(&tree, &["status", "--nope"]).unwrap_err(),
            DispatchError::UnknownFlag {
                token: "--nope".into(),
                resolved: vec!["status".into()],
            }
        );
    }

    #[test]
    fn test_lone_dash_is_positional() {
        let tree = sample();
        assert_eq!(run(&tree, &["add", "-"]).arg("name"), Some("-"));
    }

    #[test]
    fn test_help_scopes_to_reached_command() {
        let tree = sample();
        assert_eq!(help(&tree, &["--help"]), HelpTarget::Root);
        assert_eq!(help(&tree, &["-h", "add"]), HelpTarget::Command {
            id: tree.find(&["add"]).unwrap(),
            path: vec!["add".into()],
        });
        // Argument validation is bypassed.
        assert!(matches!(
            help(&tree, &["add", "a", "b", "c", "-h"]),
            HelpTarget::Command { .. }
        ));
    }

    #[test]
    fn test_help_for_topic() {
        let tree = sample();
        assert_eq!(help(&tree, &["auth", "--help"]), HelpTarget::Topic {
            name: "auth".into()
        });
        assert!(dispatch(&tree, &["auth"]).is_err());
    }

    #[test]
    fn test_group_without_subcommand_shows_help() {
        let tree = sample();
        assert_eq!(help(&tree, &[]), HelpTarget::Root);
        assert_eq!(help(&tree, &["remote"]), HelpTarget::Command {
            id: tree.find(&["remote"]).unwrap(),
            path: vec!["remote".into()],
        });
        assert_eq!(
            dispatch(&tree, &["remote", "--x"]).unwrap_err(),
            DispatchError::UnknownFlag {
                token: "--x".into(),
                resolved: vec!["remote".into()],
            }
        );
    }
}
