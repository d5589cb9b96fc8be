//! Command tree compiler and argument dispatcher.
//!
//! This crate compiles a small declaration language describing a
//! command-line interface into a validated tree, and resolves argument
//! vectors against that tree at run time:
//!
//! - [`lexer`] / [`parse`]: declaration source to [`Declaration`].
//! - [`resolve`]: attribute kind checks, canonical names, leaf ordering,
//!   producing a [`ResolvedTree`].
//! - [`dispatch`]: argument vector to an [`Action`] (run a leaf with bound
//!   parameters, or show help), or a classified [`DispatchError`].
//! - [`help`]: plain-text help for commands and topics.
//! - [`contract`]: serializable data contract for code emitters.
//!
//! # Declaration language
//!
//! ```text
//! name "todo" "Track things"          # app identity
//! flag verbose bool "Chatty" v        # global flag (no current command)
//! attr audit = false                  # global attribute default
//!
//! cmd list "List items"               # creates/selects a command
//! flag all bool "Include done items" a
//!
//! cmd item add "Add an item"          # nested path, parents created
//! arg title string "Item title"
//! attr audit = true                   # local override
//! example "todo item add 'buy milk'"
//!
//! topic filters "Filter syntax"
//! text """
//!   Multi-line body.
//! """
//! ```
//!
//! # Example
//!
//! ```
//! use cmdtree_core::{compile, Action};
//!
//! let tree = compile(r#"
//! flag verbose bool "Chatty output" v
//! cmd add "Add an item"
//! arg name string "Item name"
//! flag force bool "Overwrite"
//! "#).unwrap();
//!
//! match tree.dispatch(&["add", "alice", "--force"]).unwrap() {
//!     Action::Run(run) => {
//!         assert_eq!(run.canonical, "Add");
//!         assert_eq!(run.arg("name"), Some("alice"));
//!         assert!(run.is_set("force"));
//!     }
//!     Action::Help(_) => unreachable!(),
//! }
//! ```

pub mod contract;
mod dispatch;
mod error;
pub mod help;
pub mod lexer;
mod parser;
mod resolve;
mod types;

pub use dispatch::{Action, BoundArg, FlagValue, HelpRequest, HelpTarget, Invocation, dispatch};
pub use error::{CompileError, DispatchError};
pub use parser::{Parser, parse};
pub use resolve::{ResolvedTree, canonical_name, resolve};
pub use types::*;

/// Parses and resolves a declaration source in one step.
///
/// # Examples
///
/// ```
/// use cmdtree_core::compile;
///
/// let tree = compile("cmd build\ncmd test").unwrap();
/// assert_eq!(tree.leaves().len(), 2);
///
/// let err = compile("attr x = 1\ncmd a\nattr x = true").unwrap_err();
/// assert!(err.to_string().contains("int"));
/// ```
pub fn compile(src: &str) -> Result<ResolvedTree, CompileError> {
    resolve(parse(src)?)
}
