//! Error types for compilation and dispatch.
//!
//! Compilation failures ([`CompileError`]) are fatal and stop at the first
//! problem. Dispatch failures ([`DispatchError`]) are ordinary results handed
//! back to the hosting program, which decides how to present them.

use thiserror::Error;

use crate::types::AttrKind;

/// Errors raised while lexing, parsing or resolving a declaration source.
///
/// Lexical and syntactic variants carry the 1-based source line; use
/// [`CompileError::line`] to read it without matching on every variant.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CompileError {
    /// Malformed token (unterminated string, bad number, stray character).
    #[error("line {line}: {message}")]
    Lex { line: usize, message: String },

    /// A token of the wrong shape where a specific one was required.
    #[error("line {line}: expected {expected}, found {found}")]
    Syntax {
        line: usize,
        expected: String,
        found: String,
    },

    /// A statement starting with something other than a known keyword.
    #[error("line {line}: unknown statement `{keyword}`")]
    UnknownStatement { line: usize, keyword: String },

    /// `arg` or `example` used before any `cmd`.
    #[error("line {line}: `{statement}` requires a current command")]
    MissingCommand { line: usize, statement: String },

    /// `text` used before any `topic`.
    #[error("line {line}: `text` requires a current topic")]
    MissingTopic { line: usize },

    /// `name` used while a command is selected.
    #[error("line {line}: `name` is only allowed outside of a command")]
    NameInsideCommand { line: usize },

    /// `name` used twice.
    #[error("line {line}: application name is already set")]
    DuplicateAppName { line: usize },

    /// Flag kind other than `bool` or `string`.
    #[error("line {line}: unknown flag kind `{kind}`, expected `bool` or `string`")]
    UnknownFlagKind { line: usize, kind: String },

    /// Short alias longer than one character.
    #[error("line {line}: short alias `{alias}` must be a single character")]
    InvalidShortAlias { line: usize, alias: String },

    /// Flag name or alias declared twice in one scope.
    #[error("line {line}: duplicate flag `{name}` in {scope}")]
    DuplicateFlag {
        line: usize,
        name: String,
        scope: String,
    },

    /// Flag clashing with the implicit `--help`/`-h`.
    #[error("line {line}: flag `{name}` is reserved for help")]
    ReservedFlag { line: usize, name: String },

    /// Topic declared twice.
    #[error("line {line}: duplicate topic `{name}`")]
    DuplicateTopic { line: usize, name: String },

    /// `attr` value that is not a bool, string or integer literal.
    #[error("line {line}: invalid value for attribute `{name}`: {found}")]
    InvalidAttributeValue {
        line: usize,
        name: String,
        found: String,
    },

    /// Same attribute declared with two different kinds.
    #[error("attribute `{name}` is declared as {first} and as {second}")]
    AttributeKindConflict {
        name: String,
        first: AttrKind,
        second: AttrKind,
    },

    /// Two command paths map to the same canonical identifier.
    #[error("commands `{first}` and `{second}` share the identifier `{identifier}`")]
    CanonicalNameCollision {
        first: String,
        second: String,
        identifier: String,
    },

    /// A leaf whose identifier is taken by the help operation.
    #[error("command `{path}` maps to `{identifier}`, which is reserved for the help operation")]
    ReservedIdentifier { path: String, identifier: String },

    /// A command path made only of separators.
    #[error("command `{path}` has no usable identifier")]
    EmptyIdentifier { path: String },

    /// Two parameters of one command share a name or short alias, counting
    /// the global flags every command inherits.
    #[error("command `{command}` declares `{name}` more than once among its flags, arguments and global flags")]
    DuplicateParameter { command: String, name: String },
}

impl CompileError {
    /// Returns the source line for line-numbered failures.
    ///
    /// # Examples
    ///
    /// ```
    /// use cmdtree_core::compile;
    ///
    /// let err = compile("cmd run\nbogus").unwrap_err();
    /// assert_eq!(err.line(), Some(2));
    /// ```
    pub fn line(&self) -> Option<usize> {
        match self {
            Self::Lex { line, .. }
            | Self::Syntax { line, .. }
            | Self::UnknownStatement { line, .. }
            | Self::MissingCommand { line, .. }
            | Self::MissingTopic { line }
            | Self::NameInsideCommand { line }
            | Self::DuplicateAppName { line }
            | Self::UnknownFlagKind { line, .. }
            | Self::InvalidShortAlias { line, .. }
            | Self::DuplicateFlag { line, .. }
            | Self::ReservedFlag { line, .. }
            | Self::DuplicateTopic { line, .. }
            | Self::InvalidAttributeValue { line, .. } => Some(*line),
            Self::AttributeKindConflict { .. }
            | Self::CanonicalNameCollision { .. }
            | Self::ReservedIdentifier { .. }
            | Self::EmptyIdentifier { .. }
            | Self::DuplicateParameter { .. } => None,
        }
    }
}

/// Classified failures from resolving an argument vector.
///
/// Every variant records the command path resolved before the failure, so
/// callers can scope their error output (for example, print usage for the
/// deepest command reached).
#[derive(Debug, Clone, PartialEq, Eq, Error, serde::Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DispatchError {
    /// No command matches the token.
    #[error("unknown command `{token}`")]
    UnknownCommand { token: String, resolved: Vec<String> },

    /// The token matches more than one command.
    #[error("ambiguous command `{token}`, candidates: {}", .candidates.join(", "))]
    AmbiguousCommand {
        token: String,
        candidates: Vec<String>,
        resolved: Vec<String>,
    },

    /// Flag-shaped token that no global or local flag accepts.
    #[error("unknown flag `{token}`")]
    UnknownFlag { token: String, resolved: Vec<String> },

    /// String flag given as the last token.
    #[error("flag `{flag}` requires a value")]
    MissingFlagValue { flag: String, resolved: Vec<String> },

    /// Fewer positional tokens than declared arguments.
    #[error("missing argument `{name}`")]
    MissingArgument { name: String, resolved: Vec<String> },

    /// More positional tokens than declared arguments.
    #[error("unexpected argument `{token}`")]
    SurplusArgument { token: String, resolved: Vec<String> },
}

impl DispatchError {
    /// Returns the path segments resolved before the failure.
    pub fn resolved_path(&self) -> &[String] {
        match self {
            Self::UnknownCommand { resolved, .. }
            | Self::AmbiguousCommand { resolved, .. }
            | Self::UnknownFlag { resolved, .. }
            | Self::MissingFlagValue { resolved, .. }
            | Self::MissingArgument { resolved, .. }
            | Self::SurplusArgument { resolved, .. } => resolved,
        }
    }
}
