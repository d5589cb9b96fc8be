//! Declaration tree data model.
//!
//! Commands live in an arena owned by [`Declaration`] and refer to each other
//! through [`CommandId`] indices, so the parent back-reference needs no
//! shared ownership. The tree is built once by the parser, checked once by
//! the resolver, and read-only afterwards.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Name of the implicit global help flag.
pub const HELP_FLAG: &str = "help";

/// Short alias of the implicit global help flag.
pub const HELP_SHORT: char = 'h';

/// Stable index of a command inside a [`Declaration`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CommandId(pub(crate) usize);

impl CommandId {
    /// Position of the command in the arena.
    pub fn index(self) -> usize {
        self.0
    }
}

/// Kind of value a flag accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FlagKind {
    /// Presence flag, no value.
    Bool,
    /// Consumes the next token as its value.
    String,
}

impl FlagKind {
    /// Returns the keyword used in declaration sources.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Bool => "bool",
            Self::String => "string",
        }
    }
}

impl FromStr for FlagKind {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "bool" => Ok(Self::Bool),
            "string" => Ok(Self::String),
            _ => Err(()),
        }
    }
}

impl fmt::Display for FlagKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A flag declared globally or on a command.
///
/// # Examples
///
/// ```
/// use cmdtree_core::{Flag, FlagKind};
///
/// let flag = Flag::new("verbose", FlagKind::Bool).with_short('v');
/// assert!(flag.matches("--verbose"));
/// assert!(flag.matches("-v"));
/// assert!(!flag.matches("-verbose"));
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Flag {
    /// Long name, matched as `--name`.
    pub name: String,
    /// Optional one-character alias, matched as `-x`.
    pub short: Option<char>,
    pub kind: FlagKind,
    pub description: String,
}

impl Flag {
    /// Creates a flag with no alias and an empty description.
    pub fn new(name: &str, kind: FlagKind) -> Self {
        Self {
            name: name.to_string(),
            short: None,
            kind,
            description: String::new(),
        }
    }

    /// Adds a short alias.
    pub fn with_short(mut self, short: char) -> Self {
        self.short = Some(short);
        self
    }

    /// Adds a description.
    pub fn with_description(mut self, description: &str) -> Self {
        self.description = description.to_string();
        self
    }

    /// The implicit `--help`/`-h` flag every tree carries.
    pub fn help() -> Self {
        Self::new(HELP_FLAG, FlagKind::Bool)
            .with_short(HELP_SHORT)
            .with_description("Show help")
    }

    /// Checks whether a command-line token spells this flag.
    pub fn matches(&self, token: &str) -> bool {
        if let Some(long) = token.strip_prefix("--") {
            return long == self.name;
        }
        match (token.strip_prefix('-'), self.short) {
            (Some(rest), Some(short)) => {
                let mut chars = rest.chars();
                chars.next() == Some(short) && chars.next().is_none()
            }
            _ => false,
        }
    }
}

/// Positional argument of a command.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Arg {
    pub name: String,
    /// Advisory kind, never enforced at dispatch time.
    pub kind: String,
    pub description: String,
}

/// Kind of an attribute value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AttrKind {
    Bool,
    String,
    Int,
}

impl AttrKind {
    /// Zero value used when an attribute is declared somewhere but neither
    /// the command nor the global section sets it.
    pub fn zero(self) -> AttrValue {
        match self {
            Self::Bool => AttrValue::Bool(false),
            Self::String => AttrValue::Str(String::new()),
            Self::Int => AttrValue::Int(0),
        }
    }
}

impl fmt::Display for AttrKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Bool => "bool",
            Self::String => "string",
            Self::Int => "int",
        })
    }
}

/// Typed attribute value.
///
/// # Examples
///
/// ```
/// use cmdtree_core::{AttrKind, AttrValue};
///
/// assert_eq!(AttrValue::Int(3).kind(), AttrKind::Int);
/// assert_eq!(AttrKind::Bool.zero(), AttrValue::Bool(false));
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AttrValue {
    Bool(bool),
    Str(String),
    Int(i64),
}

impl AttrValue {
    pub fn kind(&self) -> AttrKind {
        match self {
            Self::Bool(_) => AttrKind::Bool,
            Self::Str(_) => AttrKind::String,
            Self::Int(_) => AttrKind::Int,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(value) => Some(*value),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Str(value) => Some(value),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            Self::Int(value) => Some(*value),
            _ => None,
        }
    }
}

impl fmt::Display for AttrValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bool(value) => write!(f, "{value}"),
            Self::Str(value) => write!(f, "{value:?}"),
            Self::Int(value) => write!(f, "{value}"),
        }
    }
}

/// A node of the command tree.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Command {
    /// Single path segment.
    pub name: String,
    pub description: Option<String>,
    pub flags: Vec<Flag>,
    pub args: Vec<Arg>,
    pub examples: Vec<String>,
    /// Local attribute overrides.
    pub attrs: BTreeMap<String, AttrValue>,
    pub children: Vec<CommandId>,
    pub parent: Option<CommandId>,
}

impl Command {
    pub fn is_leaf(&self) -> bool {
        self.children.is_empty()
    }

    /// Finds a local flag by its command-line spelling.
    pub fn find_flag(&self, token: &str) -> Option<&Flag> {
        self.flags.iter().find(|flag| flag.matches(token))
    }
}

/// Help topic, independent of the command tree.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Topic {
    pub name: String,
    pub description: String,
    pub text: Option<String>,
}

/// Application identity from the `name` statement.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppInfo {
    pub name: String,
    pub tagline: Option<String>,
}

/// Root of a parsed declaration source.
///
/// # Examples
///
/// ```
/// use cmdtree_core::parse;
///
/// let decl = parse("cmd remote add\ncmd remote remove").unwrap();
/// let remote = decl.find_path(&["remote"]).unwrap();
/// assert_eq!(decl.command(remote).children.len(), 2);
/// assert_eq!(decl.path(decl.find_path(&["remote", "add"]).unwrap()), vec!["remote", "add"]);
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Declaration {
    pub app: Option<AppInfo>,
    pub global_flags: Vec<Flag>,
    pub global_attrs: BTreeMap<String, AttrValue>,
    /// Top-level commands in declaration order.
    pub roots: Vec<CommandId>,
    pub topics: Vec<Topic>,
    /// Arena holding every command; indexed by [`CommandId`].
    pub(crate) commands: Vec<Command>,
}

impl Declaration {
    /// Returns the command stored at `id`.
    ///
    /// Ids are only handed out by the tree that owns them, so lookups are
    /// always in bounds.
    pub fn command(&self, id: CommandId) -> &Command {
        &self.commands[id.0]
    }

    pub(crate) fn command_mut(&mut self, id: CommandId) -> &mut Command {
        &mut self.commands[id.0]
    }

    /// Iterates every command in creation order.
    pub fn commands(&self) -> impl Iterator<Item = (CommandId, &Command)> {
        self.commands
            .iter()
            .enumerate()
            .map(|(idx, cmd)| (CommandId(idx), cmd))
    }

    pub fn command_count(&self) -> usize {
        self.commands.len()
    }

    /// Children of `parent`, or the top-level commands for `None`.
    pub fn children(&self, parent: Option<CommandId>) -> &[CommandId] {
        match parent {
            Some(id) => &self.command(id).children,
            None => &self.roots,
        }
    }

    /// Finds a direct child by exact name.
    pub fn child_named(&self, parent: Option<CommandId>, name: &str) -> Option<CommandId> {
        self.children(parent)
            .iter()
            .copied()
            .find(|id| self.command(*id).name == name)
    }

    /// Follows exact path segments from the root.
    pub fn find_path(&self, segments: &[&str]) -> Option<CommandId> {
        let mut current = None;
        for segment in segments {
            current = Some(self.child_named(current, segment)?);
        }
        current
    }

    /// Appends a new command under `parent` and returns its id.
    pub(crate) fn add_command(&mut self, parent: Option<CommandId>, name: &str) -> CommandId {
        let id = CommandId(self.commands.len());
        self.commands.push(Command {
            name: name.to_string(),
            parent,
            ..Default::default()
        });
        match parent {
            Some(parent) => self.command_mut(parent).children.push(id),
            None => self.roots.push(id),
        }
        id
    }

    /// Path segments from the root down to `id`.
    pub fn path(&self, id: CommandId) -> Vec<&str> {
        let mut segments = Vec::new();
        let mut current = Some(id);
        while let Some(node) = current {
            let cmd = self.command(node);
            segments.push(cmd.name.as_str());
            current = cmd.parent;
        }
        segments.reverse();
        segments
    }

    /// Full path joined with single spaces, e.g. `"remote add"`.
    pub fn full_path(&self, id: CommandId) -> String {
        self.path(id).join(" ")
    }

    /// Finds a global flag by its command-line spelling.
    pub fn find_global_flag(&self, token: &str) -> Option<&Flag> {
        self.global_flags.iter().find(|flag| flag.matches(token))
    }

    pub fn find_topic(&self, name: &str) -> Option<&Topic> {
        self.topics.iter().find(|topic| topic.name == name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flag_matches_long_and_short_forms() {
        let flag = Flag::new("output", FlagKind::String).with_short('o');

        assert!(flag.matches("--output"));
        assert!(flag.matches("-o"));
        assert!(!flag.matches("-out"));
        assert!(!flag.matches("output"));
        assert!(!flag.matches("--o"));
    }

    #[test]
    fn test_flag_without_short_ignores_single_dash() {
        let flag = Flag::new("force", FlagKind::Bool);
        assert!(!flag.matches("-f"));
        assert!(!flag.matches("-"));
    }

    #[test]
    fn test_arena_tracks_parent_and_path() {
        let mut decl = Declaration::default();
        let project = decl.add_command(None, "project");
        let init = decl.add_command(Some(project), "init");

        assert_eq!(decl.command(init).parent, Some(project));
        assert_eq!(decl.path(init), vec!["project", "init"]);
        assert_eq!(decl.full_path(init), "project init");
        assert!(decl.command(init).is_leaf());
        assert!(!decl.command(project).is_leaf());
    }

    #[test]
    fn test_attr_kind_zero_values() {
        assert_eq!(AttrKind::Bool.zero(), AttrValue::Bool(false));
        assert_eq!(AttrKind::String.zero(), AttrValue::Str(String::new()));
        assert_eq!(AttrKind::Int.zero(), AttrValue::Int(0));
    }

    #[test]
    fn test_flag_kind_from_str() {
        assert_eq!("bool".parse::<FlagKind>(), Ok(FlagKind::Bool));
        assert_eq!("string".parse::<FlagKind>(), Ok(FlagKind::String));
        assert!("int".parse::<FlagKind>().is_err());
    }
}
