//! Semantic resolution of a parsed declaration.
//!
//! [`resolve`] checks that every attribute keeps one kind across the whole
//! tree, derives canonical identifiers and collects the leaf commands in a
//! deterministic order. The resulting [`ResolvedTree`] is immutable and is
//! what both the dispatcher and the emitter contract read from.
//!
//! # Examples
//!
//! ```
//! use cmdtree_core::{compile, AttrValue};
//!
//! let tree = compile(r#"
//! attr safe = true
//! cmd db drop
//! attr safe = false
//! cmd db list
//! "#).unwrap();
//!
//! let drop = tree.find(&["db", "drop"]).unwrap();
//! let list = tree.find(&["db", "list"]).unwrap();
//! assert_eq!(tree.attribute(drop, "safe"), Some(&AttrValue::Bool(false)));
//! assert_eq!(tree.attribute(list, "safe"), Some(&AttrValue::Bool(true)));
//! assert_eq!(tree.canonical_name(drop), "DbDrop");
//! ```

use std::collections::{BTreeMap, HashMap, HashSet};

use serde::Serialize;
use tracing::debug;

use crate::contract::HELP_OPERATION;
use crate::error::CompileError;
use crate::types::{AttrKind, AttrValue, CommandId, Declaration, Flag};

/// A declaration that passed semantic checks.
#[derive(Debug, Clone, Serialize)]
pub struct ResolvedTree {
    declaration: Declaration,
    /// Attribute name to kind, sorted by name.
    attribute_kinds: BTreeMap<String, AttrKind>,
    /// Leaf commands ordered by path.
    leaves: Vec<CommandId>,
    /// Canonical identifier per command, indexed by [`CommandId`].
    canonical_names: Vec<String>,
    /// Declared global flags followed by the implicit help flag.
    global_flags: Vec<Flag>,
}

/// Runs semantic checks and derives lookup tables.
pub fn resolve(declaration: Declaration) -> Result<ResolvedTree, CompileError> {
    let attribute_kinds = collect_attribute_kinds(&declaration)?;

    let mut ordered: Vec<CommandId> = declaration.commands().map(|(id, _)| id).collect();
    ordered.sort_by(|a, b| declaration.path(*a).cmp(&declaration.path(*b)));

    let canonical_names = canonical_names(&declaration, &ordered)?;
    let leaves: Vec<CommandId> = ordered
        .into_iter()
        .filter(|id| declaration.command(*id).is_leaf())
        .collect();

    let mut global_flags = declaration.global_flags.clone();
    global_flags.push(Flag::help());
    check_parameters(&declaration, &global_flags)?;

    debug!(
        leaves = leaves.len(),
        attributes = attribute_kinds.len(),
        "resolved declaration"
    );

    Ok(ResolvedTree {
        declaration,
        attribute_kinds,
        leaves,
        canonical_names,
        global_flags,
    })
}

fn collect_attribute_kinds(
    declaration: &Declaration,
) -> Result<BTreeMap<String, AttrKind>, CompileError> {
    let mut kinds: BTreeMap<String, AttrKind> = BTreeMap::new();
    let scopes = std::iter::once(&declaration.global_attrs)
        .chain(declaration.commands().map(|(_, cmd)| &cmd.attrs));

    for attrs in scopes {
        for (name, value) in attrs {
            let kind = value.kind();
            match kinds.get(name) {
                Some(first) if *first != kind => {
                    return Err(CompileError::AttributeKindConflict {
                        name: name.clone(),
                        first: *first,
                        second: kind,
                    });
                }
                Some(_) => {}
                None => {
                    kinds.insert(name.clone(), kind);
                }
            }
        }
    }
    Ok(kinds)
}

fn canonical_names(
    declaration: &Declaration,
    ordered: &[CommandId],
) -> Result<Vec<String>, CompileError> {
    let mut names = vec![String::new(); declaration.command_count()];
    let mut seen: HashMap<String, CommandId> = HashMap::new();

    for id in ordered {
        let identifier = canonical_name(&declaration.path(*id));
        if identifier.is_empty() {
            return Err(CompileError::EmptyIdentifier {
                path: declaration.full_path(*id),
            });
        }
        if identifier == HELP_OPERATION && declaration.command(*id).is_leaf() {
            return Err(CompileError::ReservedIdentifier {
                path: declaration.full_path(*id),
                identifier,
            });
        }
        if let Some(other) = seen.get(&identifier) {
            return Err(CompileError::CanonicalNameCollision {
                first: declaration.full_path(*other),
                second: declaration.full_path(*id),
                identifier,
            });
        }
        seen.insert(identifier.clone(), *id);
        names[id.index()] = identifier;
    }
    Ok(names)
}

/// Every command binds its own flags, its arguments and the global flags
/// into one bundle, so their names and short aliases must not overlap.
fn check_parameters(declaration: &Declaration, global_flags: &[Flag]) -> Result<(), CompileError> {
    for (id, cmd) in declaration.commands() {
        let duplicate = |name: String| CompileError::DuplicateParameter {
            command: declaration.full_path(id),
            name,
        };
        let mut names: HashSet<&str> = HashSet::new();
        let mut shorts: HashSet<char> = HashSet::new();

        for flag in global_flags.iter().chain(&cmd.flags) {
            if !names.insert(flag.name.as_str()) {
                return Err(duplicate(format!("--{}", flag.name)));
            }
            if let Some(short) = flag.short {
                if !shorts.insert(short) {
                    return Err(duplicate(format!("-{short}")));
                }
            }
        }
        for arg in &cmd.args {
            if !names.insert(arg.name.as_str()) {
                return Err(duplicate(arg.name.clone()));
            }
        }
    }
    Ok(())
}

/// Derives a presentation identifier from path segments.
///
/// Segments are split on `-`, `_`, `.` and `:`; each part is capitalized and
/// the parts are concatenated.
///
/// # Examples
///
/// ```
/// use cmdtree_core::canonical_name;
///
/// assert_eq!(canonical_name(&["project", "init-db"]), "ProjectInitDb");
/// assert_eq!(canonical_name(&["cache:clear"]), "CacheClear");
/// ```
pub fn canonical_name(segments: &[&str]) -> String {
    segments
        .iter()
        .flat_map(|segment| segment.split(['-', '_', '.', ':']))
        .filter(|part| !part.is_empty())
        .map(|part| {
            let mut chars = part.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect::<String>(),
                None => String::new(),
            }
        })
        .collect()
}

impl ResolvedTree {
    pub fn declaration(&self) -> &Declaration {
        &self.declaration
    }

    /// Sorted attribute name to kind table.
    pub fn attribute_kinds(&self) -> &BTreeMap<String, AttrKind> {
        &self.attribute_kinds
    }

    /// Leaf commands ordered by path.
    pub fn leaves(&self) -> &[CommandId] {
        &self.leaves
    }

    /// Declared global flags plus the implicit help flag.
    pub fn global_flags(&self) -> &[Flag] {
        &self.global_flags
    }

    pub fn canonical_name(&self, id: CommandId) -> &str {
        &self.canonical_names[id.index()]
    }

    /// Follows exact path segments from the root.
    pub fn find(&self, segments: &[&str]) -> Option<CommandId> {
        self.declaration.find_path(segments)
    }

    /// Raw attribute lookup: the command's own override, else the global
    /// default, else `None`.
    pub fn attribute(&self, id: CommandId, name: &str) -> Option<&AttrValue> {
        self.declaration
            .command(id)
            .attrs
            .get(name)
            .or_else(|| self.declaration.global_attrs.get(name))
    }

    /// Effective attribute value for a command.
    ///
    /// Falls back to the zero value of the attribute's kind when it is
    /// declared somewhere in the tree but set neither on the command nor
    /// globally. Returns `None` only for attributes never declared.
    pub fn attribute_value(&self, id: CommandId, name: &str) -> Option<AttrValue> {
        self.attribute(id, name)
            .cloned()
            .or_else(|| self.attribute_kinds.get(name).map(|kind| kind.zero()))
    }

    /// Effective values of every known attribute for a command.
    pub fn attributes_for(&self, id: CommandId) -> BTreeMap<String, AttrValue> {
        self.attribute_kinds
            .iter()
            .map(|(name, kind)| {
                let value = self.attribute(id, name).cloned().unwrap_or_else(|| kind.zero());
                (name.clone(), value)
            })
            .collect()
    }
}
