//! Data contract handed to code emitters.
//!
//! A [`Contract`] is everything an emitter needs to generate a typed front
//! end for a tree: the attribute table, the leaf list in path order, the
//! canonical identifier of every command, the global flags, one parameter
//! bundle per leaf and the set of handler operations. It serializes with
//! [`serde`] so emitters in any language can consume it.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::resolve::ResolvedTree;
use crate::types::{AppInfo, AttrKind, AttrValue, Flag, FlagKind, Topic};

/// Version of the contract layout (semver).
pub const CONTRACT_VERSION: &str = "1.0.0";

/// Name of the handler operation every contract carries besides the leaves.
pub const HELP_OPERATION: &str = "Help";

/// Kind of a bundle field in the target representation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldKind {
    Bool,
    String,
    Int,
}

impl From<FlagKind> for FieldKind {
    fn from(kind: FlagKind) -> Self {
        match kind {
            FlagKind::Bool => Self::Bool,
            FlagKind::String => Self::String,
        }
    }
}

impl From<AttrKind> for FieldKind {
    fn from(kind: AttrKind) -> Self {
        match kind {
            AttrKind::Bool => Self::Bool,
            AttrKind::String => Self::String,
            AttrKind::Int => Self::Int,
        }
    }
}

/// Where a bundle field gets its value from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldSource {
    Flag,
    Arg,
    Global,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BundleField {
    pub name: String,
    pub kind: FieldKind,
    pub source: FieldSource,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub description: String,
}

/// Parameter bundle of one leaf command.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Bundle {
    /// Canonical identifier, also the handler operation name.
    pub command: String,
    pub path: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Local flags, then positional arguments, then global flags.
    pub fields: Vec<BundleField>,
    /// Effective attribute values for the command.
    pub attributes: BTreeMap<String, AttrValue>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttributeEntry {
    pub name: String,
    pub kind: AttrKind,
}

/// Serializable description of a compiled tree.
///
/// # Examples
///
/// ```
/// use cmdtree_core::{compile, contract::{build_contract, FieldSource}};
///
/// let tree = compile(r#"
/// flag verbose bool "Chatty output"
/// cmd user add "Add a user"
/// arg login string "Login name"
/// "#).unwrap();
///
/// let contract = build_contract(&tree, "users");
/// assert_eq!(contract.leaves, vec!["user add"]);
/// assert_eq!(contract.operations, vec!["UserAdd", "Help"]);
///
/// let bundle = &contract.bundles[0];
/// let sources: Vec<FieldSource> = bundle.fields.iter().map(|f| f.source).collect();
/// assert_eq!(sources, vec![FieldSource::Arg, FieldSource::Global, FieldSource::Global]);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Contract {
    pub contract_version: String,
    /// Destination namespace for generated code.
    pub namespace: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub app: Option<AppInfo>,
    /// Attribute table sorted by name.
    pub attributes: Vec<AttributeEntry>,
    /// Full paths of leaf commands, in path order.
    pub leaves: Vec<String>,
    /// Full path to canonical identifier for every command.
    pub canonical_names: BTreeMap<String, String>,
    /// Declared global flags plus the implicit help flag.
    pub global_flags: Vec<Flag>,
    /// One bundle per leaf, in the same order as `leaves`.
    pub bundles: Vec<Bundle>,
    /// Handler operations: one per leaf, then [`HELP_OPERATION`].
    pub operations: Vec<String>,
    pub topics: Vec<Topic>,
}

/// Builds the emitter contract for a resolved tree.
pub fn build_contract(tree: &ResolvedTree, namespace: &str) -> Contract {
    let decl = tree.declaration();

    let attributes = tree
        .attribute_kinds()
        .iter()
        .map(|(name, kind)| AttributeEntry {
            name: name.clone(),
            kind: *kind,
        })
        .collect();

    let canonical_names = decl
        .commands()
        .map(|(id, _)| (decl.full_path(id), tree.canonical_name(id).to_string()))
        .collect();

    let global_fields: Vec<BundleField> = tree
        .global_flags()
        .iter()
        .map(|flag| BundleField {
            name: flag.name.clone(),
            kind: flag.kind.into(),
            source: FieldSource::Global,
            description: flag.description.clone(),
        })
        .collect();

    let bundles: Vec<Bundle> = tree
        .leaves()
        .iter()
        .map(|id| {
            let cmd = decl.command(*id);
            let mut fields: Vec<BundleField> = cmd
                .flags
                .iter()
                .map(|flag| BundleField {
                    name: flag.name.clone(),
                    kind: flag.kind.into(),
                    source: FieldSource::Flag,
                    description: flag.description.clone(),
                })
                .collect();
            fields.extend(cmd.args.iter().map(|arg| BundleField {
                name: arg.name.clone(),
                kind: FieldKind::String,
                source: FieldSource::Arg,
                description: arg.description.clone(),
            }));
            fields.extend(global_fields.iter().cloned());

            Bundle {
                command: tree.canonical_name(*id).to_string(),
                path: decl.path(*id).into_iter().map(String::from).collect(),
                description: cmd.description.clone(),
                fields,
                attributes: tree.attributes_for(*id),
            }
        })
        .collect();

    let mut operations: Vec<String> = bundles.iter().map(|b| b.command.clone()).collect();
    operations.push(HELP_OPERATION.to_string());

    Contract {
        contract_version: CONTRACT_VERSION.to_string(),
        namespace: namespace.to_string(),
        app: decl.app.clone(),
        attributes,
        leaves: tree.leaves().iter().map(|id| decl.full_path(*id)).collect(),
        canonical_names,
        global_flags: tree.global_flags().to_vec(),
        bundles,
        operations,
        topics: decl.topics.clone(),
    }
}

impl Contract {
    /// Finds the bundle for a canonical command identifier.
    pub fn bundle(&self, command: &str) -> Option<&Bundle> {
        self.bundles.iter().find(|bundle| bundle.command == command)
    }

    /// Pretty-printed JSON rendering.
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}
