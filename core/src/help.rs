//! Plain-text help rendering.
//!
//! Dispatch only decides *what* help was asked for; these functions turn a
//! [`HelpTarget`] into text. Output is deterministic and always ends with a
//! newline.

use crate::dispatch::HelpTarget;
use crate::resolve::ResolvedTree;
use crate::types::{CommandId, Flag, FlagKind};

const DEFAULT_APP_NAME: &str = "app";

/// Renders help for whatever a dispatch [`HelpTarget`] points at.
///
/// An unknown topic name falls back to the root help.
pub fn render_help(tree: &ResolvedTree, target: &HelpTarget) -> String {
    match target {
        HelpTarget::Root => render_root(tree),
        HelpTarget::Command { id, .. } => render_command(tree, *id),
        HelpTarget::Topic { name } => {
            render_topic(tree, name).unwrap_or_else(|| render_root(tree))
        }
    }
}

/// Top-level help: identity, top-level commands, global flags and topics.
///
/// # Examples
///
/// ```
/// use cmdtree_core::{compile, help::render_root};
///
/// let tree = compile(r#"
/// name "todo" "Track things"
/// cmd add "Add an item"
/// "#).unwrap();
///
/// let text = render_root(&tree);
/// assert!(text.starts_with("todo - Track things\n"));
/// assert!(text.contains("  add   Add an item\n"));
/// assert!(text.contains("-h, --help"));
/// ```
pub fn render_root(tree: &ResolvedTree) -> String {
    let decl = tree.declaration();
    let app = app_name(tree);
    let mut out = String::new();

    match decl.app.as_ref().and_then(|info| info.tagline.as_deref()) {
        Some(tagline) => out.push_str(&format!("{app} - {tagline}\n\n")),
        None => out.push_str(&format!("{app}\n\n")),
    }

    out.push_str("Usage:\n");
    out.push_str(&format!("  {app} <command> [flags]\n"));

    push_commands(&mut out, tree, &decl.roots);
    push_flags(&mut out, "Global flags", tree.global_flags());

    if !decl.topics.is_empty() {
        let rows: Vec<(String, String)> = decl
            .topics
            .iter()
            .map(|topic| (topic.name.clone(), topic.description.clone()))
            .collect();
        push_section(&mut out, "Topics", &rows);
    }

    out
}

/// Help for a single command.
pub fn render_command(tree: &ResolvedTree, id: CommandId) -> String {
    let decl = tree.declaration();
    let cmd = decl.command(id);
    let mut out = String::new();

    let mut usage = format!("  {} {}", app_name(tree), decl.full_path(id));
    if cmd.is_leaf() {
        if !cmd.flags.is_empty() {
            usage.push_str(" [flags]");
        }
        for arg in &cmd.args {
            usage.push_str(&format!(" <{}>", arg.name));
        }
    } else {
        usage.push_str(" <command>");
    }

    out.push_str("Usage:\n");
    out.push_str(&usage);
    out.push('\n');

    if let Some(description) = cmd.description.as_deref() {
        out.push('\n');
        out.push_str(description);
        out.push('\n');
    }

    push_commands(&mut out, tree, &cmd.children);
    push_flags(&mut out, "Flags", &cmd.flags);

    if !cmd.args.is_empty() {
        let rows: Vec<(String, String)> = cmd
            .args
            .iter()
            .map(|arg| {
                let description = if arg.description.is_empty() {
                    format!("({})", arg.kind)
                } else {
                    format!("{} ({})", arg.description, arg.kind)
                };
                (arg.name.clone(), description)
            })
            .collect();
        push_section(&mut out, "Arguments", &rows);
    }

    if !cmd.examples.is_empty() {
        out.push_str("\nExamples:\n");
        for example in &cmd.examples {
            out.push_str(&format!("  {example}\n"));
        }
    }

    push_flags(&mut out, "Global flags", tree.global_flags());
    out
}

/// Help for a topic, or `None` if no topic has that name.
pub fn render_topic(tree: &ResolvedTree, name: &str) -> Option<String> {
    let topic = tree.declaration().find_topic(name)?;
    let mut out = format!("{} - {}\n", topic.name, topic.description);
    if let Some(text) = topic.text.as_deref() {
        out.push('\n');
        out.push_str(text);
        if !text.ends_with('\n') {
            out.push('\n');
        }
    }
    Some(out)
}

fn app_name(tree: &ResolvedTree) -> &str {
    tree.declaration()
        .app
        .as_ref()
        .map_or(DEFAULT_APP_NAME, |info| info.name.as_str())
}

fn push_commands(out: &mut String, tree: &ResolvedTree, ids: &[CommandId]) {
    if ids.is_empty() {
        return;
    }
    let decl = tree.declaration();
    let rows: Vec<(String, String)> = ids
        .iter()
        .map(|id| {
            let cmd = decl.command(*id);
            (
                cmd.name.clone(),
                cmd.description.clone().unwrap_or_default(),
            )
        })
        .collect();
    push_section(out, "Commands", &rows);
}

fn push_flags(out: &mut String, title: &str, flags: &[Flag]) {
    if flags.is_empty() {
        return;
    }
    let rows: Vec<(String, String)> = flags
        .iter()
        .map(|flag| (flag_label(flag), flag.description.clone()))
        .collect();
    push_section(out, title, &rows);
}

fn flag_label(flag: &Flag) -> String {
    let mut label = match flag.short {
        Some(short) => format!("-{short}, --{}", flag.name),
        None => format!("    --{}", flag.name),
    };
    if flag.kind == FlagKind::String {
        label.push_str(" <value>");
    }
    label
}

fn push_section(out: &mut String, title: &str, rows: &[(String, String)]) {
    let width = rows.iter().map(|(left, _)| left.len()).max().unwrap_or(0);
    out.push_str(&format!("\n{title}:\n"));
    for (left, right) in rows {
        if right.is_empty() {
            out.push_str(&format!("  {left}\n"));
        } else {
            out.push_str(&format!("  {left:<width$}  {right}\n"));
        }
    }
}
