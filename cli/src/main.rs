mod config;

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use clap::Parser;
use cmdtree_core::contract::build_contract;
use cmdtree_core::help::render_help;
use cmdtree_core::{Action, DispatchError, ResolvedTree, compile};
use regex::Regex;
use serde::Serialize;
use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;

use crate::config::{ArtifactFormat, CompilerConfig};

/// File extension of declaration sources.
const SOURCE_EXTENSION: &str = "cmdl";

static NAMESPACE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").expect("static regex must compile")
});

#[derive(Debug, Parser)]
#[command(name = "cmdtreec")]
#[command(about = "Compile a command tree declaration into a resolved tree and emitter contract")]
struct Cli {
    /// Declaration source file (.cmdl).
    source: PathBuf,
    /// Destination namespace identifier for generated code.
    namespace: String,
    /// Artifact format (overrides the config file).
    #[arg(long)]
    format: Option<ArtifactFormat>,
    /// YAML compiler configuration.
    #[arg(long)]
    config: Option<PathBuf>,
    /// Dispatch the arguments after `--` against the compiled tree instead of
    /// writing artifacts.
    #[arg(long)]
    probe: bool,
    /// Arguments to dispatch in probe mode.
    #[arg(last = true)]
    probe_args: Vec<String>,
    /// Enable debug logging.
    #[arg(long, short)]
    verbose: bool,
}

fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    if let Err(err) = run(cli) {
        eprintln!("error: {err}");
        std::process::exit(1);
    }
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn run(cli: Cli) -> Result<(), String> {
    let mut config = match &cli.config {
        Some(path) => CompilerConfig::load(path)?,
        None => CompilerConfig::default(),
    };
    if let Some(format) = cli.format {
        config.format = format;
    }
    config.validate()?;

    check_extension(&cli.source)?;
    let src = fs::read_to_string(&cli.source)
        .map_err(|err| format!("Failed to read '{}': {err}", cli.source.display()))?;
    let tree = compile(&src).map_err(|err| format!("{}: {err}", cli.source.display()))?;
    debug!(
        source = %cli.source.display(),
        leaves = tree.leaves().len(),
        "compiled declaration"
    );

    if !NAMESPACE_RE.is_match(&cli.namespace) {
        return Err(format!(
            "Invalid namespace '{}': expected [A-Za-z_][A-Za-z0-9_]*",
            cli.namespace
        ));
    }

    if cli.probe {
        return run_probe(&tree, &cli.probe_args, config.format);
    }

    let written = write_artifacts(&cli.source, &cli.namespace, &tree, &config)?;
    for path in written {
        println!("{}", path.display());
    }
    Ok(())
}

fn check_extension(source: &Path) -> Result<(), String> {
    match source.extension().and_then(|ext| ext.to_str()) {
        Some(SOURCE_EXTENSION) => Ok(()),
        _ => Err(format!(
            "'{}' is not a .{SOURCE_EXTENSION} declaration file",
            source.display()
        )),
    }
}

/// Writes the resolved tree and the emitter contract next to the source.
///
/// Both documents are rendered before anything touches the disk, and a
/// failed write removes the artifacts already written.
fn write_artifacts(
    source: &Path,
    namespace: &str,
    tree: &ResolvedTree,
    config: &CompilerConfig,
) -> Result<Vec<PathBuf>, String> {
    let contract = build_contract(tree, namespace);
    let rendered = [
        (&config.tree_suffix, config.format.render(tree)?),
        (&config.contract_suffix, config.format.render(&contract)?),
    ];

    let stem = source
        .file_stem()
        .and_then(|stem| stem.to_str())
        .ok_or_else(|| format!("'{}' has no usable file name", source.display()))?;
    let dir = source.parent().unwrap_or_else(|| Path::new(""));

    let mut written: Vec<PathBuf> = Vec::with_capacity(rendered.len());
    for (suffix, raw) in rendered {
        let path = dir.join(format!("{stem}.{suffix}.{}", config.format.extension()));
        if let Err(err) = fs::write(&path, raw) {
            // Leave no half of the pair behind.
            for earlier in &written {
                if let Err(cleanup) = fs::remove_file(earlier) {
                    warn!(path = %earlier.display(), error = %cleanup, "failed to remove artifact");
                }
            }
            return Err(format!("Failed to write '{}': {err}", path.display()));
        }
        let resolved = fs::canonicalize(&path).unwrap_or(path);
        info!(path = %resolved.display(), "wrote artifact");
        written.push(resolved);
    }
    Ok(written)
}

#[derive(Serialize)]
struct ProbeOutput {
    #[serde(skip_serializing_if = "Option::is_none")]
    action: Option<Action>,
    #[serde(skip_serializing_if = "Option::is_none")]
    help: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<DispatchError>,
    #[serde(skip_serializing_if = "Option::is_none")]
    message: Option<String>,
}

fn run_probe(tree: &ResolvedTree, argv: &[String], format: ArtifactFormat) -> Result<(), String> {
    let result = tree.dispatch(argv);
    let output = match &result {
        Ok(action) => ProbeOutput {
            help: match action {
                Action::Help(request) => Some(render_help(tree, &request.target)),
                Action::Run(_) => None,
            },
            action: Some(action.clone()),
            error: None,
            message: None,
        },
        Err(err) => ProbeOutput {
            action: None,
            help: None,
            message: Some(err.to_string()),
            error: Some(err.clone()),
        },
    };
    println!("{}", format.render(&output)?);

    result
        .map(|_| ())
        .map_err(|err| format!("dispatch failed: {err}"))
}
