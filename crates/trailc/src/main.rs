//! The Trail semantic-analysis driver.
//!
//! Provides the `trailc` command with the following subcommands:
//!
//! - `trailc check <tree.json>` - Resolve a compilation unit produced by the
//!   front end and report its diagnostics
//!
//! Options:
//! - `--manifest` - Navigator manifest (TOML) to load; may be repeated
//! - `--config` - Analysis configuration (defaults to `trail.toml` beside the tree)
//! - `--source` - Source text the tree's spans point into
//! - `--print-tree` - Print the resolved tree to stdout
//! - `--typed` - Annotate the printed tree with resolved types
//! - `--json` - Output diagnostics as JSON (one object per line)
//! - `--no-color` - Disable colorized output
//!
//! Logging goes to stderr and is controlled with `RUST_LOG`.

use std::path::{Path, PathBuf};
use std::process;

use clap::{Parser, Subcommand};
use tracing::{debug, info};
use tracing_subscriber::{fmt, EnvFilter};

use trail_sema::config::SemaConfig;
use trail_sema::diagnostics::{render_diagnostic, DiagnosticOptions};
use trail_sema::error::Diagnostics;
use trail_sema::navigators::NavigatorRegistry;
use trail_sema::operators::OperatorRegistry;
use trail_sema::providers::Manifest;
use trail_sema::types::TypeTable;
use trail_sema::{Analyzer, CompilationUnit};

/// Configuration file picked up next to the tree when `--config` is absent.
const DEFAULT_CONFIG: &str = "trail.toml";

#[derive(Parser)]
#[command(name = "trailc", version, about = "The Trail semantic analyzer")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Resolve a compilation unit and report its diagnostics
    Check {
        /// Path to the compilation unit (JSON, as written by the front end)
        tree: PathBuf,

        /// Navigator manifest to load (may be given more than once)
        #[arg(long = "manifest", value_name = "PATH")]
        manifests: Vec<PathBuf>,

        /// Analysis configuration (TOML)
        #[arg(long)]
        config: Option<PathBuf>,

        /// Source text for rendering diagnostics; overrides the unit's own
        #[arg(long)]
        source: Option<PathBuf>,

        /// Print the resolved tree to stdout
        #[arg(long = "print-tree")]
        print_tree: bool,

        /// Annotate the printed tree with resolved types
        #[arg(long, requires = "print_tree")]
        typed: bool,

        /// Output diagnostics as JSON (one object per line) instead of human-readable format
        #[arg(long)]
        json: bool,

        /// Disable colorized output
        #[arg(long = "no-color")]
        no_color: bool,
    },
}

struct CheckArgs<'a> {
    tree: &'a Path,
    manifests: &'a [PathBuf],
    config: Option<&'a Path>,
    source: Option<&'a Path>,
    print_tree: bool,
    typed: bool,
}

fn main() {
    init_logging();
    let cli = Cli::parse();

    match cli.command {
        Commands::Check {
            tree,
            manifests,
            config,
            source,
            print_tree,
            typed,
            json,
            no_color,
        } => {
            let diag_opts = DiagnosticOptions {
                color: !no_color && !json,
                json,
            };
            let args = CheckArgs {
                tree: &tree,
                manifests: &manifests,
                config: config.as_deref(),
                source: source.as_deref(),
                print_tree,
                typed,
            };
            if let Err(e) = check(&args, &diag_opts) {
                if json {
                    // In JSON mode, emit the final error as JSON too.
                    let msg = serde_json::json!({
                        "code": "C0001",
                        "severity": "error",
                        "message": e,
                        "file": tree.display().to_string(),
                        "spans": [],
                        "fix": null
                    });
                    eprintln!("{}", msg);
                } else {
                    eprintln!("error: {}", e);
                }
                process::exit(1);
            }
        }
    }
}

fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

/// Load collaborators -> read the unit -> analyse -> report.
fn check(args: &CheckArgs<'_>, diag_opts: &DiagnosticOptions) -> Result<(), String> {
    let config = load_config(args.tree, args.config)?;
    debug!(?config, "configuration loaded");

    let mut types = TypeTable::with_builtins();
    let navigators = NavigatorRegistry::standard(config.conflict_policy);
    let mut diagnostics = Diagnostics::new();
    for path in args.manifests {
        let manifest = Manifest::load(path).map_err(|e| format!("manifest {}: {}", path.display(), e))?;
        manifest.install_types(&mut types);
        diagnostics.extend(navigators.load(&manifest));
        info!(manifest = %path.display(), classes = manifest.classes().len(), "manifest loaded");
    }

    let text = std::fs::read_to_string(args.tree)
        .map_err(|e| format!("Failed to read '{}': {}", args.tree.display(), e))?;
    let unit: CompilationUnit = serde_json::from_str(&text)
        .map_err(|e| format!("'{}' is not a valid compilation unit: {}", args.tree.display(), e))?;

    let source = match args.source {
        Some(path) => std::fs::read_to_string(path)
            .map_err(|e| format!("Failed to read '{}': {}", path.display(), e))?,
        None => unit.source.clone().unwrap_or_default(),
    };
    let file_name = match args.source {
        Some(path) => path.display().to_string(),
        None => args.tree.display().to_string(),
    };

    let result = Analyzer::new(&types, &navigators, OperatorRegistry::global())
        .with_config(config)
        .analyze(unit)
        .map_err(|e| format!("internal error: {}", e))?;
    diagnostics.extend(result.diagnostics.iter().cloned());

    for diagnostic in diagnostics.iter() {
        eprint!("{}", render_diagnostic(diagnostic, &source, &file_name, diag_opts));
    }

    if diagnostics.has_errors() {
        return Err("Analysis failed due to errors above.".to_string());
    }

    if args.print_tree {
        if args.typed {
            println!("{}", trail_syntax::display::typed(&result.root));
        } else {
            println!("{}", result.root);
        }
    }
    Ok(())
}

/// An explicit `--config` must exist; the conventional `trail.toml` beside
/// the tree is optional.
fn load_config(tree: &Path, explicit: Option<&Path>) -> Result<SemaConfig, String> {
    if let Some(path) = explicit {
        return SemaConfig::load(path).map_err(|e| format!("config {}: {}", path.display(), e));
    }
    let beside = tree.parent().unwrap_or_else(|| Path::new(".")).join(DEFAULT_CONFIG);
    if beside.is_file() {
        return SemaConfig::load(&beside).map_err(|e| format!("config {}: {}", beside.display(), e));
    }
    Ok(SemaConfig::default())
}
