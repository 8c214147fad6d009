use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use globset::{Glob, GlobSet, GlobSetBuilder};
use tracing_subscriber::EnvFilter;

use reflect_kit_core::{discovery, load_referenced_modules, LoadOptions, ManifestLoader, ModuleGraph, ModuleIdentity};

/// reflect-kit - Module reference closure tooling
#[derive(Parser)]
#[command(name = "reflect-kit")]
#[command(version)]
#[command(about = "Load the reference closure of modules described by JSON manifests", long_about = None)]
struct Cli {
    /// Enable debug logging (RUST_LOG overrides)
    #[arg(short, long, global = true, default_value_t = false)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Load every module transitively referenced by ROOT
    Closure {
        /// Directory searched for *.module.json manifests
        #[arg(long, default_value = ".")]
        dir: PathBuf,

        /// Root module, as `name` or `name@version`
        root: ModuleIdentity,

        /// Skip references whose name matches this glob (repeatable)
        #[arg(long = "exclude", value_name = "GLOB")]
        excludes: Vec<String>,

        /// Print the graph as JSON
        #[arg(long, default_value_t = false)]
        json: bool,
    },
    /// List the module manifests found under a directory
    Discover {
        #[arg(long, default_value = ".")]
        dir: PathBuf,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match cli.command {
        Command::Closure {
            dir,
            root,
            excludes,
            json,
        } => run_closure(&dir, &root, &excludes, json),
        Command::Discover { dir } => run_discover(&dir),
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

fn run_closure(dir: &Path, root: &ModuleIdentity, excludes: &[String], json: bool) -> Result<()> {
    let loader = ManifestLoader::from_directory(dir)?;
    let root_module = loader
        .module(root)
        .with_context(|| format!("No manifest for root module {} under {}", root, dir.display()))?;

    let excluded = build_exclusions(excludes)?;
    let options = LoadOptions::new(&loader).with_filter(|identity| !excluded.is_match(&identity.name));

    let graph = load_referenced_modules(&root_module, &options)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&graph.snapshot())?);
    } else {
        print_graph(&graph);
    }
    Ok(())
}

fn build_exclusions(patterns: &[String]) -> Result<GlobSet> {
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        builder.add(Glob::new(pattern).with_context(|| format!("Invalid exclude pattern '{}'", pattern))?);
    }
    Ok(builder.build()?)
}

fn print_graph(graph: &ModuleGraph) {
    println!("root: {}", graph.root());
    println!("loaded ({}):", graph.loaded().len());
    for identity in graph.loaded() {
        println!("  {}", identity);
    }

    let excluded: Vec<_> = graph.excluded().collect();
    if !excluded.is_empty() {
        println!("excluded ({}):", excluded.len());
        for identity in excluded {
            println!("  {}", identity);
        }
    }
}

fn run_discover(dir: &Path) -> Result<()> {
    for path in discovery::discover_manifests(dir) {
        println!("{}", path.display());
    }
    Ok(())
}
