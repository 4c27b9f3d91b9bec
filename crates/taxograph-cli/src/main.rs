//! Taxograph CLI
//!
//! Command-line front end over the durable taxonomy graph:
//! - `init-tax`: first-time load of a source, no matching
//! - `add-tax`: merge a further source, preorder under `--root` or by
//!   ancestor-path scoring with `--flat`
//! - `lookup`, `stats`, `checkpoint`

use anyhow::{anyhow, Context, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};
use colored::Colorize;
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

use taxograph_ingest::SourceFormat;
use taxograph_loader::{LoaderConfig, MergeStrategy, NameResolver, SourceDescriptor, TaxonomyLoader};
use taxograph_pathdb::{GraphReader, NodeId, NodeKind};
use taxograph_storage::{DurableGraph, StorageConfig};

mod output;

#[derive(Parser)]
#[command(name = "taxograph")]
#[command(
    author,
    version,
    about = "Taxograph: merge independently produced taxonomies into one graph"
)]
struct Cli {
    /// Loader configuration (JSON, every field optional)
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    /// Debug logging (RUST_LOG takes precedence)
    #[arg(short, long, global = true)]
    verbose: bool,
    /// Print reports as JSON on stdout
    #[arg(long, global = true)]
    json: bool,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Load the first source into an empty database.
    InitTax {
        #[command(flatten)]
        input: SourceArgs,
    },

    /// Merge another source into the database.
    ///
    /// With `--root` the source is grafted under that existing taxon and
    /// name matches are confirmed by graph paths; with `--flat` collisions
    /// are resolved by comparing ancestor names.
    AddTax {
        #[command(flatten)]
        input: SourceArgs,
        /// Existing taxon node id the source's root maps onto
        #[arg(long, conflicts_with = "flat", required_unless_present = "flat")]
        root: Option<NodeId>,
        /// Path-scoring merge (no attachment root)
        #[arg(long)]
        flat: bool,
    },

    /// Resolve a name to accepted taxa (synonyms included).
    Lookup {
        name: String,
        #[arg(long)]
        db: PathBuf,
    },

    /// Node, edge and index counts.
    Stats {
        #[arg(long)]
        db: PathBuf,
    },

    /// Write a snapshot and truncate the write-ahead log.
    Checkpoint {
        #[arg(long)]
        db: PathBuf,
    },
}

#[derive(Args)]
struct SourceArgs {
    /// Source descriptor (JSON file) or a bare source name
    #[arg(long)]
    source: String,
    /// Hierarchy file
    taxonomy: PathBuf,
    /// Tab-pipe synonym file (id | name | name type)
    #[arg(long)]
    synonyms: Option<PathBuf>,
    /// Override the descriptor's input format
    #[arg(long, value_enum)]
    format: Option<FormatArg>,
    /// Database directory
    #[arg(long)]
    db: PathBuf,
}

#[derive(Clone, Copy, ValueEnum)]
enum FormatArg {
    TabPipe,
    Gbif,
}

impl From<FormatArg> for SourceFormat {
    fn from(arg: FormatArg) -> Self {
        match arg {
            FormatArg::TabPipe => SourceFormat::TabPipe,
            FormatArg::Gbif => SourceFormat::Gbif,
        }
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let config = match &cli.config {
        Some(path) => LoaderConfig::from_json_file(path)
            .with_context(|| format!("reading loader config {}", path.display()))?,
        None => LoaderConfig::default(),
    };

    match cli.command {
        Commands::InitTax { input } => cmd_load(MergeStrategy::Initial, &input, config, cli.json),
        Commands::AddTax { input, root, flat } => {
            let strategy = match (root, flat) {
                (_, true) => MergeStrategy::Flat,
                (Some(root), false) => MergeStrategy::Onto(root),
                (None, false) => return Err(anyhow!("add-tax needs --root <node-id> or --flat")),
            };
            cmd_load(strategy, &input, config, cli.json)
        }
        Commands::Lookup { name, db } => cmd_lookup(&name, &db, cli.json),
        Commands::Stats { db } => cmd_stats(&db, cli.json),
        Commands::Checkpoint { db } => cmd_checkpoint(&db),
    }
}

fn init_tracing(verbose: bool) {
    let fallback = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(fallback));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn open_db(dir: &Path) -> Result<DurableGraph> {
    DurableGraph::open(StorageConfig::in_dir(dir))
        .with_context(|| format!("opening database {}", dir.display()))
}

/// A `--source` value naming an existing file is read as a descriptor;
/// anything else is taken as the source name.
fn resolve_source(arg: &str, format: Option<FormatArg>) -> Result<SourceDescriptor> {
    let path = Path::new(arg);
    let mut source = if path.is_file() {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("reading source descriptor {}", path.display()))?;
        SourceDescriptor::from_json(&text)
            .with_context(|| format!("parsing source descriptor {}", path.display()))?
    } else if arg.ends_with(".json") {
        return Err(anyhow!("source descriptor {arg} does not exist"));
    } else {
        SourceDescriptor::named(arg)
    };

    if let Some(format) = format {
        source.format = format.into();
    }
    Ok(source)
}

fn cmd_load(strategy: MergeStrategy, input: &SourceArgs, config: LoaderConfig, json: bool) -> Result<()> {
    let source = resolve_source(&input.source, input.format)?;
    let mut db = open_db(&input.db)?;

    if strategy == MergeStrategy::Initial && !db.graph().nodes_of_kind(NodeKind::Taxon).is_empty() {
        tracing::warn!(
            db = %input.db.display(),
            source = %source.name,
            "initial load into a database that already holds taxa; no names will be matched"
        );
    }

    let report = TaxonomyLoader::new(&mut db, config)
        .load_files(strategy, &source, &input.taxonomy, input.synonyms.as_deref())
        .with_context(|| format!("loading {} from {}", source.name, input.taxonomy.display()))?;

    output::print_report(&report, json)
}

fn cmd_lookup(name: &str, dir: &Path, json: bool) -> Result<()> {
    let db = open_db(dir)?;
    let matches = NameResolver::new(db.graph()).lookup(name);
    output::print_matches(name, &matches, json)
}

fn cmd_stats(dir: &Path, json: bool) -> Result<()> {
    let db = open_db(dir)?;
    let stats = output::GraphStats::collect(&db);
    output::print_stats(&stats, json)
}

fn cmd_checkpoint(dir: &Path) -> Result<()> {
    let mut db = open_db(dir)?;
    let bytes = db
        .checkpoint()
        .with_context(|| format!("checkpointing {}", dir.display()))?;
    println!(
        "{} {} ({} bytes, {} nodes)",
        "wrote".green().bold(),
        db.config().snapshot_path().display().to_string().bold(),
        bytes,
        db.node_count()
    );
    Ok(())
}
