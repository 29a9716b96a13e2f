//! Girder CLI - Command line interface for the entity-relationship graph

use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

mod commands;
mod config;
mod output;

use commands::{analyze, completions, entity, graph, io, relation};
use config::{Backend, Config};
use girder_engine::{GraphEngine, PropertyMetrics};
use girder_storage::{MemoryStorage, StorageBackend};
use output::OutputFormat;

#[derive(Parser)]
#[command(name = "girder")]
#[command(author, version, about = "Entity-relationship graph engine for buildings and devices")]
pub struct Cli {
    /// Data directory
    #[arg(short, long, global = true, env = "GIRDER_DATA_DIR")]
    pub data_dir: Option<PathBuf>,

    /// Storage backend (defaults to the config file, then redb)
    #[arg(short, long, global = true, value_enum)]
    pub backend: Option<Backend>,

    /// Output format (defaults to the config file, then table)
    #[arg(short, long, global = true, value_enum)]
    pub format: Option<OutputFormat>,

    /// Verbosity level (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress output except errors
    #[arg(short, long, global = true)]
    pub quiet: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Manage entities and their properties
    Entity(entity::EntityArgs),
    /// Manage relationships
    Relation(relation::RelationArgs),
    /// Walk the graph
    Graph(graph::GraphArgs),
    /// Topology, impact, metrics and status reports
    Analyze(analyze::AnalyzeArgs),
    /// Export the whole graph
    Export(io::ExportArgs),
    /// Import a JSON snapshot
    Import(io::ImportArgs),
    /// Manage configuration
    Config(commands::config::ConfigArgs),
    /// Generate shell completions
    Completions(completions::CompletionsArgs),
}

/// Application context with the engine wired to the selected backend
pub struct AppContext {
    pub engine: GraphEngine,
    pub format: OutputFormat,
}

impl AppContext {
    pub async fn new(cli: &Cli, config: Config) -> anyhow::Result<Self> {
        let backend = cli.backend.unwrap_or(config.backend);
        let format = cli.format.unwrap_or(config.format);
        let data_dir = cli.data_dir.clone().unwrap_or_else(|| config.data_dir());

        let storage = open_storage(backend, &data_dir)?;
        storage.initialize().await?;

        let engine = GraphEngine::new(storage.clone(), config.engine)
            .with_metrics(Arc::new(PropertyMetrics::new(storage)));

        Ok(Self { engine, format })
    }
}

fn open_storage(
    backend: Backend,
    data_dir: &std::path::Path,
) -> anyhow::Result<Arc<dyn StorageBackend>> {
    if let Some(file) = backend.file_name() {
        std::fs::create_dir_all(data_dir)?;
        tracing::debug!("Using {} database at: {:?}", backend.as_str(), data_dir.join(file));
    }

    let storage: Arc<dyn StorageBackend> = match backend {
        #[cfg(feature = "redb")]
        Backend::Redb => Arc::new(girder_storage::RedbStorage::open(
            data_dir.join("girder.redb"),
        )?),
        #[cfg(feature = "sqlite")]
        Backend::Sqlite => Arc::new(girder_storage::SqliteStorage::open(
            data_dir.join("girder.db"),
        )?),
        Backend::Memory => {
            tracing::warn!("Using in-memory storage; nothing will be saved");
            Arc::new(MemoryStorage::new())
        }
        #[allow(unreachable_patterns)]
        other => anyhow::bail!(
            "Backend '{}' not enabled. Rebuild with --features {}",
            other.as_str(),
            other.as_str()
        ),
    };
    Ok(storage)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Set up logging based on verbosity
    let filter = match cli.verbose {
        0 if cli.quiet => "error",
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| filter.into()))
        .init();

    tracing::debug!("Starting girder CLI");

    // These never touch storage
    match &cli.command {
        Commands::Config(args) => return commands::config::run(args),
        Commands::Completions(args) => return completions::run(args),
        _ => {}
    }

    let config = Config::load()?;
    let ctx = AppContext::new(&cli, config).await?;

    match &cli.command {
        Commands::Entity(args) => entity::run(args, &ctx).await?,
        Commands::Relation(args) => relation::run(args, &ctx).await?,
        Commands::Graph(args) => graph::run(args, &ctx).await?,
        Commands::Analyze(args) => analyze::run(args, &ctx).await?,
        Commands::Export(args) => io::run_export(args, &ctx).await?,
        Commands::Import(args) => io::run_import(args, &ctx).await?,
        Commands::Config(_) | Commands::Completions(_) => {}
    }

    ctx.engine.storage().close().await?;
    Ok(())
}
