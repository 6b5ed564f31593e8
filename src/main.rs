use clap::{Parser, Subcommand};
use schoolyard_core::{clones_of, CloneGraphMaintainer, SentenceRepository};
use schoolyard_storage::{StorageConfig, StorageManager};
use std::path::PathBuf;
use tracing::{info, warn, Level};
use tracing_subscriber::FmtSubscriber;

/// Find and track near-duplicate sentences in a Schoolyard corpus
#[derive(Parser, Debug)]
#[command(name = "schoolyard")]
#[command(about = "Clone detection for Schoolyard sentences", long_about = None)]
struct Args {
    /// Path to the data directory
    #[arg(short, long, default_value = "./data")]
    data_dir: PathBuf,

    /// Word vector dimension
    #[arg(long, default_value_t = schoolyard_core::DEFAULT_DIMENSION)]
    dimension: usize,

    /// Log level
    #[arg(long, default_value = "info")]
    log_level: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Load a word2vec text file
    ImportVectors { path: PathBuf },

    /// Load a corpus JSON dump
    ImportCorpus { path: PathBuf },

    /// Embed sentences and update their clone edges
    Process {
        /// Sentence ids to process
        ids: Vec<u64>,

        /// Process the whole corpus
        #[arg(long, conflicts_with = "ids")]
        all: bool,
    },

    /// Print the clone edges of a sentence as JSON
    Clones {
        id: u64,

        /// Only edges at or below this distance
        #[arg(long)]
        max_distance: Option<f32>,
    },
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let log_level = match args.log_level.as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    let subscriber = FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_writer(std::io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    info!("Starting schoolyard v{}", env!("CARGO_PKG_VERSION"));
    info!("Data directory: {:?}", args.data_dir);

    let config = StorageConfig {
        dimension: args.dimension,
        ..StorageConfig::default()
    };
    let manager = StorageManager::new(&args.data_dir, config)?;

    match args.command {
        Command::ImportVectors { path } => {
            let written = manager.import_word_vectors(&path)?;
            println!("{}", serde_json::json!({ "word_vectors": written }));
        }
        Command::ImportCorpus { path } => {
            let summary = manager.import_corpus(&path)?;
            println!("{}", serde_json::to_string(&summary)?);
        }
        Command::Process { ids, all } => {
            let maintainer = manager.maintainer()?;
            if all {
                let report = maintainer.rebuild_all()?;
                println!("{}", serde_json::to_string(&report)?);
            } else {
                process_ids(&maintainer, &ids)?;
            }
        }
        Command::Clones { id, max_distance } => {
            // fail loudly on unknown ids rather than printing an empty list
            manager.storage().get_by_id(id)?;
            let edges = clones_of(manager.storage().as_ref(), id, max_distance)?;
            println!("{}", serde_json::to_string_pretty(&edges)?);
        }
    }

    manager.save()?;
    Ok(())
}

fn process_ids(maintainer: &CloneGraphMaintainer, ids: &[u64]) -> anyhow::Result<()> {
    let mut failures = 0usize;
    for &id in ids {
        match maintainer.process_sentence(id) {
            Ok(report) => {
                println!("{}", serde_json::json!({ "sentence": id, "report": report }));
            }
            Err(e) => {
                warn!(sentence = id, error = %e, "processing failed");
                failures += 1;
            }
        }
    }
    if failures > 0 {
        anyhow::bail!("{} of {} sentences failed", failures, ids.len());
    }
    Ok(())
}
