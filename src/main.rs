use std::io::{BufRead, Write};
use std::path::PathBuf;

use acctree::io::store::SnapshotStore;
use acctree::sync::{self, LoadOptions, LoadResult};
use acctree::{Result, ToolError};
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

fn main() {
    let cli = Cli::parse();
    if let Err(error) = init_logging().and_then(|()| run(cli)) {
        eprintln!("error: {error}");
        std::process::exit(1);
    }
}

fn init_logging() -> Result<()> {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("acctree=info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init()
        .map_err(|err| ToolError::Logging(err.to_string()))
}

fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Command::Load(args) => execute_load(args),
        Command::Dump(args) => execute_dump(args),
    }
}

fn execute_load(args: LoadArgs) -> Result<()> {
    if !args.file.exists() {
        return Err(ToolError::MissingInput(args.file));
    }

    let mut store = SnapshotStore::open(&args.store)?;
    let options = LoadOptions {
        cluster: args.cluster,
    };
    let result = sync::load_file(&args.file, &store, &options)?;
    print!("{result}");

    if result.halted {
        println!("Nothing committed.");
        return Ok(());
    }
    if !result.has_changes() {
        println!("Nothing new to commit.");
        return Ok(());
    }
    if args.dry_run || !(args.yes || confirm(&result)?) {
        println!("Changes discarded.");
        return Ok(());
    }

    let Some(cluster) = result.cluster.clone() else {
        return Ok(());
    };
    let report = sync::commit(&result, &mut store.committer(&cluster));
    let committed = report.committed;
    let outcome = report.into_result();
    // Whatever made it in before a failure is persisted.
    store.save(&args.store)?;
    outcome?;
    println!("Committed {committed} change(s).");
    Ok(())
}

fn execute_dump(args: DumpArgs) -> Result<()> {
    let store = SnapshotStore::open(&args.store)?;
    sync::dump_cluster(&store, &args.cluster, args.output.as_deref())
}

fn confirm(result: &LoadResult) -> Result<bool> {
    if !result.errors.is_empty() {
        println!("The file has {} problem(s).", result.errors.len());
    }
    print!("Would you like to commit changes? (y/N): ");
    std::io::stdout().flush()?;
    let mut answer = String::new();
    std::io::stdin().lock().read_line(&mut answer)?;
    Ok(matches!(answer.trim(), "y" | "Y" | "yes" | "Yes"))
}

#[derive(Parser)]
#[command(
    author,
    version,
    about = "Load and dump a cluster's account hierarchy as flat text."
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Reconcile a load file against the store and commit the differences.
    Load(LoadArgs),
    /// Write a cluster's hierarchy as a load file.
    Dump(DumpArgs),
}

#[derive(clap::Args)]
struct LoadArgs {
    /// JSON store holding the live accounting state.
    #[arg(long)]
    store: PathBuf,

    /// Load file to read.
    #[arg(long)]
    file: PathBuf,

    /// Load into this cluster instead of the one named in the file.
    #[arg(long)]
    cluster: Option<String>,

    /// Commit without asking.
    #[arg(long, short = 'y')]
    yes: bool,

    /// Only report what would change.
    #[arg(long, conflicts_with = "yes")]
    dry_run: bool,
}

#[derive(clap::Args)]
struct DumpArgs {
    /// JSON store holding the live accounting state.
    #[arg(long)]
    store: PathBuf,

    /// Cluster to dump.
    #[arg(long)]
    cluster: String,

    /// Output file; stdout when omitted.
    #[arg(long)]
    output: Option<PathBuf>,
}
