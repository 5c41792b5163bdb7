#![forbid(unsafe_code)]

mod cmd;
mod output;

use clap::{Parser, Subcommand};
use output::{CliError, OutputMode, Reported, render_error, resolve_output_mode};
use quarry_core::config::load_config;
use quarry_search::RetrievalService;
use std::env;
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::debug;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

#[derive(Parser, Debug)]
#[command(
    author,
    version,
    about = "quarry: hybrid lexical + semantic document retrieval",
    long_about = None
)]
struct Cli {
    /// Enable verbose logging.
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Database file (overrides config and QUARRY_DB).
    #[arg(long, global = true)]
    db: Option<PathBuf>,

    /// Config file (defaults to <config dir>/quarry/config.toml).
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Output format.
    #[arg(long, global = true, value_enum)]
    format: Option<OutputMode>,

    /// Alias for `--format json`.
    #[arg(long, global = true, hide = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

impl Cli {
    fn output_mode(&self) -> OutputMode {
        resolve_output_mode(self.format, self.json)
    }
}

#[derive(Subcommand, Debug)]
enum Commands {
    #[command(
        next_help_heading = "Ingest",
        about = "Ingest text files",
        long_about = "Decode, embed and store one or more text files. Several files are stored all-or-nothing.",
        after_help = "EXAMPLES:\n    # Upload a file\n    quarry upload notes.txt\n\n    # Upload several files in one batch\n    quarry upload a.txt b.txt --json"
    )]
    Upload(cmd::upload::UploadArgs),

    #[command(
        next_help_heading = "Read",
        about = "Search stored documents",
        long_about = "Run a keyword (BM25), semantic (cosine) or hybrid (0.5/0.5 fused) query.",
        after_help = "EXAMPLES:\n    # Hybrid search (default)\n    quarry search \"machine learning\"\n\n    # Keyword only, top 5\n    quarry search machine --mode keyword -n 5\n\n    # Emit machine-readable output\n    quarry search machine --json"
    )]
    Search(cmd::search::SearchArgs),

    #[command(
        next_help_heading = "Read",
        about = "List stored documents",
        long_about = "List stored documents, newest first, without their content.",
        after_help = "EXAMPLES:\n    # List documents\n    quarry list\n\n    # Only the ten most recent\n    quarry list -n 10"
    )]
    List(cmd::list::ListArgs),

    #[command(
        next_help_heading = "Read",
        about = "Show one document",
        after_help = "EXAMPLES:\n    quarry show 12\n    quarry show 12 --json"
    )]
    Show(cmd::show::ShowArgs),

    #[command(
        next_help_heading = "Maintenance",
        about = "Delete a document",
        long_about = "Delete a document together with its lexical and vector index entries.",
        after_help = "EXAMPLES:\n    quarry delete 12"
    )]
    Delete(cmd::delete::DeleteArgs),

    #[command(
        next_help_heading = "Maintenance",
        about = "Rebuild the lexical index",
        long_about = "Rebuild the full-text index from the documents table and verify it matches."
    )]
    Rebuild,
}

fn init_tracing(verbose: bool) {
    let filter = EnvFilter::try_from_env("QUARRY_LOG").unwrap_or_else(|_| {
        EnvFilter::new(if verbose || env::var("DEBUG").is_ok() {
            "quarry=debug,info"
        } else {
            "quarry=info,warn"
        })
    });

    let format = env::var("QUARRY_LOG_FORMAT").unwrap_or_else(|_| "compact".to_string());

    let registry = tracing_subscriber::registry().with(filter);

    match format.as_str() {
        "json" => {
            registry
                .with(fmt::layer().json().with_ansi(false).with_writer(std::io::stderr))
                .init();
        }
        _ => {
            registry
                .with(fmt::layer().compact().with_writer(std::io::stderr))
                .init();
        }
    }
}

fn open_service(cli: &Cli) -> anyhow::Result<RetrievalService> {
    let mut config = load_config(cli.config.as_deref())?;
    if let Some(db) = &cli.db {
        config.store.path = Some(db.clone());
    }
    debug!(?config, "configuration resolved");
    RetrievalService::open(&config)
}

fn run(cli: &Cli, output: OutputMode) -> anyhow::Result<()> {
    let service = open_service(cli)?;
    match &cli.command {
        Commands::Upload(args) => cmd::upload::run_upload(args, &service, output),
        Commands::Search(args) => cmd::search::run_search(args, &service, output),
        Commands::List(args) => cmd::list::run_list(args, &service, output),
        Commands::Show(args) => cmd::show::run_show(args, &service, output),
        Commands::Delete(args) => cmd::delete::run_delete(args, &service, output),
        Commands::Rebuild => cmd::rebuild::run_rebuild(&service, output),
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose);
    let output = cli.output_mode();

    match run(&cli, output) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            if let Some(reported) = err.downcast_ref::<Reported>() {
                return ExitCode::from(reported.exit_code);
            }
            // Config and store-open failures have not been rendered yet.
            if render_error(output, &CliError::new(format!("{err:#}"))).is_err() {
                eprintln!("error: {err:#}");
            }
            ExitCode::FAILURE
        }
    }
}
