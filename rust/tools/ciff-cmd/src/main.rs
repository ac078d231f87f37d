use anyhow::Result;
use clap::{Parser, Subcommand};

mod commands;
mod utils;

#[derive(Parser)]
#[command(name = "ciff-cmd")]
#[command(about = "Command-line utility for loading CIFF index exports into columnar tables")]
#[command(version)]
struct Cli {
    /// Increase log verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Ingest a CIFF file (raw, gzip or zstd) into a table directory
    Ingest {
        /// CIFF file to ingest
        #[arg(short, long)]
        input: String,

        /// Destination table directory
        #[arg(long)]
        db: String,

        /// Destination schema (namespace) name [default: ows]
        #[arg(long)]
        schema: Option<String>,

        /// Number of postings lists per staging batch
        #[arg(long)]
        postings_batch_size: Option<usize>,

        /// Number of documents per staging batch
        #[arg(long)]
        docs_batch_size: Option<usize>,

        /// Keep the collection frequency column in the dict table
        #[arg(long)]
        keep_cf: bool,

        /// Drop an existing schema of the same name before loading
        #[arg(long)]
        replace: bool,

        /// JSON file with load parameters; command-line flags take precedence
        #[arg(long)]
        config: Option<String>,
    },

    /// Print a JSON summary of the tables of a loaded index
    Inspect {
        /// Table directory
        #[arg(long)]
        db: String,

        /// Schema (namespace) name
        #[arg(long, default_value = "ows")]
        schema: String,
    },

    /// Look up terms containing any of the given patterns and print their postings
    Lookup {
        /// Table directory
        #[arg(long)]
        db: String,

        /// Schema (namespace) name
        #[arg(long, default_value = "ows")]
        schema: String,

        /// Maximum number of postings rows to print
        #[arg(long, default_value_t = 100)]
        limit: usize,

        /// Substrings to match against terms
        #[arg(required = true)]
        patterns: Vec<String>,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    utils::init_logging(cli.verbose);

    match cli.command {
        Commands::Ingest {
            input,
            db,
            schema,
            postings_batch_size,
            docs_batch_size,
            keep_cf,
            replace,
            config,
        } => commands::ingest::run(commands::ingest::IngestOptions {
            input,
            db,
            schema,
            postings_batch_size,
            docs_batch_size,
            keep_cf,
            replace,
            config,
        }),
        Commands::Inspect { db, schema } => commands::inspect::run(db, schema),
        Commands::Lookup {
            db,
            schema,
            limit,
            patterns,
        } => commands::lookup::run(db, schema, patterns, limit),
    }
}
