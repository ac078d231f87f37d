//! Ingest command implementation

use std::{fs, time::Instant};

use anyhow::{Context, Result};
use ciff_format::CiffReader;
use ciff_ingest::{CfPolicy, IndexLoader, LoadParams};
use ciff_store::local::LocalDirStore;

use crate::utils;

/// Command-line options of the ingest command.
pub struct IngestOptions {
    pub input: String,
    pub db: String,
    pub schema: Option<String>,
    pub postings_batch_size: Option<usize>,
    pub docs_batch_size: Option<usize>,
    pub keep_cf: bool,
    pub replace: bool,
    pub config: Option<String>,
}

/// Run the ingest command
pub fn run(options: IngestOptions) -> Result<()> {
    utils::validate_file_exists(&options.input)?;
    let params = build_params(&options)?;
    let input_size = fs::metadata(&options.input)
        .with_context(|| format!("Failed to stat {}", options.input))?
        .len();
    println!(
        "Ingesting {} ({}) into {} (schema {})",
        options.input,
        utils::format_size(input_size),
        options.db,
        params.schema_name
    );

    let store = LocalDirStore::open(&options.db)
        .with_context(|| format!("Failed to open table directory {}", options.db))?;
    let mut reader = CiffReader::open(&options.input)
        .with_context(|| format!("Failed to read CIFF header from {}", options.input))?;
    let loader = IndexLoader::new(&store, params).with_context(|| "Invalid load parameters")?;

    let started = Instant::now();
    let summary = match loader.load(&mut reader) {
        Ok(summary) => summary,
        Err(e) => {
            let location = e
                .record_ordinal()
                .map(|ordinal| format!(", record {ordinal}"))
                .unwrap_or_default();
            let message = format!("Ingestion failed ({} phase{location})", e.phase());
            return Err(anyhow::Error::new(e).context(message));
        }
    };

    println!("Ingestion completed in {:.2?}", started.elapsed());
    println!("{}", serde_json::to_string_pretty(&summary)?);
    Ok(())
}

/// Combines the optional JSON config file with the command-line flags.
fn build_params(options: &IngestOptions) -> Result<LoadParams> {
    let mut params = match &options.config {
        Some(path) => {
            let text = fs::read_to_string(path)
                .with_context(|| format!("Failed to read config file {path}"))?;
            serde_json::from_str::<LoadParams>(&text)
                .with_context(|| format!("Failed to parse config file {path}"))?
        }
        None => LoadParams::default(),
    };
    if let Some(schema) = &options.schema {
        params.schema_name = schema.clone();
    }
    if let Some(size) = options.postings_batch_size {
        params.postings_batch_size = size;
    }
    if let Some(size) = options.docs_batch_size {
        params.docs_batch_size = size;
    }
    if options.keep_cf {
        params.cf_policy = CfPolicy::Keep;
    }
    if options.replace {
        params.replace_existing = true;
    }
    Ok(params)
}
