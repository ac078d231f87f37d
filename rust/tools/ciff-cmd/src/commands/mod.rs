//! Command implementations for ciff-cmd

use anyhow::{Context, Result};
use ciff_store::{TableStore, local::LocalDirStore};

use crate::utils;

pub mod ingest;
pub mod inspect;
pub mod lookup;

/// Opens an existing table directory and checks that `schema` is present.
pub fn open_existing_schema(db: &str, schema: &str) -> Result<LocalDirStore> {
    utils::validate_dir_exists(db)?;
    let store =
        LocalDirStore::open(db).with_context(|| format!("Failed to open table directory {db}"))?;
    if !store.namespace_exists(schema)? {
        anyhow::bail!("Schema '{}' does not exist in {}", schema, db);
    }
    Ok(store)
}
