//! Inspect command implementation

use anyhow::{Context, Result};
use arrow::array::{AsArray, types::Float64Type, types::Int64Type};
use ciff_format::tables::{STATS_TABLE, columns};
use ciff_store::{TableRef, TableStore, read_table};
use serde::Serialize;

use crate::commands::open_existing_schema;

#[derive(Serialize)]
struct InspectSummary {
    schema: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    stats: Option<StatsInfo>,
    tables: Vec<TableInfo>,
}

#[derive(Serialize)]
struct StatsInfo {
    num_docs: i64,
    avgdl: f64,
}

#[derive(Serialize)]
struct TableInfo {
    name: String,
    row_count: u64,
    batch_count: u64,
    columns: Vec<ColumnInfo>,
}

#[derive(Serialize)]
struct ColumnInfo {
    name: String,
    #[serde(rename = "type")]
    data_type: String,
    nullable: bool,
}

/// Run the inspect command
pub fn run(db: String, schema: String) -> Result<()> {
    let store = open_existing_schema(&db, &schema)?;
    let summary = collect_summary(&store, &schema)?;
    println!("{}", serde_json::to_string_pretty(&summary)?);
    Ok(())
}

fn collect_summary(store: &dyn TableStore, schema: &str) -> Result<InspectSummary> {
    let mut tables = Vec::new();
    for name in store.list_tables(schema)? {
        let table = TableRef::new(schema, &name);
        tables.push(
            inspect_table(store, &table).with_context(|| format!("Failed to inspect {table}"))?,
        );
    }

    let stats_table = TableRef::new(schema, STATS_TABLE);
    let stats = if store.table_exists(&stats_table)? {
        read_stats(store, &stats_table)?
    } else {
        None
    };

    Ok(InspectSummary {
        schema: schema.to_string(),
        stats,
        tables,
    })
}

fn inspect_table(store: &dyn TableStore, table: &TableRef) -> Result<TableInfo> {
    let columns = store
        .table_schema(table)?
        .fields()
        .iter()
        .map(|field| ColumnInfo {
            name: field.name().clone(),
            data_type: field.data_type().to_string(),
            nullable: field.is_nullable(),
        })
        .collect();

    let mut row_count = 0;
    let mut batch_count = 0;
    for batch in store.scan(table)? {
        row_count += batch?.num_rows() as u64;
        batch_count += 1;
    }
    Ok(TableInfo {
        name: table.table.clone(),
        row_count,
        batch_count,
        columns,
    })
}

fn read_stats(store: &dyn TableStore, table: &TableRef) -> Result<Option<StatsInfo>> {
    let batches = read_table(store, table)?;
    let Some(batch) = batches.iter().find(|b| b.num_rows() > 0) else {
        return Ok(None);
    };
    let num_docs = batch
        .column_by_name(columns::NUM_DOCS)
        .and_then(|c| c.as_primitive_opt::<Int64Type>())
        .context("stats table has no int64 num_docs column")?;
    let avgdl = batch
        .column_by_name(columns::AVGDL)
        .and_then(|c| c.as_primitive_opt::<Float64Type>())
        .context("stats table has no float64 avgdl column")?;
    Ok(Some(StatsInfo {
        num_docs: num_docs.value(0),
        avgdl: avgdl.value(0),
    }))
}
