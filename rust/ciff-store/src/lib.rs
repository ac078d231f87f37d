//! Destination store for ingested indexes.
//!
//! A [`TableStore`] holds named tables grouped into namespaces. Tables are
//! created in bulk from a [`BatchStream`] of Arrow record batches conforming to
//! a declared schema, scanned back as batch streams, and dropped. There is no
//! row-level insert: relational reshaping (see [`ops`]) reads one table and
//! bulk-creates another.
//!
//! Implementations:
//! - [`memory::MemoryStore`]: tables held in memory.
//! - [`local::LocalDirStore`]: one directory per namespace, one Arrow IPC
//!   file per table.

use std::fmt;

use arrow_array::RecordBatch;
use arrow_schema::{Schema, SchemaRef};
use ciff_common::{Result, error::Error};

pub mod local;
pub mod memory;
pub mod ops;

/// An ordered stream of record batches sharing one declared schema.
pub trait BatchStream: Iterator<Item = Result<RecordBatch>> {
    /// The schema every batch of the stream must conform to.
    fn schema(&self) -> SchemaRef;
}

impl<S: BatchStream + ?Sized> BatchStream for Box<S> {
    fn schema(&self) -> SchemaRef {
        (**self).schema()
    }
}

/// Adapts any iterator of batches into a [`BatchStream`] with a declared
/// schema.
pub struct BatchIter<I> {
    schema: SchemaRef,
    inner: I,
}

impl<I> BatchIter<I>
where
    I: Iterator<Item = Result<RecordBatch>>,
{
    pub fn new(schema: SchemaRef, inner: I) -> BatchIter<I> {
        BatchIter { schema, inner }
    }
}

impl BatchIter<std::vec::IntoIter<Result<RecordBatch>>> {
    /// A stream over already materialized batches.
    pub fn from_batches(
        schema: SchemaRef,
        batches: Vec<RecordBatch>,
    ) -> BatchIter<std::vec::IntoIter<Result<RecordBatch>>> {
        BatchIter::new(
            schema,
            batches.into_iter().map(Ok).collect::<Vec<_>>().into_iter(),
        )
    }
}

impl<I> Iterator for BatchIter<I>
where
    I: Iterator<Item = Result<RecordBatch>>,
{
    type Item = Result<RecordBatch>;

    fn next(&mut self) -> Option<Self::Item> {
        self.inner.next()
    }
}

impl<I> BatchStream for BatchIter<I>
where
    I: Iterator<Item = Result<RecordBatch>>,
{
    fn schema(&self) -> SchemaRef {
        self.schema.clone()
    }
}

/// Fully qualified table name: `namespace.table`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TableRef {
    pub namespace: String,
    pub table: String,
}

impl TableRef {
    pub fn new(namespace: impl Into<String>, table: impl Into<String>) -> TableRef {
        TableRef {
            namespace: namespace.into(),
            table: table.into(),
        }
    }
}

impl fmt::Display for TableRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.namespace, self.table)
    }
}

/// Row and batch counts of a bulk table creation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TableStats {
    pub rows: u64,
    pub batches: u64,
}

/// A namespaced collection of append-once tables.
pub trait TableStore: Send + Sync {
    /// Creates an empty namespace. Fails with `NameCollision` if it exists.
    fn create_namespace(&self, namespace: &str) -> Result<()>;

    /// Drops a namespace together with all of its tables.
    fn drop_namespace(&self, namespace: &str) -> Result<()>;

    fn namespace_exists(&self, namespace: &str) -> Result<bool>;

    /// Names of the tables in `namespace`, sorted.
    fn list_tables(&self, namespace: &str) -> Result<Vec<String>>;

    fn table_exists(&self, table: &TableRef) -> Result<bool>;

    /// Creates `table` from the full contents of `batches`.
    ///
    /// Every batch must match the stream's declared schema exactly
    /// (`SchemaMismatch` otherwise). The creation is all-or-nothing: when the
    /// stream yields an error or a mismatching batch, no table is left
    /// behind. Fails with `NameCollision` if the table already exists.
    fn create_table(
        &self,
        table: &TableRef,
        batches: &mut dyn BatchStream,
    ) -> Result<TableStats>;

    fn table_schema(&self, table: &TableRef) -> Result<SchemaRef>;

    /// Streams the batches of `table` in their original order.
    fn scan(&self, table: &TableRef) -> Result<Box<dyn BatchStream + Send>>;

    fn drop_table(&self, table: &TableRef) -> Result<()>;
}

/// Verifies that `batch` conforms to the `declared` schema of `table`.
///
/// Field names, types and nullability must match; schema-level metadata is
/// ignored.
pub fn check_batch_schema(table: &TableRef, declared: &Schema, batch: &RecordBatch) -> Result<()> {
    let actual = batch.schema();
    if actual.fields() != declared.fields() {
        return Err(Error::schema_mismatch(
            table.to_string(),
            describe_schema(declared),
            describe_schema(&actual),
        ));
    }
    Ok(())
}

/// Compact `(name: type[?], ...)` rendering of a schema for error messages.
pub fn describe_schema(schema: &Schema) -> String {
    let fields = schema
        .fields()
        .iter()
        .map(|f| {
            format!(
                "{}: {}{}",
                f.name(),
                f.data_type(),
                if f.is_nullable() { "?" } else { "" }
            )
        })
        .collect::<Vec<_>>();
    format!("({})", fields.join(", "))
}

/// Checks that a namespace or table name is a plain identifier.
pub fn validate_name(kind: &str, name: &str) -> Result<()> {
    let valid = !name.is_empty()
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_')
        && !name.starts_with(|c: char| c.is_ascii_digit());
    if valid {
        Ok(())
    } else {
        Err(Error::invalid_arg(
            kind,
            format!("'{name}' is not a valid identifier"),
        ))
    }
}

/// Reads all batches of `table` into memory.
pub fn read_table(store: &dyn TableStore, table: &TableRef) -> Result<Vec<RecordBatch>> {
    store.scan(table)?.collect()
}

/// Counts the rows of `table` by scanning it.
pub fn count_rows(store: &dyn TableStore, table: &TableRef) -> Result<u64> {
    let mut rows = 0u64;
    for batch in store.scan(table)? {
        rows += batch?.num_rows() as u64;
    }
    Ok(rows)
}

/// Creates `table` from already materialized batches.
pub fn create_table_from_batches(
    store: &dyn TableStore,
    table: &TableRef,
    schema: SchemaRef,
    batches: Vec<RecordBatch>,
) -> Result<TableStats> {
    let mut stream = BatchIter::from_batches(schema, batches);
    store.create_table(table, &mut stream)
}

/// Drains `batches` into `append`, validating each batch against the stream
/// schema. Shared by the store implementations.
pub(crate) fn append_batches(
    table: &TableRef,
    batches: &mut dyn BatchStream,
    mut append: impl FnMut(RecordBatch) -> Result<()>,
) -> Result<TableStats> {
    let schema = batches.schema();
    let mut stats = TableStats::default();
    for batch in batches {
        let batch = batch?;
        check_batch_schema(table, &schema, &batch)?;
        stats.rows += batch.num_rows() as u64;
        stats.batches += 1;
        log::debug!(
            "{table}: appending batch #{} ({} rows)",
            stats.batches,
            batch.num_rows()
        );
        append(batch)?;
    }
    Ok(stats)
}
