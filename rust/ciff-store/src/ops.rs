//! Set-based relational operations between tables of a [`TableStore`].
//!
//! Each operation scans its source table and bulk-creates the target table
//! from a transformed batch stream. Transformations work on whole batches
//! with Arrow kernels (`cast`, `take`), never row by row, and only one
//! source batch is in flight at a time.

use std::sync::Arc;

use arrow_array::{Array, ArrayRef, RecordBatch, UInt32Array, cast::AsArray};
use arrow_schema::{DataType, Field, Schema, SchemaRef};
use ciff_common::{Result, error::Error, try_or_ret_some_err};

use crate::{BatchStream, TableRef, TableStats, TableStore};

/// One output column of a projection.
#[derive(Debug, Clone, PartialEq)]
pub struct ColumnProjection {
    /// Source column name.
    pub source: String,
    /// Output column name.
    pub alias: String,
    /// Target type, if the column is cast.
    pub cast: Option<DataType>,
}

impl ColumnProjection {
    /// Selects `name` unchanged.
    pub fn column(name: impl Into<String>) -> ColumnProjection {
        let name = name.into();
        ColumnProjection {
            alias: name.clone(),
            source: name,
            cast: None,
        }
    }

    /// Selects `source` under a new name.
    pub fn renamed(source: impl Into<String>, alias: impl Into<String>) -> ColumnProjection {
        ColumnProjection {
            source: source.into(),
            alias: alias.into(),
            cast: None,
        }
    }

    /// Casts the column to `data_type`.
    pub fn cast_to(self, data_type: DataType) -> ColumnProjection {
        ColumnProjection {
            cast: Some(data_type),
            ..self
        }
    }
}

/// `CREATE TABLE target AS SELECT <columns> FROM source`.
pub fn project(
    store: &dyn TableStore,
    source: &TableRef,
    target: &TableRef,
    columns: &[ColumnProjection],
) -> Result<TableStats> {
    let input = store.scan(source)?;
    let mut stream = ProjectStream::try_new(input, columns)?;
    log::info!("Projecting {source} into {target}");
    store.create_table(target, &mut stream)
}

/// `CREATE TABLE target AS SELECT <keep>, unnest(<list_column>, recursive) FROM source`.
///
/// `list_column` must be a `List<Struct<...>>` column. Every list element
/// becomes one output row made of the `keep` columns of its parent row
/// followed by the fields of the struct element. Rows with empty lists
/// produce no output.
pub fn unnest(
    store: &dyn TableStore,
    source: &TableRef,
    target: &TableRef,
    keep: &[&str],
    list_column: &str,
) -> Result<TableStats> {
    let input = store.scan(source)?;
    let mut stream = UnnestStream::try_new(input, keep, list_column)?;
    log::info!("Unnesting {source}.{list_column} into {target}");
    store.create_table(target, &mut stream)
}

fn column_index(schema: &Schema, name: &str) -> Result<usize> {
    schema
        .index_of(name)
        .map_err(|_| Error::invalid_arg("column", format!("no column named '{name}'")))
}

/// Batch stream applying a column projection to each input batch.
pub struct ProjectStream<S> {
    input: S,
    schema: SchemaRef,
    indices: Vec<usize>,
    casts: Vec<Option<DataType>>,
}

impl<S: BatchStream> ProjectStream<S> {
    pub fn try_new(input: S, columns: &[ColumnProjection]) -> Result<ProjectStream<S>> {
        let input_schema = input.schema();
        let mut fields = Vec::with_capacity(columns.len());
        let mut indices = Vec::with_capacity(columns.len());
        let mut casts = Vec::with_capacity(columns.len());
        for column in columns {
            let index = column_index(&input_schema, &column.source)?;
            let source_field = input_schema.field(index);
            let data_type = match &column.cast {
                Some(data_type) => {
                    if !arrow_cast::can_cast_types(source_field.data_type(), data_type) {
                        return Err(Error::invalid_arg(
                            "cast",
                            format!(
                                "cannot cast '{}' from {} to {data_type}",
                                column.source,
                                source_field.data_type()
                            ),
                        ));
                    }
                    data_type.clone()
                }
                None => source_field.data_type().clone(),
            };
            fields.push(Field::new(
                &column.alias,
                data_type,
                source_field.is_nullable(),
            ));
            indices.push(index);
            casts.push(column.cast.clone());
        }
        Ok(ProjectStream {
            input,
            schema: Arc::new(Schema::new(fields)),
            indices,
            casts,
        })
    }

    fn project_batch(&self, batch: &RecordBatch) -> Result<RecordBatch> {
        let columns = self
            .indices
            .iter()
            .zip(&self.casts)
            .map(|(&index, cast)| {
                let column = batch.column(index);
                match cast {
                    Some(data_type) if column.data_type() != data_type => {
                        arrow_cast::cast(column, data_type).map_err(Error::from)
                    }
                    _ => Ok(column.clone()),
                }
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(RecordBatch::try_new(self.schema.clone(), columns)?)
    }
}

impl<S: BatchStream> Iterator for ProjectStream<S> {
    type Item = Result<RecordBatch>;

    fn next(&mut self) -> Option<Self::Item> {
        let batch = try_or_ret_some_err!(self.input.next()?);
        Some(self.project_batch(&batch))
    }
}

impl<S: BatchStream> BatchStream for ProjectStream<S> {
    fn schema(&self) -> SchemaRef {
        self.schema.clone()
    }
}

/// Batch stream flattening a `List<Struct>` column of each input batch.
pub struct UnnestStream<S> {
    input: S,
    schema: SchemaRef,
    keep: Vec<usize>,
    list_index: usize,
}

impl<S: BatchStream> UnnestStream<S> {
    pub fn try_new(input: S, keep: &[&str], list_column: &str) -> Result<UnnestStream<S>> {
        let input_schema = input.schema();
        let list_index = column_index(&input_schema, list_column)?;
        let struct_fields = match input_schema.field(list_index).data_type() {
            DataType::List(item) => match item.data_type() {
                DataType::Struct(fields) => fields.clone(),
                other => {
                    return Err(Error::invalid_arg(
                        "list_column",
                        format!("'{list_column}' elements are {other}, expected a struct"),
                    ));
                }
            },
            other => {
                return Err(Error::invalid_arg(
                    "list_column",
                    format!("'{list_column}' is {other}, expected a list"),
                ));
            }
        };

        let keep = keep
            .iter()
            .map(|name| column_index(&input_schema, name))
            .collect::<Result<Vec<_>>>()?;
        let fields = keep
            .iter()
            .map(|&index| input_schema.field(index).clone())
            .chain(struct_fields.iter().map(|f| f.as_ref().clone()))
            .collect::<Vec<_>>();
        Ok(UnnestStream {
            input,
            schema: Arc::new(Schema::new(fields)),
            keep,
            list_index,
        })
    }

    fn unnest_batch(&self, batch: &RecordBatch) -> Result<RecordBatch> {
        let list = batch.column(self.list_index).as_list::<i32>();
        let offsets = list.value_offsets();
        let first = offsets[0] as usize;
        let last = offsets[offsets.len() - 1] as usize;

        // Parent row index of every list element.
        let mut parents = Vec::with_capacity(last - first);
        for (row, bounds) in offsets.windows(2).enumerate() {
            if list.is_null(row) {
                continue;
            }
            let count = (bounds[1] - bounds[0]) as usize;
            parents.extend(std::iter::repeat_n(row as u32, count));
        }
        let parents = UInt32Array::from(parents);

        let mut columns: Vec<ArrayRef> = Vec::with_capacity(self.schema.fields().len());
        for &index in &self.keep {
            columns.push(arrow_select::take::take(
                batch.column(index).as_ref(),
                &parents,
                None,
            )?);
        }
        let elements = list.values().slice(first, last - first);
        columns.extend(elements.as_struct().columns().iter().cloned());
        Ok(RecordBatch::try_new(self.schema.clone(), columns)?)
    }
}

impl<S: BatchStream> Iterator for UnnestStream<S> {
    type Item = Result<RecordBatch>;

    fn next(&mut self) -> Option<Self::Item> {
        let batch = try_or_ret_some_err!(self.input.next()?);
        Some(self.unnest_batch(&batch))
    }
}

impl<S: BatchStream> BatchStream for UnnestStream<S> {
    fn schema(&self) -> SchemaRef {
        self.schema.clone()
    }
}
