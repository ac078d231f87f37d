//! Fixed-capacity columnar batch assembly.
//!
//! A [`BatchAssembler`] accumulates rows into a [`RowBuffer`] and emits an
//! Arrow [`RecordBatch`] every time `capacity` rows have been pushed. Rows are
//! appended straight into per-column vectors, so at most one batch worth of
//! rows is held in memory.

use std::sync::Arc;

use arrow_array::{ArrayRef, Int32Array, Int64Array, ListArray, RecordBatch, StringArray, StructArray};
use arrow_buffer::OffsetBuffer;
use arrow_schema::SchemaRef;
use ciff_common::{Result, error::Error, verify_arg};
use ciff_format::{
    DocRecord, Posting,
    tables::{posting_fields, posting_list_item_field, staging_docs_schema, staging_postings_schema},
};

/// Column-oriented buffer of pending rows of one batch.
pub trait RowBuffer {
    type Row;

    /// Schema of the batches built by [`flush`](RowBuffer::flush).
    fn schema(&self) -> SchemaRef;

    /// Number of buffered rows.
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn push(&mut self, row: Self::Row) -> Result<()>;

    /// Builds a batch from the buffered rows and resets the buffer.
    fn flush(&mut self) -> Result<RecordBatch>;
}

/// Groups pushed rows into batches of exactly `capacity` rows.
///
/// For `n` pushed rows the assembler emits `ceil(n / capacity)` batches, all
/// full except possibly the last. When no row was pushed at all,
/// [`finish`](BatchAssembler::finish) emits a single zero-row batch so that
/// every stream carries at least one batch of the declared schema.
pub struct BatchAssembler<B> {
    buffer: B,
    capacity: usize,
    rows: u64,
    batches: u64,
}

impl<B: RowBuffer> BatchAssembler<B> {
    pub fn new(buffer: B, capacity: usize) -> Result<BatchAssembler<B>> {
        verify_arg!(capacity, capacity > 0);
        Ok(BatchAssembler {
            buffer,
            capacity,
            rows: 0,
            batches: 0,
        })
    }

    pub fn schema(&self) -> SchemaRef {
        self.buffer.schema()
    }

    /// Total number of rows pushed.
    pub fn rows(&self) -> u64 {
        self.rows
    }

    /// Number of batches emitted so far.
    pub fn batches(&self) -> u64 {
        self.batches
    }

    /// Appends a row, returning a full batch when the capacity is reached.
    pub fn push(&mut self, row: B::Row) -> Result<Option<RecordBatch>> {
        self.buffer.push(row)?;
        self.rows += 1;
        if self.buffer.len() >= self.capacity {
            self.emit().map(Some)
        } else {
            Ok(None)
        }
    }

    /// Emits the final partial batch.
    ///
    /// Returns `None` when the last pushed row completed a full batch.
    pub fn finish(&mut self) -> Result<Option<RecordBatch>> {
        if self.buffer.is_empty() && self.batches > 0 {
            return Ok(None);
        }
        self.emit().map(Some)
    }

    fn emit(&mut self) -> Result<RecordBatch> {
        let batch = self.buffer.flush()?;
        self.batches += 1;
        log::debug!(
            "Assembled batch #{} with {} rows",
            self.batches,
            batch.num_rows()
        );
        Ok(batch)
    }
}

/// One term of the postings stream with its decoded (absolute) postings.
#[derive(Debug, Clone, PartialEq)]
pub struct TermRow {
    pub term: String,
    pub term_id: u64,
    pub df: i64,
    pub cf: i64,
    pub postings: Vec<Posting>,
}

/// Buffers rows of the staging postings table,
/// `(term, term_id, df, cf, postings: list<struct<docid, tf>>)`.
pub struct PostingsRowBuffer {
    schema: SchemaRef,
    terms: Vec<String>,
    term_ids: Vec<i64>,
    dfs: Vec<i64>,
    cfs: Vec<i64>,
    offsets: Vec<i32>,
    docids: Vec<i32>,
    tfs: Vec<i32>,
}

impl PostingsRowBuffer {
    pub fn new() -> PostingsRowBuffer {
        PostingsRowBuffer {
            schema: staging_postings_schema(),
            terms: Vec::new(),
            term_ids: Vec::new(),
            dfs: Vec::new(),
            cfs: Vec::new(),
            offsets: vec![0],
            docids: Vec::new(),
            tfs: Vec::new(),
        }
    }
}

impl Default for PostingsRowBuffer {
    fn default() -> Self {
        Self::new()
    }
}

impl RowBuffer for PostingsRowBuffer {
    type Row = TermRow;

    fn schema(&self) -> SchemaRef {
        self.schema.clone()
    }

    fn len(&self) -> usize {
        self.terms.len()
    }

    fn push(&mut self, row: TermRow) -> Result<()> {
        let end = i32::try_from(self.docids.len() + row.postings.len()).map_err(|_| {
            Error::invalid_arg(
                "postings_batch_size",
                format!(
                    "more than {} postings in one batch at term '{}'",
                    i32::MAX,
                    row.term
                ),
            )
        })?;
        for posting in &row.postings {
            self.docids.push(posting.docid);
            self.tfs.push(posting.tf);
        }
        self.offsets.push(end);
        self.terms.push(row.term);
        self.term_ids.push(row.term_id as i64);
        self.dfs.push(row.df);
        self.cfs.push(row.cf);
        Ok(())
    }

    fn flush(&mut self) -> Result<RecordBatch> {
        let postings = StructArray::try_new(
            posting_fields(),
            vec![
                Arc::new(Int32Array::from(std::mem::take(&mut self.docids))) as ArrayRef,
                Arc::new(Int32Array::from(std::mem::take(&mut self.tfs))),
            ],
            None,
        )?;
        let offsets = std::mem::replace(&mut self.offsets, vec![0]);
        let postings = ListArray::try_new(
            posting_list_item_field(),
            OffsetBuffer::new(offsets.into()),
            Arc::new(postings),
            None,
        )?;
        let columns: Vec<ArrayRef> = vec![
            Arc::new(StringArray::from(std::mem::take(&mut self.terms))),
            Arc::new(Int64Array::from(std::mem::take(&mut self.term_ids))),
            Arc::new(Int64Array::from(std::mem::take(&mut self.dfs))),
            Arc::new(Int64Array::from(std::mem::take(&mut self.cfs))),
            Arc::new(postings),
        ];
        Ok(RecordBatch::try_new(self.schema.clone(), columns)?)
    }
}

/// Buffers rows of the staging docs table,
/// `(docid: int32, collection_docid: utf8, doclength: int32)`.
pub struct DocsRowBuffer {
    schema: SchemaRef,
    docids: Vec<i32>,
    names: Vec<String>,
    lengths: Vec<i32>,
}

impl DocsRowBuffer {
    pub fn new() -> DocsRowBuffer {
        DocsRowBuffer {
            schema: staging_docs_schema(),
            docids: Vec::new(),
            names: Vec::new(),
            lengths: Vec::new(),
        }
    }
}

impl Default for DocsRowBuffer {
    fn default() -> Self {
        Self::new()
    }
}

impl RowBuffer for DocsRowBuffer {
    type Row = DocRecord;

    fn schema(&self) -> SchemaRef {
        self.schema.clone()
    }

    fn len(&self) -> usize {
        self.docids.len()
    }

    fn push(&mut self, doc: DocRecord) -> Result<()> {
        self.docids.push(doc.docid);
        self.names.push(doc.collection_docid);
        self.lengths.push(doc.doclength);
        Ok(())
    }

    fn flush(&mut self) -> Result<RecordBatch> {
        let columns: Vec<ArrayRef> = vec![
            Arc::new(Int32Array::from(std::mem::take(&mut self.docids))),
            Arc::new(StringArray::from(std::mem::take(&mut self.names))),
            Arc::new(Int32Array::from(std::mem::take(&mut self.lengths))),
        ];
        Ok(RecordBatch::try_new(self.schema.clone(), columns)?)
    }
}
