//! Batch streams over the two record sections of a CIFF reader.
//!
//! [`PostingsBatchStream`] and [`DocsBatchStream`] pull records from a
//! borrowed [`CiffReader`], validate and decode them, and hand fixed-capacity
//! batches to the consumer one at a time. Both implement [`BatchStream`], so
//! a [`TableStore`](ciff_store::TableStore) can bulk-create a table from them
//! directly.

use std::{io::BufRead, sync::Arc};

use arrow_array::{Float64Array, Int64Array, RecordBatch};
use arrow_schema::SchemaRef;
use ciff_common::{Result, error::Error};
use ciff_format::{CiffReader, DocRecord, Header, PostingsList, tables::stats_schema};
use ciff_store::BatchStream;

use crate::{
    assembler::{BatchAssembler, DocsRowBuffer, PostingsRowBuffer, TermRow},
    gaps,
    term_ids::TermIdAssigner,
};

/// Builds the single-row `stats(num_docs, avgdl)` batch from the header.
pub fn stats_batch(header: &Header) -> Result<RecordBatch> {
    Ok(RecordBatch::try_new(
        stats_schema(),
        vec![
            Arc::new(Int64Array::from(vec![i64::from(header.num_docs)])),
            Arc::new(Float64Array::from(vec![header.average_doclength])),
        ],
    )?)
}

/// Decodes one postings list into a row of the staging postings table.
///
/// `ordinal` is the record ordinal of `list` in the stream, used for error
/// reporting only.
pub fn decode_postings_list(
    list: PostingsList,
    term_id: u64,
    ordinal: u64,
    num_docs: u64,
) -> Result<TermRow> {
    if list.df < 0 || list.df as u64 != list.postings.len() as u64 {
        return Err(Error::invalid_posting(
            list.term,
            term_id,
            ordinal,
            format!(
                "df {} does not match the {} stored postings",
                list.df,
                list.postings.len()
            ),
        ));
    }
    let postings = match gaps::decode(&list.postings, num_docs) {
        Ok(postings) => postings,
        Err(e) => {
            return Err(Error::invalid_posting(
                list.term,
                term_id,
                ordinal,
                e.to_string(),
            ));
        }
    };
    Ok(TermRow {
        term: list.term,
        term_id,
        df: list.df,
        cf: list.cf,
        postings,
    })
}

/// Checks a document record against the header.
pub fn validate_document(doc: &DocRecord, ordinal: u64, num_docs: u64) -> Result<()> {
    if doc.docid < 0 || doc.docid as u64 >= num_docs {
        return Err(Error::invalid_document(
            ordinal,
            format!("docid {} is out of range (num_docs {num_docs})", doc.docid),
        ));
    }
    if doc.doclength < 0 {
        return Err(Error::invalid_document(
            ordinal,
            format!("negative doclength {} for docid {}", doc.doclength, doc.docid),
        ));
    }
    Ok(())
}

/// Batches of the staging postings table, one row per postings list.
///
/// Term ids are assigned here, in read order. The assigner is owned by the
/// stream and can be taken back with [`into_term_ids`](Self::into_term_ids)
/// once the section is drained.
pub struct PostingsBatchStream<'a, R> {
    reader: &'a mut CiffReader<R>,
    assembler: BatchAssembler<PostingsRowBuffer>,
    term_ids: TermIdAssigner,
    batch_start: u64,
    postings: u64,
    done: bool,
}

impl<'a, R: BufRead> PostingsBatchStream<'a, R> {
    /// Creates a stream over the postings section of `reader`, continuing the
    /// given term id sequence.
    pub fn new(
        reader: &'a mut CiffReader<R>,
        term_ids: TermIdAssigner,
        batch_size: usize,
    ) -> Result<PostingsBatchStream<'a, R>> {
        if reader.docs_read() != 0 {
            return Err(Error::invalid_operation(
                "postings batches after documents have been read",
            ));
        }
        let assembler = BatchAssembler::new(PostingsRowBuffer::new(), batch_size)?;
        let batch_start = term_ids.assigned();
        Ok(PostingsBatchStream {
            reader,
            assembler,
            term_ids,
            batch_start,
            postings: 0,
            done: false,
        })
    }

    /// Number of postings lists consumed so far.
    pub fn terms(&self) -> u64 {
        self.assembler.rows()
    }

    /// Total number of decoded postings (the sum of `df`) so far.
    pub fn postings(&self) -> u64 {
        self.postings
    }

    pub fn batches(&self) -> u64 {
        self.assembler.batches()
    }

    pub fn into_term_ids(self) -> TermIdAssigner {
        self.term_ids
    }

    fn next_row(&mut self) -> Result<Option<TermRow>> {
        let ordinal = self.reader.next_ordinal();
        let Some(list) = self.reader.next_postings_list()? else {
            return Ok(None);
        };
        let term_id = self.term_ids.assign();
        let row = decode_postings_list(list, term_id, ordinal, self.reader.num_docs())?;
        self.postings += row.postings.len() as u64;
        Ok(Some(row))
    }

    fn next_batch(&mut self) -> Result<Option<RecordBatch>> {
        loop {
            let batch = match self.next_row()? {
                Some(row) => self.assembler.push(row)?,
                None => {
                    self.done = true;
                    self.assembler.finish()?
                }
            };
            if let Some(batch) = batch {
                let end = self.term_ids.assigned();
                log::debug!(
                    "Postings batch {}: term ids {}..{}",
                    self.assembler.batches(),
                    self.batch_start,
                    end
                );
                self.batch_start = end;
                return Ok(Some(batch));
            }
            if self.done {
                return Ok(None);
            }
        }
    }
}

impl<R: BufRead> Iterator for PostingsBatchStream<'_, R> {
    type Item = Result<RecordBatch>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        let res = self.next_batch();
        if res.is_err() {
            self.done = true;
        }
        res.transpose()
    }
}

impl<R: BufRead> BatchStream for PostingsBatchStream<'_, R> {
    fn schema(&self) -> SchemaRef {
        self.assembler.schema()
    }
}

/// Batches of the staging docs table, one row per document record.
///
/// Requires the postings section of the reader to be fully consumed.
pub struct DocsBatchStream<'a, R> {
    reader: &'a mut CiffReader<R>,
    assembler: BatchAssembler<DocsRowBuffer>,
    done: bool,
}

impl<'a, R: BufRead> DocsBatchStream<'a, R> {
    pub fn new(reader: &'a mut CiffReader<R>, batch_size: usize) -> Result<DocsBatchStream<'a, R>> {
        if !reader.postings_exhausted() {
            return Err(Error::invalid_operation(format!(
                "docs batches before all postings lists were read ({} of {})",
                reader.postings_read(),
                reader.num_postings_lists()
            )));
        }
        let assembler = BatchAssembler::new(DocsRowBuffer::new(), batch_size)?;
        Ok(DocsBatchStream {
            reader,
            assembler,
            done: false,
        })
    }

    pub fn docs(&self) -> u64 {
        self.assembler.rows()
    }

    pub fn batches(&self) -> u64 {
        self.assembler.batches()
    }

    fn next_batch(&mut self) -> Result<Option<RecordBatch>> {
        loop {
            let ordinal = self.reader.next_ordinal();
            let batch = match self.reader.next_document()? {
                Some(doc) => {
                    validate_document(&doc, ordinal, self.reader.num_docs())?;
                    self.assembler.push(doc)?
                }
                None => {
                    self.done = true;
                    self.assembler.finish()?
                }
            };
            if batch.is_some() || self.done {
                return Ok(batch);
            }
        }
    }
}

impl<R: BufRead> Iterator for DocsBatchStream<'_, R> {
    type Item = Result<RecordBatch>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        let res = self.next_batch();
        if res.is_err() {
            self.done = true;
        }
        res.transpose()
    }
}

impl<R: BufRead> BatchStream for DocsBatchStream<'_, R> {
    fn schema(&self) -> SchemaRef {
        self.assembler.schema()
    }
}
