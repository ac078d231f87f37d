//! CIFF stream encoder.

use std::io::Write;

use ciff_common::{Result, error::Error};
use prost::Message;

use crate::defs::{DocRecord, Header, PostingsList};

/// Writes a CIFF stream in its fixed record order, enforcing the counts
/// declared in the header.
///
/// Postings are written as given; callers are responsible for gap-encoding
/// the docids of each list.
pub struct CiffWriter<W: Write> {
    inner: W,
    num_postings_lists: u64,
    num_docs: u64,
    postings_written: u64,
    docs_written: u64,
    buf: Vec<u8>,
}

impl<W: Write> CiffWriter<W> {
    /// Creates the writer and emits the header record.
    pub fn new(inner: W, header: &Header) -> Result<CiffWriter<W>> {
        if header.num_postings_lists < 0 || header.num_docs < 0 {
            return Err(Error::invalid_arg(
                "header",
                "record counts must be non-negative",
            ));
        }
        let mut writer = CiffWriter {
            inner,
            num_postings_lists: header.postings_list_count(),
            num_docs: header.doc_count(),
            postings_written: 0,
            docs_written: 0,
            buf: Vec::new(),
        };
        writer.write_message(header)?;
        Ok(writer)
    }

    pub fn write_postings_list(&mut self, list: &PostingsList) -> Result<()> {
        if self.postings_written == self.num_postings_lists {
            return Err(Error::invalid_operation(format!(
                "header declares {} postings lists",
                self.num_postings_lists
            )));
        }
        self.write_message(list)?;
        self.postings_written += 1;
        Ok(())
    }

    pub fn write_document(&mut self, doc: &DocRecord) -> Result<()> {
        if self.postings_written != self.num_postings_lists {
            return Err(Error::invalid_operation(
                "documents must follow all postings lists",
            ));
        }
        if self.docs_written == self.num_docs {
            return Err(Error::invalid_operation(format!(
                "header declares {} documents",
                self.num_docs
            )));
        }
        self.write_message(doc)?;
        self.docs_written += 1;
        Ok(())
    }

    /// Verifies that the declared number of records has been written, flushes
    /// and returns the underlying writer.
    pub fn finish(mut self) -> Result<W> {
        if self.postings_written != self.num_postings_lists || self.docs_written != self.num_docs {
            return Err(Error::invalid_operation(format!(
                "incomplete CIFF stream: {}/{} postings lists, {}/{} documents",
                self.postings_written, self.num_postings_lists, self.docs_written, self.num_docs
            )));
        }
        self.inner.flush()?;
        Ok(self.inner)
    }

    /// Writes records without checking the declared counts. Used to produce
    /// deliberately inconsistent streams.
    pub fn write_unchecked<M: Message>(&mut self, message: &M) -> Result<()> {
        self.write_message(message)
    }

    /// Returns the underlying writer without checking the record counts.
    pub fn into_inner(self) -> W {
        self.inner
    }

    fn write_message<M: Message>(&mut self, message: &M) -> Result<()> {
        self.buf.clear();
        message
            .encode_length_delimited(&mut self.buf)
            .map_err(|e| Error::invalid_arg("message", e.to_string()))?;
        self.inner.write_all(&self.buf)?;
        Ok(())
    }
}
