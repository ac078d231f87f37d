//! Sequential CIFF record source.
//!
//! [`CiffReader`] reads the header eagerly on construction and then exposes
//! the postings lists and the documents as two lazy, single-pass sequences
//! sharing one cursor into the container. The postings sequence must be fully
//! drained before the documents sequence can be started.

use std::{io::BufRead, path::Path};

use ciff_common::{Result, error::Error};
use prost::Message;

use crate::{
    container::{self, Compression, ContainerStream},
    defs::{DocRecord, Header, PostingsList},
    framing::FrameReader,
};

/// Name of the postings section used in error reports.
pub const POSTINGS_SECTION: &str = "postings list";
/// Name of the documents section used in error reports.
pub const DOCS_SECTION: &str = "document";

/// Reads the records of a CIFF stream in their fixed order:
/// `Header`, `PostingsList × num_postings_lists`, `DocRecord × num_docs`.
///
/// Peak memory is bounded by the largest single record.
pub struct CiffReader<R> {
    frames: FrameReader<R>,
    header: Header,
    postings_read: u64,
    docs_read: u64,
}

impl CiffReader<ContainerStream> {
    /// Opens a CIFF file, detecting its compression, and reads the header.
    pub fn open(path: impl AsRef<Path>) -> Result<CiffReader<ContainerStream>> {
        let path = path.as_ref();
        let (compression, stream) = container::open_file(path)
            .map_err(|e| Error::io(format!("open {}", path.display()), e))?;
        log::info!("Opened CIFF container {} ({compression:?})", path.display());
        CiffReader::new(stream)
    }

    /// Wraps an arbitrary byte source, detecting its compression, and reads
    /// the header.
    pub fn from_container<S>(source: S) -> Result<(Compression, CiffReader<ContainerStream>)>
    where
        S: std::io::Read + Send + 'static,
    {
        let (compression, stream) =
            container::open_stream(source).map_err(|e| Error::io("open CIFF stream", e))?;
        Ok((compression, CiffReader::new(stream)?))
    }
}

impl<R: BufRead> CiffReader<R> {
    /// Creates a reader over an already decompressed stream and reads the
    /// header record.
    pub fn new(stream: R) -> Result<CiffReader<R>> {
        let mut frames = FrameReader::new(stream);
        let header: Header = match frames.next_frame(0)? {
            Some(body) => decode(body, 0, 0)?,
            None => return Err(Error::truncated_stream("header", 0, 1, 0)),
        };
        if header.num_postings_lists < 0 || header.num_docs < 0 {
            return Err(Error::corrupt_stream(
                0,
                0,
                format!(
                    "negative record counts in header (num_postings_lists: {}, num_docs: {})",
                    header.num_postings_lists, header.num_docs
                ),
            ));
        }
        if !header.average_doclength.is_finite() || header.average_doclength < 0.0 {
            return Err(Error::corrupt_stream(
                0,
                0,
                format!("invalid average_doclength {}", header.average_doclength),
            ));
        }
        log::info!(
            "CIFF header: version {}, {} postings lists, {} docs, avgdl {:.3}",
            header.version,
            header.num_postings_lists,
            header.num_docs,
            header.average_doclength
        );
        Ok(CiffReader {
            frames,
            header,
            postings_read: 0,
            docs_read: 0,
        })
    }

    pub fn header(&self) -> &Header {
        &self.header
    }

    /// Number of postings lists declared in the header.
    pub fn num_postings_lists(&self) -> u64 {
        self.header.postings_list_count()
    }

    /// Number of documents declared in the header.
    pub fn num_docs(&self) -> u64 {
        self.header.doc_count()
    }

    /// Number of postings lists read so far.
    pub fn postings_read(&self) -> u64 {
        self.postings_read
    }

    /// Number of documents read so far.
    pub fn docs_read(&self) -> u64 {
        self.docs_read
    }

    /// Whether every declared postings list has been read.
    pub fn postings_exhausted(&self) -> bool {
        self.postings_read == self.num_postings_lists()
    }

    /// Whether every declared document has been read.
    pub fn docs_exhausted(&self) -> bool {
        self.docs_read == self.num_docs()
    }

    /// Ordinal of the next record in the stream (the header is record `0`).
    pub fn next_ordinal(&self) -> u64 {
        1 + self.postings_read + self.docs_read
    }

    /// Byte offset of the next record within the decompressed stream.
    pub fn offset(&self) -> u64 {
        self.frames.offset()
    }

    /// Returns the lazy sequence of postings lists.
    ///
    /// Fails if documents have already been read from this reader.
    pub fn postings_lists(&mut self) -> Result<PostingsLists<'_, R>> {
        if self.docs_read != 0 {
            return Err(Error::invalid_operation(
                "postings_lists() after documents have been read",
            ));
        }
        Ok(PostingsLists {
            reader: self,
            done: false,
        })
    }

    /// Returns the lazy sequence of documents.
    ///
    /// Fails unless all postings lists have been consumed.
    pub fn documents(&mut self) -> Result<Documents<'_, R>> {
        if !self.postings_exhausted() {
            return Err(Error::invalid_operation(format!(
                "documents() before all postings lists were read ({} of {})",
                self.postings_read,
                self.num_postings_lists()
            )));
        }
        Ok(Documents {
            reader: self,
            done: false,
        })
    }

    /// Reads the next postings list, or `None` once the declared count has been
    /// reached.
    pub fn next_postings_list(&mut self) -> Result<Option<PostingsList>> {
        if self.postings_exhausted() {
            return Ok(None);
        }
        let ordinal = self.next_ordinal();
        let offset = self.frames.offset();
        let (expected, read) = (self.num_postings_lists(), self.postings_read);
        let list: PostingsList = match self.frames.next_frame(ordinal)? {
            Some(body) => decode(body, ordinal, offset)?,
            None => {
                return Err(Error::truncated_stream(
                    POSTINGS_SECTION,
                    ordinal,
                    expected,
                    read,
                ));
            }
        };
        self.postings_read += 1;
        Ok(Some(list))
    }

    /// Reads the next document record, or `None` once the declared count has
    /// been reached.
    pub fn next_document(&mut self) -> Result<Option<DocRecord>> {
        if !self.postings_exhausted() {
            return Err(Error::invalid_operation(
                "reading documents before all postings lists were read",
            ));
        }
        if self.docs_exhausted() {
            return Ok(None);
        }
        let ordinal = self.next_ordinal();
        let offset = self.frames.offset();
        let (expected, read) = (self.num_docs(), self.docs_read);
        let doc: DocRecord = match self.frames.next_frame(ordinal)? {
            Some(body) => decode(body, ordinal, offset)?,
            None => {
                return Err(Error::truncated_stream(
                    DOCS_SECTION,
                    ordinal,
                    expected,
                    read,
                ));
            }
        };
        self.docs_read += 1;
        Ok(Some(doc))
    }
}

fn decode<M: Message + Default>(body: &[u8], ordinal: u64, offset: u64) -> Result<M> {
    M::decode(body).map_err(|e| Error::corrupt_stream(ordinal, offset, e.to_string()))
}

/// Lazy sequence of the postings lists of a [`CiffReader`].
///
/// Stops after the first error.
pub struct PostingsLists<'a, R> {
    reader: &'a mut CiffReader<R>,
    done: bool,
}

impl<R: BufRead> PostingsLists<'_, R> {
    /// The underlying reader, e.g. to query progress or the header.
    pub fn reader(&self) -> &CiffReader<R> {
        self.reader
    }
}

impl<R: BufRead> Iterator for PostingsLists<'_, R> {
    type Item = Result<PostingsList>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        let res = self.reader.next_postings_list().transpose();
        if !matches!(res, Some(Ok(_))) {
            self.done = true;
        }
        res
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = if self.done {
            0
        } else {
            (self.reader.num_postings_lists() - self.reader.postings_read()) as usize
        };
        (0, Some(remaining))
    }
}

/// Lazy sequence of the documents of a [`CiffReader`].
///
/// Stops after the first error.
pub struct Documents<'a, R> {
    reader: &'a mut CiffReader<R>,
    done: bool,
}

impl<R: BufRead> Documents<'_, R> {
    pub fn reader(&self) -> &CiffReader<R> {
        self.reader
    }
}

impl<R: BufRead> Iterator for Documents<'_, R> {
    type Item = Result<DocRecord>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        let res = self.reader.next_document().transpose();
        if !matches!(res, Some(Ok(_))) {
            self.done = true;
        }
        res
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = if self.done {
            0
        } else {
            (self.reader.num_docs() - self.reader.docs_read()) as usize
        };
        (0, Some(remaining))
    }
}
