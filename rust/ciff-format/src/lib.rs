//! CIFF (Common Index File Format) wire format support.
//!
//! A CIFF export is a (usually compressed) sequence of length-delimited
//! protobuf messages: one [`Header`](defs::Header), then
//! `num_postings_lists` [`PostingsList`](defs::PostingsList) messages, then
//! `num_docs` [`DocRecord`](defs::DocRecord) messages.
//!
//! This crate provides:
//! - [`defs`]: the message definitions.
//! - [`container`]: compression detection for the outer container.
//! - [`framing`]: varint length-prefix framing on top of a byte stream.
//! - [`reader::CiffReader`]: the sequential record source.
//! - [`writer::CiffWriter`]: the matching encoder.
//! - [`tables`]: the declared Arrow schemas of the staging and output tables.

pub mod container;
pub mod defs;
pub mod framing;
pub mod reader;
pub mod tables;
pub mod writer;

pub use defs::{DocRecord, Header, Posting, PostingsList};
pub use reader::CiffReader;
pub use writer::CiffWriter;
