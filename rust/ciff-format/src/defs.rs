//! CIFF protobuf message definitions.
//!
//! These mirror `CommonIndexFileFormat.proto` field for field (same tags and
//! wire types), so any CIFF export decodes into them directly.

/// Collection-level statistics, the first record of every CIFF stream.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct Header {
    #[prost(int32, tag = "1")]
    pub version: i32,
    /// Number of `PostingsList` records that follow the header.
    #[prost(int32, tag = "2")]
    pub num_postings_lists: i32,
    /// Number of `DocRecord` records that follow the postings lists.
    #[prost(int32, tag = "3")]
    pub num_docs: i32,
    #[prost(int32, tag = "4")]
    pub total_postings_lists: i32,
    #[prost(int32, tag = "5")]
    pub total_docs: i32,
    #[prost(int64, tag = "6")]
    pub total_terms_in_collection: i64,
    #[prost(double, tag = "7")]
    pub average_doclength: f64,
    #[prost(string, tag = "8")]
    pub description: ::prost::alloc::string::String,
}

/// A single `(docid gap, tf)` entry of a postings list.
///
/// The first entry of a list carries an absolute docid; subsequent entries
/// carry the difference from the previous docid.
#[derive(Clone, Copy, PartialEq, Eq, ::prost::Message)]
pub struct Posting {
    #[prost(int32, tag = "1")]
    pub docid: i32,
    #[prost(int32, tag = "2")]
    pub tf: i32,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct PostingsList {
    #[prost(string, tag = "1")]
    pub term: ::prost::alloc::string::String,
    #[prost(int64, tag = "2")]
    pub df: i64,
    #[prost(int64, tag = "3")]
    pub cf: i64,
    #[prost(message, repeated, tag = "4")]
    pub postings: ::prost::alloc::vec::Vec<Posting>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct DocRecord {
    #[prost(int32, tag = "1")]
    pub docid: i32,
    #[prost(string, tag = "2")]
    pub collection_docid: ::prost::alloc::string::String,
    #[prost(int32, tag = "3")]
    pub doclength: i32,
}

impl Header {
    /// Declared postings list count, clamped to zero.
    pub fn postings_list_count(&self) -> u64 {
        self.num_postings_lists.max(0) as u64
    }

    /// Declared document count, clamped to zero.
    pub fn doc_count(&self) -> u64 {
        self.num_docs.max(0) as u64
    }
}

impl Posting {
    pub fn new(docid: i32, tf: i32) -> Posting {
        Posting { docid, tf }
    }
}
