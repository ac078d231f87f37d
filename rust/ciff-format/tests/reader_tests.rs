use std::io::{Cursor, Write};

use ciff_common::error::ErrorKind;
use prost::Message;
use ciff_format::{
    CiffReader, CiffWriter, DocRecord, Header, Posting, PostingsList, container::Compression,
};

fn sample_header(num_postings_lists: i32, num_docs: i32) -> Header {
    Header {
        version: 1,
        num_postings_lists,
        num_docs,
        total_postings_lists: num_postings_lists,
        total_docs: num_docs,
        total_terms_in_collection: 10,
        average_doclength: 2.5,
        description: "reader test".into(),
    }
}

fn sample_list(term: &str) -> PostingsList {
    PostingsList {
        term: term.into(),
        df: 2,
        cf: 3,
        postings: vec![Posting::new(0, 2), Posting::new(1, 1)],
    }
}

fn sample_doc(docid: i32) -> DocRecord {
    DocRecord {
        docid,
        collection_docid: format!("doc-{docid}"),
        doclength: 5,
    }
}

fn sample_stream() -> Vec<u8> {
    let mut writer = CiffWriter::new(Vec::new(), &sample_header(2, 2)).unwrap();
    writer.write_postings_list(&sample_list("cat")).unwrap();
    writer.write_postings_list(&sample_list("dog")).unwrap();
    writer.write_document(&sample_doc(0)).unwrap();
    writer.write_document(&sample_doc(1)).unwrap();
    writer.finish().unwrap()
}

#[test]
fn test_read_full_stream() {
    let mut reader = CiffReader::new(Cursor::new(sample_stream())).unwrap();
    assert_eq!(reader.header().description, "reader test");
    assert_eq!(reader.num_postings_lists(), 2);
    assert_eq!(reader.num_docs(), 2);

    let terms = reader
        .postings_lists()
        .unwrap()
        .map(|list| list.map(|list| list.term))
        .collect::<Result<Vec<_>, _>>()
        .unwrap();
    assert_eq!(terms, vec!["cat", "dog"]);

    let docs = reader
        .documents()
        .unwrap()
        .collect::<Result<Vec<_>, _>>()
        .unwrap();
    assert_eq!(docs, vec![sample_doc(0), sample_doc(1)]);
    assert!(reader.docs_exhausted());
}

#[test]
fn test_documents_require_drained_postings() {
    let mut reader = CiffReader::new(Cursor::new(sample_stream())).unwrap();
    reader.postings_lists().unwrap().next().unwrap().unwrap();
    let err = reader.documents().err().unwrap();
    assert!(matches!(err.kind(), ErrorKind::InvalidOperation { .. }));
}

#[test]
fn test_sequences_stop_at_declared_count() {
    // The trailing record is beyond the declared counts and is never read.
    let mut writer = CiffWriter::new(Vec::new(), &sample_header(1, 0)).unwrap();
    writer.write_postings_list(&sample_list("cat")).unwrap();
    writer.write_unchecked(&sample_list("dog")).unwrap();
    let bytes = writer.into_inner();

    let mut reader = CiffReader::new(Cursor::new(bytes)).unwrap();
    assert_eq!(reader.postings_lists().unwrap().count(), 1);
    assert_eq!(reader.documents().unwrap().count(), 0);
}

#[test]
fn test_truncated_postings() {
    let mut writer = CiffWriter::new(Vec::new(), &sample_header(3, 0)).unwrap();
    writer.write_postings_list(&sample_list("cat")).unwrap();
    let bytes = writer.into_inner();

    let mut reader = CiffReader::new(Cursor::new(bytes)).unwrap();
    let results = reader.postings_lists().unwrap().collect::<Vec<_>>();
    assert_eq!(results.len(), 2);
    assert!(results[0].is_ok());
    let err = results[1].as_ref().unwrap_err();
    match err.kind() {
        ErrorKind::TruncatedStream {
            expected,
            read,
            ordinal,
            ..
        } => {
            assert_eq!(*expected, 3);
            assert_eq!(*read, 1);
            assert_eq!(*ordinal, 2);
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

#[test]
fn test_truncated_documents() {
    let mut writer = CiffWriter::new(Vec::new(), &sample_header(0, 2)).unwrap();
    writer.write_document(&sample_doc(0)).unwrap();
    let bytes = writer.into_inner();

    let mut reader = CiffReader::new(Cursor::new(bytes)).unwrap();
    assert_eq!(reader.postings_lists().unwrap().count(), 0);
    let err = reader
        .documents()
        .unwrap()
        .find_map(Result::err)
        .expect("truncation error");
    assert!(matches!(err.kind(), ErrorKind::TruncatedStream { .. }));
}

#[test]
fn test_empty_stream_has_no_header() {
    let err = CiffReader::new(Cursor::new(Vec::<u8>::new())).err().unwrap();
    assert!(matches!(err.kind(), ErrorKind::TruncatedStream { .. }));
}

#[test]
fn test_undecodable_record_is_corrupt() {
    let mut bytes = Vec::new();
    sample_header(1, 0)
        .encode_length_delimited(&mut bytes)
        .unwrap();
    // Field 1 with the invalid wire type 7.
    prost::encode_length_delimiter(2, &mut bytes).unwrap();
    bytes.extend_from_slice(&[0x0f, 0x00]);

    let mut reader = CiffReader::new(Cursor::new(bytes)).unwrap();
    let err = reader
        .postings_lists()
        .unwrap()
        .find_map(Result::err)
        .expect("corrupt record");
    match err.kind() {
        ErrorKind::CorruptStream {
            ordinal, offset, ..
        } => {
            assert_eq!(*ordinal, 1);
            assert!(*offset > 0);
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

#[test]
fn test_negative_header_counts_are_corrupt() {
    let mut bytes = Vec::new();
    let header = Header {
        num_docs: -1,
        ..Default::default()
    };
    header.encode_length_delimited(&mut bytes).unwrap();
    let err = CiffReader::new(Cursor::new(bytes)).err().unwrap();
    assert!(matches!(err.kind(), ErrorKind::CorruptStream { .. }));
}

#[test]
fn test_gzip_container() {
    let mut encoder = flate2::write::GzEncoder::new(Vec::new(), flate2::Compression::default());
    encoder.write_all(&sample_stream()).unwrap();
    let compressed = encoder.finish().unwrap();

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("index.ciff.gz");
    std::fs::write(&path, &compressed).unwrap();

    let mut reader = CiffReader::open(&path).unwrap();
    assert_eq!(reader.postings_lists().unwrap().count(), 2);
    assert_eq!(reader.documents().unwrap().count(), 2);

    let (compression, _) = CiffReader::from_container(Cursor::new(compressed)).unwrap();
    assert_eq!(compression, Compression::Gzip);
}

#[test]
fn test_corrupt_gzip_payload() {
    let mut encoder = flate2::write::GzEncoder::new(Vec::new(), flate2::Compression::default());
    encoder.write_all(&sample_stream()).unwrap();
    let mut compressed = encoder.finish().unwrap();
    // The first deflate block header follows the 10-byte gzip header. Block
    // type 0b11 is reserved, so inflating fails on the very first read.
    compressed[10] |= 0b110;

    let err = CiffReader::from_container(Cursor::new(compressed))
        .err()
        .expect("damaged container must not decode");
    match err.kind() {
        ErrorKind::CorruptStream { ordinal, .. } => assert_eq!(*ordinal, 0),
        other => panic!("unexpected error: {other:?}"),
    }
}

#[test]
fn test_non_finite_average_doclength_is_corrupt() {
    for avgdl in [f64::INFINITY, f64::NEG_INFINITY, f64::NAN, -1.0] {
        let header = Header {
            average_doclength: avgdl,
            ..Default::default()
        };
        let bytes = header.encode_length_delimited_to_vec();
        let err = CiffReader::new(Cursor::new(bytes)).err().unwrap();
        assert!(
            matches!(err.kind(), ErrorKind::CorruptStream { .. }),
            "avgdl {avgdl} must be rejected"
        );
    }
}
