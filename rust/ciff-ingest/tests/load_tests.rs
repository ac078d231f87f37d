use std::io::Cursor;

use arrow_array::{
    RecordBatch,
    cast::AsArray,
    types::{Float64Type, Int32Type, Int64Type},
};
use ciff_common::error::{ErrorKind, Phase};
use ciff_format::{
    CiffReader, DocRecord, Posting, PostingsList,
    container::Compression,
    tables::{ALL_TABLES, DICT_TABLE, DOCS_TABLE, POSTINGS_TABLE, STATS_TABLE},
};
use ciff_ingest::{CfPolicy, IndexLoader, LoadParams};
use ciff_store::{TableRef, TableStore, local::LocalDirStore, memory::MemoryStore, read_table};
use ciff_testkit::{IndexShape, SyntheticIndex};

fn reader_for(index: &SyntheticIndex) -> CiffReader<Cursor<Vec<u8>>> {
    CiffReader::new(Cursor::new(index.to_bytes().unwrap())).unwrap()
}

fn table(name: &str) -> TableRef {
    TableRef::new("ows", name)
}

fn i64_column(batches: &[RecordBatch], column: usize) -> Vec<i64> {
    batches
        .iter()
        .flat_map(|b| b.column(column).as_primitive::<Int64Type>().values().to_vec())
        .collect()
}

fn i32_column(batches: &[RecordBatch], column: usize) -> Vec<i32> {
    batches
        .iter()
        .flat_map(|b| b.column(column).as_primitive::<Int32Type>().values().to_vec())
        .collect()
}

fn string_column(batches: &[RecordBatch], column: usize) -> Vec<String> {
    batches
        .iter()
        .flat_map(|b| {
            b.column(column)
                .as_string::<i32>()
                .iter()
                .map(|v| v.unwrap_or_default().to_string())
                .collect::<Vec<_>>()
        })
        .collect()
}

/// `(term_id, docid, tf)` rows of the postings table.
fn postings_rows(store: &dyn TableStore) -> Vec<(i64, i32, i32)> {
    let batches = read_table(store, &table(POSTINGS_TABLE)).unwrap();
    let term_ids = i64_column(&batches, 0);
    let docids = i32_column(&batches, 1);
    let tfs = i32_column(&batches, 2);
    term_ids
        .into_iter()
        .zip(docids)
        .zip(tfs)
        .map(|((t, d), tf)| (t, d, tf))
        .collect()
}

#[test]
fn test_cat_end_to_end() {
    let index = SyntheticIndex::cat();
    let store = MemoryStore::new();
    let loader = IndexLoader::new(&store, LoadParams::default()).unwrap();
    let summary = loader.load(&mut reader_for(&index)).unwrap();

    assert_eq!(summary.terms, 1);
    assert_eq!(summary.postings, 2);
    assert_eq!(summary.docs, 2);

    let mut tables = store.list_tables("ows").unwrap();
    tables.sort();
    assert_eq!(tables, vec!["dict", "docs", "postings", "stats"]);

    let dict = read_table(&store, &table(DICT_TABLE)).unwrap();
    assert_eq!(dict[0].num_columns(), 3);
    assert_eq!(i64_column(&dict, 0), vec![0]);
    assert_eq!(string_column(&dict, 1), vec!["cat"]);
    assert_eq!(i64_column(&dict, 2), vec![2]);

    assert_eq!(postings_rows(&store), vec![(0, 0, 2), (0, 1, 1)]);

    let docs = read_table(&store, &table(DOCS_TABLE)).unwrap();
    assert_eq!(i64_column(&docs, 0), vec![0, 1]);
    assert_eq!(string_column(&docs, 1), vec!["doc0", "doc1"]);
    assert_eq!(i64_column(&docs, 2), vec![4, 4]);

    let stats = read_table(&store, &table(STATS_TABLE)).unwrap();
    assert_eq!(i64_column(&stats, 0), vec![2]);
    assert_eq!(stats[0].column(1).as_primitive::<Float64Type>().value(0), 4.0);
}

#[test]
fn test_keep_cf_policy() {
    let store = MemoryStore::new();
    let params = LoadParams {
        cf_policy: CfPolicy::Keep,
        ..Default::default()
    };
    IndexLoader::new(&store, params)
        .unwrap()
        .load(&mut reader_for(&SyntheticIndex::cat()))
        .unwrap();
    let dict = read_table(&store, &table(DICT_TABLE)).unwrap();
    assert_eq!(dict[0].schema().field(3).name(), "cf");
    assert_eq!(i64_column(&dict, 3), vec![3]);
}

#[test]
fn test_empty_postings_list() {
    let docs = vec![DocRecord {
        docid: 0,
        collection_docid: "only".into(),
        doclength: 1,
    }];
    let index = SyntheticIndex::from_decoded(
        vec!["empty".into(), "one".into()],
        vec![vec![], vec![Posting::new(0, 1)]],
        docs,
    );
    let store = MemoryStore::new();
    let params = LoadParams {
        postings_batch_size: 1,
        ..Default::default()
    };
    let summary = IndexLoader::new(&store, params)
        .unwrap()
        .load(&mut reader_for(&index))
        .unwrap();
    assert_eq!(summary.terms, 2);
    assert_eq!(summary.postings, 1);
    assert_eq!(summary.postings_batches, 2);

    let dict = read_table(&store, &table(DICT_TABLE)).unwrap();
    assert_eq!(i64_column(&dict, 0), vec![0, 1]);
    assert_eq!(i64_column(&dict, 2), vec![0, 1]);
    assert_eq!(postings_rows(&store), vec![(1, 0, 1)]);
}

#[test]
fn test_empty_collection() {
    let index = SyntheticIndex::from_decoded(vec![], vec![], vec![]);
    let store = MemoryStore::new();
    let summary = IndexLoader::new(&store, LoadParams::default())
        .unwrap()
        .load(&mut reader_for(&index))
        .unwrap();
    assert_eq!(summary.terms, 0);
    assert_eq!(summary.postings_batches, 1);
    assert_eq!(summary.docs_batches, 1);
    for name in [DICT_TABLE, POSTINGS_TABLE, DOCS_TABLE] {
        let batches = read_table(&store, &table(name)).unwrap();
        assert_eq!(batches.iter().map(|b| b.num_rows()).sum::<usize>(), 0);
    }
}

#[test]
fn test_row_count_conservation() {
    let shape = IndexShape {
        num_terms: 300,
        num_docs: 120,
        max_df: 40,
        empty_term_every: Some(11),
        seed: 3,
    };
    let index = SyntheticIndex::generate(&shape);
    let store = MemoryStore::new();
    let params = LoadParams {
        postings_batch_size: 64,
        docs_batch_size: 50,
        ..Default::default()
    };
    let summary = IndexLoader::new(&store, params)
        .unwrap()
        .load(&mut reader_for(&index))
        .unwrap();

    assert_eq!(summary.terms, 300);
    assert_eq!(summary.postings, index.total_postings());
    assert_eq!(summary.docs, 120);
    assert_eq!(summary.postings_batches, 300u64.div_ceil(64));
    assert_eq!(summary.docs_batches, 120u64.div_ceil(50));

    let dict = read_table(&store, &table(DICT_TABLE)).unwrap();
    assert_eq!(i64_column(&dict, 0), (0..300).collect::<Vec<_>>());

    let expected = index
        .decoded
        .iter()
        .enumerate()
        .flat_map(|(term_id, postings)| {
            postings
                .iter()
                .map(move |p| (term_id as i64, p.docid, p.tf))
        })
        .collect::<Vec<_>>();
    assert_eq!(postings_rows(&store), expected);
}

#[test]
fn test_rerun_is_identical() {
    let index = SyntheticIndex::generate(&IndexShape::default());
    let mut outputs = Vec::new();
    for _ in 0..2 {
        let store = MemoryStore::new();
        IndexLoader::new(&store, LoadParams::default())
            .unwrap()
            .load(&mut reader_for(&index))
            .unwrap();
        let dict = read_table(&store, &table(DICT_TABLE)).unwrap();
        let postings = read_table(&store, &table(POSTINGS_TABLE)).unwrap();
        outputs.push((dict, postings));
    }
    assert_eq!(outputs[0], outputs[1]);
}

#[test]
fn test_out_of_range_docid_rolls_back() {
    let index = SyntheticIndex::cat();
    let mut lists = index.postings_lists.clone();
    lists.push(PostingsList {
        term: "dog".into(),
        df: 2,
        cf: 2,
        postings: vec![Posting::new(1, 1), Posting::new(1, 1)],
    });
    let mut broken = SyntheticIndex::from_decoded(vec![], vec![], index.docs.clone());
    broken.header.num_postings_lists = lists.len() as i32;
    broken.postings_lists = lists;

    let store = MemoryStore::new();
    let err = IndexLoader::new(&store, LoadParams::default())
        .unwrap()
        .load(&mut reader_for(&broken))
        .unwrap_err();
    match err.kind() {
        ErrorKind::InvalidPosting { term, term_id, .. } => {
            assert_eq!(term, "dog");
            assert_eq!(*term_id, 1);
        }
        other => panic!("unexpected error: {other:?}"),
    }
    assert_eq!(err.phase(), Phase::Decode);
    assert_eq!(err.record_ordinal(), Some(2));
    assert!(!store.namespace_exists("ows").unwrap());
}

#[test]
fn test_truncated_docs_rolls_back_into_existing_schema() {
    let index = SyntheticIndex::cat();
    let bytes = index.to_bytes().unwrap();
    // Drop the last document record (a short frame at the end of the stream).
    let last_doc = prost_len(&index.docs[1]);
    let truncated = bytes[..bytes.len() - last_doc].to_vec();

    let store = MemoryStore::new();
    store.create_namespace("ows").unwrap();
    let err = IndexLoader::new(&store, LoadParams::default())
        .unwrap()
        .load(&mut CiffReader::new(Cursor::new(truncated)).unwrap())
        .unwrap_err();
    assert!(matches!(err.kind(), ErrorKind::TruncatedStream { .. }));
    assert!(store.namespace_exists("ows").unwrap());
    assert!(store.list_tables("ows").unwrap().is_empty());
}

#[test]
fn test_invalid_document_rolls_back_local_dir() {
    let mut index = SyntheticIndex::cat();
    index.docs[1].docid = 7;

    let dir = tempfile::tempdir().unwrap();
    let store = LocalDirStore::open(dir.path()).unwrap();
    store.create_namespace("ows").unwrap();
    let err = IndexLoader::new(&store, LoadParams::default())
        .unwrap()
        .load(&mut reader_for(&index))
        .unwrap_err();
    match err.kind() {
        ErrorKind::InvalidDocument { ordinal, .. } => assert_eq!(*ordinal, 3),
        other => panic!("unexpected error: {other:?}"),
    }

    // stats and ciff_postings were persisted before the docs section failed;
    // neither they nor any temp file may remain.
    let namespace_dir = dir.path().join("ows");
    assert!(namespace_dir.is_dir());
    let leftovers = std::fs::read_dir(&namespace_dir)
        .unwrap()
        .map(|entry| entry.unwrap().file_name())
        .collect::<Vec<_>>();
    assert!(leftovers.is_empty(), "left behind: {leftovers:?}");
    assert!(store.list_tables("ows").unwrap().is_empty());

    // The namespace stays usable for a clean load.
    IndexLoader::new(&store, LoadParams::default())
        .unwrap()
        .load(&mut reader_for(&SyntheticIndex::cat()))
        .unwrap();
    assert_eq!(postings_rows(&store), vec![(0, 0, 2), (0, 1, 1)]);
}

fn prost_len(doc: &DocRecord) -> usize {
    let body = prost::Message::encoded_len(doc);
    body + prost::length_delimiter_len(body)
}

#[test]
fn test_name_collision() {
    let store = MemoryStore::new();
    let loader = IndexLoader::new(&store, LoadParams::default()).unwrap();
    loader.load(&mut reader_for(&SyntheticIndex::cat())).unwrap();

    let err = loader
        .load(&mut reader_for(&SyntheticIndex::cat()))
        .unwrap_err();
    assert!(matches!(err.kind(), ErrorKind::NameCollision { .. }));
    assert_eq!(err.phase(), Phase::Load);
    // The first load is untouched.
    assert_eq!(postings_rows(&store), vec![(0, 0, 2), (0, 1, 1)]);
}

#[test]
fn test_replace_existing() {
    let store = MemoryStore::new();
    IndexLoader::new(&store, LoadParams::default())
        .unwrap()
        .load(&mut reader_for(&SyntheticIndex::cat()))
        .unwrap();

    let params = LoadParams {
        replace_existing: true,
        ..Default::default()
    };
    let index = SyntheticIndex::generate(&IndexShape::default());
    let summary = IndexLoader::new(&store, params)
        .unwrap()
        .load(&mut reader_for(&index))
        .unwrap();
    assert_eq!(summary.terms, 100);
    assert_eq!(
        ciff_store::count_rows(&store, &table(POSTINGS_TABLE)).unwrap(),
        index.total_postings()
    );
}

#[test]
fn test_gzip_file_into_local_dir() {
    let index = SyntheticIndex::generate(&IndexShape {
        num_terms: 40,
        ..Default::default()
    });
    let input = index.to_temp_file(Compression::Gzip).unwrap();
    let dir = tempfile::tempdir().unwrap();
    let store = LocalDirStore::open(dir.path()).unwrap();

    let summary = IndexLoader::new(&store, LoadParams::default())
        .unwrap()
        .load(&mut CiffReader::open(input.path()).unwrap())
        .unwrap();
    assert_eq!(summary.terms, 40);

    let reopened = LocalDirStore::open(dir.path()).unwrap();
    for name in ALL_TABLES {
        let exists = reopened.table_exists(&table(name)).unwrap();
        assert_eq!(exists, !name.starts_with("ciff_"), "{name}");
    }
    assert_eq!(
        ciff_store::count_rows(&reopened, &table(POSTINGS_TABLE)).unwrap(),
        index.total_postings()
    );
}

#[test]
fn test_summary_serializes() {
    let store = MemoryStore::new();
    let summary = IndexLoader::new(&store, LoadParams::default())
        .unwrap()
        .load(&mut reader_for(&SyntheticIndex::cat()))
        .unwrap();
    let json = serde_json::to_value(&summary).unwrap();
    assert_eq!(json["terms"], 1);
    assert_eq!(json["schema_name"], "ows");
}
