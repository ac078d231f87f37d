//! Lookup command implementation

use std::collections::BTreeSet;

use anyhow::{Context, Result};
use arrow::{
    array::{AsArray, BooleanArray, RecordBatch, types::Int64Type},
    compute::filter_record_batch,
    util::pretty::pretty_format_batches,
};
use ciff_format::tables::{DICT_TABLE, POSTINGS_TABLE, columns};
use ciff_store::{TableRef, TableStore};

use crate::commands::open_existing_schema;

/// Run the lookup command
pub fn run(db: String, schema: String, patterns: Vec<String>, limit: usize) -> Result<()> {
    let store = open_existing_schema(&db, &schema)?;
    let (terms, term_ids) = find_terms(&store, &schema, &patterns)?;
    println!("Matching terms: {}", term_ids.len());
    println!("{}", pretty_format_batches(&terms)?);

    let postings = find_postings(&store, &schema, &term_ids, limit)?;
    println!(
        "Postings (first {} rows): {}",
        limit,
        postings.iter().map(|b| b.num_rows()).sum::<usize>()
    );
    println!("{}", pretty_format_batches(&postings)?);
    Ok(())
}

/// Selects the dict rows whose term contains any of `patterns`.
fn find_terms(
    store: &dyn TableStore,
    schema: &str,
    patterns: &[String],
) -> Result<(Vec<RecordBatch>, BTreeSet<i64>)> {
    let dict = TableRef::new(schema, DICT_TABLE);
    let mut matched = Vec::new();
    let mut term_ids = BTreeSet::new();
    for batch in store.scan(&dict)? {
        let batch = batch?;
        let terms = batch
            .column_by_name(columns::TERM)
            .and_then(|c| c.as_string_opt::<i32>())
            .context("dict table has no utf8 term column")?;
        let mask = terms
            .iter()
            .map(|term| Some(term.is_some_and(|t| patterns.iter().any(|p| t.contains(p.as_str())))))
            .collect::<BooleanArray>();
        let selected = filter_record_batch(&batch, &mask)?;
        if selected.num_rows() == 0 {
            continue;
        }
        let ids = selected
            .column_by_name(columns::TERM_ID)
            .and_then(|c| c.as_primitive_opt::<Int64Type>())
            .context("dict table has no int64 term_id column")?;
        term_ids.extend(ids.values().iter().copied());
        matched.push(selected);
    }
    Ok((matched, term_ids))
}

/// Selects up to `limit` postings rows of the given term ids.
fn find_postings(
    store: &dyn TableStore,
    schema: &str,
    term_ids: &BTreeSet<i64>,
    limit: usize,
) -> Result<Vec<RecordBatch>> {
    let postings = TableRef::new(schema, POSTINGS_TABLE);
    let mut matched = Vec::new();
    let mut remaining = limit;
    if term_ids.is_empty() {
        return Ok(matched);
    }
    for batch in store.scan(&postings)? {
        if remaining == 0 {
            break;
        }
        let batch = batch?;
        let ids = batch
            .column_by_name(columns::TERM_ID)
            .and_then(|c| c.as_primitive_opt::<Int64Type>())
            .context("postings table has no int64 term_id column")?;
        let mask = ids
            .values()
            .iter()
            .map(|id| Some(term_ids.contains(id)))
            .collect::<BooleanArray>();
        let selected = filter_record_batch(&batch, &mask)?;
        if selected.num_rows() == 0 {
            continue;
        }
        let take = selected.num_rows().min(remaining);
        remaining -= take;
        matched.push(selected.slice(0, take));
    }
    Ok(matched)
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use ciff_format::{CiffReader, DocRecord, Posting};
    use ciff_ingest::{IndexLoader, LoadParams};
    use ciff_store::memory::MemoryStore;
    use ciff_testkit::SyntheticIndex;

    use super::*;

    fn loaded_store() -> MemoryStore {
        let docs = (0..3)
            .map(|docid| DocRecord {
                docid,
                collection_docid: format!("d{docid}"),
                doclength: 2,
            })
            .collect();
        let index = SyntheticIndex::from_decoded(
            vec!["radboud".into(), "river".into(), "university".into()],
            vec![
                vec![Posting::new(0, 1), Posting::new(2, 3)],
                vec![Posting::new(1, 1)],
                vec![Posting::new(0, 2), Posting::new(1, 1), Posting::new(2, 1)],
            ],
            docs,
        );
        let store = MemoryStore::new();
        IndexLoader::new(&store, LoadParams::default())
            .unwrap()
            .load(&mut CiffReader::new(Cursor::new(index.to_bytes().unwrap())).unwrap())
            .unwrap();
        store
    }

    #[test]
    fn test_find_terms_by_substring() {
        let store = loaded_store();
        let patterns = vec!["radboud".to_string(), "versi".to_string()];
        let (batches, ids) = find_terms(&store, "ows", &patterns).unwrap();
        assert_eq!(ids.into_iter().collect::<Vec<_>>(), vec![0, 2]);
        assert_eq!(batches.iter().map(|b| b.num_rows()).sum::<usize>(), 2);
    }

    #[test]
    fn test_find_postings_respects_limit() {
        let store = loaded_store();
        let ids = BTreeSet::from([0, 2]);
        let all = find_postings(&store, "ows", &ids, 100).unwrap();
        assert_eq!(all.iter().map(|b| b.num_rows()).sum::<usize>(), 5);

        let limited = find_postings(&store, "ows", &ids, 3).unwrap();
        assert_eq!(limited.iter().map(|b| b.num_rows()).sum::<usize>(), 3);

        assert!(find_postings(&store, "ows", &BTreeSet::new(), 10).unwrap().is_empty());
    }
}
