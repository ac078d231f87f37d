//! Synthetic CIFF index generation.
//!
//! Indexes are generated from a seed, so a test can regenerate the exact same
//! stream and compare a load against the known decoded content.

use std::{fs::File, io::Write, path::Path};

use ciff_format::{
    CiffWriter, DocRecord, Header, Posting, PostingsList, container::Compression,
};

/// Shape parameters of a generated index.
#[derive(Debug, Clone)]
pub struct IndexShape {
    pub num_terms: usize,
    pub num_docs: usize,
    /// Upper bound (inclusive) on the document frequency of a term.
    pub max_df: usize,
    /// Every n-th term (if set) gets an empty postings list.
    pub empty_term_every: Option<usize>,
    pub seed: u64,
}

impl Default for IndexShape {
    fn default() -> Self {
        IndexShape {
            num_terms: 100,
            num_docs: 50,
            max_df: 10,
            empty_term_every: None,
            seed: 42,
        }
    }
}

/// An in-memory CIFF index together with its decoded content.
#[derive(Debug, Clone)]
pub struct SyntheticIndex {
    pub header: Header,
    /// Postings lists as stored in the stream (docids gap-encoded).
    pub postings_lists: Vec<PostingsList>,
    /// Absolute `(docid, tf)` postings of each term, in term order.
    pub decoded: Vec<Vec<Posting>>,
    pub docs: Vec<DocRecord>,
}

impl SyntheticIndex {
    /// Generates a random index of the given shape.
    pub fn generate(shape: &IndexShape) -> SyntheticIndex {
        let mut rng = fastrand::Rng::with_seed(shape.seed);

        let docs = (0..shape.num_docs)
            .map(|docid| DocRecord {
                docid: docid as i32,
                collection_docid: format!("DOC-{:06}-{}", docid, rng.u32(..)),
                doclength: rng.i32(1..500),
            })
            .collect::<Vec<_>>();

        let mut decoded = Vec::with_capacity(shape.num_terms);
        for term_idx in 0..shape.num_terms {
            let is_empty = shape
                .empty_term_every
                .is_some_and(|every| every > 0 && term_idx % every == 0);
            let max_df = shape.max_df.min(shape.num_docs);
            let df = if is_empty || max_df == 0 {
                0
            } else {
                rng.usize(1..=max_df)
            };
            let mut docids = rand_distinct(&mut rng, df, shape.num_docs);
            docids.sort_unstable();
            decoded.push(
                docids
                    .into_iter()
                    .map(|docid| Posting::new(docid as i32, rng.i32(1..20)))
                    .collect::<Vec<_>>(),
            );
        }

        let terms = (0..shape.num_terms)
            .map(|i| format!("term{i:05}"))
            .collect::<Vec<_>>();
        SyntheticIndex::from_decoded(terms, decoded, docs)
    }

    /// Builds an index from decoded postings and documents.
    pub fn from_decoded(
        terms: Vec<String>,
        decoded: Vec<Vec<Posting>>,
        docs: Vec<DocRecord>,
    ) -> SyntheticIndex {
        assert_eq!(terms.len(), decoded.len());
        let postings_lists = terms
            .into_iter()
            .zip(&decoded)
            .map(|(term, postings)| PostingsList {
                term,
                df: postings.len() as i64,
                cf: postings.iter().map(|p| i64::from(p.tf)).sum(),
                postings: gap_encode(postings),
            })
            .collect::<Vec<_>>();

        let total_terms: i64 = postings_lists.iter().map(|l| l.cf).sum();
        let total_length: i64 = docs.iter().map(|d| i64::from(d.doclength)).sum();
        let average_doclength = if docs.is_empty() {
            0.0
        } else {
            total_length as f64 / docs.len() as f64
        };
        let header = Header {
            version: 1,
            num_postings_lists: postings_lists.len() as i32,
            num_docs: docs.len() as i32,
            total_postings_lists: postings_lists.len() as i32,
            total_docs: docs.len() as i32,
            total_terms_in_collection: total_terms,
            average_doclength,
            description: "synthetic test index".to_string(),
        };
        SyntheticIndex {
            header,
            postings_lists,
            decoded,
            docs,
        }
    }

    /// Two documents and one term `"cat"` with `df=2, cf=3`, stored as gaps
    /// `[(0, 2), (1, 1)]`.
    pub fn cat() -> SyntheticIndex {
        let docs = (0..2)
            .map(|docid| DocRecord {
                docid,
                collection_docid: format!("doc{docid}"),
                doclength: 4,
            })
            .collect();
        SyntheticIndex::from_decoded(
            vec!["cat".to_string()],
            vec![vec![Posting::new(0, 2), Posting::new(1, 1)]],
            docs,
        )
    }

    pub fn num_terms(&self) -> u64 {
        self.postings_lists.len() as u64
    }

    /// Sum of `df` over all terms.
    pub fn total_postings(&self) -> u64 {
        self.decoded.iter().map(|p| p.len() as u64).sum()
    }

    /// Encodes the index as an uncompressed CIFF stream.
    pub fn to_bytes(&self) -> anyhow::Result<Vec<u8>> {
        let mut writer = CiffWriter::new(Vec::new(), &self.header)?;
        for list in &self.postings_lists {
            writer.write_postings_list(list)?;
        }
        for doc in &self.docs {
            writer.write_document(doc)?;
        }
        Ok(writer.finish()?)
    }

    /// Encodes the index as a CIFF container with the given compression.
    pub fn to_container(&self, compression: Compression) -> anyhow::Result<Vec<u8>> {
        let raw = self.to_bytes()?;
        let bytes = match compression {
            Compression::None => raw,
            Compression::Gzip => {
                let mut encoder =
                    flate2::write::GzEncoder::new(Vec::new(), flate2::Compression::fast());
                encoder.write_all(&raw)?;
                encoder.finish()?
            }
            Compression::Zstd => zstd::encode_all(raw.as_slice(), 3)?,
        };
        Ok(bytes)
    }

    /// Writes the container to `path`.
    pub fn write_file(&self, path: impl AsRef<Path>, compression: Compression) -> anyhow::Result<()> {
        let mut file = File::create(path)?;
        file.write_all(&self.to_container(compression)?)?;
        file.sync_all()?;
        Ok(())
    }

    /// Writes the container to a new temporary file.
    pub fn to_temp_file(&self, compression: Compression) -> anyhow::Result<tempfile::NamedTempFile> {
        let mut file = tempfile::Builder::new().suffix(".ciff").tempfile()?;
        file.write_all(&self.to_container(compression)?)?;
        file.flush()?;
        Ok(file)
    }
}

/// Gap-encodes strictly increasing absolute postings.
pub fn gap_encode(postings: &[Posting]) -> Vec<Posting> {
    let mut prev = 0;
    postings
        .iter()
        .map(|p| {
            let gap = p.docid - prev;
            prev = p.docid;
            Posting::new(gap, p.tf)
        })
        .collect()
}

/// `count` distinct values from `0..bound`.
fn rand_distinct(rng: &mut fastrand::Rng, count: usize, bound: usize) -> Vec<usize> {
    assert!(count <= bound);
    if count * 2 > bound {
        let mut all = (0..bound).collect::<Vec<_>>();
        rng.shuffle(&mut all);
        all.truncate(count);
        return all;
    }
    let mut picked = std::collections::BTreeSet::new();
    while picked.len() < count {
        picked.insert(rng.usize(0..bound));
    }
    picked.into_iter().collect()
}
