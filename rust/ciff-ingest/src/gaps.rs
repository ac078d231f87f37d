//! Docid gap (delta) coding of CIFF postings.
//!
//! A CIFF postings list stores each docid as the difference to the previous
//! one; the first entry is an absolute docid. Decoding is a running prefix sum
//! over an explicit accumulator.

use ciff_format::Posting;

/// Reason a gap sequence does not decode into a valid postings list.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GapError {
    #[error("negative first docid {gap}")]
    NegativeFirstGap { gap: i32 },

    #[error("non-positive gap {gap} at position {position}")]
    NonIncreasing { position: usize, gap: i32 },

    #[error("docid {docid} at position {position} is out of range (num_docs {num_docs})")]
    OutOfRange {
        position: usize,
        docid: i64,
        num_docs: u64,
    },
}

/// Decodes a gap sequence into absolute `(docid, tf)` postings appended to
/// `out`.
///
/// `docid_0 = gap_0` and `docid_i = docid_{i-1} + gap_i`. The first gap must be
/// non-negative, every later gap strictly positive, and every docid below
/// `num_docs`. On error `out` may hold a prefix of the decoded postings.
pub fn decode_into(
    gaps: &[Posting],
    num_docs: u64,
    out: &mut Vec<Posting>,
) -> Result<(), GapError> {
    out.reserve(gaps.len());
    let mut docid: i64 = 0;
    for (position, posting) in gaps.iter().enumerate() {
        let gap = posting.docid;
        if position == 0 {
            if gap < 0 {
                return Err(GapError::NegativeFirstGap { gap });
            }
        } else if gap <= 0 {
            return Err(GapError::NonIncreasing { position, gap });
        }
        docid += i64::from(gap);
        if docid as u64 >= num_docs {
            return Err(GapError::OutOfRange {
                position,
                docid,
                num_docs,
            });
        }
        // docid < num_docs <= i32::MAX
        out.push(Posting::new(docid as i32, posting.tf));
    }
    Ok(())
}

/// Decodes a gap sequence into a new vector of absolute postings.
pub fn decode(gaps: &[Posting], num_docs: u64) -> Result<Vec<Posting>, GapError> {
    let mut out = Vec::with_capacity(gaps.len());
    decode_into(gaps, num_docs, &mut out)?;
    Ok(out)
}
