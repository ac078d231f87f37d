//! CIFF ingestion pipeline.
//!
//! Reads a CIFF stream in a single pass and materializes it in a
//! [`TableStore`](ciff_store::TableStore):
//!
//! ```text
//! CiffReader -> gap decoding + term ids -> BatchAssembler -> staging tables
//!            -> dict / postings / docs (set-based project and unnest)
//! ```
//!
//! Memory use is bounded by one batch of each stream, independent of the size
//! of the collection.

pub mod assembler;
pub mod batches;
pub mod gaps;
pub mod loader;
pub mod params;
pub mod term_ids;

pub use loader::{IndexLoader, LoadStep, LoadSummary};
pub use params::{CfPolicy, LoadParams};
pub use term_ids::TermIdAssigner;
