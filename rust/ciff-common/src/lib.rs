//! Core definitions relied upon by all ciff-* crates: the error taxonomy,
//! the `Result` alias and a few verification helpers.

pub mod error;
pub mod macros;
pub mod result;

pub use result::Result;
