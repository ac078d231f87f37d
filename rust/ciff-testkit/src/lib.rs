//! Test utilities shared by the ciff crates.

pub mod data_gen;

pub use data_gen::{IndexShape, SyntheticIndex};
