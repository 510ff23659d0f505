//! Tabular dataset model
//!
//! A [`Dataset`] is an ordered table of named columns, each carrying one of
//! three semantic types: numeric, categorical or datetime. Datasets are built
//! from polars frames (or directly from column vectors in tests) and are never
//! mutated once loaded into a session.

mod dataset;

pub use dataset::{ColumnData, ColumnSummary, Dataset, DatasetSummary, SemanticType};
pub(crate) use dataset::format_number;
