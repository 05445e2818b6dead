//! # Sampling
//!
//! Pulls a bounded number of rows from each table, or the result of one
//! caller-supplied read-only query, into plain JSON rows.

pub mod extract;
pub mod report;

pub use extract::{extract_samples, run_custom_query};
pub use report::{CustomQueryResult, SampleReport, SampleRow};
