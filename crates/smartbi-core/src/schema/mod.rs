//! Table catalog, column metadata and row counts.

pub mod extract;
pub mod types;

pub use extract::extract_schema;
