pub mod analysis;
pub mod config;
pub mod connection;
pub mod connector;
pub mod error;
pub mod extraction;
pub mod llm;
pub mod query;
pub mod sample;
pub mod schema;
pub mod summary;
pub mod upload;

// Re-export key types for convenience
pub use error::{Result, SmartBiError};
pub use extraction::{Extraction, ExtractionMethod, ExtractionRequest};
pub use query::ReadOnlyQuery;
pub use schema::types::{DatabaseKind, SchemaReport};
