//! # Error Types
//!
//! Defines `SmartBiError`, the unified error enum for every failure mode in
//! the SmartBI pipeline. Validation failures (bad URL, disallowed query, bad
//! upload) are kept apart from operational failures (connection, model) so
//! the HTTP layer can map each kind to a status code without string matching.
//!
//! Per-table extraction failures never surface as an `Err`: the extractors
//! record them in the report and keep going.

use thiserror::Error;

/// All errors that can occur in SmartBI operations.
#[derive(Error, Debug)]
pub enum SmartBiError {
    #[error("Unsupported or malformed connection string scheme '{scheme}'. Supported: postgresql://, mysql://, sqlite:///path")]
    InvalidScheme { scheme: String },

    #[error("Connection string has no host: {reason}")]
    InvalidHost { reason: String },

    #[error("Database connection failed: {message}\n  Connection string: {connection_hint}\n  Cause: {source}")]
    Connection {
        message: String,
        connection_hint: String,
        #[source]
        source: sqlx::Error,
    },

    #[error("Schema introspection failed on query '{query}': {source}")]
    Introspection {
        query: String,
        #[source]
        source: sqlx::Error,
    },

    #[error("Query not allowed: {reason}")]
    QueryNotAllowed { reason: String },

    #[error("Custom query failed: {source}")]
    Query {
        #[source]
        source: sqlx::Error,
    },

    #[error("Extraction failed for table '{table}': {source}")]
    Extraction {
        table: String,
        #[source]
        source: sqlx::Error,
    },

    #[error("Model API error: {message}")]
    ModelApi { message: String },

    #[error("No model API key configured. Set GEMINI_API_KEY, ANTHROPIC_API_KEY or OPENAI_API_KEY.")]
    ModelNotConfigured,

    #[error("Unsupported file '{file_name}'. Upload a .csv or .sql file")]
    UnsupportedUpload { file_name: String },

    #[error("File too large: {size} bytes (maximum {max} bytes)")]
    UploadTooLarge { size: u64, max: u64 },

    #[error("Could not process uploaded file: {message}")]
    Upload { message: String },

    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error("I/O error: {message}: {source}")]
    Io {
        message: String,
        #[source]
        source: std::io::Error,
    },

    #[error("{0}")]
    Other(String),
}

impl SmartBiError {
    /// Stable snake_case tag for this error, used in API error bodies and logs.
    pub fn kind(&self) -> &'static str {
        match self {
            SmartBiError::InvalidScheme { .. } => "invalid_scheme",
            SmartBiError::InvalidHost { .. } => "invalid_host",
            SmartBiError::Connection { .. } => "connection_error",
            SmartBiError::Introspection { .. } => "introspection_error",
            SmartBiError::QueryNotAllowed { .. } => "query_not_allowed",
            SmartBiError::Query { .. } => "query_error",
            SmartBiError::Extraction { .. } => "extraction_error",
            SmartBiError::ModelApi { .. } => "model_api_error",
            SmartBiError::ModelNotConfigured => "model_not_configured",
            SmartBiError::UnsupportedUpload { .. } => "unsupported_upload",
            SmartBiError::UploadTooLarge { .. } => "upload_too_large",
            SmartBiError::Upload { .. } => "upload_error",
            SmartBiError::Config { .. } => "config_error",
            SmartBiError::Io { .. } => "io_error",
            SmartBiError::Other(_) => "unexpected_error",
        }
    }

    /// True for failures caused by caller input rather than by the service
    /// or its collaborators.
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            SmartBiError::InvalidScheme { .. }
                | SmartBiError::InvalidHost { .. }
                | SmartBiError::QueryNotAllowed { .. }
                | SmartBiError::UnsupportedUpload { .. }
                | SmartBiError::UploadTooLarge { .. }
                | SmartBiError::Upload { .. }
        )
    }
}

pub type Result<T> = std::result::Result<T, SmartBiError>;
