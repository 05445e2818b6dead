//! # File Uploads
//!
//! Accepts a `.csv` or `.sql` file, spools it to a temporary file and loads
//! it into a private in-memory SQLite database. From there the same schema
//! and sample extraction used for live databases takes over.
//!
//! The temporary file is removed when the [`SpooledUpload`] is dropped,
//! whichever way the request ends.

pub mod csv;
pub mod sql;

use std::io::Write;
use std::path::Path;

use serde::Serialize;
use tempfile::NamedTempFile;

use crate::connector::SqliteConnector;
use crate::error::{Result, SmartBiError};

/// Supported upload formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum UploadKind {
    Csv,
    Sql,
}

impl UploadKind {
    /// Classify by extension, case-insensitively. A missing or empty name
    /// and any other extension are rejected.
    pub fn from_file_name(file_name: Option<&str>) -> Result<Self> {
        let name = file_name.map(str::trim).unwrap_or_default();
        if name.is_empty() {
            return Err(SmartBiError::UnsupportedUpload {
                file_name: String::new(),
            });
        }

        let extension = Path::new(name)
            .extension()
            .map(|e| e.to_string_lossy().to_ascii_lowercase());

        match extension.as_deref() {
            Some("csv") => Ok(UploadKind::Csv),
            Some("sql") => Ok(UploadKind::Sql),
            _ => Err(SmartBiError::UnsupportedUpload {
                file_name: name.to_string(),
            }),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            UploadKind::Csv => "csv",
            UploadKind::Sql => "sql",
        }
    }
}

/// What a loader put into the in-memory database.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct LoadReport {
    pub tables_created: Vec<String>,
    pub rows_loaded: u64,
    pub statements_executed: usize,
    pub statements_failed: usize,
    pub statements_skipped: usize,
}

/// An upload being written to disk, with its size enforced as it grows.
pub struct SpooledUpload {
    file: NamedTempFile,
    file_name: String,
    kind: UploadKind,
    size: u64,
    max_bytes: u64,
}

impl SpooledUpload {
    pub fn new(file_name: Option<&str>, max_bytes: u64) -> Result<Self> {
        let kind = UploadKind::from_file_name(file_name)?;
        let file = NamedTempFile::new().map_err(|e| SmartBiError::Io {
            message: "creating temporary upload file".to_string(),
            source: e,
        })?;

        Ok(Self {
            file,
            file_name: file_name.unwrap_or_default().trim().to_string(),
            kind,
            size: 0,
            max_bytes,
        })
    }

    /// Append a chunk, failing as soon as the total passes the cap.
    pub fn write_chunk(&mut self, chunk: &[u8]) -> Result<()> {
        let size = self.size + chunk.len() as u64;
        if size > self.max_bytes {
            return Err(SmartBiError::UploadTooLarge {
                size,
                max: self.max_bytes,
            });
        }

        self.file.write_all(chunk).map_err(|e| SmartBiError::Io {
            message: "writing temporary upload file".to_string(),
            source: e,
        })?;
        self.size = size;
        Ok(())
    }

    pub fn file_name(&self) -> &str {
        &self.file_name
    }

    pub fn kind(&self) -> UploadKind {
        self.kind
    }

    pub fn size(&self) -> u64 {
        self.size
    }

    pub fn path(&self) -> &Path {
        self.file.path()
    }

    /// Table name for a CSV upload: the file stem reduced to identifier
    /// characters.
    pub fn table_name(&self) -> String {
        let stem = Path::new(&self.file_name)
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();
        sanitize_identifier(&stem)
    }
}

/// Load a finished upload into a fresh in-memory SQLite database. The
/// database is switched to query-only once loading is done.
pub async fn load_upload(upload: &SpooledUpload) -> Result<(SqliteConnector, LoadReport)> {
    let bytes = tokio::fs::read(upload.path())
        .await
        .map_err(|e| SmartBiError::Io {
            message: "reading temporary upload file".to_string(),
            source: e,
        })?;
    let text = String::from_utf8_lossy(&bytes);
    if text.trim().is_empty() {
        return Err(SmartBiError::Upload {
            message: format!("{} is empty", upload.file_name()),
        });
    }

    let connector = SqliteConnector::in_memory().await?;
    let report = match upload.kind() {
        UploadKind::Csv => csv::load_csv(&connector, &upload.table_name(), &text).await?,
        UploadKind::Sql => sql::load_sql_dump(&connector, &text).await?,
    };

    sqlx::query("PRAGMA query_only = ON")
        .execute(connector.pool())
        .await
        .map_err(|e| SmartBiError::Upload {
            message: format!("could not lock loaded data: {}", e),
        })?;

    tracing::info!(
        "Loaded {} ({} bytes): {} tables, {} rows, {} statements failed",
        upload.file_name(),
        upload.size(),
        report.tables_created.len(),
        report.rows_loaded,
        report.statements_failed
    );
    Ok((connector, report))
}

/// Lowercase ASCII identifier made of `[a-z0-9_]`, never empty and never
/// starting with a digit.
pub(crate) fn sanitize_identifier(raw: &str) -> String {
    let mut out: String = raw
        .trim()
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() {
                c.to_ascii_lowercase()
            } else {
                '_'
            }
        })
        .collect();

    while out.contains("__") {
        out = out.replace("__", "_");
    }
    let out = out.trim_matches('_').to_string();

    if out.is_empty() {
        "data".to_string()
    } else if out.starts_with(|c: char| c.is_ascii_digit()) {
        format!("t_{}", out)
    } else {
        out
    }
}
