//! # Database Connectors
//!
//! One uniform capability interface over the three supported backends.
//! Each implementation wraps a single-connection sqlx pool; the schema and
//! sample extractors only ever see the [`Connector`] trait.

pub mod mysql;
pub mod postgres;
pub mod sqlite;
pub(crate) mod value;

use std::future::Future;

use crate::error::Result;
use crate::query::ReadOnlyQuery;
use crate::sample::{CustomQueryResult, SampleRow};
use crate::schema::types::{ColumnInfo, DatabaseKind};

pub use mysql::MySqlConnector;
pub use postgres::PostgresConnector;
pub use sqlite::SqliteConnector;

/// Operations every backend offers over one open connection.
///
/// Per-table methods fail with [`SmartBiError::Extraction`] naming the
/// table, so callers can record the failure and move on.
///
/// [`SmartBiError::Extraction`]: crate::error::SmartBiError::Extraction
pub trait Connector: Send + Sync {
    fn kind(&self) -> DatabaseKind;

    /// User tables in catalog order. Failing here is fatal for extraction.
    fn list_tables(&self) -> impl Future<Output = Result<Vec<String>>> + Send;

    fn describe_table(&self, table: &str) -> impl Future<Output = Result<Vec<ColumnInfo>>> + Send;

    fn count_rows(&self, table: &str) -> impl Future<Output = Result<u64>> + Send;

    /// Up to `limit` rows in whatever order the backend yields them.
    fn sample_rows(
        &self,
        table: &str,
        limit: usize,
    ) -> impl Future<Output = Result<Vec<SampleRow>>> + Send;

    /// Run a checked query, keeping at most `limit` rows.
    fn run_read_only_query(
        &self,
        query: &ReadOnlyQuery,
        limit: usize,
    ) -> impl Future<Output = Result<CustomQueryResult>> + Send;

    /// Release the underlying pool. Safe to call more than once.
    fn close(&self) -> impl Future<Output = ()> + Send;
}

/// The connector for whichever backend a descriptor named.
pub enum DatabaseConnector {
    Postgres(PostgresConnector),
    MySql(MySqlConnector),
    Sqlite(SqliteConnector),
}

impl Connector for DatabaseConnector {
    fn kind(&self) -> DatabaseKind {
        match self {
            DatabaseConnector::Postgres(c) => c.kind(),
            DatabaseConnector::MySql(c) => c.kind(),
            DatabaseConnector::Sqlite(c) => c.kind(),
        }
    }

    async fn list_tables(&self) -> Result<Vec<String>> {
        match self {
            DatabaseConnector::Postgres(c) => c.list_tables().await,
            DatabaseConnector::MySql(c) => c.list_tables().await,
            DatabaseConnector::Sqlite(c) => c.list_tables().await,
        }
    }

    async fn describe_table(&self, table: &str) -> Result<Vec<ColumnInfo>> {
        match self {
            DatabaseConnector::Postgres(c) => c.describe_table(table).await,
            DatabaseConnector::MySql(c) => c.describe_table(table).await,
            DatabaseConnector::Sqlite(c) => c.describe_table(table).await,
        }
    }

    async fn count_rows(&self, table: &str) -> Result<u64> {
        match self {
            DatabaseConnector::Postgres(c) => c.count_rows(table).await,
            DatabaseConnector::MySql(c) => c.count_rows(table).await,
            DatabaseConnector::Sqlite(c) => c.count_rows(table).await,
        }
    }

    async fn sample_rows(&self, table: &str, limit: usize) -> Result<Vec<SampleRow>> {
        match self {
            DatabaseConnector::Postgres(c) => c.sample_rows(table, limit).await,
            DatabaseConnector::MySql(c) => c.sample_rows(table, limit).await,
            DatabaseConnector::Sqlite(c) => c.sample_rows(table, limit).await,
        }
    }

    async fn run_read_only_query(
        &self,
        query: &ReadOnlyQuery,
        limit: usize,
    ) -> Result<CustomQueryResult> {
        match self {
            DatabaseConnector::Postgres(c) => c.run_read_only_query(query, limit).await,
            DatabaseConnector::MySql(c) => c.run_read_only_query(query, limit).await,
            DatabaseConnector::Sqlite(c) => c.run_read_only_query(query, limit).await,
        }
    }

    async fn close(&self) {
        match self {
            DatabaseConnector::Postgres(c) => c.close().await,
            DatabaseConnector::MySql(c) => c.close().await,
            DatabaseConnector::Sqlite(c) => c.close().await,
        }
    }
}

/// `SELECT COUNT(*)` over a quoted table name.
pub(crate) fn row_count_query(table: &str, kind: DatabaseKind) -> String {
    format!("SELECT COUNT(*) AS cnt FROM {}", kind.quote_ident(table))
}

/// `SELECT *` over a quoted table name, capped at `limit` rows.
pub(crate) fn sample_query(table: &str, kind: DatabaseKind, limit: usize) -> String {
    format!("SELECT * FROM {} LIMIT {}", kind.quote_ident(table), limit)
}
