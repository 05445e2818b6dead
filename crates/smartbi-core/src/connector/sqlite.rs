use std::path::Path;
use std::str::FromStr;

use futures::TryStreamExt;
use indexmap::IndexMap;
use serde_json::Value;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions, SqliteRow};
use sqlx::{Executor, Row, TypeInfo, ValueRef};

use crate::connector::value::{self, opt};
use crate::connector::{row_count_query, sample_query, Connector};
use crate::error::{Result, SmartBiError};
use crate::query::ReadOnlyQuery;
use crate::sample::{CustomQueryResult, SampleRow};
use crate::schema::types::{ColumnInfo, DatabaseKind};

pub struct SqliteConnector {
    pool: SqlitePool,
}

impl SqliteConnector {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Open an existing database file read-only. A missing file is an error.
    pub async fn open_read_only(path: &Path) -> std::result::Result<Self, sqlx::Error> {
        Self::open_read_only_with(path, &IndexMap::new()).await
    }

    /// Like [`SqliteConnector::open_read_only`], applying the connection
    /// URL's query parameters (`cache`, `immutable`, `vfs`, `mode`).
    pub async fn open_read_only_with(
        path: &Path,
        params: &IndexMap<String, String>,
    ) -> std::result::Result<Self, sqlx::Error> {
        let options = read_only_options(path, params)?;
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect_with(options)
            .await?;
        Ok(Self { pool })
    }

    /// A private, writable in-memory database. The single connection is
    /// never recycled, since recycling it would discard the data.
    pub async fn in_memory() -> Result<Self> {
        let options = SqliteConnectOptions::from_str("sqlite::memory:").map_err(|e| {
            SmartBiError::Upload {
                message: format!("could not configure in-memory database: {}", e),
            }
        })?;
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .min_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(options)
            .await
            .map_err(|e| SmartBiError::Upload {
                message: format!("could not open in-memory database: {}", e),
            })?;
        Ok(Self { pool })
    }

    pub(crate) fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

impl Connector for SqliteConnector {
    fn kind(&self) -> DatabaseKind {
        DatabaseKind::SQLite
    }

    async fn list_tables(&self) -> Result<Vec<String>> {
        // rowid order is creation order
        let query = "SELECT name FROM sqlite_master WHERE type = 'table' AND name NOT LIKE 'sqlite_%' ORDER BY rowid";
        let rows = sqlx::query(query)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| SmartBiError::Introspection {
                query: "fetch tables".to_string(),
                source: e,
            })?;

        rows.iter()
            .map(|row| {
                row.try_get("name").map_err(|e| SmartBiError::Introspection {
                    query: "fetch tables".to_string(),
                    source: e,
                })
            })
            .collect()
    }

    async fn describe_table(&self, table: &str) -> Result<Vec<ColumnInfo>> {
        let query = format!("PRAGMA table_info({})", DatabaseKind::SQLite.quote_ident(table));
        let rows = sqlx::query(&query)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| extraction(table, e))?;

        rows.iter()
            .map(|row| {
                let name: String = row.try_get("name").map_err(|e| extraction(table, e))?;
                let type_str: String = row.try_get("type").map_err(|e| extraction(table, e))?;
                let notnull: i32 = row.try_get("notnull").map_err(|e| extraction(table, e))?;

                let mut column = ColumnInfo::new(name, type_str);
                column.nullable = notnull == 0;
                Ok(column)
            })
            .collect()
    }

    async fn count_rows(&self, table: &str) -> Result<u64> {
        let sql = row_count_query(table, DatabaseKind::SQLite);
        let row: (i64,) = sqlx::query_as(&sql)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| extraction(table, e))?;
        Ok(row.0.max(0) as u64)
    }

    async fn sample_rows(&self, table: &str, limit: usize) -> Result<Vec<SampleRow>> {
        let sql = sample_query(table, DatabaseKind::SQLite, limit);
        let rows = sqlx::query(&sql)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| extraction(table, e))?;

        Ok(rows.iter().map(convert_row).collect())
    }

    async fn run_read_only_query(
        &self,
        query: &ReadOnlyQuery,
        limit: usize,
    ) -> Result<CustomQueryResult> {
        let mut conn = self
            .pool
            .acquire()
            .await
            .map_err(|e| SmartBiError::Query { source: e })?;

        let mut columns = Vec::new();
        let mut data = Vec::new();
        let mut truncated = false;
        {
            let mut stream = sqlx::query(query.as_str()).fetch(&mut *conn);
            while let Some(row) = stream
                .try_next()
                .await
                .map_err(|e| SmartBiError::Query { source: e })?
            {
                if data.len() == limit {
                    truncated = true;
                    break;
                }
                if columns.is_empty() {
                    columns = value::column_names(&row);
                }
                data.push(convert_row(&row));
            }
        }

        if data.is_empty() {
            columns = match (&mut *conn).describe(query.as_str()).await {
                Ok(described) => value::unique_names(
                    described.columns().iter().map(|c| sqlx::Column::name(c)),
                ),
                Err(_) => Vec::new(),
            };
        }

        Ok(CustomQueryResult::new(columns, data, truncated))
    }

    async fn close(&self) {
        self.pool.close().await;
    }
}

/// File options for a read-only open. `mode` may only narrow access, and
/// unknown keys are refused rather than ignored.
fn read_only_options(
    path: &Path,
    params: &IndexMap<String, String>,
) -> std::result::Result<SqliteConnectOptions, sqlx::Error> {
    let mut options = SqliteConnectOptions::new()
        .filename(path)
        .create_if_missing(false);

    for (key, value) in params {
        options = match (key.as_str(), value.as_str()) {
            ("mode", "ro" | "rw" | "rwc") => options,
            ("cache", "shared") => options.shared_cache(true),
            ("cache", "private") => options.shared_cache(false),
            ("immutable", flag) => options.immutable(is_true(flag)),
            ("vfs", name) if !name.is_empty() => options.vfs(name.to_string()),
            _ => {
                return Err(sqlx::Error::Configuration(
                    format!("unsupported sqlite URL parameter '{}={}'", key, value).into(),
                ))
            }
        };
    }

    Ok(options.read_only(true))
}

fn is_true(flag: &str) -> bool {
    matches!(flag.to_ascii_lowercase().as_str(), "1" | "true" | "yes" | "on")
}

fn extraction(table: &str, source: sqlx::Error) -> SmartBiError {
    SmartBiError::Extraction {
        table: table.to_string(),
        source,
    }
}

/// SQLite values are decoded by their storage class, except that columns
/// declared BOOLEAN come back as JSON booleans.
fn convert_row(row: &SqliteRow) -> SampleRow {
    value::to_sample_row(row, |row, i, declared| {
        let storage = match row.try_get_raw(i) {
            Ok(raw) if raw.is_null() => return Value::Null,
            Ok(raw) => raw.type_info().name().to_string(),
            Err(_) => return Value::Null,
        };

        match storage.as_str() {
            "INTEGER" if declared.eq_ignore_ascii_case("BOOLEAN") => {
                opt(row.try_get::<Option<bool>, _>(i), Value::Bool)
            }
            "INTEGER" => opt(row.try_get::<Option<i64>, _>(i), |v| Value::Number(v.into())),
            "REAL" => opt(row.try_get::<Option<f64>, _>(i), value::float),
            "BLOB" => opt(row.try_get::<Option<Vec<u8>>, _>(i), value::binary),
            _ => opt(row.try_get_unchecked::<Option<String>, _>(i), Value::String),
        }
    })
}
