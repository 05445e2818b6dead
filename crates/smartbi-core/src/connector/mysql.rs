use futures::TryStreamExt;
use serde_json::Value;
use sqlx::mysql::{MySqlPool, MySqlPoolOptions, MySqlRow};
use sqlx::types::chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use sqlx::types::Decimal;
use sqlx::{Executor, Row};

use crate::connector::value::{self, opt};
use crate::connector::{row_count_query, sample_query, Connector};
use crate::error::{Result, SmartBiError};
use crate::query::ReadOnlyQuery;
use crate::sample::{CustomQueryResult, SampleRow};
use crate::schema::types::{ColumnInfo, DatabaseKind};

pub struct MySqlConnector {
    pool: MySqlPool,
}

impl MySqlConnector {
    pub fn new(pool: MySqlPool) -> Self {
        Self { pool }
    }

    /// Open a single-connection pool. `ssl-mode` and other URL parameters
    /// are interpreted by the driver.
    pub async fn connect(url: &str) -> std::result::Result<Self, sqlx::Error> {
        let pool = MySqlPoolOptions::new().max_connections(1).connect(url).await?;
        Ok(Self { pool })
    }

    async fn collect_query(
        conn: &mut sqlx::MySqlConnection,
        query: &ReadOnlyQuery,
        limit: usize,
    ) -> Result<CustomQueryResult> {
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
}

impl Connector for MySqlConnector {
    fn kind(&self) -> DatabaseKind {
        DatabaseKind::MySQL
    }

    async fn list_tables(&self) -> Result<Vec<String>> {
        let query = "SELECT TABLE_NAME AS table_name FROM information_schema.tables WHERE table_schema = DATABASE() AND table_type = 'BASE TABLE'";
        let rows = sqlx::query(query)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| SmartBiError::Introspection {
                query: "fetch tables".to_string(),
                source: e,
            })?;

        rows.iter()
            .map(|row| {
                row.try_get("table_name")
                    .map_err(|e| SmartBiError::Introspection {
                        query: "fetch tables".to_string(),
                        source: e,
                    })
            })
            .collect()
    }

    async fn describe_table(&self, table: &str) -> Result<Vec<ColumnInfo>> {
        let query = r#"
            SELECT
                COLUMN_NAME AS column_name,
                COLUMN_TYPE AS column_type,
                IS_NULLABLE AS is_nullable
            FROM information_schema.columns
            WHERE table_schema = DATABASE() AND table_name = ?
            ORDER BY ordinal_position
        "#;

        let rows = sqlx::query(query)
            .bind(table)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| extraction(table, e))?;

        rows.iter()
            .map(|row| {
                let name: String = row.try_get("column_name").map_err(|e| extraction(table, e))?;
                let column_type: String =
                    row.try_get("column_type").map_err(|e| extraction(table, e))?;
                let is_nullable: String =
                    row.try_get("is_nullable").map_err(|e| extraction(table, e))?;

                let mut column = ColumnInfo::new(name, column_type);
                column.nullable = is_nullable == "YES";
                Ok(column)
            })
            .collect()
    }

    async fn count_rows(&self, table: &str) -> Result<u64> {
        let sql = row_count_query(table, DatabaseKind::MySQL);
        let row: (i64,) = sqlx::query_as(&sql)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| extraction(table, e))?;
        Ok(row.0.max(0) as u64)
    }

    async fn sample_rows(&self, table: &str, limit: usize) -> Result<Vec<SampleRow>> {
        let sql = sample_query(table, DatabaseKind::MySQL, limit);
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

        // SET TRANSACTION cannot be used inside an open transaction on MySQL
        (&mut *conn)
            .execute("START TRANSACTION READ ONLY")
            .await
            .map_err(|e| SmartBiError::Query { source: e })?;

        let result = Self::collect_query(&mut conn, query, limit).await;

        if let Err(e) = (&mut *conn).execute("ROLLBACK").await {
            tracing::warn!("rollback after custom query failed: {}", e);
        }

        result
    }

    async fn close(&self) {
        self.pool.close().await;
    }
}

fn extraction(table: &str, source: sqlx::Error) -> SmartBiError {
    SmartBiError::Extraction {
        table: table.to_string(),
        source,
    }
}

fn convert_row(row: &MySqlRow) -> SampleRow {
    value::to_sample_row(row, |row, i, type_name| match type_name {
        "BOOLEAN" => opt(row.try_get::<Option<bool>, _>(i), Value::Bool),
        "TINYINT" | "SMALLINT" | "MEDIUMINT" | "INT" | "BIGINT" => {
            opt(row.try_get::<Option<i64>, _>(i), |v| Value::Number(v.into()))
        }
        t if t.ends_with(" UNSIGNED") => {
            opt(row.try_get::<Option<u64>, _>(i), |v| Value::Number(v.into()))
        }
        "YEAR" => opt(row.try_get_unchecked::<Option<u16>, _>(i), |v| {
            Value::Number(v.into())
        }),
        "FLOAT" => opt(row.try_get::<Option<f32>, _>(i), |v| value::float(v as f64)),
        "DOUBLE" => opt(row.try_get::<Option<f64>, _>(i), value::float),
        "DECIMAL" => opt(row.try_get::<Option<Decimal>, _>(i), value::display),
        "DATE" => opt(row.try_get::<Option<NaiveDate>, _>(i), |v| {
            Value::String(v.format("%Y-%m-%d").to_string())
        }),
        "TIME" => opt(row.try_get::<Option<NaiveTime>, _>(i), |v| {
            Value::String(v.format("%H:%M:%S%.f").to_string())
        }),
        "DATETIME" => opt(row.try_get::<Option<NaiveDateTime>, _>(i), |v| {
            Value::String(v.format("%Y-%m-%dT%H:%M:%S%.f").to_string())
        }),
        "TIMESTAMP" => opt(row.try_get::<Option<DateTime<Utc>>, _>(i), |v| {
            Value::String(v.to_rfc3339())
        }),
        "JSON" => opt(row.try_get::<Option<Value>, _>(i), value::json_text),
        "BINARY" | "VARBINARY" | "TINYBLOB" | "BLOB" | "MEDIUMBLOB" | "LONGBLOB" | "BIT"
        | "GEOMETRY" => opt(row.try_get_unchecked::<Option<Vec<u8>>, _>(i), value::binary),
        // CHAR, VARCHAR, TEXT, ENUM, SET and anything newer
        _ => opt(
            row.try_get_unchecked::<Option<Vec<u8>>, _>(i),
            value::text_or_binary,
        ),
    })
}
