use futures::TryStreamExt;
use serde_json::Value;
use sqlx::postgres::{PgPool, PgPoolOptions, PgRow};
use sqlx::types::chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use sqlx::types::{Decimal, Uuid};
use sqlx::{Executor, Row};

use crate::connector::value::{self, opt};
use crate::connector::Connector;
use crate::error::{Result, SmartBiError};
use crate::query::ReadOnlyQuery;
use crate::sample::{CustomQueryResult, SampleRow};
use crate::schema::types::{ColumnInfo, DatabaseKind};

pub struct PostgresConnector {
    pool: PgPool,
    schema_name: String,
}

impl PostgresConnector {
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool,
            schema_name: "public".to_string(),
        }
    }

    pub fn with_schema(pool: PgPool, schema_name: String) -> Self {
        Self { pool, schema_name }
    }

    /// Open a single-connection pool. Query parameters in `url` (sslmode and
    /// friends) are interpreted by the driver.
    pub async fn connect(url: &str, schema_name: &str) -> std::result::Result<Self, sqlx::Error> {
        let pool = PgPoolOptions::new().max_connections(1).connect(url).await?;
        Ok(Self::with_schema(pool, schema_name.to_string()))
    }

    /// `"schema"."table"`, so tables outside the search path still resolve.
    fn qualified(&self, table: &str) -> String {
        format!(
            "{}.{}",
            DatabaseKind::PostgreSQL.quote_ident(&self.schema_name),
            DatabaseKind::PostgreSQL.quote_ident(table)
        )
    }
}

impl Connector for PostgresConnector {
    fn kind(&self) -> DatabaseKind {
        DatabaseKind::PostgreSQL
    }

    async fn list_tables(&self) -> Result<Vec<String>> {
        let query = "SELECT table_name::text AS table_name FROM information_schema.tables WHERE table_schema = $1 AND table_type = 'BASE TABLE'";
        let rows = sqlx::query(query)
            .bind(&self.schema_name)
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
                c.column_name::text AS column_name,
                c.data_type::text AS data_type,
                c.udt_name::text AS udt_name,
                c.is_nullable::text AS is_nullable
            FROM information_schema.columns c
            WHERE c.table_schema = $1 AND c.table_name = $2
            ORDER BY c.ordinal_position
        "#;

        let rows = sqlx::query(query)
            .bind(&self.schema_name)
            .bind(table)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| extraction(table, e))?;

        rows.iter()
            .map(|row| {
                let name: String = row.try_get("column_name").map_err(|e| extraction(table, e))?;
                let data_type: String = row.try_get("data_type").map_err(|e| extraction(table, e))?;
                let udt_name: String = row.try_get("udt_name").map_err(|e| extraction(table, e))?;
                let is_nullable: String =
                    row.try_get("is_nullable").map_err(|e| extraction(table, e))?;

                // Arrays and user-defined types only say ARRAY / USER-DEFINED
                let declared = if data_type == "ARRAY" || data_type == "USER-DEFINED" {
                    udt_name
                } else {
                    data_type
                };

                let mut column = ColumnInfo::new(name, declared);
                column.nullable = is_nullable == "YES";
                Ok(column)
            })
            .collect()
    }

    async fn count_rows(&self, table: &str) -> Result<u64> {
        let sql = format!("SELECT COUNT(*) AS cnt FROM {}", self.qualified(table));
        let row: (i64,) = sqlx::query_as(&sql)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| extraction(table, e))?;
        Ok(row.0.max(0) as u64)
    }

    async fn sample_rows(&self, table: &str, limit: usize) -> Result<Vec<SampleRow>> {
        let sql = format!("SELECT * FROM {} LIMIT {}", self.qualified(table), limit);
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
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| SmartBiError::Query { source: e })?;

        sqlx::query("SET TRANSACTION READ ONLY")
            .execute(&mut *tx)
            .await
            .map_err(|e| SmartBiError::Query { source: e })?;

        let mut columns = Vec::new();
        let mut data = Vec::new();
        let mut truncated = false;
        {
            let mut stream = sqlx::query(query.as_str()).fetch(&mut *tx);
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
            columns = match (&mut *tx).describe(query.as_str()).await {
                Ok(described) => value::unique_names(
                    described.columns().iter().map(|c| sqlx::Column::name(c)),
                ),
                Err(_) => Vec::new(),
            };
        }

        tx.rollback()
            .await
            .map_err(|e| SmartBiError::Query { source: e })?;

        Ok(CustomQueryResult::new(columns, data, truncated))
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

fn convert_row(row: &PgRow) -> SampleRow {
    value::to_sample_row(row, |row, i, type_name| match type_name {
        "BOOL" => opt(row.try_get::<Option<bool>, _>(i), Value::Bool),
        "INT2" => opt(row.try_get::<Option<i16>, _>(i), |v| Value::Number(v.into())),
        "INT4" => opt(row.try_get::<Option<i32>, _>(i), |v| Value::Number(v.into())),
        "INT8" => opt(row.try_get::<Option<i64>, _>(i), |v| Value::Number(v.into())),
        "OID" => opt(row.try_get::<Option<sqlx::postgres::types::Oid>, _>(i), |v| {
            Value::Number(v.0.into())
        }),
        "FLOAT4" => opt(row.try_get::<Option<f32>, _>(i), |v| value::float(v as f64)),
        "FLOAT8" => opt(row.try_get::<Option<f64>, _>(i), value::float),
        "NUMERIC" => opt(row.try_get::<Option<Decimal>, _>(i), value::display),
        "DATE" => opt(row.try_get::<Option<NaiveDate>, _>(i), |v| {
            Value::String(v.format("%Y-%m-%d").to_string())
        }),
        "TIME" => opt(row.try_get::<Option<NaiveTime>, _>(i), |v| {
            Value::String(v.format("%H:%M:%S%.f").to_string())
        }),
        "TIMESTAMP" => opt(row.try_get::<Option<NaiveDateTime>, _>(i), |v| {
            Value::String(v.format("%Y-%m-%dT%H:%M:%S%.f").to_string())
        }),
        "TIMESTAMPTZ" => opt(row.try_get::<Option<DateTime<Utc>>, _>(i), |v| {
            Value::String(v.to_rfc3339())
        }),
        "UUID" => opt(row.try_get::<Option<Uuid>, _>(i), value::display),
        "JSON" | "JSONB" => opt(row.try_get::<Option<Value>, _>(i), value::json_text),
        "BYTEA" => opt(row.try_get::<Option<Vec<u8>>, _>(i), value::binary),
        "TEXT" | "VARCHAR" | "BPCHAR" | "NAME" | "CITEXT" => {
            opt(row.try_get::<Option<String>, _>(i), Value::String)
        }
        // Enums and other text-encoded types
        _ => opt(row.try_get_unchecked::<Option<String>, _>(i), Value::String),
    })
}
