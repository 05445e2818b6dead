use std::path::{Path, PathBuf};
use std::sync::Mutex;

use async_trait::async_trait;
use indexmap::IndexMap;
use serde_json::{json, Value};
use smartbi_core::llm::ModelClient;
use smartbi_core::sample::{SampleReport, SampleRow};
use smartbi_core::schema::types::{ColumnInfo, DatabaseKind, SchemaReport, TableSchema};
use smartbi_core::{Extraction, Result, SmartBiError};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use tempfile::TempDir;

const STORE_SQL: &[&str] = &[
    "CREATE TABLE users (
        id INTEGER PRIMARY KEY,
        name TEXT NOT NULL,
        email TEXT NOT NULL,
        created_at TEXT
    )",
    "CREATE TABLE products (
        id INTEGER PRIMARY KEY,
        name TEXT NOT NULL,
        price REAL NOT NULL,
        in_stock BOOLEAN NOT NULL DEFAULT 1
    )",
    "CREATE TABLE orders (
        id INTEGER PRIMARY KEY,
        user_id INTEGER NOT NULL REFERENCES users(id),
        product_id INTEGER NOT NULL REFERENCES products(id),
        quantity INTEGER NOT NULL,
        ordered_at TEXT
    )",
    "INSERT INTO users (id, name, email, created_at) VALUES
        (1, 'Alice', 'alice@example.com', '2024-01-05T10:00:00Z'),
        (2, 'Bob', 'bob@example.com', '2024-02-11T09:30:00Z'),
        (3, 'Carol', 'carol@example.com', NULL)",
    "INSERT INTO products (id, name, price, in_stock) VALUES
        (1, 'Notebook', 4.5, 1),
        (2, 'Pen, blue', 1.25, 1),
        (3, 'Desk lamp', 32.0, 0)",
    "INSERT INTO orders (id, user_id, product_id, quantity, ordered_at) VALUES
        (1, 1, 1, 2, '2024-03-01'),
        (2, 2, 3, 1, '2024-03-02'),
        (3, 1, 2, 10, '2024-03-04')",
];

/// A small on-disk SQLite store: `users`, `products` and `orders`, three
/// rows each. The file is removed when the fixture is dropped.
pub struct StoreFixture {
    _dir: TempDir,
    path: PathBuf,
}

impl StoreFixture {
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// `sqlite:///...` URL for the fixture file.
    pub fn url(&self) -> String {
        sqlite_url(&self.path)
    }
}

/// Create the store database in a fresh temporary directory.
pub async fn store_database() -> StoreFixture {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("store.db");
    create_database(&path, STORE_SQL).await;
    StoreFixture { _dir: dir, path }
}

/// Create a SQLite file at `path` and run `statements` against it.
pub async fn create_database(path: &Path, statements: &[&str]) {
    let options = SqliteConnectOptions::new()
        .filename(path)
        .create_if_missing(true);
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect_with(options)
        .await
        .unwrap();
    for stmt in statements {
        sqlx::query(stmt).execute(&pool).await.unwrap();
    }
    pool.close().await;
}

pub fn sqlite_url(path: &Path) -> String {
    format!("sqlite://{}", path.display())
}

/// Row count of `table`, read through a separate writable connection.
pub async fn count_rows(path: &Path, table: &str) -> i64 {
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect_with(SqliteConnectOptions::new().filename(path))
        .await
        .unwrap();
    let count: i64 = sqlx::query_scalar(&format!("SELECT COUNT(*) FROM \"{}\"", table))
        .fetch_one(&pool)
        .await
        .unwrap();
    pool.close().await;
    count
}

/// A [`ModelClient`] that answers every prompt with a fixed reply, or a
/// fixed error, and remembers what it was asked.
pub struct ScriptedModel {
    reply: std::result::Result<String, String>,
    prompts: Mutex<Vec<String>>,
}

impl ScriptedModel {
    pub fn replying(reply: impl Into<String>) -> Self {
        Self {
            reply: Ok(reply.into()),
            prompts: Mutex::new(Vec::new()),
        }
    }

    pub fn failing(message: impl Into<String>) -> Self {
        Self {
            reply: Err(message.into()),
            prompts: Mutex::new(Vec::new()),
        }
    }

    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().unwrap().clone()
    }
}

#[async_trait]
impl ModelClient for ScriptedModel {
    fn provider(&self) -> &str {
        "Scripted"
    }

    fn model_name(&self) -> &str {
        "scripted-model"
    }

    async fn generate(&self, prompt: &str) -> Result<String> {
        self.prompts.lock().unwrap().push(prompt.to_string());
        match &self.reply {
            Ok(text) => Ok(text.clone()),
            Err(message) => Err(SmartBiError::ModelApi {
                message: message.clone(),
            }),
        }
    }
}

/// The store database as an already-extracted report, without touching disk.
pub fn store_extraction() -> Extraction {
    let mut schema = SchemaReport::new(DatabaseKind::SQLite);
    let mut samples = SampleReport::new(3);

    let users: Vec<SampleRow> = vec![
        row(&[("id", json!(1)), ("name", json!("Alice")), ("email", json!("alice@example.com"))]),
        row(&[("id", json!(2)), ("name", json!("Bob")), ("email", json!("bob@example.com"))]),
        row(&[("id", json!(3)), ("name", json!("Carol")), ("email", json!("carol@example.com"))]),
    ];
    let products: Vec<SampleRow> = vec![
        row(&[("id", json!(1)), ("name", json!("Notebook")), ("price", json!(4.5))]),
        row(&[("id", json!(2)), ("name", json!("Pen, blue")), ("price", json!(1.25))]),
        row(&[("id", json!(3)), ("name", json!("Desk lamp")), ("price", json!(32.0))]),
    ];
    let orders: Vec<SampleRow> = vec![
        row(&[("id", json!(1)), ("user_id", json!(1)), ("quantity", json!(2))]),
        row(&[("id", json!(2)), ("user_id", json!(2)), ("quantity", json!(1))]),
        row(&[("id", json!(3)), ("user_id", json!(1)), ("quantity", json!(10))]),
    ];

    for (name, rows) in [("users", users), ("products", products), ("orders", orders)] {
        schema.record_table(table_schema(name, &rows));
        samples.record_rows(name, rows);
    }

    Extraction::Full { schema, samples }
}

/// A synthetic report with `tables` tables of `rows` rows each.
pub fn wide_extraction(tables: usize, rows: usize) -> Extraction {
    let mut schema = SchemaReport::new(DatabaseKind::PostgreSQL);
    let mut samples = SampleReport::new(tables);

    for t in 0..tables {
        let name = format!("table_{:03}", t);
        let data: Vec<SampleRow> = (0..rows)
            .map(|r| {
                row(&[
                    ("id", json!(r)),
                    ("label", json!(format!("item {} of {}", r, name))),
                    ("amount", json!(r as f64 * 1.5)),
                    ("active", json!(r % 2 == 0)),
                    ("note", Value::Null),
                ])
            })
            .collect();
        schema.record_table(table_schema(&name, &data));
        samples.record_rows(name, data);
    }

    Extraction::Full { schema, samples }
}

fn row(cells: &[(&str, Value)]) -> SampleRow {
    cells
        .iter()
        .map(|(k, v)| (k.to_string(), v.clone()))
        .collect::<IndexMap<_, _>>()
}

fn table_schema(name: &str, rows: &[SampleRow]) -> TableSchema {
    let columns = rows
        .first()
        .map(|r| {
            r.iter()
                .map(|(col, value)| {
                    let declared = match value {
                        Value::Number(n) if n.is_f64() => "REAL",
                        Value::Number(_) => "INTEGER",
                        Value::Bool(_) => "BOOLEAN",
                        _ => "TEXT",
                    };
                    ColumnInfo::new(col.clone(), declared)
                })
                .collect()
        })
        .unwrap_or_default();

    TableSchema {
        name: name.to_string(),
        columns,
        row_count: rows.len() as u64,
    }
}
