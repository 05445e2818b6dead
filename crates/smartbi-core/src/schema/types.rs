use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::fmt;

/// The three supported database backends.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DatabaseKind {
    PostgreSQL,
    MySQL,
    SQLite,
}

impl DatabaseKind {
    /// Lowercase identifier used in API payloads.
    pub fn as_str(&self) -> &'static str {
        match self {
            DatabaseKind::PostgreSQL => "postgresql",
            DatabaseKind::MySQL => "mysql",
            DatabaseKind::SQLite => "sqlite",
        }
    }

    /// Quote an identifier for this backend's SQL dialect.
    ///
    /// Embedded quote characters are doubled so that table names coming
    /// from the catalog can never terminate the identifier early.
    pub fn quote_ident(&self, name: &str) -> String {
        match self {
            DatabaseKind::MySQL => format!("`{}`", name.replace('`', "``")),
            DatabaseKind::PostgreSQL | DatabaseKind::SQLite => {
                format!("\"{}\"", name.replace('"', "\"\""))
            }
        }
    }
}

impl fmt::Display for DatabaseKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DatabaseKind::PostgreSQL => write!(f, "PostgreSQL"),
            DatabaseKind::MySQL => write!(f, "MySQL"),
            DatabaseKind::SQLite => write!(f, "SQLite"),
        }
    }
}

/// A column as reported by the backend catalog.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnInfo {
    pub name: String,
    /// Type string exactly as the backend declares it.
    pub declared_type: String,
    pub nullable: bool,
}

impl ColumnInfo {
    pub fn new(name: impl Into<String>, declared_type: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            declared_type: declared_type.into(),
            nullable: true,
        }
    }
}

/// Column metadata and row count for one table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TableSchema {
    pub name: String,
    pub columns: Vec<ColumnInfo>,
    pub row_count: u64,
}

/// A table that could not be introspected or sampled.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableFailure {
    pub table_name: String,
    pub error_message: String,
}

/// Result of schema extraction across all accessible tables.
///
/// The two `record_*` methods keep `tables.len() + failed_tables.len()`
/// equal to `total_tables`. Code that fills the fields directly has to keep
/// them in step itself.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SchemaReport {
    pub database_type: DatabaseKind,
    pub total_tables: usize,
    pub tables: IndexMap<String, TableSchema>,
    pub failed_tables: Vec<TableFailure>,
}

impl SchemaReport {
    pub fn new(database_type: DatabaseKind) -> Self {
        Self {
            database_type,
            total_tables: 0,
            tables: IndexMap::new(),
            failed_tables: Vec::new(),
        }
    }

    pub fn record_table(&mut self, table: TableSchema) {
        self.total_tables += 1;
        self.tables.insert(table.name.clone(), table);
    }

    pub fn record_failure(&mut self, table_name: impl Into<String>, error_message: impl Into<String>) {
        self.total_tables += 1;
        self.failed_tables.push(TableFailure {
            table_name: table_name.into(),
            error_message: error_message.into(),
        });
    }

    pub fn processed_tables(&self) -> usize {
        self.tables.len()
    }

    /// Fraction of tables introspected successfully; 0.0 for an empty database.
    pub fn success_rate(&self) -> f64 {
        if self.total_tables == 0 {
            0.0
        } else {
            self.processed_tables() as f64 / self.total_tables as f64
        }
    }

    pub fn column_count(&self) -> usize {
        self.tables.values().map(|t| t.columns.len()).sum()
    }

    pub fn total_rows(&self) -> u64 {
        self.tables.values().map(|t| t.row_count).sum()
    }
}

/// Normalized column type, used to pick a storage class when a foreign
/// dump is replayed into SQLite.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DataType {
    SmallInt,
    Integer,
    BigInt,
    Float,
    Double,
    /// Exact numeric with precision/scale (numeric, decimal)
    Numeric,
    Char,
    VarChar,
    Text,
    Boolean,
    Date,
    Time,
    Timestamp,
    TimestampTz,
    Uuid,
    Json,
    Jsonb,
    /// Binary/blob data (bytea, blob)
    Binary,
    Array(Box<DataType>),
    /// Database-specific enum type
    Enum(String),
    Money,
    Interval,
    Unknown(String),
}

impl DataType {
    /// Parse a raw SQL type string into a normalized DataType.
    pub fn from_raw(raw: &str) -> Self {
        let normalized = raw.trim().to_lowercase();
        let normalized = normalized.as_str();

        if let Some(inner) = normalized.strip_suffix("[]") {
            return DataType::Array(Box::new(DataType::from_raw(inner)));
        }
        if let Some(inner) = normalized.strip_prefix('_') {
            if !inner.is_empty() {
                // PostgreSQL internal array type prefix
                return DataType::Array(Box::new(DataType::from_raw(inner)));
            }
        }
        if normalized.starts_with("enum(") || normalized.starts_with("set(") {
            return DataType::Enum(raw.trim().to_string());
        }

        // Strip a length/precision suffix: varchar(255), int(11), decimal(10,2)
        let base = normalized
            .split('(')
            .next()
            .unwrap_or(normalized)
            .trim()
            .trim_end_matches(" unsigned");

        match base {
            "smallint" | "int2" | "smallserial" | "serial2" | "tinyint" => DataType::SmallInt,
            "integer" | "int" | "int4" | "mediumint" | "serial" | "serial4" => DataType::Integer,
            "bigint" | "int8" | "bigserial" | "serial8" => DataType::BigInt,

            "real" | "float4" | "float" => DataType::Float,
            "double precision" | "float8" | "double" => DataType::Double,

            "numeric" | "decimal" => DataType::Numeric,

            s if s.starts_with("character varying") || s.starts_with("varchar") => {
                DataType::VarChar
            }
            "char" | "character" | "bpchar" | "nchar" => DataType::Char,
            "text" | "tinytext" | "mediumtext" | "longtext" | "clob" | "name" => DataType::Text,

            "boolean" | "bool" | "bit" => DataType::Boolean,

            "date" => DataType::Date,
            "time" | "time without time zone" | "time with time zone" | "timetz" => DataType::Time,
            "timestamp" | "timestamp without time zone" | "datetime" => DataType::Timestamp,
            "timestamp with time zone" | "timestamptz" => DataType::TimestampTz,

            "uuid" => DataType::Uuid,
            "json" => DataType::Json,
            "jsonb" => DataType::Jsonb,

            "bytea" | "blob" | "tinyblob" | "mediumblob" | "longblob" | "binary" | "varbinary" => {
                DataType::Binary
            }

            "money" => DataType::Money,
            "interval" => DataType::Interval,

            other => DataType::Unknown(other.to_string()),
        }
    }
}
