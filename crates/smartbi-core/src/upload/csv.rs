//! CSV uploads: record splitting with the `csv` crate, per-column type
//! inference and a bulk insert into one SQLite table.

use crate::connector::SqliteConnector;
use crate::error::{Result, SmartBiError};
use crate::schema::types::DatabaseKind;
use crate::upload::LoadReport;

/// SQLite column affinity inferred from the data.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Affinity {
    Integer,
    Real,
    Text,
}

impl Affinity {
    pub fn as_sql(&self) -> &'static str {
        match self {
            Affinity::Integer => "INTEGER",
            Affinity::Real => "REAL",
            Affinity::Text => "TEXT",
        }
    }
}

/// Split CSV text into records. Quoted fields may hold commas, newlines and
/// doubled quotes; blank lines are skipped and rows may differ in width.
pub fn parse_records(text: &str) -> Result<Vec<Vec<String>>> {
    let text = text.strip_prefix('\u{feff}').unwrap_or(text);
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_reader(text.as_bytes());

    reader
        .records()
        .map(|record| {
            record
                .map(|r| r.iter().map(str::to_string).collect())
                .map_err(|e| SmartBiError::Upload {
                    message: format!("could not read CSV: {}", e),
                })
        })
        .collect()
}

/// Clean up header names: trimmed, with blanks and repeats replaced by
/// `column_<n>` (1-based position). A generated name never shadows a real
/// header; on a clash it gets a further `_<k>` suffix. Names compare
/// case-insensitively, as SQLite compares them.
pub fn normalize_headers(raw: &[String]) -> Vec<String> {
    let mut kept: Vec<Option<String>> = Vec::with_capacity(raw.len());
    let mut reserved: Vec<String> = Vec::with_capacity(raw.len());
    for name in raw {
        let name = name.trim();
        if name.is_empty() || reserved.iter().any(|r| r.eq_ignore_ascii_case(name)) {
            kept.push(None);
        } else {
            reserved.push(name.to_string());
            kept.push(Some(name.to_string()));
        }
    }

    kept.into_iter()
        .enumerate()
        .map(|(i, name)| match name {
            Some(name) => name,
            None => {
                let base = format!("column_{}", i + 1);
                let name = std::iter::once(base.clone())
                    .chain((2..).map(|k| format!("{}_{}", base, k)))
                    .find(|c| !reserved.iter().any(|r| r.eq_ignore_ascii_case(c)))
                    .unwrap_or(base);
                reserved.push(name.clone());
                name
            }
        })
        .collect()
}

/// Infer one affinity per column from the non-empty cells.
pub fn infer_affinities(width: usize, rows: &[Vec<String>]) -> Vec<Affinity> {
    (0..width)
        .map(|col| {
            let mut cells = rows
                .iter()
                .filter_map(|r| r.get(col))
                .map(|c| c.trim())
                .filter(|c| !c.is_empty())
                .peekable();

            if cells.peek().is_none() {
                return Affinity::Text;
            }

            let mut affinity = Affinity::Integer;
            for cell in cells {
                if affinity == Affinity::Integer && cell.parse::<i64>().is_err() {
                    affinity = Affinity::Real;
                }
                if affinity == Affinity::Real && !cell.parse::<f64>().is_ok_and(f64::is_finite) {
                    return Affinity::Text;
                }
            }
            affinity
        })
        .collect()
}

/// Create `table` from the CSV header and insert every data row.
pub async fn load_csv(connector: &SqliteConnector, table: &str, text: &str) -> Result<LoadReport> {
    let mut records = parse_records(text)?.into_iter();
    let header = records.next().ok_or_else(|| SmartBiError::Upload {
        message: "CSV file has no header row".to_string(),
    })?;
    let headers = normalize_headers(&header);
    let rows: Vec<Vec<String>> = records.collect();
    let affinities = infer_affinities(headers.len(), &rows);

    let ragged = rows.iter().filter(|r| r.len() != headers.len()).count();
    if ragged > 0 {
        tracing::warn!(
            "{} CSV rows do not have {} fields; padding or cutting them",
            ragged,
            headers.len()
        );
    }

    let quote = |name: &str| DatabaseKind::SQLite.quote_ident(name);
    let create = format!(
        "CREATE TABLE {} ({})",
        quote(table),
        headers
            .iter()
            .zip(&affinities)
            .map(|(h, a)| format!("{} {}", quote(h), a.as_sql()))
            .collect::<Vec<_>>()
            .join(", ")
    );
    let insert = format!(
        "INSERT INTO {} VALUES ({})",
        quote(table),
        vec!["?"; headers.len()].join(", ")
    );

    let upload_error = |e: sqlx::Error| SmartBiError::Upload {
        message: format!("could not load CSV into table '{}': {}", table, e),
    };

    let mut tx = connector.pool().begin().await.map_err(upload_error)?;
    sqlx::query(&create)
        .execute(&mut *tx)
        .await
        .map_err(upload_error)?;

    for row in &rows {
        let mut query = sqlx::query(&insert);
        for (col, affinity) in affinities.iter().enumerate() {
            let cell = row.get(col).map(|c| c.trim()).filter(|c| !c.is_empty());
            query = match (affinity, cell) {
                (_, None) => query.bind(None::<String>),
                (Affinity::Integer, Some(c)) => query.bind(c.parse::<i64>().ok()),
                (Affinity::Real, Some(c)) => query.bind(c.parse::<f64>().ok()),
                (Affinity::Text, Some(c)) => query.bind(c.to_string()),
            };
        }
        query.execute(&mut *tx).await.map_err(upload_error)?;
    }

    tx.commit().await.map_err(upload_error)?;

    Ok(LoadReport {
        tables_created: vec![table.to_string()],
        rows_loaded: rows.len() as u64,
        statements_executed: rows.len() + 1,
        statements_failed: 0,
        statements_skipped: 0,
    })
}
