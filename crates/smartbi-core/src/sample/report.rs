use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::schema::types::TableFailure;

/// One sampled row: column name to a JSON primitive (string, number, bool
/// or null), in the order the driver returned the columns.
pub type SampleRow = IndexMap<String, serde_json::Value>;

/// Rows pulled from every table that could be read.
///
/// [`SampleReport::record_rows`] keeps `total_records` and
/// `tables_processed` in step with `data`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SampleReport {
    pub tables_processed: usize,
    pub total_records: usize,
    pub data: IndexMap<String, Vec<SampleRow>>,
    pub failed_extractions: Vec<TableFailure>,
    pub total_tables_available: usize,
}

impl SampleReport {
    pub fn new(total_tables_available: usize) -> Self {
        Self {
            total_tables_available,
            ..Default::default()
        }
    }

    pub fn record_rows(&mut self, table: impl Into<String>, rows: Vec<SampleRow>) {
        self.tables_processed += 1;
        self.total_records += rows.len();
        self.data.insert(table.into(), rows);
    }

    pub fn record_failure(&mut self, table: impl Into<String>, error_message: impl Into<String>) {
        self.failed_extractions.push(TableFailure {
            table_name: table.into(),
            error_message: error_message.into(),
        });
    }

    pub fn success_rate(&self) -> f64 {
        if self.total_tables_available == 0 {
            0.0
        } else {
            self.tables_processed as f64 / self.total_tables_available as f64
        }
    }
}

/// Result of one caller-supplied read-only query.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CustomQueryResult {
    pub columns: Vec<String>,
    pub data: Vec<SampleRow>,
    pub rows_returned: usize,
    /// The query produced more rows than the limit allowed.
    pub truncated: bool,
}

impl CustomQueryResult {
    pub fn new(columns: Vec<String>, data: Vec<SampleRow>, truncated: bool) -> Self {
        Self {
            columns,
            rows_returned: data.len(),
            data,
            truncated,
        }
    }
}
