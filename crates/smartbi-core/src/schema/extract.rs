use crate::connector::Connector;
use crate::error::Result;
use crate::schema::types::{SchemaReport, TableSchema};

/// Describe every table the connector can see.
///
/// Only a failure to list tables is returned as an error. A table whose
/// columns or row count cannot be read is recorded in `failed_tables` and
/// the scan moves on.
pub async fn extract_schema<C: Connector>(connector: &C) -> Result<SchemaReport> {
    let tables = connector.list_tables().await?;
    let mut report = SchemaReport::new(connector.kind());

    for table in tables {
        tracing::debug!("Describing table {}", table);

        let described = match connector.describe_table(&table).await {
            Ok(columns) => connector
                .count_rows(&table)
                .await
                .map(|row_count| (columns, row_count)),
            Err(e) => Err(e),
        };

        match described {
            Ok((columns, row_count)) => report.record_table(TableSchema {
                name: table,
                columns,
                row_count,
            }),
            Err(e) => {
                tracing::warn!("Skipping table {}: {}", table, e);
                report.record_failure(table, e.to_string());
            }
        }
    }

    tracing::info!(
        "Schema extracted: {}/{} tables",
        report.processed_tables(),
        report.total_tables
    );
    Ok(report)
}
