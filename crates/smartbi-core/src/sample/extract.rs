use crate::connector::Connector;
use crate::error::Result;
use crate::query::ReadOnlyQuery;
use crate::sample::report::{CustomQueryResult, SampleReport};

/// Pull up to `limit` rows from each table. Failures are recorded per
/// table and never abort the remaining tables.
pub async fn extract_samples<C: Connector>(
    connector: &C,
    tables: &[String],
    limit: usize,
) -> SampleReport {
    let mut report = SampleReport::new(tables.len());

    for table in tables {
        match connector.sample_rows(table, limit).await {
            Ok(rows) => {
                tracing::debug!("Sampled {} rows from {}", rows.len(), table);
                report.record_rows(table.clone(), rows);
            }
            Err(e) => {
                tracing::warn!("Sampling {} failed: {}", table, e);
                report.record_failure(table.clone(), e.to_string());
            }
        }
    }

    tracing::info!(
        "Sampled {} records from {}/{} tables",
        report.total_records,
        report.tables_processed,
        report.total_tables_available
    );
    report
}

/// Run one checked query in place of full sampling.
pub async fn run_custom_query<C: Connector>(
    connector: &C,
    query: &ReadOnlyQuery,
    limit: usize,
) -> Result<CustomQueryResult> {
    let result = connector.run_read_only_query(query, limit).await?;
    if result.truncated {
        tracing::info!("Custom query truncated to {} rows", limit);
    }
    Ok(result)
}
