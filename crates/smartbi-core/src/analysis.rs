//! # Analysis Pipeline
//!
//! validate → connect → extract → close → summarize → prompt → model.
//!
//! The connection is closed as soon as extraction finishes, whatever its
//! outcome, and before the model is called. Input validation (URL and
//! custom query) runs before any connection is attempted.

use std::time::Instant;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::config::{ExtractionConfig, SmartBiConfig};
use crate::connection::{self, parse_connection_url, ConnectionInfo};
use crate::connector::Connector;
use crate::error::Result;
use crate::extraction::{run_extraction, Extraction, ExtractionMethod, ExtractionRequest};
use crate::llm::{prompt, ModelClient};
use crate::query::ReadOnlyQuery;
use crate::schema::types::{DatabaseKind, TableFailure};
use crate::summary::{summarize_extraction, Summary, SummaryOptions};
use crate::upload::{self, LoadReport, SpooledUpload, UploadKind};

/// Counts describing what went into the prompt.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DataSummary {
    pub database_type: DatabaseKind,
    pub extraction_method: ExtractionMethod,
    pub tables_available: usize,
    pub tables_processed: usize,
    pub total_records: usize,
    pub failed_tables: Vec<TableFailure>,
    pub summary_chars: usize,
    pub summary_truncated: bool,
}

impl DataSummary {
    pub fn new(extraction: &Extraction, summary: &Summary) -> Self {
        let (tables_available, failed_tables) = match extraction {
            Extraction::Full { schema, samples } => (
                schema.total_tables,
                schema
                    .failed_tables
                    .iter()
                    .chain(&samples.failed_extractions)
                    .cloned()
                    .collect(),
            ),
            Extraction::CustomQuery { .. } => (1, Vec::new()),
        };

        Self {
            database_type: extraction.database_type(),
            extraction_method: extraction.method(),
            tables_available,
            tables_processed: extraction.tables_processed(),
            total_records: extraction.total_records(),
            failed_tables,
            summary_chars: summary.text.chars().count(),
            summary_truncated: summary.truncated,
        }
    }
}

/// Extracted and summarized data, ready to be sent to a model.
#[derive(Debug, Clone)]
pub struct PreparedData {
    pub source_info: ConnectionInfo,
    pub extraction: Extraction,
    pub summary: Summary,
}

impl PreparedData {
    pub fn data_summary(&self) -> DataSummary {
        DataSummary::new(&self.extraction, &self.summary)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct DatabaseAnalysis {
    pub source_info: ConnectionInfo,
    pub data_summary: DataSummary,
    pub model_narrative: String,
    /// Seconds, rounded to two decimals.
    pub processing_time: f64,
    pub model_used: String,
    pub analyzed_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
pub struct DatabaseInfo {
    pub database_type: DatabaseKind,
    pub host: Option<String>,
    pub database: Option<String>,
    pub tables_analyzed: usize,
    pub records_analyzed: usize,
    pub extraction_method: ExtractionMethod,
}

#[derive(Debug, Clone, Serialize)]
pub struct SpecificInsights {
    pub database_info: DatabaseInfo,
    pub insight_request: String,
    pub strategic_insights: String,
    pub processing_time: f64,
    pub model_used: String,
    pub analyzed_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
pub struct FileInfo {
    pub filename: String,
    pub size: u64,
    #[serde(rename = "type")]
    pub kind: UploadKind,
}

#[derive(Debug, Clone, Serialize)]
pub struct UploadAnalysis {
    pub file_info: FileInfo,
    pub load_report: LoadReport,
    pub data_summary: DataSummary,
    pub model_narrative: String,
    pub processing_time: f64,
    pub model_used: String,
    pub analyzed_at: DateTime<Utc>,
}

/// Validate the caller's options into an extraction request. A custom query
/// replaces full-schema sampling and goes through the read-only guard here,
/// before anything connects.
pub fn build_request(
    sample_limit: Option<usize>,
    custom_query: Option<&str>,
    config: &ExtractionConfig,
) -> Result<ExtractionRequest> {
    let limit = sample_limit
        .unwrap_or(config.sample_limit)
        .clamp(1, config.max_sample_limit.max(1));

    match custom_query.filter(|q| !q.trim().is_empty()) {
        Some(query) => Ok(ExtractionRequest::CustomQuery {
            query: ReadOnlyQuery::new(query)?,
            limit,
        }),
        None => Ok(ExtractionRequest::FullSchema {
            sample_limit: limit,
        }),
    }
}

/// Connect, extract and summarize without calling a model. The connection
/// is closed before this returns, on success and on failure.
pub async fn prepare_database(
    database_url: &str,
    request: &ExtractionRequest,
    config: &SmartBiConfig,
) -> Result<PreparedData> {
    let descriptor = parse_connection_url(database_url)?;

    let mut handle = connection::connect(&descriptor, &config.extraction).await?;
    let extracted = run_extraction(handle.connector(), request).await;
    handle.close().await;
    let extraction = extracted?;

    let summary = summarize_extraction(&extraction, &SummaryOptions::from(&config.summary));
    tracing::info!(
        "Extracted {} records from {} tables ({} summary characters{})",
        extraction.total_records(),
        extraction.tables_processed(),
        summary.text.len(),
        if summary.truncated { ", truncated" } else { "" }
    );

    Ok(PreparedData {
        source_info: handle.info().clone(),
        extraction,
        summary,
    })
}

/// Full business-insights analysis of a live database.
pub async fn analyze_database(
    database_url: &str,
    sample_limit: Option<usize>,
    custom_query: Option<&str>,
    config: &SmartBiConfig,
    model: &dyn ModelClient,
) -> Result<DatabaseAnalysis> {
    let started = Instant::now();
    let request = build_request(sample_limit, custom_query, &config.extraction)?;
    let prepared = prepare_database(database_url, &request, config).await?;

    let narrative = model
        .generate(&prompt::business_insights_prompt(&prepared.summary.text))
        .await?;

    Ok(DatabaseAnalysis {
        data_summary: prepared.data_summary(),
        source_info: prepared.source_info,
        model_narrative: narrative,
        processing_time: elapsed_secs(started),
        model_used: model.model_name().to_string(),
        analyzed_at: Utc::now(),
    })
}

/// Answer a focused business question about a live database.
pub async fn specific_insights(
    database_url: &str,
    insight_request: &str,
    config: &SmartBiConfig,
    model: &dyn ModelClient,
) -> Result<SpecificInsights> {
    let started = Instant::now();
    let request = build_request(None, None, &config.extraction)?;
    let prepared = prepare_database(database_url, &request, config).await?;

    let insights = model
        .generate(&prompt::specific_insights_prompt(
            insight_request,
            &prepared.summary.text,
        ))
        .await?;

    let info = &prepared.source_info;
    Ok(SpecificInsights {
        database_info: DatabaseInfo {
            database_type: info.database_type,
            host: info.host.clone(),
            database: info.database.clone(),
            tables_analyzed: prepared.extraction.tables_processed(),
            records_analyzed: prepared.extraction.total_records(),
            extraction_method: prepared.extraction.method(),
        },
        insight_request: insight_request.to_string(),
        strategic_insights: insights,
        processing_time: elapsed_secs(started),
        model_used: model.model_name().to_string(),
        analyzed_at: Utc::now(),
    })
}

/// Load an uploaded file into memory and extract it like a database.
/// Returns the load report alongside the prepared data.
pub async fn prepare_upload(
    upload: &SpooledUpload,
    config: &SmartBiConfig,
) -> Result<(LoadReport, Extraction, Summary)> {
    let (connector, load_report) = upload::load_upload(upload).await?;

    let request = ExtractionRequest::FullSchema {
        sample_limit: config.extraction.sample_limit.max(1),
    };
    let extracted = run_extraction(&connector, &request).await;
    connector.close().await;
    let extraction = extracted?;

    let summary = summarize_extraction(&extraction, &SummaryOptions::from(&config.summary));
    Ok((load_report, extraction, summary))
}

/// Business-insights analysis of an uploaded `.csv` or `.sql` file.
pub async fn analyze_upload(
    upload: &SpooledUpload,
    config: &SmartBiConfig,
    model: &dyn ModelClient,
) -> Result<UploadAnalysis> {
    let started = Instant::now();
    let (load_report, extraction, summary) = prepare_upload(upload, config).await?;

    let narrative = model
        .generate(&prompt::business_insights_prompt(&summary.text))
        .await?;

    Ok(UploadAnalysis {
        file_info: FileInfo {
            filename: upload.file_name().to_string(),
            size: upload.size(),
            kind: upload.kind(),
        },
        load_report,
        data_summary: DataSummary::new(&extraction, &summary),
        model_narrative: narrative,
        processing_time: elapsed_secs(started),
        model_used: model.model_name().to_string(),
        analyzed_at: Utc::now(),
    })
}

fn elapsed_secs(started: Instant) -> f64 {
    (started.elapsed().as_secs_f64() * 100.0).round() / 100.0
}
