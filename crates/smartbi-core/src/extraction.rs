//! What gets pulled out of one open connection: either the full schema plus
//! per-table samples, or the result of one caller-supplied query.

use serde::{Deserialize, Serialize};

use crate::connector::Connector;
use crate::error::Result;
use crate::query::ReadOnlyQuery;
use crate::sample::{self, CustomQueryResult, SampleReport};
use crate::schema::{self, types::DatabaseKind, types::SchemaReport};

/// How the data was gathered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExtractionMethod {
    FullSchema,
    CustomQuery,
}

impl ExtractionMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            ExtractionMethod::FullSchema => "full_schema",
            ExtractionMethod::CustomQuery => "custom_query",
        }
    }
}

/// What to extract.
#[derive(Debug, Clone)]
pub enum ExtractionRequest {
    FullSchema { sample_limit: usize },
    CustomQuery { query: ReadOnlyQuery, limit: usize },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum Extraction {
    Full {
        schema: SchemaReport,
        samples: SampleReport,
    },
    CustomQuery {
        database_type: DatabaseKind,
        result: CustomQueryResult,
    },
}

impl Extraction {
    pub fn method(&self) -> ExtractionMethod {
        match self {
            Extraction::Full { .. } => ExtractionMethod::FullSchema,
            Extraction::CustomQuery { .. } => ExtractionMethod::CustomQuery,
        }
    }

    pub fn database_type(&self) -> DatabaseKind {
        match self {
            Extraction::Full { schema, .. } => schema.database_type,
            Extraction::CustomQuery { database_type, .. } => *database_type,
        }
    }

    /// Tables that yielded data; a custom query counts as one.
    pub fn tables_processed(&self) -> usize {
        match self {
            Extraction::Full { samples, .. } => samples.tables_processed,
            Extraction::CustomQuery { .. } => 1,
        }
    }

    pub fn total_records(&self) -> usize {
        match self {
            Extraction::Full { samples, .. } => samples.total_records,
            Extraction::CustomQuery { result, .. } => result.rows_returned,
        }
    }
}

/// Run `request` against an open connector. Schema extraction runs first,
/// then sampling over the tables it could describe.
pub async fn run_extraction<C: Connector>(
    connector: &C,
    request: &ExtractionRequest,
) -> Result<Extraction> {
    match request {
        ExtractionRequest::FullSchema { sample_limit } => {
            let schema = schema::extract_schema(connector).await?;
            let tables: Vec<String> = schema.tables.keys().cloned().collect();
            let samples = sample::extract_samples(connector, &tables, *sample_limit).await;
            Ok(Extraction::Full { schema, samples })
        }
        ExtractionRequest::CustomQuery { query, limit } => {
            let result = sample::run_custom_query(connector, query, *limit).await?;
            Ok(Extraction::CustomQuery {
                database_type: connector.kind(),
                result,
            })
        }
    }
}
