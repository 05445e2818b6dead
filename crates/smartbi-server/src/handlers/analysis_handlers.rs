use actix_web::{web, HttpResponse};
use serde::{Deserialize, Serialize};
use smartbi_core::analysis::{self, DatabaseAnalysis, SpecificInsights};
use validator::Validate;

use crate::error::{ApiError, ApiResult};
use crate::state::AppState;

#[derive(Debug, Deserialize, Validate)]
pub struct AnalyzeDatabaseRequest {
    #[validate(length(min = 1, message = "database_url must not be empty"))]
    pub database_url: String,

    #[validate(range(min = 1, message = "sample_limit must be at least 1"))]
    pub sample_limit: Option<usize>,

    pub custom_query: Option<String>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct SpecificInsightsRequest {
    #[validate(length(min = 1, message = "database_url must not be empty"))]
    pub database_url: String,

    #[validate(length(min = 10, message = "insight_request must be at least 10 characters"))]
    pub insight_request: String,
}

#[derive(Debug, Serialize)]
pub struct AnalyzeDatabaseResponse {
    pub success: bool,
    pub source_type: &'static str,
    #[serde(flatten)]
    pub analysis: DatabaseAnalysis,
}

#[derive(Debug, Serialize)]
pub struct SpecificInsightsResponse {
    pub success: bool,
    #[serde(flatten)]
    pub insights: SpecificInsights,
}

pub(crate) fn validate<T: Validate>(body: &T) -> ApiResult<()> {
    body.validate()
        .map_err(|e| ApiError::Validation(e.to_string()))
}

pub async fn analyze_database(
    state: web::Data<AppState>,
    body: web::Json<AnalyzeDatabaseRequest>,
) -> ApiResult<HttpResponse> {
    let request = body.into_inner();
    validate(&request)?;

    let max = state.config.extraction.max_sample_limit;
    if request.sample_limit.is_some_and(|limit| limit > max) {
        return Err(ApiError::Validation(format!(
            "sample_limit must be at most {}",
            max
        )));
    }

    let model = state.model()?;
    tracing::info!(
        "Analyzing database ({})",
        if request.custom_query.is_some() {
            "custom query"
        } else {
            "full schema"
        }
    );

    let analysis = analysis::analyze_database(
        &request.database_url,
        request.sample_limit,
        request.custom_query.as_deref(),
        &state.config,
        model,
    )
    .await?;

    tracing::info!("Database analysis finished in {:.2}s", analysis.processing_time);
    Ok(HttpResponse::Ok().json(AnalyzeDatabaseResponse {
        success: true,
        source_type: "database",
        analysis,
    }))
}

pub async fn specific_insights(
    state: web::Data<AppState>,
    body: web::Json<SpecificInsightsRequest>,
) -> ApiResult<HttpResponse> {
    let request = body.into_inner();
    validate(&request)?;

    let model = state.model()?;
    let insights = analysis::specific_insights(
        &request.database_url,
        request.insight_request.trim(),
        &state.config,
        model,
    )
    .await?;

    Ok(HttpResponse::Ok().json(SpecificInsightsResponse {
        success: true,
        insights,
    }))
}
