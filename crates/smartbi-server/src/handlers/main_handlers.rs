use actix_web::{error, web, HttpRequest, HttpResponse};
use serde::Serialize;
use serde_json::json;

use crate::error::ErrorResponse;
use crate::state::AppState;

pub const ENDPOINTS: &[(&str, &str)] = &[
    ("/", "GET - API information"),
    ("/health", "GET - Service health"),
    ("/analyze-database", "POST - Analyze a live database"),
    ("/specific-insights", "POST - Answer a business question about a database"),
    ("/upload", "POST - Upload a .csv or .sql file for analysis"),
];

#[derive(Debug, Serialize)]
pub struct ModelStatus {
    pub provider: String,
    pub name: String,
}

#[derive(Debug, Serialize)]
pub struct ServiceStatus {
    pub api: &'static str,
    pub model: &'static str,
    pub temp_directory: &'static str,
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub services: ServiceStatus,
    pub model: Option<ModelStatus>,
    pub environment: String,
}

pub async fn root(state: web::Data<AppState>) -> HttpResponse {
    let endpoints: serde_json::Map<String, serde_json::Value> = ENDPOINTS
        .iter()
        .map(|(path, what)| (path.to_string(), json!(what)))
        .collect();

    HttpResponse::Ok().json(json!({
        "name": "SmartBI",
        "version": env!("CARGO_PKG_VERSION"),
        "description": "Business insights from a database or a data file",
        "status": "online",
        "endpoints": endpoints,
        "supported_formats": ["CSV", "SQL"],
        "supported_databases": ["postgresql", "mysql", "sqlite"],
        "model_provider": state.model.as_ref().map(|m| m.provider().to_string()),
    }))
}

/// Liveness plus configuration checks. Never calls the model.
pub async fn health_check(state: web::Data<AppState>) -> HttpResponse {
    let model = state.model.as_ref().map(|m| ModelStatus {
        provider: m.provider().to_string(),
        name: m.model_name().to_string(),
    });
    let temp_ok = std::env::temp_dir().is_dir();

    HttpResponse::Ok().json(HealthResponse {
        status: if model.is_some() && temp_ok {
            "healthy"
        } else {
            "warning"
        },
        services: ServiceStatus {
            api: "online",
            model: if model.is_some() {
                "configured"
            } else {
                "not_configured"
            },
            temp_directory: if temp_ok { "available" } else { "unavailable" },
        },
        model,
        environment: state.config.server.environment.clone(),
    })
}

pub async fn not_found(req: HttpRequest) -> HttpResponse {
    tracing::debug!("No route for {} {}", req.method(), req.path());
    HttpResponse::NotFound().json(json!({
        "error": "not_found",
        "message": format!("No endpoint at {}", req.path()),
        "available_endpoints": ENDPOINTS.iter().map(|(path, _)| *path).collect::<Vec<_>>(),
    }))
}

/// Malformed or mistyped JSON bodies are reported as 422, like field
/// validation failures.
pub fn json_error_handler(err: error::JsonPayloadError, _req: &HttpRequest) -> error::Error {
    let detail = err.to_string();
    let response = HttpResponse::UnprocessableEntity().json(ErrorResponse {
        error: "validation_error".to_string(),
        detail,
    });
    error::InternalError::from_response(err, response).into()
}
