//! Route table shared by the binary and the in-process tests.

use actix_web::web;

use crate::handlers::{analysis_handlers, main_handlers, upload_handlers};

pub fn configure_routes(cfg: &mut web::ServiceConfig) {
    cfg.app_data(web::JsonConfig::default().error_handler(main_handlers::json_error_handler))
        .route("/", web::get().to(main_handlers::root))
        .route("/health", web::get().to(main_handlers::health_check))
        .route(
            "/analyze-database",
            web::post().to(analysis_handlers::analyze_database),
        )
        .route(
            "/specific-insights",
            web::post().to(analysis_handlers::specific_insights),
        )
        .route("/upload", web::post().to(upload_handlers::upload_file))
        .default_service(web::to(main_handlers::not_found));
}
