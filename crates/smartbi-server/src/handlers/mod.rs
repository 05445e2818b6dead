pub mod analysis_handlers;
pub mod main_handlers;
pub mod upload_handlers;
