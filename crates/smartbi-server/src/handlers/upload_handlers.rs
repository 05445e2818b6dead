use actix_multipart::Multipart;
use actix_web::{web, HttpResponse};
use futures::TryStreamExt;
use serde::Serialize;
use smartbi_core::analysis::{self, UploadAnalysis};
use smartbi_core::upload::SpooledUpload;
use smartbi_core::SmartBiError;

use crate::error::{ApiError, ApiResult};
use crate::state::AppState;

#[derive(Debug, Serialize)]
pub struct UploadResponse {
    pub success: bool,
    pub source_type: &'static str,
    #[serde(flatten)]
    pub analysis: UploadAnalysis,
}

/// Accepts the multipart field `file`. The spooled copy is deleted when the
/// handler returns, whichever way it returns.
pub async fn upload_file(
    state: web::Data<AppState>,
    mut payload: Multipart,
) -> ApiResult<HttpResponse> {
    let upload = spool_file_field(&mut payload, state.config.upload.max_bytes).await?;
    tracing::info!(
        "Received {} ({} bytes)",
        upload.file_name(),
        upload.size()
    );

    let model = state.model()?;
    let analysis = analysis::analyze_upload(&upload, &state.config, model).await?;

    Ok(HttpResponse::Ok().json(UploadResponse {
        success: true,
        source_type: "file",
        analysis,
    }))
}

async fn spool_file_field(payload: &mut Multipart, max_bytes: u64) -> ApiResult<SpooledUpload> {
    let multipart_error = |e: actix_multipart::MultipartError| {
        ApiError::InvalidRequest(format!("malformed multipart body: {}", e))
    };

    while let Some(mut field) = payload.try_next().await.map_err(multipart_error)? {
        if field.name() != Some("file") {
            continue;
        }

        let file_name = field
            .content_disposition()
            .and_then(|cd| cd.get_filename())
            .map(str::to_string);
        let mut upload =
            off_thread(move || SpooledUpload::new(file_name.as_deref(), max_bytes)).await?;

        while let Some(chunk) = field.try_next().await.map_err(multipart_error)? {
            upload = off_thread(move || {
                let mut upload = upload;
                upload.write_chunk(&chunk)?;
                Ok(upload)
            })
            .await?;
        }
        return Ok(upload);
    }

    Err(ApiError::InvalidRequest(
        "multipart field 'file' is required".to_string(),
    ))
}

/// Spool file I/O runs on the blocking pool, never on a worker thread.
async fn off_thread<T, F>(work: F) -> ApiResult<T>
where
    F: FnOnce() -> smartbi_core::Result<T> + Send + 'static,
    T: Send + 'static,
{
    let done = web::block(work)
        .await
        .map_err(|e| SmartBiError::Other(format!("upload spooling was interrupted: {}", e)))?;
    Ok(done?)
}
