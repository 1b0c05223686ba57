use axum::{
    extract::{Multipart, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use tracing::{info, warn};

use crate::analyst::repair::Outcome;
use crate::analyst::workspace::{RequestContext, Upload, QUESTIONS_FILE};
use crate::api::rest::error::{ApiError, ApiResult};
use crate::api::rest::state::AppState;

pub async fn analyze(State(state): State<AppState>, multipart: Multipart) -> ApiResult<Response> {
    let uploads = read_uploads(multipart).await?;
    analyze_uploads(&state, uploads).await
}

pub async fn analyze_uploads(state: &AppState, uploads: Vec<Upload>) -> ApiResult<Response> {
    let ctx = RequestContext::from_uploads(uploads)?;
    info!(
        request_id = %ctx.request_id,
        files = ?ctx.files,
        "Received analysis request"
    );

    match state.analyst.solve(&ctx).await? {
        Outcome::Succeeded { value, attempts } => {
            info!(request_id = %ctx.request_id, attempts, "Analysis succeeded");
            Ok((StatusCode::OK, Json(value)).into_response())
        }
        Outcome::Exhausted(report) => {
            warn!(
                request_id = %ctx.request_id,
                attempts = report.attempts,
                reason = ?report.reason,
                "Analysis gave up without a valid answer"
            );
            Ok((StatusCode::INTERNAL_SERVER_ERROR, Json(report)).into_response())
        }
    }
}

pub async fn health() -> Json<serde_json::Value> {
    Json(json!({ "status": "ok" }))
}

pub async fn version() -> Json<serde_json::Value> {
    Json(json!({ "version": env!("CARGO_PKG_VERSION") }))
}

async fn read_uploads(mut multipart: Multipart) -> ApiResult<Vec<Upload>> {
    let mut uploads = Vec::new();
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::BadRequest(format!("Malformed multipart body: {}", e)))?
    {
        let field_name = field.name().map(str::to_string);
        let file_name = field.file_name().map(str::to_string);
        let Some(name) = upload_name(field_name.as_deref(), file_name.as_deref()) else {
            warn!("Ignoring multipart field without a name");
            continue;
        };
        let bytes = field
            .bytes()
            .await
            .map_err(|e| ApiError::BadRequest(format!("Failed to read upload {}: {}", name, e)))?;
        uploads.push(Upload::new(name, bytes.to_vec()));
    }
    Ok(uploads)
}

/// A field named after the question file is the question regardless of the
/// client's file name; anything else keeps its file name.
fn upload_name(field_name: Option<&str>, file_name: Option<&str>) -> Option<String> {
    let field_name = field_name.map(str::trim).filter(|n| !n.is_empty());
    let file_name = file_name.map(str::trim).filter(|n| !n.is_empty());

    if let Some(field) = field_name {
        if field.eq_ignore_ascii_case(QUESTIONS_FILE) {
            return Some(QUESTIONS_FILE.to_string());
        }
    }
    file_name.or(field_name).map(str::to_string)
}
