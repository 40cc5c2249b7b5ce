//! Script upload.

use crate::auth::{get_trace_id, require_auth};
use crate::error::{ApiError, ApiResult};
use crate::ingest::{StoreMode, StoreOutcome};
use crate::state::AppState;
use axum::Json;
use axum::extract::{Query, Request, State};
use axum::http::StatusCode;
use serde::{Deserialize, Serialize};

/// Query parameters for `POST /v1/scripts`.
#[derive(Debug, Default, Deserialize)]
pub struct UploadParams {
    /// Only replace an already stored script.
    #[serde(default)]
    pub update: bool,
}

#[derive(Debug, Serialize)]
pub struct UploadResponse {
    pub install_name: String,
    pub created: bool,
    pub blob_written: bool,
}

/// POST /v1/scripts - Store a script from its raw source.
///
/// Answers 201 when the record was created and 200 when an existing one was
/// replaced.
#[tracing::instrument(skip(state, params, req), fields(user))]
pub async fn upload_script(
    State(state): State<AppState>,
    Query(params): Query<UploadParams>,
    req: Request,
) -> ApiResult<(StatusCode, Json<UploadResponse>)> {
    let trace_id = get_trace_id(&req).cloned().unwrap_or_default();
    let user = require_auth(&req)?.user.clone();
    tracing::Span::current().record("user", user.name.as_str());

    let content = axum::body::to_bytes(req.into_body(), state.config.server.max_script_bytes)
        .await
        .map_err(|e| ApiError::BadRequest(format!("failed to read script: {e}")))?;

    let mode = if params.update {
        StoreMode::UpdateOnly
    } else {
        StoreMode::CreateOrUpdate
    };

    match state.ingestor.ingest_upload(&user, content, mode).await? {
        StoreOutcome::Stored(script) => {
            tracing::debug!(
                trace_id = %trace_id,
                install_name = %script.install_name,
                "upload stored"
            );
            let status = if script.created {
                StatusCode::CREATED
            } else {
                StatusCode::OK
            };
            Ok((
                status,
                Json(UploadResponse {
                    install_name: script.install_name.into(),
                    created: script.created,
                    blob_written: script.blob_written,
                }),
            ))
        }
        StoreOutcome::Rejected(rejection) => Err(rejection.into()),
    }
}
