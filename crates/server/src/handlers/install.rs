//! Script and metadata delivery.
//!
//! Lookups that find nothing fall through to [`not_found`] rather than
//! producing an error body of their own.

use crate::delivery::DeliveryOutcome;
use crate::error::ApiResult;
use crate::handlers::common::not_found;
use crate::state::AppState;
use axum::body::Body;
use axum::extract::{Path, State};
use axum::http::header::{ACCEPT, CONTENT_TYPE};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use futures::StreamExt;
use scriptvault_core::{InstallName, META_ACCEPT, META_SUFFIX, SCRIPT_CONTENT_TYPE};
use serde::Deserialize;

/// Route segments of an install URL.
#[derive(Debug, Deserialize)]
pub struct ScriptPath {
    pub username: String,
    #[serde(default)]
    pub namespace: Option<String>,
    pub script: String,
}

/// GET /install/{username}/[{namespace}/]{script}
///
/// Serves the metadata document instead of the script when the script
/// segment ends in `.meta.js` or the client accepts `text/x-userscript-meta`.
pub async fn install_script(
    State(state): State<AppState>,
    Path(path): Path<ScriptPath>,
    headers: HeaderMap,
) -> Response {
    let wants_meta = path.script.ends_with(META_SUFFIX) || accepts_meta(&headers);
    serve(&state, &path, wants_meta).await
}

/// GET /meta/{username}/[{namespace}/]{script}
pub async fn install_meta(State(state): State<AppState>, Path(path): Path<ScriptPath>) -> Response {
    serve(&state, &path, true).await
}

fn accepts_meta(headers: &HeaderMap) -> bool {
    headers
        .get_all(ACCEPT)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .any(|v| v.contains(META_ACCEPT))
}

async fn serve(state: &AppState, path: &ScriptPath, meta: bool) -> Response {
    let Ok(install_name) =
        InstallName::from_route(&path.username, path.namespace.as_deref(), &path.script)
    else {
        return not_found().await;
    };

    let result = if meta {
        send_meta(state, &install_name).await
    } else {
        send_script(state, &install_name).await
    };

    match result {
        Ok(Some(response)) => response,
        Ok(None) => not_found().await,
        Err(e) => e.into_response(),
    }
}

async fn send_script(state: &AppState, install_name: &InstallName) -> ApiResult<Option<Response>> {
    let DeliveryOutcome::Found(stream) = state.delivery.send_script(install_name).await? else {
        return Ok(None);
    };

    let body = stream.map(|result| result.map_err(|e| std::io::Error::other(e.to_string())));
    Ok(Some(
        (
            StatusCode::OK,
            [(CONTENT_TYPE, SCRIPT_CONTENT_TYPE)],
            Body::from_stream(body),
        )
            .into_response(),
    ))
}

async fn send_meta(state: &AppState, install_name: &InstallName) -> ApiResult<Option<Response>> {
    let DeliveryOutcome::Found(block) = state.delivery.send_meta(install_name).await? else {
        return Ok(None);
    };

    Ok(Some(
        (StatusCode::OK, [(CONTENT_TYPE, SCRIPT_CONTENT_TYPE)], block).into_response(),
    ))
}
