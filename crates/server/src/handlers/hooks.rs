//! Repository push webhook.

use crate::metrics::record_push;
use crate::state::AppState;
use axum::Form;
use axum::extract::rejection::FormRejection;
use axum::extract::{ConnectInfo, State};
use axum::http::StatusCode;
use scriptvault_core::{PushNotification, PushRejection};
use serde::Deserialize;
use std::net::SocketAddr;
use tracing::Instrument;

/// Form body of a push hook: the event JSON in a `payload` field.
#[derive(Debug, Deserialize)]
pub struct HookForm {
    pub payload: String,
}

/// POST /hooks/github - Push notification.
///
/// Always answers 200 with an empty body. The notification is processed in
/// the background and every rejection stays invisible to the sender. Bodies
/// from untrusted peers are never parsed.
pub async fn github_hook(
    State(state): State<AppState>,
    ConnectInfo(peer): ConnectInfo<SocketAddr>,
    form: Result<Form<HookForm>, FormRejection>,
) -> StatusCode {
    if !state.webhook.policy().is_trusted(peer.ip()) {
        record_push(PushRejection::UntrustedOrigin.as_str());
        tracing::debug!(peer = %peer, "push hook from untrusted origin");
        return StatusCode::OK;
    }

    let form = match form {
        Ok(Form(form)) => form,
        Err(e) => {
            record_push("invalid_payload");
            tracing::debug!(peer = %peer, error = %e, "push hook without payload field");
            return StatusCode::OK;
        }
    };

    let payload = match PushNotification::from_json(&form.payload) {
        Ok(payload) => payload,
        Err(e) => {
            record_push("invalid_payload");
            tracing::debug!(peer = %peer, error = %e, "unreadable push payload");
            return StatusCode::OK;
        }
    };

    let handler = state.webhook.clone();
    let origin = peer.ip();
    tokio::spawn(
        async move {
            if let Err(e) = handler.handle(origin, &payload).await {
                tracing::warn!(error = %e, "push processing failed");
            }
        }
        .instrument(tracing::Span::current()),
    );

    StatusCode::OK
}
