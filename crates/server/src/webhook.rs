//! Repository push notifications.
//!
//! The trust and branch checks are the pure [`evaluate_push`]; this module
//! adds owner resolution against the user table and hands accepted work to
//! the repository fetcher. Every rejection is silent to the sender.

use crate::fetch::{FetchSummary, RepoFetcher};
use crate::ingest::StoreMode;
use crate::metrics::record_push;
use scriptvault_core::{
    PushDecision, PushNotification, PushRejection, UserRef, WebhookPolicy, evaluate_push,
};
use scriptvault_metadata::repos::UserRepo;
use scriptvault_metadata::{MetadataResult, MetadataStore};
use std::net::IpAddr;
use std::sync::Arc;

/// What became of one notification.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PushOutcome {
    Ingested { owner: UserRef, summary: FetchSummary },
    Rejected(PushRejection),
}

/// Find the local author that owns a repository-host account.
pub async fn resolve_owner<U>(users: &U, owner: &str) -> MetadataResult<Option<UserRef>>
where
    U: UserRepo + ?Sized,
{
    let user = users.get_user_by_github_username(owner).await?;
    Ok(user.map(|row| row.to_user_ref()))
}

/// Change-notification handler.
#[derive(Clone)]
pub struct WebhookHandler {
    policy: WebhookPolicy,
    metadata: Arc<dyn MetadataStore>,
    fetcher: Arc<dyn RepoFetcher>,
}

impl WebhookHandler {
    pub fn new(
        policy: WebhookPolicy,
        metadata: Arc<dyn MetadataStore>,
        fetcher: Arc<dyn RepoFetcher>,
    ) -> Self {
        Self {
            policy,
            metadata,
            fetcher,
        }
    }

    pub fn policy(&self) -> &WebhookPolicy {
        &self.policy
    }

    /// Process one notification to completion.
    ///
    /// Webhook-driven loads only ever update scripts that were already
    /// uploaded; a file pushed for the first time is rejected by the
    /// coordinator rather than created.
    #[tracing::instrument(skip_all, fields(origin = %origin, repo = %payload.repository.name))]
    pub async fn handle(
        &self,
        origin: IpAddr,
        payload: &PushNotification,
    ) -> MetadataResult<PushOutcome> {
        let pending = match evaluate_push(&self.policy, origin, payload) {
            PushDecision::Accepted(pending) => pending,
            PushDecision::Rejected(reason) => return Ok(rejected(reason)),
        };

        let Some(owner) = resolve_owner(self.metadata.as_ref(), &pending.owner).await? else {
            return Ok(rejected(PushRejection::UnknownOwner));
        };

        record_push("accepted");
        if pending.jobs.is_empty() {
            tracing::debug!(user = %owner.name, "push touched no userscripts");
            return Ok(PushOutcome::Ingested {
                owner,
                summary: FetchSummary::default(),
            });
        }

        tracing::info!(user = %owner.name, files = pending.jobs.len(), "fetching pushed userscripts");
        let summary = self
            .fetcher
            .fetch_and_ingest(&owner, &pending.jobs, StoreMode::UpdateOnly)
            .await;
        Ok(PushOutcome::Ingested { owner, summary })
    }
}

fn rejected(reason: PushRejection) -> PushOutcome {
    record_push(reason.as_str());
    tracing::debug!(reason = %reason, "push notification dropped");
    PushOutcome::Rejected(reason)
}
