//! Repository push notifications.
//!
//! A push notification names a repository and the files each commit touched.
//! [`evaluate_push`] decides whether a notification is trusted and which
//! userscripts it asks us to refresh. Resolving the repository owner to a local
//! author needs the metadata store and happens in the server crate.

use crate::config::WebhookConfig;
use crate::error::{Error, Result};
use crate::install_name::SCRIPT_SUFFIX;
use ipnet::IpNet;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::fmt;
use std::net::IpAddr;

/// Push event payload, reduced to the fields we act on.
#[derive(Clone, Debug, Deserialize)]
pub struct PushNotification {
    #[serde(rename = "ref")]
    pub ref_: String,
    pub repository: PushRepository,
    #[serde(default)]
    pub commits: Vec<PushCommit>,
}

#[derive(Clone, Debug, Deserialize)]
pub struct PushRepository {
    pub name: String,
    pub owner: PushOwner,
}

#[derive(Clone, Debug, Deserialize)]
pub struct PushOwner {
    pub name: String,
}

#[derive(Clone, Debug, Deserialize)]
pub struct PushCommit {
    #[serde(default)]
    pub modified: Vec<String>,
}

impl PushNotification {
    /// Decode the JSON document carried in the `payload` form field.
    pub fn from_json(payload: &str) -> Result<Self> {
        serde_json::from_str(payload).map_err(|e| Error::InvalidPayload(e.to_string()))
    }
}

/// Which notifications are accepted and where changed files are fetched from.
#[derive(Clone, Debug)]
pub struct WebhookPolicy {
    pub trusted_origins: Vec<IpNet>,
    pub branch_ref: String,
    pub raw_base_url: String,
}

impl WebhookPolicy {
    pub fn from_config(config: &WebhookConfig) -> Self {
        Self {
            trusted_origins: config.trusted_origins.clone(),
            branch_ref: config.branch_ref.clone(),
            raw_base_url: config.raw_base_url.clone(),
        }
    }

    /// Whether a peer address is one of the trusted hook senders.
    pub fn is_trusted(&self, origin: IpAddr) -> bool {
        let origin = origin.to_canonical();
        self.trusted_origins.iter().any(|net| net.contains(&origin))
    }

    /// Branch name used in raw file URLs, e.g. `master` for `refs/heads/master`.
    pub fn branch(&self) -> &str {
        self.branch_ref
            .strip_prefix("refs/heads/")
            .unwrap_or(&self.branch_ref)
    }

    fn raw_url(&self, owner: &str, repo: &str, filename: &str) -> String {
        format!(
            "{}/{owner}/{repo}/{}/{filename}",
            self.raw_base_url.trim_end_matches('/'),
            self.branch()
        )
    }
}

impl Default for WebhookPolicy {
    fn default() -> Self {
        Self::from_config(&WebhookConfig::default())
    }
}

/// Work accepted from a notification, pending owner resolution.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PendingPush {
    /// Repository owner on the repository host.
    pub owner: String,
    pub repo: String,
    /// Modified userscripts, filename to raw download URL.
    pub jobs: BTreeMap<String, String>,
}

/// Why a notification was dropped. None of these are reported to the sender.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PushRejection {
    UntrustedOrigin,
    WrongBranch,
    UnknownOwner,
}

impl PushRejection {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::UntrustedOrigin => "untrusted_origin",
            Self::WrongBranch => "wrong_branch",
            Self::UnknownOwner => "unknown_owner",
        }
    }
}

impl fmt::Display for PushRejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PushDecision {
    Accepted(PendingPush),
    Rejected(PushRejection),
}

/// Check a notification's origin and branch and collect the userscripts it touched.
///
/// Filenames are deduplicated across commits. An accepted push may carry no
/// jobs when no userscript was modified.
pub fn evaluate_push(
    policy: &WebhookPolicy,
    origin: IpAddr,
    payload: &PushNotification,
) -> PushDecision {
    if !policy.is_trusted(origin) {
        return PushDecision::Rejected(PushRejection::UntrustedOrigin);
    }
    if payload.ref_ != policy.branch_ref {
        return PushDecision::Rejected(PushRejection::WrongBranch);
    }

    let owner = &payload.repository.owner.name;
    let repo = &payload.repository.name;
    let jobs = payload
        .commits
        .iter()
        .flat_map(|commit| commit.modified.iter())
        .filter(|filename| filename.ends_with(SCRIPT_SUFFIX))
        .map(|filename| (filename.clone(), policy.raw_url(owner, repo, filename)))
        .collect();

    PushDecision::Accepted(PendingPush {
        owner: owner.clone(),
        repo: repo.clone(),
        jobs,
    })
}
