//! The GitOps bridge: verifies inbound webhook signatures, matches a
//! push event to the platform whose `gitOps` reference tracks that
//! repo/branch, and converges that platform's `targetRevision` via a
//! spec patch rather than touching workloads directly.

use hmac::{Hmac, Mac};
use sha2::Sha256;

use crate::crd::{GitOpsReference, ObservabilityPlatform, SyncPhase};

type HmacSha256 = Hmac<Sha256>;

/// Header name carrying the signature for each supported provider.
pub fn signature_header(provider: &str) -> &'static str {
    match provider {
        "github" => "x-hub-signature-256",
        "gitlab" => "x-gitlab-token",
        _ => "x-webhook-signature",
    }
}

/// Verify an inbound webhook body against its signature header value.
///
/// GitHub/generic providers send `sha256=<hex>` HMAC-SHA256 over the
/// raw body; GitLab sends the shared secret directly as a bearer
/// token, so its "signature" is a constant-time equality check instead.
pub fn verify_signature(provider: &str, secret: &str, body: &[u8], signature_value: &str) -> bool {
    match provider {
        "gitlab" => constant_time_eq(secret.as_bytes(), signature_value.as_bytes()),
        _ => {
            let Some(hex_digest) = signature_value.strip_prefix("sha256=") else {
                return false;
            };
            let Ok(mut mac) = HmacSha256::new_from_slice(secret.as_bytes()) else {
                return false;
            };
            mac.update(body);
            let expected = mac.finalize().into_bytes();
            let expected_hex = hex_encode(&expected);
            constant_time_eq(expected_hex.as_bytes(), hex_digest.as_bytes())
        }
    }
}

fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    let mut diff = 0u8;
    for (x, y) in a.iter().zip(b.iter()) {
        diff |= x ^ y;
    }
    diff == 0
}

fn hex_encode(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}

/// One push notification parsed from a provider payload, reduced to
/// the fields the bridge needs to act on.
#[derive(Debug, Clone, PartialEq)]
pub struct PushEvent {
    pub repo_url: String,
    pub branch: String,
    pub revision: String,
}

/// Parse the fields this bridge cares about out of a provider's JSON
/// payload. Providers disagree on field names for the same concepts;
/// this normalizes GitHub and GitLab push payloads, and falls back to
/// a flat `{repo_url, branch, revision}` shape for anything else.
pub fn parse_push_event(provider: &str, payload: &serde_json::Value) -> Option<PushEvent> {
    match provider {
        "github" => Some(PushEvent {
            repo_url: payload.get("repository")?.get("clone_url")?.as_str()?.to_string(),
            branch: payload
                .get("ref")?
                .as_str()?
                .strip_prefix("refs/heads/")
                .unwrap_or_default()
                .to_string(),
            revision: payload.get("after")?.as_str()?.to_string(),
        }),
        "gitlab" => Some(PushEvent {
            repo_url: payload.get("project")?.get("git_http_url")?.as_str()?.to_string(),
            branch: payload
                .get("ref")?
                .as_str()?
                .strip_prefix("refs/heads/")
                .unwrap_or_default()
                .to_string(),
            revision: payload.get("checkout_sha")?.as_str()?.to_string(),
        }),
        _ => Some(PushEvent {
            repo_url: payload.get("repo_url")?.as_str()?.to_string(),
            branch: payload.get("branch")?.as_str()?.to_string(),
            revision: payload.get("revision")?.as_str()?.to_string(),
        }),
    }
}

/// Does this platform's GitOps reference track the event's repo/branch?
pub fn reference_matches(reference: &GitOpsReference, event: &PushEvent) -> bool {
    reference.repo_url == event.repo_url
        && reference.branch.as_deref().unwrap_or("main") == event.branch
}

/// Find the platform among candidates whose reference tracks this event.
pub fn match_platform<'a>(
    event: &PushEvent,
    platforms: &'a [ObservabilityPlatform],
) -> Option<&'a ObservabilityPlatform> {
    platforms.iter().find(|p| {
        p.spec
            .git_ops
            .as_ref()
            .is_some_and(|g| reference_matches(g, event))
    })
}

/// Build the merge patch that converges a platform's tracked revision.
/// Written to `spec.gitOps.targetRevision`, never directly to status —
/// the reconciler observes the drift and re-renders components itself.
pub fn revision_patch(revision: &str) -> serde_json::Value {
    serde_json::json!({ "spec": { "gitOps": { "targetRevision": revision } } })
}

/// Derive the GitOps sync phase from the tracked vs. last-applied
/// revision.
pub fn sync_phase(target_revision: Option<&str>, applied_revision: Option<&str>) -> SyncPhase {
    match (target_revision, applied_revision) {
        (Some(target), Some(applied)) if target == applied => SyncPhase::Synced,
        (Some(_), Some(_)) => SyncPhase::OutOfSync,
        (Some(_), None) => SyncPhase::Syncing,
        (None, _) => SyncPhase::Unknown,
    }
}
