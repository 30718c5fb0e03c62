mod common;

use common::{git_ops_reference, make_platform};
use hmac::{Hmac, Mac};
use obsplatform::crd::SyncPhase;
use obsplatform::gitops;
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

fn sign(secret: &str, body: &[u8]) -> String {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes()).unwrap();
    mac.update(body);
    let digest = mac.finalize().into_bytes();
    let hex: String = digest.iter().map(|b| format!("{b:02x}")).collect();
    format!("sha256={hex}")
}

// ══════════════════════════════════════════════════════════════════
// End-to-end GitOps bridge pipeline tests (no cluster, no HTTP
// server required): payload -> signature check -> event parse ->
// platform match -> revision patch -> sync phase, the full sequence
// the webhook handler runs per request.
// ══════════════════════════════════════════════════════════════════

#[test]
fn test_gitops_driven_upgrade_converges_matched_platform() {
    // Scenario: a push event on `main` with a valid signature should
    // converge the one platform whose gitOps reference tracks that
    // repo/branch, and leave others untouched.
    let secret = "topsecret";
    let payload = serde_json::json!({
        "repository": {"clone_url": "https://github.com/acme/observability-gitops.git"},
        "ref": "refs/heads/main",
        "after": "deadbeef1234",
    });
    let body = serde_json::to_vec(&payload).unwrap();
    let signature = sign(secret, &body);

    assert!(gitops::verify_signature("github", secret, &body, &signature));

    let event = gitops::parse_push_event("github", &payload).expect("valid github push payload");
    assert_eq!(event.repo_url, "https://github.com/acme/observability-gitops.git");
    assert_eq!(event.branch, "main");
    assert_eq!(event.revision, "deadbeef1234");

    let mut tracked = make_platform("prod", "observability");
    tracked.spec.git_ops = Some(git_ops_reference(
        &event.repo_url,
        "main",
        "prod-gitops-webhook",
    ));

    let mut unrelated = make_platform("staging", "observability");
    unrelated.spec.git_ops = Some(git_ops_reference(
        "https://github.com/acme/other-repo.git",
        "main",
        "staging-gitops-webhook",
    ));

    let platforms = vec![unrelated, tracked];
    let matched = gitops::match_platform(&event, &platforms).expect("tracked platform found");
    assert_eq!(matched.metadata.name.as_deref(), Some("prod"));

    let patch = gitops::revision_patch(&event.revision);
    assert_eq!(patch["spec"]["gitOps"]["targetRevision"], "deadbeef1234");
}

#[test]
fn test_tampered_payload_fails_signature_and_is_dropped() {
    let secret = "topsecret";
    let original = br#"{"ref":"refs/heads/main"}"#;
    let signature = sign(secret, original);

    let tampered = br#"{"ref":"refs/heads/evil"}"#;
    assert!(!gitops::verify_signature("github", secret, tampered, &signature));
}

#[test]
fn test_event_on_untracked_branch_matches_no_platform() {
    let mut tracked = make_platform("prod", "observability");
    tracked.spec.git_ops = Some(git_ops_reference(
        "https://github.com/acme/observability-gitops.git",
        "main",
        "prod-gitops-webhook",
    ));

    let event = gitops::PushEvent {
        repo_url: "https://github.com/acme/observability-gitops.git".to_string(),
        branch: "feature/unrelated".to_string(),
        revision: "cafefeed".to_string(),
    };

    assert!(gitops::match_platform(&event, std::slice::from_ref(&tracked)).is_none());
}

#[test]
fn test_sync_phase_reflects_whether_target_revision_has_landed() {
    // Before the reconciler applies the new revision, sync is Syncing;
    // once applied and observed equal, it reports Synced.
    assert_eq!(gitops::sync_phase(Some("rev-2"), None), SyncPhase::Syncing);
    assert_eq!(gitops::sync_phase(Some("rev-2"), Some("rev-1")), SyncPhase::OutOfSync);
    assert_eq!(gitops::sync_phase(Some("rev-2"), Some("rev-2")), SyncPhase::Synced);
}

#[test]
fn test_gitlab_push_event_uses_direct_token_match_not_hmac() {
    let payload = serde_json::json!({
        "project": {"git_http_url": "https://gitlab.com/acme/repo.git"},
        "ref": "refs/heads/main",
        "checkout_sha": "abc987",
    });
    let body = serde_json::to_vec(&payload).unwrap();

    assert!(gitops::verify_signature("gitlab", "sharedtoken", &body, "sharedtoken"));
    assert!(!gitops::verify_signature("gitlab", "sharedtoken", &body, "wrongtoken"));

    let event = gitops::parse_push_event("gitlab", &payload).expect("valid gitlab push payload");
    assert_eq!(event.repo_url, "https://gitlab.com/acme/repo.git");
    assert_eq!(event.revision, "abc987");
}
