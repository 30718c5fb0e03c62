//! Leader election: a single-holder `coordination.k8s.io/v1 Lease`
//! gates which operator replica runs reconcilers. Optimistic
//! patch-and-retry, the same shape as `teardown::add_finalizer` — one
//! server-side apply, conflicts just mean this replica stays a
//! follower and tries again on the next tick.

use std::time::Duration;

use k8s_openapi::api::coordination::v1::{Lease, LeaseSpec};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::{MicroTime, ObjectMeta};
use kube::api::{Api, Patch, PatchParams};
use kube::Client;
use tracing::{info, warn};

use crate::gateway::FIELD_MANAGER;

/// Default lease object name, one per operator deployment.
pub const DEFAULT_LEASE_NAME: &str = "observability-platform-operator-leader";
/// How long a held lease is valid without renewal before another
/// replica may claim it.
pub const DEFAULT_LEASE_DURATION_SECONDS: i32 = 15;
/// How often the holder renews (well under the duration, so a missed
/// tick or two doesn't cost leadership).
pub const DEFAULT_RENEW_INTERVAL: Duration = Duration::from_secs(5);

/// A replica's claim to be the single active reconciler. Build one
/// per process with a stable, unique `identity` and call
/// `try_acquire_or_renew` on `DEFAULT_RENEW_INTERVAL`.
#[derive(Debug, Clone)]
pub struct LeaseLock {
    pub namespace: String,
    pub name: String,
    pub identity: String,
    pub duration_seconds: i32,
}

impl LeaseLock {
    pub fn new(namespace: impl Into<String>, identity: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            name: DEFAULT_LEASE_NAME.to_string(),
            identity: identity.into(),
            duration_seconds: DEFAULT_LEASE_DURATION_SECONDS,
        }
    }

    /// Attempt to claim or renew the lease. Returns true if `identity`
    /// holds it after this call. Never errors out of the renewal loop
    /// on a lost race — only on a genuine API failure.
    pub async fn try_acquire_or_renew(&self, client: &Client) -> kube::Result<bool> {
        let api: Api<Lease> = Api::namespaced(client.clone(), &self.namespace);
        let now = MicroTime(chrono::Utc::now());

        let current = match api.get(&self.name).await {
            Ok(lease) => Some(lease),
            Err(kube::Error::Api(e)) if e.code == 404 => None,
            Err(e) => return Err(e),
        };

        if let Some(lease) = &current {
            if !self.may_claim(lease, &now) {
                return Ok(false);
            }
        }

        let transitions = current
            .as_ref()
            .and_then(|l| l.spec.as_ref())
            .map(|s| {
                let was_us = s.holder_identity.as_deref() == Some(self.identity.as_str());
                if was_us {
                    s.lease_transitions.unwrap_or(0)
                } else {
                    s.lease_transitions.unwrap_or(0) + 1
                }
            })
            .unwrap_or(0);

        let acquire_time = current
            .as_ref()
            .and_then(|l| l.spec.as_ref())
            .and_then(|s| {
                if s.holder_identity.as_deref() == Some(self.identity.as_str()) {
                    s.acquire_time.clone()
                } else {
                    None
                }
            })
            .unwrap_or_else(|| now.clone());

        let desired = Lease {
            metadata: ObjectMeta {
                name: Some(self.name.clone()),
                namespace: Some(self.namespace.clone()),
                ..Default::default()
            },
            spec: Some(LeaseSpec {
                holder_identity: Some(self.identity.clone()),
                lease_duration_seconds: Some(self.duration_seconds),
                acquire_time: Some(acquire_time),
                renew_time: Some(now),
                lease_transitions: Some(transitions),
                ..Default::default()
            }),
        };

        match api
            .patch(&self.name, &PatchParams::apply(FIELD_MANAGER).force(), &Patch::Apply(&desired))
            .await
        {
            Ok(_) => {
                info!(lease = %self.name, identity = %self.identity, "lease_acquired_or_renewed");
                Ok(true)
            }
            Err(kube::Error::Api(e)) if e.code == 409 => {
                warn!(lease = %self.name, "lease_acquire_conflict");
                Ok(false)
            }
            Err(e) => Err(e),
        }
    }

    /// True if this identity already holds the lease, or the existing
    /// holder's lease has expired.
    fn may_claim(&self, lease: &Lease, now: &MicroTime) -> bool {
        let Some(spec) = lease.spec.as_ref() else { return true };
        if spec.holder_identity.as_deref() == Some(self.identity.as_str()) {
            return true;
        }
        let Some(renew_time) = spec.renew_time.as_ref() else { return true };
        let duration = spec.lease_duration_seconds.unwrap_or(self.duration_seconds) as i64;
        let elapsed = now.0.signed_duration_since(renew_time.0).num_seconds();
        elapsed > duration
    }
}

/// Build a per-process identity: `{pod name or hostname}-{random
/// suffix}`, stable for the lifetime of the process and unique enough
/// across replicas to break leadership ties deterministically.
pub fn process_identity() -> String {
    let base = std::env::var("POD_NAME")
        .or_else(|_| std::env::var("HOSTNAME"))
        .unwrap_or_else(|_| "operator".to_string());
    let suffix: u32 = rand::random();
    format!("{base}-{suffix:08x}")
}
