//! Revocation registry: tokens that still verify but are no longer trusted.
//!
//! Entries are keyed by the raw token and hold the token's own expiry. Once
//! that instant passes the entry means nothing (the token would be rejected
//! as expired anyway), so lookups treat it as absent and evict it, and a
//! background sweeper drops entries nobody asks about.

use std::sync::Arc;
use std::time::Duration as StdDuration;

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::Serialize;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tracing::{debug, info};

/// Default period between background sweeps.
pub const DEFAULT_SWEEP_INTERVAL: StdDuration = StdDuration::from_secs(600);

/// A live registry entry, as reported to operators.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RevokedToken {
    pub token: String,
    pub expires_at: DateTime<Utc>,
    pub remaining_secs: i64,
}

impl RevokedToken {
    /// `"<n> min left"`, rounded down.
    pub fn time_remaining(&self) -> String {
        format!("{} min left", self.remaining_secs / 60)
    }
}

/// Concurrent revocation set.
///
/// Backed by a sharded map so request-path lookups never wait on a global lock,
/// including while a sweep is running.
#[derive(Debug, Default)]
pub struct RevocationRegistry {
    entries: DashMap<String, DateTime<Utc>>,
}

impl RevocationRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or overwrite. Revoking twice is harmless.
    pub fn revoke(&self, token: impl Into<String>, expires_at: DateTime<Utc>) {
        self.entries.insert(token.into(), expires_at);
    }

    /// `true` iff the token is present and `now < expires_at`.
    ///
    /// A stale entry found here is removed on the spot.
    pub fn is_revoked(&self, token: &str, now: DateTime<Utc>) -> bool {
        let expires_at = match self.entries.get(token) {
            Some(entry) => *entry.value(),
            None => return false,
        };
        if now < expires_at {
            return true;
        }

        // Re-check under the shard lock: a concurrent revoke may have
        // extended the entry since we read it.
        self.entries.remove_if(token, |_, exp| *exp <= now);
        false
    }

    /// Drop every entry with `expires_at <= now`; returns how many went.
    pub fn sweep(&self, now: DateTime<Utc>) -> usize {
        let mut removed = 0;
        self.entries.retain(|_, exp| {
            let keep = now < *exp;
            if !keep {
                removed += 1;
            }
            keep
        });
        removed
    }

    /// Live entries, soonest expiry first. Empty when nothing is revoked.
    pub fn list_active(&self, now: DateTime<Utc>) -> Vec<RevokedToken> {
        let mut out: Vec<RevokedToken> = self
            .entries
            .iter()
            .filter(|e| now < *e.value())
            .map(|e| RevokedToken {
                token: e.key().clone(),
                expires_at: *e.value(),
                remaining_secs: (*e.value() - now).num_seconds(),
            })
            .collect();
        out.sort_by(|a, b| a.expires_at.cmp(&b.expires_at).then(a.token.cmp(&b.token)));
        out
    }

    /// Physically stored entries, stale ones included.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Handle to the background sweeper started by [`spawn_sweeper`].
#[derive(Debug)]
pub struct SweeperHandle {
    shutdown: Option<oneshot::Sender<()>>,
    join: JoinHandle<()>,
}

impl SweeperHandle {
    /// Stop the sweeper and wait for it to exit.
    pub async fn shutdown(mut self) {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }
        let _ = (&mut self.join).await;
    }
}

/// Periodically sweep `registry` until the handle is shut down.
///
/// Must be called from within a Tokio runtime. The first sweep happens one
/// full `every` after spawning.
pub fn spawn_sweeper(registry: Arc<RevocationRegistry>, every: StdDuration) -> SweeperHandle {
    let (tx, mut rx) = oneshot::channel::<()>();

    let join = tokio::spawn(async move {
        let mut ticker = tokio::time::interval(every);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        // `interval` fires immediately; skip that tick.
        ticker.tick().await;

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    let removed = registry.sweep(Utc::now());
                    info!(removed, remaining = registry.len(), "revocation sweep");
                }
                _ = &mut rx => {
                    debug!("revocation sweeper stopping");
                    break;
                }
            }
        }
    });

    SweeperHandle {
        shutdown: Some(tx),
        join,
    }
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, TimeZone};

    use super::*;

    fn t() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 3, 1, 12, 0, 0).unwrap()
    }

    #[test]
    fn absent_token_is_not_revoked() {
        let registry = RevocationRegistry::new();
        assert!(!registry.is_revoked("nope", t()));
    }

    #[test]
    fn revoked_until_expiry_then_evicted_on_lookup() {
        let registry = RevocationRegistry::new();
        registry.revoke("tok", t());

        assert!(registry.is_revoked("tok", t() - Duration::seconds(1)));
        assert_eq!(registry.len(), 1);

        assert!(!registry.is_revoked("tok", t() + Duration::seconds(1)));
        assert_eq!(registry.len(), 0);
    }

    #[test]
    fn entry_at_its_expiry_instant_is_absent() {
        let registry = RevocationRegistry::new();
        registry.revoke("tok", t());
        assert!(!registry.is_revoked("tok", t()));
        assert!(registry.is_empty());
    }

    #[test]
    fn revoke_is_idempotent() {
        let registry = RevocationRegistry::new();
        let exp = t() + Duration::hours(1);
        registry.revoke("tok", exp);
        registry.revoke("tok", exp);

        assert!(registry.is_revoked("tok", t()));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn sweep_drops_only_stale_entries() {
        let registry = RevocationRegistry::new();
        registry.revoke("old", t() - Duration::minutes(5));
        registry.revoke("edge", t());
        registry.revoke("live", t() + Duration::minutes(5));

        assert_eq!(registry.sweep(t()), 2);
        assert_eq!(registry.len(), 1);
        assert!(registry.is_revoked("live", t()));
    }

    #[test]
    fn listing_is_empty_not_an_error() {
        let registry = RevocationRegistry::new();
        assert!(registry.list_active(t()).is_empty());

        registry.revoke("stale", t() - Duration::seconds(1));
        assert!(registry.list_active(t()).is_empty());
    }

    #[test]
    fn listing_reports_remaining_time() {
        let registry = RevocationRegistry::new();
        registry.revoke("b", t() + Duration::minutes(45));
        registry.revoke("a", t() + Duration::seconds(90));

        let active = registry.list_active(t());
        assert_eq!(active.len(), 2);
        assert_eq!(active[0].token, "a");
        assert_eq!(active[0].remaining_secs, 90);
        assert_eq!(active[0].time_remaining(), "1 min left");
        assert_eq!(active[1].time_remaining(), "45 min left");
    }

    #[test]
    fn concurrent_readers_and_writers() {
        let registry = Arc::new(RevocationRegistry::new());
        let exp = t() + Duration::hours(1);

        let handles: Vec<_> = (0..8)
            .map(|n| {
                let registry = registry.clone();
                std::thread::spawn(move || {
                    for i in 0..500 {
                        let token = format!("tok-{n}-{i}");
                        registry.revoke(token.clone(), exp);
                        assert!(registry.is_revoked(&token, t()));
                        if i % 50 == 0 {
                            registry.sweep(t());
                        }
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }

        assert_eq!(registry.len(), 8 * 500);
    }

    #[tokio::test]
    async fn sweeper_purges_entries_nobody_looks_up() {
        let registry = Arc::new(RevocationRegistry::new());
        registry.revoke("stale", Utc::now() - Duration::seconds(1));
        registry.revoke("live", Utc::now() + Duration::hours(1));

        let handle = spawn_sweeper(registry.clone(), StdDuration::from_millis(20));
        for _ in 0..50 {
            if registry.len() == 1 {
                break;
            }
            tokio::time::sleep(StdDuration::from_millis(10)).await;
        }
        handle.shutdown().await;

        assert_eq!(registry.len(), 1);
        assert!(registry.is_revoked("live", Utc::now()));
    }
}
