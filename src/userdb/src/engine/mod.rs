//! Users database service
//!
//! Owns the live [`RuleDatabase`] snapshot, runs the matchers against it and
//! rebuilds it from the rule files when the reload deadline passes.
//!
//! # Architecture
//!
//! ```text
//! users file ─┐                        ┌─> Authorizer ─> AuthorizeResult
//!             ├─> loader ─> snapshot ──┤
//! acct_users ─┘      ^        (ArcSwap)└─> preaccount ─> PreacctResult
//!                    │
//!              reload deadline / background task
//! ```
//!
//! Every request takes its own `Arc` of the snapshot, so a reload swaps in a
//! new generation without disturbing walks already in flight; the old
//! generation is freed when the last of them finishes.

pub mod authorize;
pub mod decision;
pub mod metrics;
pub mod preacct;

pub use authorize::Authorizer;
pub use decision::{AuthorizeResult, AuthorizeVerdict, PreacctResult, PreacctVerdict};
pub use metrics::{MetricsCollector, UserDbMetrics};
pub use preacct::preaccount;

use crate::compare::{CleartextPasswordVerifier, CredentialVerifier, DefaultComparator, PairComparator};
use crate::config::UserDbConfig;
use crate::database::RuleDatabase;
use crate::error::{Result, UserDbError};
use crate::loader;
use crate::table::TableStats;
use crate::types::Request;

use arc_swap::ArcSwap;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{error, info};

/// Result of a reload deadline check
#[derive(Debug)]
pub enum ReloadOutcome {
    /// Reloading is disabled or the deadline has not passed
    NotDue,
    /// A new generation is in service
    Reloaded { generation: u64 },
    /// The rebuild failed; the previous generation is still in service
    Failed(UserDbError),
}

/// Hashed users database with hot reload
pub struct UserDb {
    config: UserDbConfig,

    /// Live snapshot
    current: ArcSwap<RuleDatabase>,

    /// Reload interval, `None` when disabled
    interval: Option<chrono::Duration>,

    /// Next time a request may trigger a reload
    next_reload: Mutex<DateTime<Utc>>,

    /// Serializes rebuilds; readers never take it
    reload_lock: Mutex<()>,

    last_reload_error: Mutex<Option<String>>,

    comparator: Arc<dyn PairComparator>,

    /// Consulted only in credential collision mode
    verifier: Arc<dyn CredentialVerifier>,

    metrics: MetricsCollector,
}

impl std::fmt::Debug for UserDb {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UserDb")
            .field("config", &self.config)
            .field("generation", &self.current.load().generation())
            .field("next_reload", &self.next_reload())
            .finish_non_exhaustive()
    }
}

impl UserDb {
    /// Validate the configuration and load the initial database.
    ///
    /// Any configuration or load error is returned; there is no previous
    /// database to fall back on at this point.
    pub fn open(config: UserDbConfig) -> Result<Self> {
        config.validate()?;

        let interval = config
            .reload_interval()
            .map(chrono::Duration::from_std)
            .transpose()
            .map_err(|e| UserDbError::Configuration(format!("hash_reload out of range: {}", e)))?;

        let db = loader::build_database(&config)?;
        let metrics = MetricsCollector::new();
        metrics.record_sizes(db.users().len(), db.defaults().len(), db.acct_users().len());

        let now = Utc::now();
        let next_reload = interval.map(|i| now + i).unwrap_or(now);

        info!(
            "UserDb initialized with hash_size={}, compat={:?}, hash_reload={}s, user_collide={}",
            config.hash_size, config.compat, config.hash_reload, config.user_collide
        );

        Ok(Self {
            config,
            current: ArcSwap::from_pointee(db),
            interval,
            next_reload: Mutex::new(next_reload),
            reload_lock: Mutex::new(()),
            last_reload_error: Mutex::new(None),
            comparator: Arc::new(DefaultComparator::new()),
            verifier: Arc::new(CleartextPasswordVerifier),
            metrics,
        })
    }

    /// Replace the check-item comparison
    pub fn with_comparator(mut self, comparator: Arc<dyn PairComparator>) -> Self {
        self.comparator = comparator;
        self
    }

    /// Replace the credential check used when `user_collide` is on
    pub fn with_verifier(mut self, verifier: Arc<dyn CredentialVerifier>) -> Self {
        self.verifier = verifier;
        self
    }

    pub fn config(&self) -> &UserDbConfig {
        &self.config
    }

    /// The database generation currently in service
    pub fn snapshot(&self) -> Arc<RuleDatabase> {
        self.current.load_full()
    }

    /// Authorize a request against the live database, reloading first if the
    /// request's timestamp is past the reload deadline.
    pub fn authorize(&self, request: &Request) -> AuthorizeResult {
        // A failed reload is logged and counted; the stale database keeps serving.
        let _ = self.maybe_reload(request.timestamp);

        let db = self.snapshot();
        let mut authorizer = Authorizer::new(&db, self.comparator.as_ref());
        if self.config.user_collide {
            authorizer = authorizer.with_credential_check(self.verifier.as_ref());
        }

        let result = authorizer.authorize(request);
        self.metrics.record_authorize(result.is_updated());
        result
    }

    /// Run the pre-accounting rules against the live database
    pub fn preaccount(&self, request: &Request) -> PreacctResult {
        let db = self.snapshot();
        let result = preaccount(&db, self.comparator.as_ref(), request);
        self.metrics.record_preacct(result.is_ok());
        result
    }

    /// Reload if reloading is enabled and `now` is past the deadline.
    ///
    /// The deadline moves to `now + interval` before the rebuild starts, so
    /// concurrent callers do not pile up behind the same reload.
    pub fn maybe_reload(&self, now: DateTime<Utc>) -> ReloadOutcome {
        let Some(interval) = self.interval else {
            return ReloadOutcome::NotDue;
        };

        {
            let mut next = self.next_reload.lock();
            if now <= *next {
                return ReloadOutcome::NotDue;
            }
            *next = now + interval;
        }

        info!("Reloading users hash");
        match self.rebuild() {
            Ok(generation) => ReloadOutcome::Reloaded { generation },
            Err(e) => ReloadOutcome::Failed(e),
        }
    }

    /// Rebuild now, regardless of the deadline, and push the deadline out by
    /// one interval.
    pub fn reload(&self) -> Result<u64> {
        if let Some(interval) = self.interval {
            *self.next_reload.lock() = Utc::now() + interval;
        }
        self.rebuild()
    }

    fn rebuild(&self) -> Result<u64> {
        let _guard = self.reload_lock.lock();
        let previous = self.current.load().generation();

        let db = match loader::build_database(&self.config) {
            Ok(db) => db.with_generation(previous + 1),
            Err(e) => {
                error!("Error building user hash, keeping generation {}: {}", previous, e);
                self.metrics.record_reload(false);
                *self.last_reload_error.lock() = Some(e.to_string());
                return Err(e);
            }
        };

        let generation = db.generation();
        self.metrics
            .record_sizes(db.users().len(), db.defaults().len(), db.acct_users().len());

        // Readers still holding the old generation keep it alive until they finish.
        let retired = self.current.swap(Arc::new(db));
        self.metrics.record_reload(true);
        *self.last_reload_error.lock() = None;

        info!(
            generation,
            retired = retired.generation(),
            "Users database reloaded"
        );
        Ok(generation)
    }

    /// Drive reloads from a background task instead of the request path.
    ///
    /// Returns `None` when reloading is disabled. Must be called inside a
    /// Tokio runtime.
    pub fn spawn_reload_task(self: &Arc<Self>) -> Option<JoinHandle<()>> {
        let period = self.config.reload_interval()?;
        let db = Arc::clone(self);

        Some(tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            // The first tick completes immediately
            ticker.tick().await;

            loop {
                ticker.tick().await;
                let db = Arc::clone(&db);
                if let Err(e) = tokio::task::spawn_blocking(move || db.reload()).await {
                    error!("Reload task failed: {}", e);
                }
            }
        }))
    }

    /// Error of the last failed reload, cleared by the next success
    pub fn last_reload_error(&self) -> Option<String> {
        self.last_reload_error.lock().clone()
    }

    /// Next time a request may trigger a reload, if reloading is enabled
    pub fn next_reload(&self) -> Option<DateTime<Utc>> {
        self.interval.map(|_| *self.next_reload.lock())
    }

    /// Chain-length statistics of the live hash table
    pub fn table_stats(&self) -> TableStats {
        self.snapshot().table_stats()
    }

    pub fn metrics(&self) -> UserDbMetrics {
        self.metrics.snapshot()
    }

    pub fn export_prometheus(&self) -> String {
        self.metrics.export_prometheus()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn write_users(dir: &tempfile::TempDir, text: &str) -> std::path::PathBuf {
        let path = dir.path().join("users");
        std::fs::write(&path, text).unwrap();
        path
    }

    #[test]
    fn test_open_loads_initial_generation() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_users(&dir, "bob\n\tClass = bob\nDEFAULT\n");

        let db = UserDb::open(UserDbConfig::new(path).with_hash_size(16)).unwrap();
        let snapshot = db.snapshot();
        assert_eq!(snapshot.generation(), 0);
        assert_eq!(snapshot.users().len(), 1);
        assert_eq!(snapshot.defaults().len(), 1);
        assert!(!snapshot.fingerprint().is_empty());
        assert_eq!(db.metrics().users, 1);
    }

    #[test]
    fn test_open_rejects_invalid_config_and_files() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_users(&dir, "bob\n");
        assert!(matches!(
            UserDb::open(UserDbConfig::new(&path).with_hash_size(0)),
            Err(UserDbError::Configuration(_))
        ));

        let broken = write_users(&dir, "bob Nonsense == 1\n");
        assert!(UserDb::open(UserDbConfig::new(broken)).unwrap_err().is_load_error());
    }

    #[test]
    fn test_debug_output_names_generation() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_users(&dir, "bob\n");
        let db = UserDb::open(UserDbConfig::new(path)).unwrap();

        let text = format!("{:?}", db);
        assert!(text.starts_with("UserDb"));
        assert!(text.contains("generation: 0"));
    }

    #[test]
    fn test_deadline_controls_reload() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_users(&dir, "bob\n");
        let db = UserDb::open(UserDbConfig::new(path).with_hash_reload(60)).unwrap();

        let deadline = db.next_reload().unwrap();
        assert!(matches!(db.maybe_reload(deadline), ReloadOutcome::NotDue));

        let later = deadline + Duration::seconds(1);
        assert!(matches!(db.maybe_reload(later), ReloadOutcome::Reloaded { generation: 1 }));
        assert_eq!(db.next_reload(), Some(later + Duration::seconds(60)));
        assert!(matches!(db.maybe_reload(later), ReloadOutcome::NotDue));
    }

    #[test]
    fn test_zero_interval_disables_reload() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_users(&dir, "bob\n");
        let db = UserDb::open(UserDbConfig::new(path).with_hash_reload(0)).unwrap();

        assert_eq!(db.next_reload(), None);
        let far_future = Utc::now() + Duration::days(365);
        assert!(matches!(db.maybe_reload(far_future), ReloadOutcome::NotDue));
        assert_eq!(db.snapshot().generation(), 0);
    }
}
