//! Prometheus-style counters for the users database

use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};

/// Metrics snapshot
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct UserDbMetrics {
    /// Total authorize calls
    pub authorize_requests: u64,

    /// Authorize calls that produced updates
    pub authorize_updated: u64,

    /// Authorize calls with no applicable entry
    pub authorize_not_found: u64,

    /// Total pre-accounting calls
    pub preacct_requests: u64,
    pub preacct_ok: u64,
    pub preacct_noop: u64,

    /// Successful reloads (initial load excluded)
    pub reloads: u64,

    /// Failed reloads; the previous database stayed in service
    pub reload_failures: u64,

    /// Sizes of the live database
    pub users: u64,
    pub defaults: u64,
    pub acct_users: u64,
}

impl UserDbMetrics {
    /// Share of authorize calls that matched something
    pub fn match_rate(&self) -> f64 {
        if self.authorize_requests == 0 {
            0.0
        } else {
            self.authorize_updated as f64 / self.authorize_requests as f64
        }
    }
}

/// Lock-free metrics collector
#[derive(Debug, Default)]
pub struct MetricsCollector {
    authorize_updated: AtomicU64,
    authorize_not_found: AtomicU64,
    preacct_ok: AtomicU64,
    preacct_noop: AtomicU64,
    reloads: AtomicU64,
    reload_failures: AtomicU64,
    users: AtomicU64,
    defaults: AtomicU64,
    acct_users: AtomicU64,
}

impl MetricsCollector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_authorize(&self, updated: bool) {
        let counter = if updated { &self.authorize_updated } else { &self.authorize_not_found };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_preacct(&self, ok: bool) {
        let counter = if ok { &self.preacct_ok } else { &self.preacct_noop };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_reload(&self, succeeded: bool) {
        let counter = if succeeded { &self.reloads } else { &self.reload_failures };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    /// Record the sizes of the database now in service
    pub fn record_sizes(&self, users: usize, defaults: usize, acct_users: usize) {
        self.users.store(users as u64, Ordering::Relaxed);
        self.defaults.store(defaults as u64, Ordering::Relaxed);
        self.acct_users.store(acct_users as u64, Ordering::Relaxed);
    }

    /// Get current metrics snapshot
    pub fn snapshot(&self) -> UserDbMetrics {
        let authorize_updated = self.authorize_updated.load(Ordering::Relaxed);
        let authorize_not_found = self.authorize_not_found.load(Ordering::Relaxed);
        let preacct_ok = self.preacct_ok.load(Ordering::Relaxed);
        let preacct_noop = self.preacct_noop.load(Ordering::Relaxed);

        UserDbMetrics {
            authorize_requests: authorize_updated + authorize_not_found,
            authorize_updated,
            authorize_not_found,
            preacct_requests: preacct_ok + preacct_noop,
            preacct_ok,
            preacct_noop,
            reloads: self.reloads.load(Ordering::Relaxed),
            reload_failures: self.reload_failures.load(Ordering::Relaxed),
            users: self.users.load(Ordering::Relaxed),
            defaults: self.defaults.load(Ordering::Relaxed),
            acct_users: self.acct_users.load(Ordering::Relaxed),
        }
    }

    /// Export metrics in Prometheus format
    pub fn export_prometheus(&self) -> String {
        let m = self.snapshot();

        format!(
            r#"# HELP userdb_authorize_total Authorization walks by verdict
# TYPE userdb_authorize_total counter
userdb_authorize_total{{verdict="updated"}} {}
userdb_authorize_total{{verdict="not_found"}} {}

# HELP userdb_preacct_total Pre-accounting walks by verdict
# TYPE userdb_preacct_total counter
userdb_preacct_total{{verdict="ok"}} {}
userdb_preacct_total{{verdict="noop"}} {}

# HELP userdb_reloads_total Database reloads by outcome
# TYPE userdb_reloads_total counter
userdb_reloads_total{{outcome="success"}} {}
userdb_reloads_total{{outcome="failure"}} {}

# HELP userdb_entries Entries in the live database
# TYPE userdb_entries gauge
userdb_entries{{kind="users"}} {}
userdb_entries{{kind="defaults"}} {}
userdb_entries{{kind="acct_users"}} {}
"#,
            m.authorize_updated,
            m.authorize_not_found,
            m.preacct_ok,
            m.preacct_noop,
            m.reloads,
            m.reload_failures,
            m.users,
            m.defaults,
            m.acct_users,
        )
    }
}
