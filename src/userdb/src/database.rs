//! Immutable rule database snapshot

use crate::table::{TableStats, UserTable};
use crate::types::{DefaultId, Entry};
use chrono::{DateTime, Utc};

/// File-ordered `DEFAULT` entries
///
/// Named entries refer back into this chain through [`DefaultId`] handles,
/// which stay valid for the lifetime of the snapshot that owns both.
#[derive(Debug, Default)]
pub struct DefaultChain {
    entries: Vec<Entry>,
}

impl DefaultChain {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a wildcard entry and return its handle
    pub fn push(&mut self, entry: Entry) -> DefaultId {
        self.entries.push(entry);
        DefaultId(self.entries.len() - 1)
    }

    pub fn get(&self, id: DefaultId) -> Option<&Entry> {
        self.entries.get(id.0)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entries in file order with their handles
    pub fn iter(&self) -> impl Iterator<Item = (DefaultId, &Entry)> {
        self.entries.iter().enumerate().map(|(idx, e)| (DefaultId(idx), e))
    }
}

/// One fully built generation of the users database
///
/// Never mutated after construction; reloads build a new one and swap it in.
#[derive(Debug)]
pub struct RuleDatabase {
    users: UserTable,
    defaults: DefaultChain,
    acct_users: Vec<Entry>,
    generation: u64,
    loaded_at: DateTime<Utc>,
    fingerprint: String,
}

impl RuleDatabase {
    pub fn new(users: UserTable, defaults: DefaultChain, acct_users: Vec<Entry>) -> Self {
        Self {
            users,
            defaults,
            acct_users,
            generation: 0,
            loaded_at: Utc::now(),
            fingerprint: String::new(),
        }
    }

    pub(crate) fn with_generation(mut self, generation: u64) -> Self {
        self.generation = generation;
        self
    }

    pub(crate) fn with_fingerprint(mut self, fingerprint: String) -> Self {
        self.fingerprint = fingerprint;
        self
    }

    /// Named entries
    pub fn users(&self) -> &UserTable {
        &self.users
    }

    /// Wildcard entries
    pub fn defaults(&self) -> &DefaultChain {
        &self.defaults
    }

    /// Pre-accounting entries, in file order
    pub fn acct_users(&self) -> &[Entry] {
        &self.acct_users
    }

    /// Reload generation that built this snapshot (0 = initial load)
    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn loaded_at(&self) -> DateTime<Utc> {
        self.loaded_at
    }

    /// BLAKE3 digest of the rule files this snapshot was built from
    pub fn fingerprint(&self) -> &str {
        &self.fingerprint
    }

    pub fn table_stats(&self) -> TableStats {
        self.users.stats()
    }
}
