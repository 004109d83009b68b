//! Username hash table
//!
//! Fixed number of buckets, each an ordered chain of entries. Same-named
//! entries stay in file order within their bucket so alternative rules for
//! one user are tried in the order they were written.

use crate::error::{Result, UserDbError};
use crate::types::Entry;
use serde::{Deserialize, Serialize};
use tracing::info;

/// Polynomial multiplier of the username hash
const HASH_MULTIPLIER: u64 = 7907;

/// Chain lengths at or above this are reported in a single overflow count
pub const STATS_CHAIN_CAP: usize = 256;

/// Bucket index for a username: running `hash * 7907 + byte`, wrapping,
/// reduced modulo the bucket count.
pub fn hash_name(name: &str, bucket_count: usize) -> usize {
    let hash = name
        .bytes()
        .fold(0u64, |hash, byte| hash.wrapping_mul(HASH_MULTIPLIER).wrapping_add(byte as u64));
    (hash % bucket_count as u64) as usize
}

/// Hash table of named entries
#[derive(Debug)]
pub struct UserTable {
    buckets: Vec<Vec<Entry>>,
    len: usize,
}

impl UserTable {
    /// Allocate a table with `bucket_count` empty buckets
    pub fn with_buckets(bucket_count: usize) -> Result<Self> {
        if bucket_count == 0 {
            return Err(UserDbError::Configuration(
                "hash table needs at least one bucket".to_string(),
            ));
        }

        let mut buckets = Vec::new();
        buckets
            .try_reserve_exact(bucket_count)
            .map_err(|_| UserDbError::Allocation { buckets: bucket_count })?;
        buckets.resize_with(bucket_count, Vec::new);

        Ok(Self { buckets, len: 0 })
    }

    pub fn bucket_count(&self) -> usize {
        self.buckets.len()
    }

    /// Number of stored entries
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Append an entry at the tail of its bucket
    pub fn insert(&mut self, entry: Entry) {
        let idx = hash_name(&entry.name, self.buckets.len());
        self.buckets[idx].push(entry);
        self.len += 1;
    }

    /// Chain the name hashes to. May hold other names that collide.
    pub fn lookup(&self, name: &str) -> &[Entry] {
        &self.buckets[hash_name(name, self.buckets.len())]
    }

    /// Chain-length histogram
    pub fn stats(&self) -> TableStats {
        let mut histogram = vec![0usize; STATS_CHAIN_CAP];
        let mut overflow = 0;

        for bucket in &self.buckets {
            match histogram.get_mut(bucket.len()) {
                Some(count) => *count += 1,
                None => overflow += 1,
            }
        }

        TableStats {
            bucket_count: self.buckets.len(),
            entries: self.len,
            histogram,
            overflow,
        }
    }
}

/// Hash table statistics report
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableStats {
    /// Number of buckets
    pub bucket_count: usize,

    /// Number of stored entries
    pub entries: usize,

    /// `histogram[n]` = buckets holding exactly `n` entries
    pub histogram: Vec<usize>,

    /// Buckets holding `STATS_CHAIN_CAP` entries or more
    pub overflow: usize,
}

impl TableStats {
    /// Length of the longest chain below the cap
    pub fn longest_chain(&self) -> usize {
        self.histogram.iter().rposition(|&count| count > 0).unwrap_or(0)
    }

    /// Log the non-empty histogram rows
    pub fn log(&self) {
        for (len, count) in self.histogram.iter().enumerate().filter(|(_, c)| **c > 0) {
            info!("Hash buckets with {} users: {}", len, count);
        }
        if self.overflow > 0 {
            info!("Hash buckets with more than {}: {}", STATS_CHAIN_CAP, self.overflow);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_hash_matches_polynomial() {
        // "ab" = 97 * 7907 + 98
        assert_eq!(hash_name("ab", 1_000_000), (97 * 7907 + 98) % 1_000_000);
        assert_eq!(hash_name("", 10), 0);
        assert_eq!(hash_name("a", 10), 97 % 10);
    }

    #[test]
    fn test_zero_buckets_rejected() {
        assert!(matches!(
            UserTable::with_buckets(0),
            Err(UserDbError::Configuration(_))
        ));
    }

    #[test]
    fn test_same_name_entries_keep_file_order() {
        let mut table = UserTable::with_buckets(1).unwrap();
        table.insert(Entry::new("bob", 1));
        table.insert(Entry::new("alice", 2));
        table.insert(Entry::new("bob", 3));

        let chain: Vec<_> = table.lookup("bob").iter().map(|e| (e.name.as_str(), e.line)).collect();
        assert_eq!(chain, vec![("bob", 1), ("alice", 2), ("bob", 3)]);
        assert_eq!(table.len(), 3);
    }

    #[test]
    fn test_stats_histogram() {
        let mut table = UserTable::with_buckets(4).unwrap();
        for (i, name) in ["a", "b", "c", "a"].iter().enumerate() {
            table.insert(Entry::new(*name, i + 1));
        }

        let stats = table.stats();
        assert_eq!(stats.entries, 4);
        assert_eq!(stats.histogram.iter().sum::<usize>(), 4);
        assert_eq!(stats.histogram.len(), STATS_CHAIN_CAP);
        assert_eq!(stats.overflow, 0);
        assert!(stats.longest_chain() >= 2);
    }

    #[test]
    fn test_stats_overflow_bucket() {
        let mut table = UserTable::with_buckets(1).unwrap();
        for i in 0..(STATS_CHAIN_CAP + 1) {
            table.insert(Entry::new(format!("user{}", i), i + 1));
        }

        let stats = table.stats();
        assert_eq!(stats.overflow, 1);
        assert_eq!(stats.histogram.iter().sum::<usize>(), 0);
    }

    proptest! {
        #[test]
        fn prop_hash_is_deterministic_and_in_range(name in "[a-zA-Z0-9@._-]{0,40}", buckets in 1usize..200_000) {
            let first = hash_name(&name, buckets);
            prop_assert_eq!(first, hash_name(&name, buckets));
            prop_assert!(first < buckets);
        }

        #[test]
        fn prop_lookup_finds_inserted_name(names in proptest::collection::vec("[a-z]{1,12}", 1..50), buckets in 1usize..64) {
            let mut table = UserTable::with_buckets(buckets).unwrap();
            for (i, name) in names.iter().enumerate() {
                table.insert(Entry::new(name.clone(), i + 1));
            }
            for name in &names {
                prop_assert!(table.lookup(name).iter().any(|e| &e.name == name));
            }
        }
    }
}
