//! Shared fixtures for integration tests

#![allow(dead_code)]

use cretoai_userdb::{dictionary::attr, AuthorizeResult, UserDb, UserDbConfig};
use std::path::PathBuf;
use tempfile::TempDir;

/// Rule files in a scratch directory
pub struct RuleFiles {
    pub dir: TempDir,
    pub users: PathBuf,
    pub acct_users: PathBuf,
}

impl RuleFiles {
    pub fn new(users: &str, acct_users: &str) -> Self {
        let dir = tempfile::tempdir().expect("create temp dir");
        let files = Self {
            users: dir.path().join("users"),
            acct_users: dir.path().join("acct_users"),
            dir,
        };
        files.write_users(users);
        files.write_acct_users(acct_users);
        files
    }

    pub fn write_users(&self, text: &str) {
        std::fs::write(&self.users, text).expect("write users file");
    }

    pub fn write_acct_users(&self, text: &str) {
        std::fs::write(&self.acct_users, text).expect("write acct_users file");
    }

    pub fn config(&self) -> UserDbConfig {
        UserDbConfig::new(&self.users)
            .with_acct_users_file(&self.acct_users)
            .with_hash_size(128)
            .with_hash_reload(0)
    }

    pub fn open(&self) -> UserDb {
        UserDb::open(self.config()).expect("open users database")
    }
}

/// `Class` values of the reply, in order
pub fn reply_classes(result: &AuthorizeResult) -> Vec<String> {
    result
        .reply
        .iter()
        .filter(|p| p.attribute == attr::CLASS)
        .map(|p| p.value.clone())
        .collect()
}
