//! Users database configuration loading and validation

use crate::error::{Result, UserDbError};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// How ambiguous `=` check items on server-local attributes are treated
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CompatMode {
    /// Legacy Cistron semantics: local `=` becomes `+=` (`==` for `Hint`
    /// and `Huntgroup-Name`)
    Cistron,
    /// Leave local `=` items as assignments
    None,
}

/// Users database configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserDbConfig {
    /// Hashed authorization rules
    #[serde(default = "default_users_file")]
    pub users_file: PathBuf,

    /// Sequential pre-accounting rules
    #[serde(default = "default_acct_users_file")]
    pub acct_users_file: Option<PathBuf>,

    /// Number of hash buckets
    #[serde(default = "default_hash_size")]
    pub hash_size: usize,

    /// Log chain-length statistics after every build
    #[serde(default)]
    pub stats: bool,

    /// Operator compatibility mode
    #[serde(default = "default_compat")]
    pub compat: CompatMode,

    /// Seconds between reloads, 0 disables reloading
    #[serde(default = "default_hash_reload")]
    pub hash_reload: u64,

    /// Require a password match to pick between same-named entries
    #[serde(default)]
    pub user_collide: bool,
}

fn default_users_file() -> PathBuf { PathBuf::from("/etc/raddb/users_fast") }
fn default_acct_users_file() -> Option<PathBuf> { Some(PathBuf::from("/etc/raddb/acct_users")) }
fn default_hash_size() -> usize { 100_000 }
fn default_compat() -> CompatMode { CompatMode::Cistron }
fn default_hash_reload() -> u64 { 600 }

impl Default for UserDbConfig {
    fn default() -> Self {
        Self {
            users_file: default_users_file(),
            acct_users_file: default_acct_users_file(),
            hash_size: default_hash_size(),
            stats: false,
            compat: default_compat(),
            hash_reload: default_hash_reload(),
            user_collide: false,
        }
    }
}

impl UserDbConfig {
    /// Configuration for the given users file with defaults elsewhere and no
    /// accounting file
    pub fn new(users_file: impl Into<PathBuf>) -> Self {
        Self {
            users_file: users_file.into(),
            acct_users_file: None,
            ..Self::default()
        }
    }

    /// Load configuration from a TOML file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let contents = std::fs::read_to_string(path.as_ref())?;
        Self::from_toml_str(&contents)
    }

    /// Parse configuration from TOML text
    pub fn from_toml_str(contents: &str) -> Result<Self> {
        let config: UserDbConfig = toml::from_str(contents)
            .map_err(|e| UserDbError::Configuration(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if self.hash_size == 0 {
            return Err(UserDbError::Configuration(
                "hash_size must be a positive integer".to_string(),
            ));
        }

        if self.users_file.as_os_str().is_empty() {
            return Err(UserDbError::Configuration("users_file must not be empty".to_string()));
        }

        if matches!(&self.acct_users_file, Some(p) if p.as_os_str().is_empty()) {
            return Err(UserDbError::Configuration(
                "acct_users_file must not be empty when set".to_string(),
            ));
        }

        Ok(())
    }

    /// Reload interval, `None` when reloading is disabled
    pub fn reload_interval(&self) -> Option<Duration> {
        (self.hash_reload > 0).then(|| Duration::from_secs(self.hash_reload))
    }

    pub fn with_acct_users_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.acct_users_file = Some(path.into());
        self
    }

    pub fn with_hash_size(mut self, hash_size: usize) -> Self {
        self.hash_size = hash_size;
        self
    }

    pub fn with_compat(mut self, compat: CompatMode) -> Self {
        self.compat = compat;
        self
    }

    pub fn with_hash_reload(mut self, seconds: u64) -> Self {
        self.hash_reload = seconds;
        self
    }

    pub fn with_stats(mut self, stats: bool) -> Self {
        self.stats = stats;
        self
    }

    pub fn with_user_collide(mut self, user_collide: bool) -> Self {
        self.user_collide = user_collide;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = UserDbConfig::from_toml_str("").unwrap();
        assert_eq!(config, UserDbConfig::default());
        assert_eq!(config.hash_size, 100_000);
        assert_eq!(config.compat, CompatMode::Cistron);
        assert_eq!(config.reload_interval(), Some(Duration::from_secs(600)));
    }

    #[test]
    fn test_parse_full_config() {
        let config = UserDbConfig::from_toml_str(
            r#"
            users_file = "/srv/radius/users"
            acct_users_file = "/srv/radius/acct_users"
            hash_size = 1024
            stats = true
            compat = "none"
            hash_reload = 0
            user_collide = true
            "#,
        )
        .unwrap();

        assert_eq!(config.users_file, PathBuf::from("/srv/radius/users"));
        assert_eq!(config.hash_size, 1024);
        assert_eq!(config.compat, CompatMode::None);
        assert_eq!(config.reload_interval(), None);
        assert!(config.stats && config.user_collide);
    }

    #[test]
    fn test_invalid_values_rejected() {
        assert!(matches!(
            UserDbConfig::from_toml_str("hash_size = 0"),
            Err(UserDbError::Configuration(_))
        ));
        assert!(UserDbConfig::from_toml_str("hash_size = -5").is_err());
        assert!(UserDbConfig::from_toml_str("compat = \"freeradius\"").is_err());
        assert!(UserDbConfig::from_toml_str("users_file = \"\"").is_err());
    }
}
