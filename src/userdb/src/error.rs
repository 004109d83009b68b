//! Error types for the users database

use thiserror::Error;

/// Users database errors
#[derive(Debug, Error)]
pub enum UserDbError {
    /// Rule file could not be read
    #[error("Failed to read rule file `{path}`: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// Rule file is malformed
    #[error("{path}:{line}: {message}")]
    Parse {
        path: String,
        line: usize,
        message: String,
    },

    /// Hash table could not be allocated
    #[error("Cannot allocate hash table with {buckets} buckets")]
    Allocation { buckets: usize },

    /// Invalid configuration value
    #[error("Invalid configuration: {0}")]
    Configuration(String),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl UserDbError {
    /// Whether this error came from building a database out of rule files.
    ///
    /// Load errors are fatal at startup but only reported during a reload,
    /// where the previous database keeps serving.
    pub fn is_load_error(&self) -> bool {
        matches!(
            self,
            UserDbError::Read { .. } | UserDbError::Parse { .. } | UserDbError::Allocation { .. }
        )
    }

    pub(crate) fn parse(path: &str, line: usize, message: impl Into<String>) -> Self {
        UserDbError::Parse {
            path: path.to_string(),
            line,
            message: message.into(),
        }
    }
}

/// Result type for users database operations
pub type Result<T> = std::result::Result<T, UserDbError>;
