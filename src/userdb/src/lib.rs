//! # CretoAI Users Database
//!
//! In-memory authorization database for users-file rules, built for the
//! authorization step of an AAA server.
//!
//! ## Features
//!
//! - **Hashed lookup** of named entries with file-ordered bucket chains
//! - **DEFAULT interleaving** that reproduces the original file order across
//!   the hash table and the wildcard chain, including `Fall-Through`
//! - **Pre-accounting** rules evaluated sequentially from a second file
//! - **Hot reload** by atomic snapshot swap; a failed reload keeps the
//!   previous database serving
//! - **Cistron compatibility** rewriting of ambiguous `=` check items
//!
//! ## Example
//!
//! ```no_run
//! use cretoai_userdb::{Request, UserDb, UserDbConfig};
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let db = UserDb::open(UserDbConfig::new("/etc/raddb/users_fast"))?;
//!
//!     let request = Request::new("bob").with_attribute("Service-Type", "Framed-User")?;
//!     let result = db.authorize(&request);
//!
//!     if result.is_updated() {
//!         for pair in result.reply.iter() {
//!             println!("{}", pair);
//!         }
//!     }
//!
//!     Ok(())
//! }
//! ```

pub mod compare;
pub mod config;
pub mod database;
pub mod dictionary;
pub mod engine;
pub mod error;
pub mod loader;
pub mod parser;
pub mod table;
pub mod types;

// Re-export commonly used types
pub use compare::{CleartextPasswordVerifier, CredentialVerifier, DefaultComparator, PairComparator};
pub use config::{CompatMode, UserDbConfig};
pub use database::{DefaultChain, RuleDatabase};
pub use engine::{
    AuthorizeResult, AuthorizeVerdict, Authorizer, PreacctResult, PreacctVerdict, ReloadOutcome,
    UserDb, UserDbMetrics,
};
pub use error::{Result, UserDbError};
pub use table::{hash_name, TableStats, UserTable};
pub use types::{AttributeId, AttributePair, DefaultId, Entry, Operator, PairList, Request};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
