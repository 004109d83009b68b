//! Rule loading: parse, normalize operators, and split into the hash table
//! and the default chain.

use crate::config::{CompatMode, UserDbConfig};
use crate::database::{DefaultChain, RuleDatabase};
use crate::dictionary::{attr, is_local_attribute};
use crate::error::Result;
use crate::parser;
use crate::table::UserTable;
use crate::types::{Entry, Operator};
use std::path::Path;
use tracing::{debug, info, warn};

/// Rewrite ambiguous `=` check items.
///
/// Wire and vendor attributes always become `==`. Local attributes become
/// `+=` in Cistron mode (except `Hint` and `Huntgroup-Name`, which become
/// `==`) and are left alone otherwise. Running it twice changes nothing.
pub fn normalize_check_items(entry: &mut Entry, compat: CompatMode, origin: &str) {
    for pair in entry.check.iter_mut() {
        if pair.operator != Operator::Eq {
            continue;
        }

        if !is_local_attribute(pair.attribute) {
            if compat == CompatMode::None {
                warn!(
                    "[{}]:{} Changing '{} =' to '{} ==' for comparing RADIUS attribute in check item list for user {}",
                    origin, entry.line, pair.name, pair.name, entry.name
                );
            } else {
                debug!("Changing '{} =' to '{} =='", pair.name, pair.name);
            }
            pair.operator = Operator::CmpEq;
            continue;
        }

        if compat == CompatMode::Cistron {
            if pair.attribute != attr::HINT && pair.attribute != attr::HUNTGROUP_NAME {
                debug!("Changing '{} =' to '{} +='", pair.name, pair.name);
                pair.operator = Operator::Add;
            } else {
                debug!("Changing '{} =' to '{} =='", pair.name, pair.name);
                pair.operator = Operator::CmpEq;
            }
        }
    }
}

/// Warn about server configuration items placed on reply lines
fn lint_reply_items(entry: &Entry, origin: &str) {
    for pair in entry.reply.iter() {
        if is_local_attribute(pair.attribute) && pair.attribute > 1000 {
            warn!(
                "[{}]:{} Check item \"{}\" found in reply item list for user \"{}\". \
                 This attribute MUST go on the first line with the other check items",
                origin, entry.line, pair.name, entry.name
            );
        }
    }
}

/// Read and normalize a rule file, keeping file order. Every byte the
/// parser consumes, includes too, is fed to `digest`.
pub fn load_entries(path: &Path, compat: CompatMode, digest: &mut blake3::Hasher) -> Result<Vec<Entry>> {
    info!("Reading {}", path.display());
    let origin = path.display().to_string();

    let mut entries = parser::read_rule_file_with(path, &mut |_, text| {
        digest.update(text.as_bytes());
    })?;
    for entry in &mut entries {
        if compat == CompatMode::Cistron {
            debug!("[{}]:{} Cistron compatibility checks for entry {}", origin, entry.line, entry.name);
        }
        normalize_check_items(entry, compat, &origin);
        lint_reply_items(entry, &origin);
    }

    Ok(entries)
}

/// Split file-ordered entries into the hash table and the default chain,
/// recording on every named entry the last `DEFAULT` seen before it.
pub fn partition(entries: Vec<Entry>, bucket_count: usize) -> Result<(UserTable, DefaultChain)> {
    let mut table = UserTable::with_buckets(bucket_count)?;
    let mut defaults = DefaultChain::new();
    let mut last_default = None;

    for mut entry in entries {
        if entry.is_default() {
            last_default = Some(defaults.push(entry));
        } else {
            entry.last_default = last_default;
            table.insert(entry);
        }
    }

    info!(
        users = table.len(),
        defaults = defaults.len(),
        "Loaded {} users and {} defaults",
        table.len(),
        defaults.len()
    );

    Ok((table, defaults))
}

/// Load the accounting rules: same grammar, kept as one flat list
pub fn load_acct_entries(path: &Path, compat: CompatMode, digest: &mut blake3::Hasher) -> Result<Vec<Entry>> {
    let entries = load_entries(path, compat, digest)?;
    for entry in &entries {
        if entry.reply.iter().any(|p| p.attribute != attr::FALL_THROUGH) {
            warn!(
                "[{}]:{} Reply items other than Fall-Through in accounting entry {} are ignored",
                path.display(),
                entry.line,
                entry.name
            );
        }
    }
    Ok(entries)
}

/// Build a complete database from the configured files.
///
/// Nothing is returned unless every file loaded, so a failure can never
/// leave a partially built database behind.
pub fn build_database(config: &UserDbConfig) -> Result<RuleDatabase> {
    let mut digest = blake3::Hasher::new();

    let acct_users = match &config.acct_users_file {
        Some(path) => load_acct_entries(path, config.compat, &mut digest)?,
        None => Vec::new(),
    };

    let entries = load_entries(&config.users_file, config.compat, &mut digest)?;
    let (users, defaults) = partition(entries, config.hash_size)?;

    let db = RuleDatabase::new(users, defaults, acct_users)
        .with_fingerprint(digest.finalize().to_hex().to_string());

    if config.stats {
        db.table_stats().log();
    }

    Ok(db)
}
