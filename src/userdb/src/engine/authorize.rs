//! Authorization matcher
//!
//! Named entries live in the hash table and `DEFAULT` entries in their own
//! chain, but both are one ordered rule list as far as semantics go. The walk
//! below re-threads them: every named entry remembers the last `DEFAULT`
//! written before it, and is applied right after that `DEFAULT` is visited.
//!
//! ```text
//! users file              walk for "bob"
//! ----------              --------------
//! bob      (FT)           bob#1            no DEFAULT before it
//! DEFAULT  C              C                then bob#2, anchored at C
//! bob      #2             bob#2
//! ```

use super::decision::{AuthorizeResult, AuthorizeVerdict};
use crate::compare::{CredentialVerifier, PairComparator};
use crate::database::RuleDatabase;
use crate::dictionary::attr;
use crate::types::{Entry, PairList, Request};
use tracing::debug;

/// Runs one authorization walk over a database snapshot
pub struct Authorizer<'a> {
    db: &'a RuleDatabase,
    comparator: &'a dyn PairComparator,
    verifier: Option<&'a dyn CredentialVerifier>,
}

impl<'a> Authorizer<'a> {
    pub fn new(db: &'a RuleDatabase, comparator: &'a dyn PairComparator) -> Self {
        Self {
            db,
            comparator,
            verifier: None,
        }
    }

    /// Require a credential match before accepting a named entry
    pub fn with_credential_check(mut self, verifier: &'a dyn CredentialVerifier) -> Self {
        self.verifier = Some(verifier);
        self
    }

    /// Find every entry that applies to the request and merge them in file
    /// order, stopping at the first applied entry without `Fall-Through`.
    pub fn authorize(&self, request: &Request) -> AuthorizeResult {
        let name = request.username();
        let chain = self.db.users().lookup(name);
        let mut out = Outgoing::default();

        let mut user = self.find_user(request, chain, name, 0);
        let user_found = user.is_some();

        // First match written before any DEFAULT. Only one is applied here;
        // later unanchored entries have no DEFAULT to be re-threaded after.
        if let Some(idx) = user {
            let entry = &chain[idx];
            if entry.last_default.is_none() {
                debug!("user {} found before DEFAULT at line {}", entry.name, entry.line);
                out.apply(entry);
                if !entry.fall_through() {
                    return out.finish();
                }
                user = self.find_user(request, chain, name, idx + 1);
            }
        }

        debug!("checking defaults");
        let mut default_found = false;
        for (id, default) in self.db.defaults().iter() {
            if self.comparator.compare(&request.attributes, &default.check) {
                debug!("Matched {} at {}", default.name, default.line);
                default_found = true;
                out.apply(default);
            }

            // User lines written between this DEFAULT and the next one
            while let Some(idx) = user {
                let entry = &chain[idx];
                if entry.last_default != Some(id) {
                    break;
                }
                debug!("found last DEFAULT of line {} at line {}", entry.line, default.line);
                out.apply(entry);
                if !entry.fall_through() {
                    return out.finish();
                }
                user = self.find_user(request, chain, name, idx + 1);
            }

            // Nothing written after a DEFAULT without Fall-Through can fire
            if !default.fall_through() {
                break;
            }
        }

        if user_found || default_found {
            out.finish()
        } else {
            debug!("user {} not found", name);
            AuthorizeResult::not_found()
        }
    }

    /// Position of the next entry at or after `start` that is named `name`,
    /// whose check items hold, and that passes the credential check if one
    /// is configured.
    fn find_user(&self, request: &Request, chain: &[Entry], name: &str, start: usize) -> Option<usize> {
        chain
            .iter()
            .enumerate()
            .skip(start)
            .find(|(_, entry)| {
                if entry.name != name || !self.comparator.compare(&request.attributes, &entry.check) {
                    return false;
                }
                match self.verifier {
                    Some(verifier) => {
                        debug!("Checking credentials of {} at {}", entry.name, entry.line);
                        verifier.verify(request, &entry.check)
                    }
                    None => true,
                }
            })
            .map(|(idx, entry)| {
                debug!("Matched {} at {}", entry.name, entry.line);
                idx
            })
    }
}

#[derive(Default)]
struct Outgoing {
    check: PairList,
    reply: PairList,
}

impl Outgoing {
    fn apply(&mut self, entry: &Entry) {
        self.check.merge(&entry.check);
        self.reply.merge(&entry.reply);
    }

    fn finish(mut self) -> AuthorizeResult {
        self.reply.remove_all(attr::FALL_THROUGH);
        AuthorizeResult {
            verdict: AuthorizeVerdict::Updated,
            check: self.check,
            reply: self.reply,
        }
    }
}
