//! Matcher verdicts and outgoing attribute sets

use crate::types::PairList;
use serde::{Deserialize, Serialize};

/// Authorization verdict
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuthorizeVerdict {
    /// At least one entry matched; apply the outgoing sets
    Updated,
    /// No entry applies to this request
    NotFound,
}

/// Result of an authorization walk
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthorizeResult {
    pub verdict: AuthorizeVerdict,

    /// Merged check items of every matched entry ("config items")
    pub check: PairList,

    /// Merged reply items of every matched entry, `Fall-Through` removed
    pub reply: PairList,
}

impl AuthorizeResult {
    pub(crate) fn not_found() -> Self {
        Self {
            verdict: AuthorizeVerdict::NotFound,
            check: PairList::new(),
            reply: PairList::new(),
        }
    }

    pub fn is_updated(&self) -> bool {
        self.verdict == AuthorizeVerdict::Updated
    }
}

/// Pre-accounting verdict
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PreacctVerdict {
    /// At least one accounting entry matched
    Ok,
    /// Nothing matched; hand over to the next module
    Noop,
}

/// Result of a pre-accounting walk
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PreacctResult {
    pub verdict: PreacctVerdict,
    pub check: PairList,
    pub reply: PairList,
}

impl PreacctResult {
    pub fn is_ok(&self) -> bool {
        self.verdict == PreacctVerdict::Ok
    }
}
