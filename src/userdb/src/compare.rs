//! Check-item comparison and credential verification

use crate::dictionary::attr;
use crate::types::{AttributePair, Operator, PairList, Request};
use dashmap::DashMap;
use regex::Regex;
use std::cmp::Ordering;
use tracing::warn;

/// Evaluates an entry's check items against request attributes
pub trait PairComparator: Send + Sync {
    /// True when every check item holds for the request
    fn compare(&self, request: &PairList, check: &PairList) -> bool;
}

/// Secondary password check used in credential collision mode
pub trait CredentialVerifier: Send + Sync {
    /// True when the request's credentials satisfy the entry's check items
    fn verify(&self, request: &Request, check: &PairList) -> bool;
}

/// Default comparison semantics for users-file check items
///
/// Assignments (`=`, `:=`, `+=`, `-=`) are configuration, not conditions,
/// and always hold. Comparisons use the first request instance of the
/// attribute; integers compare numerically, everything else lexically.
#[derive(Default)]
pub struct DefaultComparator {
    /// Compiled `=~` / `!~` patterns
    regex_cache: DashMap<String, Regex>,
}

impl DefaultComparator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Evaluate a single check item
    pub fn compare_pair(&self, request: &PairList, check: &AttributePair) -> bool {
        if check.operator.is_assignment() {
            return true;
        }

        let actual = request.find(check.attribute);
        let Some(actual) = actual else {
            return check.operator == Operator::CmpFalse;
        };

        match check.operator {
            Operator::CmpTrue => true,
            Operator::CmpFalse => false,
            Operator::RegEq => self.regex_matches(&check.value, &actual.value).unwrap_or(false),
            Operator::RegNe => self
                .regex_matches(&check.value, &actual.value)
                .map(|matched| !matched)
                .unwrap_or(false),
            op => {
                let ordering = compare_values(&actual.value, &check.value);
                match op {
                    Operator::CmpEq => ordering == Ordering::Equal,
                    Operator::Ne => ordering != Ordering::Equal,
                    Operator::Gt => ordering == Ordering::Greater,
                    Operator::Ge => ordering != Ordering::Less,
                    Operator::Lt => ordering == Ordering::Less,
                    Operator::Le => ordering != Ordering::Greater,
                    _ => false,
                }
            }
        }
    }

    fn regex_matches(&self, pattern: &str, value: &str) -> Option<bool> {
        if let Some(re) = self.regex_cache.get(pattern) {
            return Some(re.is_match(value));
        }

        match Regex::new(pattern) {
            Ok(re) => {
                let matched = re.is_match(value);
                self.regex_cache.insert(pattern.to_string(), re);
                Some(matched)
            }
            Err(e) => {
                warn!("Invalid regular expression `{}`: {}", pattern, e);
                None
            }
        }
    }
}

impl PairComparator for DefaultComparator {
    fn compare(&self, request: &PairList, check: &PairList) -> bool {
        check.iter().all(|item| self.compare_pair(request, item))
    }
}

fn compare_values(actual: &str, expected: &str) -> Ordering {
    match (actual.parse::<i64>(), expected.parse::<i64>()) {
        (Ok(a), Ok(b)) => a.cmp(&b),
        _ => actual.cmp(expected),
    }
}

/// Compares the request's `User-Password` with the entry's
/// `Cleartext-Password` or `User-Password` check item.
#[derive(Debug, Default, Clone, Copy)]
pub struct CleartextPasswordVerifier;

impl CredentialVerifier for CleartextPasswordVerifier {
    fn verify(&self, request: &Request, check: &PairList) -> bool {
        let Some(supplied) = request.attributes.value_of(attr::USER_PASSWORD) else {
            return false;
        };

        check
            .iter()
            .filter(|p| p.attribute == attr::CLEARTEXT_PASSWORD || p.attribute == attr::USER_PASSWORD)
            .any(|p| p.value == supplied)
    }
}
