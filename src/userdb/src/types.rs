//! Core users database types

use crate::dictionary::{self, attr};
use crate::error::{Result, UserDbError};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Numeric attribute identifier (vendor in the high 16 bits)
pub type AttributeId = u32;

/// Entry name marking a wildcard rule
pub const DEFAULT_NAME: &str = "DEFAULT";

/// Username used when the request carries none
pub const ANONYMOUS_USER: &str = "NONE";

/// Attribute operator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Operator {
    /// `=` (ambiguous: assignment, or comparison for wire attributes)
    Eq,
    /// `==`
    CmpEq,
    /// `!=`
    Ne,
    /// `>`
    Gt,
    /// `>=`
    Ge,
    /// `<`
    Lt,
    /// `<=`
    Le,
    /// `=~`
    RegEq,
    /// `!~`
    RegNe,
    /// `=*`
    CmpTrue,
    /// `!*`
    CmpFalse,
    /// `:=`
    Set,
    /// `+=`
    Add,
    /// `-=`
    Sub,
}

impl Operator {
    /// Operator tokens, longest first so prefixes never shadow them.
    pub(crate) const TOKENS: &'static [(&'static str, Operator)] = &[
        ("==", Operator::CmpEq),
        ("!=", Operator::Ne),
        (">=", Operator::Ge),
        ("<=", Operator::Le),
        ("=~", Operator::RegEq),
        ("!~", Operator::RegNe),
        ("=*", Operator::CmpTrue),
        ("!*", Operator::CmpFalse),
        (":=", Operator::Set),
        ("+=", Operator::Add),
        ("-=", Operator::Sub),
        ("=", Operator::Eq),
        (">", Operator::Gt),
        ("<", Operator::Lt),
    ];

    /// Textual form as written in rule files
    pub fn as_str(&self) -> &'static str {
        Self::TOKENS
            .iter()
            .find(|(_, op)| op == self)
            .map(|(token, _)| *token)
            .unwrap_or("=")
    }

    /// Whether the operator assigns rather than compares
    pub fn is_assignment(&self) -> bool {
        matches!(self, Operator::Eq | Operator::Set | Operator::Add | Operator::Sub)
    }
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single attribute/operator/value triple
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttributePair {
    /// Numeric attribute id
    pub attribute: AttributeId,

    /// Attribute name as resolved from the dictionary
    pub name: String,

    /// Operator
    pub operator: Operator,

    /// Value, unquoted
    pub value: String,
}

impl AttributePair {
    /// Create a pair from a known attribute id
    pub fn new(attribute: AttributeId, operator: Operator, value: impl Into<String>) -> Self {
        Self {
            attribute,
            name: dictionary::attribute_name(attribute),
            operator,
            value: value.into(),
        }
    }

    /// Create a pair by attribute name
    pub fn named(name: &str, operator: Operator, value: impl Into<String>) -> Result<Self> {
        let attribute = dictionary::attribute_id(name)
            .ok_or_else(|| UserDbError::Configuration(format!("unknown attribute `{}`", name)))?;
        Ok(Self::new(attribute, operator, value))
    }

    /// Interpret the value as a boolean flag (`Yes`, `true`, `1`)
    pub fn is_true(&self) -> bool {
        matches!(
            self.value.to_ascii_lowercase().as_str(),
            "yes" | "true" | "on" | "1"
        )
    }
}

impl fmt::Display for AttributePair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} \"{}\"", self.name, self.operator, self.value)
    }
}

/// Ordered list of attribute pairs
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PairList(Vec<AttributePair>);

impl PairList {
    pub fn new() -> Self {
        Self(Vec::new())
    }

    pub fn push(&mut self, pair: AttributePair) {
        self.0.push(pair);
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, AttributePair> {
        self.0.iter()
    }

    pub(crate) fn iter_mut(&mut self) -> std::slice::IterMut<'_, AttributePair> {
        self.0.iter_mut()
    }

    /// First pair carrying the given attribute
    pub fn find(&self, attribute: AttributeId) -> Option<&AttributePair> {
        self.0.iter().find(|p| p.attribute == attribute)
    }

    /// Value of the first pair carrying the given attribute
    pub fn value_of(&self, attribute: AttributeId) -> Option<&str> {
        self.find(attribute).map(|p| p.value.as_str())
    }

    /// Whether the list carries `Fall-Through = Yes`
    pub fn fall_through(&self) -> bool {
        self.find(attr::FALL_THROUGH).map(|p| p.is_true()).unwrap_or(false)
    }

    /// Remove every pair with the given attribute
    pub fn remove_all(&mut self, attribute: AttributeId) {
        self.0.retain(|p| p.attribute != attribute);
    }

    /// Merge copies of `other` into this list.
    ///
    /// `=` only adds an attribute that is not present yet, `:=` overwrites
    /// the first existing instance, `-=` deletes instances with the same
    /// value, and every other operator appends.
    pub fn merge(&mut self, other: &PairList) {
        for pair in other.iter() {
            let existing = self.0.iter().position(|p| p.attribute == pair.attribute);
            match pair.operator {
                Operator::Eq => {
                    if existing.is_none() {
                        self.0.push(pair.clone());
                    }
                }
                Operator::Set => match existing {
                    Some(idx) => self.0[idx] = pair.clone(),
                    None => self.0.push(pair.clone()),
                },
                Operator::Sub => {
                    self.0
                        .retain(|p| !(p.attribute == pair.attribute && p.value == pair.value));
                }
                _ => self.0.push(pair.clone()),
            }
        }
    }
}

impl From<Vec<AttributePair>> for PairList {
    fn from(pairs: Vec<AttributePair>) -> Self {
        Self(pairs)
    }
}

impl FromIterator<AttributePair> for PairList {
    fn from_iter<I: IntoIterator<Item = AttributePair>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl<'a> IntoIterator for &'a PairList {
    type Item = &'a AttributePair;
    type IntoIter = std::slice::Iter<'a, AttributePair>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

/// Stable handle to an entry of the default chain
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct DefaultId(pub(crate) usize);

impl DefaultId {
    /// Position in the default chain
    pub fn index(&self) -> usize {
        self.0
    }
}

/// One loaded rule: a named user or a `DEFAULT` wildcard
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Entry {
    /// Username, or `DEFAULT`
    pub name: String,

    /// Check items, in file order
    pub check: PairList,

    /// Reply items, in file order
    pub reply: PairList,

    /// Source line (diagnostics only)
    pub line: usize,

    /// Last `DEFAULT` that preceded this entry in the file
    pub(crate) last_default: Option<DefaultId>,
}

impl Entry {
    pub fn new(name: impl Into<String>, line: usize) -> Self {
        Self {
            name: name.into(),
            check: PairList::new(),
            reply: PairList::new(),
            line,
            last_default: None,
        }
    }

    pub fn with_check(mut self, pair: AttributePair) -> Self {
        self.check.push(pair);
        self
    }

    pub fn with_reply(mut self, pair: AttributePair) -> Self {
        self.reply.push(pair);
        self
    }

    /// Whether this is a wildcard entry
    pub fn is_default(&self) -> bool {
        self.name == DEFAULT_NAME
    }

    /// Whether evaluation continues after this entry matched
    pub fn fall_through(&self) -> bool {
        self.reply.fall_through()
    }

    /// The wildcard entry that most recently preceded this one at load time
    pub fn last_default_before_self(&self) -> Option<DefaultId> {
        self.last_default
    }
}

/// Incoming request handed to the matchers
#[derive(Debug, Clone)]
pub struct Request {
    /// Canonical username, if the request carried one
    pub username: Option<String>,

    /// Request attributes
    pub attributes: PairList,

    /// Time the request was received
    pub timestamp: DateTime<Utc>,
}

impl Request {
    /// Create a request for the given user
    pub fn new(username: impl Into<String>) -> Self {
        Self {
            username: Some(username.into()),
            attributes: PairList::new(),
            timestamp: Utc::now(),
        }
    }

    /// Create a request without a username
    pub fn anonymous() -> Self {
        Self {
            username: None,
            attributes: PairList::new(),
            timestamp: Utc::now(),
        }
    }

    /// Add a request attribute by name
    pub fn with_attribute(mut self, name: &str, value: impl Into<String>) -> Result<Self> {
        self.attributes
            .push(AttributePair::named(name, Operator::Eq, value)?);
        Ok(self)
    }

    /// Add an already built request attribute
    pub fn with_pair(mut self, pair: AttributePair) -> Self {
        self.attributes.push(pair);
        self
    }

    pub fn with_timestamp(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = timestamp;
        self
    }

    /// Username used for lookups
    pub fn username(&self) -> &str {
        self.username.as_deref().unwrap_or(ANONYMOUS_USER)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pair(attribute: AttributeId, operator: Operator, value: &str) -> AttributePair {
        AttributePair::new(attribute, operator, value)
    }

    #[test]
    fn test_fall_through_flag() {
        let mut reply = PairList::new();
        assert!(!reply.fall_through());

        reply.push(pair(attr::FALL_THROUGH, Operator::Eq, "Yes"));
        assert!(reply.fall_through());

        let no = PairList::from(vec![pair(attr::FALL_THROUGH, Operator::Eq, "No")]);
        assert!(!no.fall_through());
    }

    #[test]
    fn test_merge_equals_keeps_existing() {
        let mut out = PairList::from(vec![pair(attr::REPLY_MESSAGE, Operator::Eq, "first")]);
        out.merge(&PairList::from(vec![
            pair(attr::REPLY_MESSAGE, Operator::Eq, "second"),
            pair(attr::SESSION_TIMEOUT, Operator::Eq, "60"),
        ]));

        assert_eq!(out.len(), 2);
        assert_eq!(out.value_of(attr::REPLY_MESSAGE), Some("first"));
        assert_eq!(out.value_of(attr::SESSION_TIMEOUT), Some("60"));
    }

    #[test]
    fn test_merge_set_add_sub() {
        let mut out = PairList::from(vec![
            pair(attr::AUTH_TYPE, Operator::Set, "Local"),
            pair(attr::CLASS, Operator::Eq, "a"),
        ]);
        out.merge(&PairList::from(vec![
            pair(attr::AUTH_TYPE, Operator::Set, "Reject"),
            pair(attr::CLASS, Operator::Add, "b"),
        ]));
        assert_eq!(out.value_of(attr::AUTH_TYPE), Some("Reject"));
        assert_eq!(out.iter().filter(|p| p.attribute == attr::CLASS).count(), 2);

        out.merge(&PairList::from(vec![pair(attr::CLASS, Operator::Sub, "a")]));
        let classes: Vec<_> = out
            .iter()
            .filter(|p| p.attribute == attr::CLASS)
            .map(|p| p.value.as_str())
            .collect();
        assert_eq!(classes, vec!["b"]);
    }

    #[test]
    fn test_request_username_defaults_to_none() {
        assert_eq!(Request::anonymous().username(), "NONE");
        assert_eq!(Request::new("bob").username(), "bob");
    }

    #[test]
    fn test_operator_display() {
        assert_eq!(Operator::CmpEq.to_string(), "==");
        assert_eq!(Operator::Add.to_string(), "+=");
        assert!(Operator::Set.is_assignment());
        assert!(!Operator::RegEq.is_assignment());
    }
}
