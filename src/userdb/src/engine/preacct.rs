//! Pre-accounting matcher over the flat accounting rule list

use super::decision::{PreacctResult, PreacctVerdict};
use crate::compare::PairComparator;
use crate::database::RuleDatabase;
use crate::types::{PairList, Request, DEFAULT_NAME};
use tracing::debug;

/// Walk the accounting entries in file order, merging every entry named
/// after the user or `DEFAULT` whose check items hold, until one without
/// `Fall-Through`.
pub fn preaccount(db: &RuleDatabase, comparator: &dyn PairComparator, request: &Request) -> PreacctResult {
    let name = request.username();
    let mut check = PairList::new();
    let mut reply = PairList::new();
    let mut found = false;

    for entry in db.acct_users() {
        if entry.name != name && entry.name != DEFAULT_NAME {
            continue;
        }
        if !comparator.compare(&request.attributes, &entry.check) {
            continue;
        }

        debug!("acct_users: Matched {} at {}", entry.name, entry.line);
        found = true;
        check.merge(&entry.check);
        reply.merge(&entry.reply);

        if !entry.fall_through() {
            break;
        }
    }

    PreacctResult {
        verdict: if found { PreacctVerdict::Ok } else { PreacctVerdict::Noop },
        check,
        reply,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compare::DefaultComparator;
    use crate::dictionary::attr;
    use crate::parser::parse_rule_text;
    use crate::table::UserTable;
    use crate::database::DefaultChain;
    use std::path::Path;

    fn database(text: &str) -> RuleDatabase {
        let acct = parse_rule_text(text, Path::new("acct_users")).unwrap();
        RuleDatabase::new(UserTable::with_buckets(1).unwrap(), DefaultChain::new(), acct)
    }

    fn check_values(result: &PreacctResult) -> Vec<&str> {
        result
            .check
            .iter()
            .filter(|p| p.attribute == attr::CLASS)
            .map(|p| p.value.as_str())
            .collect()
    }

    #[test]
    fn test_default_then_user_in_file_order() {
        let db = database(
            "DEFAULT Class += default\n\tFall-Through = Yes\n\
             alice Class += alice\n\
             DEFAULT Class += late\n",
        );
        let cmp = DefaultComparator::new();

        let result = preaccount(&db, &cmp, &Request::new("alice"));
        assert_eq!(result.verdict, PreacctVerdict::Ok);
        assert_eq!(check_values(&result), vec!["default", "alice"]);
    }

    #[test]
    fn test_other_users_are_skipped() {
        let db = database("carol Class += carol\nDEFAULT Class += any\n");
        let cmp = DefaultComparator::new();

        let result = preaccount(&db, &cmp, &Request::new("alice"));
        assert_eq!(check_values(&result), vec!["any"]);
    }

    #[test]
    fn test_no_match_is_noop() {
        let db = database("DEFAULT Acct-Status-Type == Start\n\tFall-Through = Yes\n");
        let cmp = DefaultComparator::new();

        let request = Request::new("alice").with_attribute("Acct-Status-Type", "Stop").unwrap();
        assert_eq!(preaccount(&db, &cmp, &request).verdict, PreacctVerdict::Noop);
    }
}
