//! Users-file parser
//!
//! ```text
//! # comment
//! bob     Auth-Type := Local, NAS-IP-Address == 10.0.0.1
//!         Reply-Message = "Hello, bob",
//!         Fall-Through = Yes
//!
//! DEFAULT Service-Type == Framed-User
//!         Framed-Protocol = PPP
//!
//! $INCLUDE users.d/staff
//! ```
//!
//! An entry starts in column 0 with its name and check items. Indented lines
//! below it hold reply items; a trailing comma means another reply line
//! follows.

use crate::dictionary;
use crate::error::{Result, UserDbError};
use crate::types::{AttributePair, Entry, Operator, PairList};
use std::path::Path;

/// Maximum `$INCLUDE` nesting
const MAX_INCLUDE_DEPTH: usize = 8;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ReplyState {
    /// No reply line seen yet
    Empty,
    /// Last reply line ended with a comma
    Open,
    /// Last reply line ended the list
    Closed,
}

/// Read a rule file, following `$INCLUDE` directives.
pub fn read_rule_file(path: &Path) -> Result<Vec<Entry>> {
    read_rule_file_with(path, &mut |_, _| {})
}

/// Like [`read_rule_file`], handing every file's text to `on_source` (main
/// file and includes, in the order they are read) before it is parsed.
pub fn read_rule_file_with(path: &Path, on_source: &mut dyn FnMut(&Path, &str)) -> Result<Vec<Entry>> {
    read_nested(path, 0, on_source)
}

fn read_nested(path: &Path, depth: usize, on_source: &mut dyn FnMut(&Path, &str)) -> Result<Vec<Entry>> {
    let text = std::fs::read_to_string(path).map_err(|source| UserDbError::Read {
        path: path.display().to_string(),
        source,
    })?;
    on_source(path, &text);
    parse_rules(&text, path, depth, on_source)
}

/// Parse rule text. `origin` names the file in errors and anchors relative
/// `$INCLUDE` paths.
pub fn parse_rule_text(text: &str, origin: &Path) -> Result<Vec<Entry>> {
    parse_rules(text, origin, 0, &mut |_, _| {})
}

fn parse_rules(
    text: &str,
    origin: &Path,
    depth: usize,
    on_source: &mut dyn FnMut(&Path, &str),
) -> Result<Vec<Entry>> {
    let file = origin.display().to_string();
    let mut entries = Vec::new();
    let mut current: Option<Entry> = None;
    let mut state = ReplyState::Empty;

    for (idx, raw) in text.lines().enumerate() {
        let line_no = idx + 1;
        let line = strip_comment(raw).trim_end();
        if line.trim().is_empty() {
            continue;
        }

        let indented = line.starts_with(' ') || line.starts_with('\t');
        if indented {
            let Some(entry) = current.as_mut() else {
                return Err(UserDbError::parse(&file, line_no, "reply item outside of an entry"));
            };
            if state == ReplyState::Closed {
                return Err(UserDbError::parse(
                    &file,
                    line_no,
                    format!(
                        "unexpected reply item for `{}`: previous line has no trailing comma",
                        entry.name
                    ),
                ));
            }
            let (pairs, trailing_comma) = parse_pair_list(line.trim(), &file, line_no)?;
            for pair in pairs {
                entry.reply.push(pair);
            }
            state = if trailing_comma { ReplyState::Open } else { ReplyState::Closed };
            continue;
        }

        if state == ReplyState::Open {
            return Err(UserDbError::parse(
                &file,
                line_no,
                "expected another reply item after trailing comma",
            ));
        }
        if let Some(done) = current.take() {
            entries.push(done);
        }
        state = ReplyState::Empty;

        let (head, rest) = split_first_token(line);
        if head == "$INCLUDE" {
            let target = rest.trim();
            if target.is_empty() {
                return Err(UserDbError::parse(&file, line_no, "$INCLUDE without a file name"));
            }
            if depth + 1 > MAX_INCLUDE_DEPTH {
                return Err(UserDbError::parse(&file, line_no, "$INCLUDE nested too deeply"));
            }
            let base = origin.parent().unwrap_or_else(|| Path::new("."));
            entries.extend(read_nested(&base.join(target), depth + 1, on_source)?);
            continue;
        }

        let mut entry = Entry::new(head, line_no);
        let (checks, trailing_comma) = parse_pair_list(rest.trim(), &file, line_no)?;
        if trailing_comma {
            return Err(UserDbError::parse(
                &file,
                line_no,
                "check items must not end with a comma",
            ));
        }
        entry.check = PairList::from(checks);
        current = Some(entry);
    }

    if state == ReplyState::Open {
        let line = text.lines().count();
        return Err(UserDbError::parse(&file, line, "unexpected end of file after trailing comma"));
    }
    if let Some(done) = current {
        entries.push(done);
    }

    Ok(entries)
}

fn strip_comment(line: &str) -> &str {
    let mut in_quotes = false;
    let mut escaped = false;
    for (idx, ch) in line.char_indices() {
        match ch {
            _ if escaped => escaped = false,
            '\\' if in_quotes => escaped = true,
            '"' => in_quotes = !in_quotes,
            '#' if !in_quotes => return &line[..idx],
            _ => {}
        }
    }
    line
}

fn split_first_token(line: &str) -> (&str, &str) {
    match line.find(char::is_whitespace) {
        Some(idx) => (&line[..idx], &line[idx..]),
        None => (line, ""),
    }
}

/// Parse `Attr op value, Attr op value[,]`. Returns the pairs and whether
/// the list ended with a comma.
fn parse_pair_list(text: &str, file: &str, line: usize) -> Result<(Vec<AttributePair>, bool)> {
    let mut cursor = Cursor::new(text);
    let mut pairs = Vec::new();
    let mut trailing_comma = false;

    loop {
        cursor.skip_whitespace();
        if cursor.at_end() {
            break;
        }
        trailing_comma = false;

        let name = cursor.take_while(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'));
        if name.is_empty() {
            return Err(UserDbError::parse(
                file,
                line,
                format!("expected attribute name at `{}`", cursor.rest()),
            ));
        }
        let attribute = dictionary::attribute_id(name)
            .ok_or_else(|| UserDbError::parse(file, line, format!("unknown attribute `{}`", name)))?;

        cursor.skip_whitespace();
        let operator = cursor
            .take_operator()
            .ok_or_else(|| UserDbError::parse(file, line, format!("expected operator after `{}`", name)))?;

        cursor.skip_whitespace();
        let value = cursor
            .take_value()
            .map_err(|message| UserDbError::parse(file, line, message))?;

        pairs.push(AttributePair {
            attribute,
            name: dictionary::attribute_name(attribute),
            operator,
            value,
        });

        cursor.skip_whitespace();
        if cursor.eat(',') {
            trailing_comma = true;
            continue;
        }
        if !cursor.at_end() {
            return Err(UserDbError::parse(
                file,
                line,
                format!("expected comma or end of line at `{}`", cursor.rest()),
            ));
        }
    }

    Ok((pairs, trailing_comma))
}

struct Cursor<'a> {
    text: &'a str,
    pos: usize,
}

impl<'a> Cursor<'a> {
    fn new(text: &'a str) -> Self {
        Self { text, pos: 0 }
    }

    fn rest(&self) -> &'a str {
        &self.text[self.pos..]
    }

    fn at_end(&self) -> bool {
        self.pos >= self.text.len()
    }

    fn peek(&self) -> Option<char> {
        self.rest().chars().next()
    }

    fn eat(&mut self, expected: char) -> bool {
        if self.peek() == Some(expected) {
            self.pos += expected.len_utf8();
            true
        } else {
            false
        }
    }

    fn skip_whitespace(&mut self) {
        self.take_while(char::is_whitespace);
    }

    fn take_while(&mut self, pred: impl Fn(char) -> bool) -> &'a str {
        let start = self.pos;
        while let Some(c) = self.peek() {
            if !pred(c) {
                break;
            }
            self.pos += c.len_utf8();
        }
        &self.text[start..self.pos]
    }

    fn take_operator(&mut self) -> Option<Operator> {
        let rest = self.rest();
        let (token, op) = Operator::TOKENS
            .iter()
            .find(|(token, _)| rest.starts_with(token))?;
        self.pos += token.len();
        Some(*op)
    }

    fn take_value(&mut self) -> std::result::Result<String, String> {
        if !self.eat('"') {
            let bare = self.take_while(|c| c != ',' && !c.is_whitespace());
            if bare.is_empty() {
                return Err("expected value".to_string());
            }
            return Ok(bare.to_string());
        }

        let mut value = String::new();
        loop {
            let Some(c) = self.peek() else {
                return Err("unterminated quoted string".to_string());
            };
            self.pos += c.len_utf8();
            match c {
                '"' => return Ok(value),
                '\\' => {
                    let Some(escaped) = self.peek() else {
                        return Err("unterminated quoted string".to_string());
                    };
                    self.pos += escaped.len_utf8();
                    value.push(match escaped {
                        'n' => '\n',
                        't' => '\t',
                        'r' => '\r',
                        other => other,
                    });
                }
                other => value.push(other),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dictionary::attr;

    fn parse(text: &str) -> Result<Vec<Entry>> {
        parse_rule_text(text, Path::new("users"))
    }

    #[test]
    fn test_parse_entry_with_checks_and_replies() {
        let entries = parse(
            "bob  Auth-Type := Local, NAS-Port >= 10\n\
             \tReply-Message = \"Hello, bob\",\n\
             \tFall-Through = Yes\n",
        )
        .unwrap();

        assert_eq!(entries.len(), 1);
        let bob = &entries[0];
        assert_eq!(bob.name, "bob");
        assert_eq!(bob.line, 1);
        assert_eq!(bob.check.len(), 2);
        assert_eq!(bob.check.find(attr::NAS_PORT).unwrap().operator, Operator::Ge);
        assert_eq!(bob.reply.value_of(attr::REPLY_MESSAGE), Some("Hello, bob"));
        assert!(bob.fall_through());
    }

    #[test]
    fn test_parse_multiple_entries_in_order() {
        let entries = parse(
            "# leading comment\n\
             DEFAULT Service-Type == Framed-User\n\
             \tFramed-Protocol = PPP, Fall-Through = Yes\n\
             \n\
             alice\n\
             \tSession-Timeout = 3600   # trailing comment\n\
             DEFAULT\n",
        )
        .unwrap();

        let names: Vec<_> = entries.iter().map(|e| e.name.as_str()).collect();
        assert_eq!(names, vec!["DEFAULT", "alice", "DEFAULT"]);
        assert_eq!(entries[0].reply.len(), 2);
        assert_eq!(entries[1].line, 5);
        assert!(entries[1].check.is_empty());
        assert!(entries[2].reply.is_empty());
    }

    #[test]
    fn test_quoted_values_and_escapes() {
        let entries = parse("carol Class == \"a,b # not a comment\"\n\tReply-Message = \"say \\\"hi\\\"\"\n").unwrap();
        assert_eq!(entries[0].check.value_of(attr::CLASS), Some("a,b # not a comment"));
        assert_eq!(entries[0].reply.value_of(attr::REPLY_MESSAGE), Some("say \"hi\""));
    }

    #[test]
    fn test_unknown_attribute_is_an_error() {
        let err = parse("bob Bogus-Attribute == 1\n").unwrap_err();
        assert!(matches!(err, UserDbError::Parse { line: 1, .. }));
    }

    #[test]
    fn test_reply_without_entry_is_an_error() {
        assert!(parse("\tReply-Message = \"orphan\"\n").is_err());
    }

    #[test]
    fn test_reply_after_closed_list_is_an_error() {
        let err = parse("bob\n\tClass = a\n\tClass = b\n").unwrap_err();
        assert!(matches!(err, UserDbError::Parse { line: 3, .. }));
    }

    #[test]
    fn test_dangling_comma_is_an_error() {
        assert!(parse("bob\n\tClass = a,\n").is_err());
        assert!(parse("bob\n\tClass = a,\nalice\n").is_err());
        assert!(parse("bob Class == a,\n").is_err());
    }

    #[test]
    fn test_missing_operator_or_value() {
        assert!(parse("bob Class\n").is_err());
        assert!(parse("bob Class ==\n").is_err());
        assert!(parse("bob Class == \"open\n").is_err());
    }

    #[test]
    fn test_include_directive() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("staff"), "carol\n\tClass = staff\n").unwrap();
        let main = dir.path().join("users");
        std::fs::write(&main, "alice\n$INCLUDE staff\nDEFAULT\n").unwrap();

        let entries = read_rule_file(&main).unwrap();
        let names: Vec<_> = entries.iter().map(|e| e.name.as_str()).collect();
        assert_eq!(names, vec!["alice", "carol", "DEFAULT"]);
    }

    #[test]
    fn test_sources_are_reported_in_read_order() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("staff"), "carol\n").unwrap();
        let main = dir.path().join("users");
        std::fs::write(&main, "alice\n$INCLUDE staff\n").unwrap();

        let mut seen = Vec::new();
        read_rule_file_with(&main, &mut |path, text| {
            seen.push((path.file_name().unwrap().to_string_lossy().into_owned(), text.to_string()))
        })
        .unwrap();

        assert_eq!(
            seen,
            vec![
                ("users".to_string(), "alice\n$INCLUDE staff\n".to_string()),
                ("staff".to_string(), "carol\n".to_string()),
            ]
        );
    }

    #[test]
    fn test_recursive_include_is_bounded() {
        let dir = tempfile::tempdir().unwrap();
        let main = dir.path().join("users");
        std::fs::write(&main, "$INCLUDE users\n").unwrap();

        assert!(read_rule_file(&main).is_err());
    }

    #[test]
    fn test_missing_file() {
        let err = read_rule_file(Path::new("/nonexistent/users")).unwrap_err();
        assert!(matches!(err, UserDbError::Read { .. }));
    }
}
