//! Explicit `optional` detection
//!
//! A line-oriented scan of the raw proto source that records which fields were
//! written with the `optional` qualifier. It does not need the source to link
//! and runs independently of schema resolution.
//!
//! Paths are keyed by the chain of enclosing message names, e.g.
//! `Outer.Inner.nickname`, so a message embedded in many places is recorded
//! once.
//!
//! Brace tracking is per line and does not understand string literals, so a
//! brace inside a quoted option value can confuse it. Fields declared on the
//! same line as their `message` are not seen.

use std::collections::BTreeSet;

/// Set of `<message chain>.<field>` paths declared `optional`
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExplicitOptionalPaths {
    paths: BTreeSet<String>,
}

impl ExplicitOptionalPaths {
    /// Create an empty set
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether `path` was declared optional
    pub fn contains(&self, path: &str) -> bool {
        self.paths.contains(path)
    }

    /// Record `path` as optional
    pub fn insert(&mut self, path: impl Into<String>) {
        self.paths.insert(path.into());
    }

    /// Number of recorded paths
    pub fn len(&self) -> usize {
        self.paths.len()
    }

    /// Whether nothing was recorded
    pub fn is_empty(&self) -> bool {
        self.paths.is_empty()
    }

    /// Recorded paths in sorted order
    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.paths.iter().map(String::as_str)
    }
}

impl<S: Into<String>> FromIterator<S> for ExplicitOptionalPaths {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        Self {
            paths: iter.into_iter().map(Into::into).collect(),
        }
    }
}

/// A message whose body is still open
#[derive(Debug)]
struct OpenMessage<'a> {
    name: &'a str,
    /// Brace depth outside the message body
    depth: usize,
}

/// Scan proto source for fields declared `optional`
pub fn scan(source: &str) -> ExplicitOptionalPaths {
    let mut found = ExplicitOptionalPaths::new();
    let mut open: Vec<OpenMessage<'_>> = Vec::new();
    let mut depth = 0usize;

    for line in source.lines() {
        let line = line.trim();

        // Skip blanks and comment lines before anything else
        if line.is_empty()
            || line.starts_with("//")
            || line.starts_with("/*")
            || line.starts_with('*')
        {
            continue;
        }
        let line = strip_trailing_comment(line);

        if let Some(name) = message_declaration(line) {
            open.push(OpenMessage { name, depth });
        } else if let Some(field) = optional_field(line) {
            if !open.is_empty() {
                let chain: Vec<&str> = open.iter().map(|message| message.name).collect();
                found.insert(format!("{}.{}", chain.join("."), field));
            }
        }

        for c in line.chars() {
            match c {
                '{' => depth += 1,
                '}' => {
                    depth = depth.saturating_sub(1);
                    while open.last().is_some_and(|message| message.depth >= depth) {
                        open.pop();
                    }
                }
                _ => {}
            }
        }
    }

    found
}

/// Drop a trailing `// ...` comment
fn strip_trailing_comment(line: &str) -> &str {
    match line.find("//") {
        Some(index) => line[..index].trim_end(),
        None => line,
    }
}

/// Strip `keyword` plus at least one whitespace character from the front of `line`
fn strip_keyword<'a>(line: &'a str, keyword: &str) -> Option<&'a str> {
    let rest = line.strip_prefix(keyword)?;
    if rest.starts_with(char::is_whitespace) {
        Some(rest.trim_start())
    } else {
        None
    }
}

/// Name declared by a `message Name {` line
fn message_declaration(line: &str) -> Option<&str> {
    let rest = strip_keyword(line, "message")?;
    let name = rest
        .split(|c: char| c == '{' || c.is_whitespace())
        .next()
        .unwrap_or("");
    is_identifier(name).then_some(name)
}

/// Field name of an `optional <type> <name> = N;` line
fn optional_field(line: &str) -> Option<&str> {
    let rest = strip_keyword(line, "optional")?;

    // "type name = N [options];" where type may be dotted
    let mut parts = rest.splitn(2, char::is_whitespace);
    let type_name = parts.next()?;
    let rest = parts.next()?.trim_start();
    if type_name.is_empty() {
        return None;
    }

    let (name, after) = match rest.find('=') {
        Some(index) => (rest[..index].trim(), &rest[index..]),
        None => return None,
    };
    if !after.starts_with('=') || !is_identifier(name) {
        return None;
    }
    Some(name)
}

fn is_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scan_nested_messages() {
        let source = r#"
syntax = "proto3";

message Outer {
  optional string label = 1;
  message Inner {
    optional int32 count = 1;
    string plain = 2;
  }
  Inner inner = 2;
  optional Inner maybe_inner = 3;
}

message Other {
  optional bool flag = 1;
}
"#;
        let paths = scan(source);
        let collected: Vec<_> = paths.iter().collect();
        assert_eq!(
            collected,
            [
                "Other.flag",
                "Outer.Inner.count",
                "Outer.label",
                "Outer.maybe_inner"
            ]
        );
    }

    #[test]
    fn test_scan_pops_only_message_braces() {
        let source = r#"
message Outer {
  oneof choice {
    string a = 1;
    int32 b = 2;
  }
  enum Kind {
    KIND_UNSPECIFIED = 0;
  }
  optional string after = 3;
}
optional string stray = 1;
"#;
        let paths = scan(source);
        assert!(paths.contains("Outer.after"));
        assert_eq!(paths.len(), 1);
    }

    #[test]
    fn test_scan_skips_comments_and_options() {
        let source = r#"
message Settings
{
  // optional string commented = 1;
  /* optional string block = 2; */
  option deprecated = true;
  optional string theme = 3; // optional string trailing = 4;
  optional google.protobuf.Timestamp updated_at=5;
}
"#;
        let paths = scan(source);
        let collected: Vec<_> = paths.iter().collect();
        assert_eq!(collected, ["Settings.theme", "Settings.updated_at"]);
    }

    #[test]
    fn test_scan_single_line_message_is_a_known_gap() {
        let source = r#"
message Tiny { optional string x = 1; }
message Next {
  optional string y = 1;
}
"#;
        let paths = scan(source);
        assert!(!paths.contains("Tiny.x"));
        assert!(paths.contains("Next.y"));
    }

    #[test]
    fn test_optional_field_parsing() {
        assert_eq!(optional_field("optional string name = 1;"), Some("name"));
        assert_eq!(optional_field("optional pkg.Type value=2;"), Some("value"));
        assert_eq!(optional_field("optionalish string name = 1;"), None);
        assert_eq!(optional_field("option java_package = \"x\";"), None);
        assert_eq!(optional_field("optional string;"), None);
    }
}
