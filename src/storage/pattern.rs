//! Pattern engine: glob matching and literal-substring search.
//!
//! Shared by both backends so `glob` and `grep` behave identically
//! regardless of the backing store. Glob patterns compile to anchored
//! regular expressions; grep is a plain substring scan with no regex
//! semantics at all.

use crate::{Error, Result};
use regex::Regex;

/// Compiled glob pattern.
///
/// Semantics are segment-wise and case-sensitive: `*` matches within one
/// path segment, `**` matches zero or more whole segments, `?` matches a
/// single character. `*` and `?` never cross a `/`.
#[derive(Debug, Clone)]
pub struct GlobMatcher {
    regex: Regex,
}

impl GlobMatcher {
    /// Compiles a glob pattern.
    ///
    /// # Errors
    ///
    /// Returns [`Error::OperationFailed`] if the translated expression fails
    /// to compile, which indicates a bug in the translation rather than bad
    /// caller input.
    pub fn new(pattern: &str) -> Result<Self> {
        let expr = glob_to_regex(pattern);
        let regex = Regex::new(&expr).map_err(|e| Error::OperationFailed {
            operation: "compile_glob".to_string(),
            cause: format!("pattern '{pattern}': {e}"),
        })?;
        Ok(Self { regex })
    }

    /// Whether a slash-separated path matches the pattern.
    ///
    /// The path is expected to be relative (no leading `/`), as produced by
    /// stripping the search root.
    #[must_use]
    pub fn is_match(&self, path: &str) -> bool {
        self.regex.is_match(path)
    }
}

/// Translates a glob pattern into an anchored regular expression.
fn glob_to_regex(pattern: &str) -> String {
    let segments: Vec<&str> = pattern.split('/').collect();
    let last = segments.len() - 1;

    let mut expr = String::from("^");
    for (i, segment) in segments.iter().enumerate() {
        if *segment == "**" {
            if i == last {
                // Trailing ** swallows any remaining segments.
                expr.push_str(".*");
            } else {
                expr.push_str("(?:[^/]+/)*");
            }
            continue;
        }
        for ch in segment.chars() {
            match ch {
                '*' => expr.push_str("[^/]*"),
                '?' => expr.push_str("[^/]"),
                c => expr.push_str(&regex::escape(&c.to_string())),
            }
        }
        if i != last {
            expr.push('/');
        }
    }
    expr.push('$');
    expr
}

/// Convenience wrapper: compile and match in one call.
///
/// # Errors
///
/// Propagates compilation failures from [`GlobMatcher::new`].
pub fn glob_match(pattern: &str, path: &str) -> Result<bool> {
    Ok(GlobMatcher::new(pattern)?.is_match(path))
}

/// File filter for grep: a glob applied to either the file name or the
/// root-relative path.
///
/// Patterns without a `/` match the file name (so `*.py` selects Python
/// files at any depth); patterns with a `/` match the prefix-relative path
/// with the usual segment-scoped semantics.
#[derive(Debug, Clone)]
pub struct FileFilter {
    matcher: GlobMatcher,
    on_full_path: bool,
}

impl FileFilter {
    /// Compiles a file filter pattern.
    ///
    /// # Errors
    ///
    /// Propagates compilation failures from [`GlobMatcher::new`].
    pub fn new(pattern: &str) -> Result<Self> {
        Ok(Self {
            matcher: GlobMatcher::new(pattern)?,
            on_full_path: pattern.contains('/'),
        })
    }

    /// Whether a file matches, given its root-relative path and file name.
    #[must_use]
    pub fn matches(&self, relative_path: &str, file_name: &str) -> bool {
        if self.on_full_path {
            self.matcher.is_match(relative_path)
        } else {
            self.matcher.is_match(file_name)
        }
    }
}

/// Scans text for lines containing `query` as a literal substring.
///
/// Returns `(line_number, line_text)` pairs with 1-based numbering. The
/// query is not a regular expression; matching is case-sensitive.
#[must_use]
pub fn grep_scan(lines: &[String], query: &str) -> Vec<(usize, String)> {
    lines
        .iter()
        .enumerate()
        .filter(|(_, line)| line.contains(query))
        .map(|(i, line)| (i + 1, line.clone()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    #[test_case("*.py", "a.py", true; "star matches within segment")]
    #[test_case("*.py", "src/a.py", false; "star does not cross separator")]
    #[test_case("**/*.py", "a.py", true; "double star matches zero segments")]
    #[test_case("**/*.py", "src/sub/c.py", true; "double star matches deep paths")]
    #[test_case("src/*.py", "src/a.py", true; "literal segment plus star")]
    #[test_case("src/*.py", "src/sub/c.py", false; "star stops at next segment")]
    #[test_case("src/**", "src/sub/c.py", true; "trailing double star swallows rest")]
    #[test_case("src/**", "src", false; "trailing double star needs a child")]
    #[test_case("a/**/b", "a/b", true; "infix double star matches zero segments")]
    #[test_case("a/**/b", "a/x/y/b", true; "infix double star matches many segments")]
    #[test_case("?.py", "a.py", true; "question matches one character")]
    #[test_case("?.py", "ab.py", false; "question matches exactly one character")]
    #[test_case("?.py", "/.py", false; "question does not match separator")]
    #[test_case("*.PY", "a.py", false; "matching is case sensitive")]
    #[test_case("a+b.txt", "a+b.txt", true; "regex metacharacters are literal")]
    #[test_case("a+b.txt", "aab.txt", false; "plus is not a quantifier")]
    fn test_glob_match(pattern: &str, path: &str, expected: bool) {
        assert_eq!(glob_match(pattern, path).unwrap(), expected);
    }

    #[test]
    fn test_file_filter_basename_when_no_separator() {
        let filter = FileFilter::new("*.py").unwrap();
        assert!(filter.matches("src/sub/c.py", "c.py"));
        assert!(!filter.matches("src/notes.txt", "notes.txt"));
    }

    #[test]
    fn test_file_filter_full_path_when_separator() {
        let filter = FileFilter::new("src/*.py").unwrap();
        assert!(filter.matches("src/a.py", "a.py"));
        assert!(!filter.matches("src/sub/c.py", "c.py"));
    }

    #[test]
    fn test_grep_scan_finds_substring_lines() {
        let lines: Vec<String> = ["match this pattern", "don't match this", "pattern again"]
            .iter()
            .map(ToString::to_string)
            .collect();
        let hits = grep_scan(&lines, "pattern");
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0], (1, "match this pattern".to_string()));
        assert_eq!(hits[1], (3, "pattern again".to_string()));
    }

    #[test]
    fn test_grep_scan_is_literal_not_regex() {
        let lines = vec!["a.c".to_string(), "abc".to_string()];
        let hits = grep_scan(&lines, "a.c");
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].0, 1);
    }

    #[test]
    fn test_grep_scan_empty_result() {
        let lines = vec!["nothing here".to_string()];
        assert!(grep_scan(&lines, "needle").is_empty());
    }
}
