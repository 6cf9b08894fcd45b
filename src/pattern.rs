//! Pattern classification and path matching.
//!
//! A user-supplied pattern token is classified exactly once into a glob,
//! a regular expression, or a bare extension filter. Matching always runs
//! against the full root-relative path with `/` separators, never against
//! the basename alone.

use globset::{GlobBuilder, GlobMatcher};
use regex::Regex;

use crate::errors::PrinError;

/// Kind of a pattern token.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PatternKind {
    Glob,
    Regex,
    /// A bare alphanumeric/dot token such as `md` or `.py`.
    Extension,
}

impl std::fmt::Display for PatternKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PatternKind::Glob => write!(f, "glob"),
            PatternKind::Regex => write!(f, "regex"),
            PatternKind::Extension => write!(f, "extension"),
        }
    }
}

/// Classify a pattern token.
///
/// The empty string is a glob matching everything. Classification is pure
/// and never fails: anything unclassifiable degrades to a glob.
///
/// # Examples
///
/// ```
/// use prin::pattern::{classify, PatternKind};
///
/// assert_eq!(classify("md"), PatternKind::Extension);
/// assert_eq!(classify("**/*.rs"), PatternKind::Glob);
/// assert_eq!(classify(r"^test_.*\.py$"), PatternKind::Regex);
/// ```
pub fn classify(token: &str) -> PatternKind {
    if token.is_empty() {
        return PatternKind::Glob;
    }
    if is_bare_extension(token) {
        return PatternKind::Extension;
    }
    if has_glob_metachars(token) && !has_regex_signals(token) {
        PatternKind::Glob
    } else {
        PatternKind::Regex
    }
}

fn is_bare_extension(token: &str) -> bool {
    token.chars().all(|c| c.is_ascii_alphanumeric() || c == '.')
        && token.chars().any(|c| c.is_ascii_alphanumeric())
}

fn has_glob_metachars(token: &str) -> bool {
    token.contains(['*', '?', '['])
        || (token.contains('{') && token.contains(',') && token.contains('}'))
}

/// Scan for constructs only a regular expression would use.
fn has_regex_signals(token: &str) -> bool {
    if token.starts_with('^') {
        return true;
    }

    let chars: Vec<char> = token.chars().collect();
    let mut i = 0;
    while i < chars.len() {
        let c = chars[i];
        match c {
            '\\' => {
                let Some(&next) = chars.get(i + 1) else {
                    return false;
                };
                if next.is_ascii_digit() && next != '0' {
                    return true;
                }
                if "dDsSwWbBAzZ".contains(next) {
                    return true;
                }
                if (next == 'p' || next == 'P') && chars.get(i + 2) == Some(&'{') {
                    return true;
                }
                if ".^$|?*+()[]{}".contains(next) {
                    return true;
                }
                i += 2;
                continue;
            }
            '$' if i + 1 == chars.len() => return true,
            '|' => return true,
            '(' => return true,
            '{' if is_quantifier(&chars[i + 1..]) => return true,
            _ => {}
        }
        i += 1;
    }
    false
}

/// `{m}`, `{m,}`, `{,n}` or `{m,n}` starting right after the opening brace.
fn is_quantifier(rest: &[char]) -> bool {
    let Some(close) = rest.iter().position(|&c| c == '}') else {
        return false;
    };
    let body = &rest[..close];
    if body.is_empty() || !body.iter().all(|c| c.is_ascii_digit() || *c == ',') {
        return false;
    }
    let commas = body.iter().filter(|&&c| c == ',').count();
    commas <= 1 && body.iter().any(|c| c.is_ascii_digit())
}

/// Normalize an extension argument (`md`, `.md`, `*.md`) to its bare form.
///
/// Rejects empty values and values containing a path separator.
pub fn normalize_extension(value: &str) -> Result<String, PrinError> {
    let value = value.trim();
    if value.is_empty() || value.contains('/') || value.contains('\\') {
        return Err(PrinError::InvalidPattern {
            pattern: value.to_string(),
            message: "extension cannot be empty or contain a path separator".into(),
        });
    }
    let bare = value
        .strip_prefix("*.")
        .or_else(|| value.strip_prefix('.'))
        .unwrap_or(value);
    if bare.is_empty() {
        return Err(PrinError::InvalidPattern {
            pattern: value.to_string(),
            message: "extension cannot be empty".into(),
        });
    }
    Ok(bare.to_string())
}

/// Positive suffix filter on the final path segment.
///
/// `md` behaves like the glob `*.md*`, so it accepts `notes.mdx` too.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtensionFilter {
    ext: String,
}

impl ExtensionFilter {
    pub fn new(value: &str) -> Result<Self, PrinError> {
        Ok(Self {
            ext: normalize_extension(value)?,
        })
    }

    pub fn extension(&self) -> &str {
        &self.ext
    }

    /// Test the final segment of a `/`-separated path.
    pub fn matches(&self, path: &str) -> bool {
        let name = basename(path);
        let needle = format!(".{}", self.ext);
        name.contains(&needle)
    }
}

/// A compiled pattern, ready to test root-relative paths.
#[derive(Debug, Clone)]
pub enum PathMatcher {
    /// The empty pattern.
    All,
    Glob(GlobMatcher),
    Regex(Regex),
    Extension {
        token: String,
        filter: ExtensionFilter,
    },
}

impl PathMatcher {
    /// Compile a pattern token. Never fails: an invalid regex degrades to a
    /// glob, and an invalid glob degrades to a literal-substring regex.
    pub fn compile(token: &str) -> Self {
        if token.is_empty() {
            return PathMatcher::All;
        }
        match classify(token) {
            PatternKind::Extension => match ExtensionFilter::new(token) {
                Ok(filter) => PathMatcher::Extension {
                    token: token.trim_start_matches('.').to_string(),
                    filter,
                },
                Err(_) => Self::glob_or_literal(token),
            },
            PatternKind::Regex => match Regex::new(token) {
                Ok(re) => PathMatcher::Regex(re),
                Err(e) => {
                    tracing::debug!(pattern = token, error = %e, "regex failed to compile, using glob");
                    Self::glob_or_literal(token)
                }
            },
            PatternKind::Glob => Self::glob_or_literal(token),
        }
    }

    fn glob_or_literal(token: &str) -> Self {
        let anchored = if token.contains('/') || token.starts_with("**") {
            token.to_string()
        } else {
            format!("**/{token}")
        };
        match GlobBuilder::new(&anchored).literal_separator(true).build() {
            Ok(glob) => PathMatcher::Glob(glob.compile_matcher()),
            Err(e) => {
                tracing::debug!(pattern = token, error = %e, "glob failed to compile, using literal");
                match Regex::new(&regex::escape(token)) {
                    Ok(re) => PathMatcher::Regex(re),
                    Err(_) => PathMatcher::All,
                }
            }
        }
    }

    pub fn kind(&self) -> PatternKind {
        match self {
            PathMatcher::All | PathMatcher::Glob(_) => PatternKind::Glob,
            PathMatcher::Regex(_) => PatternKind::Regex,
            PathMatcher::Extension { .. } => PatternKind::Extension,
        }
    }

    /// Test a root-relative, `/`-separated path.
    pub fn is_match(&self, rel_path: &str) -> bool {
        match self {
            PathMatcher::All => true,
            PathMatcher::Glob(glob) => glob.is_match(rel_path),
            PathMatcher::Regex(re) => re.is_match(rel_path),
            PathMatcher::Extension { token, filter } => {
                basename(rel_path) == token || filter.matches(rel_path)
            }
        }
    }
}

/// Final segment of a `/`-separated path.
pub(crate) fn basename(path: &str) -> &str {
    path.trim_end_matches('/')
        .rsplit('/')
        .next()
        .unwrap_or(path)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_is_match_all_glob() {
        assert_eq!(classify(""), PatternKind::Glob);
        assert!(PathMatcher::compile("").is_match("any/thing.rs"));
    }

    #[test]
    fn test_bare_extension() {
        assert_eq!(classify("md"), PatternKind::Extension);
        assert_eq!(classify(".py"), PatternKind::Extension);
        assert_eq!(classify("a.py"), PatternKind::Extension);
        assert_eq!(classify("test_x"), PatternKind::Regex);
    }

    #[test]
    fn test_regex_signals() {
        for tok in [
            "^foo",
            "foo$",
            "foo|bar",
            "a{2}",
            "a{2,}",
            "a{,3}",
            "a{2,4}",
            "(?=foo)",
            r"(a)\1",
            r"\d",
            r"\W",
            r"\p{L}",
            r"file\.txt",
            r"^test_.*\.py$",
            "foo(bar|baz)qux",
        ] {
            assert_eq!(classify(tok), PatternKind::Regex, "{tok}");
        }
    }

    #[test]
    fn test_common_globs() {
        for tok in [
            "*.py",
            "src/*/test?.txt",
            "[0-9].csv",
            "**/*.md",
            "foo.*",
            "**/foo*bar.txt",
            "*.{rs,toml}",
        ] {
            assert_eq!(classify(tok), PatternKind::Glob, "{tok}");
        }
    }

    #[test]
    fn test_glob_matches_full_relative_path() {
        let m = PathMatcher::compile("*.py");
        assert!(m.is_match("main.py"));
        assert!(m.is_match("src/pkg/main.py"));
        assert!(!m.is_match("src/main.rs"));

        let anchored = PathMatcher::compile("src/*.py");
        assert!(anchored.is_match("src/a.py"));
        assert!(!anchored.is_match("lib/src/a.py"));
        assert!(!anchored.is_match("src/deep/a.py"));
    }

    #[test]
    fn test_regex_searches_path() {
        let m = PathMatcher::compile(r"^test_.*\.py$");
        assert!(m.is_match("test_unit.py"));
        assert!(!m.is_match("src/test_unit.py"));

        let unanchored = PathMatcher::compile(r"test_.*\.py$");
        assert!(unanchored.is_match("src/test_helper.py"));
    }

    #[test]
    fn test_invalid_regex_degrades() {
        let m = PathMatcher::compile("foo(");
        assert!(m.is_match("foo("));
        assert!(!m.is_match("bar"));
    }

    #[test]
    fn test_extension_filter_is_suffix_aware() {
        let f = ExtensionFilter::new("md").unwrap();
        assert!(f.matches("docs/notes.md"));
        assert!(f.matches("notes.mdx"));
        assert!(!f.matches("notes.txt"));
        assert!(!f.matches("md/notes.txt"));
    }

    #[test]
    fn test_normalize_extension() {
        assert_eq!(normalize_extension("ext").unwrap(), "ext");
        assert_eq!(normalize_extension(".ext").unwrap(), "ext");
        assert_eq!(normalize_extension("*.ext").unwrap(), "ext");
        assert!(normalize_extension("").is_err());
        assert!(normalize_extension("like/this.ext").is_err());
    }

    #[test]
    fn test_extension_pattern_matches_exact_name() {
        let m = PathMatcher::compile("a.py");
        assert_eq!(m.kind(), PatternKind::Extension);
        assert!(m.is_match("a.py"));
        assert!(!m.is_match("b.py"));
    }
}
