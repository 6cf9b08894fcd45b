//! Exclusion categories and the per-entry filter pipeline.
//!
//! Filtering happens in two stages. [`FilterPipeline::path_verdict`] looks
//! only at the entry's relative path and is cheap enough to run for every
//! candidate during a walk (it also drives directory pruning).
//! [`FilterPipeline::should_print`] adds the content checks (binary,
//! emptiness) and is run once per candidate before printing.

use globset::{Glob, GlobMatcher};
use smallvec::SmallVec;

use crate::context::{Context, DepthLimits};
use crate::defaults;
use crate::errors::PrinError;
use crate::pattern::{basename, ExtensionFilter, PathMatcher};
use crate::source::{Entry, EntryKind};

/// A named, independently toggleable bucket of default exclusions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Category {
    Hidden,
    Tests,
    Lock,
    Binary,
    Docs,
    /// Always on unless `--no-exclude`.
    BuildArtifacts,
    Dependencies,
    Config,
    Scripts,
    Stylesheets,
}

impl Category {
    pub const ALL: [Category; 10] = [
        Category::Hidden,
        Category::Tests,
        Category::Lock,
        Category::Binary,
        Category::Docs,
        Category::BuildArtifacts,
        Category::Dependencies,
        Category::Config,
        Category::Scripts,
        Category::Stylesheets,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Category::Hidden => "hidden",
            Category::Tests => "tests",
            Category::Lock => "lock",
            Category::Binary => "binary",
            Category::Docs => "docs",
            Category::BuildArtifacts => "build",
            Category::Dependencies => "dependencies",
            Category::Config => "config",
            Category::Scripts => "scripts",
            Category::Stylesheets => "stylesheets",
        }
    }

    /// The predicates making up this category.
    pub fn tokens(&self) -> Vec<ExclusionToken> {
        let table: &[&str] = match self {
            Category::Hidden => return vec![ExclusionToken::Name(NamePredicate::Hidden)],
            Category::BuildArtifacts => {
                let mut tokens = vec![
                    ExclusionToken::Name(NamePredicate::EndsWithEggInfo),
                    ExclusionToken::Name(NamePredicate::ContainsCache),
                ];
                tokens.extend(defaults::BUILD_ARTIFACTS.iter().map(|t| ExclusionToken::parse(t)));
                return tokens;
            }
            Category::Tests => defaults::TESTS,
            Category::Lock => defaults::LOCK_FILES,
            Category::Binary => defaults::BINARY_EXTENSIONS,
            Category::Docs => defaults::DOCS,
            Category::Dependencies => defaults::DEPENDENCY_MANIFESTS,
            Category::Config => defaults::CONFIG,
            Category::Scripts => defaults::SCRIPTS,
            Category::Stylesheets => defaults::STYLESHEETS,
        };
        table.iter().map(|t| ExclusionToken::parse(t)).collect()
    }
}

impl std::fmt::Display for Category {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Predicates over a single path segment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NamePredicate {
    /// Name starts with `.`.
    Hidden,
    /// Directory name contains `cache`, case-insensitively.
    ContainsCache,
    EndsWithEggInfo,
}

impl NamePredicate {
    fn matches(&self, segment: &str, is_dir: bool) -> bool {
        match self {
            NamePredicate::Hidden => segment.starts_with('.') && segment != "." && segment != "..",
            NamePredicate::ContainsCache => is_dir && segment.to_ascii_lowercase().contains("cache"),
            NamePredicate::EndsWithEggInfo => segment.ends_with("egg-info"),
        }
    }
}

/// One exclusion predicate.
#[derive(Debug, Clone)]
pub enum ExclusionToken {
    /// Matched against the basename, the stem, and the full relative path.
    Glob { raw: String, matcher: GlobMatcher },
    /// Matches a contiguous run of whole path segments.
    Text {
        raw: String,
        segments: SmallVec<[String; 4]>,
    },
    /// Checked against every segment of the relative path.
    Name(NamePredicate),
}

impl ExclusionToken {
    /// Parse a raw token. Glob metacharacters make a glob; anything else is
    /// literal segment text. A glob that fails to compile is kept as text.
    pub fn parse(raw: &str) -> Self {
        let trimmed = raw.trim().trim_matches('/');
        if trimmed.contains(['*', '?', '[']) {
            if let Ok(glob) = Glob::new(trimmed) {
                return ExclusionToken::Glob {
                    raw: trimmed.to_string(),
                    matcher: glob.compile_matcher(),
                };
            }
        }
        ExclusionToken::Text {
            raw: trimmed.to_string(),
            segments: trimmed
                .split('/')
                .filter(|s| !s.is_empty())
                .map(str::to_string)
                .collect(),
        }
    }

    pub fn describe(&self) -> String {
        match self {
            ExclusionToken::Glob { raw, .. } | ExclusionToken::Text { raw, .. } => raw.clone(),
            ExclusionToken::Name(p) => format!("{p:?}"),
        }
    }

    /// Test a root-relative, `/`-separated path.
    pub fn matches(&self, rel_path: &str, is_dir: bool) -> bool {
        let segments: SmallVec<[&str; 8]> = rel_path.split('/').filter(|s| !s.is_empty()).collect();
        match self {
            ExclusionToken::Glob { matcher, .. } => {
                let name = basename(rel_path);
                let stem = name.rsplit_once('.').map_or(name, |(stem, _)| stem);
                matcher.is_match(name) || matcher.is_match(stem) || matcher.is_match(rel_path)
            }
            ExclusionToken::Text { segments: needle, .. } => {
                !needle.is_empty()
                    && segments
                        .windows(needle.len())
                        .any(|w| w.iter().zip(needle).all(|(a, b)| *a == b.as_str()))
            }
            ExclusionToken::Name(predicate) => {
                let last = segments.len().saturating_sub(1);
                segments
                    .iter()
                    .enumerate()
                    .any(|(i, seg)| predicate.matches(seg, i < last || is_dir))
            }
        }
    }
}

/// Why a path was excluded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExclusionReason {
    Category(Category),
    /// A `--exclude` token, as typed.
    User(String),
}

impl std::fmt::Display for ExclusionReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ExclusionReason::Category(c) => write!(f, "category {c}"),
            ExclusionReason::User(t) => write!(f, "exclude {t:?}"),
        }
    }
}

/// The resolved exclusion list for one run.
#[derive(Debug, Clone, Default)]
pub struct Exclusions {
    tokens: Vec<(Option<Category>, ExclusionToken)>,
}

impl Exclusions {
    pub fn from_context(ctx: &Context) -> Self {
        Self {
            tokens: ctx.exclusions(),
        }
    }

    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }

    pub fn first_match(&self, rel_path: &str, is_dir: bool) -> Option<ExclusionReason> {
        self.tokens
            .iter()
            .find(|(_, token)| token.matches(rel_path, is_dir))
            .map(|(category, token)| match category {
                Some(c) => ExclusionReason::Category(*c),
                None => ExclusionReason::User(token.describe()),
            })
    }
}

/// Result of filtering an entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FilterResult {
    Accept(AcceptReason),
    Reject(RejectReason),
}

impl FilterResult {
    pub fn is_accept(&self) -> bool {
        matches!(self, FilterResult::Accept(_))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AcceptReason {
    /// Named directly; bypasses every predicate.
    Explicit,
    Passed,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RejectReason {
    Pattern,
    Extension,
    Depth,
    Ignored,
    Excluded(ExclusionReason),
    Binary,
    Empty,
}

/// Answers the content-dependent questions the pipeline asks.
///
/// Each adapter supplies its own probe. Probes never fail: an unreadable
/// file is binary and not empty.
pub trait ContentProbe {
    fn is_ignored(&self, entry: &Entry) -> bool;
    fn is_binary(&self, entry: &Entry) -> bool;
    fn is_empty(&self, entry: &Entry) -> bool;
}

/// Backend-independent filtering shared by every adapter.
#[derive(Debug, Clone)]
pub struct FilterPipeline {
    matcher: PathMatcher,
    extensions: Vec<ExtensionFilter>,
    exclusions: Exclusions,
    depth: DepthLimits,
    drop_binary: bool,
    drop_empty: bool,
}

impl FilterPipeline {
    pub fn from_context(ctx: &Context) -> Result<Self, PrinError> {
        Ok(Self {
            matcher: PathMatcher::compile(&ctx.pattern),
            extensions: ctx.extension_filters()?,
            exclusions: Exclusions::from_context(ctx),
            depth: ctx.depth,
            drop_binary: ctx.excludes(Category::Binary),
            drop_empty: !ctx.include_empty && !ctx.no_exclude,
        })
    }

    pub fn exclusions(&self) -> &Exclusions {
        &self.exclusions
    }

    /// The same pipeline matching `pattern` instead.
    pub fn with_pattern(&self, pattern: &str) -> Self {
        Self {
            matcher: PathMatcher::compile(pattern),
            ..self.clone()
        }
    }

    /// Whether a directory should be expanded during a walk.
    pub fn should_descend(&self, entry: &Entry, probe: &dyn ContentProbe) -> FilterResult {
        if entry.explicit {
            return FilterResult::Accept(AcceptReason::Explicit);
        }
        if !self.depth.allows_descent(entry.depth) {
            return FilterResult::Reject(RejectReason::Depth);
        }
        if probe.is_ignored(entry) {
            return FilterResult::Reject(RejectReason::Ignored);
        }
        if let Some(reason) = self.exclusions.first_match(&entry.rel_path, true) {
            return FilterResult::Reject(RejectReason::Excluded(reason));
        }
        FilterResult::Accept(AcceptReason::Passed)
    }

    /// Path-only checks for a file: extension, pattern, depth, ignore rules,
    /// exclusions. Explicit entries always pass.
    pub fn path_verdict(&self, entry: &Entry, probe: &dyn ContentProbe) -> FilterResult {
        if entry.explicit {
            return FilterResult::Accept(AcceptReason::Explicit);
        }
        let rel = entry.rel_path.as_str();
        if !self.extensions.is_empty() && !self.extensions.iter().any(|f| f.matches(rel)) {
            return FilterResult::Reject(RejectReason::Extension);
        }
        if !self.matcher.is_match(rel) {
            return FilterResult::Reject(RejectReason::Pattern);
        }
        if !self.depth.allows_print(entry.depth) {
            return FilterResult::Reject(RejectReason::Depth);
        }
        if probe.is_ignored(entry) {
            return FilterResult::Reject(RejectReason::Ignored);
        }
        if let Some(reason) = self
            .exclusions
            .first_match(rel, entry.kind == EntryKind::Directory)
        {
            return FilterResult::Reject(RejectReason::Excluded(reason));
        }
        FilterResult::Accept(AcceptReason::Passed)
    }

    /// Full decision for a file candidate.
    pub fn should_print(&self, entry: &Entry, probe: &dyn ContentProbe) -> FilterResult {
        let verdict = self.path_verdict(entry, probe);
        if !matches!(verdict, FilterResult::Accept(AcceptReason::Passed)) {
            return verdict;
        }
        if self.drop_binary && probe.is_binary(entry) {
            return FilterResult::Reject(RejectReason::Binary);
        }
        if self.drop_empty && probe.is_empty(entry) {
            return FilterResult::Reject(RejectReason::Empty);
        }
        FilterResult::Accept(AcceptReason::Passed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    struct Probe {
        ignored: bool,
        binary: bool,
        empty: bool,
    }

    impl ContentProbe for Probe {
        fn is_ignored(&self, _: &Entry) -> bool {
            self.ignored
        }
        fn is_binary(&self, _: &Entry) -> bool {
            self.binary
        }
        fn is_empty(&self, _: &Entry) -> bool {
            self.empty
        }
    }

    const CLEAN: Probe = Probe {
        ignored: false,
        binary: false,
        empty: false,
    };

    fn file(rel: &str) -> Entry {
        Entry {
            path: PathBuf::from(rel),
            root: PathBuf::new(),
            rel_path: rel.to_string(),
            display: rel.to_string(),
            kind: EntryKind::File,
            explicit: false,
            depth: rel.split('/').count(),
        }
    }

    fn pipeline(ctx: &Context) -> FilterPipeline {
        FilterPipeline::from_context(ctx).unwrap()
    }

    #[test]
    fn test_text_token_matches_whole_segments() {
        let out = ExclusionToken::parse("out");
        assert!(out.matches("out/main.js", false));
        assert!(!out.matches("layout/main.js", false));

        let carthage = ExclusionToken::parse("Carthage/Build");
        assert!(carthage.matches("ios/Carthage/Build/lib.a", false));
        assert!(!carthage.matches("Carthage/Checkouts/x", false));
    }

    #[test]
    fn test_glob_token_matches_name_stem_or_path() {
        let log = ExclusionToken::parse("*.log");
        assert!(log.matches("logs2/app.log", false));
        assert!(!log.matches("src/app.rs", false));

        let test_prefix = ExclusionToken::parse("test_*");
        assert!(test_prefix.matches("pkg/test_x.py", false));
        assert!(!test_prefix.matches("pkg/x_test", false));
    }

    #[test]
    fn test_name_predicates() {
        let hidden = ExclusionToken::Name(NamePredicate::Hidden);
        assert!(hidden.matches(".env", false));
        assert!(hidden.matches("a/.git/config", false));
        assert!(!hidden.matches("a/b.txt", false));

        let cache = ExclusionToken::Name(NamePredicate::ContainsCache);
        assert!(cache.matches("__pycache__/x.pyc", false));
        assert!(cache.matches(".pytest_cache", true));
        assert!(!cache.matches("src/cache.rs", false));
    }

    #[test]
    fn test_explicit_bypasses_everything() {
        let ctx = Context {
            pattern: "nomatch".into(),
            extensions: vec!["rs".into()],
            ..Default::default()
        };
        let p = pipeline(&ctx);
        let mut entry = file(".hidden/test_x.bin");
        entry.explicit = true;
        let probe = Probe {
            ignored: true,
            binary: true,
            empty: true,
        };
        assert_eq!(
            p.should_print(&entry, &probe),
            FilterResult::Accept(AcceptReason::Explicit)
        );
    }

    #[test]
    fn test_default_scenario() {
        let p = pipeline(&Context::default());
        assert!(p.should_print(&file("a.py"), &CLEAN).is_accept());
        assert!(p.should_print(&file("b.md"), &CLEAN).is_accept());
        assert_eq!(
            p.should_print(&file(".hidden"), &CLEAN),
            FilterResult::Reject(RejectReason::Excluded(ExclusionReason::Category(
                Category::Hidden
            )))
        );
        assert!(!p.should_print(&file("test_x.py"), &CLEAN).is_accept());
    }

    #[test]
    fn test_include_tests() {
        let ctx = Context {
            include_tests: true,
            ..Default::default()
        };
        assert!(pipeline(&ctx).should_print(&file("test_x.py"), &CLEAN).is_accept());
    }

    #[test]
    fn test_extension_filter_runs_first() {
        let ctx = Context {
            extensions: vec!["md".into()],
            ..Default::default()
        };
        let p = pipeline(&ctx);
        assert!(p.should_print(&file("notes.mdx"), &CLEAN).is_accept());
        assert_eq!(
            p.should_print(&file("notes.txt"), &CLEAN),
            FilterResult::Reject(RejectReason::Extension)
        );
    }

    #[test]
    fn test_order_ignored_then_binary_then_empty() {
        let p = pipeline(&Context::default());
        let entry = file("a.py");
        let ignored = Probe {
            ignored: true,
            binary: true,
            empty: true,
        };
        assert_eq!(
            p.should_print(&entry, &ignored),
            FilterResult::Reject(RejectReason::Ignored)
        );
        let binary = Probe {
            ignored: false,
            binary: true,
            empty: true,
        };
        assert_eq!(
            p.should_print(&entry, &binary),
            FilterResult::Reject(RejectReason::Binary)
        );
        let empty = Probe {
            ignored: false,
            binary: false,
            empty: true,
        };
        assert_eq!(
            p.should_print(&entry, &empty),
            FilterResult::Reject(RejectReason::Empty)
        );
    }

    #[test]
    fn test_include_flags_disable_content_checks() {
        let ctx = Context {
            include_binary: true,
            include_empty: true,
            ..Default::default()
        };
        let probe = Probe {
            ignored: false,
            binary: true,
            empty: true,
        };
        assert!(pipeline(&ctx).should_print(&file("a.py"), &probe).is_accept());
    }

    #[test]
    fn test_user_exclude() {
        let ctx = Context {
            exclude: vec!["generated".into(), "*.snap".into()],
            ..Default::default()
        };
        let p = pipeline(&ctx);
        assert_eq!(
            p.should_print(&file("src/generated/a.rs"), &CLEAN),
            FilterResult::Reject(RejectReason::Excluded(ExclusionReason::User(
                "generated".into()
            )))
        );
        assert!(!p.should_print(&file("ui/view.snap"), &CLEAN).is_accept());
        assert!(p.should_print(&file("src/a.rs"), &CLEAN).is_accept());
    }

    #[test]
    fn test_directory_pruning() {
        let p = pipeline(&Context::default());
        let mut dir = file("node_modules");
        dir.kind = EntryKind::Directory;
        assert!(!p.should_descend(&dir, &CLEAN).is_accept());

        let mut src = file("src");
        src.kind = EntryKind::Directory;
        assert!(p.should_descend(&src, &CLEAN).is_accept());
    }

    #[test]
    fn test_pattern_rejects_before_categories() {
        let ctx = Context {
            pattern: "*.rs".into(),
            ..Default::default()
        };
        let p = pipeline(&ctx);
        assert_eq!(
            p.should_print(&file("a.py"), &CLEAN),
            FilterResult::Reject(RejectReason::Pattern)
        );
        assert!(p.should_print(&file("src/lib.rs"), &CLEAN).is_accept());
    }
}
