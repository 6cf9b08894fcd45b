//! Ignore-file rules with directory-scoped, last-match-wins semantics.
//!
//! Each directory contributes one [`IgnoreRuleSet`] assembled from its ignore
//! files, in this order: `.git/info/exclude`, `.gitignore`, `.ignore`,
//! `.prinignore`. Rule sets are built lazily and cached per directory by the
//! [`IgnoreEngine`] that owns them.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use ::ignore::gitignore::{Gitignore, GitignoreBuilder};
use ::ignore::Match;

use crate::defaults::IGNORE_FILE_NAMES;

/// One rule as written in an ignore file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IgnoreRule {
    pub pattern: String,
    pub negated: bool,
    /// Directory whose ignore file defined the rule.
    pub origin: PathBuf,
}

/// Outcome of testing a path against a rule set.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IgnoreVerdict {
    /// Last matching rule ignores the path.
    Ignore,
    /// Last matching rule is a negation.
    Keep,
    NoMatch,
}

/// Ordered rules for one directory.
#[derive(Debug, Clone)]
pub struct IgnoreRuleSet {
    rules: Vec<IgnoreRule>,
    matcher: Gitignore,
}

impl IgnoreRuleSet {
    /// Build a rule set rooted at `dir` from raw ignore-file lines.
    pub fn from_lines<I, S>(dir: &Path, lines: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut builder = GitignoreBuilder::new(dir);
        let mut rules = Vec::new();
        for line in lines {
            push_line(&mut builder, &mut rules, dir, None, line.as_ref());
        }
        Self::finish(builder, rules, dir)
    }

    /// Read every ignore file present in `dir`. `None` when there is none.
    pub fn from_dir(dir: &Path) -> Option<Self> {
        let mut sources: Vec<PathBuf> = Vec::new();
        if dir.join(".git").exists() {
            sources.push(dir.join(".git").join("info").join("exclude"));
        }
        sources.extend(IGNORE_FILE_NAMES.iter().map(|name| dir.join(name)));

        let mut builder = GitignoreBuilder::new(dir);
        let mut rules = Vec::new();
        let mut found = false;
        for source in sources {
            let Ok(text) = std::fs::read_to_string(&source) else {
                continue;
            };
            found = true;
            for line in text.lines() {
                push_line(&mut builder, &mut rules, dir, Some(&source), line);
            }
        }
        found.then(|| Self::finish(builder, rules, dir))
    }

    fn finish(builder: GitignoreBuilder, rules: Vec<IgnoreRule>, dir: &Path) -> Self {
        let matcher = match builder.build() {
            Ok(m) => m,
            Err(e) => {
                tracing::debug!(dir = %dir.display(), error = %e, "ignore rules failed to build");
                Gitignore::empty()
            }
        };
        Self { rules, matcher }
    }

    pub fn rules(&self) -> &[IgnoreRule] {
        &self.rules
    }

    /// Test a path under this rule set's directory. The last matching rule
    /// decides.
    pub fn verdict(&self, path: &Path, is_dir: bool) -> IgnoreVerdict {
        match self.matcher.matched(path, is_dir) {
            Match::Ignore(_) => IgnoreVerdict::Ignore,
            Match::Whitelist(_) => IgnoreVerdict::Keep,
            Match::None => IgnoreVerdict::NoMatch,
        }
    }
}

fn push_line(
    builder: &mut GitignoreBuilder,
    rules: &mut Vec<IgnoreRule>,
    dir: &Path,
    from: Option<&Path>,
    line: &str,
) {
    let trimmed = line.trim_end();
    if trimmed.is_empty() || trimmed.starts_with('#') {
        return;
    }
    if let Err(e) = builder.add_line(from.map(Path::to_path_buf), trimmed) {
        tracing::debug!(line = trimmed, error = %e, "skipping malformed ignore rule");
        return;
    }
    let (negated, pattern) = match trimmed.strip_prefix('!') {
        Some(rest) => (true, rest),
        None => (false, trimmed),
    };
    rules.push(IgnoreRule {
        pattern: pattern.to_string(),
        negated,
        origin: dir.to_path_buf(),
    });
}

/// Ignore decisions for one adapter, with a per-directory rule-set cache.
#[derive(Debug)]
pub struct IgnoreEngine {
    enabled: bool,
    global: Option<Gitignore>,
    cache: Mutex<HashMap<PathBuf, Option<Arc<IgnoreRuleSet>>>>,
}

impl IgnoreEngine {
    /// An engine that also consults the user's global git ignore file.
    pub fn new(enabled: bool) -> Self {
        match global_ignore_path() {
            Some(path) => Self::with_global_file(enabled, &path),
            None => Self::local_only(enabled),
        }
    }

    /// An engine whose lowest-precedence rules come from `path`.
    pub fn with_global_file(enabled: bool, path: &Path) -> Self {
        let global = if enabled { load_global(path) } else { None };
        Self {
            enabled,
            global,
            cache: Mutex::new(HashMap::new()),
        }
    }

    /// An engine that only reads ignore files inside the traversed tree.
    pub fn local_only(enabled: bool) -> Self {
        Self {
            enabled,
            global: None,
            cache: Mutex::new(HashMap::new()),
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Whether `path` (a descendant of `root`) is ignored.
    ///
    /// Rule sets from `root` down to the path's parent are consulted, and
    /// a more specific directory overrides its ancestors. When `root` sits
    /// inside a git work tree, the chain starts at the work-tree top.
    pub fn is_ignored(&self, root: &Path, path: &Path, is_dir: bool) -> bool {
        if !self.enabled {
            return false;
        }
        let base = chain_base(root);
        let Ok(rel) = path.strip_prefix(&base) else {
            return false;
        };

        let mut dirs = vec![base.clone()];
        let mut current = base.clone();
        if let Some(parent_rel) = rel.parent() {
            for component in parent_rel.components() {
                current.push(component);
                dirs.push(current.clone());
            }
        }

        for dir in dirs.iter().rev() {
            let Some(rules) = self.rules_for(dir) else {
                continue;
            };
            match rules.verdict(path, is_dir) {
                IgnoreVerdict::Ignore => {
                    tracing::trace!(path = %path.display(), dir = %dir.display(), "ignored");
                    return true;
                }
                IgnoreVerdict::Keep => return false,
                IgnoreVerdict::NoMatch => {}
            }
        }

        match &self.global {
            Some(global) => global.matched(rel, is_dir).is_ignore(),
            None => false,
        }
    }

    fn rules_for(&self, dir: &Path) -> Option<Arc<IgnoreRuleSet>> {
        let mut cache = self.cache.lock().unwrap_or_else(|e| e.into_inner());
        cache
            .entry(dir.to_path_buf())
            .or_insert_with(|| IgnoreRuleSet::from_dir(dir).map(Arc::new))
            .clone()
    }
}

/// Top of the enclosing git work tree, or `root` itself.
fn chain_base(root: &Path) -> PathBuf {
    root.ancestors()
        .find(|dir| dir.join(".git").exists())
        .unwrap_or(root)
        .to_path_buf()
}

/// Default location of git's `core.excludesFile`.
fn global_ignore_path() -> Option<PathBuf> {
    let config = std::env::var_os("XDG_CONFIG_HOME")
        .filter(|v| !v.is_empty())
        .map(PathBuf::from)
        .or_else(|| dirs::home_dir().map(|h| h.join(".config")))?;
    Some(config.join("git").join("ignore"))
}

fn load_global(path: &Path) -> Option<Gitignore> {
    if !path.is_file() {
        return None;
    }
    let (global, err) = Gitignore::new(path);
    if let Some(e) = err {
        tracing::debug!(path = %path.display(), error = %e, "partial global ignore file");
    }
    Some(global)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_last_match_wins() {
        let dir = Path::new("/repo");
        let set = IgnoreRuleSet::from_lines(dir, ["*.log", "!keep.log"]);
        assert_eq!(set.verdict(&dir.join("keep.log"), false), IgnoreVerdict::Keep);
        assert_eq!(set.verdict(&dir.join("app.log"), false), IgnoreVerdict::Ignore);

        let reversed = IgnoreRuleSet::from_lines(dir, ["!keep.log", "*.log"]);
        assert_eq!(
            reversed.verdict(&dir.join("keep.log"), false),
            IgnoreVerdict::Ignore
        );
    }

    #[test]
    fn test_rules_record_origin_and_negation() {
        let dir = Path::new("/repo");
        let set = IgnoreRuleSet::from_lines(dir, ["# comment", "", "build/", "!build/keep"]);
        assert_eq!(set.rules().len(), 2);
        assert!(!set.rules()[0].negated);
        assert!(set.rules()[1].negated);
        assert_eq!(set.rules()[1].pattern, "build/keep");
        assert_eq!(set.rules()[0].origin, dir);
    }

    #[test]
    fn test_directory_only_rule() {
        let dir = Path::new("/repo");
        let set = IgnoreRuleSet::from_lines(dir, ["gen/"]);
        assert_eq!(set.verdict(&dir.join("gen"), true), IgnoreVerdict::Ignore);
        assert_eq!(set.verdict(&dir.join("gen"), false), IgnoreVerdict::NoMatch);
    }

    #[test]
    fn test_nested_rules_override_parent() {
        let tmp = TempDir::new().unwrap();
        let root = tmp.path();
        fs::write(root.join(".gitignore"), "*.log\n").unwrap();
        fs::create_dir(root.join("sub")).unwrap();
        fs::write(root.join("sub/.gitignore"), "!keep.log\n").unwrap();

        let engine = IgnoreEngine::local_only(true);
        assert!(engine.is_ignored(root, &root.join("a.log"), false));
        assert!(engine.is_ignored(root, &root.join("sub/a.log"), false));
        assert!(!engine.is_ignored(root, &root.join("sub/keep.log"), false));
        assert!(!engine.is_ignored(root, &root.join("main.rs"), false));
    }

    #[test]
    fn test_prinignore_and_ignore_files() {
        let tmp = TempDir::new().unwrap();
        let root = tmp.path();
        fs::write(root.join(".ignore"), "scratch.txt\n").unwrap();
        fs::write(root.join(".prinignore"), "notes/\n").unwrap();

        let engine = IgnoreEngine::local_only(true);
        assert!(engine.is_ignored(root, &root.join("scratch.txt"), false));
        assert!(engine.is_ignored(root, &root.join("notes"), true));
    }

    #[test]
    fn test_disabled_engine_ignores_nothing() {
        let tmp = TempDir::new().unwrap();
        let root = tmp.path();
        fs::write(root.join(".gitignore"), "*\n").unwrap();
        let engine = IgnoreEngine::local_only(false);
        assert!(!engine.is_ignored(root, &root.join("a.txt"), false));
    }

    #[test]
    fn test_global_rules_have_lowest_precedence() {
        let home = TempDir::new().unwrap();
        let global = home.path().join("ignore");
        fs::write(&global, "*.log\n").unwrap();

        let tmp = TempDir::new().unwrap();
        let root = tmp.path();
        fs::write(root.join(".gitignore"), "!keep.log\n").unwrap();

        let engine = IgnoreEngine::with_global_file(true, &global);
        assert!(engine.is_ignored(root, &root.join("app.log"), false));
        assert!(!engine.is_ignored(root, &root.join("keep.log"), false));

        let off = IgnoreEngine::with_global_file(false, &global);
        assert!(!off.is_ignored(root, &root.join("app.log"), false));
    }

    #[test]
    fn test_git_info_exclude() {
        let tmp = TempDir::new().unwrap();
        let root = tmp.path();
        fs::create_dir_all(root.join(".git/info")).unwrap();
        fs::write(root.join(".git/info/exclude"), "secret.txt\n").unwrap();
        fs::write(root.join(".gitignore"), "").unwrap();

        let engine = IgnoreEngine::local_only(true);
        assert!(engine.is_ignored(root, &root.join("secret.txt"), false));
    }
}
