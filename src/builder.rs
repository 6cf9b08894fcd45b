//! Fluent builder API for prin, and the multi-source run.
//!
//! Root tokens are sorted into local paths, repository URLs and website
//! URLs. One [`FileBudget`] is shared by every source, and sources run in
//! that order until the budget is spent.

use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;

use crate::budget::FileBudget;
use crate::context::Context;
use crate::errors::PrinError;
use crate::output::OutputTag;
use crate::printer::{PrintStats, Printer, RootOutcome};
use crate::source::github::{parse_github_url, RepoRef};
use crate::source::http::{default_client, HttpClient};
use crate::source::website::is_website_url;
use crate::source::{FilesystemSource, GithubSource, WebsiteSource};

const GITHUB_ACCEPT: &str = "application/vnd.github+json";

/// Where a root token points.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RootToken {
    Local(String),
    Github(RepoRef),
    Website(String),
}

impl RootToken {
    pub fn classify(token: &str) -> Self {
        if let Some(repo) = parse_github_url(token) {
            RootToken::Github(repo)
        } else if is_website_url(token) {
            RootToken::Website(token.to_string())
        } else {
            RootToken::Local(token.to_string())
        }
    }

    pub fn is_remote(&self) -> bool {
        !matches!(self, RootToken::Local(_))
    }
}

/// What a run did.
#[derive(Debug, Default)]
pub struct RunReport {
    pub stats: PrintStats,
    /// Roots that could not be walked, in the order they were tried.
    pub failures: Vec<PrinError>,
    pub budget_exhausted: bool,
}

impl RunReport {
    /// Exit code for the run: 0, or the code of the first failed root.
    pub fn exit_code(&self) -> i32 {
        self.failures
            .first()
            .map(crate::errors::exit_code)
            .unwrap_or(0)
    }
}

/// Builder for a prin run.
///
/// # Examples
///
/// ```no_run
/// use prin::builder::Prin;
///
/// let output = Prin::new()
///     .pattern("*.rs")
///     .path("src")
///     .include_tests(true)
///     .render()
///     .unwrap();
/// print!("{output}");
/// ```
pub struct Prin {
    ctx: Context,
    client: Option<Arc<dyn HttpClient>>,
}

impl Default for Prin {
    fn default() -> Self {
        Self::new()
    }
}

impl Prin {
    pub fn new() -> Self {
        Self::from_context(Context::default())
    }

    pub fn from_context(ctx: Context) -> Self {
        Self { ctx, client: None }
    }

    pub fn context(&self) -> &Context {
        &self.ctx
    }

    pub fn pattern(mut self, pattern: impl Into<String>) -> Self {
        self.ctx.pattern = pattern.into();
        self
    }

    /// Add a root token: a local path, a repository URL or a website URL.
    pub fn path(mut self, token: impl Into<String>) -> Self {
        self.ctx.paths.push(token.into());
        self
    }

    pub fn paths<I, S>(mut self, tokens: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.ctx.paths.extend(tokens.into_iter().map(Into::into));
        self
    }

    pub fn include_hidden(mut self, include: bool) -> Self {
        self.ctx.include_hidden = include;
        self
    }

    pub fn include_tests(mut self, include: bool) -> Self {
        self.ctx.include_tests = include;
        self
    }

    pub fn include_lock(mut self, include: bool) -> Self {
        self.ctx.include_lock = include;
        self
    }

    pub fn include_binary(mut self, include: bool) -> Self {
        self.ctx.include_binary = include;
        self
    }

    pub fn include_empty(mut self, include: bool) -> Self {
        self.ctx.include_empty = include;
        self
    }

    pub fn include_docs(mut self, include: bool) -> Self {
        self.ctx.include_docs = include;
        self
    }

    pub fn include_dependencies(mut self, include: bool) -> Self {
        self.ctx.include_dependencies = include;
        self
    }

    pub fn include_config(mut self, include: bool) -> Self {
        self.ctx.include_config = include;
        self
    }

    pub fn include_scripts(mut self, include: bool) -> Self {
        self.ctx.include_scripts = include;
        self
    }

    pub fn include_stylesheets(mut self, include: bool) -> Self {
        self.ctx.include_stylesheets = include;
        self
    }

    pub fn no_exclude(mut self, enabled: bool) -> Self {
        self.ctx.no_exclude = enabled;
        self
    }

    pub fn no_ignore(mut self, enabled: bool) -> Self {
        self.ctx.no_ignore = enabled;
        self
    }

    pub fn only_headers(mut self, enabled: bool) -> Self {
        self.ctx.only_headers = enabled;
        self
    }

    /// Keep only files with this extension. Repeatable.
    pub fn extension(mut self, ext: impl Into<String>) -> Self {
        self.ctx.extensions.push(ext.into());
        self
    }

    /// Exclude paths matching a glob or a literal path segment. Repeatable.
    pub fn exclude(mut self, token: impl Into<String>) -> Self {
        self.ctx.exclude.push(token.into());
        self
    }

    pub fn tag(mut self, tag: OutputTag) -> Self {
        self.ctx.tag = tag;
        self
    }

    pub fn max_files(mut self, max: usize) -> Self {
        self.ctx.max_files = Some(max);
        self
    }

    pub fn max_depth(mut self, depth: usize) -> Self {
        self.ctx.depth.max_depth = Some(depth);
        self
    }

    pub fn min_depth(mut self, depth: usize) -> Self {
        self.ctx.depth.min_depth = Some(depth);
        self
    }

    pub fn exact_depth(mut self, depth: usize) -> Self {
        self.ctx.depth.exact_depth = Some(depth);
        self
    }

    /// Directory that relative paths resolve and display against.
    pub fn anchor(mut self, dir: impl Into<PathBuf>) -> Self {
        self.ctx.anchor = Some(dir.into());
        self
    }

    /// Use this client for every remote source instead of the network.
    pub fn http_client(mut self, client: Arc<dyn HttpClient>) -> Self {
        self.client = Some(client);
        self
    }

    /// Run and write to `out`.
    pub fn run(self, out: &mut dyn Write) -> Result<RunReport, PrinError> {
        run_with_client(&self.ctx, self.client, out)
    }

    /// Run and collect the output.
    pub fn render(self) -> Result<String, PrinError> {
        let mut out = Vec::new();
        self.run(&mut out)?;
        Ok(String::from_utf8_lossy(&out).into_owned())
    }
}

// ============================================================================
// Functional API
// ============================================================================

/// Split the pattern and the root tokens, applying the query fallback: with
/// no roots, a pattern that names an existing path or a URL is the root.
pub fn resolve_query(ctx: &Context) -> (String, Vec<String>) {
    let pattern = ctx.pattern.trim();
    if ctx.paths.is_empty() && !pattern.is_empty() {
        let names_path = ctx.anchor_dir().join(pattern).exists();
        if names_path || RootToken::classify(pattern).is_remote() {
            tracing::debug!(token = pattern, "pattern names a root, printing it");
            return (String::new(), vec![pattern.to_string()]);
        }
    }
    (ctx.pattern.clone(), ctx.paths.clone())
}

/// Run every source in `ctx` against the network.
pub fn run(ctx: &Context, out: &mut dyn Write) -> Result<RunReport, PrinError> {
    run_with_client(ctx, None, out)
}

/// Run every source in `ctx`. `client` replaces the network client for
/// remote sources when given.
pub fn run_with_client(
    ctx: &Context,
    client: Option<Arc<dyn HttpClient>>,
    out: &mut dyn Write,
) -> Result<RunReport, PrinError> {
    ctx.validate()?;
    let (pattern, tokens) = resolve_query(ctx);

    let mut local = Vec::new();
    let mut repos = Vec::new();
    let mut websites = Vec::new();
    for token in &tokens {
        match RootToken::classify(token) {
            RootToken::Local(t) => local.push(t),
            RootToken::Github(repo) => repos.push(repo),
            RootToken::Website(url) => websites.push(url),
        }
    }

    let budget = FileBudget::new(ctx.max_files);
    let mut printer = Printer::new(ctx.tag, &budget).headers_only(ctx.only_headers);
    let mut report = RunReport::default();

    'sources: {
        if !local.is_empty() || tokens.is_empty() {
            let fs = FilesystemSource::new(ctx)?;
            if local.is_empty() {
                let outcome = printer.print_root(&fs, &pattern, None, out)?;
                if settle(outcome, &mut report) {
                    break 'sources;
                }
            }
            for token in &local {
                let outcome = printer.print_root(&fs, &pattern, Some(token), out)?;
                if settle(outcome, &mut report) {
                    break 'sources;
                }
            }
        }

        if !repos.is_empty() {
            let client = match &client {
                Some(c) => Arc::clone(c),
                None => Arc::from(default_client(
                    std::env::var("GITHUB_TOKEN").ok(),
                    Some(GITHUB_ACCEPT),
                )?),
            };
            for repo in repos {
                let source = GithubSource::new(Arc::clone(&client), repo, ctx)?;
                let outcome = printer.print_root(&source, &pattern, None, out)?;
                if settle(outcome, &mut report) {
                    break 'sources;
                }
            }
        }

        if !websites.is_empty() {
            let client = match &client {
                Some(c) => Arc::clone(c),
                None => Arc::from(default_client(None, None)?),
            };
            for url in websites {
                let source = WebsiteSource::new(Arc::clone(&client), &url, ctx)?;
                let outcome = printer.print_root(&source, &pattern, None, out)?;
                if settle(outcome, &mut report) {
                    break 'sources;
                }
            }
        }
    }

    report.stats = printer.stats();
    tracing::info!(
        printed = report.stats.printed,
        skipped = report.stats.skipped,
        failures = report.failures.len(),
        "done"
    );
    Ok(report)
}

/// Print a local directory with default options.
pub fn print_path(root: impl Into<String>, out: &mut dyn Write) -> Result<RunReport, PrinError> {
    Prin::new().path(root).run(out)
}

/// Fold one root's outcome into the report. True when the run must stop.
fn settle(outcome: RootOutcome, report: &mut RunReport) -> bool {
    match outcome {
        RootOutcome::Completed => false,
        RootOutcome::BudgetExhausted => {
            report.budget_exhausted = true;
            true
        }
        RootOutcome::Failed(e) => {
            tracing::debug!(error = %e, "root failed");
            report.failures.push(e);
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::http::testing::MockClient;
    use crate::source::http::HttpResponse;
    use serde_json::json;
    use std::fs;
    use tempfile::TempDir;

    fn create_test_project() -> TempDir {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("a.py"), "x = 1\n").unwrap();
        fs::write(dir.path().join("b.md"), "# b\n").unwrap();
        fs::write(dir.path().join(".hidden"), "secret\n").unwrap();
        fs::write(dir.path().join("test_x.py"), "def test(): pass\n").unwrap();
        dir
    }

    fn headers(prin: Prin) -> Vec<String> {
        prin.only_headers(true)
            .render()
            .unwrap()
            .lines()
            .map(str::to_string)
            .collect()
    }

    #[test]
    fn test_prin_builder_defaults() {
        let dir = create_test_project();
        assert_eq!(headers(Prin::new().anchor(dir.path())), vec!["a.py", "b.md"]);
    }

    #[test]
    fn test_include_tests() {
        let dir = create_test_project();
        let shown = headers(Prin::new().anchor(dir.path()).include_tests(true));
        assert_eq!(shown, vec!["a.py", "b.md", "test_x.py"]);
    }

    #[test]
    fn test_query_fallback_prints_named_file() {
        let dir = create_test_project();
        let shown = headers(Prin::new().anchor(dir.path()).pattern("test_x.py"));
        assert_eq!(shown, vec!["test_x.py"]);
    }

    #[test]
    fn test_pattern_with_paths_is_a_pattern() {
        let dir = create_test_project();
        let shown = headers(Prin::new().anchor(dir.path()).pattern("*.md").path("."));
        assert_eq!(shown, vec!["./b.md"]);
    }

    #[test]
    fn test_budget_spans_roots() {
        let dir = create_test_project();
        fs::create_dir(dir.path().join("more")).unwrap();
        fs::write(dir.path().join("more/c.py"), "y = 2\n").unwrap();
        let shown = headers(
            Prin::new()
                .anchor(dir.path())
                .paths(["more", "a.py", "b.md"])
                .max_files(2),
        );
        assert_eq!(shown, vec!["more/c.py", "a.py"]);
    }

    #[test]
    fn test_missing_root_does_not_stop_others() {
        let dir = create_test_project();
        let mut out = Vec::new();
        let report = Prin::new()
            .anchor(dir.path())
            .paths(["nope", "a.py"])
            .only_headers(true)
            .run(&mut out)
            .unwrap();
        assert_eq!(String::from_utf8(out).unwrap(), "a.py\n");
        assert_eq!(report.failures.len(), 1);
        assert_eq!(report.exit_code(), 3);
    }

    #[test]
    fn test_invalid_extension_is_rejected() {
        let dir = create_test_project();
        let result = Prin::new().anchor(dir.path()).extension("a/b").render();
        assert!(matches!(result, Err(PrinError::InvalidPattern { .. })));
    }

    #[test]
    fn test_root_token_classification() {
        assert!(matches!(
            RootToken::classify("github.com/o/r"),
            RootToken::Github(_)
        ));
        assert!(matches!(
            RootToken::classify("https://docs.test"),
            RootToken::Website(_)
        ));
        assert_eq!(RootToken::classify("src"), RootToken::Local("src".into()));
    }

    #[test]
    fn test_local_then_remote_sources() {
        let dir = create_test_project();
        let mock = MockClient::new()
            .route("https://docs.test/llms.txt", HttpResponse::ok("- [Guide](guide.md)\n"))
            .route("https://docs.test/guide.md", HttpResponse::ok("# Guide\n"))
            .json("https://api.github.com/repos/o/r", json!({"default_branch": "main"}))
            .json(
                "https://api.github.com/repos/o/r/contents",
                json!([{"type": "file", "name": "lib.rs", "path": "lib.rs"}]),
            )
            .json(
                "https://api.github.com/repos/o/r/contents/lib.rs",
                json!({"type": "file", "name": "lib.rs", "path": "lib.rs",
                       "download_url": "https://raw.test/lib.rs"}),
            )
            .route("https://raw.test/lib.rs", HttpResponse::ok("pub fn f() {}\n"));
        let shown = headers(
            Prin::new()
                .anchor(dir.path())
                .paths(["https://docs.test", "github.com/o/r", "a.py"])
                .http_client(Arc::new(mock)),
        );
        assert_eq!(shown, vec!["a.py", "lib.rs", "guide.md"]);
    }
}
