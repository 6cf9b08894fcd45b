//! GitHub repository adapter, via the REST contents API.
//!
//! Ignore files never apply here: nothing was checked out locally.

use std::collections::VecDeque;
use std::path::PathBuf;
use std::sync::Mutex;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use base64::Engine;
use serde::Deserialize;

use crate::binary;
use crate::budget::FileBudget;
use crate::context::Context;
use crate::emptiness::is_blob_semantically_empty;
use crate::errors::PrinError;
use crate::filter::{ContentProbe, FilterPipeline, FilterResult};

use super::http::{FetchError, HttpClient, HttpResponse};
use super::{name_order, Body, Entry, EntryIter, EntryKind, LastBody, SourceAdapter};

pub const API_BASE: &str = "https://api.github.com";

/// Longest rate-limit wait honored before giving up.
const MAX_RATE_LIMIT_WAIT_SECS: u64 = 180;

/// A repository location parsed from a URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepoRef {
    pub owner: String,
    pub repo: String,
    /// Branch, tag or commit. `None` means the default branch.
    pub git_ref: Option<String>,
    /// Path inside the repository.
    pub subpath: Option<String>,
}

/// Parse the URL forms GitHub hands out:
///
/// * `github.com/owner/repo` (with or without scheme, `.git`, trailing `/`)
/// * `https://github.com/owner/repo/tree/<ref>/<dir>`
/// * `https://github.com/owner/repo/blob/<ref>/<file>`
/// * `git@github.com:owner/repo.git`
/// * `https://raw.githubusercontent.com/owner/repo/<ref>/<file>`
pub fn parse_github_url(token: &str) -> Option<RepoRef> {
    let token = token.trim();
    let token = token.split(['?', '#']).next().unwrap_or(token);

    let (raw, rest) = if let Some(rest) = token.strip_prefix("git@github.com:") {
        (false, rest)
    } else {
        let without_scheme = token
            .strip_prefix("https://")
            .or_else(|| token.strip_prefix("http://"))
            .unwrap_or(token);
        let host_stripped = without_scheme.strip_prefix("www.").unwrap_or(without_scheme);
        if let Some(rest) = host_stripped.strip_prefix("github.com/") {
            (false, rest)
        } else if let Some(rest) = host_stripped.strip_prefix("raw.githubusercontent.com/") {
            (true, rest)
        } else {
            return None;
        }
    };

    let segments: Vec<&str> = rest.split('/').filter(|s| !s.is_empty()).collect();
    let owner = segments.first()?.to_string();
    let repo = segments.get(1)?.trim_end_matches(".git").to_string();
    if owner.is_empty() || repo.is_empty() {
        return None;
    }

    let join = |from: usize| {
        let path = segments.get(from..).map(|s| s.join("/")).unwrap_or_default();
        (!path.is_empty()).then_some(path)
    };
    let (git_ref, subpath) = if raw {
        (segments.get(2).map(|s| s.to_string()), join(3))
    } else {
        match segments.get(2) {
            Some(&"tree") | Some(&"blob") => (segments.get(3).map(|s| s.to_string()), join(4)),
            _ => (None, None),
        }
    };

    Some(RepoRef {
        owner,
        repo,
        git_ref,
        subpath,
    })
}

#[derive(Debug, Deserialize)]
struct ContentItem {
    #[serde(rename = "type")]
    kind: String,
    name: String,
    path: String,
    #[serde(default)]
    sha: Option<String>,
    #[serde(default)]
    download_url: Option<String>,
    #[serde(default)]
    content: Option<String>,
    #[serde(default)]
    encoding: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum Contents {
    Dir(Vec<ContentItem>),
    File(ContentItem),
}

#[derive(Debug, Deserialize)]
struct RepoInfo {
    default_branch: String,
}

#[derive(Debug, Deserialize)]
struct GitBlob {
    content: String,
    #[serde(default)]
    encoding: String,
}

fn decode_base64(content: &str, url: &str) -> Result<Vec<u8>, FetchError> {
    let compact: String = content.chars().filter(|c| !c.is_whitespace()).collect();
    base64::engine::general_purpose::STANDARD
        .decode(compact)
        .map_err(|e| FetchError::Decode {
            url: url.to_string(),
            message: e.to_string(),
        })
}

/// Seconds to wait before retrying a rate-limited response, if known.
fn rate_limit_wait(response: &HttpResponse) -> Option<u64> {
    if let Some(after) = response.header("retry-after") {
        return after.trim().parse().ok();
    }
    if response.header("x-ratelimit-remaining") == Some("0") {
        let reset: u64 = response.header("x-ratelimit-reset")?.trim().parse().ok()?;
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or(0);
        return Some(reset.saturating_sub(now));
    }
    None
}

/// Reads a repository through the contents API.
pub struct GithubSource<C> {
    client: C,
    api_base: String,
    repo: RepoRef,
    pipeline: FilterPipeline,
    resolved_ref: Mutex<Option<String>>,
    last_body: LastBody,
}

impl<C: HttpClient> GithubSource<C> {
    pub fn new(client: C, repo: RepoRef, ctx: &Context) -> Result<Self, PrinError> {
        Ok(Self {
            client,
            api_base: API_BASE.to_string(),
            resolved_ref: Mutex::new(repo.git_ref.clone()),
            repo,
            pipeline: FilterPipeline::from_context(ctx)?,
            last_body: LastBody::default(),
        })
    }

    /// Point at a different API host (GitHub Enterprise, tests).
    pub fn api_base(mut self, base: &str) -> Self {
        self.api_base = base.trim_end_matches('/').to_string();
        self
    }

    pub fn repo(&self) -> &RepoRef {
        &self.repo
    }

    /// GET with a single retry on a short rate-limit wait.
    fn api_get(&self, url: &str, query: &[(&str, &str)]) -> Result<HttpResponse, FetchError> {
        let response = self.client.get(url, query)?;
        if !matches!(response.status, 403 | 429) {
            return Ok(response);
        }
        match rate_limit_wait(&response) {
            Some(wait) if wait <= MAX_RATE_LIMIT_WAIT_SECS => {
                tracing::warn!(url, wait_secs = wait, "rate limited, retrying once");
                std::thread::sleep(Duration::from_secs(wait));
                self.client.get(url, query)
            }
            Some(wait) => Err(FetchError::RateLimited {
                url: url.to_string(),
                wait_secs: wait,
            }),
            None => Ok(response),
        }
    }

    fn get_json<T: serde::de::DeserializeOwned>(
        &self,
        url: &str,
        query: &[(&str, &str)],
    ) -> Result<T, FetchError> {
        self.api_get(url, query)?.error_for_status(url)?.json(url)
    }

    /// The ref to read from, resolving the default branch on first use.
    fn git_ref(&self) -> Result<String, PrinError> {
        let mut slot = self.resolved_ref.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(r) = slot.as_ref() {
            return Ok(r.clone());
        }
        let url = format!("{}/repos/{}/{}", self.api_base, self.repo.owner, self.repo.repo);
        let info: RepoInfo = self.get_json(&url, &[])?;
        tracing::debug!(branch = %info.default_branch, "resolved default branch");
        *slot = Some(info.default_branch.clone());
        Ok(info.default_branch)
    }

    fn contents_url(&self, path: &str) -> String {
        let base = format!(
            "{}/repos/{}/{}/contents",
            self.api_base, self.repo.owner, self.repo.repo
        );
        if path.is_empty() {
            base
        } else {
            format!("{base}/{path}")
        }
    }

    fn contents(&self, path: &str) -> Result<Contents, PrinError> {
        let git_ref = self.git_ref()?;
        let url = self.contents_url(path);
        Ok(self.get_json(&url, &[("ref", git_ref.as_str())])?)
    }

    /// Raw bytes of a file: inline base64, then `download_url`, then the
    /// git blob.
    fn fetch(&self, path: &str) -> Result<Vec<u8>, PrinError> {
        let url = self.contents_url(path);
        let item = match self.contents(path)? {
            Contents::File(item) => item,
            Contents::Dir(_) => {
                return Err(PrinError::read_failure(path, "is a directory"));
            }
        };
        if item.encoding.as_deref() == Some("base64") {
            if let Some(content) = item.content.as_deref().filter(|c| !c.is_empty()) {
                return Ok(decode_base64(content, &url)?);
            }
        }
        if let Some(download) = item.download_url.as_deref() {
            let response = self.api_get(download, &[])?.error_for_status(download)?;
            return Ok(response.body);
        }
        if let Some(sha) = item.sha.as_deref() {
            let blob_url = format!(
                "{}/repos/{}/{}/git/blobs/{sha}",
                self.api_base, self.repo.owner, self.repo.repo
            );
            let blob: GitBlob = self.get_json(&blob_url, &[])?;
            if blob.encoding == "base64" {
                return Ok(decode_base64(&blob.content, &blob_url)?);
            }
            return Ok(blob.content.into_bytes());
        }
        Ok(Vec::new())
    }

    fn body_bytes(&self, entry: &Entry) -> Result<std::sync::Arc<Vec<u8>>, PrinError> {
        let path = entry.path.to_string_lossy().into_owned();
        self.last_body.get_or_fetch(&entry.path, || self.fetch(&path))
    }
}

impl<C: HttpClient> ContentProbe for GithubSource<C> {
    fn is_ignored(&self, _entry: &Entry) -> bool {
        false
    }

    fn is_binary(&self, entry: &Entry) -> bool {
        match self.body_bytes(entry) {
            Ok(bytes) => binary::is_binary_bytes(&bytes),
            Err(e) => {
                tracing::warn!(path = %entry.display, error = %e, "cannot fetch, treating as binary");
                true
            }
        }
    }

    fn is_empty(&self, entry: &Entry) -> bool {
        self.body_bytes(entry)
            .map(|bytes| is_blob_semantically_empty(&entry.path, &bytes))
            .unwrap_or(false)
    }
}

impl<C: HttpClient> SourceAdapter for GithubSource<C> {
    fn name(&self) -> &'static str {
        "github"
    }

    fn source_id(&self) -> String {
        format!("github:{}/{}", self.repo.owner, self.repo.repo)
    }

    fn configure(&mut self, ctx: &Context) -> Result<(), PrinError> {
        self.pipeline = FilterPipeline::from_context(ctx)?;
        Ok(())
    }

    fn walk<'a>(
        &'a self,
        pattern: &str,
        roots: &'a [String],
        budget: &'a FileBudget,
    ) -> EntryIter<'a> {
        let tokens: Vec<String> = if roots.is_empty() {
            vec![self.repo.subpath.clone().unwrap_or_default()]
        } else {
            roots.iter().map(|r| r.trim_matches('/').to_string()).collect()
        };
        Box::new(RepoWalk {
            source: self,
            pipeline: self.pipeline.with_pattern(pattern),
            budget,
            tokens: tokens.into_iter(),
            current: None,
            ready: VecDeque::new(),
        })
    }

    fn should_print(&self, entry: &Entry) -> bool {
        match self.pipeline.should_print(entry, self) {
            FilterResult::Accept(_) => true,
            FilterResult::Reject(reason) => {
                tracing::debug!(path = %entry.display, ?reason, "skipping");
                false
            }
        }
    }

    fn read_body(&self, entry: &Entry) -> Result<Body, PrinError> {
        let bytes = self
            .body_bytes(entry)
            .map_err(|e| PrinError::read_failure(&entry.path, e))?;
        Ok(Body::new(bytes.as_ref().clone(), binary::is_binary_bytes(&bytes)))
    }
}

struct RepoRoot {
    root: String,
    stack: Vec<(String, usize)>,
}

struct RepoWalk<'a, C> {
    source: &'a GithubSource<C>,
    pipeline: FilterPipeline,
    budget: &'a FileBudget,
    tokens: std::vec::IntoIter<String>,
    current: Option<RepoRoot>,
    ready: VecDeque<Entry>,
}

impl<C: HttpClient> RepoWalk<'_, C> {
    fn entry(&self, root: &str, path: &str, kind: EntryKind, depth: usize, explicit: bool) -> Entry {
        Entry {
            path: PathBuf::from(path),
            root: PathBuf::from(root),
            rel_path: path.to_string(),
            display: path.to_string(),
            kind,
            explicit,
            depth,
        }
    }

    fn start_root(&mut self, token: String) -> Result<Option<Entry>, PrinError> {
        let contents = self.source.contents(&token).map_err(|e| match e {
            PrinError::Fetch(FetchError::NotFound { .. }) => {
                PrinError::not_traversable(format!(
                    "github.com/{}/{}/{}",
                    self.source.repo.owner, self.source.repo.repo, token
                ))
            }
            other => other,
        })?;
        match contents {
            Contents::File(item) => {
                Ok(Some(self.entry("", &item.path, EntryKind::File, 0, true)))
            }
            Contents::Dir(items) => {
                tracing::info!(
                    repo = %format!("{}/{}", self.source.repo.owner, self.source.repo.repo),
                    root = %token,
                    "walking repository"
                );
                let mut root = RepoRoot {
                    root: token,
                    stack: Vec::new(),
                };
                self.queue_listing(&mut root, items, 0);
                self.current = Some(root);
                Ok(None)
            }
        }
    }

    fn expand(&mut self, root: &mut RepoRoot, dir: &str, depth: usize) {
        match self.source.contents(dir) {
            Ok(Contents::Dir(items)) => self.queue_listing(root, items, depth),
            Ok(Contents::File(_)) => {}
            Err(e) => tracing::warn!(dir, error = %e, "cannot list directory"),
        }
    }

    fn queue_listing(&mut self, root: &mut RepoRoot, mut items: Vec<ContentItem>, depth: usize) {
        items.sort_by(|a, b| name_order(&a.name, &b.name));
        let mut dirs = Vec::new();
        for item in items {
            match item.kind.as_str() {
                "file" => {
                    let entry = self.entry(&root.root, &item.path, EntryKind::File, depth + 1, false);
                    if self.pipeline.path_verdict(&entry, self.source).is_accept() {
                        self.ready.push_back(entry);
                    }
                }
                "dir" => {
                    let entry =
                        self.entry(&root.root, &item.path, EntryKind::Directory, depth + 1, false);
                    match self.pipeline.should_descend(&entry, self.source) {
                        FilterResult::Accept(_) => dirs.push(item.path),
                        FilterResult::Reject(reason) => {
                            tracing::debug!(dir = %item.path, ?reason, "pruned");
                        }
                    }
                }
                _ => {}
            }
        }
        for dir in dirs.into_iter().rev() {
            root.stack.push((dir, depth + 1));
        }
    }
}

impl<C: HttpClient> Iterator for RepoWalk<'_, C> {
    type Item = Result<Entry, PrinError>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if self.budget.spent() {
                return None;
            }
            if let Some(entry) = self.ready.pop_front() {
                return Some(Ok(entry));
            }
            if let Some(mut root) = self.current.take() {
                if let Some((dir, depth)) = root.stack.pop() {
                    self.expand(&mut root, &dir, depth);
                    self.current = Some(root);
                }
                continue;
            }
            let token = self.tokens.next()?;
            match self.start_root(token) {
                Ok(Some(entry)) => return Some(Ok(entry)),
                Ok(None) => continue,
                Err(e) => return Some(Err(e)),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::http::testing::MockClient;
    use serde_json::json;
    use std::sync::Arc;

    const API: &str = "https://api.test";

    fn repo_mock() -> MockClient {
        let b64 = |s: &str| base64::engine::general_purpose::STANDARD.encode(s);
        MockClient::new()
            .json(&format!("{API}/repos/o/r"), json!({"default_branch": "main"}))
            .json(
                &format!("{API}/repos/o/r/contents"),
                json!([
                    {"type": "file", "name": "README.md", "path": "README.md"},
                    {"type": "dir", "name": "src", "path": "src"},
                    {"type": "file", "name": "a.py", "path": "a.py"},
                    {"type": "dir", "name": "tests", "path": "tests"},
                    {"type": "file", "name": ".env", "path": ".env"},
                ]),
            )
            .json(
                &format!("{API}/repos/o/r/contents/src"),
                json!([{"type": "file", "name": "lib.rs", "path": "src/lib.rs"}]),
            )
            .json(
                &format!("{API}/repos/o/r/contents/README.md"),
                json!({"type": "file", "name": "README.md", "path": "README.md",
                       "encoding": "base64", "content": b64("# Title\n")}),
            )
            .json(
                &format!("{API}/repos/o/r/contents/a.py"),
                json!({"type": "file", "name": "a.py", "path": "a.py",
                       "download_url": "https://raw.test/a.py"}),
            )
            .route("https://raw.test/a.py", HttpResponse::ok("x = 1\n"))
            .json(
                &format!("{API}/repos/o/r/contents/src/lib.rs"),
                json!({"type": "file", "name": "lib.rs", "path": "src/lib.rs",
                       "sha": "abc"}),
            )
            .json(
                &format!("{API}/repos/o/r/git/blobs/abc"),
                json!({"encoding": "base64", "content": b64("pub fn f() {}\n")}),
            )
    }

    fn source(mock: Arc<MockClient>, repo: RepoRef) -> GithubSource<Arc<MockClient>> {
        GithubSource::new(mock, repo, &Context::default())
            .unwrap()
            .api_base(API)
    }

    fn repo() -> RepoRef {
        parse_github_url("github.com/o/r").unwrap()
    }

    #[test]
    fn test_parse_url_forms() {
        let plain = parse_github_url("https://github.com/owner/repo").unwrap();
        assert_eq!((plain.owner.as_str(), plain.repo.as_str()), ("owner", "repo"));
        assert_eq!(plain.git_ref, None);

        let tree = parse_github_url("https://github.com/o/r/tree/dev/src/lib").unwrap();
        assert_eq!(tree.git_ref.as_deref(), Some("dev"));
        assert_eq!(tree.subpath.as_deref(), Some("src/lib"));

        let blob = parse_github_url("github.com/o/r/blob/main/README.md").unwrap();
        assert_eq!(blob.subpath.as_deref(), Some("README.md"));

        let ssh = parse_github_url("git@github.com:o/r.git").unwrap();
        assert_eq!(ssh.repo, "r");

        let raw = parse_github_url("https://raw.githubusercontent.com/o/r/v1/a/b.py").unwrap();
        assert_eq!(raw.git_ref.as_deref(), Some("v1"));
        assert_eq!(raw.subpath.as_deref(), Some("a/b.py"));

        assert!(parse_github_url("https://example.com/o/r").is_none());
        assert!(parse_github_url("github.com/only-owner").is_none());
        assert!(parse_github_url("src/main.rs").is_none());
    }

    #[test]
    fn test_walk_order_and_filters() {
        let mock = Arc::new(repo_mock());
        let src = source(Arc::clone(&mock), repo());
        let budget = FileBudget::unlimited();
        let shown: Vec<String> = src
            .walk("", &[], &budget)
            .filter_map(Result::ok)
            .filter(|e| src.should_print(e))
            .map(|e| e.display)
            .collect();
        assert_eq!(shown, vec!["a.py", "README.md", "src/lib.rs"]);
        assert_eq!(mock.call_count(&format!("{API}/repos/o/r/contents/tests")), 0);
    }

    #[test]
    fn test_read_body_sources() {
        let mock = Arc::new(repo_mock());
        let src = source(Arc::clone(&mock), repo());
        let budget = FileBudget::unlimited();
        let entries: Vec<Entry> = src.walk("", &[], &budget).flatten().collect();
        let bodies: Vec<String> = entries
            .iter()
            .map(|e| src.read_body(e).unwrap().text().into_owned())
            .collect();
        assert!(bodies.contains(&"# Title\n".to_string()));
        assert!(bodies.contains(&"x = 1\n".to_string()));
        assert!(bodies.contains(&"pub fn f() {}\n".to_string()));
    }

    #[test]
    fn test_file_root_is_explicit() {
        let mock = Arc::new(repo_mock());
        let repo = parse_github_url("https://github.com/o/r/blob/main/a.py").unwrap();
        let src = source(mock, repo);
        let budget = FileBudget::unlimited();
        let entries: Vec<Entry> = src.walk("", &[], &budget).flatten().collect();
        assert_eq!(entries.len(), 1);
        assert!(entries[0].explicit);
        assert_eq!(entries[0].display, "a.py");
    }

    #[test]
    fn test_missing_path_is_not_traversable() {
        let mock = Arc::new(repo_mock());
        let src = source(mock, repo());
        let budget = FileBudget::unlimited();
        let roots = vec!["nope".to_string()];
        let first = src.walk("", &roots, &budget).next().unwrap();
        assert!(matches!(first, Err(PrinError::NotTraversable { .. })));
    }

    #[test]
    fn test_rate_limit_retries_once() {
        let limited = HttpResponse {
            status: 403,
            headers: vec![("retry-after".into(), "0".into())],
            body: Vec::new(),
        };
        let mock = Arc::new(
            MockClient::new()
                .route(&format!("{API}/repos/o/r"), limited)
                .json(&format!("{API}/repos/o/r"), json!({"default_branch": "trunk"})),
        );
        let src = source(Arc::clone(&mock), repo());
        assert_eq!(src.git_ref().unwrap(), "trunk");
        assert_eq!(mock.call_count(&format!("{API}/repos/o/r")), 2);
    }

    #[test]
    fn test_long_rate_limit_gives_up() {
        let limited = HttpResponse {
            status: 429,
            headers: vec![("retry-after".into(), "3600".into())],
            body: Vec::new(),
        };
        let mock = Arc::new(MockClient::new().route(&format!("{API}/repos/o/r"), limited));
        let src = source(mock, repo());
        assert!(matches!(
            src.git_ref(),
            Err(PrinError::Fetch(FetchError::RateLimited { wait_secs: 3600, .. }))
        ));
    }

    #[test]
    fn test_budget_stops_repo_walk() {
        let mock = Arc::new(repo_mock());
        let src = source(mock, repo());
        let budget = FileBudget::new(Some(1));
        let mut walk = src.walk("", &[], &budget);
        assert!(walk.next().is_some());
        assert!(budget.try_consume());
        assert!(walk.next().is_none());
    }
}
