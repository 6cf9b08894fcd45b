//! Website adapter: the documents an `llms.txt` manifest links to.
//!
//! The manifest is a flat pseudo-tree. Each linked document becomes one file
//! entry keyed by the last segment of its URL.

use std::path::PathBuf;
use std::sync::{Arc, Mutex, OnceLock};

use regex::Regex;
use reqwest::Url;

use crate::binary;
use crate::budget::FileBudget;
use crate::context::Context;
use crate::emptiness::is_blob_semantically_empty;
use crate::errors::PrinError;
use crate::filter::{ContentProbe, FilterPipeline, FilterResult};

use super::http::{FetchError, HttpClient};
use super::{name_order, Body, Entry, EntryIter, EntryKind, LastBody, SourceAdapter};

const MANIFEST_NAME: &str = "llms.txt";

static MARKDOWN_LINK: OnceLock<Option<Regex>> = OnceLock::new();
static RAW_URL: OnceLock<Option<Regex>> = OnceLock::new();

fn markdown_link() -> Option<&'static Regex> {
    MARKDOWN_LINK
        .get_or_init(|| Regex::new(r"\[[^\]]+\]\(([^)\s]+)\)").ok())
        .as_ref()
}

fn raw_url() -> Option<&'static Regex> {
    RAW_URL
        .get_or_init(|| Regex::new(r"https?://[^\s)]+").ok())
        .as_ref()
}

/// Whether `token` reads as a website address.
pub fn is_website_url(token: &str) -> bool {
    token.starts_with("http://") || token.starts_with("https://")
}

/// Add a scheme when missing and force a trailing slash, so relative links
/// resolve underneath the base rather than beside it.
pub fn normalize_base(url: &str) -> String {
    let url = url.trim();
    let mut base = if is_website_url(url) {
        url.to_string()
    } else {
        format!("https://{url}")
    };
    if !base.ends_with('/') {
        base.push('/');
    }
    base
}

/// Extract link targets from an `llms.txt` body, in manifest order.
///
/// Blank lines, headings and quotes are skipped. A markdown link wins over a
/// bare URL on the same line.
pub fn parse_llms_txt(text: &str) -> Vec<String> {
    let mut links = Vec::new();
    for line in text.lines() {
        let mut line = line.trim();
        if line.is_empty() || line.starts_with('#') || line.starts_with('>') {
            continue;
        }
        for marker in ["- ", "* ", "• "] {
            if let Some(rest) = line.strip_prefix(marker) {
                line = rest.trim();
                break;
            }
        }
        if let Some(link) = markdown_link()
            .and_then(|re| re.captures(line))
            .and_then(|c| c.get(1))
        {
            links.push(link.as_str().to_string());
        } else if let Some(url) = raw_url().and_then(|re| re.find(line)) {
            links.push(url.as_str().to_string());
        }
    }
    links
}

/// Display key for a document: its last path segment, or the host when the
/// path is empty.
fn document_key(url: &Url) -> String {
    url.path()
        .trim_end_matches('/')
        .rsplit('/')
        .next()
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .or_else(|| url.host_str().map(str::to_string))
        .unwrap_or_else(|| url.as_str().to_string())
}

/// Resolved manifest: unique keys mapped to absolute document URLs.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Manifest {
    documents: Vec<(String, String)>,
}

impl Manifest {
    pub fn parse(base: &Url, text: &str) -> Self {
        let mut documents: Vec<(String, String)> = Vec::new();
        for link in parse_llms_txt(text) {
            let Ok(url) = base.join(&link) else {
                tracing::debug!(link, "unresolvable link");
                continue;
            };
            let stem = document_key(&url);
            let mut key = stem.clone();
            let mut n = 2;
            while documents.iter().any(|(k, _)| *k == key) {
                key = format!("{stem}.{n}");
                n += 1;
            }
            documents.push((key, url.to_string()));
        }
        documents.sort_by(|a, b| name_order(&a.0, &b.0));
        Self { documents }
    }

    pub fn len(&self) -> usize {
        self.documents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }

    /// Keys in case-insensitive order.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.documents.iter().map(|(k, _)| k.as_str())
    }

    pub fn url_for(&self, key: &str) -> Option<&str> {
        self.documents
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, u)| u.as_str())
    }
}

/// Reads the documents listed in `<base>/llms.txt`.
pub struct WebsiteSource<C> {
    client: C,
    base: String,
    pipeline: FilterPipeline,
    manifest: Mutex<Option<Arc<Manifest>>>,
    last_body: LastBody,
}

impl<C: HttpClient> WebsiteSource<C> {
    pub fn new(client: C, base: &str, ctx: &Context) -> Result<Self, PrinError> {
        Ok(Self {
            client,
            base: normalize_base(base),
            pipeline: FilterPipeline::from_context(ctx)?,
            manifest: Mutex::new(None),
            last_body: LastBody::default(),
        })
    }

    pub fn base(&self) -> &str {
        &self.base
    }

    /// Fetch and parse the manifest once.
    pub fn manifest(&self) -> Result<Arc<Manifest>, PrinError> {
        let mut slot = self.manifest.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(manifest) = slot.as_ref() {
            return Ok(Arc::clone(manifest));
        }
        let base = Url::parse(&self.base)
            .map_err(|e| PrinError::Config(format!("invalid website URL {}: {e}", self.base)))?;
        let manifest_url = format!("{}{MANIFEST_NAME}", self.base);
        let response = self
            .client
            .get(&manifest_url, &[])?
            .error_for_status(&manifest_url)
            .map_err(|e| match e {
                FetchError::NotFound { url } => PrinError::not_traversable(url),
                other => PrinError::Fetch(other),
            })?;
        let manifest = Arc::new(Manifest::parse(
            &base,
            &String::from_utf8_lossy(&response.body),
        ));
        tracing::info!(base = %self.base, documents = manifest.len(), "loaded manifest");
        *slot = Some(Arc::clone(&manifest));
        Ok(manifest)
    }

    fn fetch(&self, key: &str) -> Result<Vec<u8>, PrinError> {
        let manifest = self.manifest()?;
        let url = manifest.url_for(key).unwrap_or(key).to_string();
        let response = self.client.get(&url, &[])?.error_for_status(&url)?;
        Ok(response.body)
    }

    fn body_bytes(&self, entry: &Entry) -> Result<Arc<Vec<u8>>, PrinError> {
        self.last_body
            .get_or_fetch(&entry.path, || self.fetch(&entry.rel_path))
    }

    fn entry(key: &str) -> Entry {
        Entry {
            path: PathBuf::from(key),
            root: PathBuf::new(),
            rel_path: key.to_string(),
            display: key.to_string(),
            kind: EntryKind::File,
            explicit: false,
            depth: 1,
        }
    }
}

impl<C: HttpClient> ContentProbe for WebsiteSource<C> {
    fn is_ignored(&self, _entry: &Entry) -> bool {
        false
    }

    fn is_binary(&self, entry: &Entry) -> bool {
        match self.body_bytes(entry) {
            Ok(bytes) => binary::is_binary_bytes(&bytes),
            Err(e) => {
                tracing::warn!(document = %entry.display, error = %e, "cannot fetch, treating as binary");
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

impl<C: HttpClient> SourceAdapter for WebsiteSource<C> {
    fn name(&self) -> &'static str {
        "website"
    }

    fn source_id(&self) -> String {
        format!("website:{}", self.base)
    }

    fn configure(&mut self, ctx: &Context) -> Result<(), PrinError> {
        self.pipeline = FilterPipeline::from_context(ctx)?;
        Ok(())
    }

    /// Roots are ignored: a website has exactly one, its manifest.
    fn walk<'a>(
        &'a self,
        pattern: &str,
        _roots: &'a [String],
        budget: &'a FileBudget,
    ) -> EntryIter<'a> {
        let manifest = match self.manifest() {
            Ok(m) => m,
            Err(e) => return Box::new(std::iter::once(Err(e))),
        };
        let pipeline = self.pipeline.with_pattern(pattern);
        let entries: Vec<Entry> = manifest
            .keys()
            .map(Self::entry)
            .filter(|e| pipeline.path_verdict(e, self).is_accept())
            .collect();
        Box::new(
            entries
                .into_iter()
                .take_while(move |_| !budget.spent())
                .map(Ok),
        )
    }

    fn should_print(&self, entry: &Entry) -> bool {
        match self.pipeline.should_print(entry, self) {
            FilterResult::Accept(_) => true,
            FilterResult::Reject(reason) => {
                tracing::debug!(document = %entry.display, ?reason, "skipping");
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

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::http::testing::MockClient;
    use crate::source::http::HttpResponse;

    const MANIFEST: &str = "\
# Docs
> Summary line with https://ignored.example/quote

- [Guide](guide.md)
- [API](https://other.test/ref/api.md)
* https://cdn.test/raw/notes.txt
- [Second guide](https://docs.test/v2/guide.md)
- [Home](https://root.test/)
";

    fn site() -> MockClient {
        MockClient::new()
            .route("https://docs.test/llms.txt", HttpResponse::ok(MANIFEST))
            .route("https://docs.test/guide.md", HttpResponse::ok("# Guide\n"))
            .route("https://other.test/ref/api.md", HttpResponse::ok("API\n"))
            .route("https://cdn.test/raw/notes.txt", HttpResponse::ok("notes\n"))
            .route(
                "https://docs.test/v2/guide.md",
                HttpResponse::ok("# Guide v2\n"),
            )
            .route("https://root.test/", HttpResponse::ok(vec![0u8, 1, 2, 3]))
    }

    #[test]
    fn test_parse_llms_txt() {
        let links = parse_llms_txt(MANIFEST);
        assert_eq!(
            links,
            vec![
                "guide.md",
                "https://other.test/ref/api.md",
                "https://cdn.test/raw/notes.txt",
                "https://docs.test/v2/guide.md",
                "https://root.test/",
            ]
        );
    }

    #[test]
    fn test_manifest_keys_and_dedup() {
        let base = Url::parse("https://docs.test/").unwrap();
        let manifest = Manifest::parse(&base, MANIFEST);
        let keys: Vec<&str> = manifest.keys().collect();
        assert_eq!(
            keys,
            vec!["api.md", "guide.md", "guide.md.2", "notes.txt", "root.test"]
        );
        assert_eq!(
            manifest.url_for("guide.md"),
            Some("https://docs.test/guide.md")
        );
        assert_eq!(
            manifest.url_for("guide.md.2"),
            Some("https://docs.test/v2/guide.md")
        );
    }

    #[test]
    fn test_normalize_base() {
        assert_eq!(normalize_base("docs.test/x"), "https://docs.test/x/");
        assert_eq!(normalize_base("http://a.test/"), "http://a.test/");
    }

    #[test]
    fn test_walk_and_print() {
        let src = WebsiteSource::new(site(), "https://docs.test", &Context::default()).unwrap();
        let budget = FileBudget::unlimited();
        let printed: Vec<String> = src
            .walk("", &[], &budget)
            .filter_map(Result::ok)
            .filter(|e| src.should_print(e))
            .map(|e| e.display)
            .collect();
        assert_eq!(printed, vec!["api.md", "guide.md", "guide.md.2", "notes.txt"]);
    }

    #[test]
    fn test_pattern_applies_to_keys() {
        let src = WebsiteSource::new(site(), "https://docs.test", &Context::default()).unwrap();
        let budget = FileBudget::unlimited();
        let keys: Vec<String> = src
            .walk("^guide", &[], &budget)
            .filter_map(Result::ok)
            .map(|e| e.display)
            .collect();
        assert_eq!(keys, vec!["guide.md", "guide.md.2"]);
    }

    #[test]
    fn test_missing_manifest_is_not_traversable() {
        let src =
            WebsiteSource::new(MockClient::new(), "https://none.test", &Context::default()).unwrap();
        let budget = FileBudget::unlimited();
        let first = src.walk("", &[], &budget).next().unwrap();
        assert!(matches!(first, Err(PrinError::NotTraversable { .. })));
    }

    #[test]
    fn test_body_fetched_once_for_probe_and_read() {
        let mock = Arc::new(site());
        let src =
            WebsiteSource::new(Arc::clone(&mock), "https://docs.test", &Context::default())
                .unwrap();
        let entry = WebsiteSource::<Arc<MockClient>>::entry("notes.txt");
        assert!(src.should_print(&entry));
        let body = src.read_body(&entry).unwrap();
        assert_eq!(body.text(), "notes\n");
        assert_eq!(mock.call_count("https://cdn.test/raw/notes.txt"), 1);
    }
}
