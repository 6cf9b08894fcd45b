//! Source adapters.
//!
//! Every backend (local directories, GitHub repositories, `llms.txt`
//! websites) implements [`SourceAdapter`]. Adapters own the listing and
//! reading; the shared [`FilterPipeline`](crate::filter::FilterPipeline)
//! decides what qualifies.

pub mod filesystem;
pub mod github;
pub mod http;
pub mod website;

use std::borrow::Cow;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use crate::binary;
use crate::budget::FileBudget;
use crate::context::Context;
use crate::errors::PrinError;

pub use filesystem::FilesystemSource;
pub use github::GithubSource;
pub use website::WebsiteSource;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryKind {
    File,
    Directory,
}

/// A traversal candidate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Entry {
    /// Backend-native identifier: a filesystem path, a repository path, or a
    /// document URL.
    pub path: PathBuf,
    /// Where the walk that produced this entry started.
    pub root: PathBuf,
    /// `/`-separated path as displayed, without any `./` or `../` prefix.
    /// Patterns and exclusions match against this.
    pub rel_path: String,
    pub display: String,
    pub kind: EntryKind,
    /// Named directly rather than discovered; bypasses every filter.
    pub explicit: bool,
    /// 1 for a direct child of the root.
    pub depth: usize,
}

/// A fetched body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Body {
    pub bytes: Vec<u8>,
    pub is_binary: bool,
}

impl Body {
    /// Wrap fetched bytes. Anything that is not NUL-free UTF-8 is flagged
    /// binary, whatever `looks_binary` says.
    pub fn new(bytes: Vec<u8>, looks_binary: bool) -> Self {
        let is_binary = looks_binary || !binary::is_printable_text(&bytes);
        Self { bytes, is_binary }
    }

    pub fn text(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(&self.bytes)
    }
}

pub type EntryIter<'a> = Box<dyn Iterator<Item = Result<Entry, PrinError>> + 'a>;

/// The contract each backend implements.
pub trait SourceAdapter {
    /// Short backend name for logs.
    fn name(&self) -> &'static str;

    /// Identifies this source among others of the same kind in one run.
    fn source_id(&self) -> String {
        self.name().to_string()
    }

    /// Apply run options.
    fn configure(&mut self, ctx: &Context) -> Result<(), PrinError>;

    /// Lazily walk `roots` (an empty slice means the adapter's default root),
    /// yielding file candidates that pass the path-level filters for
    /// `pattern`. The walk stops once `budget` is spent. A root that cannot
    /// be traversed yields one `NotTraversable` error; later roots continue.
    fn walk<'a>(&'a self, pattern: &str, roots: &'a [String], budget: &'a FileBudget)
        -> EntryIter<'a>;

    /// Full filter decision for a walked entry.
    fn should_print(&self, entry: &Entry) -> bool;

    fn read_body(&self, entry: &Entry) -> Result<Body, PrinError>;
}

/// One-slot memo of the most recently fetched remote body.
///
/// Remote content checks and the subsequent print read the same entry back
/// to back; the memo turns that into a single fetch.
#[derive(Debug, Default)]
pub(crate) struct LastBody {
    slot: Mutex<Option<(PathBuf, Arc<Vec<u8>>)>>,
}

impl LastBody {
    pub(crate) fn get_or_fetch<F>(&self, path: &PathBuf, fetch: F) -> Result<Arc<Vec<u8>>, PrinError>
    where
        F: FnOnce() -> Result<Vec<u8>, PrinError>,
    {
        {
            let slot = self.slot.lock().unwrap_or_else(|e| e.into_inner());
            if let Some((cached, bytes)) = slot.as_ref() {
                if cached == path {
                    return Ok(Arc::clone(bytes));
                }
            }
        }
        let bytes = Arc::new(fetch()?);
        let mut slot = self.slot.lock().unwrap_or_else(|e| e.into_inner());
        *slot = Some((path.clone(), Arc::clone(&bytes)));
        Ok(bytes)
    }
}

/// Case-insensitive name order with a stable tie-break.
pub(crate) fn name_order(a: &str, b: &str) -> std::cmp::Ordering {
    a.to_lowercase()
        .cmp(&b.to_lowercase())
        .then_with(|| a.cmp(b))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_name_order() {
        let mut names = vec!["b.py", "A.py", "a.py", "C"];
        names.sort_by(|a, b| name_order(a, b));
        assert_eq!(names, vec!["A.py", "a.py", "b.py", "C"]);
    }

    #[test]
    fn test_last_body_memoizes_one_entry() {
        let memo = LastBody::default();
        let mut calls = 0;
        let a = PathBuf::from("a");
        memo.get_or_fetch(&a, || {
            calls += 1;
            Ok(b"x".to_vec())
        })
        .unwrap();
        memo.get_or_fetch(&a, || {
            calls += 1;
            Ok(b"x".to_vec())
        })
        .unwrap();
        assert_eq!(calls, 1);
    }

    #[test]
    fn test_body_text_is_lossy() {
        let body = Body {
            bytes: b"ok\xff".to_vec(),
            is_binary: false,
        };
        assert!(body.text().starts_with("ok"));
    }
}
