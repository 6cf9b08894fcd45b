//! Local directory adapter.
//!
//! Depth-first and lazy: a directory is listed only when the walk reaches
//! it. Within a directory, files are yielded before any subdirectory is
//! entered, both in case-insensitive name order. Symlinks and special files
//! are skipped.

use std::collections::VecDeque;
use std::fs;
use std::path::{Path, PathBuf};

use crate::binary;
use crate::budget::FileBudget;
use crate::context::Context;
use crate::display::{normalize, resolve_display};
use crate::emptiness::is_blob_semantically_empty;
use crate::errors::PrinError;
use crate::filter::{ContentProbe, FilterPipeline, FilterResult};
use crate::ignore_rules::IgnoreEngine;

use super::{name_order, Body, Entry, EntryIter, EntryKind, SourceAdapter};

/// Reads local files.
#[derive(Debug)]
pub struct FilesystemSource {
    anchor: PathBuf,
    pipeline: FilterPipeline,
    ignore: IgnoreEngine,
}

impl FilesystemSource {
    pub fn new(ctx: &Context) -> Result<Self, PrinError> {
        Ok(Self {
            anchor: normalize(&ctx.anchor_dir()),
            pipeline: FilterPipeline::from_context(ctx)?,
            ignore: IgnoreEngine::new(!ctx.no_ignore),
        })
    }

    /// Replace the ignore engine, e.g. with [`IgnoreEngine::local_only`].
    pub fn with_ignore_engine(mut self, engine: IgnoreEngine) -> Self {
        self.ignore = engine;
        self
    }

    pub fn anchor(&self) -> &Path {
        &self.anchor
    }

    /// Directory that match paths under `root` are relative to: the anchor
    /// when `root` lies inside it, else the parent of `root`, so that the
    /// root's own name stays part of the path as it does in the display.
    fn match_base(&self, root: &Path) -> PathBuf {
        if root.starts_with(&self.anchor) {
            return self.anchor.clone();
        }
        root.parent().map(Path::to_path_buf).unwrap_or_else(|| root.to_path_buf())
    }

    /// Absolute, lexically normalized location of a root token.
    pub fn resolve(&self, token: Option<&str>) -> PathBuf {
        match token {
            None => self.anchor.clone(),
            Some(t) => normalize(&self.anchor.join(t)),
        }
    }
}

impl ContentProbe for FilesystemSource {
    fn is_ignored(&self, entry: &Entry) -> bool {
        self.ignore
            .is_ignored(&entry.root, &entry.path, entry.kind == EntryKind::Directory)
    }

    fn is_binary(&self, entry: &Entry) -> bool {
        binary::is_binary_file(&entry.path)
    }

    fn is_empty(&self, entry: &Entry) -> bool {
        match fs::read(&entry.path) {
            Ok(bytes) => is_blob_semantically_empty(&entry.path, &bytes),
            Err(_) => false,
        }
    }
}

impl SourceAdapter for FilesystemSource {
    fn name(&self) -> &'static str {
        "filesystem"
    }

    fn configure(&mut self, ctx: &Context) -> Result<(), PrinError> {
        self.anchor = normalize(&ctx.anchor_dir());
        self.pipeline = FilterPipeline::from_context(ctx)?;
        if self.ignore.is_enabled() == ctx.no_ignore {
            self.ignore = IgnoreEngine::new(!ctx.no_ignore);
        }
        Ok(())
    }

    fn walk<'a>(
        &'a self,
        pattern: &str,
        roots: &'a [String],
        budget: &'a FileBudget,
    ) -> EntryIter<'a> {
        let tokens: Vec<Option<String>> = if roots.is_empty() {
            vec![None]
        } else {
            roots.iter().cloned().map(Some).collect()
        };
        Box::new(FsWalk {
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
        let bytes = fs::read(&entry.path).map_err(|e| PrinError::read_failure(&entry.path, e))?;
        let looks_binary = binary::is_binary_content(&bytes);
        Ok(Body::new(bytes, looks_binary))
    }
}

struct RootWalk {
    token: Option<String>,
    root: PathBuf,
    /// Prefix stripped to get the path patterns match against.
    base: PathBuf,
    /// Directories still to expand, with their depth.
    stack: Vec<(PathBuf, usize)>,
}

struct FsWalk<'a> {
    source: &'a FilesystemSource,
    pipeline: FilterPipeline,
    budget: &'a FileBudget,
    tokens: std::vec::IntoIter<Option<String>>,
    current: Option<RootWalk>,
    ready: VecDeque<Entry>,
}

impl FsWalk<'_> {
    /// Open a root. A file root becomes one explicit entry; a directory root
    /// becomes the current walk.
    fn start_root(&mut self, token: Option<String>) -> Result<Option<Entry>, PrinError> {
        let path = self.source.resolve(token.as_deref());
        let shown = token.clone().unwrap_or_else(|| ".".to_string());
        let meta = fs::metadata(&path).map_err(|_| PrinError::not_traversable(&shown))?;

        if meta.is_file() {
            let root = path.parent().map(Path::to_path_buf).unwrap_or_default();
            let rel_path = path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default();
            let display = resolve_display(token.as_deref(), &path, &self.source.anchor);
            return Ok(Some(Entry {
                path,
                root,
                rel_path,
                display,
                kind: EntryKind::File,
                explicit: true,
                depth: 0,
            }));
        }
        if meta.is_dir() {
            tracing::info!(root = %shown, "walking directory");
            self.current = Some(RootWalk {
                token,
                base: self.source.match_base(&path),
                root: path.clone(),
                stack: vec![(path, 0)],
            });
            return Ok(None);
        }
        Err(PrinError::not_traversable(shown))
    }

    fn entry(&self, walk: &RootWalk, path: PathBuf, kind: EntryKind, depth: usize) -> Entry {
        let rel_path = path
            .strip_prefix(&walk.base)
            .map(|rel| {
                rel.components()
                    .map(|c| c.as_os_str().to_string_lossy().into_owned())
                    .collect::<Vec<_>>()
                    .join("/")
            })
            .unwrap_or_default();
        let display = resolve_display(walk.token.as_deref(), &path, &self.source.anchor);
        Entry {
            path,
            root: walk.root.clone(),
            rel_path,
            display,
            kind,
            explicit: false,
            depth,
        }
    }

    /// List one directory: queue its qualifying files, push its qualifying
    /// subdirectories so the first in name order is expanded next.
    fn expand(&mut self, walk: &mut RootWalk, dir: &Path, depth: usize) {
        let listing = match fs::read_dir(dir) {
            Ok(listing) => listing,
            Err(e) => {
                tracing::debug!(dir = %dir.display(), error = %e, "cannot list directory");
                return;
            }
        };

        let mut files = Vec::new();
        let mut dirs = Vec::new();
        for item in listing.flatten() {
            let Ok(file_type) = item.file_type() else {
                continue;
            };
            let name = item.file_name().to_string_lossy().into_owned();
            if file_type.is_dir() {
                dirs.push((name, item.path()));
            } else if file_type.is_file() {
                files.push((name, item.path()));
            }
        }
        files.sort_by(|a, b| name_order(&a.0, &b.0));
        dirs.sort_by(|a, b| name_order(&a.0, &b.0));

        for (_, path) in files {
            let entry = self.entry(walk, path, EntryKind::File, depth + 1);
            match self.pipeline.path_verdict(&entry, self.source) {
                FilterResult::Accept(_) => self.ready.push_back(entry),
                FilterResult::Reject(reason) => {
                    tracing::trace!(path = %entry.rel_path, ?reason, "filtered");
                }
            }
        }

        for (_, path) in dirs.into_iter().rev() {
            let entry = self.entry(walk, path, EntryKind::Directory, depth + 1);
            match self.pipeline.should_descend(&entry, self.source) {
                FilterResult::Accept(_) => walk.stack.push((entry.path, depth + 1)),
                FilterResult::Reject(reason) => {
                    tracing::debug!(dir = %entry.rel_path, ?reason, "pruned");
                }
            }
        }
    }
}

impl Iterator for FsWalk<'_> {
    type Item = Result<Entry, PrinError>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if self.budget.spent() {
                return None;
            }
            if let Some(entry) = self.ready.pop_front() {
                return Some(Ok(entry));
            }
            if let Some(mut walk) = self.current.take() {
                if let Some((dir, depth)) = walk.stack.pop() {
                    self.expand(&mut walk, &dir, depth);
                    self.current = Some(walk);
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
