//! Resolved run configuration.

use std::path::PathBuf;

use crate::errors::PrinError;
use crate::filter::{Category, ExclusionToken};
use crate::output::OutputTag;
use crate::pattern::{normalize_extension, ExtensionFilter};

/// Depth limits for traversal. Depth 1 is a direct child of the root.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DepthLimits {
    pub max_depth: Option<usize>,
    pub min_depth: Option<usize>,
    /// Overrides both `max_depth` and `min_depth` when set.
    pub exact_depth: Option<usize>,
}

impl DepthLimits {
    fn effective(&self) -> (Option<usize>, Option<usize>) {
        match self.exact_depth {
            Some(d) => (Some(d), Some(d)),
            None => (self.min_depth, self.max_depth),
        }
    }

    /// Whether a directory at `depth` may be expanded.
    pub fn allows_descent(&self, depth: usize) -> bool {
        match self.effective().1 {
            Some(max) => depth < max,
            None => true,
        }
    }

    /// Whether a file at `depth` may be printed.
    pub fn allows_print(&self, depth: usize) -> bool {
        let (min, max) = self.effective();
        min.map_or(true, |m| depth >= m) && max.map_or(true, |m| depth <= m)
    }
}

/// Every knob the engine, the adapters and the printer consult.
///
/// `Context::default()` matches the command-line defaults.
#[derive(Debug, Clone)]
pub struct Context {
    pub pattern: String,
    pub paths: Vec<String>,

    pub include_hidden: bool,
    pub include_tests: bool,
    pub include_lock: bool,
    pub include_binary: bool,
    pub include_empty: bool,
    pub include_docs: bool,
    pub include_dependencies: bool,
    pub include_config: bool,
    pub include_scripts: bool,
    pub include_stylesheets: bool,

    /// Drop every category and user exclusion.
    pub no_exclude: bool,
    /// Skip ignore files entirely.
    pub no_ignore: bool,
    pub only_headers: bool,

    pub extensions: Vec<String>,
    pub exclude: Vec<String>,

    pub tag: OutputTag,
    pub max_files: Option<usize>,
    pub depth: DepthLimits,

    /// Directory that relative display paths are computed against.
    /// `None` means the current working directory.
    pub anchor: Option<PathBuf>,
}

impl Default for Context {
    fn default() -> Self {
        Self {
            pattern: String::new(),
            paths: Vec::new(),
            include_hidden: false,
            include_tests: false,
            include_lock: false,
            include_binary: false,
            include_empty: false,
            include_docs: true,
            include_dependencies: true,
            include_config: true,
            include_scripts: true,
            include_stylesheets: true,
            no_exclude: false,
            no_ignore: false,
            only_headers: false,
            extensions: Vec::new(),
            exclude: Vec::new(),
            tag: OutputTag::Xml,
            max_files: None,
            depth: DepthLimits::default(),
            anchor: None,
        }
    }
}

impl Context {
    /// Whether `category` is currently excluding candidates.
    pub fn excludes(&self, category: Category) -> bool {
        if self.no_exclude {
            return false;
        }
        match category {
            Category::Hidden => !self.include_hidden,
            Category::Tests => !self.include_tests,
            Category::Lock => !self.include_lock,
            Category::Binary => !self.include_binary,
            Category::Docs => !self.include_docs,
            Category::BuildArtifacts => true,
            Category::Dependencies => !self.include_dependencies,
            Category::Config => !self.include_config,
            Category::Scripts => !self.include_scripts,
            Category::Stylesheets => !self.include_stylesheets,
        }
    }

    /// Effective exclusion tokens, each tagged with the category it came
    /// from. User `--exclude` tokens come last.
    pub fn exclusions(&self) -> Vec<(Option<Category>, ExclusionToken)> {
        if self.no_exclude {
            return Vec::new();
        }
        let mut tokens = Vec::new();
        for category in Category::ALL {
            if !self.excludes(category) {
                continue;
            }
            for token in category.tokens() {
                tokens.push((Some(category), token));
            }
        }
        for raw in &self.exclude {
            tokens.push((None, ExclusionToken::parse(raw)));
        }
        tokens
    }

    /// Parsed `--extension` filters. Fails on an empty or path-like value.
    pub fn extension_filters(&self) -> Result<Vec<ExtensionFilter>, PrinError> {
        self.extensions
            .iter()
            .map(|e| ExtensionFilter::new(e))
            .collect()
    }

    /// Check the values that can be rejected before any traversal starts.
    pub fn validate(&self) -> Result<(), PrinError> {
        for ext in &self.extensions {
            normalize_extension(ext)?;
        }
        if self.max_files == Some(0) {
            return Err(PrinError::Config("--max-files must be at least 1".into()));
        }
        if let (Some(min), Some(max)) = (self.depth.min_depth, self.depth.max_depth) {
            if min > max {
                return Err(PrinError::Config(format!(
                    "--min-depth {min} is greater than --max-depth {max}"
                )));
            }
        }
        Ok(())
    }

    pub fn anchor_dir(&self) -> PathBuf {
        self.anchor
            .clone()
            .or_else(|| std::env::current_dir().ok())
            .unwrap_or_else(|| PathBuf::from("."))
    }
}
