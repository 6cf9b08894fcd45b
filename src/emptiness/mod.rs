//! Semantic emptiness of source files.
//!
//! A recognized source file is empty when, after dropping comments, imports
//! and a few pure-metadata declarations, no top-level item remains. Module
//! documentation counts as content. Every other file is empty only when it
//! is blank after trimming whitespace.

mod go;
mod python;
mod rust;
mod typescript;

use std::cell::RefCell;
use std::path::Path;

use tree_sitter::{Node, Parser};

thread_local! {
    static RUST_PARSER: RefCell<Option<Parser>> = const { RefCell::new(None) };
    static TS_PARSER: RefCell<Option<Parser>> = const { RefCell::new(None) };
    static TSX_PARSER: RefCell<Option<Parser>> = const { RefCell::new(None) };
    static PYTHON_PARSER: RefCell<Option<Parser>> = const { RefCell::new(None) };
    static GO_PARSER: RefCell<Option<Parser>> = const { RefCell::new(None) };
}

/// Source languages with structural emptiness checks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Language {
    Rust,
    TypeScript,
    Tsx,
    JavaScript,
    Jsx,
    Python,
    Go,
}

impl Language {
    /// Detect from the file extension.
    pub fn from_path(path: &Path) -> Option<Self> {
        let ext = path.extension()?.to_str()?.to_ascii_lowercase();
        match ext.as_str() {
            "rs" => Some(Language::Rust),
            "ts" | "mts" | "cts" => Some(Language::TypeScript),
            "tsx" => Some(Language::Tsx),
            "js" | "mjs" | "cjs" => Some(Language::JavaScript),
            "jsx" => Some(Language::Jsx),
            "py" | "pyi" => Some(Language::Python),
            "go" => Some(Language::Go),
            _ => None,
        }
    }

    fn parse_with<F, R>(self, f: F) -> Result<R, String>
    where
        F: FnOnce(&mut Parser) -> R,
    {
        match self {
            Language::Rust => with_cached_parser(&RUST_PARSER, init_rust_parser, f),
            Language::TypeScript | Language::JavaScript => {
                with_cached_parser(&TS_PARSER, init_ts_parser, f)
            }
            Language::Tsx | Language::Jsx => with_cached_parser(&TSX_PARSER, init_tsx_parser, f),
            Language::Python => with_cached_parser(&PYTHON_PARSER, init_python_parser, f),
            Language::Go => with_cached_parser(&GO_PARSER, init_go_parser, f),
        }
    }
}

fn init_with(language: tree_sitter::Language) -> Result<Parser, ()> {
    let mut p = Parser::new();
    p.set_language(&language).map_err(|_| ())?;
    Ok(p)
}

fn init_rust_parser() -> Result<Parser, ()> {
    init_with(tree_sitter_rust::LANGUAGE.into())
}

fn init_ts_parser() -> Result<Parser, ()> {
    init_with(tree_sitter_typescript::LANGUAGE_TYPESCRIPT.into())
}

fn init_tsx_parser() -> Result<Parser, ()> {
    init_with(tree_sitter_typescript::LANGUAGE_TSX.into())
}

fn init_python_parser() -> Result<Parser, ()> {
    init_with(tree_sitter_python::LANGUAGE.into())
}

fn init_go_parser() -> Result<Parser, ()> {
    init_with(tree_sitter_go::LANGUAGE.into())
}

fn with_cached_parser<F, R>(
    cell: &'static std::thread::LocalKey<RefCell<Option<Parser>>>,
    init: fn() -> Result<Parser, ()>,
    f: F,
) -> Result<R, String>
where
    F: FnOnce(&mut Parser) -> R,
{
    cell.with(|cell| {
        let mut slot = cell.borrow_mut();
        if slot.is_none() {
            *slot = Some(init().map_err(|()| "failed to initialize parser".to_string())?);
        }
        let parser = slot
            .as_mut()
            .ok_or_else(|| "failed to initialize parser".to_string())?;
        Ok(f(parser))
    })
}

/// Find a child node by kind.
pub(crate) fn find_child_by_kind<'a>(node: Node<'a>, kind: &str) -> Option<Node<'a>> {
    node.children(&mut node.walk()).find(|c| c.kind() == kind)
}

pub(crate) fn node_text<'a>(node: Node, content: &'a str) -> &'a str {
    &content[node.byte_range()]
}

/// Parse `content` and classify every top-level node with `is_noise`.
///
/// Source that fails to parse cleanly is never empty.
fn only_noise<F>(language: Language, content: &str, is_noise: F) -> Result<bool, String>
where
    F: Fn(Node, &str) -> bool,
{
    language.parse_with(|parser| {
        let tree = parser
            .parse(content, None)
            .ok_or_else(|| "failed to parse".to_string())?;
        let root = tree.root_node();
        if root.has_error() {
            return Ok(false);
        }
        let mut cursor = root.walk();
        let empty = root.named_children(&mut cursor).all(|child| is_noise(child, content));
        Ok(empty)
    })?
}

/// Whether a file's text carries no meaningful content.
///
/// # Examples
///
/// ```
/// use std::path::Path;
/// use prin::emptiness::is_semantically_empty;
///
/// assert!(is_semantically_empty(Path::new("a.py"), "import os\n# note\n"));
/// assert!(!is_semantically_empty(Path::new("a.py"), "\"\"\"Docs.\"\"\"\n"));
/// assert!(!is_semantically_empty(Path::new("a.txt"), "import os\n"));
/// ```
pub fn is_semantically_empty(path: &Path, text: &str) -> bool {
    if text.trim().is_empty() {
        return true;
    }
    let Some(language) = Language::from_path(path) else {
        return false;
    };
    let result = match language {
        Language::Python => python::is_empty(text),
        Language::Rust => rust::is_empty(text),
        Language::Go => go::is_empty(text),
        Language::TypeScript | Language::Tsx | Language::JavaScript | Language::Jsx => {
            typescript::is_empty(text, language)
        }
    };
    match result {
        Ok(empty) => empty,
        Err(e) => {
            tracing::debug!(path = %path.display(), error = %e, "emptiness check failed");
            false
        }
    }
}

/// Emptiness check over raw bytes. Non-UTF-8 content is never empty unless
/// it is all whitespace.
pub fn is_blob_semantically_empty(path: &Path, bytes: &[u8]) -> bool {
    if bytes.iter().all(u8::is_ascii_whitespace) {
        return true;
    }
    match std::str::from_utf8(bytes) {
        Ok(text) => is_semantically_empty(path, text),
        Err(_) => false,
    }
}
