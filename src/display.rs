//! Display paths.
//!
//! The form of every printed path is a pure function of how its root token
//! was spelled, never of where the token resolves to. `.` and the absolute
//! working directory name the same place but display differently.

use std::path::{Component, Path, PathBuf};

/// Lexical shape of a root token.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RootShape {
    /// No root given; traversal starts at the anchor.
    Absent,
    /// `foo`, `src/lib`.
    Bare,
    /// `.` or `./foo`.
    Dot,
    /// `..` or `../foo`.
    Parent,
    Absolute,
}

impl RootShape {
    pub fn of(token: Option<&str>) -> Self {
        let Some(token) = token else {
            return RootShape::Absent;
        };
        if Path::new(token).is_absolute() || token.starts_with('/') {
            RootShape::Absolute
        } else if token == ".." || token.starts_with("../") {
            RootShape::Parent
        } else if token == "." || token.starts_with("./") {
            RootShape::Dot
        } else {
            RootShape::Bare
        }
    }
}

/// Leading run of `.`/`..` segments, e.g. `../..` for `../../src`.
fn relative_prefix(token: &str) -> String {
    let segments: Vec<&str> = token
        .split('/')
        .take_while(|s| *s == "." || *s == ".." || s.is_empty())
        .filter(|s| !s.is_empty())
        .collect();
    let parents: Vec<&str> = segments.iter().copied().filter(|s| *s == "..").collect();
    if parents.is_empty() {
        ".".to_string()
    } else {
        parents.join("/")
    }
}

/// Collapse `.` and `..` components without touching the filesystem.
pub fn normalize(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                if !out.pop() {
                    out.push("..");
                }
            }
            other => out.push(other.as_os_str()),
        }
    }
    out
}

fn to_slash(path: &Path) -> String {
    path.components()
        .map(|c| c.as_os_str().to_string_lossy().into_owned())
        .collect::<Vec<_>>()
        .join("/")
}

/// Display form of `candidate` printed under `root_token`.
///
/// `candidate` is absolute; `anchor` is the directory relative tokens were
/// resolved against.
///
/// # Examples
///
/// ```
/// use std::path::Path;
/// use prin::display::resolve_display;
///
/// let file = Path::new("/home/user/foo/main.py");
/// let anchor = Path::new("/home/user");
/// assert_eq!(resolve_display(Some("."), file, anchor), "./foo/main.py");
/// assert_eq!(resolve_display(None, file, anchor), "foo/main.py");
/// assert_eq!(resolve_display(Some("/home/user"), file, anchor), "/home/user/foo/main.py");
/// ```
pub fn resolve_display(root_token: Option<&str>, candidate: &Path, anchor: &Path) -> String {
    let candidate = normalize(candidate);
    match RootShape::of(root_token) {
        RootShape::Absolute => candidate.to_string_lossy().into_owned(),
        RootShape::Absent | RootShape::Bare => match candidate.strip_prefix(normalize(anchor)) {
            Ok(rel) => to_slash(rel),
            Err(_) => candidate.to_string_lossy().into_owned(),
        },
        RootShape::Dot | RootShape::Parent => {
            let prefix = relative_prefix(root_token.unwrap_or("."));
            let base = normalize(&anchor.join(&prefix));
            match candidate.strip_prefix(&base) {
                Ok(rel) if rel.as_os_str().is_empty() => prefix,
                Ok(rel) => format!("{prefix}/{}", to_slash(rel)),
                Err(_) => candidate.to_string_lossy().into_owned(),
            }
        }
    }
}
