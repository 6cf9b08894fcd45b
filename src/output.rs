//! Output formatting for prin.
//!
//! Each printed entry becomes one block in the selected style. Formatters
//! only render strings; the printer owns the writer.

use std::fmt;
use std::str::FromStr;

use crate::errors::PrinError;

/// Output style selected with `--tag`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum OutputTag {
    /// `<path>` ... `</path>` blocks (default).
    #[default]
    Xml,
    /// `## FILE: path` headings.
    Md,
}

impl OutputTag {
    pub fn as_str(&self) -> &'static str {
        match self {
            OutputTag::Xml => "xml",
            OutputTag::Md => "md",
        }
    }
}

impl fmt::Display for OutputTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OutputTag {
    type Err = PrinError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "xml" => Ok(OutputTag::Xml),
            "md" | "markdown" => Ok(OutputTag::Md),
            other => Err(PrinError::Config(format!(
                "unknown tag {other:?} (expected xml or md)"
            ))),
        }
    }
}

/// Renders one entry.
pub trait Formatter {
    /// A text body.
    fn text(&self, path: &str, body: &str) -> String;

    /// A binary entry, printed without its body.
    fn binary(&self, path: &str) -> String;
}

// ============================================================================
// Formatters
// ============================================================================

#[derive(Debug, Clone, Copy, Default)]
pub struct XmlFormatter;

impl Formatter for XmlFormatter {
    fn text(&self, path: &str, body: &str) -> String {
        let mut out = String::with_capacity(body.len() + 2 * path.len() + 8);
        out.push('<');
        out.push_str(path);
        out.push_str(">\n");
        out.push_str(body);
        if !body.ends_with('\n') {
            out.push('\n');
        }
        out.push_str("</");
        out.push_str(path);
        out.push_str(">\n");
        out
    }

    fn binary(&self, path: &str) -> String {
        format!("<{path}/>\n")
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct MarkdownFormatter;

impl MarkdownFormatter {
    fn rule(path: &str) -> String {
        "=".repeat((path.chars().count() + 8).max(20))
    }
}

impl Formatter for MarkdownFormatter {
    fn text(&self, path: &str, body: &str) -> String {
        format!("## FILE: {path}\n{}\n{body}\n\n---\n", Self::rule(path))
    }

    fn binary(&self, path: &str) -> String {
        format!("## FILE: {path}\n{}\n\n---\n", Self::rule(path))
    }
}

/// Paths only, one per line (`--only-headers`).
#[derive(Debug, Clone, Copy, Default)]
pub struct HeaderFormatter;

impl Formatter for HeaderFormatter {
    fn text(&self, path: &str, _body: &str) -> String {
        format!("{}\n", path.trim_end_matches('\n'))
    }

    fn binary(&self, path: &str) -> String {
        self.text(path, "")
    }
}

/// The formatter for a tag.
pub fn formatter_for(tag: OutputTag) -> Box<dyn Formatter + Send + Sync> {
    match tag {
        OutputTag::Xml => Box::new(XmlFormatter),
        OutputTag::Md => Box::new(MarkdownFormatter),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_xml_adds_trailing_newline() {
        assert_eq!(XmlFormatter.text("a.py", "x = 1"), "<a.py>\nx = 1\n</a.py>\n");
        assert_eq!(XmlFormatter.text("a.py", "x = 1\n"), "<a.py>\nx = 1\n</a.py>\n");
    }

    #[test]
    fn test_xml_binary_is_self_closing() {
        assert_eq!(XmlFormatter.binary("img.png"), "<img.png/>\n");
    }

    #[test]
    fn test_markdown_rule_width() {
        let short = MarkdownFormatter.text("a.md", "hi");
        assert_eq!(short, format!("## FILE: a.md\n{}\nhi\n\n---\n", "=".repeat(20)));

        let path = "src/some/deeply/nested/module.rs";
        let long = MarkdownFormatter.binary(path);
        assert!(long.contains(&"=".repeat(path.len() + 8)));
        assert!(long.ends_with("\n\n---\n"));
    }

    #[test]
    fn test_headers_ignore_body() {
        assert_eq!(HeaderFormatter.text("a.py", "ignored"), "a.py\n");
        assert_eq!(HeaderFormatter.binary("b.bin"), "b.bin\n");
    }

    #[test]
    fn test_tag_parsing() {
        assert_eq!("XML".parse::<OutputTag>().unwrap(), OutputTag::Xml);
        assert_eq!("md".parse::<OutputTag>().unwrap(), OutputTag::Md);
        assert!("json".parse::<OutputTag>().is_err());
        assert_eq!(OutputTag::default().to_string(), "xml");
    }
}
