//! Go: the package clause, imports and comments are noise, except a
//! package doc comment directly above the package clause.

use tree_sitter::Node;

use super::{only_noise, Language};

pub fn is_empty(content: &str) -> Result<bool, String> {
    only_noise(Language::Go, content, |node, _| is_noise(node))
}

fn is_noise(node: Node) -> bool {
    match node.kind() {
        "package_clause" | "import_declaration" => true,
        "comment" => !is_package_doc(node),
        _ => false,
    }
}

fn is_package_doc(comment: Node) -> bool {
    comment.next_named_sibling().is_some_and(|next| {
        next.kind() == "package_clause"
            && next.start_position().row <= comment.end_position().row + 1
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_package_and_imports_are_empty() {
        let code = "package util\n\n// stray\n\nimport \"fmt\"\n";
        assert!(is_empty(code).unwrap());
    }

    #[test]
    fn test_package_doc_is_content() {
        let code = "// Package util does things.\npackage util\n";
        assert!(!is_empty(code).unwrap());
    }

    #[test]
    fn test_detached_comment_is_noise() {
        let code = "// Copyright notice.\n\npackage util\n";
        assert!(is_empty(code).unwrap());
    }

    #[test]
    fn test_declarations_are_content() {
        assert!(!is_empty("package util\n\nfunc F() {}\n").unwrap());
    }
}
