//! TypeScript and JavaScript. Imports, re-exports, directives, the hashbang
//! and plain comments are noise. A top-level `/** ... */` block is content.

use tree_sitter::Node;

use super::{find_child_by_kind, node_text, only_noise, Language};

pub fn is_empty(content: &str, language: Language) -> Result<bool, String> {
    only_noise(language, content, is_noise)
}

fn is_noise(node: Node, content: &str) -> bool {
    match node.kind() {
        "import_statement" | "hash_bang_line" => true,
        "comment" => {
            let text = node_text(node, content);
            !(text.starts_with("/**") && text != "/**/")
        }
        "export_statement" => {
            node.child_by_field_name("declaration").is_none()
                && node.child_by_field_name("value").is_none()
        }
        "expression_statement" => is_directive(node, content),
        _ => false,
    }
}

/// `"use strict";` and friends.
fn is_directive(node: Node, content: &str) -> bool {
    find_child_by_kind(node, "string").is_some_and(|s| {
        let text = node_text(s, content);
        text.trim_matches(|c| c == '"' || c == '\'').starts_with("use ")
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_barrel_file_is_empty() {
        let code = "// barrel\nimport { a } from './a';\nexport { a };\nexport * from './b';\n";
        assert!(is_empty(code, Language::TypeScript).unwrap());
    }

    #[test]
    fn test_directive_is_noise() {
        assert!(is_empty("'use strict';\nimport x from 'y';\n", Language::JavaScript).unwrap());
    }

    #[test]
    fn test_jsdoc_block_is_content() {
        let code = "/** Module docs. */\nimport x from 'y';\n";
        assert!(!is_empty(code, Language::TypeScript).unwrap());
    }

    #[test]
    fn test_declarations_are_content() {
        assert!(!is_empty("export function f() {}\n", Language::TypeScript).unwrap());
        assert!(!is_empty("export default 42;\n", Language::JavaScript).unwrap());
        assert!(!is_empty("const App = () => <div/>;\n", Language::Tsx).unwrap());
    }
}
