//! Rust: `use`, `extern crate`, bodiless `mod` declarations, attributes and
//! plain comments are noise. Doc comments are content.

use tree_sitter::Node;

use super::{find_child_by_kind, node_text, only_noise, Language};

pub fn is_empty(content: &str) -> Result<bool, String> {
    only_noise(Language::Rust, content, is_noise)
}

fn is_noise(node: Node, content: &str) -> bool {
    match node.kind() {
        "use_declaration" | "extern_crate_declaration" | "inner_attribute_item"
        | "attribute_item" => true,
        "mod_item" => find_child_by_kind(node, "declaration_list").is_none(),
        "line_comment" | "block_comment" => !is_doc_comment(node_text(node, content)),
        _ => false,
    }
}

fn is_doc_comment(text: &str) -> bool {
    if text.starts_with("//!") || text.starts_with("/*!") {
        return true;
    }
    (text.starts_with("///") && !text.starts_with("////"))
        || (text.starts_with("/**") && !text.starts_with("/***") && text != "/**/")
}
