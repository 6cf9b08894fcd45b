//! Python: imports, comments and `__all__` assignments are noise. A
//! module docstring is content.

use tree_sitter::Node;

use super::{find_child_by_kind, node_text, only_noise, Language};

pub fn is_empty(content: &str) -> Result<bool, String> {
    only_noise(Language::Python, content, is_noise)
}

fn is_noise(node: Node, content: &str) -> bool {
    match node.kind() {
        "import_statement" | "import_from_statement" | "future_import_statement" | "comment" => {
            true
        }
        "expression_statement" => is_all_assignment(node, content),
        _ => false,
    }
}

/// `__all__ = [...]` or `__all__ += [...]`.
fn is_all_assignment(node: Node, content: &str) -> bool {
    let assignment = find_child_by_kind(node, "assignment")
        .or_else(|| find_child_by_kind(node, "augmented_assignment"));
    let Some(assignment) = assignment else {
        return false;
    };
    assignment
        .child_by_field_name("left")
        .is_some_and(|left| left.kind() == "identifier" && node_text(left, content) == "__all__")
}
