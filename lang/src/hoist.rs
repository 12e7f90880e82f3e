use crate::{
    ast::{Ast, NodeIndex, NodeKind},
    diagnostics::Diagnostics,
};

/// Moves the statements between each `if`/`for` and its closing marker into
/// the construct's own children, after its header chain.
///
/// Always resolves the last unresolved opener first, so inner constructs are
/// closed before the outer ones around them. Closers are matched by kind.
/// Returns false after logging a structural error when a body is empty or an
/// opener has no closer of its kind after it.
pub fn hoist(ast: &mut Ast, diagnostics: &mut Diagnostics) -> bool {
    let root = ast.root;
    loop {
        let Some((pos, head, closer)) = last_unresolved(ast) else {
            return true;
        };
        let opener = &ast.nodes[head];
        let (what, closer_word) = match opener.kind {
            NodeKind::ForLoop => ("for-loop", "endfor"),
            _ => ("if-statement", "endif"),
        };
        let line = opener.line;

        let statements = &ast.nodes[root].children;
        let Some(end) = statements[pos + 1..]
            .iter()
            .position(|stmt| head_kind(ast, *stmt) == Some(closer))
            .map(|offset| pos + 1 + offset)
        else {
            diagnostics.write_error(format!(
                "Missing {} for {} on line {}",
                closer_word, what, line
            ));
            return false;
        };
        if end == pos + 1 {
            diagnostics.write_error(format!("Empty body in {} on line {}", what, line));
            return false;
        }

        let body: Vec<NodeIndex> = ast.nodes[root].children.drain(pos + 1..=end).collect();
        log::trace!("hoisted {} statements into {} on line {}", body.len(), what, line);
        ast.nodes[head].children.extend(body);
    }
}

fn head_kind(ast: &Ast, stmt: NodeIndex) -> Option<NodeKind> {
    ast.first_child(stmt).map(|head| ast.nodes[head].kind)
}

// Position among the program's statements, the construct node, and the kind
// of marker that closes it.
fn last_unresolved(ast: &Ast) -> Option<(usize, NodeIndex, NodeKind)> {
    ast.root()
        .children
        .iter()
        .enumerate()
        .rev()
        .find_map(|(pos, stmt)| {
            let head = ast.first_child(*stmt)?;
            let node = &ast.nodes[head];
            let closer = node.kind.closer()?;
            (node.children.len() <= 1).then_some((pos, head, closer))
        })
}
