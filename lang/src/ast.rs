use derive_more::derive::{Display, From, Into};
use typed_index_collections::TiVec;

#[derive(From, Into, Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub struct NodeIndex(usize);

#[derive(Debug, Display, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NodeKind {
    Program,
    Statement,
    Operator,
    VarDeclaration,
    VarExpression,
    IfStatement,
    EndifMarker,
    ForLoop,
    To,
    Step,
    EndforMarker,
    Identifier,
    NumberLiteral,
    FunctionCall,
    OpenBrace,
    CloseBrace,
    Raw,
    EndOfProgram,
    Error,
}

impl NodeKind {
    /// The marker that closes the body of an opening construct.
    pub fn closer(self) -> Option<NodeKind> {
        match self {
            NodeKind::IfStatement => Some(NodeKind::EndifMarker),
            NodeKind::ForLoop => Some(NodeKind::EndforMarker),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Node {
    pub kind: NodeKind,
    pub text: String,
    pub line: usize,
    pub children: Vec<NodeIndex>,
}

/// Syntax tree stored as an arena.
///
/// Nodes are never removed; restructuring only rewrites `children` lists, so
/// an index stays valid for the life of the tree. Nodes no longer reachable
/// from `root` are simply dead.
#[derive(Debug, Clone)]
pub struct Ast {
    pub nodes: TiVec<NodeIndex, Node>,
    pub root: NodeIndex,
}

impl Ast {
    pub fn new(root_kind: NodeKind, text: &str) -> Self {
        let mut nodes = TiVec::new();
        let root = nodes.push_and_get_key(Node {
            kind: root_kind,
            text: text.to_owned(),
            line: 0,
            children: vec![],
        });
        Ast { nodes, root }
    }

    pub fn push(&mut self, kind: NodeKind, text: &str, line: usize) -> NodeIndex {
        self.nodes.push_and_get_key(Node {
            kind,
            text: text.to_owned(),
            line,
            children: vec![],
        })
    }

    pub fn root(&self) -> &Node {
        &self.nodes[self.root]
    }

    pub fn is_error(&self) -> bool {
        self.root().kind == NodeKind::Error
    }

    pub fn children(&self, idx: NodeIndex) -> impl Iterator<Item = &Node> + '_ {
        self.nodes[idx].children.iter().map(|c| &self.nodes[*c])
    }

    pub fn first_child(&self, idx: NodeIndex) -> Option<NodeIndex> {
        self.nodes[idx].children.first().copied()
    }

    /// Follows first children down from `idx`, yielding `idx` itself first.
    pub fn chain(&self, idx: NodeIndex) -> impl Iterator<Item = NodeIndex> + '_ {
        std::iter::successors(Some(idx), |i| self.first_child(*i))
    }

    /// Renders the reachable tree, one node per line, indented by depth.
    pub fn dump(&self) -> String {
        let mut out = String::new();
        self.dump_node(self.root, 0, &mut out);
        out
    }

    fn dump_node(&self, idx: NodeIndex, depth: usize, out: &mut String) {
        let node = &self.nodes[idx];
        for _ in 0..depth {
            out.push_str("|  ");
        }
        out.push_str(&format!("+--[{}, {}]\n", node.kind, node.text));
        for child in &node.children {
            self.dump_node(*child, depth + 1, out);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chain_walks_first_children() {
        let mut ast = Ast::new(NodeKind::Program, "");
        let decl = ast.push(NodeKind::VarDeclaration, "a", 1);
        let op = ast.push(NodeKind::Operator, "=", 1);
        let lit = ast.push(NodeKind::NumberLiteral, "6", 1);
        ast.nodes[decl].children.push(op);
        ast.nodes[op].children.push(lit);

        let kinds: Vec<NodeKind> = ast.chain(decl).map(|i| ast.nodes[i].kind).collect();
        assert_eq!(
            kinds,
            vec![NodeKind::VarDeclaration, NodeKind::Operator, NodeKind::NumberLiteral]
        );
    }

    #[test]
    fn dump_indents_by_depth() {
        let mut ast = Ast::new(NodeKind::Program, "");
        let stmt = ast.push(NodeKind::Statement, "stmt", 1);
        let end = ast.push(NodeKind::EndOfProgram, "end", 1);
        ast.nodes[stmt].children.push(end);
        let root = ast.root;
        ast.nodes[root].children.push(stmt);

        assert_eq!(
            ast.dump(),
            "+--[Program, ]\n|  +--[Statement, stmt]\n|  |  +--[EndOfProgram, end]\n"
        );
    }
}
