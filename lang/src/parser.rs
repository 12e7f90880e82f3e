use crate::{
    ast::{Ast, NodeIndex, NodeKind},
    diagnostics::Diagnostics,
    lexer::{Token, TokenKind},
};

/// Builds the flat statement list of a program.
///
/// Each statement is a right-leaning chain of single-child nodes. Bodies of
/// `if`/`for` are not nested yet; see [`crate::hoist`].
///
/// Returns a tree whose root is [`NodeKind::Error`] when there is nothing to
/// parse, lexing already failed, or openers and closers don't pair up.
pub fn build(tokens: &[Token], diagnostics: &mut Diagnostics) -> Ast {
    if tokens.is_empty() {
        diagnostics.write_error("Nothing to parse");
        return Ast::new(NodeKind::Error, "error");
    }
    if diagnostics.has_errors() {
        return Ast::new(NodeKind::Error, "error");
    }

    let opening = tokens
        .iter()
        .filter(|t| matches!(t.kind, TokenKind::If | TokenKind::For))
        .count();
    let closing = tokens
        .iter()
        .filter(|t| matches!(t.kind, TokenKind::Endif | TokenKind::Endfor))
        .count();
    if opening != closing {
        diagnostics.write_error(format!(
            "Unbalanced program: {} if/for but {} endif/endfor",
            opening, closing
        ));
        return Ast::new(NodeKind::Error, "error");
    }

    let mut builder = TreeBuilder {
        tokens,
        cursor: 0,
        ast: Ast::new(NodeKind::Program, ""),
        diagnostics,
    };
    builder.statements();
    builder.ast
}

struct TreeBuilder<'a> {
    tokens: &'a [Token],
    cursor: usize,
    ast: Ast,
    diagnostics: &'a mut Diagnostics,
}

fn ends_chain(kind: TokenKind) -> bool {
    matches!(
        kind,
        TokenKind::Terminator | TokenKind::Endif | TokenKind::Endfor | TokenKind::EndOfProgram
    )
}

impl<'a> TreeBuilder<'a> {
    fn current(&self) -> &'a Token {
        let tokens: &'a [Token] = self.tokens;
        match tokens.get(self.cursor) {
            Some(tok) => tok,
            None => &tokens[tokens.len() - 1],
        }
    }

    fn statements(&mut self) {
        let root = self.ast.root;
        while self.cursor < self.tokens.len() {
            let tok = self.current();
            if tok.kind == TokenKind::Terminator {
                self.cursor += 1;
                continue;
            }

            let stmt = self.ast.push(NodeKind::Statement, "stmt", tok.line);
            let child = self.walk(NodeKind::Statement);
            self.ast.nodes[stmt].children.push(child);
            self.ast.nodes[root].children.push(stmt);
        }
        log::debug!(
            "built {} statements",
            self.ast.nodes[root].children.len()
        );
    }

    /// Produces the next node given the kind of the node it will hang from.
    fn walk(&mut self, parent: NodeKind) -> NodeIndex {
        use NodeKind as N;
        use TokenKind as T;

        let tok = self.current();
        let kind = match (parent, tok.kind) {
            (N::Statement, T::Var) => return self.var_declaration(),
            (N::Statement, T::Identifier) => N::VarExpression,
            (N::Statement, T::If) => N::IfStatement,
            (N::Statement, T::For) => N::ForLoop,
            (N::Statement, T::Raw) => N::Raw,
            (N::Statement, T::FunctionCall) => N::FunctionCall,

            (N::Identifier | N::VarDeclaration | N::VarExpression, T::Operator) => N::Operator,
            (N::Identifier | N::NumberLiteral, T::Colon) => N::Operator,
            (N::Identifier | N::NumberLiteral, T::To) => N::To,
            (N::Identifier | N::NumberLiteral, T::Step) => N::Step,

            (N::Raw, T::Number | T::Identifier) => N::NumberLiteral,
            (
                N::Operator | N::IfStatement | N::ForLoop | N::To | N::Step | N::OpenBrace,
                T::Identifier,
            ) => N::Identifier,
            (N::Operator | N::To | N::Step | N::OpenBrace, T::Number) => N::NumberLiteral,

            (N::FunctionCall, T::OpenBrace) => N::OpenBrace,
            (N::OpenBrace | N::Identifier | N::NumberLiteral, T::CloseBrace) => N::CloseBrace,

            (_, T::Endif) => return self.leaf(N::EndifMarker),
            (_, T::Endfor) => return self.leaf(N::EndforMarker),
            (_, T::EndOfProgram) => return self.leaf(N::EndOfProgram),
            _ => {
                self.diagnostics.write_error(format!(
                    "Syntax error on line {}: unexpected {} `{}`",
                    tok.line, tok.kind, tok.text
                ));
                return self.leaf(N::Error);
            }
        };
        self.node_and_walk(kind)
    }

    fn leaf(&mut self, kind: NodeKind) -> NodeIndex {
        let tok = self.current();
        self.cursor += 1;
        self.ast.push(kind, &tok.text, tok.line)
    }

    /// Creates a node for the current token and, unless the statement ends
    /// here, hangs the next node from it.
    fn node_and_walk(&mut self, kind: NodeKind) -> NodeIndex {
        let tok = self.current();
        let idx = self.ast.push(kind, &tok.text, tok.line);
        self.cursor += 1;
        self.continue_chain(idx, kind, tok.kind != TokenKind::Colon);
        idx
    }

    fn continue_chain(&mut self, idx: NodeIndex, kind: NodeKind, more: bool) {
        if more && !ends_chain(self.current().kind) {
            let child = self.walk(kind);
            self.ast.nodes[idx].children.push(child);
        }
    }

    // `var` NAME, then the rest of the chain hangs from the declaration.
    fn var_declaration(&mut self) -> NodeIndex {
        self.cursor += 1;
        let name = self.current();
        if name.kind != TokenKind::Identifier {
            self.diagnostics.write_error(format!(
                "Syntax error on line {}: expected a variable name after `var`, found {} `{}`",
                name.line, name.kind, name.text
            ));
            return self.leaf(NodeKind::Error);
        }
        let idx = self
            .ast
            .push(NodeKind::VarDeclaration, &name.text, name.line);
        self.cursor += 1;
        self.continue_chain(idx, NodeKind::VarDeclaration, true);
        idx
    }
}
