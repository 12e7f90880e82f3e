use crate::{
    ast::{Ast, NodeIndex, NodeKind},
    diagnostics::Diagnostics,
    meta::{Label, LabelKind, MetaOpcode, FOR_LABEL_BASE},
};

pub const REGISTER_COUNT: usize = 16;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Usage of undeclared variable {name} on line {line}")]
    Undeclared { name: String, line: usize },
    #[error("Declaring an already existing variable {name} on line {line}")]
    Redeclared { name: String, line: usize },
    #[error("Too many variables on line {line}: {name} would need register number {}", REGISTER_COUNT + 1)]
    OutOfRegisters { name: String, line: usize },
    #[error("Invalid number literal {text} on line {line}, expected a decimal value from 0 to 255")]
    BadLiteral { text: String, line: usize },
    #[error("Unknown operator {op} in {context} on line {line}")]
    UnknownOperator {
        op: String,
        context: &'static str,
        line: usize,
    },
    #[error("Invalid function call {name} on line {line}")]
    UnknownFunction { name: String, line: usize },
    #[error("Error parsing {what} on line {line}")]
    Malformed { what: &'static str, line: usize },
    #[error("{closer} without an open {opener} on line {line}")]
    Unopened {
        closer: &'static str,
        opener: &'static str,
        line: usize,
    },
}

/// Script variables in declaration order. A variable's position is the
/// V-register that holds it.
#[derive(Debug, Clone, Default)]
pub struct VariableTable {
    names: Vec<String>,
}

impl VariableTable {
    pub fn lookup(&self, name: &str) -> Option<u8> {
        self.names
            .iter()
            .position(|n| n == name)
            .map(|reg| reg as u8)
    }

    /// Appends `name` and returns its register, or `None` when every
    /// register is taken.
    pub fn declare(&mut self, name: &str) -> Option<u8> {
        if self.names.len() == REGISTER_COUNT {
            return None;
        }
        self.names.push(name.to_owned());
        Some((self.names.len() - 1) as u8)
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }
}

#[derive(Debug, Clone, Copy)]
enum Operand {
    Literal(u8),
    Register(u8),
}

// Registers of an open loop, innermost last.
#[derive(Debug, Clone, Copy)]
struct ForScope {
    index: u8,
    bound: u8,
    step: u8,
    label: Label,
}

/// Lowers a hoisted tree into meta-opcodes.
///
/// Stops at the first statement that fails, logs why, and returns an empty
/// list. Also returns an empty list, without logging anything new, when the
/// tree is an error tree or earlier stages already logged errors.
pub fn generate(ast: &Ast, diagnostics: &mut Diagnostics) -> Vec<MetaOpcode> {
    if ast.is_error() || diagnostics.has_errors() {
        return vec![];
    }

    let mut g = Generator {
        ast,
        diagnostics,
        variables: VariableTable::default(),
        next_if: 1,
        next_for: FOR_LABEL_BASE,
        open_ifs: vec![],
        open_fors: vec![],
        instruction_line: 1,
        ops: vec![],
    };
    if let Err(e) = g.statements(&ast.root().children) {
        g.diagnostics.write_error(e.to_string());
        return vec![];
    }
    log::debug!(
        "generated {} meta-opcodes using {} registers",
        g.ops.len(),
        g.variables.names().len()
    );
    g.ops
}

struct Generator<'a> {
    ast: &'a Ast,
    diagnostics: &'a mut Diagnostics,
    variables: VariableTable,
    next_if: u32,
    next_for: u32,
    open_ifs: Vec<Label>,
    open_fors: Vec<ForScope>,
    // Position of the next real instruction, counting from 1.
    instruction_line: usize,
    ops: Vec<MetaOpcode>,
}

fn xnn(code: u16, x: u8, nn: u8) -> MetaOpcode {
    MetaOpcode::Word(code << 12 | (x as u16) << 8 | nn as u16)
}

fn xyn(code: u16, x: u8, y: u8, n: u16) -> MetaOpcode {
    MetaOpcode::Word(code << 12 | (x as u16) << 8 | (y as u16) << 4 | n)
}

impl<'a> Generator<'a> {
    fn statements(&mut self, statements: &[NodeIndex]) -> Result<(), Error> {
        let ast = self.ast;
        for &stmt in statements {
            let Some(head) = ast.first_child(stmt) else {
                return Err(Error::Malformed {
                    what: "statement",
                    line: ast.nodes[stmt].line,
                });
            };
            let node = &ast.nodes[head];
            log::trace!("src [{}] dest [{}]", node.line, self.instruction_line);

            let ops = match node.kind {
                NodeKind::VarDeclaration => {
                    let (_, op) = self.var_declaration(head)?;
                    vec![op]
                }
                NodeKind::VarExpression => vec![self.var_expression(head)?],
                NodeKind::IfStatement => {
                    let header = self.open_if(head)?;
                    self.emit(header);
                    self.statements(&node.children[1..])?;
                    continue;
                }
                NodeKind::EndifMarker => vec![self.close_if(node.line)?],
                NodeKind::ForLoop => {
                    let header = self.open_for(head)?;
                    self.emit(header);
                    self.statements(&node.children[1..])?;
                    continue;
                }
                NodeKind::EndforMarker => self.close_for(node.line)?,
                NodeKind::FunctionCall => vec![self.function_call(head)?],
                NodeKind::Raw => {
                    let word = ast
                        .first_child(head)
                        .filter(|w| ast.nodes[*w].kind == NodeKind::NumberLiteral)
                        .ok_or(Error::Malformed {
                            what: "raw statement",
                            line: node.line,
                        })?;
                    vec![MetaOpcode::Raw(ast.nodes[word].text.clone())]
                }
                NodeKind::EndOfProgram => vec![MetaOpcode::End],
                _ => {
                    return Err(Error::Malformed {
                        what: "statement",
                        line: node.line,
                    })
                }
            };
            self.emit(ops);
        }
        Ok(())
    }

    fn emit(&mut self, ops: Vec<MetaOpcode>) {
        self.instruction_line += ops.iter().filter(|op| !op.is_marker()).count();
        self.ops.extend(ops);
    }

    fn kind(&self, idx: NodeIndex) -> NodeKind {
        self.ast.nodes[idx].kind
    }

    fn text(&self, idx: NodeIndex) -> &'a str {
        let ast: &'a Ast = self.ast;
        &ast.nodes[idx].text
    }

    fn resolve(&self, name: &str, line: usize) -> Result<u8, Error> {
        self.variables.lookup(name).ok_or_else(|| Error::Undeclared {
            name: name.to_owned(),
            line,
        })
    }

    fn operand(&self, idx: NodeIndex) -> Result<Operand, Error> {
        let node = &self.ast.nodes[idx];
        match node.kind {
            NodeKind::NumberLiteral => node
                .text
                .parse::<u8>()
                .map(Operand::Literal)
                .map_err(|_| Error::BadLiteral {
                    text: node.text.clone(),
                    line: node.line,
                }),
            NodeKind::Identifier => self.resolve(&node.text, node.line).map(Operand::Register),
            _ => Err(Error::Malformed {
                what: "operand",
                line: node.line,
            }),
        }
    }

    // `name OP operand` with nothing after the operand.
    fn assignment(
        &self,
        head: NodeIndex,
        what: &'static str,
    ) -> Result<(&'a str, NodeIndex), Error> {
        let line = self.ast.nodes[head].line;
        let links: Vec<NodeIndex> = self.ast.chain(head).skip(1).collect();
        match links.as_slice() {
            [op, operand] if self.kind(*op) == NodeKind::Operator => {
                Ok((self.text(*op), *operand))
            }
            _ => Err(Error::Malformed { what, line }),
        }
    }

    fn var_declaration(&mut self, head: NodeIndex) -> Result<(u8, MetaOpcode), Error> {
        let line = self.ast.nodes[head].line;
        let (op, value) = self.assignment(head, "variable declaration")?;
        if op != "=" {
            return Err(Error::UnknownOperator {
                op: op.to_owned(),
                context: "declaration",
                line,
            });
        }
        self.declare(self.text(head), value, line)
    }

    /// Allocates the next register for `name` and initialises it from
    /// `value`. Loop headers declare their hidden variables through here too.
    fn declare(
        &mut self,
        name: &str,
        value: NodeIndex,
        line: usize,
    ) -> Result<(u8, MetaOpcode), Error> {
        if self.variables.lookup(name).is_some() {
            return Err(Error::Redeclared {
                name: name.to_owned(),
                line,
            });
        }
        let value = self.operand(value)?;
        let reg = self
            .variables
            .declare(name)
            .ok_or_else(|| Error::OutOfRegisters {
                name: name.to_owned(),
                line,
            })?;
        if reg as usize == REGISTER_COUNT - 1 {
            self.diagnostics.write_warning(format!(
                "Variable {} on line {} lives in VF, which arithmetic overwrites",
                name, line
            ));
        }

        let op = match value {
            // 6XNN  Vx = NN
            Operand::Literal(nn) => xnn(0x6, reg, nn),
            // 8XY0  Vx = Vy
            Operand::Register(y) => xyn(0x8, reg, y, 0x0),
        };
        Ok((reg, op))
    }

    fn var_expression(&mut self, head: NodeIndex) -> Result<MetaOpcode, Error> {
        let line = self.ast.nodes[head].line;
        let (op, value) = self.assignment(head, "expression")?;
        let x = self.resolve(self.text(head), line)?;
        let unknown = || Error::UnknownOperator {
            op: op.to_owned(),
            context: "expression",
            line,
        };

        Ok(match self.operand(value)? {
            Operand::Literal(nn) => match op {
                "=" => xnn(0x6, x, nn),
                "+=" => xnn(0x7, x, nn),
                _ => return Err(unknown()),
            },
            Operand::Register(y) => {
                let n = match op {
                    "=" => 0x0,
                    "|=" => 0x1,
                    "&=" => 0x2,
                    "^=" => 0x3,
                    "+=" => 0x4,
                    "-=" => 0x5,
                    _ => return Err(unknown()),
                };
                xyn(0x8, x, y, n)
            }
        })
    }

    fn warn_missing_colon(&mut self, rest: &[NodeIndex], what: &str, line: usize) {
        let closed = matches!(rest, [colon] if self.text(*colon) == ":");
        if !closed {
            self.diagnostics.write_warning(format!(
                "Missing `:` after {} header on line {}",
                what, line
            ));
        }
    }

    // Skip-if-true followed by a jump past the body.
    fn open_if(&mut self, head: NodeIndex) -> Result<Vec<MetaOpcode>, Error> {
        let line = self.ast.nodes[head].line;
        let malformed = Error::Malformed {
            what: "if-statement",
            line,
        };
        let Some(first) = self.ast.first_child(head) else {
            return Err(malformed);
        };
        let links: Vec<NodeIndex> = self.ast.chain(first).collect();
        let [lhs, cmp, rhs, rest @ ..] = links.as_slice() else {
            return Err(malformed);
        };
        if self.kind(*lhs) != NodeKind::Identifier || self.kind(*cmp) != NodeKind::Operator {
            return Err(malformed);
        }
        self.warn_missing_colon(rest, "if-statement", line);

        let x = self.resolve(self.text(*lhs), line)?;
        let skip = match (self.operand(*rhs)?, self.text(*cmp)) {
            (Operand::Literal(nn), "==") => xnn(0x3, x, nn),
            (Operand::Literal(nn), "!=") => xnn(0x4, x, nn),
            (Operand::Register(y), "==") => xyn(0x5, x, y, 0x0),
            (Operand::Register(y), "!=") => xyn(0x9, x, y, 0x0),
            (_, op) => {
                return Err(Error::UnknownOperator {
                    op: op.to_owned(),
                    context: "if-statement",
                    line,
                })
            }
        };

        let label = Label {
            kind: LabelKind::If,
            id: self.next_if,
        };
        self.next_if += 1;
        self.open_ifs.push(label);
        Ok(vec![skip, MetaOpcode::Jump(label)])
    }

    fn close_if(&mut self, line: usize) -> Result<MetaOpcode, Error> {
        self.open_ifs
            .pop()
            .map(MetaOpcode::Label)
            .ok_or(Error::Unopened {
                closer: "endif",
                opener: "if-statement",
                line,
            })
    }

    // Declares the index, `<index>to` and `<index>step`, then marks the top
    // of the loop.
    fn open_for(&mut self, head: NodeIndex) -> Result<Vec<MetaOpcode>, Error> {
        let line = self.ast.nodes[head].line;
        let malformed = Error::Malformed {
            what: "for-loop",
            line,
        };
        let Some(first) = self.ast.first_child(head) else {
            return Err(malformed);
        };
        let links: Vec<NodeIndex> = self.ast.chain(first).collect();
        let [var, eq, start, to, bound, step, increment, rest @ ..] = links.as_slice() else {
            return Err(malformed);
        };
        let shape_ok = self.kind(*var) == NodeKind::Identifier
            && self.kind(*eq) == NodeKind::Operator
            && self.text(*eq) == "="
            && self.kind(*to) == NodeKind::To
            && self.kind(*step) == NodeKind::Step;
        if !shape_ok {
            return Err(malformed);
        }
        self.warn_missing_colon(rest, "for-loop", line);

        let name = self.text(*var);
        let (index, init_index) = self.declare(name, *start, line)?;
        let (bound, init_bound) = self.declare(&format!("{}to", name), *bound, line)?;
        let (step, init_step) = self.declare(&format!("{}step", name), *increment, line)?;

        let label = Label {
            kind: LabelKind::For,
            id: self.next_for,
        };
        self.next_for += 1;
        self.open_fors.push(ForScope {
            index,
            bound,
            step,
            label,
        });
        Ok(vec![
            init_index,
            init_bound,
            init_step,
            MetaOpcode::Label(label),
        ])
    }

    // Adds the step, leaves the loop once the index equals the bound, and
    // otherwise jumps back to the top.
    fn close_for(&mut self, line: usize) -> Result<Vec<MetaOpcode>, Error> {
        let scope = self.open_fors.pop().ok_or(Error::Unopened {
            closer: "endfor",
            opener: "for-loop",
            line,
        })?;
        Ok(vec![
            // 8XY4  Vx += Vy
            xyn(0x8, scope.index, scope.step, 0x4),
            // 5XY0  skip if Vx == Vy
            xyn(0x5, scope.index, scope.bound, 0x0),
            MetaOpcode::Jump(scope.label),
        ])
    }

    fn function_call(&mut self, head: NodeIndex) -> Result<MetaOpcode, Error> {
        let node = &self.ast.nodes[head];
        let links: Vec<NodeKind> = self.ast.chain(head).skip(1).map(|i| self.kind(i)).collect();
        if links != [NodeKind::OpenBrace, NodeKind::CloseBrace] {
            return Err(Error::Malformed {
                what: "function call",
                line: node.line,
            });
        }
        match node.text.as_str() {
            // 00E0  clear the display
            "cls" => Ok(MetaOpcode::Word(0x00E0)),
            _ => Err(Error::UnknownFunction {
                name: node.text.clone(),
                line: node.line,
            }),
        }
    }
}
