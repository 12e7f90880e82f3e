use derive_more::derive::Display;
use pest::{
    error::{InputLocation, LineColLocation},
    Parser,
};
use pest_derive::Parser;

use crate::diagnostics::Diagnostics;

#[derive(Parser)]
#[grammar = "lexer.pest"]
struct ScriptLexer;

#[derive(Debug, Display, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TokenKind {
    #[display("var")]
    Var,
    #[display("if")]
    If,
    #[display("endif")]
    Endif,
    #[display("for")]
    For,
    #[display("to")]
    To,
    #[display("step")]
    Step,
    #[display("endfor")]
    Endfor,
    #[display("raw")]
    Raw,
    #[display("identifier")]
    Identifier,
    #[display("function call")]
    FunctionCall,
    #[display("operator")]
    Operator,
    #[display("number literal")]
    Number,
    #[display("colon")]
    Colon,
    #[display("open brace")]
    OpenBrace,
    #[display("close brace")]
    CloseBrace,
    #[display("end of statement")]
    Terminator,
    #[display("end of program")]
    EndOfProgram,
}

impl TokenKind {
    fn keyword(word: &str) -> Option<Self> {
        Some(match word {
            "var" => Self::Var,
            "if" => Self::If,
            "endif" => Self::Endif,
            "for" => Self::For,
            "to" => Self::To,
            "step" => Self::Step,
            "endfor" => Self::Endfor,
            "raw" => Self::Raw,
            _ => return None,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    pub kind: TokenKind,
    pub text: String,
    pub line: usize,
}

/// Splits a script into tokens.
///
/// Returns an empty list after logging a lexical error if the source contains
/// a character the language has no use for. Otherwise the list always ends
/// with a single end-of-program token and never holds two terminators in a
/// row.
pub fn tokenize(source: &str, diagnostics: &mut Diagnostics) -> Vec<Token> {
    let mut code = source.to_ascii_lowercase();
    if !code.ends_with([';', '\n']) {
        code.push(';');
    }

    let pairs = match ScriptLexer::parse(Rule::file, &code) {
        Ok(pairs) => pairs,
        Err(err) => {
            report_unexpected(&code, &err, diagnostics);
            return vec![];
        }
    };

    let mut tokens: Vec<Token> = vec![];
    let mut line = 1;
    let mut pairs = pairs.peekable();
    while let Some(pair) = pairs.next() {
        let text = pair.as_str();
        let kind = match pair.as_rule() {
            Rule::terminator => {
                let at = line;
                if text == "\n" {
                    line += 1;
                }
                if tokens.last().map(|t| t.kind) != Some(TokenKind::Terminator) {
                    tokens.push(Token {
                        kind: TokenKind::Terminator,
                        text: ";".to_owned(),
                        line: at,
                    });
                }
                continue;
            }
            Rule::colon => TokenKind::Colon,
            Rule::open_brace => TokenKind::OpenBrace,
            Rule::close_brace => TokenKind::CloseBrace,
            Rule::operator => TokenKind::Operator,
            Rule::number => TokenKind::Number,
            Rule::word => TokenKind::keyword(text).unwrap_or_else(|| {
                if pairs.peek().map(|p| p.as_rule()) == Some(Rule::open_brace) {
                    TokenKind::FunctionCall
                } else {
                    TokenKind::Identifier
                }
            }),
            Rule::EOI => break,
            rule => unreachable!("silent lexer rule produced a pair: {:?}", rule),
        };
        tokens.push(Token {
            kind,
            text: text.to_owned(),
            line,
        });
    }

    tokens.push(Token {
        kind: TokenKind::EndOfProgram,
        text: "end".to_owned(),
        line,
    });
    log::debug!("lexed {} tokens over {} lines", tokens.len(), line);
    tokens
}

fn report_unexpected(code: &str, err: &pest::error::Error<Rule>, diagnostics: &mut Diagnostics) {
    let pos = match err.location {
        InputLocation::Pos(pos) => pos,
        InputLocation::Span((start, _)) => start,
    };
    let line = match err.line_col {
        LineColLocation::Pos((line, _)) => line,
        LineColLocation::Span((line, _), _) => line,
    };
    let ch = code[pos..].chars().next().unwrap_or(' ');
    diagnostics.write_error(format!("Unexpected character '{}' on line {}", ch, line));
}
