use derive_more::derive::Display;

use crate::{
    ast::Ast,
    bytecode, codegen,
    diagnostics::Diagnostics,
    hoist, lexer,
    lexer::Token,
    linker,
    meta::MetaOpcode,
    parser,
};

/// The stage a compile stopped at.
#[derive(Debug, Display, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Lexical,
    Structural,
    Syntax,
    Semantic,
    Resolution,
    Conversion,
}

#[derive(Debug, thiserror::Error)]
#[error("{stage} error\n{diagnostics}")]
pub struct CompileError {
    pub stage: Stage,
    pub diagnostics: Diagnostics,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct CompileOptions {
    /// Print the collected diagnostics to stderr when compilation fails.
    pub print_errors: bool,
}

/// Everything a successful compile produced along the way.
#[derive(Debug, Clone)]
pub struct Artifacts {
    pub tokens: Vec<Token>,
    pub ast: Ast,
    pub meta: Vec<MetaOpcode>,
    pub relocated: Vec<MetaOpcode>,
    pub words: Vec<u16>,
    /// Warnings and messages; never holds errors.
    pub diagnostics: Diagnostics,
}

pub fn compile(source: &str) -> Result<Vec<u16>, CompileError> {
    compile_with(source, CompileOptions::default()).map(|a| a.words)
}

pub fn compile_with(source: &str, options: CompileOptions) -> Result<Artifacts, CompileError> {
    let mut diagnostics = Diagnostics::new();
    run_stages(source, &mut diagnostics).map_err(|stage| {
        if options.print_errors {
            eprint!("{}", diagnostics);
        }
        CompileError { stage, diagnostics }
    })
}

fn run_stages(source: &str, diagnostics: &mut Diagnostics) -> Result<Artifacts, Stage> {
    let tokens = lexer::tokenize(source, diagnostics);
    if diagnostics.has_errors() {
        return Err(Stage::Lexical);
    }

    let mut ast = parser::build(&tokens, diagnostics);
    if ast.is_error() {
        return Err(Stage::Structural);
    }
    if diagnostics.has_errors() {
        return Err(Stage::Syntax);
    }
    if !hoist::hoist(&mut ast, diagnostics) {
        return Err(Stage::Structural);
    }

    let meta = codegen::generate(&ast, diagnostics);
    if diagnostics.has_errors() {
        return Err(Stage::Semantic);
    }

    let relocated = linker::resolve(meta.clone()).map_err(|e| {
        diagnostics.write_error(e.to_string());
        Stage::Resolution
    })?;
    let words = bytecode::finalize(&relocated).map_err(|e| {
        diagnostics.write_error(e.to_string());
        Stage::Conversion
    })?;

    log::debug!("compiled to {} words", words.len());
    Ok(Artifacts {
        tokens,
        ast,
        meta,
        relocated,
        words,
        diagnostics: std::mem::take(diagnostics),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn compiles_to_words() {
        assert_eq!(
            compile("var a = 6\nif a == 1: a += 11 endif").unwrap(),
            vec![0x6006, 0x3001, 0x1208, 0x700B]
        );
    }

    #[test]
    fn stage_of_each_failure() {
        let cases = [
            ("var a = \u{e4}", Stage::Lexical),
            ("if a == 1:", Stage::Structural),
            ("var a = 1\nif a == 1:\nendif", Stage::Structural),
            ("var a 1", Stage::Syntax),
            ("a += 1", Stage::Semantic),
            ("raw zz", Stage::Conversion),
        ];
        for (source, stage) in cases {
            let err = compile(source).unwrap_err();
            assert_eq!(err.stage, stage, "{:?}", source);
            assert!(err.diagnostics.has_errors());
        }
    }

    #[test]
    fn warnings_survive_success() {
        let artifacts = compile_with(
            "var a = 1\nif a == 1\ncls()\nendif",
            CompileOptions::default(),
        )
        .unwrap();
        assert_eq!(artifacts.diagnostics.read_warnings().len(), 1);
        assert_eq!(artifacts.words.len(), 4);
        assert_eq!(artifacts.meta.len(), 6);
    }

    #[test]
    fn artifacts_carry_the_compile_diagnostics() {
        let artifacts =
            compile_with("var a = 1
if a == 1
cls()
endif", CompileOptions::default()).unwrap();
        assert_eq!(
            artifacts.diagnostics.read_warnings(),
            &["Missing `:` after if-statement header on line 2".to_owned()]
        );
        assert!(!artifacts.diagnostics.has_errors());
    }

    #[test]
    fn error_display_names_the_stage() {
        let err = compile("a += 1").unwrap_err();
        assert_eq!(
            err.to_string(),
            "Semantic error\nerror: Usage of undeclared variable a on line 1\n"
        );
    }
}
