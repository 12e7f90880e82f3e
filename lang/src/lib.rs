pub mod ast;
pub mod bytecode;
pub mod codegen;
pub mod compiler;
pub mod debugger;
pub mod diagnostics;
pub mod disasm;
pub mod hoist;
pub mod lexer;
pub mod linker;
pub mod meta;
pub mod parser;
pub mod source;
pub mod vm;

pub use compiler::{compile, compile_with, CompileError, CompileOptions};
