//! Front-end and mid-end for the Gone language: lexing, parsing,
//! semantic checking, IR generation and LLVM emission.
//!
//! Stages are strictly forward: each one consumes the previous stage's
//! output and reports through a shared [`diagnostics::Reporter`]. A
//! driver should stop the pipeline as soon as the reporter shows any
//! errors; generating IR or LLVM text from a program that failed
//! checking is unsupported.

pub mod checker;
pub mod codegen;
pub mod diagnostics;
pub mod ir;
pub mod lexer;
pub mod parser;
pub mod types;

use diagnostics::Reporter;
use parser::ast::Program;

/// Runs the lexer, parser and checker over `source`, stopping at the
/// first stage that reports an error. Returns the checked AST alongside
/// the reporter accumulated across every stage that ran.
pub fn check(source: &str) -> (Option<Program>, Reporter) {
    let mut reporter = Reporter::new();

    let tokens = lexer::Lexer::new(source).lex(&mut reporter);
    if reporter.has_errors() {
        return (None, reporter);
    }

    let program = parser::parse_program(tokens, &mut reporter);
    if reporter.has_errors() {
        return (None, reporter);
    }

    checker::Checker::new(&mut reporter).check_program(&program);
    if reporter.has_errors() {
        return (None, reporter);
    }

    (Some(program), reporter)
}

/// Runs the full pipeline through IR generation. Returns `None` if any
/// stage up to and including checking reported an error.
pub fn lower(source: &str) -> (Option<ir::Module>, Reporter) {
    let (program, reporter) = check(source);
    match program {
        Some(program) if !reporter.has_errors() => {
            (Some(ir::gen::generate(&program)), reporter)
        }
        _ => (None, reporter),
    }
}
