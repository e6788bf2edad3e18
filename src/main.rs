//! # Gone
//!
//! This binary drives the Gone compiler pipeline. Each stage is reachable
//! as its own subcommand for debugging (`tokens`, `ast`, `check`, `ir`,
//! `llvm`); `build` runs the full pipeline through LLVM emission. Linking
//! the emitted LLVM IR against the runtime and invoking a native compiler
//! is left to external tooling.

mod cli;

use std::fs;

use anyhow::{Context, Result};
use log::{error, info};

use cli::{Cli, Commands, SourceArgs, TokensArgs};
use gone_lib::diagnostics::Reporter;

fn main() {
    let args = Cli::init();
    simple_logger::init_with_level((&args.verbosity).into()).unwrap();

    let result = match &args.command {
        Commands::Tokens(args) => run_tokens(args),
        Commands::Ast(args) => run_ast(args),
        Commands::Check(args) => run_check(args),
        Commands::Ir(args) => run_ir(args),
        Commands::Llvm(args) => run_llvm(args),
        Commands::Build(args) => run_build(args),
    };

    if let Err(err) = result {
        error!("{err}");
        std::process::exit(1);
    }
}

fn read_source(path: &std::path::Path) -> Result<String> {
    fs::read_to_string(path).with_context(|| format!("could not read '{}'", path.display()))
}

fn report(reporter: &Reporter) {
    for diagnostic in reporter.diagnostics() {
        error!("{diagnostic}");
    }
}

fn run_tokens(args: &TokensArgs) -> Result<()> {
    let source = read_source(&args.file)?;
    let mut reporter = Reporter::new();
    let tokens = gone_lib::lexer::Lexer::new(&source).lex(&mut reporter);

    if args.json {
        let json = serde_json::to_string_pretty(&tokens).context("failed to serialize tokens")?;
        println!("{json}");
    } else {
        for token in &tokens {
            println!("{}: {:?} '{}'", token.line, token.kind, token.lexeme);
        }
    }

    if reporter.has_errors() {
        report(&reporter);
        anyhow::bail!("{} lexical error(s)", reporter.count());
    }
    info!("lexed {} token(s)", tokens.len());
    Ok(())
}

fn run_ast(args: &SourceArgs) -> Result<()> {
    let source = read_source(&args.file)?;
    let mut reporter = Reporter::new();
    let tokens = gone_lib::lexer::Lexer::new(&source).lex(&mut reporter);
    if reporter.has_errors() {
        report(&reporter);
        anyhow::bail!("{} lexical error(s)", reporter.count());
    }

    let program = gone_lib::parser::parse_program(tokens, &mut reporter);
    if reporter.has_errors() {
        report(&reporter);
        anyhow::bail!("{} syntax error(s)", reporter.count());
    }

    println!("{program:#?}");
    Ok(())
}

fn run_check(args: &SourceArgs) -> Result<()> {
    let source = read_source(&args.file)?;
    let (program, reporter) = gone_lib::check(&source);
    match program {
        Some(program) => {
            println!("{program:#?}");
            info!("checked '{}' with no errors", args.file.display());
            Ok(())
        }
        None => {
            report(&reporter);
            anyhow::bail!("{} error(s)", reporter.count());
        }
    }
}

fn run_ir(args: &SourceArgs) -> Result<()> {
    let source = read_source(&args.file)?;
    let (module, reporter) = gone_lib::lower(&source);
    match module {
        Some(module) => {
            print!("{}", gone_lib::ir::dump(&module));
            Ok(())
        }
        None => {
            report(&reporter);
            anyhow::bail!("{} error(s)", reporter.count());
        }
    }
}

fn run_llvm(args: &SourceArgs) -> Result<()> {
    let text = emit_llvm(args)?;
    println!("{text}");
    Ok(())
}

fn run_build(args: &SourceArgs) -> Result<()> {
    let text = emit_llvm(args)?;
    let output_path = args.file.with_extension("ll");
    fs::write(&output_path, text)
        .with_context(|| format!("could not write '{}'", output_path.display()))?;
    info!("wrote LLVM IR to '{}'", output_path.display());
    info!(
        "link against the Gone runtime and a native compiler to produce an executable; that step is external to this driver"
    );
    Ok(())
}

fn emit_llvm(args: &SourceArgs) -> Result<String> {
    let source = read_source(&args.file)?;
    let (module, reporter) = gone_lib::lower(&source);
    let module = match module {
        Some(module) => module,
        None => {
            report(&reporter);
            anyhow::bail!("{} error(s)", reporter.count());
        }
    };

    let module_name = args
        .file
        .file_stem()
        .map(|stem| stem.to_string_lossy().to_string())
        .unwrap_or_else(|| "gone_module".to_string());

    let context = inkwell::context::Context::create();
    let llvm_module = gone_lib::codegen::compile(&context, &module_name, &module);
    Ok(llvm_module.print_to_string().to_string())
}
