//! # Cli
//!
//! This module contains everything needed for parsing the CLI arguments for Gone.

use clap::{Parser, Subcommand, ValueEnum};

/// Struct containing the CLI configuration for Gone.
#[derive(Parser, Debug)]
#[command(author, version, about)]
#[command(propagate_version = true)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Specify the log level of the compiler.
    #[arg(value_enum, short, long, default_value_t = LogLevel::default())]
    pub verbosity: LogLevel,
}

impl Cli {
    pub fn init() -> Self {
        Cli::parse()
    }
}

/// Enum for specifying the log level of Gone.
#[derive(ValueEnum, Clone, Default, Debug)]
pub enum LogLevel {
    /// The default log level. Only critical errors will be logged.
    #[default]
    #[value(alias("0"))]
    Error,

    /// A log level, where warnings are also logged.
    #[value(alias("1"))]
    Warn,

    /// Also log information about the general state of the compiler.
    #[value(alias("2"))]
    Info,

    /// Log everything which happens internally in the compiler.
    #[value(alias("3"))]
    Debug,

    /// Log extra information, including trace-level internals.
    #[value(alias("4"))]
    Trace,
}

impl From<&LogLevel> for log::Level {
    fn from(value: &LogLevel) -> Self {
        match value {
            LogLevel::Error => log::Level::Error,
            LogLevel::Warn => log::Level::Warn,
            LogLevel::Info => log::Level::Info,
            LogLevel::Debug => log::Level::Debug,
            LogLevel::Trace => log::Level::Trace,
        }
    }
}

/// Each stage of the pipeline is reachable as its own subcommand, plus a
/// `build` subcommand that runs the full pipeline through LLVM emission.
#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Lex a source file and print its token stream.
    Tokens(TokensArgs),

    /// Parse a source file and print its AST.
    Ast(SourceArgs),

    /// Check a source file and print its (checked) AST, or the reported errors.
    Check(SourceArgs),

    /// Lower a source file to IR and print its CFGs.
    Ir(SourceArgs),

    /// Emit LLVM IR text for a source file.
    Llvm(SourceArgs),

    /// Run the full pipeline end to end; exits non-zero on any error.
    Build(SourceArgs),
}

#[derive(clap::Args, Debug, Clone)]
pub struct SourceArgs {
    /// The path to the Gone source file.
    #[arg(index = 1)]
    pub file: std::path::PathBuf,
}

#[derive(clap::Args, Debug, Clone)]
pub struct TokensArgs {
    /// The path to the Gone source file.
    #[arg(index = 1)]
    pub file: std::path::PathBuf,

    /// Print the token stream as JSON instead of one token per line.
    #[arg(long)]
    pub json: bool,
}
