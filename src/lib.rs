pub mod ast;
pub mod config;
pub mod parser;
pub mod span;
pub mod tokenizer;
pub mod tree_walk_interpreter;

use ast::Stmt;
use config::Config;
use tree_walk_interpreter::{ExecutionError, Interpreter, Value};

#[derive(Debug, thiserror::Error)]
pub enum InterpretError {
    #[error(transparent)]
    Tokenize(#[from] tokenizer::TokenizeError),
    #[error(transparent)]
    Syntax(#[from] parser::SyntaxError),
    #[error(transparent)]
    Execution(#[from] ExecutionError),
}

impl InterpretError {
    pub fn category(&self) -> &'static str {
        match self {
            InterpretError::Tokenize(_) | InterpretError::Syntax(_) => "SyntaxError",
            InterpretError::Execution(e) => e.kind.category(),
        }
    }
}

/// Tokenizes and parses `source` into a root block.
pub fn parse_source(source: &str, config: &Config) -> Result<Stmt, InterpretError> {
    let tokens = tokenizer::tokens(source)?;
    Ok(parser::program_with_limit(&tokens, config.parse_depth_limit)?)
}

/// Parses `source` and runs it in `interpreter`, returning the completion value.
pub fn run(source: &str, interpreter: &mut Interpreter) -> Result<Value, InterpretError> {
    let program = parse_source(source, interpreter.config())?;
    Ok(interpreter.interpret(&program)?)
}
