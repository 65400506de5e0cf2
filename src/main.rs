use std::{
    io::Write,
    path::{Path, PathBuf},
    process::ExitCode,
};

use clap::{Args, Parser, Subcommand};
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;
use treewalk::{
    ast::{self, DEFAULT_DISCRIMINANT},
    config::{Config, DEFAULT_EVAL_DEPTH_LIMIT, DEFAULT_PARSE_DEPTH_LIMIT},
    tree_walk_interpreter::{Interpreter, Value},
    InterpretError,
};

#[derive(Debug, Parser)]
#[command(name = "treewalk", about = "Parse and evaluate a small statement language")]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,

    #[command(flatten)]
    globals: GlobalArgs,
}

impl Cli {
    pub fn command(&self) -> &Command {
        self.command.as_ref().unwrap_or(&Command::Repl)
    }
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Run a source file and print its completion value
    Run(FileArgs),
    /// Read statements from stdin line by line
    Repl,
    /// Pretty-print a source file
    Fmt(FileArgs),
    /// Print the syntax tree of a source file as JSON
    Ast(AstArgs),
    /// Run a syntax tree stored as JSON
    EvalAst(EvalAstArgs),
}

#[derive(Debug, Args)]
struct GlobalArgs {
    /// Bind a global before running, e.g. `-D limit=10` or `-D name=bob`
    #[arg(short = 'D', long = "define", value_name = "NAME=VALUE", global = true)]
    defines: Vec<String>,

    #[arg(long, default_value_t = DEFAULT_PARSE_DEPTH_LIMIT, global = true)]
    parse_depth_limit: usize,

    #[arg(long, default_value_t = DEFAULT_EVAL_DEPTH_LIMIT, global = true)]
    eval_depth_limit: usize,
}

impl GlobalArgs {
    fn config(&self) -> Config {
        Config {
            parse_depth_limit: self.parse_depth_limit,
            eval_depth_limit: self.eval_depth_limit,
        }
    }

    fn interpreter(&self) -> Result<Interpreter, CliError> {
        let mut interpreter = Interpreter::with_config(&self.config());
        for define in &self.defines {
            let (name, value) = parse_define(define)?;
            interpreter.define(name, value);
        }
        Ok(interpreter)
    }
}

#[derive(Debug, Args)]
struct FileArgs {
    file: PathBuf,
}

#[derive(Debug, Args)]
struct AstArgs {
    file: PathBuf,

    /// Name of the field that tags each node
    #[arg(short, long, default_value = DEFAULT_DISCRIMINANT)]
    discriminant: String,

    /// Print on a single line
    #[arg(long)]
    compact: bool,
}

#[derive(Debug, Args)]
struct EvalAstArgs {
    file: PathBuf,

    /// Name of the field that tags each node
    #[arg(short, long, default_value = DEFAULT_DISCRIMINANT)]
    discriminant: String,
}

#[derive(Debug, thiserror::Error)]
enum CliError {
    #[error("I/O error on {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Invalid syntax tree: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Invalid definition \"{0}\", expected NAME=VALUE")]
    Define(String),
    #[error(transparent)]
    Interpret(#[from] InterpretError),
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();

    let args = Cli::parse();

    let result = match args.command() {
        Command::Repl => repl_command(&args.globals),
        Command::Run(file) => run_command(&args.globals, file),
        Command::Fmt(file) => fmt_command(&args.globals, file),
        Command::Ast(ast_args) => ast_command(&args.globals, ast_args),
        Command::EvalAst(eval_args) => eval_ast_command(&args.globals, eval_args),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            if let CliError::Interpret(inner) = &e {
                debug!(category = inner.category(), "command failed");
            }
            eprintln!("{e}");
            ExitCode::FAILURE
        }
    }
}

fn repl_command(globals: &GlobalArgs) -> Result<(), CliError> {
    println!("Welcome to the treewalk REPL!");
    println!("EOF to exit. (Ctrl+D on *nix, Ctrl+Z on Windows)");

    let mut interpreter = globals.interpreter()?;
    let mut input = String::new();

    loop {
        print!("> ");
        std::io::stdout().flush().map_err(|source| CliError::Io {
            path: PathBuf::from("<stdout>"),
            source,
        })?;

        let read = std::io::stdin()
            .read_line(&mut input)
            .map_err(|source| CliError::Io {
                path: PathBuf::from("<stdin>"),
                source,
            })?;

        if read == 0 {
            break;
        }

        match treewalk::run(input.trim(), &mut interpreter) {
            Ok(Value::Unit) => {}
            Ok(value) => println!("{}", value),
            Err(e) => println!("Error: {}", e),
        }

        input.clear()
    }

    Ok(())
}

fn run_command(globals: &GlobalArgs, args: &FileArgs) -> Result<(), CliError> {
    let source = read_file(&args.file)?;
    let mut interpreter = globals.interpreter()?;
    info!(file = %args.file.display(), "running");
    match treewalk::run(&source, &mut interpreter)? {
        Value::Unit => {}
        value => println!("{}", value),
    }
    Ok(())
}

fn fmt_command(globals: &GlobalArgs, args: &FileArgs) -> Result<(), CliError> {
    let source = read_file(&args.file)?;
    let program = treewalk::parse_source(&source, &globals.config())?;
    print!("{}", ast::print_program(&program));
    Ok(())
}

fn ast_command(globals: &GlobalArgs, args: &AstArgs) -> Result<(), CliError> {
    let source = read_file(&args.file)?;
    let program = treewalk::parse_source(&source, &globals.config())?;
    let json = ast::to_json(&program, &args.discriminant)?;
    let text = if args.compact {
        serde_json::to_string(&json)?
    } else {
        serde_json::to_string_pretty(&json)?
    };
    println!("{}", text);
    Ok(())
}

fn eval_ast_command(globals: &GlobalArgs, args: &EvalAstArgs) -> Result<(), CliError> {
    let source = read_file(&args.file)?;
    let json = serde_json::from_str(&source)?;
    let program = ast::from_json(json, &args.discriminant)?;
    let mut interpreter = globals.interpreter()?;
    match interpreter
        .interpret(&program)
        .map_err(InterpretError::from)?
    {
        Value::Unit => {}
        value => println!("{}", value),
    }
    Ok(())
}

fn read_file(path: &Path) -> Result<String, CliError> {
    std::fs::read_to_string(path).map_err(|source| CliError::Io {
        path: path.to_path_buf(),
        source,
    })
}

fn parse_define(define: &str) -> Result<(String, Value), CliError> {
    let Some((name, raw)) = define.split_once('=') else {
        return Err(CliError::Define(define.to_string()));
    };

    let valid_name = name.starts_with(|c: char| c.is_ascii_alphabetic() || c == '_')
        && name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_');
    if !valid_name {
        return Err(CliError::Define(define.to_string()));
    }

    let value = if let Ok(n) = raw.parse::<f64>() {
        Value::Number(n)
    } else {
        match raw {
            "true" => Value::Boolean(true),
            "false" => Value::Boolean(false),
            s => Value::String(s.to_string()),
        }
    };

    Ok((name.to_string(), value))
}
