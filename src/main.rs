use std::{io::Write, path::Path};

use clap::{ArgAction, Args, Parser, Subcommand};
use sia::{
    parser::{parse, ParseError},
    tree_walk_interpreter::{ExecutionError, Flow, Interpreter},
};
use tracing::{debug, Level};

#[derive(Debug, Parser)]
#[command(version, about = "Interpreter for the Sia scripting language")]
struct Cli {
    /// Log more; repeat for more detail.
    #[arg(short, long, global = true, action = ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Option<Command>,
}

impl Cli {
    pub fn command(&self) -> &Command {
        self.command.as_ref().unwrap_or(&Command::Repl)
    }

    fn log_level(&self) -> Level {
        match self.verbose {
            0 => Level::WARN,
            1 => Level::INFO,
            2 => Level::DEBUG,
            _ => Level::TRACE,
        }
    }
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Run a .sia script.
    Run(RunArgs),
    /// Start an interactive session.
    Repl,
    /// Print the parsed form of a .sia script.
    Ast(AstArgs),
}

#[derive(Debug, Args)]
struct RunArgs {
    file: String,
}

#[derive(Debug, Args)]
struct AstArgs {
    file: String,
}

#[derive(Debug, thiserror::Error)]
enum InterpretError {
    #[error(transparent)]
    Parse(#[from] ParseError),
    #[error(transparent)]
    Execution(#[from] ExecutionError),
    #[error("IO error on {path}: {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },
    #[error("{0}: file must have .sia extension")]
    InvalidExtension(String),
    #[error("return outside of a function")]
    ReturnOutsideFunction,
}

fn main() {
    let args = Cli::parse();

    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_max_level(args.log_level())
        .init();

    let result = match args.command() {
        Command::Repl => repl_command(),
        Command::Run(args) => run_command(args),
        Command::Ast(args) => ast_command(args),
    };

    if let Err(e) = result {
        eprintln!("{e}");
        std::process::exit(1);
    }
}

fn repl_command() -> Result<(), InterpretError> {
    println!("Welcome to the Sia REPL!");
    println!("Type 'quit' to exit and 'clear' to clear the screen.");

    let mut interpreter = Interpreter::default();
    let mut input = String::new();

    loop {
        print!(">> ");
        flush_stdout()?;

        input.clear();
        let read = std::io::stdin()
            .read_line(&mut input)
            .map_err(|source| InterpretError::Io {
                path: "<stdin>".to_string(),
                source,
            })?;
        if read == 0 {
            break;
        }

        match repl_line(&mut interpreter, &input, &mut std::io::stdout()) {
            Ok(ReplAction::Continue) => {}
            Ok(ReplAction::Quit) => break,
            Err(e) => println!("{e}"),
        }
    }

    Ok(())
}

#[derive(Debug, PartialEq, Eq)]
enum ReplAction {
    Continue,
    Quit,
}

/// Handles one REPL line. `clear` only wipes the terminal; the session keeps
/// its variables and functions.
fn repl_line(
    interpreter: &mut Interpreter,
    line: &str,
    screen: &mut impl Write,
) -> Result<ReplAction, InterpretError> {
    match line.trim() {
        "" => Ok(ReplAction::Continue),
        "quit" => Ok(ReplAction::Quit),
        "clear" => {
            debug!("clearing screen");
            write!(screen, "{CLEAR_SCREEN}").map_err(|source| InterpretError::Io {
                path: "<stdout>".to_string(),
                source,
            })?;
            Ok(ReplAction::Continue)
        }
        source => {
            interpret(interpreter, source)?;
            Ok(ReplAction::Continue)
        }
    }
}

// Erase the display and move the cursor home.
const CLEAR_SCREEN: &str = "\x1b[2J\x1b[1;1H";

fn run_command(args: &RunArgs) -> Result<(), InterpretError> {
    let source = read_source(&args.file)?;
    let mut interpreter = Interpreter::default();
    interpret(&mut interpreter, &source)?;
    flush_stdout()
}

fn ast_command(args: &AstArgs) -> Result<(), InterpretError> {
    let source = read_source(&args.file)?;
    let program = parse(&source)?;
    print!("{program}");
    flush_stdout()
}

fn read_source(path: &str) -> Result<String, InterpretError> {
    if Path::new(path).extension().map_or(true, |ext| ext != "sia") {
        return Err(InterpretError::InvalidExtension(path.to_string()));
    }

    std::fs::read_to_string(path).map_err(|source| InterpretError::Io {
        path: path.to_string(),
        source,
    })
}

fn interpret(interpreter: &mut Interpreter, source: &str) -> Result<(), InterpretError> {
    let program = parse(source)?;
    match interpreter.interpret(&program)? {
        Flow::Completed => Ok(()),
        Flow::Returning(_) => Err(InterpretError::ReturnOutsideFunction),
    }
}

fn flush_stdout() -> Result<(), InterpretError> {
    std::io::stdout()
        .flush()
        .map_err(|source| InterpretError::Io {
            path: "<stdout>".to_string(),
            source,
        })
}
