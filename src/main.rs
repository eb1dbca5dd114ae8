use std::fs;
use std::path::{Path, PathBuf};
use std::process;

use clap::{Parser, Subcommand, ValueEnum};
use snafu::{OptionExt, ResultExt, Snafu};
use tracing_subscriber::EnvFilter;

use jtac::tac::{proc_close, proc_open};
use jtac::ty::VarType;
use jtac::{
  CodeGenerator, CompileError, LexemeTable, Mode, ScanError, Scanned, Scanner, SymbolTable, Token,
};

type CliResult<T> = Result<T, CliError>;

#[derive(Debug, Snafu)]
enum CliError {
  #[snafu(display("error: could not read {}: {source}", path.display()))]
  ReadSource {
    path: PathBuf,
    source: std::io::Error,
  },

  #[snafu(display("error: unknown type '{name}'"))]
  UnknownType { name: String },

  #[snafu(display("{source}"))]
  Scan { source: ScanError },

  #[snafu(display("{source}"))]
  Compile { source: CompileError },
}

/// Scanner and three-address code generator for a small Java-like language.
#[derive(Debug, Parser)]
#[command(name = "jtac", version)]
struct Cli {
  #[command(subcommand)]
  command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
  /// Print the token stream of a source file.
  Tokens {
    /// Source file to scan.
    file: PathBuf,
  },
  /// Compile one statement fragment to three-address code.
  Tac {
    /// How the fragment is shaped.
    #[arg(long, value_enum)]
    mode: CliMode,
    /// Declare a local, as `name` or `name:type` (int, boolean, char, float).
    #[arg(long = "var", value_name = "NAME[:TYPE]")]
    vars: Vec<String>,
    /// Bytes of locals below the frame pointer; defaults to the declared locals.
    #[arg(long)]
    frame: Option<usize>,
    /// Wrap the output in a `proc`/`endp` pair with this name.
    #[arg(long)]
    method: Option<String>,
    /// The fragment, e.g. `x = a + -b`.
    fragment: String,
  },
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum CliMode {
  Return,
  Assign,
  AssignCall,
  Call,
  Io,
}

impl From<CliMode> for Mode {
  fn from(mode: CliMode) -> Self {
    match mode {
      CliMode::Return => Mode::ReturnExpression,
      CliMode::Assign => Mode::Assignment,
      CliMode::AssignCall => Mode::AssignmentViaMethodCall,
      CliMode::Call => Mode::MethodCall,
      CliMode::Io => Mode::IoMethodCall,
    }
  }
}

fn main() {
  tracing_subscriber::fmt()
    .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
    .with_writer(std::io::stderr)
    .init();

  let cli = Cli::parse();
  let lexemes = LexemeTable::new();

  let result = match cli.command {
    Command::Tokens { file } => dump_tokens(&file, &lexemes),
    Command::Tac {
      mode,
      vars,
      frame,
      method,
      fragment,
    } => compile_fragment(&lexemes, mode.into(), &vars, frame, method.as_deref(), &fragment),
  };

  match result {
    Ok(output) => print!("{output}"),
    Err(err) => {
      eprintln!("{err}");
      process::exit(1);
    }
  }
}

fn dump_tokens(file: &Path, lexemes: &LexemeTable) -> CliResult<String> {
  let source = fs::read_to_string(file).context(ReadSourceSnafu { path: file })?;

  let mut output = String::new();
  for scanned in Scanner::new(&source, lexemes) {
    match scanned {
      Scanned::Token(token) => output.push_str(&format!(
        "{:>4}  {:<24} {:<18} {}\n",
        token.line,
        format!("{:?}", token.kind),
        token.group.to_string(),
        token.lexeme
      )),
      Scanned::Eof { line } => output.push_str(&format!("{line:>4}  EOF\n")),
      Scanned::Error(err) => return Err(err).context(ScanSnafu),
    }
  }
  Ok(output)
}

fn compile_fragment(
  lexemes: &LexemeTable,
  mode: Mode,
  vars: &[String],
  frame: Option<usize>,
  method: Option<&str>,
  fragment: &str,
) -> CliResult<String> {
  let mut table = SymbolTable::new();
  let locals_size = declare_locals(&mut table, vars)?;

  let mut generator = CodeGenerator::new();
  let block = jtac::compile_statement(
    fragment,
    mode,
    lexemes,
    &mut table,
    &mut generator,
    frame.unwrap_or(locals_size),
  )
  .context(CompileSnafu)?;

  let mut output = match method {
    Some(name) => format!("{}\n{block}{}\n", proc_open(name), proc_close(name)),
    None => block,
  };
  for string in generator.strings() {
    output.push_str(&format!("{} db {}\n", string.label, string.text));
  }
  Ok(output)
}

/// Declare `name[:type]` locals at method depth, returning the bytes used.
fn declare_locals(table: &mut SymbolTable, vars: &[String]) -> CliResult<usize> {
  const METHOD_DEPTH: usize = 1;

  let mut offset = 0;
  for var in vars {
    let (name, ty) = match var.split_once(':') {
      Some((name, ty)) => {
        let ty = VarType::from_name(ty).context(UnknownTypeSnafu { name: ty })?;
        (name, ty)
      }
      None => (var.as_str(), VarType::Int),
    };
    offset = table
      .declare_local(Token::identifier(name, 0), METHOD_DEPTH, ty, offset)
      .context(CompileSnafu)?;
  }
  Ok(offset)
}
