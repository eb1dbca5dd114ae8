//! Shared error types used across the compilation pipeline.
//!
//! Scanning failures are plain values (`ScanError`) handed back from the
//! scanner so the caller decides whether to abort. Everything else is a
//! `CompileError` that propagates with `?` up to the driver, which reports
//! it with the line number it was compiling.

use snafu::Snafu;

use crate::token::{TokenGroup, TokenType};

pub type CompileResult<T> = Result<T, CompileError>;

/// Lexical failure captured as a value by the scanner.
#[derive(Debug, Clone, PartialEq, Eq, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum ScanError {
  #[snafu(display("line {line}: unrecognized symbol '{symbol}'"))]
  UnrecognizedSymbol { line: usize, symbol: String },

  #[snafu(display("line {line}: unterminated string literal"))]
  UnterminatedString { line: usize },

  #[snafu(display("line {line}: unterminated block comment"))]
  UnterminatedComment { line: usize },
}

impl ScanError {
  /// Line on which the failing lexeme started.
  pub fn line(&self) -> usize {
    match self {
      Self::UnrecognizedSymbol { line, .. }
      | Self::UnterminatedString { line }
      | Self::UnterminatedComment { line } => *line,
    }
  }
}

/// What a grammar production was waiting for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Expected {
  Token(TokenType),
  Group(TokenGroup),
  EndOfInput,
}

impl std::fmt::Display for Expected {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    match self {
      Self::Token(kind) => write!(f, "{kind}"),
      Self::Group(group) => write!(f, "{group}"),
      Self::EndOfInput => f.write_str("end of input"),
    }
  }
}

#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum CompileError {
  #[snafu(display("line {line}: {error}"))]
  AtLine {
    line: usize,
    error: Box<CompileError>,
  },

  #[snafu(display("{source}"))]
  Scan { source: ScanError },

  #[snafu(display("{production}: expected {expected}, but got \"{found}\""))]
  ExpectedToken {
    production: String,
    expected: Expected,
    found: String,
  },

  #[snafu(display("{production}: expected optional {expected}, but got \"{found}\""))]
  ExpectedOptionalToken {
    production: String,
    expected: Expected,
    found: String,
  },

  #[snafu(display("duplicate declaration of '{lexeme}' at depth {depth}"))]
  DuplicateEntry { lexeme: String, depth: usize },

  #[snafu(display("undeclared identifier '{lexeme}'"))]
  UndeclaredIdentifier { lexeme: String },

  #[snafu(display("invalid expression: {reason}"))]
  InvalidExpression { reason: String },

  #[snafu(display("invalid code generation mode"))]
  InvalidMode,

  #[snafu(display("variable '{name}' has no stack location"))]
  UnallocatedVariable { name: String },
}

impl CompileError {
  /// Wrap an error with the line being compiled when it surfaced. Errors
  /// that already carry a line are left alone.
  pub fn at_line(self, line: usize) -> Self {
    match self {
      Self::AtLine { .. } | Self::Scan { .. } => self,
      other => Self::AtLine {
        line,
        error: Box::new(other),
      },
    }
  }

  /// The innermost error, looking through any line wrapper.
  pub fn kind(&self) -> &CompileError {
    match self {
      Self::AtLine { error, .. } => error.kind(),
      other => other,
    }
  }
}

impl From<ScanError> for CompileError {
  fn from(source: ScanError) -> Self {
    Self::Scan { source }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn at_line_wraps_once() {
    let err = CompileError::InvalidMode.at_line(4).at_line(9);
    assert_eq!(err.to_string(), "line 4: invalid code generation mode");
    assert!(matches!(err.kind(), CompileError::InvalidMode));
  }

  #[test]
  fn scan_errors_keep_their_own_line() {
    let err: CompileError = ScanError::UnterminatedString { line: 3 }.into();
    let err = err.at_line(7);
    assert_eq!(err.to_string(), "line 3: unterminated string literal");
  }
}
