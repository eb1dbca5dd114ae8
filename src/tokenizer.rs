//! Lexical analysis: turns source text into classified tokens on demand.
//!
//! The scanner hands out one token per `next_token` call. Failures never
//! escape as `Err`; they come back as `Scanned::Error` so the grammar layer
//! decides whether a bad lexeme is fatal. Comments are consumed internally
//! and never reach the caller.

use tracing::{trace, warn};

use crate::error::ScanError;
use crate::token::{LexemeTable, Token, TokenType};

/// Result of one scanner step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Scanned {
  Token(Token),
  Eof { line: usize },
  Error(ScanError),
}

/// Characters that go through greedy multi-character operator matching.
const OPERATOR_CHARS: &[char] = &[
  '!', '%', '&', '*', '+', '-', '/', '<', '=', '>', '^', '|',
];

/// Punctuation that is always a single-character lexeme.
const PUNCTUATION_CHARS: &[char] = &['(', ')', ',', ':', ';', '?', '[', ']', '{', '}', '~'];

/// Prefixes after which a `.` continues the identifier.
const DOTTED_PREFIXES: &[&str] = &["System", "System.out"];

pub struct Scanner<'t> {
  chars: Vec<char>,
  pos: usize,
  line: usize,
  table: &'t LexemeTable,
  comment_found: bool,
  done: bool,
}

impl<'t> Scanner<'t> {
  pub fn new(source: &str, table: &'t LexemeTable) -> Self {
    Self {
      chars: source.chars().collect(),
      pos: 0,
      line: 1,
      table,
      comment_found: false,
      done: false,
    }
  }

  /// Current line number, counting from 1.
  pub fn line(&self) -> usize {
    self.line
  }

  /// Fetch the next token, skipping whitespace and comments.
  pub fn next_token(&mut self) -> Scanned {
    loop {
      self.skip_whitespace();
      let Some(c) = self.peek() else {
        return Scanned::Eof { line: self.line };
      };

      self.comment_found = false;
      let line = self.line;
      let lexeme = match self.extract(c) {
        Ok(lexeme) => lexeme,
        Err(err) => return Scanned::Error(err),
      };
      if self.comment_found {
        continue;
      }

      let scanned = self.classify(lexeme, line);
      if let Scanned::Token(token) = &scanned {
        trace!(kind = ?token.kind, lexeme = %token.lexeme, line, "scanned token");
      }
      return scanned;
    }
  }

  fn peek(&self) -> Option<char> {
    self.chars.get(self.pos).copied()
  }

  fn peek_at(&self, offset: usize) -> Option<char> {
    self.chars.get(self.pos + offset).copied()
  }

  fn bump(&mut self) -> Option<char> {
    let c = self.peek()?;
    self.pos += 1;
    if c == '\n' {
      self.line += 1;
    }
    Some(c)
  }

  fn skip_whitespace(&mut self) {
    while let Some(c) = self.peek() {
      if c.is_whitespace() {
        self.bump();
      } else {
        break;
      }
    }
  }

  /// Pull the raw text of the next lexeme starting at `c`.
  fn extract(&mut self, c: char) -> Result<String, ScanError> {
    if PUNCTUATION_CHARS.contains(&c) {
      self.bump();
      return Ok(c.to_string());
    }
    if c == '/' && matches!(self.peek_at(1), Some('/') | Some('*')) {
      return self.extract_comment();
    }
    if OPERATOR_CHARS.contains(&c) {
      return Ok(self.extract_operator(c));
    }
    if c == '"' {
      return self.extract_string();
    }
    if c == '.' && !self.peek_at(1).is_some_and(|next| next.is_ascii_digit()) {
      self.bump();
      return Ok(c.to_string());
    }
    if c.is_ascii_digit() || c == '.' {
      return Ok(self.extract_number());
    }
    if c.is_ascii_alphabetic() {
      return Ok(self.extract_identifier());
    }

    self.bump();
    Err(ScanError::UnrecognizedSymbol {
      line: self.line,
      symbol: c.to_string(),
    })
  }

  fn extract_operator(&mut self, c: char) -> String {
    let mut lexeme = String::from(c);
    self.bump();

    match self.peek() {
      Some('=') => {
        lexeme.push('=');
        self.bump();
      }
      Some(next) if next == c => {
        lexeme.push(next);
        self.bump();
        match lexeme.as_str() {
          "<<" => {
            self.extend_if(&mut lexeme, '=');
          }
          ">>" => {
            if !self.extend_if(&mut lexeme, '=') && self.extend_if(&mut lexeme, '>') {
              self.extend_if(&mut lexeme, '=');
            }
          }
          _ => {}
        }
      }
      _ => {}
    }
    lexeme
  }

  /// Append `expected` if it is the next character.
  fn extend_if(&mut self, lexeme: &mut String, expected: char) -> bool {
    if self.peek() == Some(expected) {
      lexeme.push(expected);
      self.bump();
      true
    } else {
      false
    }
  }

  fn extract_comment(&mut self) -> Result<String, ScanError> {
    let start_line = self.line;
    self.bump();
    let block = self.bump() == Some('*');
    self.comment_found = true;

    if !block {
      while let Some(c) = self.peek() {
        if c == '\n' {
          break;
        }
        self.bump();
      }
      return Ok(String::new());
    }

    loop {
      match self.bump() {
        Some('*') if self.peek() == Some('/') => {
          self.bump();
          return Ok(String::new());
        }
        Some(_) => {}
        None => {
          warn!(line = start_line, "block comment runs to end of input");
          return Err(ScanError::UnterminatedComment { line: start_line });
        }
      }
    }
  }

  fn extract_string(&mut self) -> Result<String, ScanError> {
    let start_line = self.line;
    let mut lexeme = String::new();
    if let Some(quote) = self.bump() {
      lexeme.push(quote);
    }

    let mut previous = '"';
    loop {
      match self.peek() {
        None | Some('\n') => {
          warn!(line = start_line, "string literal left open");
          return Err(ScanError::UnterminatedString { line: start_line });
        }
        Some('\r') => {
          self.bump();
        }
        Some(c) => {
          self.bump();
          lexeme.push(c);
          if c == '"' && previous != '\\' {
            return Ok(lexeme);
          }
          previous = c;
        }
      }
    }
  }

  fn extract_number(&mut self) -> String {
    let mut lexeme = String::new();
    let mut seen_point = false;
    while let Some(c) = self.peek() {
      if c.is_ascii_digit() {
        lexeme.push(c);
      } else if c == '.' && !seen_point {
        seen_point = true;
        lexeme.push(c);
      } else {
        break;
      }
      self.bump();
    }
    lexeme
  }

  fn extract_identifier(&mut self) -> String {
    let mut lexeme = String::new();
    while let Some(c) = self.peek() {
      let dotted = c == '.' && DOTTED_PREFIXES.contains(&lexeme.as_str());
      if c.is_ascii_alphanumeric() || c == '_' || dotted {
        lexeme.push(c);
        self.bump();
      } else {
        break;
      }
    }
    lexeme
  }

  fn classify(&self, lexeme: String, line: usize) -> Scanned {
    if let Some(kind) = self.table.lookup(&lexeme) {
      return Scanned::Token(Token::new(kind, lexeme, line));
    }
    if lexeme.starts_with('"') {
      return Scanned::Token(Token::new(TokenType::StringLiteral, lexeme, line));
    }

    let kind = if is_integer(&lexeme) {
      TokenType::IntLiteral
    } else if is_real(&lexeme) {
      TokenType::RealLiteral
    } else if is_identifier(&lexeme) {
      TokenType::Identifier
    } else {
      return Scanned::Error(ScanError::UnrecognizedSymbol {
        line,
        symbol: lexeme,
      });
    };
    Scanned::Token(Token::new(kind, lexeme, line))
  }
}

impl Iterator for Scanner<'_> {
  type Item = Scanned;

  /// Yields every scan result, ending after the first `Eof`.
  fn next(&mut self) -> Option<Scanned> {
    if self.done {
      return None;
    }
    let scanned = self.next_token();
    if matches!(scanned, Scanned::Eof { .. }) {
      self.done = true;
    }
    Some(scanned)
  }
}

fn is_integer(lexeme: &str) -> bool {
  !lexeme.is_empty() && lexeme.chars().all(|c| c.is_ascii_digit())
}

fn is_real(lexeme: &str) -> bool {
  let Some((whole, fraction)) = lexeme.split_once('.') else {
    return false;
  };
  (!whole.is_empty() || !fraction.is_empty())
    && whole.chars().all(|c| c.is_ascii_digit())
    && fraction.chars().all(|c| c.is_ascii_digit())
}

fn is_identifier(lexeme: &str) -> bool {
  let mut chars = lexeme.chars();
  chars.next().is_some_and(|c| c.is_ascii_alphabetic())
    && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// Scan a whole source into tokens, stopping at the first lexical error.
pub fn tokenize(source: &str, table: &LexemeTable) -> Result<Vec<Token>, ScanError> {
  let mut scanner = Scanner::new(source, table);
  let mut tokens = Vec::new();
  loop {
    match scanner.next_token() {
      Scanned::Token(token) => tokens.push(token),
      Scanned::Eof { .. } => return Ok(tokens),
      Scanned::Error(err) => return Err(err),
    }
  }
}
