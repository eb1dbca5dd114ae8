//! Lookahead cursor over the scanner for a recursive-descent grammar.
//!
//! Optional productions are decided by peeking at the next token's type or
//! group (`peek_is`, `accept`); `expect` is reserved for tokens that must be
//! there. A scan error surfaces as `CompileError::Scan` the first time the
//! cursor reaches it.

use crate::error::{CompileResult, Expected, ExpectedOptionalTokenSnafu, ExpectedTokenSnafu};
use crate::token::{LexemeTable, Token, TokenGroup, TokenType};
use crate::tokenizer::{Scanned, Scanner};

pub struct TokenStream<'t> {
  scanner: Scanner<'t>,
  lookahead: Scanned,
}

impl<'t> TokenStream<'t> {
  /// Prime the cursor with the first token of `source`.
  pub fn new(source: &str, table: &'t LexemeTable) -> Self {
    let mut scanner = Scanner::new(source, table);
    let lookahead = scanner.next_token();
    Self { scanner, lookahead }
  }

  /// The next token, or `None` at end of input or on a scan error.
  pub fn peek(&self) -> Option<&Token> {
    match &self.lookahead {
      Scanned::Token(token) => Some(token),
      _ => None,
    }
  }

  pub fn peek_is(&self, kind: TokenType) -> bool {
    self.peek().is_some_and(|token| token.kind == kind)
  }

  pub fn peek_group(&self, group: TokenGroup) -> bool {
    self.peek().is_some_and(|token| token.group == group)
  }

  pub fn is_eof(&self) -> bool {
    matches!(self.lookahead, Scanned::Eof { .. })
  }

  /// Line of the lookahead, for error reporting.
  pub fn line(&self) -> usize {
    match &self.lookahead {
      Scanned::Token(token) => token.line,
      Scanned::Eof { line } => *line,
      Scanned::Error(err) => err.line(),
    }
  }

  /// Consume and return the lookahead token.
  pub fn advance(&mut self) -> CompileResult<Option<Token>> {
    let next = self.scanner.next_token();
    match std::mem::replace(&mut self.lookahead, next) {
      Scanned::Token(token) => Ok(Some(token)),
      Scanned::Eof { line } => {
        self.lookahead = Scanned::Eof { line };
        Ok(None)
      }
      Scanned::Error(err) => Err(err.into()),
    }
  }

  /// Consume the lookahead if it has type `kind`.
  pub fn accept(&mut self, kind: TokenType) -> CompileResult<Option<Token>> {
    self.check_scan()?;
    if self.peek_is(kind) {
      self.advance()
    } else {
      Ok(None)
    }
  }

  /// Consume a token of type `kind` or fail naming `production`.
  pub fn expect(&mut self, kind: TokenType, production: &str) -> CompileResult<Token> {
    self.check_scan()?;
    if let Some(token) = self.accept(kind)? {
      return Ok(token);
    }
    ExpectedTokenSnafu {
      production,
      expected: Expected::Token(kind),
      found: self.describe(),
    }
    .fail()
  }

  /// Consume a token in `group` or fail naming `production`.
  pub fn expect_group(&mut self, group: TokenGroup, production: &str) -> CompileResult<Token> {
    self.check_scan()?;
    if self.peek_group(group)
      && let Some(token) = self.advance()?
    {
      return Ok(token);
    }
    ExpectedTokenSnafu {
      production,
      expected: Expected::Group(group),
      found: self.describe(),
    }
    .fail()
  }

  /// Fail when an optional production was started but its token is missing.
  pub fn expect_optional(&mut self, kind: TokenType, production: &str) -> CompileResult<Token> {
    self.check_scan()?;
    if let Some(token) = self.accept(kind)? {
      return Ok(token);
    }
    ExpectedOptionalTokenSnafu {
      production,
      expected: Expected::Token(kind),
      found: self.describe(),
    }
    .fail()
  }

  /// Fail unless every token has been consumed.
  pub fn expect_eof(&self, production: &str) -> CompileResult<()> {
    self.check_scan()?;
    if self.is_eof() {
      return Ok(());
    }
    ExpectedTokenSnafu {
      production,
      expected: Expected::EndOfInput,
      found: self.describe(),
    }
    .fail()
  }

  fn check_scan(&self) -> CompileResult<()> {
    match &self.lookahead {
      Scanned::Error(err) => Err(err.clone().into()),
      _ => Ok(()),
    }
  }

  /// Human-friendly description of the lookahead used in diagnostics.
  fn describe(&self) -> String {
    match &self.lookahead {
      Scanned::Token(token) => token.lexeme.clone(),
      Scanned::Eof { .. } => "EOF".to_string(),
      Scanned::Error(err) => err.to_string(),
    }
  }
}
