//! Token model shared by every stage.
//!
//! Per-type metadata (fixed lexeme and group) lives in one static table
//! literal, `TOKEN_TABLE`. The scanner never consults it directly: it gets a
//! `LexemeTable`, an immutable reverse index built once and passed around by
//! reference.

use std::collections::HashMap;
use std::fmt;

/// Coarse category of a token.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TokenGroup {
  ReservedWord,
  Identifier,
  Literal,
  Operator,
  SpecialCharacter,
}

impl fmt::Display for TokenGroup {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    let name = match self {
      Self::ReservedWord => "reserved word",
      Self::Identifier => "identifier",
      Self::Literal => "literal",
      Self::Operator => "operator",
      Self::SpecialCharacter => "special character",
    };
    f.write_str(name)
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TokenType {
  // Reserved words
  Class,
  Public,
  Private,
  Static,
  Void,
  Main,
  StringType,
  Extends,
  Final,
  Int,
  Boolean,
  Float,
  Char,
  Return,
  If,
  Else,
  While,
  New,
  This,
  Null,
  True,
  False,
  Read,
  Write,
  WriteLn,
  SystemOutPrintln,

  // Arithmetic
  Plus,
  Increment,
  PlusAssign,
  Minus,
  Decrement,
  MinusAssign,
  Slash,
  SlashAssign,
  Star,
  StarAssign,
  Percent,
  PercentAssign,

  // Boolean
  Not,
  NotEqual,
  And,
  Or,
  Equal,

  // Comparison
  LessEqual,
  Less,
  GreaterEqual,
  Greater,

  // Shift
  ShiftLeftAssign,
  ShiftLeft,
  UnsignedShiftRightAssign,
  UnsignedShiftRight,
  ShiftRightAssign,
  ShiftRight,

  // Bitwise
  Tilde,
  BitOr,
  BitOrAssign,
  BitAnd,
  BitAndAssign,
  BitXor,
  BitXorAssign,

  // Punctuation
  LeftBracket,
  RightBracket,
  LeftParen,
  RightParen,
  LeftBrace,
  RightBrace,
  Comma,
  Period,
  Colon,
  Semicolon,
  Question,
  Assign,

  // Classified by pattern rather than by exact lexeme
  Identifier,
  IntLiteral,
  RealLiteral,
  StringLiteral,
}

use TokenGroup::{Literal, Operator, ReservedWord, SpecialCharacter};

/// Fixed lexeme and group for every token type that has one.
pub static TOKEN_TABLE: &[(TokenType, &str, TokenGroup)] = &[
  (TokenType::Class, "class", ReservedWord),
  (TokenType::Public, "public", ReservedWord),
  (TokenType::Private, "private", ReservedWord),
  (TokenType::Static, "static", ReservedWord),
  (TokenType::Void, "void", ReservedWord),
  (TokenType::Main, "main", ReservedWord),
  (TokenType::StringType, "String", ReservedWord),
  (TokenType::Extends, "extends", ReservedWord),
  (TokenType::Final, "final", ReservedWord),
  (TokenType::Int, "int", ReservedWord),
  (TokenType::Boolean, "boolean", ReservedWord),
  (TokenType::Float, "float", ReservedWord),
  (TokenType::Char, "char", ReservedWord),
  (TokenType::Return, "return", ReservedWord),
  (TokenType::If, "if", ReservedWord),
  (TokenType::Else, "else", ReservedWord),
  (TokenType::While, "while", ReservedWord),
  (TokenType::New, "new", ReservedWord),
  (TokenType::This, "this", ReservedWord),
  (TokenType::Null, "null", Literal),
  (TokenType::True, "true", Literal),
  (TokenType::False, "false", Literal),
  (TokenType::Read, "read", ReservedWord),
  (TokenType::Write, "write", ReservedWord),
  (TokenType::WriteLn, "writeln", ReservedWord),
  (TokenType::SystemOutPrintln, "System.out.println", ReservedWord),
  (TokenType::Plus, "+", Operator),
  (TokenType::Increment, "++", Operator),
  (TokenType::PlusAssign, "+=", Operator),
  (TokenType::Minus, "-", Operator),
  (TokenType::Decrement, "--", Operator),
  (TokenType::MinusAssign, "-=", Operator),
  (TokenType::Slash, "/", Operator),
  (TokenType::SlashAssign, "/=", Operator),
  (TokenType::Star, "*", Operator),
  (TokenType::StarAssign, "*=", Operator),
  (TokenType::Percent, "%", Operator),
  (TokenType::PercentAssign, "%=", Operator),
  (TokenType::Not, "!", Operator),
  (TokenType::NotEqual, "!=", Operator),
  (TokenType::And, "&&", Operator),
  (TokenType::Or, "||", Operator),
  (TokenType::Equal, "==", Operator),
  (TokenType::LessEqual, "<=", Operator),
  (TokenType::Less, "<", Operator),
  (TokenType::GreaterEqual, ">=", Operator),
  (TokenType::Greater, ">", Operator),
  (TokenType::ShiftLeftAssign, "<<=", Operator),
  (TokenType::ShiftLeft, "<<", Operator),
  (TokenType::UnsignedShiftRightAssign, ">>>=", Operator),
  (TokenType::UnsignedShiftRight, ">>>", Operator),
  (TokenType::ShiftRightAssign, ">>=", Operator),
  (TokenType::ShiftRight, ">>", Operator),
  (TokenType::Tilde, "~", Operator),
  (TokenType::BitOr, "|", Operator),
  (TokenType::BitOrAssign, "|=", Operator),
  (TokenType::BitAnd, "&", Operator),
  (TokenType::BitAndAssign, "&=", Operator),
  (TokenType::BitXor, "^", Operator),
  (TokenType::BitXorAssign, "^=", Operator),
  (TokenType::LeftBracket, "[", SpecialCharacter),
  (TokenType::RightBracket, "]", SpecialCharacter),
  (TokenType::LeftParen, "(", SpecialCharacter),
  (TokenType::RightParen, ")", SpecialCharacter),
  (TokenType::LeftBrace, "{", SpecialCharacter),
  (TokenType::RightBrace, "}", SpecialCharacter),
  (TokenType::Comma, ",", SpecialCharacter),
  (TokenType::Period, ".", SpecialCharacter),
  (TokenType::Colon, ":", SpecialCharacter),
  (TokenType::Semicolon, ";", SpecialCharacter),
  (TokenType::Question, "?", SpecialCharacter),
  (TokenType::Assign, "=", Operator),
];

impl TokenType {
  /// Fixed lexeme, if this type has one.
  pub fn lexeme(self) -> Option<&'static str> {
    TOKEN_TABLE
      .iter()
      .find(|(kind, _, _)| *kind == self)
      .map(|(_, lexeme, _)| *lexeme)
  }

  pub fn group(self) -> TokenGroup {
    match self {
      Self::Class
      | Self::Public
      | Self::Private
      | Self::Static
      | Self::Void
      | Self::Main
      | Self::StringType
      | Self::Extends
      | Self::Final
      | Self::Int
      | Self::Boolean
      | Self::Float
      | Self::Char
      | Self::Return
      | Self::If
      | Self::Else
      | Self::While
      | Self::New
      | Self::This
      | Self::Read
      | Self::Write
      | Self::WriteLn
      | Self::SystemOutPrintln => TokenGroup::ReservedWord,

      Self::Null
      | Self::True
      | Self::False
      | Self::IntLiteral
      | Self::RealLiteral
      | Self::StringLiteral => TokenGroup::Literal,

      Self::Identifier => TokenGroup::Identifier,

      Self::LeftBracket
      | Self::RightBracket
      | Self::LeftParen
      | Self::RightParen
      | Self::LeftBrace
      | Self::RightBrace
      | Self::Comma
      | Self::Period
      | Self::Colon
      | Self::Semicolon
      | Self::Question => TokenGroup::SpecialCharacter,

      Self::Plus
      | Self::Increment
      | Self::PlusAssign
      | Self::Minus
      | Self::Decrement
      | Self::MinusAssign
      | Self::Slash
      | Self::SlashAssign
      | Self::Star
      | Self::StarAssign
      | Self::Percent
      | Self::PercentAssign
      | Self::Not
      | Self::NotEqual
      | Self::And
      | Self::Or
      | Self::Equal
      | Self::LessEqual
      | Self::Less
      | Self::GreaterEqual
      | Self::Greater
      | Self::ShiftLeftAssign
      | Self::ShiftLeft
      | Self::UnsignedShiftRightAssign
      | Self::UnsignedShiftRight
      | Self::ShiftRightAssign
      | Self::ShiftRight
      | Self::Tilde
      | Self::BitOr
      | Self::BitOrAssign
      | Self::BitAnd
      | Self::BitAndAssign
      | Self::BitXor
      | Self::BitXorAssign
      | Self::Assign => TokenGroup::Operator,
    }
  }
}

impl fmt::Display for TokenType {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self.lexeme() {
      Some(lexeme) => write!(f, "'{lexeme}'"),
      None => match self {
        Self::Identifier => f.write_str("identifier"),
        Self::IntLiteral => f.write_str("integer literal"),
        Self::RealLiteral => f.write_str("real literal"),
        _ => f.write_str("string literal"),
      },
    }
  }
}

/// A classified lexeme together with the line it was found on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
  pub kind: TokenType,
  pub lexeme: String,
  pub group: TokenGroup,
  pub line: usize,
}

impl Token {
  pub fn new(kind: TokenType, lexeme: impl Into<String>, line: usize) -> Self {
    Self {
      kind,
      lexeme: lexeme.into(),
      group: kind.group(),
      line,
    }
  }

  /// An identifier token; handy when declaring names outside the scanner.
  pub fn identifier(name: impl Into<String>, line: usize) -> Self {
    Self::new(TokenType::Identifier, name, line)
  }

  pub fn is(&self, kind: TokenType) -> bool {
    self.kind == kind
  }
}

/// Reverse index from fixed lexeme to token type.
#[derive(Debug, Clone)]
pub struct LexemeTable {
  by_lexeme: HashMap<&'static str, TokenType>,
}

impl LexemeTable {
  pub fn new() -> Self {
    let by_lexeme = TOKEN_TABLE
      .iter()
      .map(|(kind, lexeme, _)| (*lexeme, *kind))
      .collect();
    Self { by_lexeme }
  }

  pub fn lookup(&self, lexeme: &str) -> Option<TokenType> {
    self.by_lexeme.get(lexeme).copied()
  }

  pub fn len(&self) -> usize {
    self.by_lexeme.len()
  }

  pub fn is_empty(&self) -> bool {
    self.by_lexeme.is_empty()
  }
}

impl Default for LexemeTable {
  fn default() -> Self {
    Self::new()
  }
}
