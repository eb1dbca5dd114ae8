//! Crate root: wires together the front half of the compiler.
//!
//! - `token` holds the closed token-type enum and its static lexeme table.
//! - `tokenizer` scans source text into tokens, reporting failures as values.
//! - `stream` gives a grammar one-token lookahead over the scanner.
//! - `symtab` tracks declarations across nested scopes and owns the map of
//!   variable stack locations.
//! - `codegen` lowers one buffered statement fragment into three-address
//!   code; `tac` renders it for the assembly backend.
//! - `error` centralises the error types shared by the other modules.

pub mod codegen;
pub mod error;
pub mod stream;
pub mod symtab;
pub mod tac;
pub mod token;
pub mod tokenizer;
pub mod ty;

pub use codegen::{CodeGenerator, Mode, PooledString};
pub use error::{CompileError, CompileResult, ScanError};
pub use symtab::SymbolTable;
pub use token::{LexemeTable, Token, TokenGroup, TokenType};
pub use tokenizer::{Scanned, Scanner, tokenize};

use stream::TokenStream;

/// Compile one statement fragment (optionally `;`-terminated) in `mode`.
///
/// Every identifier outside a call position must already be declared in
/// `table`; the generated temporaries are merged into its location map.
/// Nothing may follow the terminating `;`. Errors come back tagged with the
/// line they were found on.
pub fn compile_statement(
  source: &str,
  mode: Mode,
  lexemes: &LexemeTable,
  table: &mut SymbolTable,
  generator: &mut CodeGenerator,
  frame_offset: usize,
) -> CompileResult<String> {
  let mut stream = TokenStream::new(source, lexemes);
  let line = stream.line();
  generator.clear();

  let callee = matches!(mode, Mode::MethodCall | Mode::AssignmentViaMethodCall);
  while !stream.is_eof() && !stream.peek_is(TokenType::Semicolon) {
    let line = stream.line();
    let Some(token) = stream.advance().map_err(|err| err.at_line(line))? else {
      break;
    };
    let names_method = callee && stream.peek_is(TokenType::LeftParen);
    if token.is(TokenType::Identifier) && !names_method {
      table.resolve(&token.lexeme).map_err(|err| err.at_line(line))?;
    }
    generator.push(token);
  }
  let line_end = stream.line();
  stream
    .accept(TokenType::Semicolon)
    .and_then(|_| stream.expect_eof("Statement"))
    .map_err(|err| err.at_line(line_end))?;

  generator.set_mode(mode);
  let mut block = String::new();
  generator
    .generate(
      |text| block.push_str(text),
      table.locations_mut(),
      frame_offset,
    )
    .map_err(|err| err.at_line(line))?;
  generator.clear();
  Ok(block)
}
