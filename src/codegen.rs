//! Code generation: lower a buffered statement fragment into three-address
//! code.
//!
//! The grammar layer pushes the tokens of one construct into the buffer,
//! picks a `Mode` and calls `generate`. Expressions go through a
//! shunting-yard pass to postfix and then through an operand stack that
//! builds `TacEntry` values, allocating a 2-byte stack slot for every
//! generated temporary. Prefix `-` and `!` never become instructions of
//! their own: adjacent pairs cancel during the shunting-yard pass and a
//! surviving one is folded into the entry that consumes its operand.
//!
//! Temporary numbering and the running temporary size survive `clear` so
//! that every statement of a method gets distinct slots; `reset` starts
//! over at a method boundary.
//!
//! String literals written by the I/O intrinsics are pooled under `_S<N>`
//! labels and passed to the string routines by address. The pool spans the
//! whole program and is not touched by `reset`.

use std::collections::HashMap;

use snafu::ensure;
use tracing::debug;

use crate::error::{CompileResult, InvalidExpressionSnafu, InvalidModeSnafu};
use crate::symtab::frame_location;
use crate::tac::{
  BinaryOp, INT_IO_REGISTER, Instruction, Locations, Operand, READ_REGISTER, RETURN_REGISTER,
  STRING_IO_REGISTER, TacEntry, UnaryOp, render_block,
};
use crate::token::{Token, TokenType};

/// Bytes of stack taken by one temporary.
pub const TEMP_SIZE: usize = 2;

/// How the buffered fragment is shaped into instructions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
  /// `[return] <expr>`
  ReturnExpression,
  /// `<ident> = <expr>`
  Assignment,
  /// `<ident> = <method> ( args )`
  AssignmentViaMethodCall,
  /// `<method> ( args )`
  MethodCall,
  /// `read ( x )`, `write ( v )`, `writeln ( [v] )`, `System.out.println ( [v] )`
  IoMethodCall,
}

/// Operator stack element of the shunting-yard pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum StackOp {
  Binary(BinaryOp),
  Unary(UnaryOp),
  LeftParen,
}

/// Postfix element.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Postfix {
  Operand(Token),
  Binary(BinaryOp),
  Unary(UnaryOp),
}

/// Value on the operand stack of the postfix pass.
#[derive(Debug, Clone)]
struct Value {
  operand: Operand,
  negate: Option<UnaryOp>,
}

/// Temporary allocation for one `generate` call. Counters are copied in and
/// written back only when the whole call succeeds.
struct Allocation {
  count: usize,
  size: usize,
  frame_offset: usize,
  locations: HashMap<String, String>,
  string_base: usize,
  strings: Vec<PooledString>,
}

impl Allocation {
  fn next_temp(&mut self) -> Operand {
    self.count += 1;
    self.size += TEMP_SIZE;
    let name = format!("_t{}", self.count);
    self
      .locations
      .insert(name.clone(), frame_location(self.frame_offset + self.size));
    Operand::Temp(name)
  }

  /// Pool a string literal, returning its address operand.
  fn intern(&mut self, text: &str) -> Operand {
    let label = format!("_S{}", self.string_base + self.strings.len());
    let address = Operand::literal(format!("offset {label}"));
    self.strings.push(PooledString {
      label,
      text: text.to_string(),
    });
    address
  }
}

/// A string literal placed in the data segment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PooledString {
  pub label: String,
  /// Source text, quotes included.
  pub text: String,
}

#[derive(Debug, Default)]
pub struct CodeGenerator {
  buffer: Vec<Token>,
  mode: Option<Mode>,
  temp_count: usize,
  temp_size: usize,
  strings: Vec<PooledString>,
}

impl CodeGenerator {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn push(&mut self, token: Token) {
    self.buffer.push(token);
  }

  /// Take back the most recently pushed token.
  pub fn pop(&mut self) -> Option<Token> {
    self.buffer.pop()
  }

  pub fn set_mode(&mut self, mode: Mode) {
    self.mode = Some(mode);
  }

  pub fn mode(&self) -> Option<Mode> {
    self.mode
  }

  pub fn tokens(&self) -> &[Token] {
    &self.buffer
  }

  /// Empty the buffer and forget the mode, keeping temporary numbering.
  pub fn clear(&mut self) {
    self.buffer.clear();
    self.mode = None;
  }

  /// `clear`, and restart temporary numbering and sizing.
  pub fn reset(&mut self) {
    self.clear();
    self.temp_count = 0;
    self.temp_size = 0;
  }

  /// Temporaries generated since the last `reset`.
  pub fn temp_count(&self) -> usize {
    self.temp_count
  }

  /// Bytes of stack taken by temporaries since the last `reset`.
  pub fn temp_size(&self) -> usize {
    self.temp_size
  }

  /// String literals pooled so far, in label order.
  pub fn strings(&self) -> &[PooledString] {
    &self.strings
  }

  /// Lower the buffer to TAC and pass the rendered block to `emit`.
  ///
  /// Temporaries are placed below the `frame_offset` bytes of locals and
  /// their locations are merged into `locations` on success. On failure
  /// nothing is emitted and neither `locations` nor the counters change.
  pub fn generate(
    &mut self,
    mut emit: impl FnMut(&str),
    locations: &mut HashMap<String, String>,
    frame_offset: usize,
  ) -> CompileResult<()> {
    let Some(mode) = self.mode else {
      return InvalidModeSnafu.fail();
    };

    let mut alloc = Allocation {
      count: self.temp_count,
      size: self.temp_size,
      frame_offset,
      locations: HashMap::new(),
      string_base: self.strings.len(),
      strings: Vec::new(),
    };
    let instructions = match mode {
      Mode::ReturnExpression => self.return_expression(&mut alloc)?,
      Mode::Assignment => self.assignment(&mut alloc)?,
      Mode::AssignmentViaMethodCall => self.assignment_via_call()?,
      Mode::MethodCall => method_call(&self.buffer)?,
      Mode::IoMethodCall => io_method_call(&self.buffer, &mut alloc)?,
    };

    let block = render_block(
      &instructions,
      &Locations {
        local: &alloc.locations,
        global: locations,
      },
    )?;

    debug!(
      ?mode,
      instructions = instructions.len(),
      temps = alloc.count - self.temp_count,
      strings = alloc.strings.len(),
      "generated three-address code"
    );
    self.temp_count = alloc.count;
    self.temp_size = alloc.size;
    self.strings.extend(alloc.strings);
    locations.extend(alloc.locations);
    emit(&block);
    Ok(())
  }

  fn return_expression(&self, alloc: &mut Allocation) -> CompileResult<Vec<Instruction>> {
    let expr = match self.buffer.first() {
      Some(token) if token.is(TokenType::Return) => &self.buffer[1..],
      _ => &self.buffer[..],
    };
    let (mut entries, result) = lower_expression(expr, alloc)?;
    entries.retain(|entry| !entry.is_passthrough());

    let renames_last = result.negate.is_none()
      && result.operand.is_generated()
      && entries.last().is_some_and(|entry| entry.dest == result.operand);
    if renames_last {
      if let Some(last) = entries.last_mut() {
        last.dest = Operand::literal(RETURN_REGISTER);
      }
    } else {
      entries.push(TacEntry::copy(
        Operand::literal(RETURN_REGISTER),
        result.operand,
        result.negate,
      ));
    }
    Ok(entries.into_iter().map(Instruction::Assign).collect())
  }

  fn assignment(&self, alloc: &mut Allocation) -> CompileResult<Vec<Instruction>> {
    let (target, expr) = split_assignment(&self.buffer)?;
    let (mut entries, result) = lower_expression(expr, alloc)?;
    entries.retain(|entry| !entry.is_passthrough());
    entries.push(TacEntry::copy(
      Operand::temp(&target.lexeme),
      result.operand,
      result.negate,
    ));
    Ok(entries.into_iter().map(Instruction::Assign).collect())
  }

  fn assignment_via_call(&self) -> CompileResult<Vec<Instruction>> {
    let (target, call) = split_assignment(&self.buffer)?;
    let mut instructions = method_call(call)?;
    instructions.push(Instruction::Assign(TacEntry::copy(
      Operand::temp(&target.lexeme),
      Operand::literal(RETURN_REGISTER),
      None,
    )));
    Ok(instructions)
  }
}

/// Split `<ident> = <rest>`.
fn split_assignment(tokens: &[Token]) -> CompileResult<(&Token, &[Token])> {
  match tokens {
    [target, assign, rest @ ..]
      if target.is(TokenType::Identifier) && assign.is(TokenType::Assign) =>
    {
      Ok((target, rest))
    }
    _ => InvalidExpressionSnafu {
      reason: "expected an assignment target",
    }
    .fail(),
  }
}

fn is_operand(token: &Token) -> bool {
  matches!(
    token.kind,
    TokenType::Identifier
      | TokenType::IntLiteral
      | TokenType::RealLiteral
      | TokenType::StringLiteral
      | TokenType::True
      | TokenType::False
      | TokenType::Null
  )
}

fn binary_op(kind: TokenType) -> Option<BinaryOp> {
  match kind {
    TokenType::Plus => Some(BinaryOp::Add),
    TokenType::Minus => Some(BinaryOp::Sub),
    TokenType::Star => Some(BinaryOp::Mul),
    TokenType::Slash => Some(BinaryOp::Div),
    _ => None,
  }
}

/// Push a prefix operator, cancelling it against an identical one directly
/// beneath it.
fn push_unary(ops: &mut Vec<StackOp>, op: UnaryOp) {
  if ops.last() == Some(&StackOp::Unary(op)) {
    ops.pop();
  } else {
    ops.push(StackOp::Unary(op));
  }
}

/// Shunting-yard reduction of an infix fragment to postfix.
fn to_postfix(tokens: &[Token]) -> CompileResult<Vec<Postfix>> {
  let mut output = Vec::new();
  let mut ops: Vec<StackOp> = Vec::new();
  let mut expect_operand = true;

  for token in tokens {
    if is_operand(token) {
      ensure!(
        expect_operand,
        InvalidExpressionSnafu {
          reason: format!("missing operator before '{}'", token.lexeme),
        }
      );
      output.push(Postfix::Operand(token.clone()));
      expect_operand = false;
      continue;
    }

    if !expect_operand && let Some(op) = binary_op(token.kind) {
      while let Some(&top) = ops.last() {
        match top {
          StackOp::Unary(unary) => output.push(Postfix::Unary(unary)),
          StackOp::Binary(prev) if prev.precedence() >= op.precedence() => {
            output.push(Postfix::Binary(prev))
          }
          StackOp::Binary(_) | StackOp::LeftParen => break,
        }
        ops.pop();
      }
      ops.push(StackOp::Binary(op));
      expect_operand = true;
      continue;
    }

    match token.kind {
      TokenType::LeftParen if expect_operand => ops.push(StackOp::LeftParen),
      TokenType::RightParen if !expect_operand => loop {
        match ops.pop() {
          Some(StackOp::LeftParen) => break,
          Some(StackOp::Binary(op)) => output.push(Postfix::Binary(op)),
          Some(StackOp::Unary(op)) => output.push(Postfix::Unary(op)),
          None => {
            return InvalidExpressionSnafu {
              reason: "unbalanced ')'",
            }
            .fail();
          }
        }
      },
      TokenType::Minus if expect_operand => push_unary(&mut ops, UnaryOp::Negate),
      TokenType::Decrement if expect_operand => {
        push_unary(&mut ops, UnaryOp::Negate);
        push_unary(&mut ops, UnaryOp::Negate);
      }
      TokenType::Plus if expect_operand => {}
      TokenType::Not if expect_operand => push_unary(&mut ops, UnaryOp::Not),
      _ => {
        return InvalidExpressionSnafu {
          reason: format!("unexpected '{}'", token.lexeme),
        }
        .fail();
      }
    }
  }

  ensure!(
    !expect_operand || tokens.is_empty(),
    InvalidExpressionSnafu {
      reason: "expression ends with an operator",
    }
  );
  while let Some(top) = ops.pop() {
    match top {
      StackOp::Binary(op) => output.push(Postfix::Binary(op)),
      StackOp::Unary(op) => output.push(Postfix::Unary(op)),
      StackOp::LeftParen => {
        return InvalidExpressionSnafu {
          reason: "unbalanced '('",
        }
        .fail();
      }
    }
  }
  Ok(output)
}

/// Build entries from postfix, returning them with the final value.
fn lower_postfix(
  postfix: Vec<Postfix>,
  alloc: &mut Allocation,
) -> CompileResult<(Vec<TacEntry>, Value)> {
  let mut entries = Vec::new();
  let mut stack: Vec<Value> = Vec::new();

  for item in postfix {
    match item {
      Postfix::Operand(token) if token.is(TokenType::Identifier) => {
        let name = Operand::temp(&token.lexeme);
        entries.push(TacEntry::copy(name.clone(), name.clone(), None));
        stack.push(Value {
          operand: name,
          negate: None,
        });
      }
      Postfix::Operand(token) => {
        let temp = alloc.next_temp();
        entries.push(TacEntry::copy(
          temp.clone(),
          Operand::literal(&token.lexeme),
          None,
        ));
        stack.push(Value {
          operand: temp,
          negate: None,
        });
      }
      Postfix::Unary(op) => {
        let Some(value) = stack.pop() else {
          return InvalidExpressionSnafu {
            reason: "prefix operator without an operand",
          }
          .fail();
        };
        let value = match value.negate {
          None => Value {
            negate: Some(op),
            ..value
          },
          Some(prev) if prev == op => Value {
            negate: None,
            ..value
          },
          Some(_) => {
            let temp = alloc.next_temp();
            entries.push(TacEntry::copy(temp.clone(), value.operand, value.negate));
            Value {
              operand: temp,
              negate: Some(op),
            }
          }
        };
        stack.push(value);
      }
      Postfix::Binary(op) => {
        let (Some(rhs), Some(lhs)) = (stack.pop(), stack.pop()) else {
          return InvalidExpressionSnafu {
            reason: format!("'{}' needs two operands", op.symbol()),
          }
          .fail();
        };
        let temp = alloc.next_temp();
        entries.push(TacEntry {
          dest: temp.clone(),
          operand1: lhs.operand,
          op: Some(op),
          operand2: Some(rhs.operand),
          negate1: lhs.negate,
          negate2: rhs.negate,
        });
        stack.push(Value {
          operand: temp,
          negate: None,
        });
      }
    }
  }

  let remaining = stack.len();
  match stack.pop() {
    Some(result) if remaining == 1 => Ok((entries, result)),
    _ => InvalidExpressionSnafu {
      reason: format!("{remaining} operands left after reduction"),
    }
    .fail(),
  }
}

fn lower_expression(
  tokens: &[Token],
  alloc: &mut Allocation,
) -> CompileResult<(Vec<TacEntry>, Value)> {
  let postfix = to_postfix(tokens)?;
  lower_postfix(postfix, alloc)
}

/// Split `<name> ( a , b , ... )` into the name and its argument tokens.
fn split_call(tokens: &[Token]) -> CompileResult<(&Token, Vec<&Token>)> {
  let [name, open, args @ .., close] = tokens else {
    return InvalidExpressionSnafu {
      reason: "expected a method call",
    }
    .fail();
  };
  ensure!(
    open.is(TokenType::LeftParen) && close.is(TokenType::RightParen),
    InvalidExpressionSnafu {
      reason: format!("expected '(' ... ')' after '{}'", name.lexeme),
    }
  );

  let mut arguments = Vec::new();
  if args.is_empty() {
    return Ok((name, arguments));
  }
  for (index, token) in args.iter().enumerate() {
    let argument_slot = index % 2 == 0;
    if argument_slot {
      ensure!(
        is_operand(token),
        InvalidExpressionSnafu {
          reason: format!("unsupported argument '{}'", token.lexeme),
        }
      );
      arguments.push(token);
    } else {
      ensure!(
        token.is(TokenType::Comma),
        InvalidExpressionSnafu {
          reason: format!("expected ',' between arguments, got '{}'", token.lexeme),
        }
      );
    }
  }
  ensure!(
    args.len() % 2 == 1,
    InvalidExpressionSnafu {
      reason: "argument list ends with ','",
    }
  );
  Ok((name, arguments))
}

fn argument_operand(token: &Token) -> Operand {
  if token.is(TokenType::Identifier) {
    Operand::temp(&token.lexeme)
  } else {
    Operand::literal(&token.lexeme)
  }
}

fn method_call(tokens: &[Token]) -> CompileResult<Vec<Instruction>> {
  let (name, arguments) = split_call(tokens)?;
  ensure!(
    name.is(TokenType::Identifier),
    InvalidExpressionSnafu {
      reason: format!("'{}' is not a method name", name.lexeme),
    }
  );
  let mut instructions: Vec<_> = arguments
    .into_iter()
    .map(|arg| Instruction::Push(argument_operand(arg)))
    .collect();
  instructions.push(Instruction::Call(name.lexeme.clone()));
  Ok(instructions)
}

/// Move `arg` into the register its I/O routine expects and call it.
/// Strings travel by address.
fn write_value(arg: &Token, alloc: &mut Allocation, instructions: &mut Vec<Instruction>) {
  let (register, value, routine) = if arg.is(TokenType::StringLiteral) {
    (STRING_IO_REGISTER, alloc.intern(&arg.lexeme), "writestr")
  } else {
    (INT_IO_REGISTER, argument_operand(arg), "writeint")
  };
  instructions.push(Instruction::Assign(TacEntry::copy(
    Operand::literal(register),
    value,
    None,
  )));
  instructions.push(Instruction::Call(routine.to_string()));
}

fn io_method_call(tokens: &[Token], alloc: &mut Allocation) -> CompileResult<Vec<Instruction>> {
  let (name, arguments) = split_call(tokens)?;
  let mut instructions = Vec::new();

  match (name.kind, arguments.as_slice()) {
    (TokenType::Read, [target]) if target.is(TokenType::Identifier) => {
      instructions.push(Instruction::Call("readint".to_string()));
      instructions.push(Instruction::Assign(TacEntry::copy(
        Operand::temp(&target.lexeme),
        Operand::literal(READ_REGISTER),
        None,
      )));
    }
    (TokenType::Write, [arg]) => write_value(arg, alloc, &mut instructions),
    (TokenType::WriteLn | TokenType::SystemOutPrintln, args) if args.len() <= 1 => {
      if let [arg] = args {
        write_value(arg, alloc, &mut instructions);
      }
      instructions.push(Instruction::Call("writeln".to_string()));
    }
    _ => {
      return InvalidExpressionSnafu {
        reason: format!(
          "'{}' with {} argument(s) is not an I/O call",
          name.lexeme,
          arguments.len()
        ),
      }
      .fail();
    }
  }
  Ok(instructions)
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::error::CompileError;
  use crate::token::LexemeTable;
  use crate::tokenizer::tokenize;

  fn generator(source: &str, mode: Mode) -> CodeGenerator {
    let table = LexemeTable::new();
    let mut generator = CodeGenerator::new();
    for token in tokenize(source, &table).unwrap() {
      generator.push(token);
    }
    generator.set_mode(mode);
    generator
  }

  fn locals(names: &[&str]) -> HashMap<String, String> {
    names
      .iter()
      .enumerate()
      .map(|(i, name)| (name.to_string(), frame_location(2 * (i + 1))))
      .collect()
  }

  #[test]
  fn postfix_respects_precedence_and_parens() {
    let table = LexemeTable::new();
    let tokens = tokenize("a + b * (c - d)", &table).unwrap();
    let shape: Vec<String> = to_postfix(&tokens)
      .unwrap()
      .into_iter()
      .map(|item| match item {
        Postfix::Operand(token) => token.lexeme,
        Postfix::Binary(op) => op.symbol().to_string(),
        Postfix::Unary(op) => format!("u{}", op.symbol()),
      })
      .collect();
    assert_eq!(shape, ["a", "b", "c", "d", "-", "*", "+"]);
  }

  #[test]
  fn assignment_folds_negation_into_consumer() {
    let mut generator = generator("x = a + -b", Mode::Assignment);
    let mut locations = locals(&["a", "b", "x"]);
    let mut out = String::new();
    generator
      .generate(|text| out.push_str(text), &mut locations, 6)
      .unwrap();
    assert_eq!(out, "_BP-8 = _BP-2 + -_BP-4\n_BP-6 = _BP-8\n");
    assert_eq!(locations["_t1"], "_BP-8");
  }

  #[test]
  fn mixed_prefix_operators_materialize_a_temporary() {
    let mut generator = generator("x = !-a", Mode::Assignment);
    let mut locations = locals(&["a", "x"]);
    let mut out = String::new();
    generator
      .generate(|text| out.push_str(text), &mut locations, 4)
      .unwrap();
    assert_eq!(out, "_BP-6 = -_BP-2\n_BP-4 = !_BP-6\n");
  }

  #[test]
  fn failed_generation_leaves_state_alone() {
    let mut generator = generator("x = a +", Mode::Assignment);
    let mut locations = locals(&["a", "x"]);
    let mut emitted = false;
    let err = generator
      .generate(|_| emitted = true, &mut locations, 4)
      .unwrap_err();
    assert!(matches!(err, CompileError::InvalidExpression { .. }));
    assert!(!emitted);
    assert_eq!(locations.len(), 2);
    assert_eq!(generator.temp_count(), 0);
  }

  #[test]
  fn unallocated_names_fail_rendering() {
    let mut generator = generator("x = ghost", Mode::Assignment);
    let mut locations = locals(&["x"]);
    let err = generator.generate(|_| {}, &mut locations, 2).unwrap_err();
    assert!(matches!(err, CompileError::UnallocatedVariable { ref name } if name == "ghost"));
  }

  #[test]
  fn write_string_passes_a_pooled_address() {
    let mut generator = generator("writeln(\"hi\")", Mode::IoMethodCall);
    let mut locations = HashMap::new();
    let mut out = String::new();
    generator
      .generate(|text| out.push_str(text), &mut locations, 0)
      .unwrap();
    assert_eq!(out, "_DX = offset _S0\ncall writestr\ncall writeln\n");
    assert_eq!(
      generator.strings(),
      [PooledString {
        label: "_S0".into(),
        text: "\"hi\"".into(),
      }]
    );
  }

  #[test]
  fn prefix_increment_is_rejected() {
    let mut generator = generator("x = ++a", Mode::Assignment);
    let mut locations = locals(&["a", "x"]);
    let err = generator.generate(|_| {}, &mut locations, 4).unwrap_err();
    assert!(matches!(err, CompileError::InvalidExpression { ref reason } if reason.contains("++")));
  }
}
