//! Three-address instructions and their textual form.
//!
//! Rendering resolves every named operand through the variable-location
//! map, so the emitted text only ever mentions frame-relative addresses,
//! fixed registers and literal values. The line shapes `proc`, `endp`,
//! `push` and `call` are the contract with the assembly backend and must
//! not change.

use std::collections::HashMap;

use crate::error::{CompileResult, UnallocatedVariableSnafu};

/// Register holding a method's return value.
pub const RETURN_REGISTER: &str = "_AX";
/// Register carrying an integer to the integer I/O routines.
pub const INT_IO_REGISTER: &str = "_AX";
/// Register carrying an integer back from `readint`.
pub const READ_REGISTER: &str = "_BX";
/// Register carrying a string address to the string I/O routines.
pub const STRING_IO_REGISTER: &str = "_DX";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Operand {
  /// Named storage: a declared variable or a generated temporary.
  Temp(String),
  /// Printed verbatim: a literal value or a fixed register.
  Literal(String),
}

impl Operand {
  pub fn temp(name: impl Into<String>) -> Self {
    Self::Temp(name.into())
  }

  pub fn literal(text: impl Into<String>) -> Self {
    Self::Literal(text.into())
  }

  pub fn name(&self) -> &str {
    match self {
      Self::Temp(name) | Self::Literal(name) => name,
    }
  }

  /// True for compiler-generated temporaries (`_t<N>`).
  pub fn is_generated(&self) -> bool {
    matches!(self, Self::Temp(name) if is_temp_name(name))
  }
}

pub fn is_temp_name(name: &str) -> bool {
  name
    .strip_prefix("_t")
    .is_some_and(|digits| !digits.is_empty() && digits.chars().all(|c| c.is_ascii_digit()))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
  Negate,
  Not,
}

impl UnaryOp {
  pub fn symbol(self) -> &'static str {
    match self {
      Self::Negate => "-",
      Self::Not => "!",
    }
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
  Add,
  Sub,
  Mul,
  Div,
}

impl BinaryOp {
  pub fn symbol(self) -> &'static str {
    match self {
      Self::Add => "+",
      Self::Sub => "-",
      Self::Mul => "*",
      Self::Div => "/",
    }
  }

  pub fn precedence(self) -> u8 {
    match self {
      Self::Add | Self::Sub => 1,
      Self::Mul | Self::Div => 2,
    }
  }
}

/// `dest = [neg]operand1 [op [neg]operand2]`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TacEntry {
  pub dest: Operand,
  pub operand1: Operand,
  pub op: Option<BinaryOp>,
  pub operand2: Option<Operand>,
  pub negate1: Option<UnaryOp>,
  pub negate2: Option<UnaryOp>,
}

impl TacEntry {
  pub fn copy(dest: Operand, source: Operand, negate: Option<UnaryOp>) -> Self {
    Self {
      dest,
      operand1: source,
      op: None,
      operand2: None,
      negate1: negate,
      negate2: None,
    }
  }

  /// An entry that just names an identifier as its own value.
  pub fn is_passthrough(&self) -> bool {
    self.op.is_none() && self.negate1.is_none() && self.dest == self.operand1
  }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Instruction {
  Assign(TacEntry),
  Push(Operand),
  Call(String),
}

/// Name resolution for rendering: a private map consulted before a shared one.
pub struct Locations<'a> {
  pub local: &'a HashMap<String, String>,
  pub global: &'a HashMap<String, String>,
}

impl Locations<'_> {
  fn resolve(&self, operand: &Operand) -> CompileResult<String> {
    match operand {
      Operand::Literal(text) => Ok(text.clone()),
      Operand::Temp(name) => self
        .local
        .get(name)
        .or_else(|| self.global.get(name))
        .cloned()
        .map_or_else(|| UnallocatedVariableSnafu { name }.fail(), Ok),
    }
  }
}

impl Instruction {
  pub fn render(&self, locations: &Locations<'_>) -> CompileResult<String> {
    let line = match self {
      Self::Assign(entry) => {
        let mut line = format!(
          "{} = {}{}",
          locations.resolve(&entry.dest)?,
          entry.negate1.map_or("", UnaryOp::symbol),
          locations.resolve(&entry.operand1)?
        );
        if let (Some(op), Some(operand2)) = (entry.op, &entry.operand2) {
          line.push_str(&format!(
            " {} {}{}",
            op.symbol(),
            entry.negate2.map_or("", UnaryOp::symbol),
            locations.resolve(operand2)?
          ));
        }
        line
      }
      Self::Push(operand) => format!("push {}", locations.resolve(operand)?),
      Self::Call(target) => format!("call {target}"),
    };
    Ok(line)
  }
}

/// Line opening a procedure body.
pub fn proc_open(name: &str) -> String {
  format!("proc {name}")
}

/// Line closing a procedure body.
pub fn proc_close(name: &str) -> String {
  format!("endp {name}")
}

/// Render a block, one `\n`-terminated line per instruction.
pub fn render_block(
  instructions: &[Instruction],
  locations: &Locations<'_>,
) -> CompileResult<String> {
  let mut block = String::new();
  for instruction in instructions {
    block.push_str(&instruction.render(locations)?);
    block.push('\n');
  }
  Ok(block)
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::error::CompileError;

  fn maps() -> (HashMap<String, String>, HashMap<String, String>) {
    let local = HashMap::from([("_t1".to_string(), "_BP-8".to_string())]);
    let global = HashMap::from([
      ("a".to_string(), "_BP-2".to_string()),
      ("b".to_string(), "_BP-4".to_string()),
    ]);
    (local, global)
  }

  #[test]
  fn renders_negated_operands() {
    let (local, global) = maps();
    let locations = Locations {
      local: &local,
      global: &global,
    };
    let entry = TacEntry {
      dest: Operand::temp("_t1"),
      operand1: Operand::temp("a"),
      op: Some(BinaryOp::Mul),
      operand2: Some(Operand::temp("b")),
      negate1: None,
      negate2: Some(UnaryOp::Negate),
    };
    assert_eq!(
      Instruction::Assign(entry).render(&locations).unwrap(),
      "_BP-8 = _BP-2 * -_BP-4"
    );
  }

  #[test]
  fn literals_render_verbatim() {
    let (local, global) = maps();
    let locations = Locations {
      local: &local,
      global: &global,
    };
    let push = Instruction::Push(Operand::literal("42"));
    assert_eq!(push.render(&locations).unwrap(), "push 42");
    let call = Instruction::Call("sum".into());
    assert_eq!(call.render(&locations).unwrap(), "call sum");
  }

  #[test]
  fn unknown_names_are_unallocated() {
    let (local, global) = maps();
    let locations = Locations {
      local: &local,
      global: &global,
    };
    let err = Instruction::Push(Operand::temp("zz"))
      .render(&locations)
      .unwrap_err();
    assert!(matches!(err, CompileError::UnallocatedVariable { ref name } if name == "zz"));
  }

  #[test]
  fn procedure_brackets() {
    let (local, global) = maps();
    let locations = Locations {
      local: &local,
      global: &global,
    };
    let body = render_block(
      &[
        Instruction::Push(Operand::temp("a")),
        Instruction::Call("sum".into()),
      ],
      &locations,
    )
    .unwrap();
    let text = format!("{}\n{body}{}\n", proc_open("main"), proc_close("main"));
    assert_eq!(text, "proc main\npush _BP-2\ncall sum\nendp main\n");
  }

  #[test]
  fn temp_names() {
    assert!(is_temp_name("_t12"));
    assert!(!is_temp_name("_t"));
    assert!(!is_temp_name("t1"));
    assert!(Operand::temp("_t3").is_generated());
    assert!(!Operand::literal("_t3").is_generated());
  }
}
