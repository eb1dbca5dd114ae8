use crate::token::TokenType;

/// Storage type of a declared variable, constant or parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VarType {
  Int,
  Boolean,
  Char,
  Float,
}

impl VarType {
  /// Map a type keyword to its storage type.
  pub fn from_token(kind: TokenType) -> Option<Self> {
    match kind {
      TokenType::Int => Some(Self::Int),
      TokenType::Boolean => Some(Self::Boolean),
      TokenType::Char => Some(Self::Char),
      TokenType::Float => Some(Self::Float),
      _ => None,
    }
  }

  pub fn from_name(name: &str) -> Option<Self> {
    match name {
      "int" => Some(Self::Int),
      "boolean" => Some(Self::Boolean),
      "char" => Some(Self::Char),
      "float" => Some(Self::Float),
      _ => None,
    }
  }

  /// Size in bytes on the stack frame.
  pub fn size(self) -> usize {
    match self {
      Self::Int => 2,
      Self::Boolean => 1,
      Self::Char => 1,
      Self::Float => 4,
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn keywords_and_names_agree() {
    for (kind, name) in [
      (TokenType::Int, "int"),
      (TokenType::Boolean, "boolean"),
      (TokenType::Char, "char"),
      (TokenType::Float, "float"),
    ] {
      assert_eq!(VarType::from_token(kind), VarType::from_name(name));
      assert_eq!(kind.lexeme(), Some(name));
    }
    assert_eq!(VarType::from_token(TokenType::Void), None);
  }

  #[test]
  fn int_is_one_temporary_wide() {
    assert_eq!(VarType::Int.size(), crate::codegen::TEMP_SIZE);
  }
}
