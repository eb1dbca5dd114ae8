//! Scoped symbol table.
//!
//! Declarations hash into a fixed number of buckets. Each bucket is a vector
//! whose tail is the head of the chain, so the newest declaration of a name
//! is the first one found when walking from the back. Nested scopes are
//! tagged with a depth; because an inner scope is always opened after its
//! enclosing one, its entries sit at the head of every bucket they touch
//! and a lookup returns the innermost visible declaration.
//!
//! The table also owns the variable-location map that the TAC compiler
//! resolves names through.

use std::collections::HashMap;

use tracing::debug;

use crate::error::{CompileResult, DuplicateEntrySnafu, UndeclaredIdentifierSnafu};
use crate::token::{Token, TokenType};
use crate::ty::VarType;

/// Number of hash buckets. Prime, never resized.
pub const TABLE_SIZE: usize = 211;

/// Prefix of every frame-relative stack address.
pub const FRAME_POINTER: &str = "_BP";

/// Symbolic address of the slot `offset` bytes below the frame pointer.
pub fn frame_location(offset: usize) -> String {
  format!("{FRAME_POINTER}-{offset}")
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassInfo {
  /// Bytes of instance storage.
  pub size: usize,
  pub methods: Vec<String>,
  pub variables: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MethodInfo {
  /// `None` for `void` methods.
  pub return_type: Option<VarType>,
  pub params: Vec<VarType>,
  pub locals_size: usize,
  pub params_size: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VariableInfo {
  pub ty: VarType,
  pub size: usize,
  pub offset: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConstantInfo {
  pub ty: VarType,
  pub value: String,
}

/// What a declaration turned out to be, attached once it is known.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EntryContent {
  Class(ClassInfo),
  Method(MethodInfo),
  Variable(VariableInfo),
  Constant(ConstantInfo),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Entry {
  pub token: Token,
  pub depth: usize,
  pub content: Option<EntryContent>,
}

impl Entry {
  pub fn lexeme(&self) -> &str {
    &self.token.lexeme
  }

  pub fn variable(&self) -> Option<&VariableInfo> {
    match &self.content {
      Some(EntryContent::Variable(info)) => Some(info),
      _ => None,
    }
  }

  pub fn method(&self) -> Option<&MethodInfo> {
    match &self.content {
      Some(EntryContent::Method(info)) => Some(info),
      _ => None,
    }
  }
}

/// hashpjw, reduced to a bucket index.
pub fn hash(lexeme: &str) -> usize {
  let mut h: u32 = 0;
  for byte in lexeme.bytes() {
    h = (h << 4).wrapping_add(u32::from(byte));
    let g = h & 0xf000_0000;
    if g != 0 {
      h ^= g >> 24;
      h ^= g;
    }
  }
  h as usize % TABLE_SIZE
}

#[derive(Debug)]
pub struct SymbolTable {
  buckets: Vec<Vec<Entry>>,
  locations: HashMap<String, String>,
}

impl SymbolTable {
  pub fn new() -> Self {
    Self {
      buckets: vec![Vec::new(); TABLE_SIZE],
      locations: HashMap::new(),
    }
  }

  /// Add a declaration at the head of its bucket. No duplicate check.
  pub fn insert(&mut self, token: Token, depth: usize) -> &mut Entry {
    let bucket = &mut self.buckets[hash(&token.lexeme)];
    bucket.push(Entry {
      token,
      depth,
      content: None,
    });
    let last = bucket.len() - 1;
    &mut bucket[last]
  }

  /// Innermost visible declaration of `lexeme`.
  pub fn lookup(&self, lexeme: &str) -> Option<&Entry> {
    self.buckets[hash(lexeme)]
      .iter()
      .rev()
      .find(|entry| entry.lexeme() == lexeme)
  }

  fn lookup_mut(&mut self, lexeme: &str) -> Option<&mut Entry> {
    self.buckets[hash(lexeme)]
      .iter_mut()
      .rev()
      .find(|entry| entry.lexeme() == lexeme)
  }

  /// Insert after checking that `lexeme` is not already declared at `depth`.
  pub fn declare(&mut self, token: Token, depth: usize) -> CompileResult<&mut Entry> {
    if let Some(existing) = self.lookup(&token.lexeme)
      && existing.depth == depth
    {
      return DuplicateEntrySnafu {
        lexeme: token.lexeme,
        depth,
      }
      .fail();
    }
    Ok(self.insert(token, depth))
  }

  /// Like `lookup`, but a missing name is an undeclared-identifier error.
  pub fn resolve(&self, lexeme: &str) -> CompileResult<&Entry> {
    match self.lookup(lexeme) {
      Some(entry) => Ok(entry),
      None => UndeclaredIdentifierSnafu { lexeme }.fail(),
    }
  }

  /// Attach type information to the innermost declaration of `lexeme`.
  /// Variables also get their frame location recorded.
  pub fn attach(&mut self, lexeme: &str, content: EntryContent) -> CompileResult<()> {
    if self.lookup(lexeme).is_none() {
      return UndeclaredIdentifierSnafu { lexeme }.fail();
    }
    if let EntryContent::Variable(info) = &content {
      self
        .locations
        .insert(lexeme.to_string(), frame_location(info.offset));
    }
    if let Some(entry) = self.lookup_mut(lexeme) {
      entry.content = Some(content);
    }
    Ok(())
  }

  /// Declare a local variable of type `ty` at `depth`, placing it just
  /// below the `frame_offset` bytes already in use. Returns the new frame
  /// offset.
  pub fn declare_local(
    &mut self,
    token: Token,
    depth: usize,
    ty: VarType,
    frame_offset: usize,
  ) -> CompileResult<usize> {
    debug_assert_eq!(token.kind, TokenType::Identifier);
    let lexeme = token.lexeme.clone();
    let offset = frame_offset + ty.size();
    self.declare(token, depth)?;
    self.attach(
      &lexeme,
      EntryContent::Variable(VariableInfo {
        ty,
        size: ty.size(),
        offset,
      }),
    )?;
    Ok(offset)
  }

  /// Call `emit` for every entry declared at exactly `depth`, walking each
  /// chain from its head and stopping at the first shallower entry.
  pub fn write_table(&self, depth: usize, mut emit: impl FnMut(&Entry)) {
    for bucket in &self.buckets {
      for entry in bucket.iter().rev() {
        if entry.depth < depth {
          break;
        }
        if entry.depth == depth {
          emit(entry);
        }
      }
    }
  }

  /// Drop every entry declared at `depth`, returning how many went.
  ///
  /// The location of every dropped variable falls back to whatever
  /// declaration of the name is visible afterwards, or is forgotten when
  /// none is left.
  pub fn delete_depth(&mut self, depth: usize) -> usize {
    let mut removed = 0;
    let mut variables = Vec::new();
    for bucket in &mut self.buckets {
      let (gone, kept): (Vec<Entry>, Vec<Entry>) = std::mem::take(bucket)
        .into_iter()
        .partition(|entry| entry.depth == depth);
      *bucket = kept;
      removed += gone.len();
      variables.extend(
        gone
          .into_iter()
          .filter(|entry| entry.variable().is_some())
          .map(|entry| entry.token.lexeme),
      );
    }
    for lexeme in variables {
      self.restore_location(lexeme);
    }
    if removed > 0 {
      debug!(depth, removed, "closed scope");
    }
    removed
  }

  fn restore_location(&mut self, lexeme: String) {
    match self.lookup(&lexeme).and_then(Entry::variable).copied() {
      Some(info) => {
        let location = frame_location(info.offset);
        self.locations.insert(lexeme, location);
      }
      None => {
        self.locations.remove(&lexeme);
      }
    }
  }

  pub fn locations(&self) -> &HashMap<String, String> {
    &self.locations
  }

  pub fn locations_mut(&mut self) -> &mut HashMap<String, String> {
    &mut self.locations
  }

  /// Forget every recorded stack location, at a method boundary.
  pub fn clear_locations(&mut self) {
    self.locations.clear();
  }

  pub fn len(&self) -> usize {
    self.buckets.iter().map(Vec::len).sum()
  }

  pub fn is_empty(&self) -> bool {
    self.buckets.iter().all(Vec::is_empty)
  }
}

impl Default for SymbolTable {
  fn default() -> Self {
    Self::new()
  }
}
