use std::collections::HashMap;

use jtac::symtab::frame_location;
use jtac::ty::VarType;
use jtac::{
  CodeGenerator, CompileError, LexemeTable, Mode, SymbolTable, Token, TokenType, compile_statement,
  tokenize,
};

/// Locals `names` laid out 2 bytes apart from `_BP-2`.
fn locals(names: &[&str]) -> HashMap<String, String> {
  names
    .iter()
    .enumerate()
    .map(|(i, name)| (name.to_string(), frame_location(2 * (i + 1))))
    .collect()
}

fn load(generator: &mut CodeGenerator, source: &str, mode: Mode) {
  let table = LexemeTable::new();
  for token in tokenize(source, &table).unwrap() {
    generator.push(token);
  }
  generator.set_mode(mode);
}

fn run(
  generator: &mut CodeGenerator,
  locations: &mut HashMap<String, String>,
  frame_offset: usize,
) -> Result<String, CompileError> {
  let mut out = String::new();
  generator.generate(|text| out.push_str(text), locations, frame_offset)?;
  generator.clear();
  Ok(out)
}

fn compile(source: &str, mode: Mode, names: &[&str], frame_offset: usize) -> String {
  let mut generator = CodeGenerator::new();
  let mut locations = locals(names);
  load(&mut generator, source, mode);
  run(&mut generator, &mut locations, frame_offset).unwrap()
}

fn offset_of(location: &str) -> usize {
  location.strip_prefix("_BP-").unwrap().parse().unwrap()
}

#[test]
fn double_not_cancels() {
  let mut generator = CodeGenerator::new();
  generator.push(Token::new(TokenType::Not, "!", 1));
  generator.push(Token::new(TokenType::Not, "!", 1));
  generator.push(Token::new(TokenType::True, "true", 1));
  generator.set_mode(Mode::ReturnExpression);
  let out = run(&mut generator, &mut HashMap::new(), 0).unwrap();
  assert_eq!(out, "_AX = true\n");
}

#[test]
fn single_not_sets_the_flag() {
  assert_eq!(
    compile("return !true", Mode::ReturnExpression, &[], 0),
    "_BP-2 = true\n_AX = !_BP-2\n"
  );
}

#[test]
fn double_minus_cancels() {
  assert_eq!(compile("return --2", Mode::ReturnExpression, &[], 0), "_AX = 2\n");
  assert_eq!(compile("return - -2", Mode::ReturnExpression, &[], 0), "_AX = 2\n");
  assert_eq!(
    compile("return -2", Mode::ReturnExpression, &[], 0),
    "_BP-2 = 2\n_AX = -_BP-2\n"
  );
}

#[test]
fn negation_is_folded_into_the_consumer() {
  assert_eq!(
    compile("x = -a * b", Mode::Assignment, &["a", "b", "x"], 6),
    "_BP-8 = -_BP-2 * _BP-4\n_BP-6 = _BP-8\n"
  );
}

#[test]
fn negation_through_parentheses_cancels() {
  assert_eq!(
    compile("x = -(-a)", Mode::Assignment, &["a", "x"], 4),
    "_BP-4 = _BP-2\n"
  );
}

#[test]
fn return_renames_the_final_temporary() {
  assert_eq!(
    compile("return a * (b + 1)", Mode::ReturnExpression, &["a", "b"], 4),
    "_BP-6 = 1\n_BP-8 = _BP-4 + _BP-6\n_AX = _BP-2 * _BP-8\n"
  );
}

#[test]
fn return_of_a_plain_variable_copies_it() {
  assert_eq!(
    compile("return a", Mode::ReturnExpression, &["a"], 2),
    "_AX = _BP-2\n"
  );
}

#[test]
fn temporaries_take_two_bytes_each() {
  let mut generator = CodeGenerator::new();
  let mut locations = locals(&["a", "b", "c", "d", "x"]);
  load(&mut generator, "x = a * b + c * d - 7", Mode::Assignment);
  run(&mut generator, &mut locations, 10).unwrap();

  assert_eq!(generator.temp_count(), 5);
  assert_eq!(generator.temp_size(), 10);
  let offsets: Vec<usize> = (1..=5)
    .map(|n| offset_of(&locations[&format!("_t{n}")]))
    .collect();
  assert_eq!(offsets[0], 12);
  for pair in offsets.windows(2) {
    assert_eq!(pair[1], pair[0] + 2);
  }
}

#[test]
fn clear_keeps_numbering_and_reset_restarts_it() {
  let mut generator = CodeGenerator::new();
  let mut locations = locals(&["x", "y"]);
  load(&mut generator, "x = 1", Mode::Assignment);
  run(&mut generator, &mut locations, 4).unwrap();
  load(&mut generator, "y = 2", Mode::Assignment);
  let out = run(&mut generator, &mut locations, 4).unwrap();
  assert_eq!(out, "_BP-8 = 2\n_BP-4 = _BP-8\n");
  assert_eq!(generator.temp_count(), 2);
  assert_eq!(generator.temp_size(), 4);

  generator.reset();
  assert_eq!(generator.temp_count(), 0);
  assert_eq!(generator.temp_size(), 0);
  assert_eq!(generator.mode(), None);
  assert!(generator.tokens().is_empty());
}

#[test]
fn missing_mode_is_rejected() {
  let mut generator = CodeGenerator::new();
  load(&mut generator, "x = 1", Mode::Assignment);
  generator.clear();
  let table = LexemeTable::new();
  for token in tokenize("x = 1", &table).unwrap() {
    generator.push(token);
  }

  let mut locations = locals(&["x"]);
  let mut emitted = false;
  let err = generator
    .generate(|_| emitted = true, &mut locations, 2)
    .unwrap_err();
  assert!(matches!(err, CompileError::InvalidMode));
  assert!(!emitted);
  assert_eq!(locations.len(), 1);
}

#[test]
fn leftover_operands_are_an_invalid_expression() {
  let mut generator = CodeGenerator::new();
  let mut locations = locals(&["a", "b", "x"]);
  load(&mut generator, "x = a b", Mode::Assignment);
  let mut emitted = false;
  let err = generator
    .generate(|_| emitted = true, &mut locations, 6)
    .unwrap_err();
  assert!(matches!(err, CompileError::InvalidExpression { .. }));
  assert!(!emitted);
  assert_eq!(locations.len(), 3);
}

#[test]
fn unbalanced_parentheses_are_rejected() {
  for source in ["x = (a + 1", "x = a + 1)", "x = ()"] {
    let mut generator = CodeGenerator::new();
    load(&mut generator, source, Mode::Assignment);
    let err = run(&mut generator, &mut locals(&["a", "x"]), 4).unwrap_err();
    assert!(
      matches!(err, CompileError::InvalidExpression { .. }),
      "{source}: {err}"
    );
  }
}

#[test]
fn pop_rolls_back_the_buffer() {
  let mut generator = CodeGenerator::new();
  load(&mut generator, "x = a +", Mode::Assignment);
  let popped = generator.pop().unwrap();
  assert_eq!(popped.kind, TokenType::Plus);
  let out = run(&mut generator, &mut locals(&["a", "x"]), 4).unwrap();
  assert_eq!(out, "_BP-4 = _BP-2\n");
}

#[test]
fn method_call_pushes_arguments_in_order() {
  assert_eq!(
    compile("sum(a, 3, b)", Mode::MethodCall, &["a", "b"], 4),
    "push _BP-2\npush 3\npush _BP-4\ncall sum\n"
  );
  assert_eq!(compile("tick()", Mode::MethodCall, &[], 0), "call tick\n");
}

#[test]
fn assignment_via_call_stores_the_return_register() {
  assert_eq!(
    compile("x = sum(a)", Mode::AssignmentViaMethodCall, &["a", "x"], 4),
    "push _BP-2\ncall sum\n_BP-4 = _AX\n"
  );
}

#[test]
fn malformed_argument_lists_are_rejected() {
  for source in ["sum(a,)", "sum(a b)", "sum(a + b)", "sum"] {
    let mut generator = CodeGenerator::new();
    load(&mut generator, source, Mode::MethodCall);
    let err = run(&mut generator, &mut locals(&["a", "b"]), 4).unwrap_err();
    assert!(
      matches!(err, CompileError::InvalidExpression { .. }),
      "{source}: {err}"
    );
  }
}

#[test]
fn io_intrinsics() {
  assert_eq!(
    compile("write(a)", Mode::IoMethodCall, &["a"], 2),
    "_AX = _BP-2\ncall writeint\n"
  );
  assert_eq!(
    compile("read(a)", Mode::IoMethodCall, &["a"], 2),
    "call readint\n_BP-2 = _BX\n"
  );
  assert_eq!(
    compile("writeln(5)", Mode::IoMethodCall, &[], 0),
    "_AX = 5\ncall writeint\ncall writeln\n"
  );
  assert_eq!(
    compile("System.out.println(a)", Mode::IoMethodCall, &["a"], 2),
    "_AX = _BP-2\ncall writeint\ncall writeln\n"
  );
  assert_eq!(
    compile("writeln()", Mode::IoMethodCall, &[], 0),
    "call writeln\n"
  );
}

#[test]
fn string_writes_share_one_pool_across_methods() {
  let mut generator = CodeGenerator::new();
  let mut locations = HashMap::new();
  load(&mut generator, "write(\"total: \")", Mode::IoMethodCall);
  let first = run(&mut generator, &mut locations, 0).unwrap();
  generator.reset();
  load(&mut generator, "System.out.println(\"done\")", Mode::IoMethodCall);
  let second = run(&mut generator, &mut locations, 0).unwrap();

  assert_eq!(first, "_DX = offset _S0\ncall writestr\n");
  assert_eq!(second, "_DX = offset _S1\ncall writestr\ncall writeln\n");
  let pool: Vec<_> = generator
    .strings()
    .iter()
    .map(|s| (s.label.as_str(), s.text.as_str()))
    .collect();
  assert_eq!(pool, [("_S0", "\"total: \""), ("_S1", "\"done\"")]);
}

#[test]
fn failed_io_call_pools_nothing() {
  let mut generator = CodeGenerator::new();
  load(&mut generator, "write(\"a\", \"b\")", Mode::IoMethodCall);
  assert!(run(&mut generator, &mut HashMap::new(), 0).is_err());
  assert!(generator.strings().is_empty());
}

#[test]
fn increments_are_not_expression_operators() {
  for source in ["x = ++a", "x = a + ++a", "x = a++"] {
    let mut generator = CodeGenerator::new();
    load(&mut generator, source, Mode::Assignment);
    let err = run(&mut generator, &mut locals(&["a", "x"]), 4).unwrap_err();
    assert!(
      matches!(err, CompileError::InvalidExpression { .. }),
      "{source}: {err}"
    );
    assert_eq!(generator.temp_count(), 0);
  }
  assert_eq!(
    compile("x = +a", Mode::Assignment, &["a", "x"], 4),
    "_BP-4 = _BP-2\n"
  );
}

#[test]
fn io_mode_rejects_ordinary_methods() {
  let mut generator = CodeGenerator::new();
  load(&mut generator, "sum(a)", Mode::IoMethodCall);
  let err = run(&mut generator, &mut locals(&["a"]), 2).unwrap_err();
  assert!(matches!(err, CompileError::InvalidExpression { .. }));
}

#[test]
fn compile_statement_uses_the_symbol_table() {
  let lexemes = LexemeTable::new();
  let mut table = SymbolTable::new();
  let mut frame = 0;
  for name in ["a", "b"] {
    frame = table
      .declare_local(Token::identifier(name, 1), 1, VarType::Int, frame)
      .unwrap();
  }
  let mut generator = CodeGenerator::new();

  let out = compile_statement(
    "return a * (b + 1);",
    Mode::ReturnExpression,
    &lexemes,
    &mut table,
    &mut generator,
    frame,
  )
  .unwrap();
  assert_eq!(out, "_BP-6 = 1\n_BP-8 = _BP-4 + _BP-6\n_AX = _BP-2 * _BP-8\n");
  assert_eq!(table.locations()["_t2"], "_BP-8");

  let err = compile_statement(
    "\n\nb = c + 1;",
    Mode::Assignment,
    &lexemes,
    &mut table,
    &mut generator,
    frame,
  )
  .unwrap_err();
  assert_eq!(err.to_string(), "line 3: undeclared identifier 'c'");
  assert!(matches!(err.kind(), CompileError::UndeclaredIdentifier { .. }));
}

#[test]
fn compile_statement_rejects_text_after_the_statement() {
  let lexemes = LexemeTable::new();
  let mut table = SymbolTable::new();
  let frame = table
    .declare_local(Token::identifier("x", 1), 1, VarType::Int, 0)
    .unwrap();
  let mut generator = CodeGenerator::new();

  let err = compile_statement(
    "x = 1; x = ghost +",
    Mode::Assignment,
    &lexemes,
    &mut table,
    &mut generator,
    frame,
  )
  .unwrap_err();
  assert_eq!(
    err.to_string(),
    "line 1: Statement: expected end of input, but got \"x\""
  );
  assert_eq!(generator.temp_count(), 0);
  assert!(!table.locations().contains_key("_t1"));

  let out = compile_statement(
    "x = 1",
    Mode::Assignment,
    &lexemes,
    &mut table,
    &mut generator,
    frame,
  )
  .unwrap();
  assert_eq!(out, "_BP-4 = 1\n_BP-2 = _BP-4\n");
}

#[test]
fn compile_statement_allows_undeclared_method_names() {
  let lexemes = LexemeTable::new();
  let mut table = SymbolTable::new();
  let frame = table
    .declare_local(Token::identifier("x", 1), 1, VarType::Int, 0)
    .unwrap();
  let mut generator = CodeGenerator::new();
  let out = compile_statement(
    "x = next(x);",
    Mode::AssignmentViaMethodCall,
    &lexemes,
    &mut table,
    &mut generator,
    frame,
  )
  .unwrap();
  assert_eq!(out, "push _BP-2\ncall next\n_BP-2 = _AX\n");
}
