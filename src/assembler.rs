/*!

  A one-pass assembler that writes instruction words straight into a machine's code memory at
  the write cursor `W`.

  The grammar, by statement:

    ```text
    <label>       ::= ID ':'
    <declaration> ::= 'mnem' ID '(' [INT] ')' FORM ';'
    <data>        ::= 'dw' ['-'] INT ';'
                    | 'dw' INT ',' INT ',' INT ',' INT ';'
                    | 'dw' STRING ';'
                    | 'ds' STRING ';'
    <instruction> ::= MNEMONIC <operands> ';'
    ```

  The operand syntax is determined by the form the mnemonic was declared with:

    ```text
    regs    R ',' R                   R    ::= ('reg' | 'stack') ':' INT
                                             | '[' ('reg' | 'stack') ':' INT ']'
    xaddr   MODE ':' LOC              MODE ::= ['['] KW ('+' KW)*
    scalar  MODE ':' INT ',' INT      KW   ::= 'code' | 'stack' | 'reg'
    chars   STRING
    short   ['-'] INT | ID
    noargs
    ```

  An opening bracket must be matched by a closing bracket after the location. `LOC` is an
  integer or a label.

  Labels may be referenced before they are defined. Such a reference emits a zero in place of
  the address and leaves a patch, which the label's definition fills in. A label still
  undefined at the end of the source is an error.

*/

use std::cmp::max;
use std::collections::HashMap;
use std::str::FromStr;

use string_cache::DefaultAtom;

use crate::address::{wrap, AddressNumberType, CODE_SEGMENT, VM_SIZE};
use crate::bytecode::{
  decode_instruction,
  encode_bytes,
  encode_instruction,
  ExtendedAddress,
  Form,
  Opcode,
  Operands,
  RegisterPair,
  Scalar,
  Word
};
use crate::cell::{Cell, Register};
use crate::error::AssemblyError;
use crate::lexer::Lexer;
use crate::machine::Machine;
use crate::symboltable::SymbolTable;
use crate::token::{Position, Token, TokenKind};

/// Which part of an instruction word a patch fills in.
#[derive(Clone, Copy, Eq, PartialEq, Debug, Hash)]
pub enum PatchField {
  /// The whole 16-bit operand field of a `short` instruction.
  Short,
  /// The 13-bit location of an `xaddr` instruction. The mode bits are kept.
  ExtendedLocation,
}

/// A reference to a label that had not been defined when it was assembled.
#[derive(Clone, Copy, Eq, PartialEq, Debug, Hash)]
pub struct Patch {
  /// Code address of the referencing instruction.
  pub address  : AddressNumberType,
  pub field    : PatchField,
  /// Where the reference appears in the source.
  pub position : Position,
}

/// An operand that is either known now or names a label.
enum Value {
  Number(u16),
  Label(DefaultAtom, Position),
}

#[derive(Debug, Default)]
pub struct Assembler {
  symbols       : SymbolTable,
  labels        : HashMap<DefaultAtom, AddressNumberType>,
  patches       : HashMap<DefaultAtom, Vec<Patch>>,
  /// The opcode after the last one handed to a declaration with empty parentheses.
  next_auto     : usize,
}

// region Token helpers

fn unexpected(expected: &str, token: &Token) -> AssemblyError {
  AssemblyError::Unexpected {
    position : token.position,
    expected : expected.to_string(),
    found    : token.to_string(),
  }
}

fn out_of_range(token: &Token, bits: u32) -> AssemblyError {
  AssemblyError::OutOfRange {
    position : token.position,
    value    : token.to_string(),
    bits,
  }
}

/// Consumes the operator `op` or fails.
fn expect(lexer: &mut Lexer, op: &str) -> Result<Token, AssemblyError> {
  let token = lexer.next_token()?;
  match token.is(op) {
    true  => Ok(token),
    false => Err(unexpected(&format!("'{}'", op), &token))
  }
}

/// Consumes the operator `op` if it is next.
fn accept(lexer: &mut Lexer, op: &str) -> Result<bool, AssemblyError> {
  let found = lexer.peek(0)?.is(op);
  if found {
    lexer.next_token()?;
  }
  Ok(found)
}

fn identifier(lexer: &mut Lexer, expected: &str) -> Result<Token, AssemblyError> {
  let token = lexer.next_token()?;
  match token.kind {
    TokenKind::Identifier => Ok(token),
    _ => Err(unexpected(expected, &token))
  }
}

/// Reads an unsigned integer that must fit in `bits` bits.
fn unsigned(lexer: &mut Lexer, bits: u32) -> Result<(u64, Token), AssemblyError> {
  let token = lexer.next_token()?;
  if token.kind != TokenKind::Integer {
    return Err(unexpected("an integer", &token));
  }
  match token.text.parse::<u64>() {
    Ok(value) if value < (1u64 << bits) => Ok((value, token)),
    _ => Err(out_of_range(&token, bits))
  }
}

/// Reads an integer with an optional leading `-`, accepting `-2^(bits-1)` through `2^bits - 1`.
/// The result is the value's two's complement truncated to `bits`.
fn signed(lexer: &mut Lexer, bits: u32) -> Result<u64, AssemblyError> {
  let negative = accept(lexer, "-")?;
  let token = lexer.next_token()?;
  if token.kind != TokenKind::Integer {
    return Err(unexpected("an integer", &token));
  }
  let magnitude = token.text.parse::<u64>().map_err(|_| out_of_range(&token, bits))?;
  let mask = (1u64 << bits) - 1;
  match negative {
    true if magnitude <= 1u64 << (bits - 1) => Ok(magnitude.wrapping_neg() & mask),
    false if magnitude <= mask => Ok(magnitude),
    _ => Err(out_of_range(&token, bits))
  }
}

/// The bytes of a string literal, which must have exactly `expected` characters each fitting in
/// a byte.
fn literal_bytes(token: &Token, expected: usize) -> Result<Vec<u8>, AssemblyError> {
  if !token.kind.is_string() {
    return Err(unexpected("a character constant", token));
  }
  let length = token.text.chars().count();
  if length != expected {
    return Err(AssemblyError::CharacterLiteralLength { position: token.position, expected, length });
  }
  token.text
       .chars()
       .map(|c| match (c as u32) < 256 {
         true  => Ok(c as u8),
         false => Err(out_of_range(token, 8))
       })
       .collect()
}

// endregion

/// Removes everything from a `#` to the end of its line, except inside a quoted literal. Line
/// structure is kept so that error positions still match the original text.
pub fn strip_comments(text: &str) -> String {
  let mut stripped = String::with_capacity(text.len());
  let mut quote: Option<char> = None;
  let mut in_comment = false;

  for c in text.chars() {
    match (in_comment, quote) {
      (true, _) => {
        if c == '\n' {
          in_comment = false;
          stripped.push(c);
        }
      }
      (false, Some(open)) => {
        if c == open {
          quote = None;
        }
        stripped.push(c);
      }
      (false, None) => match c {
        '#'        => in_comment = true,
        '"' | '\'' => {
          quote = Some(c);
          stripped.push(c);
        }
        _ => stripped.push(c)
      }
    }
  }
  stripped
}

impl Assembler {

  pub fn new() -> Assembler {
    Assembler::default()
  }

  // region Accessors

  pub fn form_of(&self, name: &str) -> Option<Form> {
    self.symbols.get_form(name)
  }

  pub fn opcode_of(&self, name: &str) -> Option<Opcode> {
    self.symbols.get_opcode(name)
  }

  /// The address of a label defined by the most recent run.
  pub fn label(&self, name: &str) -> Option<AddressNumberType> {
    self.labels.get(&DefaultAtom::from(name)).copied()
  }

  pub fn mnemonics(&self) -> &SymbolTable {
    &self.symbols
  }

  /// Renders a word in assembly syntax using the declared mnemonics, e.g. `push-l 7;`.
  pub fn disassemble(&self, word: Word) -> String {
    let instruction = decode_instruction(word);
    let name = self.symbols.get_name(instruction.opcode);
    match name.and_then(|n| self.symbols.get_form(&n).map(|f| (n, f))) {
      Some((name, Form::NoArgs)) => format!("{};", name),
      Some((name, form)) => format!("{} {};", name, instruction.operands(form)),
      None => format!("dw {};", word as Cell)
    }
  }

  // endregion

  /**
    Assembles `source` into `machine`'s code memory, starting at its `W` register. Labels and
    pending patches are forgotten at the start of every run; declared mnemonics persist.
    The first error aborts the run; words emitted before it stay in code memory.
  */
  pub fn assemble(&mut self, machine: &mut Machine, source: &str) -> Result<(), AssemblyError> {
    self.labels.clear();
    self.patches.clear();

    let mut lexer = Lexer::new(source);

    loop {
      let token = lexer.next_token()?;
      if token.is_eof() {
        break;
      }
      if token.kind != TokenKind::Identifier {
        return Err(unexpected("a statement", &token));
      }

      if accept(&mut lexer, ":")? {
        self.define_label(machine, &token)?;
        continue;
      }

      match token.text.as_str() {
        "mnem" => self.declaration(machine, &mut lexer)?,
        "dw"   => self.declare_word(machine, &mut lexer)?,
        "ds"   => self.declare_string(machine, &mut lexer)?,
        name   => {
          match (self.symbols.get_form(name), self.symbols.get_opcode(name)) {
            (Some(form), Some(opcode)) => self.instruction(machine, &mut lexer, opcode, form)?,
            _ => {
              return Err(
                AssemblyError::UnknownMnemonic { position: token.position, name: name.to_string() }
              );
            }
          }
        }
      }
    }

    self.check_pending()
  }

  // region Labels

  fn define_label(&mut self, machine: &mut Machine, token: &Token) -> Result<(), AssemblyError> {
    let name = DefaultAtom::from(token.text.as_str());
    if self.labels.contains_key(&name) {
      return Err(AssemblyError::DuplicateLabel { position: token.position, name: token.text.clone() });
    }

    let address = wrap(machine.reg(Register::W) as i64);
    #[cfg(feature = "trace_computation")] println!("label {} = {}", name, address);
    self.labels.insert(name.clone(), address);

    if let Some(patches) = self.patches.remove(&name) {
      for patch in patches {
        #[cfg(feature = "trace_computation")] println!("  patch code[{}] <- {}", patch.address, address);
        Assembler::apply_patch(machine, &patch, address);
      }
    }
    Ok(())
  }

  fn apply_patch(machine: &mut Machine, patch: &Patch, address: AddressNumberType) {
    let instruction = decode_instruction(machine.code()[patch.address] as Word);
    let patched = match patch.field {
      PatchField::Short            => instruction.with_field(address as u16),
      PatchField::ExtendedLocation => instruction.with_location(address as u16),
    };
    machine.code_mut()[patch.address] = Word::from(patched) as Cell;
  }

  /// The address a label operand stands for, or 0 and a patch if it is not yet defined.
  fn resolve_value(&mut self, machine: &Machine, value: Value, field: PatchField) -> u16 {
    match value {

      Value::Number(number) => number,

      Value::Label(name, position) => {
        match self.labels.get(&name) {
          Some(address) => *address as u16,
          None => {
            let patch = Patch { address: wrap(machine.reg(Register::W) as i64), field, position };
            #[cfg(feature = "trace_computation")] println!("forward reference to {} at {}", name, patch.address);
            self.patches.entry(name).or_insert_with(Vec::new).push(patch);
            0
          }
        }
      }

    }
  }

  /// Fails on the earliest reference to a label that was never defined.
  fn check_pending(&self) -> Result<(), AssemblyError> {
    let first =
      self.patches
          .iter()
          .filter_map(|(name, patches)| patches.first().map(|p| (p.position, name)))
          .min_by(|a, b| a.0.cmp(&b.0));

    match first {
      Some((position, name)) => {
        Err(AssemblyError::UndefinedLabel { position, name: name.to_string() })
      }
      None => Ok(())
    }
  }

  // endregion

  // region Statements

  /// `mnem name(opcode) form;` with the opcode optional.
  fn declaration(&mut self, machine: &Machine, lexer: &mut Lexer) -> Result<(), AssemblyError> {
    let name = identifier(lexer, "an instruction name")?;
    expect(lexer, "(")?;

    let opcode: Opcode = match accept(lexer, ")")? {

      true => {
        let next = max(machine.opcode_count(), self.next_auto);
        if next > Opcode::MAX as usize {
          return Err(AssemblyError::OutOfRange {
            position : name.position,
            value    : next.to_string(),
            bits     : 16
          });
        }
        self.next_auto = next + 1;
        next as Opcode
      }

      false => {
        let (value, _) = unsigned(lexer, 16)?;
        expect(lexer, ")")?;
        value as Opcode
      }

    };

    let form_token = lexer.next_token()?;
    let form = match form_token.kind {
      TokenKind::Identifier => Form::from_str(&form_token.text).ok(),
      _ => None
    }.ok_or_else(|| AssemblyError::UnknownForm {
      position : form_token.position,
      found    : form_token.to_string()
    })?;
    expect(lexer, ";")?;

    #[cfg(feature = "trace_computation")] println!("mnem {}({}) {}", name.text, opcode, form);
    self.symbols.insert(DefaultAtom::from(name.text.as_str()), form, opcode);
    Ok(())
  }

  fn declare_word(&mut self, machine: &mut Machine, lexer: &mut Lexer) -> Result<(), AssemblyError> {
    let kind = lexer.peek(0)?.kind;
    let word: Word = match kind {

      TokenKind::DoubleString | TokenKind::SingleString => {
        let token = lexer.next_token()?;
        let bytes = literal_bytes(&token, 4)?;
        encode_bytes([bytes[0], bytes[1], bytes[2], bytes[3]])
      }

      _ => {
        let position = lexer.peek(0)?.position;
        let first    = signed(lexer, 32)?;
        match accept(lexer, ",")? {
          true  => {
            let mut bytes = [0u8; 4];
            bytes[0] = Assembler::byte(first, position)?;
            for (i, byte) in bytes.iter_mut().enumerate().skip(1) {
              if i > 1 {
                expect(lexer, ",")?;
              }
              let (value, _) = unsigned(lexer, 8)?;
              *byte = value as u8;
            }
            encode_bytes(bytes)
          }
          false => first as Word
        }
      }

    };
    expect(lexer, ";")?;
    machine.emit(word);
    Ok(())
  }

  fn byte(value: u64, position: Position) -> Result<u8, AssemblyError> {
    match value < 256 {
      true  => Ok(value as u8),
      false => Err(AssemblyError::OutOfRange { position, value: value.to_string(), bits: 8 })
    }
  }

  /// `ds "text";` packs the text four bytes to a word, zero padding the last.
  fn declare_string(&mut self, machine: &mut Machine, lexer: &mut Lexer) -> Result<(), AssemblyError> {
    let token = lexer.next_token()?;
    if !token.kind.is_string() {
      return Err(unexpected("a string", &token));
    }
    expect(lexer, ";")?;

    for chunk in token.text.as_bytes().chunks(4) {
      let mut bytes = [0u8; 4];
      bytes[..chunk.len()].copy_from_slice(chunk);
      machine.emit(encode_bytes(bytes));
    }
    Ok(())
  }

  fn instruction(&mut self, machine: &mut Machine, lexer: &mut Lexer, opcode: Opcode, form: Form)
    -> Result<(), AssemblyError>
  {
    let operands = match form {

      Form::Registers => {
        let (src, src_mode) = Assembler::register(lexer)?;
        expect(lexer, ",")?;
        let (dst, dst_mode) = Assembler::register(lexer)?;
        Operands::Registers(RegisterPair { src, src_mode, dst, dst_mode })
      }

      Form::Chars => {
        let token = lexer.next_token()?;
        let bytes = literal_bytes(&token, 2)?;
        Operands::Chars(bytes[0], bytes[1])
      }

      Form::Extended => {
        let (mode, bracketed) = Assembler::mode(lexer)?;
        expect(lexer, ":")?;
        let value = Assembler::location(lexer)?;
        if bracketed {
          expect(lexer, "]")?;
        }
        let location = self.resolve_value(machine, value, PatchField::ExtendedLocation);
        Operands::Extended(ExtendedAddress { mode, location })
      }

      Form::Scalar => {
        let (mode, bracketed) = Assembler::mode(lexer)?;
        expect(lexer, ":")?;
        let (location, _) = unsigned(lexer, 6)?;
        if bracketed {
          expect(lexer, "]")?;
        }
        expect(lexer, ",")?;
        let (length, _) = unsigned(lexer, 7)?;
        Operands::Scalar(Scalar { mode, location: location as u8, length: length as u8 })
      }

      Form::Short => {
        let kind  = lexer.peek(0)?.kind;
        let value = match kind {
          TokenKind::Identifier => {
            let token = lexer.next_token()?;
            Value::Label(DefaultAtom::from(token.text.as_str()), token.position)
          }
          _ => Value::Number(signed(lexer, 16)? as u16)
        };
        Operands::Short(self.resolve_value(machine, value, PatchField::Short))
      }

      Form::NoArgs => Operands::NoArgs,

    };
    expect(lexer, ";")?;

    machine.emit(encode_instruction(opcode, &operands));
    Ok(())
  }

  // endregion

  // region Operands

  /// `reg:N`, `stack:N`, `[reg:N]` or `[stack:N]`. Returns the register and its 2-bit mode.
  fn register(lexer: &mut Lexer) -> Result<(u8, u8), AssemblyError> {
    let bracketed = accept(lexer, "[")?;

    let keyword = lexer.next_token()?;
    let invalid = AssemblyError::InvalidRegister { position: keyword.position };
    let base = match (keyword.kind, keyword.text.as_str()) {
      (TokenKind::Identifier, "reg")   => 0,
      (TokenKind::Identifier, "stack") => 2,
      _ => return Err(invalid)
    };

    expect(lexer, ":")?;
    let number = lexer.next_token()?;
    let register = match (number.kind, number.text.parse::<u8>()) {
      (TokenKind::Integer, Ok(n)) if n < 64 => n,
      _ => return Err(AssemblyError::InvalidRegister { position: number.position })
    };

    if bracketed {
      expect(lexer, "]")?;
    }
    Ok((register, base | bracketed as u8))
  }

  /// `['['] KW ('+' KW)*`. Returns the 3-bit mode and whether a bracket was opened.
  fn mode(lexer: &mut Lexer) -> Result<(u8, bool), AssemblyError> {
    let bracketed = accept(lexer, "[")?;
    let mut mode = bracketed as u8;

    loop {
      let keyword = lexer.next_token()?;
      mode |= match (keyword.kind, keyword.text.as_str()) {
        (TokenKind::Identifier, "code")  => CODE_SEGMENT,
        (TokenKind::Identifier, "stack") => 2,
        (TokenKind::Identifier, "reg")   => 0,
        _ => {
          return Err(AssemblyError::InvalidMode {
            position : keyword.position,
            found    : keyword.to_string()
          });
        }
      };
      if !accept(lexer, "+")? {
        break;
      }
    }
    Ok((mode, bracketed))
  }

  /// An address below `VM_SIZE`, or a label.
  fn location(lexer: &mut Lexer) -> Result<Value, AssemblyError> {
    let token = lexer.next_token()?;
    match token.kind {

      TokenKind::Identifier => {
        Ok(Value::Label(DefaultAtom::from(token.text.as_str()), token.position))
      }

      TokenKind::Integer => {
        match token.text.parse::<usize>() {
          Ok(address) if address < VM_SIZE => Ok(Value::Number(address as u16)),
          _ => Err(out_of_range(&token, 13))
        }
      }

      _ => Err(unexpected("an address or label", &token))

    }
  }

  // endregion

}


#[cfg(test)]
mod tests {
  use super::*;
  use crate::bytecode::Instruction;
  use crate::machine::Handler;

  const DECLARATIONS: &str = "
    mnem nop(0) noargs;
    mnem push(1) short;
    mnem add(2) regs;
    mnem say(3) chars;
    mnem inc(4) xaddr;
    mnem shl(5) scalar;
    mnem jmp(6) short;
  ";

  fn setup() -> (Machine, Assembler) {
    let mut machine = Machine::new();
    machine.reset();
    let mut assembler = Assembler::new();
    assembler.assemble(&mut machine, DECLARATIONS).unwrap();
    (machine, assembler)
  }

  fn word(machine: &Machine, address: usize) -> Instruction {
    decode_instruction(machine.code()[address] as Word)
  }

  fn error(source: &str) -> AssemblyError {
    let (mut machine, mut assembler) = setup();
    assembler.assemble(&mut machine, source).unwrap_err()
  }

  #[test]
  fn declarations_do_not_emit() {
    let (machine, assembler) = setup();
    assert_eq!(machine.reg(Register::W), 0);
    assert_eq!(assembler.form_of("shl"), Some(Form::Scalar));
    assert_eq!(assembler.opcode_of("jmp"), Some(6));
    assert_eq!(assembler.mnemonics().len(), 7);
    assert_eq!(machine.opcode_count(), 0);
  }

  #[test]
  fn auto_assigned_opcodes_follow_the_table() {
    let mut machine = Machine::new();
    machine.reset();
    for _ in 0..3 {
      machine.register_handler(Handler::native(|_: &mut Machine, _: Instruction| Ok(()))).unwrap();
    }
    let mut assembler = Assembler::new();
    assembler.assemble(&mut machine, "mnem first() noargs; mnem second() short;").unwrap();
    assert_eq!(assembler.opcode_of("first"), Some(3));
    assert_eq!(assembler.opcode_of("second"), Some(4));

    // Once the declared opcodes have handlers, numbering continues from the table.
    for _ in 0..2 {
      machine.register_handler(Handler::native(|_: &mut Machine, _: Instruction| Ok(()))).unwrap();
    }
    assembler.assemble(&mut machine, "mnem third() noargs;").unwrap();
    assert_eq!(assembler.opcode_of("third"), Some(5));
    assembler.assemble(&mut machine, "mnem fourth() noargs;").unwrap();
    assert_eq!(assembler.opcode_of("fourth"), Some(6));
  }

  #[test]
  fn each_statement_emits_one_word() {
    let (mut machine, mut assembler) = setup();
    assembler.assemble(&mut machine, "
      nop;
      push 513;
      add reg:5, [stack:2];
      say 'Hi';
      inc [stack+code:7];
      shl [reg:3], 9;
    ").unwrap();
    assert_eq!(machine.reg(Register::W), 6);

    assert_eq!(word(&machine, 0), Instruction::new(0, 0));
    assert_eq!(word(&machine, 1).short(), 513);
    assert_eq!(
      word(&machine, 2).register_pair(),
      RegisterPair { src: 5, src_mode: 0, dst: 2, dst_mode: 3 }
    );
    assert_eq!(word(&machine, 3).chars(), (b'H', b'i'));
    assert_eq!(word(&machine, 4).extended(), ExtendedAddress { mode: 7, location: 7 });
    assert_eq!(word(&machine, 5).scalar(), Scalar { mode: 1, location: 3, length: 9 });
    assert_eq!(word(&machine, 5).opcode, 5);
  }

  #[test]
  fn negative_short_is_twos_complement() {
    let (mut machine, mut assembler) = setup();
    assembler.assemble(&mut machine, "push -1; push 65535; push -32768;").unwrap();
    assert_eq!(word(&machine, 0).short(), 0xFFFF);
    assert_eq!(word(&machine, 1).short(), 0xFFFF);
    assert_eq!(word(&machine, 2).short(), 0x8000);
  }

  #[test]
  fn backward_and_forward_labels() {
    let (mut machine, mut assembler) = setup();
    assembler.assemble(&mut machine, "
      top: nop;
      jmp end;
      inc [code:end];
      jmp end;
      jmp top;
      end: nop;
    ").unwrap();
    assert_eq!(assembler.label("top"), Some(0));
    assert_eq!(assembler.label("end"), Some(5));
    assert_eq!(word(&machine, 1).short(), 5);
    assert_eq!(word(&machine, 2).extended(), ExtendedAddress { mode: 5, location: 5 });
    assert_eq!(word(&machine, 3).short(), 5);
    assert_eq!(word(&machine, 4).short(), 0);
    assert!(assembler.patches.is_empty());
  }

  #[test]
  fn labels_are_forgotten_between_runs() {
    let (mut machine, mut assembler) = setup();
    assembler.assemble(&mut machine, "here: nop;").unwrap();
    assert_eq!(assembler.label("here"), Some(0));
    assembler.assemble(&mut machine, "here: nop;").unwrap();
    assert_eq!(assembler.label("here"), Some(1));
  }

  #[test]
  fn data_statements() {
    let (mut machine, mut assembler) = setup();
    assembler.assemble(&mut machine, "
      dw 7;
      dw -2;
      dw 72, 101, 108, 108;
      dw 'Hell';
      ds \"Hello\";
    ").unwrap();
    assert_eq!(machine.code()[0], 7);
    assert_eq!(machine.code()[1], -2);
    assert_eq!(machine.code()[2], 0x48656C6C);
    assert_eq!(machine.code()[3], 0x48656C6C);
    assert_eq!(machine.code()[4], 0x48656C6C);
    assert_eq!(machine.code()[5], 0x6F000000);
    assert_eq!(machine.reg(Register::W), 6);
  }

  #[test]
  fn disassembly() {
    let (mut machine, mut assembler) = setup();
    assembler.assemble(&mut machine, "push 3; add reg:5, [stack:2]; nop;").unwrap();
    assert_eq!(assembler.disassemble(machine.code()[0] as Word), "push 3;");
    assert_eq!(assembler.disassemble(machine.code()[1] as Word), "add reg:5, [stack:2];");
    assert_eq!(assembler.disassemble(machine.code()[2] as Word), "nop;");
  }

  #[test]
  fn unknown_mnemonic_position() {
    match error("nop;\n  frob;") {
      AssemblyError::UnknownMnemonic { position, name } => {
        assert_eq!(name, "frob");
        assert_eq!((position.line, position.column), (2, 3));
      }
      other => panic!("unexpected error {:?}", other)
    }
  }

  #[test]
  fn errors_report_their_position() {
    let column = |source: &str| {
      let position = error(source).position();
      (position.line, position.column)
    };
    assert_eq!(column("nop; $"), (1, 6));
    assert_eq!(column("push 70000;"), (1, 6));
    assert_eq!(column("nop;\njmp nowhere;"), (2, 5));
  }

  #[test]
  fn character_literal_length() {
    match error("say 'abc';") {
      AssemblyError::CharacterLiteralLength { position, expected: 2, length: 3 } => {
        assert_eq!(position.column, 5);
      }
      other => panic!("unexpected error {:?}", other)
    }
  }

  #[test]
  fn register_syntax() {
    assert!(matches!(error("add reg:64, reg:1;"), AssemblyError::InvalidRegister { .. }));
    assert!(matches!(error("add code:1, reg:1;"), AssemblyError::InvalidRegister { .. }));
    assert!(matches!(error("add [reg:1, reg:1;"), AssemblyError::Unexpected { .. }));
  }

  #[test]
  fn mode_syntax() {
    match error("inc heap:3;") {
      AssemblyError::InvalidMode { position, found } => {
        assert_eq!(found, "heap");
        assert_eq!(position.column, 5);
      }
      other => panic!("unexpected error {:?}", other)
    }
    assert!(matches!(error("inc reg:8192;"), AssemblyError::OutOfRange { bits: 13, .. }));
    assert!(matches!(error("shl reg:1, 128;"), AssemblyError::OutOfRange { bits: 7, .. }));
    assert!(matches!(error("push 65536;"), AssemblyError::OutOfRange { bits: 16, .. }));
  }

  #[test]
  fn undefined_label_reports_first_reference() {
    match error("jmp later;\njmp nowhere;\njmp later;") {
      AssemblyError::UndefinedLabel { position, name } => {
        assert_eq!(name, "later");
        assert_eq!(position.line, 1);
      }
      other => panic!("unexpected error {:?}", other)
    }
  }

  #[test]
  fn duplicate_label() {
    assert!(matches!(error("a: nop; a: nop;"), AssemblyError::DuplicateLabel { .. }));
  }

  #[test]
  fn malformed_declarations() {
    assert!(matches!(error("mnem bad(1) wide;"), AssemblyError::UnknownForm { .. }));
    assert!(matches!(error("mnem bad(70000) noargs;"), AssemblyError::OutOfRange { .. }));
    assert!(matches!(error("mnem bad(1 noargs;"), AssemblyError::Unexpected { .. }));
    assert!(matches!(error("; nop;"), AssemblyError::Unexpected { .. }));
  }

  #[test]
  fn comments_keep_line_numbers() {
    let text = strip_comments("# header\nnop; # trailing\n  frob;");
    assert_eq!(text, "\nnop; \n  frob;");
    match error(&text) {
      AssemblyError::UnknownMnemonic { position, .. } => assert_eq!(position.line, 3),
      other => panic!("unexpected error {:?}", other)
    }
  }

  #[test]
  fn hash_inside_literals_is_kept() {
    let text = strip_comments("say '#!'; # bang\nds \"C# text\"; # note\nsay \"'#\";");
    assert_eq!(text, "say '#!'; \nds \"C# text\"; \nsay \"'#\";");

    let (mut machine, mut assembler) = setup();
    assembler.assemble(&mut machine, &text).unwrap();
    assert_eq!(word(&machine, 0).chars(), (b'#', b'!'));
    assert_eq!(machine.code()[1], 0x43232074);
    assert_eq!(machine.code()[2], 0x65787400);
    assert_eq!(word(&machine, 3).chars(), (b'\'', b'#'));
    assert_eq!(machine.reg(Register::W), 4);
  }

  #[test]
  fn lexical_errors_pass_through() {
    assert!(matches!(error("nop; $"), AssemblyError::Lex(_)));
  }
}
