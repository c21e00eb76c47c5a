//! Structures and functions for the execution engine: two memory arrays, registers named over the
//! bottom of general memory, and an append-only table of instruction handlers.

use std::fmt::{Debug, Display, Formatter};
use std::rc::Rc;

use prettytable::{format as TableFormat, Table};
use strum::IntoEnumIterator;

use crate::address::*;
use crate::bytecode::{decode_instruction, Instruction, Opcode, Word};
use crate::cell::{Cell, Register};
use crate::error::{Fault, MachineError};

/// The signature every native handler has.
pub type NativeFn = dyn Fn(&mut Machine, Instruction) -> Result<(), MachineError>;

/// An entry of the opcode table.
#[derive(Clone)]
pub enum Handler {
  /// An operation implemented by the host.
  Native(Rc<NativeFn>),
  /// An instruction implemented by the code in `[start, start + length)`.
  Compound {
    start  : AddressNumberType,
    length : AddressNumberType
  },
}

impl Handler {
  pub fn native<F>(function: F) -> Handler
    where F: Fn(&mut Machine, Instruction) -> Result<(), MachineError> + 'static
  {
    Handler::Native(Rc::new(function))
  }
}

impl Debug for Handler {
  fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
    match self {
      Handler::Native(_) => write!(f, "Native"),
      Handler::Compound{start, length} => write!(f, "Compound[{}..{})", start, start + length)
    }
  }
}

pub struct Machine {
  // Memory Stores
  cells    : Vec<Cell>, // General memory. Registers live at the bottom, the stack at the top.
  code     : Vec<Cell>, // Code memory

  // Opcode table, indexed by opcode
  handlers : Vec<Handler>,
}

impl Machine {

  // region Display methods

  fn make_register_table(
      name      : &str,
      rows      : &[(String, Cell)],
      highlight : Option<usize>
    ) -> Table
  {
    let mut table = Table::new();

    table.set_format(*TABLE_DISPLAY_FORMAT);
    table.set_titles(row![ubr->name, ubl->"Contents"]);

    for (i, (label, value)) in rows.iter().enumerate() {
      match Some(i) == highlight {

        true  => {
          table.add_row(row![r->format!("* --> {} =", label), value.to_string()]);
        }

        false => {
          table.add_row(row![r->format!("{} =", label), value.to_string()]);
        }

      } // end match on highlight
    } // end for
    table
  }

  /// One line with the control registers, e.g. `IP=3 SP=8191 W=9 ZF=0 HALTED=0 X=1`.
  pub fn dump_registers(&self) -> String {
    Register::control()
      .iter()
      .map(|r| format!("{}={}", r, self.reg(*r)))
      .collect::<Vec<String>>()
      .join(" ")
  }

  // endregion

  // region Low-level utility methods

  /// A new machine has zeroed memory, `IP` at the last cell, and fetches from code memory. Use
  /// `reset` to get the conventional starting state.
  pub fn new() -> Machine {
    let mut machine = Machine {
      cells    : vec![0; VM_SIZE],
      code     : vec![0; VM_SIZE],
      handlers : Vec::new(),
    };
    machine.set_reg(Register::IP, (VM_SIZE - 1) as Cell);
    machine.set_reg(Register::X, 1);
    machine
  }

  pub fn reg(&self, register: Register) -> Cell {
    self.cells[register.idx()]
  }

  pub fn reg_mut(&mut self, register: Register) -> &mut Cell {
    &mut self.cells[register.idx()]
  }

  pub fn set_reg(&mut self, register: Register, value: Cell) {
    self.cells[register.idx()] = value;
  }

  pub fn is_halted(&self) -> bool {
    self.reg(Register::HALTED) != 0
  }

  pub fn cells(&self) -> &[Cell] {
    &self.cells
  }

  pub fn cells_mut(&mut self) -> &mut [Cell] {
    &mut self.cells
  }

  pub fn code(&self) -> &[Cell] {
    &self.code
  }

  pub fn code_mut(&mut self) -> &mut [Cell] {
    &mut self.code
  }

  /// Zeroes both memory arrays, registers included.
  pub fn clear(&mut self) {
    for cell in self.cells.iter_mut().chain(self.code.iter_mut()) {
      *cell = 0;
    }
  }

  /// Zeroes memory and sets up the conventional starting state: an empty stack at the top of
  /// general memory, execution and the write cursor at address 0 of code memory.
  pub fn reset(&mut self) {
    self.clear();
    self.set_reg(Register::SP, (VM_SIZE - 1) as Cell);
    self.set_reg(Register::IP, 0);
    self.set_reg(Register::W, 0);
    self.set_reg(Register::X, 1);
    self.set_reg(Register::ZF, 0);
  }

  /**
    Resolves an operand to the cell it names according to the addressing mode table:

    | mode     | cell                 |
    |----------|----------------------|
    | 0        | `cells[loc]`         |
    | 1        | `cells[cells[loc]]`  |
    | 2        | `cells[SP+loc]`      |
    | 3        | `cells[cells[SP+loc]]` |
    | 4 + m    | as `m`, but the final access is into `code` |

    Pointers are always read from general memory. Every index wraps.
  */
  pub fn resolve(&self, location: u16, mode: u8) -> Result<Location, Fault> {
    let (base, code) = Mode::split(mode).ok_or(Fault::InvalidMode(mode))?;
    let location     = location as i64;
    let sp           = self.reg(Register::SP) as i64;

    let index = match base {
      Mode::RegisterValue   => location,
      Mode::RegisterAddress => self.cells[wrap(location)] as i64,
      Mode::StackValue      => sp + location,
      Mode::StackAddress    => self.cells[wrap(sp + location)] as i64,
    };
    Ok(Location::new(code, index))
  }

  /// A readable and writable reference to the cell named by `location` and `mode`.
  pub fn lookup(&mut self, location: u16, mode: u8) -> Result<&mut Cell, Fault> {
    let resolved = self.resolve(location, mode)?;
    Ok(self.cell_mut(resolved))
  }

  pub fn read(&self, location: Location) -> Cell {
    match location.is_code() {
      true  => self.code[location.idx()],
      false => self.cells[location.idx()]
    }
  }

  pub fn write(&mut self, location: Location, value: Cell) {
    *self.cell_mut(location) = value;
  }

  fn cell_mut(&mut self, location: Location) -> &mut Cell {
    let index = location.idx();
    match location.is_code() {
      true  => &mut self.code[index],
      false => &mut self.cells[index]
    }
  }

  /// Moves `IP` to the next instruction.
  pub fn advance(&mut self) {
    let next = wrap(self.reg(Register::IP) as i64 + 1);
    self.set_reg(Register::IP, next as Cell);
  }

  /// Stores `value` at `SP`, then moves `SP` down.
  pub fn push(&mut self, value: Cell) {
    let sp = wrap(self.reg(Register::SP) as i64);
    self.cells[sp] = value;
    self.set_reg(Register::SP, wrap(sp as i64 - 1) as Cell);
  }

  /// Moves `SP` up, then returns the value there.
  pub fn pop(&mut self) -> Cell {
    let sp = wrap(self.reg(Register::SP) as i64 + 1);
    self.set_reg(Register::SP, sp as Cell);
    self.cells[sp]
  }

  /// Stores an instruction word at `code[W]` and advances `W`.
  pub fn emit(&mut self, word: Word) {
    let w = wrap(self.reg(Register::W) as i64);
    self.code[w] = word as Cell;
    self.set_reg(Register::W, wrap(w as i64 + 1) as Cell);
  }

  // endregion

  // region Opcode table

  pub fn opcode_count(&self) -> usize {
    self.handlers.len()
  }

  pub fn is_op(&self, opcode: Opcode) -> bool {
    (opcode as usize) < self.handlers.len()
  }

  pub fn handler(&self, opcode: Opcode) -> Option<&Handler> {
    self.handlers.get(opcode as usize)
  }

  /**
    Augments the machine with a new instruction. The new opcode is the length of the table before
    the append. This is the only way opcodes are assigned, so handlers must be registered in the
    same order their mnemonics are declared.
  */
  pub fn register_handler(&mut self, handler: Handler) -> Result<Opcode, MachineError> {
    let opcode = self.handlers.len();
    if opcode > Opcode::MAX as usize {
      return Err(Fault::OpcodeTableFull.into());
    }
    #[cfg(feature = "trace_computation")] println!("register_handler({}) = {:?}", opcode, handler);
    self.handlers.push(handler);
    Ok(opcode as Opcode)
  }

  /// Registers the code in `[start, start + length)` as a new instruction.
  pub fn register_compound(&mut self, start: AddressNumberType, length: AddressNumberType)
    -> Result<Opcode, MachineError>
  {
    self.register_handler(Handler::Compound{ start, length })
  }

  // endregion

  // region Execution

  fn fetch(&self) -> Instruction {
    let ip = wrap(self.reg(Register::IP) as i64);
    let word = match self.reg(Register::X) != 0 {
      true  => self.code[ip],
      false => self.cells[ip]
    };
    decode_instruction(word as Word)
  }

  /**
    Executes an instruction immediately, whether or not it is stored anywhere. Faults are
    attributed to the current `IP`. A handler that faults leaves `IP` at the faulting instruction
    and does not write its destination.
  */
  pub fn execute(&mut self, instruction: Instruction) -> Result<(), MachineError> {
    let address = wrap(self.reg(Register::IP) as i64);
    let opcode  = instruction.opcode;

    let handler = match self.handler(opcode).cloned() {
      Some(handler) => handler,
      None => {
        return Err(MachineError::Fault{ address, opcode, fault: Fault::UnregisteredOpcode });
      }
    };

    #[cfg(feature = "trace_computation")] println!("{}: {} {:?}", address, instruction, handler);

    let result = match handler {
      Handler::Native(function)       => function(self, instruction),
      Handler::Compound{start, length} => self.invoke_compound(start, length)
    };
    result.map_err(|e| e.at(address, opcode))
  }

  /// Fetches the instruction at `IP` from the segment `X` selects and executes it. Does nothing
  /// once the machine is halted.
  pub fn step(&mut self) -> Result<(), MachineError> {
    if self.is_halted() {
      return Ok(());
    }
    let instruction = self.fetch();
    self.execute(instruction)
  }

  /// Steps until the machine halts.
  pub fn run(&mut self) -> Result<(), MachineError> {
    while !self.is_halted() {
      self.step()?;
    }
    Ok(())
  }

  /// Like `run`, printing the machine state before every step.
  pub fn run_trace(&mut self) -> Result<(), MachineError> {
    while !self.is_halted() {
      println!("{}", self);
      self.step()?;
    }
    Ok(())
  }

  /**
    Runs a compound instruction. The return address is pushed, and the body executes from code
    memory for as long as `IP` stays inside it. A body that runs off its end behaves as if it
    ended in `return`, so a body must leave the stack as it found it.
  */
  fn invoke_compound(&mut self, start: AddressNumberType, length: AddressNumberType)
    -> Result<(), MachineError>
  {
    let return_address = self.reg(Register::IP).wrapping_add(1);
    self.push(return_address);

    let end = wrap((start + length) as i64);
    self.set_reg(Register::IP, start as Cell);

    // Membership is measured as an offset from `start`, so a body may cross the end of memory.
    loop {
      let ip     = self.reg(Register::IP) as i64;
      let offset = wrap(ip - start as i64);
      if self.is_halted() || offset >= length {
        break;
      }
      let instruction = decode_instruction(self.code[wrap(ip)] as Word);
      self.execute(instruction)?;
    }

    if !self.is_halted() && wrap(self.reg(Register::IP) as i64) == end {
      let return_address = self.pop();
      self.set_reg(Register::IP, return_address);
    }
    Ok(())
  }

  /// Reserves a return value slot, pushes the address of the next instruction, and jumps.
  pub fn call(&mut self, target: Cell) {
    let return_address = self.reg(Register::IP).wrapping_add(1);
    let sp = self.reg(Register::SP) as i64;
    self.set_reg(Register::SP, wrap(sp - 1) as Cell);
    self.push(return_address);
    self.set_reg(Register::IP, target);
  }

  /// Pops the return address into `IP`, first storing `value` in the slot `call` reserved.
  pub fn ret(&mut self, value: Option<Cell>) {
    if let Some(value) = value {
      let slot = wrap(self.reg(Register::SP) as i64 + 2);
      self.cells[slot] = value;
    }
    let return_address = self.pop();
    self.set_reg(Register::IP, return_address);
  }

  // endregion

}

impl Default for Machine {
  fn default() -> Machine {
    Machine::new()
  }
}


lazy_static! {
  static ref TABLE_DISPLAY_FORMAT: TableFormat::TableFormat =
    TableFormat::FormatBuilder::new()
      .column_separator('│')
      .borders(' ')
      .separator(
        TableFormat::LinePosition::Title,
        TableFormat::LineSeparator::new('─', '┼', ' ', ' ')
      )
      .separator(
        TableFormat::LinePosition::Bottom,
        TableFormat::LineSeparator::new('─', '┴', ' ', ' ')
      )
      .padding(1, 1)
      .build();
}

/// How many cells above `SP` the display shows.
const STACK_DISPLAY_DEPTH: usize = 8;

impl Display for Machine {
  fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
    let registers: Vec<(String, Cell)> =
      Register::iter()
        .map(|r| (r.to_string(), self.reg(r)))
        .collect();

    let sp = wrap(self.reg(Register::SP) as i64);
    let stack: Vec<(String, Cell)> =
      (1..=STACK_DISPLAY_DEPTH)
        .map(|i| wrap((sp + i) as i64))
        .map(|a| (format!("cells[{}]", a), self.cells[a]))
        .collect();

    let ip = wrap(self.reg(Register::IP) as i64);
    let code: Vec<(String, Cell)> =
      (0..STACK_DISPLAY_DEPTH)
        .map(|i| wrap((ip + i) as i64))
        .map(|a| (format!("code[{}]", a), self.code[a]))
        .collect();

    let r_table = Machine::make_register_table("Register", &registers, None);
    let s_table = Machine::make_register_table("Stack", &stack, None);
    let c_table = Machine::make_register_table("Code", &code, Some(0));

    let mut combined_table = table!([r_table, s_table, c_table]);

    combined_table.set_titles(row![ub->"Registers", ub->"Stack", ub->"Code"]);
    combined_table.set_format(*TABLE_DISPLAY_FORMAT);

    let state = match self.is_halted() {
      true  => "Halted.",
      false => "Running."
    };

    write!(f, "{}\t{} opcodes\n{}", state, self.handlers.len(), combined_table)
  }
}


#[cfg(test)]
mod tests {
  use super::*;
  use crate::bytecode::{encode_instruction, Operands};

  fn reset_machine() -> Machine {
    let mut machine = Machine::new();
    machine.reset();
    machine
  }

  #[test]
  fn construction_does_not_reset() {
    let machine = Machine::new();
    assert_eq!(machine.reg(Register::IP), (VM_SIZE - 1) as Cell);
    assert_eq!(machine.reg(Register::X), 1);
    assert_eq!(machine.reg(Register::SP), 0);
    assert_eq!(machine.opcode_count(), 0);
  }

  #[test]
  fn every_mode_reads_back_what_it_wrote() {
    let mut machine = reset_machine();
    machine.set_reg(Register::SP, 8000);
    // Pointers for the indirect modes.
    machine.set_reg(Register::A, 300);
    machine.cells_mut()[8003] = 400;

    let location = Register::A.idx() as u16;
    for mode in 0..=MAX_MODE {
      let loc = match Mode::split(mode) {
        Some((base, _)) if base.is_stack_relative() => 3,
        _ => location
      };
      let value = 1000 + mode as Cell;
      *machine.lookup(loc, mode).unwrap() = value;
      assert_eq!(*machine.lookup(loc, mode).unwrap(), value, "mode {}", mode);
      // The pointers themselves must survive the writes through them.
      machine.set_reg(Register::A, 300);
      machine.cells_mut()[8003] = 400;
    }

    assert_eq!(machine.code()[300], 1000 + (CODE_SEGMENT | 1) as Cell);
    assert_eq!(machine.cells()[400], 1003);
    assert_eq!(machine.code()[8003], 1000 + (CODE_SEGMENT | 2) as Cell);
  }

  #[test]
  fn invalid_mode() {
    let mut machine = reset_machine();
    assert_eq!(machine.lookup(0, 8).err(), Some(Fault::InvalidMode(8)));
  }

  #[test]
  fn addresses_wrap() {
    let mut machine = reset_machine();
    machine.set_reg(Register::SP, (VM_SIZE - 1) as Cell);
    *machine.lookup(3, 2).unwrap() = 42;
    assert_eq!(machine.cells()[2], 42);
    machine.set_reg(Register::B, -1);
    *machine.lookup(Register::B.idx() as u16, CODE_SEGMENT | 1).unwrap() = 9;
    assert_eq!(machine.code()[VM_SIZE - 1], 9);
  }

  #[test]
  fn registration_returns_table_length() {
    let mut machine = reset_machine();
    let noop = |m: &mut Machine, _: Instruction| -> Result<(), MachineError> {
      m.advance();
      Ok(())
    };
    assert_eq!(machine.register_handler(Handler::native(noop)).unwrap(), 0);
    assert_eq!(machine.register_handler(Handler::native(noop)).unwrap(), 1);
    assert_eq!(machine.register_compound(10, 2).unwrap(), 2);
    assert!(machine.is_op(2));
    assert!(!machine.is_op(3));
  }

  #[test]
  fn unregistered_opcode_is_fatal() {
    let mut machine = reset_machine();
    machine.emit(encode_instruction(7, &Operands::NoArgs));
    match machine.step() {
      Err(MachineError::Fault{ address: 0, opcode: 7, fault: Fault::UnregisteredOpcode }) => {}
      other => panic!("unexpected result {:?}", other)
    }
    assert_eq!(machine.reg(Register::IP), 0);
  }

  #[test]
  fn stack_discipline() {
    let mut machine = reset_machine();
    machine.push(5);
    machine.push(6);
    assert_eq!(machine.reg(Register::SP), (VM_SIZE - 3) as Cell);
    assert_eq!(machine.pop(), 6);
    assert_eq!(machine.pop(), 5);
    assert_eq!(machine.reg(Register::SP), (VM_SIZE - 1) as Cell);
  }

  #[test]
  fn call_and_return_protocol() {
    let mut machine = reset_machine();
    machine.set_reg(Register::IP, 10);
    machine.call(100);
    assert_eq!(machine.reg(Register::IP), 100);
    assert_eq!(machine.cells()[VM_SIZE - 2], 11);
    assert_eq!(machine.reg(Register::SP), (VM_SIZE - 3) as Cell);

    machine.ret(Some(77));
    assert_eq!(machine.reg(Register::IP), 11);
    // The return value is left where the next pop finds it.
    assert_eq!(machine.pop(), 77);
    assert_eq!(machine.reg(Register::SP), (VM_SIZE - 1) as Cell);
  }

  #[test]
  fn emit_advances_write_cursor() {
    let mut machine = reset_machine();
    machine.emit(0x0001_0002);
    machine.emit(0x0003_0004);
    assert_eq!(machine.reg(Register::W), 2);
    assert_eq!(machine.code()[1], 0x0003_0004);
  }

  #[test]
  fn register_dump() {
    let machine = reset_machine();
    assert_eq!(machine.dump_registers(), "IP=0 SP=8191 W=0 ZF=0 HALTED=0 X=1");
    assert!(machine.to_string().contains("HALTED"));
  }
}
