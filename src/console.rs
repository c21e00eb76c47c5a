//! Output instructions. They write to a shared sink so that a host can capture what a program
//! prints instead of sending it to standard output.

use std::cell::RefCell;
use std::io::{self, Write};
use std::rc::Rc;

use crate::address::wrap;
use crate::bytecode::Instruction;
use crate::cell::Register;
use crate::error::MachineError;
use crate::machine::{Handler, Machine};

pub type Sink = Rc<RefCell<dyn Write>>;

pub fn stdout_sink() -> Sink {
  Rc::new(RefCell::new(io::stdout()))
}

/// `ouch2 'ab'`: writes both characters, low byte first.
pub fn ouch2(sink: Sink) -> Handler {
  Handler::native(move |machine: &mut Machine, instruction: Instruction| {
    let (first, second) = instruction.chars();
    {
      let mut out = sink.borrow_mut();
      out.write_all(&[first, second])?;
      out.flush()?;
    }
    machine.advance();
    Ok(())
  })
}

/// `print-a-d`: writes the operand's cell in decimal. Indirect modes print the cell pointed to.
pub fn print_decimal(sink: Sink) -> Handler {
  Handler::native(move |machine: &mut Machine, instruction: Instruction| {
    let operand = instruction.extended();
    let target  = machine.resolve(operand.location, operand.mode).map_err(MachineError::from)?;
    let value   = machine.read(target);
    {
      let mut out = sink.borrow_mut();
      write!(out, "{}", value)?;
      out.flush()?;
    }
    machine.advance();
    Ok(())
  })
}

/// Writes the stack from the top down to `SP`, one cell per line. Used by the command line
/// front end after a run.
pub fn write_stack<W: Write>(machine: &Machine, out: &mut W) -> Result<(), MachineError> {
  let sp = wrap(machine.reg(Register::SP) as i64);
  let top = machine.cells().len() - 1;
  for address in (sp + 1..=top).rev() {
    writeln!(out, "{:>6}: {}", address, machine.cells()[address])?;
  }
  Ok(())
}


#[cfg(test)]
mod tests {
  use super::*;
  use crate::bytecode::{ExtendedAddress, Operands};

  fn capture() -> (Rc<RefCell<Vec<u8>>>, Sink) {
    let buffer = Rc::new(RefCell::new(Vec::new()));
    let sink: Sink = buffer.clone();
    (buffer, sink)
  }

  fn call(handler: &Handler, machine: &mut Machine, instruction: Instruction) {
    match handler {
      Handler::Native(function) => function(machine, instruction).unwrap(),
      _ => panic!("console handlers are native")
    }
  }

  #[test]
  fn ouch2_writes_low_byte_first() {
    let (buffer, sink) = capture();
    let handler = ouch2(sink);
    let mut machine = Machine::new();
    machine.reset();
    call(&handler, &mut machine, Instruction::with_operands(0, &Operands::Chars(b'H', b'i')));
    assert_eq!(&*buffer.borrow(), b"Hi");
    assert_eq!(machine.reg(Register::IP), 1);
  }

  #[test]
  fn print_decimal_follows_mode() {
    let (buffer, sink) = capture();
    let handler = print_decimal(sink);
    let mut machine = Machine::new();
    machine.reset();
    machine.set_reg(Register::A, -42);
    let address = ExtendedAddress{ mode: 0, location: Register::A.idx() as u16 };
    call(&handler, &mut machine, Instruction::with_operands(0, &Operands::Extended(address)));
    assert_eq!(String::from_utf8(buffer.borrow().clone()).unwrap(), "-42");
  }

  #[test]
  fn stack_listing() {
    let mut machine = Machine::new();
    machine.reset();
    machine.push(3);
    machine.push(4);
    let mut out = Vec::new();
    write_stack(&machine, &mut out).unwrap();
    assert_eq!(String::from_utf8(out).unwrap(), "  8191: 3\n  8190: 4\n");
  }
}
