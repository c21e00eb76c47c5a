/*!
  Brings up a machine with the default instruction set. Handlers are registered in order, and
  each registration contributes one `mnem` declaration, built from the opcode the machine
  actually assigned, to a preamble that is then assembled. The opcode table and the mnemonic
  table therefore cannot disagree.
*/

use crate::assembler::Assembler;
use crate::bytecode::{Form, Instruction};
use crate::console::{self, Sink};
use crate::error::{BootError, MachineError};
use crate::instructions::*;
use crate::machine::{Handler, Machine};

pub struct Bootstrap {
  machine  : Machine,
  preamble : String,
}

impl Bootstrap {

  /// Registers the default instruction set on a new machine. Console output goes to `sink`.
  pub fn new(sink: Sink) -> Result<Bootstrap, MachineError> {
    let mut bootstrap = Bootstrap {
      machine  : Machine::new(),
      preamble : String::new(),
    };

    bootstrap.native("reset",     Form::NoArgs,    reset)?;
    bootstrap.native("push-l",    Form::Short,     push_literal)?;
    bootstrap.native("push-a",    Form::Short,     push_address)?;
    bootstrap.native("pop-a",     Form::Short,     pop_address)?;
    bootstrap.register("ouch2",   Form::Chars,     console::ouch2(sink.clone()))?;
    bootstrap.native("add-r",     Form::Registers, add_registers)?;
    bootstrap.native("sub-r",     Form::Registers, subtract_registers)?;
    bootstrap.native("mul-r",     Form::Registers, multiply_registers)?;
    bootstrap.native("cmp-r",     Form::Registers, compare_registers)?;
    bootstrap.native("j-e",       Form::Short,     jump_equal)?;
    bootstrap.native("step",      Form::NoArgs,    step)?;
    bootstrap.native("halt",      Form::NoArgs,    halt)?;
    bootstrap.native("run",       Form::NoArgs,    run)?;
    bootstrap.native("run-trace", Form::NoArgs,    run_trace)?;
    bootstrap.native("jmp-l",     Form::Short,     jump_literal)?;
    bootstrap.native("setw-l",    Form::Short,     set_write_literal)?;
    bootstrap.native("call-l",    Form::Short,     call_literal)?;
    bootstrap.native("call-x",    Form::Extended,  call_address)?;
    bootstrap.native("return-l",  Form::Short,     return_literal)?;
    bootstrap.native("return-x",  Form::Extended,  return_address)?;
    bootstrap.native("inc-x",     Form::Extended,  increment_address)?;
    bootstrap.native("dec-x",     Form::Extended,  decrement_address)?;
    bootstrap.native("div-r",     Form::Registers, divide_registers)?;
    bootstrap.register("print-a-d", Form::Extended, console::print_decimal(sink))?;
    bootstrap.native("lambda-l",  Form::Short,     lambda_literal)?;
    bootstrap.native("and-r",     Form::Registers, and_registers)?;
    bootstrap.native("or-r",      Form::Registers, or_registers)?;
    bootstrap.native("return",    Form::NoArgs,    return_nothing)?;
    bootstrap.native("j-x",       Form::Extended,  jump_extended)?;
    bootstrap.native("shl-r",     Form::Registers, shift_left_registers)?;
    bootstrap.native("shr-r",     Form::Registers, shift_right_registers)?;
    bootstrap.native("shl-s",     Form::Scalar,    shift_left_scalar)?;
    bootstrap.native("shr-s",     Form::Scalar,    shift_right_scalar)?;

    Ok(bootstrap)
  }

  fn native<F>(&mut self, name: &str, form: Form, function: F) -> Result<(), MachineError>
    where F: Fn(&mut Machine, Instruction) -> Result<(), MachineError> + 'static
  {
    self.register(name, form, Handler::native(function))
  }

  /// Registers any handler, capability modules included, and declares its mnemonic.
  pub fn register(&mut self, name: &str, form: Form, handler: Handler) -> Result<(), MachineError> {
    let opcode = self.machine.register_handler(handler)?;
    self.preamble.push_str(&format!("mnem {}({}) {};\n", name, opcode, form));
    Ok(())
  }

  /// The declarations generated so far, one per line.
  pub fn preamble(&self) -> &str {
    &self.preamble
  }

  /// Assembles the preamble on a fresh assembler and hands over both halves.
  pub fn finish(self) -> Result<(Machine, Assembler), BootError> {
    let Bootstrap { mut machine, preamble } = self;
    let mut assembler = Assembler::new();
    assembler.assemble(&mut machine, &preamble)?;
    Ok((machine, assembler))
  }

}

/// A machine with the default instruction set and an assembler that knows its mnemonics.
pub fn bootstrap(sink: Sink) -> Result<(Machine, Assembler), BootError> {
  Bootstrap::new(sink)?.finish()
}
