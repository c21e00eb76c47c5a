/*!

  The native operations of the default instruction set. Each is a plain function with the
  `NativeFn` signature; `bootstrap` registers them in opcode order.

  Handlers follow one discipline: every operand is resolved and every fallible check made
  before anything changes. Then `IP` advances past the instruction, and only then is the
  destination written. So a handler that faults leaves the machine as it was, and an
  instruction whose destination is `IP` itself wins over the advance.

  The meta instructions `step`, `halt`, `run` and `run-trace` do not advance `IP`. They are
  meant for immediate execution, where `IP` belongs to the program being driven.

*/

use crate::address::{wrap, Location, CODE_SEGMENT};
use crate::bytecode::Instruction;
use crate::cell::{Cell, Register};
use crate::error::{Fault, MachineError};
use crate::machine::Machine;

type HandlerResult = Result<(), MachineError>;

// region Helpers

fn extended_location(machine: &Machine, instruction: Instruction) -> Result<Location, Fault> {
  let operand = instruction.extended();
  machine.resolve(operand.location, operand.mode)
}

/// Applies `op(destination, source)` and stores the result in the destination.
fn binary_operation<F>(machine: &mut Machine, instruction: Instruction, op: F) -> HandlerResult
  where F: Fn(Cell, Cell) -> Result<Cell, Fault>
{
  let pair = instruction.register_pair();
  let src  = machine.resolve(pair.src as u16, pair.src_mode)?;
  let dst  = machine.resolve(pair.dst as u16, pair.dst_mode)?;

  let value = op(machine.read(dst), machine.read(src))?;
  machine.advance();
  machine.write(dst, value);
  Ok(())
}

/// Replaces the cell named by an extended address with `op` of its contents.
fn unary_operation<F>(machine: &mut Machine, instruction: Instruction, op: F) -> HandlerResult
  where F: Fn(Cell) -> Cell
{
  let target = extended_location(machine, instruction)?;
  let value  = op(machine.read(target));
  machine.advance();
  machine.write(target, value);
  Ok(())
}

/// Shifts the cell named by a scalar operand by the operand's length.
fn scalar_operation<F>(machine: &mut Machine, instruction: Instruction, op: F) -> HandlerResult
  where F: Fn(Cell, u32) -> Cell
{
  let scalar = instruction.scalar();
  let target = machine.resolve(scalar.location as u16, scalar.mode)?;
  let value  = op(machine.read(target), scalar.length as u32);
  machine.advance();
  machine.write(target, value);
  Ok(())
}

// endregion

// region Machine control

/// `reset`: zero memory, empty the stack, and point `IP` and `W` at the start of code memory.
/// Registered handlers survive.
pub fn reset(machine: &mut Machine, _: Instruction) -> HandlerResult {
  machine.reset();
  Ok(())
}

/// `step`: execute the instruction at `IP`. Stored in memory and reached by `IP`, it executes
/// itself again without advancing and never returns.
pub fn step(machine: &mut Machine, _: Instruction) -> HandlerResult {
  machine.step()
}

pub fn halt(machine: &mut Machine, _: Instruction) -> HandlerResult {
  machine.set_reg(Register::HALTED, 1);
  Ok(())
}

pub fn run(machine: &mut Machine, _: Instruction) -> HandlerResult {
  machine.set_reg(Register::HALTED, 0);
  machine.run()
}

pub fn run_trace(machine: &mut Machine, _: Instruction) -> HandlerResult {
  machine.set_reg(Register::HALTED, 0);
  machine.run_trace()
}

/// `setw-l n`: move the write cursor.
pub fn set_write_literal(machine: &mut Machine, instruction: Instruction) -> HandlerResult {
  machine.advance();
  machine.set_reg(Register::W, instruction.short() as Cell);
  Ok(())
}

/// `lambda-l n`: the `n` words after this instruction become a new instruction, and execution
/// skips over them.
pub fn lambda_literal(machine: &mut Machine, instruction: Instruction) -> HandlerResult {
  let start  = wrap(machine.reg(Register::IP) as i64 + 1);
  let length = instruction.short() as usize;
  machine.register_compound(start, length)?;
  machine.set_reg(Register::IP, wrap((start + length) as i64) as Cell);
  Ok(())
}

// endregion

// region Stack

pub fn push_literal(machine: &mut Machine, instruction: Instruction) -> HandlerResult {
  machine.advance();
  machine.push(instruction.short() as Cell);
  Ok(())
}

pub fn push_address(machine: &mut Machine, instruction: Instruction) -> HandlerResult {
  let value = machine.cells()[wrap(instruction.short() as i64)];
  machine.advance();
  machine.push(value);
  Ok(())
}

pub fn pop_address(machine: &mut Machine, instruction: Instruction) -> HandlerResult {
  let value = machine.pop();
  machine.advance();
  machine.write(Location::Cells(wrap(instruction.short() as i64)), value);
  Ok(())
}

// endregion

// region Arithmetic and logic

pub fn add_registers(machine: &mut Machine, instruction: Instruction) -> HandlerResult {
  binary_operation(machine, instruction, |d, s| Ok(d.wrapping_add(s)))
}

pub fn subtract_registers(machine: &mut Machine, instruction: Instruction) -> HandlerResult {
  binary_operation(machine, instruction, |d, s| Ok(d.wrapping_sub(s)))
}

pub fn multiply_registers(machine: &mut Machine, instruction: Instruction) -> HandlerResult {
  binary_operation(machine, instruction, |d, s| Ok(d.wrapping_mul(s)))
}

pub fn divide_registers(machine: &mut Machine, instruction: Instruction) -> HandlerResult {
  binary_operation(machine, instruction, |d, s| {
    match s {
      0 => Err(Fault::DivisionByZero),
      _ => Ok(d.wrapping_div(s))
    }
  })
}

pub fn and_registers(machine: &mut Machine, instruction: Instruction) -> HandlerResult {
  binary_operation(machine, instruction, |d, s| Ok(d & s))
}

pub fn or_registers(machine: &mut Machine, instruction: Instruction) -> HandlerResult {
  binary_operation(machine, instruction, |d, s| Ok(d | s))
}

pub fn shift_left_registers(machine: &mut Machine, instruction: Instruction) -> HandlerResult {
  binary_operation(machine, instruction, |d, s| Ok(d.wrapping_shl(s as u32)))
}

/// Arithmetic shift.
pub fn shift_right_registers(machine: &mut Machine, instruction: Instruction) -> HandlerResult {
  binary_operation(machine, instruction, |d, s| Ok(d.wrapping_shr(s as u32)))
}

pub fn shift_left_scalar(machine: &mut Machine, instruction: Instruction) -> HandlerResult {
  scalar_operation(machine, instruction, |v, n| v.wrapping_shl(n))
}

pub fn shift_right_scalar(machine: &mut Machine, instruction: Instruction) -> HandlerResult {
  scalar_operation(machine, instruction, |v, n| v.wrapping_shr(n))
}

pub fn increment_address(machine: &mut Machine, instruction: Instruction) -> HandlerResult {
  unary_operation(machine, instruction, |v| v.wrapping_add(1))
}

pub fn decrement_address(machine: &mut Machine, instruction: Instruction) -> HandlerResult {
  unary_operation(machine, instruction, |v| v.wrapping_sub(1))
}

/// `cmp-r`: sets `ZF` to 1 when source and destination are equal, 0 otherwise.
pub fn compare_registers(machine: &mut Machine, instruction: Instruction) -> HandlerResult {
  let pair = instruction.register_pair();
  let src  = machine.resolve(pair.src as u16, pair.src_mode)?;
  let dst  = machine.resolve(pair.dst as u16, pair.dst_mode)?;

  let equal = machine.read(src) == machine.read(dst);
  machine.advance();
  machine.set_reg(Register::ZF, equal as Cell);
  Ok(())
}

// endregion

// region Control flow

pub fn jump_literal(machine: &mut Machine, instruction: Instruction) -> HandlerResult {
  machine.set_reg(Register::IP, instruction.short() as Cell);
  Ok(())
}

/// `j-e n`: jump when `ZF` is set. `ZF` is cleared either way.
pub fn jump_equal(machine: &mut Machine, instruction: Instruction) -> HandlerResult {
  match machine.reg(Register::ZF) == 1 {
    true  => machine.set_reg(Register::IP, instruction.short() as Cell),
    false => machine.advance()
  }
  machine.set_reg(Register::ZF, 0);
  Ok(())
}

/// `j-x [code:n]`: jump to `n`, selecting the segment to fetch from with the mode's code bit.
pub fn jump_extended(machine: &mut Machine, instruction: Instruction) -> HandlerResult {
  let operand = instruction.extended();
  let segment = match operand.mode & CODE_SEGMENT != 0 {
    true  => 1,
    false => 0
  };
  machine.set_reg(Register::X, segment);
  machine.set_reg(Register::IP, operand.location as Cell);
  Ok(())
}

pub fn call_literal(machine: &mut Machine, instruction: Instruction) -> HandlerResult {
  machine.call(instruction.short() as Cell);
  Ok(())
}

/// `call-x`: call the address stored in the cell the operand names.
pub fn call_address(machine: &mut Machine, instruction: Instruction) -> HandlerResult {
  let target = extended_location(machine, instruction)?;
  let target = machine.read(target);
  machine.call(target);
  Ok(())
}

pub fn return_literal(machine: &mut Machine, instruction: Instruction) -> HandlerResult {
  machine.ret(Some(instruction.short() as Cell));
  Ok(())
}

pub fn return_address(machine: &mut Machine, instruction: Instruction) -> HandlerResult {
  let value = extended_location(machine, instruction)?;
  let value = machine.read(value);
  machine.ret(Some(value));
  Ok(())
}

pub fn return_nothing(machine: &mut Machine, _: Instruction) -> HandlerResult {
  machine.ret(None);
  Ok(())
}

// endregion
