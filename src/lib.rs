/*!
  A register/stack virtual machine with no built-in instruction set. Handlers are registered at
  startup, and a bootstrap program of `mnem` declarations, assembled by the machine's own
  assembler, tells the assembler which opcode and operand form each mnemonic has. Programs can
  add instructions of their own at run time with `lambda-l`.

  The usual way in is `bootstrap::bootstrap`, which returns a machine with the default
  instruction set and an assembler that knows it.
*/

#[macro_use] extern crate prettytable;
#[macro_use] extern crate lazy_static;

pub mod address;
pub mod assembler;
pub mod bootstrap;
pub mod bytecode;
pub mod cell;
pub mod console;
pub mod error;
pub mod image;
pub mod instructions;
pub mod lexer;
pub mod machine;
pub mod symboltable;
pub mod token;

pub use crate::assembler::Assembler;
pub use crate::bootstrap::{bootstrap, Bootstrap};
pub use crate::error::{AssemblyError, BootError, Fault, LexError, MachineError};
pub use crate::machine::{Handler, Machine};
