//! Error types for lexing, assembly, and execution. Every error is terminal for the operation
//! that raised it; callers decide whether to start over from a clean state.

use std::io;

use thiserror::Error;

use crate::address::AddressNumberType;
use crate::bytecode::Opcode;
use crate::token::Position;

/// Raised by the lexer.
#[derive(Debug, Error, Clone, Eq, PartialEq)]
pub enum LexError {
  #[error("{position} : Invalid token starting with '{found}'.")]
  InvalidCharacter { position: Position, found: char },

  #[error("{position} : Unterminated string.")]
  UnterminatedString { position: Position },
}

/// Raised by the assembler. Each variant carries the position of the offending token.
#[derive(Debug, Error, Clone, Eq, PartialEq)]
pub enum AssemblyError {
  #[error(transparent)]
  Lex(#[from] LexError),

  #[error("{position} : Expected {expected} but got '{found}'.")]
  Unexpected { position: Position, expected: String, found: String },

  #[error("{position} : Undefined instruction \"{name}\".")]
  UnknownMnemonic { position: Position, name: String },

  #[error("{position} : Expected form type name but got '{found}'.")]
  UnknownForm { position: Position, found: String },

  #[error("{position} : Invalid register specification.")]
  InvalidRegister { position: Position },

  #[error("{position} : Invalid addressing mode '{found}'.")]
  InvalidMode { position: Position, found: String },

  #[error("{position} : Character constant must be exactly {expected} characters, found {length}.")]
  CharacterLiteralLength { position: Position, expected: usize, length: usize },

  #[error("{position} : {value} does not fit in {bits} bits.")]
  OutOfRange { position: Position, value: String, bits: u32 },

  #[error("{position} : Label \"{name}\" is never defined.")]
  UndefinedLabel { position: Position, name: String },

  #[error("{position} : Label \"{name}\" is already defined.")]
  DuplicateLabel { position: Position, name: String },
}

impl AssemblyError {
  /// The position of the token that caused the error.
  pub fn position(&self) -> Position {
    match self {
      AssemblyError::Lex(LexError::InvalidCharacter { position, .. })
      | AssemblyError::Lex(LexError::UnterminatedString { position })
      | AssemblyError::Unexpected { position, .. }
      | AssemblyError::UnknownMnemonic { position, .. }
      | AssemblyError::UnknownForm { position, .. }
      | AssemblyError::InvalidRegister { position }
      | AssemblyError::InvalidMode { position, .. }
      | AssemblyError::CharacterLiteralLength { position, .. }
      | AssemblyError::OutOfRange { position, .. }
      | AssemblyError::UndefinedLabel { position, .. }
      | AssemblyError::DuplicateLabel { position, .. } => *position
    }
  }
}

/// The reason a handler refused to execute.
#[derive(Debug, Error, Clone, Copy, Eq, PartialEq)]
pub enum Fault {
  #[error("not a valid instruction.")]
  UnregisteredOpcode,

  #[error("Invalid addressing mode {0}.")]
  InvalidMode(u8),

  #[error("Division by zero.")]
  DivisionByZero,

  #[error("opcode table is full.")]
  OpcodeTableFull,
}

/// Raised by the execution engine and the image serializer.
#[derive(Debug, Error)]
pub enum MachineError {
  /// A fault located at the instruction that raised it.
  #[error("{address}: ({opcode}) {fault}")]
  Fault { address: AddressNumberType, opcode: Opcode, fault: Fault },

  /// A fault that has not yet been attributed to an instruction.
  #[error("{0}")]
  Raised(Fault),

  #[error("I/O error: {0}")]
  Io(#[from] io::Error),

  #[error("Malformed image: expected {expected} bytes but found {found}.")]
  MalformedImage { expected: usize, found: usize },
}

impl From<Fault> for MachineError {
  fn from(fault: Fault) -> MachineError {
    MachineError::Raised(fault)
  }
}

impl MachineError {

  /// Attributes an unlocated fault to the instruction at `address`. Errors that already carry a
  /// location, such as those raised inside a compound instruction, keep it.
  pub fn at(self, address: AddressNumberType, opcode: Opcode) -> MachineError {
    match self {
      MachineError::Raised(fault) => MachineError::Fault { address, opcode, fault },
      other => other
    }
  }

  /// The underlying fault, if this error is one.
  pub fn fault(&self) -> Option<Fault> {
    match self {
      MachineError::Fault { fault, .. } | MachineError::Raised(fault) => Some(*fault),
      _ => None
    }
  }

}

/// Raised while bringing up a machine or driving it from the command line.
#[derive(Debug, Error)]
pub enum BootError {
  #[error(transparent)]
  Assembly(#[from] AssemblyError),

  #[error(transparent)]
  Machine(#[from] MachineError),

  #[error("I/O error: {0}")]
  Io(#[from] io::Error),
}
