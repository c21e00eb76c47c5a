use std::fmt::{Display, Formatter};

use strum_macros::{Display as StrumDisplay, EnumString, IntoStaticStr};

use crate::address::render_operand;

/// Index into the machine's handler table.
pub type Opcode = u16;

/**
  The operand forms an opcode may declare. The form is metadata about the opcode kept by the
  assembler (and known implicitly by each handler); it is never stored in the instruction word.
  The `strum` serializations are the keywords used by `mnem` declarations.
*/
#[derive(
StrumDisplay, EnumString, IntoStaticStr,
Clone,        Copy,       Eq, PartialEq, Debug, Hash
)]
pub enum Form {
  #[strum(serialize = "regs")]
  Registers,
  #[strum(serialize = "chars")]
  Chars,
  #[strum(serialize = "xaddr")]
  Extended,
  #[strum(serialize = "scalar")]
  Scalar,
  #[strum(serialize = "short")]
  Short,
  #[strum(serialize = "noargs")]
  NoArgs,
}

/// Two 6-bit slots, each with a 2-bit base addressing mode.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Default)]
pub struct RegisterPair {
  pub src      : u8,
  pub src_mode : u8,
  pub dst      : u8,
  pub dst_mode : u8,
}

/// A 3-bit mode and a 13-bit location. Can name any cell of either memory array.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Default)]
pub struct ExtendedAddress {
  pub mode     : u8,
  pub location : u16,
}

/// A 3-bit mode, a 6-bit location, and a 7-bit length.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Default)]
pub struct Scalar {
  pub mode     : u8,
  pub location : u8,
  pub length   : u8,
}

/// Holds the unencoded operands of an instruction, one variant per `Form`.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub enum Operands {
  /// [src:6][dst:6][src_mode:2][dst_mode:2]
  Registers(RegisterPair),
  /// [c0:8][c1:8]
  Chars(u8, u8),
  /// [mode:3][location:13]
  Extended(ExtendedAddress),
  /// [mode:3][location:6][length:7]
  Scalar(Scalar),
  /// [value:16]
  Short(u16),
  /// [Reserved:16]
  NoArgs,
}

impl Operands {
  pub fn form(&self) -> Form {
    match self {
      Operands::Registers(_) => Form::Registers,
      Operands::Chars(..)    => Form::Chars,
      Operands::Extended(_)  => Form::Extended,
      Operands::Scalar(_)    => Form::Scalar,
      Operands::Short(_)     => Form::Short,
      Operands::NoArgs       => Form::NoArgs,
    }
  }
}

impl Display for Operands {
  fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
    match self {

      Operands::Registers(pair) => {
        write!(
          f, "{}, {}",
          render_operand(pair.src_mode, pair.src),
          render_operand(pair.dst_mode, pair.dst)
        )
      }

      Operands::Chars(c0, c1) => {
        write!(f, "'{}{}'", *c0 as char, *c1 as char)
      }

      Operands::Extended(x) => {
        write!(f, "{}", render_operand(x.mode, x.location))
      }

      Operands::Scalar(s) => {
        write!(f, "{}, {}", render_operand(s.mode, s.location), s.length)
      }

      Operands::Short(v) => {
        write!(f, "{}", v)
      }

      Operands::NoArgs => Ok(())

    }
  }
}

/**
  A decoded instruction word: the opcode and the raw operand field. The field is only ever
  interpreted through the accessor matching the opcode's form.
*/
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub struct Instruction {
  pub opcode : Opcode,
  pub field  : u16,
}

impl Instruction {

  pub fn new(opcode: Opcode, field: u16) -> Instruction {
    Instruction{ opcode, field }
  }

  /// Builds the instruction for the given operands.
  pub fn with_operands(opcode: Opcode, operands: &Operands) -> Instruction {
    Instruction::new(opcode, super::binary::pack_operands(operands))
  }

  pub fn register_pair(&self) -> RegisterPair {
    RegisterPair {
      src      : ( self.field        & 0x3F) as u8,
      dst      : ((self.field >>  6) & 0x3F) as u8,
      src_mode : ((self.field >> 12) & 0x03) as u8,
      dst_mode : ((self.field >> 14) & 0x03) as u8,
    }
  }

  pub fn chars(&self) -> (u8, u8) {
    ((self.field & 0xFF) as u8, (self.field >> 8) as u8)
  }

  pub fn extended(&self) -> ExtendedAddress {
    ExtendedAddress {
      mode     : (self.field & 0x07) as u8,
      location : self.field >> 3,
    }
  }

  pub fn scalar(&self) -> Scalar {
    Scalar {
      mode     : ( self.field       & 0x07) as u8,
      location : ((self.field >> 3) & 0x3F) as u8,
      length   : ((self.field >> 9) & 0x7F) as u8,
    }
  }

  pub fn short(&self) -> u16 {
    self.field
  }

  /// Interprets the operand field according to `form`.
  pub fn operands(&self, form: Form) -> Operands {
    match form {
      Form::Registers => Operands::Registers(self.register_pair()),
      Form::Chars     => {
        let (c0, c1) = self.chars();
        Operands::Chars(c0, c1)
      }
      Form::Extended  => Operands::Extended(self.extended()),
      Form::Scalar    => Operands::Scalar(self.scalar()),
      Form::Short     => Operands::Short(self.short()),
      Form::NoArgs    => Operands::NoArgs,
    }
  }

  /// Returns a copy with the whole operand field replaced.
  pub fn with_field(&self, field: u16) -> Instruction {
    Instruction::new(self.opcode, field)
  }

  /// Returns a copy with the 13-bit extended-address location replaced, keeping the mode.
  pub fn with_location(&self, location: u16) -> Instruction {
    let mut address = self.extended();
    address.location = location;
    Instruction::with_operands(self.opcode, &Operands::Extended(address))
  }

}

impl Display for Instruction {
  fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
    write!(f, "({}) {:#06x}", self.opcode, self.field)
  }
}
