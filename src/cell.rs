//! The unit of memory and the names given to the reserved cells at the bottom of general memory.

use strum_macros::{Display as StrumDisplay, EnumIter, IntoStaticStr};
use num_enum::{IntoPrimitive, TryFromPrimitive};

use crate::address::AddressNumberType;

/// Both memory arrays hold signed 32 bit cells. Code cells hold instruction words bit for bit.
pub type Cell = i32;

/// Number of cells at the bottom of general memory reserved for registers.
pub const RESERVED_CELLS: usize = 29;

/**
  Registers live in general memory. Some of them have names. The discriminant of each variant is
  the index of its cell. There is no general-purpose `F` or `W`; `W` is the write cursor.
*/
#[derive(
StrumDisplay, IntoStaticStr, EnumIter, TryFromPrimitive, IntoPrimitive,
Clone,        Copy,          Eq, PartialEq, Debug, Hash
)]
#[repr(u8)]
pub enum Register {
  /// Instruction pointer
  IP     = 0,
  /// Stack pointer. The stack grows down from the top of general memory.
  SP     = 1,
  /// Write cursor: the next free address in code memory.
  W      = 2,
  /// Zero flag
  ZF     = 3,
  HALTED = 4,

  // General purpose registers
  A = 5,
  B = 6,
  C = 7,
  D = 8,
  E = 9,
  G = 10,
  H = 11,
  I = 12,
  J = 13,
  K = 14,
  L = 15,
  M = 16,
  N = 17,
  O = 18,
  P = 19,
  Q = 20,
  R = 21,
  S = 22,
  T = 23,
  U = 24,
  V = 25,

  /// Segment selector: 1 fetches instructions from code memory, 0 from general memory.
  X = 26,
  Y = 27,
  Z = 28,
}

impl Register {
  pub fn idx(&self) -> AddressNumberType {
    Into::<u8>::into(*self) as AddressNumberType
  }

  /// The registers shown by the one-line register dump.
  pub fn control() -> [Register; 6] {
    [Register::IP, Register::SP, Register::W, Register::ZF, Register::HALTED, Register::X]
  }
}


#[cfg(test)]
mod tests {
  use super::*;
  use std::convert::TryFrom;
  use strum::IntoEnumIterator;

  #[test]
  fn registers_fill_reserved_cells() {
    let indices: Vec<usize> = Register::iter().map(|r| r.idx()).collect();
    assert_eq!(indices.len(), RESERVED_CELLS);
    assert_eq!(indices, (0..RESERVED_CELLS).collect::<Vec<usize>>());
  }

  #[test]
  fn names() {
    assert_eq!(Register::HALTED.to_string(), "HALTED");
    assert_eq!(Register::try_from(10u8).unwrap(), Register::G);
    assert_eq!(Register::V.idx(), 25);
  }
}
