//! Addressing modes and an `Either` type naming a cell in one of the two memory arrays, with
//! some convenience functions.

use std::convert::TryFrom;
use std::fmt::{Display, Formatter};

use num_enum::{IntoPrimitive, TryFromPrimitive};

// `AddressNumberType` is `usize`, as it is naturally an index into a memory store.
pub type AddressNumberType = usize;

/// Number of cells in each of the two memory arrays.
pub const VM_SIZE: usize = 8 * 1024;

/// OR-ing this bit into any base mode redirects the final access into code memory.
pub const CODE_SEGMENT: u8 = 0b100;

/// Largest raw mode value, i.e. `StackAddress | CODE_SEGMENT`.
pub const MAX_MODE: u8 = 0b111;

/**
  The four base addressing modes. Only the low two bits of a raw mode select the base mode;
  the third bit is `CODE_SEGMENT`. Register-pair instructions have room for the base mode only.
*/
#[derive(TryFromPrimitive, IntoPrimitive, Clone, Copy, Eq, PartialEq, Debug, Hash)]
#[repr(u8)]
pub enum Mode {
  /// `cells[loc]`
  RegisterValue   = 0,
  /// `cells[cells[loc]]`
  RegisterAddress = 1,
  /// `cells[SP + loc]`
  StackValue      = 2,
  /// `cells[cells[SP + loc]]`
  StackAddress    = 3,
}

impl Mode {

  /// Splits a raw 3-bit mode into its base mode and whether it targets code memory. Returns
  /// `None` for values that do not fit in three bits.
  pub fn split(raw: u8) -> Option<(Mode, bool)> {
    if raw > MAX_MODE {
      return None;
    }
    let base = Mode::try_from(raw & 0b011).ok()?;
    Some((base, raw & CODE_SEGMENT != 0))
  }

  pub fn is_indirect(&self) -> bool {
    match self {
      Mode::RegisterAddress | Mode::StackAddress => true,
      _ => false
    }
  }

  pub fn is_stack_relative(&self) -> bool {
    match self {
      Mode::StackValue | Mode::StackAddress => true,
      _ => false
    }
  }

}

/// Reduces any signed value to an index into a memory array. Out of range addresses wrap.
pub fn wrap(value: i64) -> AddressNumberType {
  value.rem_euclid(VM_SIZE as i64) as AddressNumberType
}

/**
  Renders a raw mode and a location in the assembler's operand syntax, so that the output
  can be fed back into the assembler: `reg:3`, `[stack:1]`, `code+stack:2`, `[code:7]`.
  Invalid modes are rendered as `?N:loc`.
*/
pub fn render_operand<T: Display>(raw_mode: u8, location: T) -> String {
  match Mode::split(raw_mode) {

    Some((base, code)) => {
      let mut keywords: Vec<&str> = Vec::with_capacity(2);
      if code {
        keywords.push("code");
      }
      if base.is_stack_relative() {
        keywords.push("stack");
      }
      if keywords.is_empty() {
        keywords.push("reg");
      }
      let text = format!("{}:{}", keywords.join("+"), location);
      match base.is_indirect() {
        true  => format!("[{}]", text),
        false => text
      }
    }

    None => format!("?{}:{}", raw_mode, location)

  }
}

/// A resolved reference to a cell in either memory array.
#[derive(Copy, Clone, Ord, PartialOrd, Eq, PartialEq, Hash, Debug)]
pub enum Location {
  /// An index into general memory, the `cells` array.
  Cells(AddressNumberType),
  /// An index into code memory.
  Code(AddressNumberType)
}

impl Location {

  /// Builds a location in the requested array, wrapping the index.
  pub fn new(code: bool, index: i64) -> Location {
    match code {
      true  => Location::Code(wrap(index)),
      false => Location::Cells(wrap(index))
    }
  }

  /// Converts the location to an index into the corresponding array.
  pub fn idx(&self) -> AddressNumberType {
    match self {
      Location::Cells(i) | Location::Code(i) => *i
    }
  }

  pub fn is_code(&self) -> bool {
    match self {
      Location::Code(_) => true,
      _ => false
    }
  }

}

impl Display for Location {
  fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
    match self {
      Location::Cells(i) => {
        write!(f, "cells[{}]", i)
      },
      Location::Code(i) => {
        write!(f, "code[{}]", i)
      }
    }
  }
}


#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn split_modes() {
    assert_eq!(Mode::split(0), Some((Mode::RegisterValue, false)));
    assert_eq!(Mode::split(3), Some((Mode::StackAddress, false)));
    assert_eq!(Mode::split(CODE_SEGMENT | 1), Some((Mode::RegisterAddress, true)));
    assert_eq!(Mode::split(8), None);
  }

  #[test]
  fn wrapping() {
    assert_eq!(wrap(VM_SIZE as i64), 0);
    assert_eq!(wrap(-1), VM_SIZE - 1);
    assert_eq!(wrap(5), 5);
    assert_eq!(Location::new(true, -2), Location::Code(VM_SIZE - 2));
  }

  #[test]
  fn rendering() {
    assert_eq!(render_operand(0, 3), "reg:3");
    assert_eq!(render_operand(1, 3), "[reg:3]");
    assert_eq!(render_operand(2, 1), "stack:1");
    assert_eq!(render_operand(CODE_SEGMENT, 7), "code:7");
    assert_eq!(render_operand(CODE_SEGMENT | 3, 2), "[code+stack:2]");
  }
}
