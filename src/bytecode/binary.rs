/*!
  This module is responsible for the encoding and decoding of binary instructions.

*/

use super::{Instruction, Opcode, Operands};

// If you change this you must also change `encode_instruction` and `decode_instruction`.
pub type Word = u32;

/// Packs operands into the 16-bit operand field. Values wider than their slot are truncated.
pub fn pack_operands(operands: &Operands) -> u16 {
  match operands {

    Operands::Registers(pair) => {
      // [src:6][dst:6][src_mode:2][dst_mode:2]
        ( pair.src      as u16 & 0x3F)
      | ((pair.dst      as u16 & 0x3F) <<  6)
      | ((pair.src_mode as u16 & 0x03) << 12)
      | ((pair.dst_mode as u16 & 0x03) << 14)
    }

    Operands::Chars(c0, c1) => {
      // [c0:8][c1:8]
      (*c0 as u16) | ((*c1 as u16) << 8)
    }

    Operands::Extended(address) => {
      // [mode:3][location:13]
      (address.mode as u16 & 0x07) | ((address.location & 0x1FFF) << 3)
    }

    Operands::Scalar(scalar) => {
      // [mode:3][location:6][length:7]
        ( scalar.mode     as u16 & 0x07)
      | ((scalar.location as u16 & 0x3F) << 3)
      | ((scalar.length   as u16 & 0x7F) << 9)
    }

    Operands::Short(value) => *value,

    Operands::NoArgs => 0,

  }
}

/**
  Encodes the instruction into a single word, `[field:16][opcode:16]`. It is the caller's
  responsibility to use the `Operands` variant matching the opcode's form.
*/
pub fn encode_instruction(opcode: Opcode, operands: &Operands) -> Word {
  ((opcode as Word) << 16) | pack_operands(operands) as Word
}

/// Splits a word into opcode and raw operand field. Every bit pattern decodes.
pub fn decode_instruction(word: Word) -> Instruction {
  Instruction {
    opcode : (word >> 16) as Opcode,
    field  : (word & 0xFFFF) as u16,
  }
}

impl From<Instruction> for Word {
  fn from(instruction: Instruction) -> Word {
    ((instruction.opcode as Word) << 16) | instruction.field as Word
  }
}

/// Packs four raw bytes into one word of literal data, first byte highest.
pub fn encode_bytes(bytes: [u8; 4]) -> Word {
  Word::from_be_bytes(bytes)
}

/// Inverse of `encode_bytes`.
pub fn decode_bytes(word: Word) -> [u8; 4] {
  word.to_be_bytes()
}


#[cfg(test)]
mod tests {
  use super::*;
  use crate::bytecode::{ExtendedAddress, RegisterPair, Scalar};

  fn round_trip(opcode: Opcode, operands: Operands) {
    let decoded = decode_instruction(encode_instruction(opcode, &operands));
    assert_eq!(decoded.opcode, opcode);
    assert_eq!(decoded.operands(operands.form()), operands);
  }

  #[test]
  fn every_form_round_trips() {
    round_trip(5, Operands::Registers(RegisterPair{ src: 63, src_mode: 2, dst: 17, dst_mode: 3 }));
    round_trip(4, Operands::Chars(b'H', b'e'));
    round_trip(17, Operands::Extended(ExtendedAddress{ mode: 7, location: 8191 }));
    round_trip(31, Operands::Scalar(Scalar{ mode: 4, location: 40, length: 127 }));
    round_trip(1, Operands::Short(0xBEEF));
    round_trip(0xFFFF, Operands::NoArgs);
  }

  #[test]
  fn opcode_occupies_high_half() {
    assert_eq!(encode_instruction(1, &Operands::Short(7)), 0x0001_0007);
    assert_eq!(encode_instruction(11, &Operands::NoArgs), 11 << 16);
    let word: Word = decode_instruction(0x0003_0000).into();
    assert_eq!(word, 0x0003_0000);
  }

  #[test]
  fn register_pair_layout() {
    let pair = RegisterPair{ src: 1, src_mode: 1, dst: 2, dst_mode: 2 };
    assert_eq!(pack_operands(&Operands::Registers(pair)), 1 | (2 << 6) | (1 << 12) | (2 << 14));
  }

  #[test]
  fn oversized_fields_are_truncated() {
    let address = ExtendedAddress{ mode: 9, location: 0x3FFF };
    let decoded = decode_instruction(encode_instruction(2, &Operands::Extended(address)));
    assert_eq!(decoded.extended(), ExtendedAddress{ mode: 1, location: 0x1FFF });
  }

  #[test]
  fn four_byte_words() {
    let word = encode_bytes(*b"Hell");
    assert_eq!(word, 0x4865_6C6C);
    assert_eq!(&decode_bytes(word), b"Hell");
  }
}
