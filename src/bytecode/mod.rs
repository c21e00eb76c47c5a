/*!

  The VM uses a 32 bit word for every instruction. The high 16 bits hold the opcode, an index
  into the machine's handler table, and the low 16 bits hold an operand field. The operand field
  has no fixed meaning: each opcode declares an operand *form*, and the field is read through the
  accessor for that form. Bit 0 is the least significant bit of the field.

    Registers:  [src:6][dst:6][src_mode:2][dst_mode:2]
    Chars:      [c0:8][c1:8]
    Extended:   [mode:3][location:13]
    Scalar:     [mode:3][location:6][length:7]
    Short:      [value:16]
    NoArgs:     [reserved:16]

  The form is metadata about the opcode, held by the assembler that declared the mnemonic and
  assumed by the handler that implements it. Decoding never fails, since every bit pattern is a
  legal pattern for every form. Whether a decoded value makes sense, an addressing mode for
  example, is decided by the handler that consumes it.

  Literal data shares the same word size. `encode_bytes` packs four bytes into a word with the
  first byte in the high position.

*/

mod binary;
mod instruction;

pub use binary::{
  decode_bytes, decode_instruction, encode_bytes, encode_instruction, pack_operands, Word
};
pub use instruction::{
  ExtendedAddress, Form, Instruction, Opcode, Operands, RegisterPair, Scalar
};
