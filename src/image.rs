/*!
  Saves and restores a machine's memory. An image interleaves the two arrays: for each address
  in order, the general memory cell and then the code memory cell, each as 4 little-endian
  bytes. Handlers are not part of an image; a loaded image needs a machine that has been
  bootstrapped the same way as the one that saved it.
*/

use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::Path;

use crate::address::VM_SIZE;
use crate::cell::Cell;
use crate::error::MachineError;
use crate::machine::Machine;

/// Bytes per cell in an image.
const CELL_BYTES: usize = 4;

/// Size of a complete image.
pub const IMAGE_SIZE: usize = VM_SIZE * 2 * CELL_BYTES;

impl Machine {

  pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<(), MachineError> {
    let file = File::create(path)?;
    let mut writer = BufWriter::new(file);
    self.write_image(&mut writer)?;
    writer.flush()?;
    Ok(())
  }

  pub fn load<P: AsRef<Path>>(&mut self, path: P) -> Result<(), MachineError> {
    let file = File::open(path)?;
    self.read_image(BufReader::new(file))
  }

  pub fn write_image<W: Write>(&self, mut out: W) -> Result<(), MachineError> {
    for (cell, code) in self.cells().iter().zip(self.code().iter()) {
      out.write_all(&cell.to_le_bytes())?;
      out.write_all(&code.to_le_bytes())?;
    }
    Ok(())
  }

  /**
    Reads an image into memory. Cells are stored as they are read, so a short image leaves the
    cells it did contain loaded before `MalformedImage` is returned. An image with trailing
    bytes is loaded in full and then rejected the same way.
  */
  pub fn read_image<R: Read>(&mut self, mut input: R) -> Result<(), MachineError> {
    let mut bytes = Vec::with_capacity(IMAGE_SIZE);
    input.read_to_end(&mut bytes)?;

    for (i, pair) in bytes.chunks_exact(2 * CELL_BYTES).take(VM_SIZE).enumerate() {
      self.cells_mut()[i] = cell_from(&pair[..CELL_BYTES]);
      self.code_mut()[i]  = cell_from(&pair[CELL_BYTES..]);
    }

    match bytes.len() == IMAGE_SIZE {
      true  => Ok(()),
      false => Err(MachineError::MalformedImage{ expected: IMAGE_SIZE, found: bytes.len() })
    }
  }

}

fn cell_from(bytes: &[u8]) -> Cell {
  let mut word = [0u8; CELL_BYTES];
  word.copy_from_slice(bytes);
  Cell::from_le_bytes(word)
}
