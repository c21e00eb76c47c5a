use std::collections::HashMap;

use string_cache::DefaultAtom;

use crate::bytecode::{Form, Opcode};

/**
  The mnemonic table maps an instruction name to the operand form its statements are written in
  and to the opcode they are encoded with. A symbol table is really just a convenience wrapper
  around two maps keyed by interned names. It only grows: redeclaring a name replaces its entry,
  and several names may share an opcode.
*/
#[derive(Clone, Debug, Default)]
pub struct SymbolTable {
  forms : HashMap<DefaultAtom, Form>,
  codes : HashMap<DefaultAtom, Opcode>,
}

impl SymbolTable {

  pub fn new() -> SymbolTable {
    SymbolTable {
      forms : HashMap::new(),
      codes : HashMap::new(),
    }
  }

  pub fn insert(&mut self, name: DefaultAtom, form: Form, opcode: Opcode) {
    self.forms.insert(name.clone(), form);
    self.codes.insert(name, opcode);
  }

  pub fn get_form(&self, name: &str) -> Option<Form> {
    self.forms.get(&DefaultAtom::from(name)).copied()
  }

  pub fn get_opcode(&self, name: &str) -> Option<Opcode> {
    self.codes.get(&DefaultAtom::from(name)).copied()
  }

  /// A mnemonic declared for `opcode`. When several share it, the alphabetically first.
  pub fn get_name(&self, opcode: Opcode) -> Option<DefaultAtom> {
    self.codes
        .iter()
        .filter(|(_, code)| **code == opcode)
        .map(|(name, _)| name.clone())
        .min_by(|a, b| (**a).cmp(&**b))
  }

  /// All declarations as `(name, form, opcode)`, ordered by opcode then name.
  pub fn entries(&self) -> Vec<(DefaultAtom, Form, Opcode)> {
    let mut entries: Vec<(DefaultAtom, Form, Opcode)> =
      self.forms
          .iter()
          .filter_map(|(name, form)| {
            self.codes.get(name).map(|code| (name.clone(), *form, *code))
          })
          .collect();
    entries.sort_by(|a, b| a.2.cmp(&b.2).then_with(|| (*a.0).cmp(&*b.0)));
    entries
  }

  pub fn len(&self) -> usize {
    self.forms.len()
  }

  pub fn is_empty(&self) -> bool {
    self.forms.is_empty()
  }
}


#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn insert_and_lookup() {
    let mut table = SymbolTable::new();
    table.insert(DefaultAtom::from("halt"), Form::NoArgs, 11);
    table.insert(DefaultAtom::from("stop"), Form::NoArgs, 11);
    assert_eq!(table.get_form("halt"), Some(Form::NoArgs));
    assert_eq!(table.get_opcode("stop"), Some(11));
    assert_eq!(table.get_name(11).as_deref(), Some("halt"));
    assert_eq!(table.get_form("run"), None);
    assert_eq!(table.len(), 2);
  }

  #[test]
  fn redeclaration_replaces() {
    let mut table = SymbolTable::new();
    table.insert(DefaultAtom::from("jmp"), Form::Short, 3);
    table.insert(DefaultAtom::from("jmp"), Form::Extended, 9);
    assert_eq!(table.get_form("jmp"), Some(Form::Extended));
    assert_eq!(table.entries().len(), 1);
    assert_eq!(table.get_name(3), None);
  }
}
