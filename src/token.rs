/*!
  Tokens produced by the lexer from assembly source. A token keeps its text and the position of
  its first character so that the assembler can report errors against the source.
*/

use std::fmt::{Display, Formatter};

use strum_macros::{Display as StrumDisplay, IntoStaticStr};

/// The characters that form single-character operator tokens.
pub const OPERATORS: &str = ":+-,()[];";

#[derive(StrumDisplay, IntoStaticStr, Clone, Copy, Eq, PartialEq, Debug, Hash)]
pub enum TokenKind {
  #[strum(serialize = "identifier")]
  Identifier,
  #[strum(serialize = "operator")]
  Operator,
  #[strum(serialize = "integer")]
  Integer,
  #[strum(serialize = "float")]
  Float,
  /// A `"double quoted"` string.
  #[strum(serialize = "string")]
  DoubleString,
  /// A `'single quoted'` string.
  #[strum(serialize = "quoted string")]
  SingleString,
  #[strum(serialize = "end-of-file")]
  EndOfFile,
}

impl TokenKind {
  pub fn is_string(&self) -> bool {
    match self {
      TokenKind::DoubleString | TokenKind::SingleString => true,
      _ => false
    }
  }
}

/// Line and column count from 1. The offset is a 0-based byte offset into the source.
#[derive(Clone, Copy, Eq, PartialEq, Ord, PartialOrd, Debug, Hash)]
pub struct Position {
  pub line   : usize,
  pub column : usize,
  pub offset : usize,
}

impl Position {
  pub fn start() -> Position {
    Position{ line: 1, column: 1, offset: 0 }
  }

  /// Moves past `text`, which must be the source text starting at this position.
  pub fn advance(&mut self, text: &str) {
    for c in text.chars() {
      match c {
        '\n' => {
          self.line  += 1;
          self.column = 1;
        }
        _ => {
          self.column += 1;
        }
      }
    }
    self.offset += text.len();
  }
}

impl Default for Position {
  fn default() -> Position {
    Position::start()
  }
}

impl Display for Position {
  fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
    write!(f, "{},{}", self.line, self.column)
  }
}

/// For strings, `text` is the content without the quotes.
#[derive(Clone, Eq, PartialEq, Debug, Hash)]
pub struct Token {
  pub kind     : TokenKind,
  pub text     : String,
  pub position : Position,
}

impl Token {
  pub fn new(kind: TokenKind, text: &str, position: Position) -> Token {
    Token{ kind, text: text.to_string(), position }
  }

  pub fn is(&self, text: &str) -> bool {
    self.kind != TokenKind::EndOfFile && !self.kind.is_string() && self.text == text
  }

  pub fn is_eof(&self) -> bool {
    self.kind == TokenKind::EndOfFile
  }
}

impl Display for Token {
  fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
    match self.kind {
      TokenKind::EndOfFile    => write!(f, "end-of-file"),
      TokenKind::DoubleString => write!(f, "\"{}\"", self.text),
      TokenKind::SingleString => write!(f, "'{}'", self.text),
      _                       => write!(f, "{}", self.text)
    }
  }
}


#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn advance_counts_lines_and_columns() {
    let mut position = Position::start();
    position.advance("ab\ncd");
    assert_eq!(position, Position{ line: 2, column: 3, offset: 5 });
    assert_eq!(position.to_string(), "2,3");
  }

  #[test]
  fn string_tokens_never_match_operator_text() {
    let quoted = Token::new(TokenKind::SingleString, ";", Position::start());
    let operator = Token::new(TokenKind::Operator, ";", Position::start());
    assert!(!quoted.is(";"));
    assert!(operator.is(";"));
  }
}
