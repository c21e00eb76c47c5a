/*!
  Splits assembly source into tokens.

  Lexemes have the following structure:
    ```text
    <identifier> ::= [A-Za-z_] [A-Za-z0-9_-]*
    <integer>    ::= [0-9]+
    <float>      ::= [0-9]+ '.' [0-9]*
    <string>     ::= '"' [^"]* '"' | "'" [^']* "'"
    <operator>   ::= ':' | '+' | '-' | ',' | '(' | ')' | '[' | ']' | ';'
    ```
  Whitespace separates tokens and is otherwise ignored. Anything else is a lexical error.

  The lexer is lazy: a token is scanned only when the parser asks for it. Tokens the parser has
  looked ahead at, or put back, wait in a queue and are handed out before any new scanning.
*/

use std::collections::VecDeque;

use nom::{
  bytes::complete::{take_till, take_while, take_while_m_n},
  character::complete::{char as one_char, digit0, digit1, multispace0, one_of},
  combinator::{opt, recognize},
  sequence::pair,
  IResult
};

use crate::error::LexError;
use crate::token::{Position, Token, TokenKind, OPERATORS};

// region Lexeme parsers

fn blank(input: &str) -> IResult<&str, &str> {
  multispace0(input)
}

fn identifier(input: &str) -> IResult<&str, &str> {
  recognize(
    pair(
      take_while_m_n(1, 1, |c: char| c.is_ascii_alphabetic() || c == '_'),
      take_while(|c: char| c.is_ascii_alphanumeric() || c == '_' || c == '-')
    )
  )(input)
}

fn number(input: &str) -> IResult<&str, &str> {
  recognize(pair(digit1, opt(pair(one_char('.'), digit0))))(input)
}

fn operator(input: &str) -> IResult<&str, char> {
  one_of(OPERATORS)(input)
}

/// Returns the content between matching quotes.
fn quoted(input: &str) -> IResult<&str, &str> {
  let (rest, quote)   = one_of("\"'")(input)?;
  let (rest, content) = take_till(|c: char| c == quote)(rest)?;
  let (rest, _)       = one_char(quote)(rest)?;
  Ok((rest, content))
}

// endregion

pub struct Lexer<'a> {
  /// The source not yet scanned.
  rest     : &'a str,
  /// Position of the first character of `rest`.
  position : Position,
  /// Tokens scanned ahead of the parser or put back by it.
  pending  : VecDeque<Token>,
  /// Set once the `Iterator` implementation has reached the end.
  finished : bool,
}

impl<'a> Lexer<'a> {

  pub fn new(text: &'a str) -> Lexer<'a> {
    Lexer {
      rest     : text,
      position : Position::start(),
      pending  : VecDeque::new(),
      finished : false,
    }
  }

  /// Points the lexer at new source, discarding queued tokens and position state.
  pub fn reset(&mut self, text: &'a str) {
    self.rest     = text;
    self.position = Position::start();
    self.pending.clear();
    self.finished = false;
  }

  /// Extracts the next token. Past the end of the source, every call returns `EndOfFile`.
  pub fn next_token(&mut self) -> Result<Token, LexError> {
    match self.pending.pop_front() {
      Some(token) => Ok(token),
      None        => self.scan()
    }
  }

  /// Returns the token `n` places ahead without consuming anything. `peek(0)` is the token the
  /// next call to `next_token` will return.
  pub fn peek(&mut self, n: usize) -> Result<&Token, LexError> {
    while self.pending.len() <= n {
      let token = self.scan()?;
      self.pending.push_back(token);
    }
    Ok(&self.pending[n])
  }

  /**
    Returns a token to the front of the stream. It is up to the caller to make sure what is put
    back is the token that had last been extracted.
  */
  pub fn put_back(&mut self, token: Token) {
    self.pending.push_front(token);
  }

  fn consume(&mut self, text: &str) {
    self.position.advance(text);
    self.rest = &self.rest[text.len()..];
  }

  fn scan(&mut self) -> Result<Token, LexError> {
    // Get rid of leading whitespace.
    if let Ok((_, whitespace)) = blank(self.rest) {
      self.consume(whitespace);
    }

    let input    = self.rest;
    let position = self.position;
    let invalid  = |found: char| LexError::InvalidCharacter { position, found };

    let first = match input.chars().next() {
      Some(c) => c,
      None    => return Ok(Token::new(TokenKind::EndOfFile, "", position))
    };

    let (kind, content, consumed): (TokenKind, &str, &str) =
      if first.is_ascii_digit() {
        let (_, text) = number(input).map_err(|_| invalid(first))?;
        let kind = match text.contains('.') {
          true  => TokenKind::Float,
          false => TokenKind::Integer
        };
        (kind, text, text)
      }
      else if OPERATORS.contains(first) {
        let (_, op) = operator(input).map_err(|_| invalid(first))?;
        let text = &input[..op.len_utf8()];
        (TokenKind::Operator, text, text)
      }
      else if first.is_ascii_alphabetic() || first == '_' {
        let (_, text) = identifier(input).map_err(|_| invalid(first))?;
        (TokenKind::Identifier, text, text)
      }
      else if first == '"' || first == '\'' {
        let (_, content) =
          quoted(input).map_err(|_| LexError::UnterminatedString { position })?;
        let kind = match first {
          '"' => TokenKind::DoubleString,
          _   => TokenKind::SingleString
        };
        // Both quote characters are one byte wide.
        (kind, content, &input[..content.len() + 2])
      }
      else {
        return Err(invalid(first));
      };

    self.consume(consumed);
    Ok(Token::new(kind, content, position))
  }

}

impl<'a> Iterator for Lexer<'a> {
  type Item = Result<Token, LexError>;

  /// Yields tokens up to, but not including, `EndOfFile`. Stops after the first error.
  fn next(&mut self) -> Option<Self::Item> {
    if self.finished {
      return None;
    }
    match self.next_token() {

      Ok(token) if token.is_eof() => {
        self.finished = true;
        None
      }

      Err(e) => {
        self.finished = true;
        Some(Err(e))
      }

      result => Some(result)

    }
  }
}
