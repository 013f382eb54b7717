use crate::{Lexeme, Position, Source, EOF};
use std::fmt::{Debug, Display, Formatter};
use std::rc::Rc;

impl Lexeme {
    pub fn new(token: i32, base: i32, start: usize, end: usize, source: Rc<Source>) -> Self {
        Self {
            token,
            base,
            start,
            end,
            source,
        }
    }

    /// The synthetic terminator at the end of the last queued source.
    pub fn eof(source: Rc<Source>) -> Self {
        let at = source.len();
        Self::new(EOF, EOF, at, at, source)
    }

    pub fn is_eof(&self) -> bool {
        self.token == EOF
    }

    pub fn content(&self) -> &str {
        &self.source.text()[self.start..self.end]
    }

    pub fn position(&self) -> Position {
        self.source.position(self.start)
    }
}

impl Display for Lexeme {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("")
            .field(&self.token)
            .field(&self.start)
            .field(&self.end)
            .finish()
    }
}

impl Debug for Lexeme {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Lexeme")
            .field("token", &self.token)
            .field("content", &self.content())
            .field("start", &self.start)
            .field("end", &self.end)
            .finish()
    }
}
