use crate::{BuildError, GrammarError, Lexeme, ParseError, ParseErrorKind, Position, Source};
use std::fmt::{Display, Formatter};

impl GrammarError {
    pub fn new(position: Position, message: String) -> Self {
        Self { position, message }
    }
}

impl Display for GrammarError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "GrammarError at {}: {}", self.position, self.message)
    }
}

impl std::error::Error for GrammarError {}

impl BuildError {
    pub fn new(what: String, message: String) -> Self {
        Self { message, what }
    }
}

impl Display for BuildError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "BuildError: {}-{}", self.what, self.message)
    }
}

impl std::error::Error for BuildError {}

impl ParseError {
    pub fn new(
        kind: ParseErrorKind,
        source: &Source,
        pointer: usize,
        message: String,
    ) -> Self {
        Self {
            kind,
            source: source.name().to_string(),
            pointer,
            position: source.position(pointer),
            message,
        }
    }

    /// An error anchored at a lexeme's start position.
    pub fn at(kind: ParseErrorKind, lexeme: &Lexeme, message: String) -> Self {
        Self::new(kind, &lexeme.source, lexeme.start, message)
    }

    /// A hook failure at a lexeme; the message is kept verbatim.
    pub fn hook(lexeme: &Lexeme, message: String) -> Self {
        Self::at(ParseErrorKind::Hook, lexeme, message)
    }

    pub fn is_cancelled(&self) -> bool {
        self.kind == ParseErrorKind::Cancelled
    }
}

impl Display for ParseError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self.kind {
            ParseErrorKind::Lexical => "LexicalError",
            ParseErrorKind::Syntax => "SyntaxError",
            ParseErrorKind::UnexpectedEof => "SyntaxError",
            ParseErrorKind::Ambiguous => "SyntaxError",
            ParseErrorKind::Cancelled => "Cancelled",
            ParseErrorKind::Hook => "HookError",
        };
        write!(
            f,
            "{}: {} [{} @ {}]",
            label, self.message, self.source, self.position
        )
    }
}

impl std::error::Error for ParseError {}
