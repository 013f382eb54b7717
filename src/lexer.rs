use crate::{
    flags, Grammar, ITokenFeed, Lexeme, Lexer, ParseError, ParseErrorKind, Source, SourceQueue,
    TokenStep,
};
use regex::bytes::Regex;
use std::rc::Rc;

impl Lexer {
    pub(crate) fn new(
        grammar: Rc<Grammar>,
        automata: Rc<[Option<Regex>]>,
        queue: SourceQueue,
    ) -> Self {
        Self {
            grammar,
            automata,
            queue,
            sources: Vec::new(),
            src_idx: 0,
            cursor: 0,
        }
    }

    /// The source holding unread bytes, pulling queued sources as needed.
    fn current_source(&mut self) -> Option<Rc<Source>> {
        loop {
            if self.src_idx < self.sources.len() {
                if self.cursor < self.sources[self.src_idx].len() {
                    return Some(self.sources[self.src_idx].clone());
                }
                self.src_idx += 1;
                self.cursor = 0;
            } else {
                match self.queue.pop() {
                    Some(source) => self.sources.push(source),
                    None => return None,
                }
            }
        }
    }

    fn eof_lexeme(&self) -> Lexeme {
        match self.sources.last() {
            Some(source) => Lexeme::eof(source.clone()),
            None => Lexeme::eof(Rc::new(Source::new("", ""))),
        }
    }

    /// Reclassify a pattern match to a literal id when the text names a
    /// literal visible in the active group.
    fn classify(&self, base: usize, text: &str, group: i32) -> i32 {
        let def = &self.grammar.tokens[base];
        if def.flags & flags::NO_LITERALS != 0 {
            return base as i32;
        }
        let literal = if def.flags & flags::CASELESS != 0 {
            self.grammar.literal_of(text.to_uppercase().as_bytes())
        } else {
            self.grammar.literal_of(text.as_bytes())
        };
        match literal {
            Some(id) if self.grammar.tokens[id as usize].groups.contains(group as usize) => id,
            _ => base as i32,
        }
    }
}

impl ITokenFeed for Lexer {
    fn next(&mut self, group: i32) -> Result<TokenStep, ParseError> {
        let source = match self.current_source() {
            Some(source) => source,
            None => return Ok(TokenStep::Token(self.eof_lexeme())),
        };
        let rest = &source.bytes()[self.cursor..];

        // Types are tried in declaration order and the first one whose
        // pattern matches wins; each pattern itself matches greedily.
        let mut best: Option<(usize, usize)> = None;
        for (id, automaton) in self.automata.iter().enumerate() {
            let automaton = match automaton {
                Some(a) => a,
                None => continue,
            };
            if !self.grammar.tokens[id].groups.contains(group as usize) {
                continue;
            }
            if let Some(m) = automaton.find(rest) {
                debug_assert_eq!(m.start(), 0);
                if m.end() > 0 {
                    best = Some((m.end(), id));
                    break;
                }
            }
        }

        let (len, base) = best.ok_or_else(|| {
            ParseError::new(
                ParseErrorKind::Lexical,
                &source,
                self.cursor,
                "no matching token".to_string(),
            )
        })?;
        let (start, end) = (self.cursor, self.cursor + len);
        let def = &self.grammar.tokens[base];
        if def.flags & flags::ERROR != 0 {
            return Err(ParseError::new(
                ParseErrorKind::Lexical,
                &source,
                start,
                format!("invalid input '{}'", &source.text()[start..end]),
            ));
        }
        let effective = self.classify(base, &source.text()[start..end], group);
        self.cursor = end;
        let lexeme = Lexeme::new(effective, base as i32, start, end, source);
        if def.flags & flags::ASIDE != 0 {
            Ok(TokenStep::Aside(lexeme))
        } else {
            Ok(TokenStep::Token(lexeme))
        }
    }

    fn shrink(&mut self, lexeme: &Lexeme, group: i32) -> Option<Lexeme> {
        if lexeme.base < 0 {
            return None;
        }
        let text = lexeme.content();
        let cut = match text.char_indices().last() {
            Some((at, _)) if at > 0 => at,
            _ => return None,
        };
        let src_idx = self
            .sources
            .iter()
            .rposition(|s| Rc::ptr_eq(s, &lexeme.source))?;
        self.src_idx = src_idx;
        self.cursor = lexeme.start + cut;
        let effective = self.classify(lexeme.base as usize, &text[..cut], group);
        Some(Lexeme::new(
            effective,
            lexeme.base,
            lexeme.start,
            self.cursor,
            lexeme.source.clone(),
        ))
    }

    fn append(&mut self, source: Rc<Source>) {
        self.queue.append(source);
    }
}
