use super::{Directive, DirectiveKind, DslToken, Expr, LangDef, Mark, ProdDecl, Reader, TokenDecl};
use crate::{GrammarError, Position};

/// Parse a grammar definition into declaration lists. Declarations may come
/// in any order; resolution happens in the builder.
pub(crate) fn parse(source: &str) -> Result<LangDef, GrammarError> {
    let mut reader = Reader::new(source);
    let current = reader.next_token()?;
    DslParser { reader, current }.parse_all()
}

struct DslParser<'s> {
    reader: Reader<'s>,
    current: DslToken,
}

impl<'s> DslParser<'s> {
    fn bump(&mut self) -> Result<DslToken, GrammarError> {
        let next = self.reader.next_token()?;
        Ok(std::mem::replace(&mut self.current, next))
    }

    fn fail_at(&self, line: usize, column: usize, message: String) -> GrammarError {
        GrammarError::new(Position::new(line, column), message)
    }

    fn expect(&mut self, mark: Mark, what: &str) -> Result<(), GrammarError> {
        if self.current.mark == mark {
            self.bump()?;
            Ok(())
        } else {
            Err(self.fail_at(
                self.current.line,
                self.current.column,
                format!("expected {}", what),
            ))
        }
    }

    fn parse_all(&mut self) -> Result<LangDef, GrammarError> {
        let mut definition = LangDef::default();
        loop {
            let token = self.bump()?;
            let (line, column) = (token.line, token.column);
            match token.mark {
                Mark::End => return Ok(definition),
                Mark::TokenName(name) => {
                    self.expect(Mark::Equals, "'='")?;
                    let declared = self.bump()?;
                    let pattern = match declared.mark {
                        Mark::Pattern(pattern) => pattern,
                        _ => {
                            return Err(self.fail_at(
                                declared.line,
                                declared.column,
                                "expected a /pattern/".to_string(),
                            ))
                        }
                    };
                    self.expect(Mark::Semi, "';'")?;
                    definition.tokens.push(TokenDecl {
                        name,
                        pattern,
                        line,
                        column,
                    });
                }
                Mark::Name(name) => {
                    self.expect(Mark::Equals, "'='")?;
                    let expr = self.parse_alt()?;
                    self.expect(Mark::Semi, "';'")?;
                    definition.prods.push(ProdDecl { name, expr, line, column });
                }
                Mark::Directive(name) => {
                    definition
                        .directives
                        .push(self.parse_directive(&name, line, column)?);
                }
                _ => {
                    return Err(self.fail_at(line, column, "expected a declaration".to_string()));
                }
            }
        }
    }

    fn parse_directive(
        &mut self,
        name: &str,
        line: usize,
        column: usize,
    ) -> Result<Directive, GrammarError> {
        let kind = match name {
            "aside" => DirectiveKind::Aside,
            "extern" => DirectiveKind::Extern,
            "error" => DirectiveKind::Error,
            "shrink" => DirectiveKind::Shrink,
            "caseless" => DirectiveKind::Caseless,
            "no-literals" => DirectiveKind::NoLiterals,
            "reserved" => DirectiveKind::Reserved,
            "group" => DirectiveKind::Group,
            _ => {
                return Err(self.fail_at(line, column, format!("unknown directive '!{}'", name)));
            }
        };
        let mut directive = Directive {
            kind,
            tokens: Vec::new(),
            literals: Vec::new(),
            line,
            column,
        };
        loop {
            let arg = self.bump()?;
            match arg.mark {
                Mark::Semi => break,
                Mark::TokenName(token) => directive.tokens.push(token),
                Mark::Literal(literal) => directive.literals.push(literal),
                _ => {
                    return Err(self.fail_at(
                        arg.line,
                        arg.column,
                        "expected a $token, a 'literal' or ';'".to_string(),
                    ));
                }
            }
        }
        if directive.tokens.is_empty() && directive.literals.is_empty() {
            return Err(self.fail_at(line, column, format!("directive '!{}' needs arguments", name)));
        }
        match kind {
            DirectiveKind::Reserved => {
                if !directive.tokens.is_empty() {
                    return Err(self.fail_at(
                        line,
                        column,
                        "'!reserved' takes literal arguments only".to_string(),
                    ));
                }
            }
            DirectiveKind::Group => {}
            _ => {
                if !directive.literals.is_empty() {
                    return Err(self.fail_at(
                        line,
                        column,
                        format!("'!{}' takes $token arguments only", name),
                    ));
                }
            }
        }
        Ok(directive)
    }

    fn parse_alt(&mut self) -> Result<Expr, GrammarError> {
        let mut branches = vec![self.parse_seq()?];
        while self.current.mark == Mark::Pipe {
            self.bump()?;
            branches.push(self.parse_seq()?);
        }
        if branches.len() == 1 {
            Ok(branches.remove(0))
        } else {
            Ok(Expr::Alt(branches))
        }
    }

    fn parse_seq(&mut self) -> Result<Expr, GrammarError> {
        let mut items = vec![self.parse_term()?];
        while self.current.mark == Mark::Comma {
            self.bump()?;
            items.push(self.parse_term()?);
        }
        if items.len() == 1 {
            Ok(items.remove(0))
        } else {
            Ok(Expr::Seq(items))
        }
    }

    fn parse_term(&mut self) -> Result<Expr, GrammarError> {
        let token = self.bump()?;
        let (line, column) = (token.line, token.column);
        match token.mark {
            Mark::OpenBracket => {
                let inner = self.parse_alt()?;
                self.expect(Mark::CloseBracket, "']'")?;
                Ok(Expr::Opt(Box::new(inner)))
            }
            Mark::OpenBrace => {
                let inner = self.parse_alt()?;
                self.expect(Mark::CloseBrace, "'}'")?;
                Ok(Expr::Rep(Box::new(inner)))
            }
            Mark::OpenParen => {
                let inner = self.parse_alt()?;
                self.expect(Mark::CloseParen, "')'")?;
                Ok(inner)
            }
            Mark::Literal(text) => {
                if text.is_empty() {
                    return Err(self.fail_at(line, column, "literal must not be empty".to_string()));
                }
                Ok(Expr::Literal(text, line, column))
            }
            Mark::TokenName(name) => Ok(Expr::Token(name, line, column)),
            Mark::Name(name) => Ok(Expr::Rule(name, line, column)),
            _ => Err(self.fail_at(line, column, "expected a production term".to_string())),
        }
    }
}
