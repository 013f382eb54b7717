use crate::{langdef, ITokenFeed, Lexer, Parser, ParseErrorKind, Source, SourceQueue, TokenStep};
use std::rc::Rc;

fn parser_for(grammar: &str) -> Parser {
    let compiled = langdef::compile(grammar).expect("grammar should compile");
    Parser::new(Rc::new(compiled)).expect("parser should build")
}

fn lexer_for(parser: &Parser, input: &str) -> Lexer {
    let mut queue = SourceQueue::new();
    queue.append(Rc::new(Source::new("input", input)));
    Lexer::new(parser.grammar().clone(), parser.automata.clone(), queue)
}

/// Collect (token display name, content) pairs for structural tokens and
/// names only for asides, until end of input.
fn drain(lexer: &mut Lexer, group: i32) -> (Vec<(String, String)>, Vec<String>) {
    let mut tokens = Vec::new();
    let mut asides = Vec::new();
    loop {
        match lexer.next(group).expect("lexing should succeed") {
            TokenStep::Token(lexeme) if lexeme.is_eof() => break,
            TokenStep::Token(lexeme) => {
                let grammar = lexer.grammar.clone();
                tokens.push((
                    grammar.token_name(lexeme.token),
                    lexeme.content().to_string(),
                ));
            }
            TokenStep::Aside(lexeme) => asides.push(lexeme.content().to_string()),
        }
    }
    (tokens, asides)
}

#[test]
fn declaration_order_wins() {
    // $rest would swallow the whole line under a longest-match rule.
    let parser = parser_for(
        r#"
        $name = /[a-z]+/;
        $rest = /[^\n]+/;
        doc = {$name | $rest};
        "#,
    );
    let mut lexer = lexer_for(&parser, "ab=c");
    let (tokens, _) = drain(&mut lexer, 0);
    assert_eq!(
        tokens,
        vec![
            ("$name".to_string(), "ab".to_string()),
            ("$rest".to_string(), "=c".to_string()),
        ]
    );
}

#[test]
fn literal_reclassification_is_exact() {
    let parser = parser_for(
        r#"
        $name = /[a-z]+/;
        $ws = /[ ]+/;
        !aside $ws;
        stmt = 'let', $name;
        "#,
    );
    let mut lexer = lexer_for(&parser, "let letx");
    let (tokens, asides) = drain(&mut lexer, 0);
    assert_eq!(
        tokens,
        vec![
            ("'let'".to_string(), "let".to_string()),
            ("$name".to_string(), "letx".to_string()),
        ]
    );
    assert_eq!(asides, vec![" ".to_string()]);
}

#[test]
fn caseless_literals_compare_uppercased() {
    let parser = parser_for(
        r#"
        $kw = /[a-zA-Z]+/;
        $ws = /[ ]+/;
        !aside $ws;
        !caseless $kw;
        stmt = 'IF', $kw;
        "#,
    );
    let mut lexer = lexer_for(&parser, "if If");
    let (tokens, _) = drain(&mut lexer, 0);
    assert_eq!(tokens[0].0, "'IF'");
    assert_eq!(tokens[0].1, "if");
    assert_eq!(tokens[1].0, "'IF'");
}

#[test]
fn no_literals_flag_suppresses_reclassification() {
    let parser = parser_for(
        r#"
        $word = /[a-z]+/;
        !no-literals $word;
        stmt = 'let', $word;
        "#,
    );
    let mut lexer = lexer_for(&parser, "let");
    let lexeme = match lexer.next(0).expect("lexes") {
        TokenStep::Token(lexeme) => lexeme,
        TokenStep::Aside(_) => panic!("unexpected aside"),
    };
    // The text names a literal, but the matched type opted out.
    assert_eq!(lexeme.token, lexeme.base);
    assert_eq!(parser.grammar().token_name(lexeme.token), "$word");
}

#[test]
fn error_token_surfaces_lexical_error() {
    let parser = parser_for(
        r#"
        $name = /[a-z]+/;
        $bad = /./;
        !error $bad;
        doc = {$name};
        "#,
    );
    let mut lexer = lexer_for(&parser, "?");
    let err = match lexer.next(0) {
        Err(err) => err,
        Ok(_) => panic!("expected a lexical error"),
    };
    assert_eq!(err.kind, ParseErrorKind::Lexical);
    assert!(err.message.contains('?'));
}

#[test]
fn no_match_reports_position() {
    let parser = parser_for(
        r#"
        $name = /[a-z]+/;
        doc = {$name};
        "#,
    );
    let mut lexer = lexer_for(&parser, "ab?cd");
    let first = lexer.next(0).expect("first token lexes");
    assert!(matches!(first, TokenStep::Token(_)));
    let err = match lexer.next(0) {
        Err(err) => err,
        Ok(_) => panic!("expected a lexical error"),
    };
    assert_eq!(err.kind, ParseErrorKind::Lexical);
    assert_eq!(err.pointer, 2);
}

#[test]
fn shrink_redelivers_shortened_token() {
    let parser = parser_for(
        r#"
        $op = /[+\-*\/=]+/;
        !shrink $op;
        expr = '+', '=';
        "#,
    );
    let mut lexer = lexer_for(&parser, "+=");
    let whole = match lexer.next(0).expect("lexes") {
        TokenStep::Token(lexeme) => lexeme,
        TokenStep::Aside(_) => panic!("unexpected aside"),
    };
    assert_eq!(whole.content(), "+=");

    let shorter = lexer.shrink(&whole, 0).expect("shrinks");
    assert_eq!(shorter.content(), "+");
    assert_eq!(parser.grammar().token_name(shorter.token), "'+'");

    // The trimmed byte reappears at the next call.
    let rest = match lexer.next(0).expect("lexes") {
        TokenStep::Token(lexeme) => lexeme,
        TokenStep::Aside(_) => panic!("unexpected aside"),
    };
    assert_eq!(rest.content(), "=");
    assert_eq!(parser.grammar().token_name(rest.token), "'='");

    // A one-character token cannot shrink further.
    assert!(lexer.shrink(&rest, 0).is_none());
}

#[test]
fn continues_into_queued_sources() {
    let parser = parser_for(
        r#"
        $name = /[a-z]+/;
        doc = {$name};
        "#,
    );
    let mut queue = SourceQueue::new();
    queue.append(Rc::new(Source::new("one", "ab")));
    queue.append(Rc::new(Source::new("two", "cd")));
    let mut lexer = Lexer::new(parser.grammar().clone(), parser.automata.clone(), queue);
    let (tokens, _) = drain(&mut lexer, 0);
    assert_eq!(tokens.len(), 2);
    assert_eq!(tokens[0].1, "ab");
    assert_eq!(tokens[1].1, "cd");
}
