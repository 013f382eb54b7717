use crate::{flags, langdef, ANY};

#[test]
fn first_production_is_the_entry() {
    let grammar = langdef::compile(
        r#"
        $name = /[a-z]+/;
        doc = {item};
        item = $name;
        "#,
    )
    .expect("compiles");
    assert_eq!(grammar.node_id("doc"), Some(0));
    assert_eq!(grammar.node_id("item"), Some(1));
    assert_eq!(grammar.nodes[0].name, "doc");
}

#[test]
fn token_ordering_is_types_externals_literals() {
    let grammar = langdef::compile(
        r#"
        $name = /[a-z]+/;
        $int = /[0-9]+/;
        !extern $mark;
        doc = 'go', $name, $mark, $int;
        "#,
    )
    .expect("compiles");
    let kinds: Vec<u8> = grammar.tokens.iter().map(|t| t.flags).collect();
    assert_eq!(grammar.token_id("name"), Some(0));
    assert_eq!(grammar.token_id("int"), Some(1));
    assert_eq!(kinds[2] & flags::EXTERNAL, flags::EXTERNAL);
    assert_eq!(kinds[3] & flags::LITERAL, flags::LITERAL);
    assert_eq!(grammar.tokens[3].name, "go");
}

#[test]
fn rule_ranges_are_sorted_and_disjoint() {
    let grammar = langdef::compile(
        r#"
        $name = /[a-z]+/;
        $int = /[0-9]+/;
        $punct = /[=;]/;
        $ws = /[ \t\n]+/;
        !aside $ws;
        unit = {stmt};
        stmt = 'let', $name, tail, ';' | 'print', $name, ';';
        tail = '=', $int | '=', $name;
        "#,
    )
    .expect("compiles");
    for state in &grammar.states {
        let rules = &grammar.rules[state.rules.0 as usize..state.rules.1 as usize];
        assert!(rules.windows(2).all(|w| w[0].key < w[1].key));
        let multis =
            &grammar.multirules[state.multirules.0 as usize..state.multirules.1 as usize];
        assert!(multis.windows(2).all(|w| w[0].key < w[1].key));
        for multi in multis {
            assert!(rules.iter().all(|r| r.key != multi.key));
            assert!(multi.low < multi.high);
        }
        assert!(!rules.is_empty() || !multis.is_empty());
    }
}

#[test]
fn duplicate_alternative_is_ambiguous() {
    let err = langdef::compile(
        r#"
        $x = /x/;
        a = 'x' | 'x';
        "#,
    )
    .expect_err("must not compile");
    assert!(err.message.contains("ambiguous"), "got: {}", err.message);
}

#[test]
fn inseparable_alternatives_are_ambiguous() {
    // Both branches accept exactly the same inputs.
    let err = langdef::compile(
        r#"
        $x = /x/;
        $y = /y/;
        a = 'x', 'y' | 'x', ('y');
        "#,
    )
    .expect_err("must not compile");
    assert!(err.message.contains("ambiguous"), "got: {}", err.message);
}

#[test]
fn duplicate_token_declaration() {
    let err = langdef::compile(
        r#"
        $x = /x/;
        $x = /y/;
        a = $x;
        "#,
    )
    .expect_err("must not compile");
    assert!(err.message.contains("declared twice"));
    assert_eq!(err.position.line, 3);
}

#[test]
fn duplicate_production() {
    let err = langdef::compile(
        r#"
        $x = /x/;
        a = $x;
        a = $x, $x;
        "#,
    )
    .expect_err("must not compile");
    assert!(err.message.contains("defined twice"));
}

#[test]
fn undefined_references() {
    let err = langdef::compile("a = $nope;").expect_err("must not compile");
    assert!(err.message.contains("$nope"));

    let err = langdef::compile(
        r#"
        $x = /x/;
        a = $x, missing;
        "#,
    )
    .expect_err("must not compile");
    assert!(err.message.contains("missing"));
}

#[test]
fn bad_patterns_are_rejected() {
    let err = langdef::compile(
        r#"
        $x = /[/;
        a = $x;
        "#,
    )
    .expect_err("must not compile");
    assert!(err.message.contains("valid expression"));

    let err = langdef::compile(
        r#"
        $x = /(a)(b)/;
        a = $x;
        "#,
    )
    .expect_err("must not compile");
    assert!(err.message.contains("capturing"));

    let err = langdef::compile(
        r#"
        $x = /a*/;
        a = $x;
        "#,
    )
    .expect_err("must not compile");
    assert!(err.message.contains("empty"));
}

#[test]
fn left_recursion_is_rejected() {
    let err = langdef::compile(
        r#"
        $int = /[0-9]+/;
        expr = expr, '+', $int | $int;
        "#,
    )
    .expect_err("must not compile");
    assert!(err.message.contains("left recursive"));
}

#[test]
fn indirect_left_recursion_is_rejected() {
    let err = langdef::compile(
        r#"
        $int = /[0-9]+/;
        a = b, $int;
        b = [$int], a;
        "#,
    )
    .expect_err("must not compile");
    assert!(err.message.contains("left recursive"));
}

#[test]
fn aside_tokens_cannot_appear_in_productions() {
    let err = langdef::compile(
        r#"
        $ws = /[ ]+/;
        !aside $ws;
        a = $ws;
        "#,
    )
    .expect_err("must not compile");
    assert!(err.message.contains("aside"));
}

#[test]
fn group_conflict_is_rejected() {
    let err = langdef::compile(
        r#"
        $a = /a/;
        $b = /b/;
        !group $a;
        !group $b;
        doc = $a | $b;
        "#,
    )
    .expect_err("must not compile");
    assert!(err.message.contains("group"));
}

#[test]
fn unknown_directive_and_syntax_errors() {
    let err = langdef::compile("!frobnicate $x;").expect_err("must not compile");
    assert!(err.message.contains("frobnicate"));

    let err = langdef::compile("$x = /a/").expect_err("must not compile");
    assert!(err.message.contains("';'"));

    let err = langdef::compile("a = 'unterminated;").expect_err("must not compile");
    assert!(err.message.contains("unterminated"));
}

#[test]
fn reserved_takes_literals_only() {
    let err = langdef::compile(
        r#"
        $x = /x/;
        !reserved $x;
        a = $x;
        "#,
    )
    .expect_err("must not compile");
    assert!(err.message.contains("reserved"));
}

#[test]
fn directive_flags_are_applied() {
    let grammar = langdef::compile(
        r#"
        $name = /[a-z]+/;
        $op = /[-+]+/;
        $ws = /[ ]+/;
        $bad = /./;
        !aside $ws;
        !shrink $op;
        !error $bad;
        !reserved 'while';
        stmt = 'while', $name, $op, $name;
        "#,
    )
    .expect("compiles");
    let flag_of = |name: &str| grammar.tokens[grammar.token_id(name).unwrap() as usize].flags;
    assert_ne!(flag_of("ws") & flags::ASIDE, 0);
    assert_ne!(flag_of("op") & flags::SHRINKABLE, 0);
    assert_ne!(flag_of("bad") & flags::ERROR, 0);
    assert_ne!(flag_of("while") & flags::RESERVED, 0);
    assert_ne!(flag_of("while") & flags::LITERAL, 0);
}

#[test]
fn states_expose_any_completion() {
    let grammar = langdef::compile(
        r#"
        $name = /[a-z]+/;
        doc = {$name};
        "#,
    )
    .expect("compiles");
    let first = grammar.nodes[0].first_state;
    let rules = &grammar.rules
        [grammar.states[first].rules.0 as usize..grammar.states[first].rules.1 as usize];
    assert!(rules.iter().any(|r| r.key == ANY && r.state == crate::FINAL));
}

#[test]
fn dump_renders_tokens_and_states() {
    let grammar = langdef::compile(
        r#"
        $name = /[a-z]+/;
        $eq = /=/;
        cfg = {$name, $eq, $name};
        "#,
    )
    .expect("compiles");
    let dump = grammar.dump().expect("renders");
    assert!(dump.contains("tokens {"));
    assert!(dump.contains("$name : /[a-z]+/"));
    assert!(dump.contains("cfg {"));
    assert!(dump.contains("ANY -> FINAL"));
}
