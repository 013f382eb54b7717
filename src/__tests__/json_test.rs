use crate::{langdef, HookSet, ParseOptions, Parser, SyntaxTree, TreeBuilder};
use serde_json::Value as SerdeValue;
use std::rc::Rc;

const JSON_GRAMMAR: &str = r#"
    $string = /"(?:[^"\\]|\\.)*"/;
    $number = /-?(?:0|[1-9][0-9]*)(?:\.[0-9]+)?(?:[eE][+-]?[0-9]+)?/;
    $word = /[a-z]+/;
    $punct = /[{}\[\]:,]/;
    $ws = /[ \t\n]+/;
    !aside $ws;
    !no-literals $string;

    json = value;
    value = $string | $number | object | array | 'true' | 'false' | 'null';
    object = '{', [member, {',', member}], '}';
    member = $string, ':', value;
    array = '[', [value, {',', value}], ']';
"#;

fn json_parser() -> Parser {
    let grammar = langdef::compile(JSON_GRAMMAR).expect("grammar should compile");
    Parser::new(Rc::new(grammar)).expect("parser should build")
}

fn parse_json(parser: &Parser, input: &str) -> SyntaxTree {
    let hooks: HookSet<SyntaxTree> =
        HookSet::new().with_fallback_node_hook(Rc::new(TreeBuilder::new(parser.grammar().clone())));
    parser
        .parse_text("json", input, &hooks, &ParseOptions::new())
        .expect("input should parse")
}

fn unquote(text: &str) -> String {
    text[1..text.len() - 1].to_string()
}

/// Rebuild a serde value from the syntax tree; punctuation leaves are
/// skipped on the way.
fn to_value(tree: &SyntaxTree) -> SerdeValue {
    match tree.name.as_str() {
        "json" | "value" => to_value(&tree.children[0]),
        "string" => SerdeValue::String(unquote(tree.content.as_deref().unwrap_or(""))),
        "number" => {
            let text = tree.content.as_deref().unwrap_or("0");
            serde_json::from_str(text).expect("number parses")
        }
        "true" => SerdeValue::Bool(true),
        "false" => SerdeValue::Bool(false),
        "null" => SerdeValue::Null,
        "object" => {
            let mut map = serde_json::Map::new();
            for member in tree.children.iter().filter(|c| c.name == "member") {
                let key = unquote(member.children[0].content.as_deref().unwrap_or(""));
                let value = member
                    .children
                    .iter()
                    .find(|c| c.name == "value")
                    .expect("member holds a value");
                map.insert(key, to_value(value));
            }
            SerdeValue::Object(map)
        }
        "array" => SerdeValue::Array(
            tree.children
                .iter()
                .filter(|c| c.name == "value")
                .map(to_value)
                .collect(),
        ),
        other => panic!("unexpected node '{}'", other),
    }
}

#[test]
fn matches_serde_on_nested_input() {
    let parser = json_parser();
    let input = r#"{"a": [1, 2, 30], "b": {"c": null, "d": true}, "e": "text"}"#;
    let tree = parse_json(&parser, input);
    let expected: SerdeValue = serde_json::from_str(input).expect("serde parses");
    assert_eq!(to_value(&tree), expected);
}

#[test]
fn matches_serde_on_primitives() {
    let parser = json_parser();
    for input in ["42", "-3.5", r#""hi""#, "false", "null", "[]", "{}"] {
        let tree = parse_json(&parser, input);
        let expected: SerdeValue = serde_json::from_str(input).expect("serde parses");
        assert_eq!(to_value(&tree), expected, "input {}", input);
    }
}

#[test]
fn rejects_with_position() {
    let parser = json_parser();
    let hooks: HookSet<SyntaxTree> =
        HookSet::new().with_fallback_node_hook(Rc::new(TreeBuilder::new(parser.grammar().clone())));
    let input = r#"{"a": }"#;
    let err = parser
        .parse_text("json", input, &hooks, &ParseOptions::new())
        .expect_err("must not parse");
    assert!(err.pointer < input.len());
    assert!(err.message.contains('}'));
}
