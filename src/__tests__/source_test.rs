use crate::{Position, Source, SourceQueue};
use std::rc::Rc;

#[test]
fn normalizes_newlines() {
    let source = Source::new("s", "a\r\nb\rc\nd");
    assert_eq!(source.text(), "a\nb\nc\nd");
}

#[test]
fn positions_are_one_based() {
    let source = Source::new("s", "ab\ncde\n");
    assert_eq!(source.position(0), Position::new(1, 1));
    assert_eq!(source.position(1), Position::new(1, 2));
    assert_eq!(source.position(3), Position::new(2, 1));
    assert_eq!(source.position(5), Position::new(2, 3));
    // Offset just past the final newline starts line 3.
    assert_eq!(source.position(7), Position::new(3, 1));
}

#[test]
fn position_counts_characters_not_bytes() {
    let source = Source::new("s", "äöü x");
    // 'x' sits at byte offset 7 but is the fifth character.
    assert_eq!(source.position(7), Position::new(1, 5));
}

#[test]
fn queue_is_fifo() {
    let mut queue = SourceQueue::new();
    assert!(queue.is_empty());
    queue.append(Rc::new(Source::new("a", "1")));
    queue.append(Rc::new(Source::new("b", "2")));
    assert_eq!(queue.len(), 2);
    assert_eq!(queue.pop().map(|s| s.name().to_string()), Some("a".into()));
    assert_eq!(queue.pop().map(|s| s.name().to_string()), Some("b".into()));
    assert!(queue.pop().is_none());
}
