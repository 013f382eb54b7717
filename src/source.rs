use crate::{Position, Source, SourceQueue};
use once_cell::unsync::OnceCell;
use std::fmt::{Debug, Display, Formatter};
use std::rc::Rc;

impl Position {
    pub fn new(line: usize, column: usize) -> Self {
        Self { line, column }
    }
}

impl Display for Position {
    // Rendered inside error messages, so keep the compact editor form.
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.line, self.column)
    }
}

impl Source {
    /// Create a named source. CRLF and lone CR sequences are normalized to
    /// `\n` so position reporting and `$` style patterns see one newline form.
    pub fn new(name: &str, text: &str) -> Self {
        Self {
            name: name.to_string(),
            text: normalize(text),
            line_breaks: OnceCell::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn bytes(&self) -> &[u8] {
        self.text.as_bytes()
    }

    pub fn len(&self) -> usize {
        self.text.len()
    }

    pub fn is_empty(&self) -> bool {
        self.text.is_empty()
    }

    fn obtain_line_breaks(&self) -> &Vec<usize> {
        self.line_breaks.get_or_init(|| {
            self.text
                .bytes()
                .enumerate()
                .filter_map(|(index, b)| if b == b'\n' { Some(index) } else { None })
                .collect()
        })
    }

    /// Line and column of the byte offset `pointer`, both 1-based. Columns
    /// count characters, not bytes.
    pub fn position(&self, pointer: usize) -> Position {
        let line_breaks = self.obtain_line_breaks();
        let index = match line_breaks.binary_search(&pointer) {
            Ok(index) | Err(index) => index,
        };
        let line_start = if index == 0 {
            0
        } else {
            line_breaks[index - 1] + 1
        };
        let column = self.text[line_start..pointer].chars().count() + 1;
        Position::new(index + 1, column)
    }
}

impl Debug for Source {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Source")
            .field("name", &self.name)
            .field("len", &self.text.len())
            .finish()
    }
}

fn normalize(text: &str) -> String {
    if !text.contains('\r') {
        return text.to_string();
    }
    let mut normalized = String::with_capacity(text.len());
    let mut chars = text.chars().peekable();
    while let Some(c) = chars.next() {
        if c == '\r' {
            if chars.peek() == Some(&'\n') {
                chars.next();
            }
            normalized.push('\n');
        } else {
            normalized.push(c);
        }
    }
    normalized
}

impl SourceQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn append(&mut self, source: Rc<Source>) {
        self.sources.push(source);
    }

    pub fn pop(&mut self) -> Option<Rc<Source>> {
        if self.sources.is_empty() {
            None
        } else {
            Some(self.sources.remove(0))
        }
    }

    pub fn is_empty(&self) -> bool {
        self.sources.is_empty()
    }

    pub fn len(&self) -> usize {
        self.sources.len()
    }
}
