//! Language LL toolkit (lang_ll) is a library to build table-driven LL(*) parsers
//! from a grammar definition language and run them over streamed source text.
//!
//! # Overview
//! A parser built with a generator tool usually ships in two halves: a compiler that
//! turns a human-authored grammar into compact tables, and a runtime that walks those
//! tables over a token stream. This library keeps both halves in one crate.
//! The [langdef] module compiles a grammar definition (token declarations with regular
//! expressions, nonterminal productions with alternation, concatenation, optional and
//! repeated groups, literal strings and a handful of directives) into a [Grammar]:
//! five parallel tables of tokens, nodes, states, rules and multirules.
//! A [Parser] then drives a nondeterministic pushdown machine over those tables,
//! resolving ambiguous rules with bounded lookahead, shrinking tokens on demand,
//! restricting the lexer by token group, and reporting every failure with a source
//! position.
//!
//! The runtime does not impose a syntax-tree shape. Consumers register hooks:
//! a token hook may drop or rewrite tokens before dispatch, and a node hook builds an
//! application value for every nonterminal the machine enters. The value returned by
//! the root hook becomes the parse result. A generic [SyntaxTree] value together with
//! the [TreeBuilder] hook is provided for callers that just want a tree.
//!
//! # Example
//!
//! ```
//! use lang_ll::{langdef, HookSet, ParseOptions, Parser, Source, SourceQueue, SyntaxTree, TreeBuilder};
//! use std::rc::Rc;
//!
//! let grammar = Rc::new(
//!     langdef::compile(
//!         r#"
//!         ## token declarations
//!         $name = /[a-z]+/;
//!         $int  = /[0-9]+/;
//!         $eq   = /=/;
//!         $nl   = /\n/;
//!         $ws   = /[ \t]+/;
//!         !aside $ws;
//!
//!         ## productions; the first one is the entry nonterminal
//!         cfg   = {entry};
//!         entry = $name, $eq, value, $nl;
//!         value = $name | $int;
//!         "#,
//!     )
//!     .unwrap(),
//! );
//!
//! let parser = Parser::new(grammar.clone()).unwrap();
//! let hooks: HookSet<SyntaxTree> =
//!     HookSet::new().with_fallback_node_hook(Rc::new(TreeBuilder::new(grammar.clone())));
//!
//! let mut queue = SourceQueue::new();
//! queue.append(Rc::new(Source::new("conf", "a = 1\nb = two\n")));
//!
//! let tree = parser.parse(queue, &hooks, &ParseOptions::new()).unwrap();
//! assert_eq!(tree.name, "cfg");
//! assert_eq!(tree.children.len(), 2);
//! assert_eq!(tree.children[0].children[0].content.as_deref(), Some("a"));
//! ```
//!
//! # License
//! [lang_ll](crate) is provided under the MIT license.
mod bitset;
mod byte_map;
mod cancel;
mod error;
mod grammar;
mod hooks;
pub mod langdef;
mod layer;
mod lexeme;
mod lexer;
mod logger;
mod parser;
mod source;

#[cfg(test)]
mod __tests__;

use once_cell::unsync::OnceCell;
use regex::bytes::Regex;
use std::collections::HashMap;
use std::rc::Rc;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;

/// Rule key matching any token; such a rule applies without consuming.
pub const ANY: i32 = -1;
/// Rule target state popping the current stack frame.
pub const FINAL: i32 = -1;
/// Rule node value keeping the machine in the current node.
pub const SAME: i32 = -1;
/// Token id of the synthetic end-of-input lexeme.
pub const EOF: i32 = -2;
/// Index of the entry nonterminal in the node table.
pub const ROOT_NODE: usize = 0;

/// Bit flags carried by a [TokenDef].
pub mod flags {
    /// Matched by exact text rather than by pattern.
    pub const LITERAL: u8 = 1 << 0;
    /// Produced only by hooks or layers, never by the lexer.
    pub const EXTERNAL: u8 = 1 << 1;
    /// Filtered out of parser dispatch but still visible to token hooks.
    pub const ASIDE: u8 = 1 << 2;
    /// A match of this type surfaces a lexical error carrying the text.
    pub const ERROR: u8 = 1 << 3;
    /// The parser may trim the match one character at a time to find a rule.
    pub const SHRINKABLE: u8 = 1 << 4;
    /// Matched text is uppercased before literal comparison.
    pub const CASELESS: u8 = 1 << 5;
    /// A literal that suppresses fallback to the matched token type.
    pub const RESERVED: u8 = 1 << 6;
    /// A match of this type is never reclassified to a literal.
    pub const NO_LITERALS: u8 = 1 << 7;
}

#[derive(Debug, Clone)]
/// A growable set of non-negative integers backed by an array of machine words.
///
/// The set covers a half-open range whose bounds move to accommodate inserted
/// items. Equality compares content, not bounds: two sets are equal when their
/// overlapping range matches and every bit outside the overlap is zero.
pub struct BitSet {
    base: usize,
    words: Vec<u64>,
}

#[derive(Debug)]
/// A fixed-capacity map from byte slices to `i32`, open-addressed with
/// per-bucket chaining over a packed key arena.
///
/// The capacity is chosen at construction; inserting beyond it is a
/// programming error and panics. Empty keys are allowed.
pub struct ByteMap {
    buckets: Vec<i32>,
    entries: Vec<MapEntry>,
    arena: Vec<u8>,
    capacity: usize,
}

#[derive(Debug, Clone, Copy)]
struct MapEntry {
    key_start: u32,
    key_len: u32,
    value: i32,
    next: i32,
}

#[derive(Debug, Clone, Copy, Hash, PartialEq, Eq)]
/// A 1-based line and column pair, rendered as `line:column` wherever an
/// error carries a location.
pub struct Position {
    pub line: usize,
    pub column: usize,
}

/// A named unit of source text with newlines normalized to `\n` and a lazily
/// built line index for position reporting.
pub struct Source {
    name: String,
    text: String,
    line_breaks: OnceCell<Vec<usize>>,
}

#[derive(Default)]
/// An ordered queue of sources feeding the lexer. Hooks may append further
/// sources mid-parse; the lexer advances transparently when one is exhausted.
pub struct SourceQueue {
    sources: Vec<Rc<Source>>,
}

#[derive(Clone)]
/// A token instance produced by the lexer.
///
/// `token` is the effective id after literal reclassification; `base` is the
/// pattern-defined type that matched (or [EOF] for the synthetic terminator).
pub struct Lexeme {
    pub token: i32,
    pub base: i32,
    pub start: usize,
    pub end: usize,
    pub source: Rc<Source>,
}

/// One step of a token feed: a token for the parser, or an aside token that
/// bypasses dispatch. End of input arrives as a `Token` whose id is [EOF].
pub enum TokenStep {
    Token(Lexeme),
    Aside(Lexeme),
}

#[derive(Debug, Clone)]
/// Compile-time description of a token class.
pub struct TokenDef {
    /// Type name for a pattern-defined class, exact text for a literal.
    pub name: String,
    /// RE2-style pattern; empty for literals and external tokens.
    pub pattern: String,
    /// Token groups this type may appear in.
    pub groups: BitSet,
    /// Bit-or of the [flags] constants.
    pub flags: u8,
}

#[derive(Debug, Clone)]
/// A nonterminal. The entry nonterminal has index [ROOT_NODE].
pub struct NodeDef {
    pub name: String,
    pub first_state: usize,
}

#[derive(Debug, Clone, Copy)]
/// A parser state: the active token group plus half-open index ranges into
/// the rule and multirule tables, each sorted by key token.
pub struct StateDef {
    pub group: i32,
    pub rules: (u32, u32),
    pub multirules: (u32, u32),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
/// A transition: on `key` (a token id or [ANY]) go to `state` (a state index
/// or [FINAL]) pushing `node` (a node index or [SAME]).
pub struct Rule {
    pub key: i32,
    pub state: i32,
    pub node: i32,
}

#[derive(Debug, Clone, Copy)]
/// An ambiguous key resolving to the candidate rules at indices `low..high`;
/// the parser runs lookahead to pick one.
pub struct MultiRule {
    pub key: i32,
    pub low: u32,
    pub high: u32,
}

/// A compiled grammar: five parallel tables plus the literal lookup map.
/// Immutable after compilation and shareable between parsers.
#[derive(Debug)]
pub struct Grammar {
    pub tokens: Vec<TokenDef>,
    pub nodes: Vec<NodeDef>,
    pub states: Vec<StateDef>,
    pub rules: Vec<Rule>,
    pub multirules: Vec<MultiRule>,
    pub(crate) literals: ByteMap,
}

#[derive(Debug)]
/// An error raised while compiling a grammar definition: DSL parse failure,
/// undefined or duplicated name, bad pattern, unresolvable ambiguity, group
/// conflict. Carries the position in the grammar source.
pub struct GrammarError {
    pub position: Position,
    pub message: String,
}

#[derive(Debug)]
/// An error raised while constructing a [Parser] from a compiled grammar.
pub struct BuildError {
    pub what: String,
    pub message: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
/// The kind of a [ParseError].
pub enum ParseErrorKind {
    /// No token pattern matched, or an error-flagged token matched.
    Lexical,
    /// No rule applied to the current token, or leftover input after the
    /// root completed under full-source parsing.
    Syntax,
    /// Input ended in a state that required another token.
    UnexpectedEof,
    /// More than one multirule candidate survived bounded lookahead.
    Ambiguous,
    /// The caller tripped the [CancelToken].
    Cancelled,
    /// A hook reported an error; the message is propagated verbatim.
    Hook,
}

#[derive(Debug)]
/// An error returned when a parse fails. `pointer` is the byte offset into
/// the named source; `position` the derived line and column.
pub struct ParseError {
    pub kind: ParseErrorKind,
    pub source: String,
    pub pointer: usize,
    pub position: Position,
    pub message: String,
}

/// The minimal token-source contract between the lexer and the parser.
///
/// [Lexer] implements this directly; a layer wraps one feed into another to
/// pre-process the stream (injecting external tokens, reordering, filtering).
pub trait ITokenFeed {
    /// Produce the next step under the given token group, advancing the feed.
    fn next(&mut self, group: i32) -> Result<TokenStep, ParseError>;

    /// Trim one trailing character from a previously delivered lexeme and
    /// re-deliver the shorter form, rewinding the feed to its end. Returns
    /// [None] once the text cannot shrink further.
    fn shrink(&mut self, lexeme: &Lexeme, group: i32) -> Option<Lexeme>;

    /// Queue another source after the ones already pending.
    fn append(&mut self, source: Rc<Source>);
}

/// A token-stream pre-processor inserted between the lexer and the parser.
pub trait ILayer {
    fn wrap<'p>(&self, feed: Box<dyn ITokenFeed + 'p>) -> Box<dyn ITokenFeed + 'p>;
}

#[derive(Default)]
/// A locally-owned name-to-layer table. Parsers consult it when a parse
/// selects a layer by name; there is no process-wide registry.
pub struct LayerRegistry {
    layers: HashMap<String, Rc<dyn ILayer>>,
}

/// The streaming tokenizer: matches the grammar's token patterns at the
/// cursor under the active group, reclassifies literals, delivers aside
/// tokens out of band and shrinks tokens on parser request.
pub struct Lexer {
    grammar: Rc<Grammar>,
    automata: Rc<[Option<Regex>]>,
    queue: SourceQueue,
    sources: Vec<Rc<Source>>,
    src_idx: usize,
    cursor: usize,
}

#[derive(Clone, Default)]
/// A cheap clonable cancellation flag checked at every token boundary.
/// Trip it from another thread or from a hook to abort the parse.
pub struct CancelToken {
    flag: Arc<AtomicBool>,
}

/// The verdict of a token hook: whether the token reaches the parser, plus
/// any extra tokens to inject into the stream right after it.
pub struct TokenJudgment {
    pub emit: bool,
    pub extra: Vec<Lexeme>,
}

/// Carried into every hook invocation: lets hooks splice additional sources
/// into the queue and reach the parse's cancellation token.
pub struct ParseContext {
    appended: Vec<Rc<Source>>,
    cancel: CancelToken,
}

/// Observes every non-synthetic token in source order before dispatch,
/// aside tokens included. Keyed by token id or registered as the catch-all.
pub trait ITokenHook {
    fn handle_token(
        &self,
        lexeme: &Lexeme,
        ctx: &mut ParseContext,
    ) -> Result<TokenJudgment, ParseError>;
}

/// Creates a hook instance whenever the machine pushes a nonterminal.
/// Keyed by node name or registered as the catch-all.
pub trait INodeHook<TVal> {
    fn begin_node(
        &self,
        node: &str,
        lexeme: Option<&Lexeme>,
        ctx: &mut ParseContext,
    ) -> Box<dyn INodeInstance<TVal>>;
}

/// The per-frame receiver of parse events. `end_node` returns the value that
/// becomes the parse result for the root, or the argument to the parent
/// instance's `handle_child` otherwise.
pub trait INodeInstance<TVal> {
    fn handle_token(&mut self, lexeme: &Lexeme) -> Result<(), ParseError>;
    fn handle_child(&mut self, node: &str, child: TVal) -> Result<(), ParseError>;
    fn end_node(&mut self) -> Result<TVal, ParseError>;
}

/// The hook tables for one parse: token hooks keyed by token id and node
/// hooks keyed by node name, each with an optional catch-all. Nodes without
/// a hook get a silent instance producing `TVal::default()`.
pub struct HookSet<TVal> {
    token_hooks: HashMap<i32, Rc<dyn ITokenHook>>,
    fallback_token_hook: Option<Rc<dyn ITokenHook>>,
    node_hooks: HashMap<String, Rc<dyn INodeHook<TVal>>>,
    fallback_node_hook: Option<Rc<dyn INodeHook<TVal>>>,
}

#[derive(Clone)]
/// Per-parse options: full-source consumption, layer selection, cancellation
/// and the lookahead depth bound.
pub struct ParseOptions {
    pub(crate) full_source: bool,
    pub(crate) layer: Option<Rc<dyn ILayer>>,
    pub(crate) cancel: CancelToken,
    pub(crate) lookahead_depth: usize,
}

/// A reusable parse engine for one compiled [Grammar]. Owns the compiled
/// token automata; read-only after construction, so a single instance may
/// serve any number of sequential parses.
#[derive(Debug)]
pub struct Parser {
    grammar: Rc<Grammar>,
    automata: Rc<[Option<Regex>]>,
    log: OnceCell<Log<&'static str>>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
/// A generic syntax tree, the default application value for callers that do
/// not bring their own node hooks. Token leaves carry their text.
pub struct SyntaxTree {
    pub name: String,
    pub start: usize,
    pub end: usize,
    pub content: Option<String>,
    pub children: Vec<SyntaxTree>,
}

/// The default node hook: builds one [SyntaxTree] per nonterminal with token
/// leaves named after their token definitions.
pub struct TreeBuilder {
    grammar: Rc<Grammar>,
}

#[derive(Debug, PartialEq, Eq, Clone, Copy)]
/// Debug tracing for a parser, labeled so interleaved parses stay readable.
/// `Rules` traces every rule application; `Tokens` additionally traces each
/// dispatched token. Builds without `debug_assertions` trace nothing.
pub enum Log<T> {
    None,
    Rules(T),
    Tokens(T),
}
