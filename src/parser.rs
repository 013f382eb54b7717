use crate::grammar::RuleMatch;
use crate::{
    flags, BuildError, CancelToken, Grammar, HookSet, ILayer, INodeInstance, ITokenFeed, Lexeme,
    Lexer, Log, ParseContext, ParseError, ParseErrorKind, ParseOptions, Parser, Rule, Source,
    SourceQueue, TokenStep, ANY, FINAL, ROOT_NODE, SAME,
};
use once_cell::unsync::OnceCell;
use regex::bytes::Regex;
use std::rc::Rc;

/// Lookahead window used when a grammar leaves the depth unspecified.
const DEFAULT_LOOKAHEAD_DEPTH: usize = 8;

/// Cap on non-consuming push/pop steps a simulated branch may take per
/// observed token. Left recursion is rejected at compile time, so hitting
/// this kills a runaway branch rather than the parse.
const MAX_SILENT_STEPS: usize = 64;

impl ParseOptions {
    pub fn new() -> Self {
        Self {
            full_source: true,
            layer: None,
            cancel: CancelToken::new(),
            lookahead_depth: DEFAULT_LOOKAHEAD_DEPTH,
        }
    }

    /// Accept leftover input once the entry nonterminal completes.
    pub fn allow_residue(mut self) -> Self {
        self.full_source = false;
        self
    }

    /// Pre-process the token stream through the given layer.
    pub fn with_layer(mut self, layer: Rc<dyn ILayer>) -> Self {
        self.layer = Some(layer);
        self
    }

    pub fn with_cancel(mut self, cancel: CancelToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn with_lookahead_depth(mut self, depth: usize) -> Self {
        self.lookahead_depth = depth.max(1);
        self
    }
}

impl Default for ParseOptions {
    fn default() -> Self {
        Self::new()
    }
}

impl Parser {
    /// Compile the grammar's token patterns into anchored automata and
    /// verify the table invariants.
    pub fn new(grammar: Rc<Grammar>) -> Result<Self, BuildError> {
        grammar
            .check()
            .map_err(|message| BuildError::new("grammar".to_string(), message))?;
        let mut automata: Vec<Option<Regex>> = Vec::with_capacity(grammar.tokens.len());
        for token in &grammar.tokens {
            if token.pattern.is_empty() {
                automata.push(None);
            } else {
                let automaton =
                    Regex::new(&format!("^(?:{})", token.pattern)).map_err(|err| {
                        BuildError::new(
                            format!("${}", token.name),
                            format!("pattern failed to compile: {:?}", err),
                        )
                    })?;
                automata.push(Some(automaton));
            }
        }
        Ok(Self {
            grammar,
            automata: automata.into(),
            log: OnceCell::new(),
        })
    }

    pub fn grammar(&self) -> &Rc<Grammar> {
        &self.grammar
    }

    /// Set a log label to debug the parser.
    /// Based on the level of the [Log], the parser will print dispatch events.
    pub fn set_log(&self, log: Log<&'static str>) -> Result<(), String> {
        self.log.set(log).map_err(|rejected| {
            format!(
                "Log label {} is already assigned.",
                rejected.rule_label().map_or("", |label| label)
            )
        })
    }

    /// Run the machine over the queued sources. The value returned by the
    /// root hook instance becomes the parse result.
    pub fn parse<TVal: Default + 'static>(
        &self,
        queue: SourceQueue,
        hooks: &HookSet<TVal>,
        options: &ParseOptions,
    ) -> Result<TVal, ParseError> {
        let lexer = Lexer::new(self.grammar.clone(), self.automata.clone(), queue);
        let mut feed: Box<dyn ITokenFeed> = Box::new(lexer);
        if let Some(layer) = &options.layer {
            feed = layer.wrap(feed);
        }
        let mut session = Session {
            grammar: &self.grammar,
            feed,
            hooks,
            options,
            buffer: Vec::new(),
            stack: Vec::new(),
            log: self.log.get().copied().unwrap_or(Log::None),
        };
        session.run()
    }

    /// Convenience over [parse](Parser::parse) for a single in-memory text.
    pub fn parse_text<TVal: Default + 'static>(
        &self,
        name: &str,
        text: &str,
        hooks: &HookSet<TVal>,
        options: &ParseOptions,
    ) -> Result<TVal, ParseError> {
        let mut queue = SourceQueue::new();
        queue.append(Rc::new(Source::new(name, text)));
        self.parse(queue, hooks, options)
    }
}

struct Frame<TVal> {
    node: usize,
    state: usize,
    hook: Box<dyn INodeInstance<TVal>>,
}

enum Flow<TVal> {
    Continue,
    Done(TVal),
}

/// A stack snapshot advanced during multirule lookahead. `done` marks a
/// branch whose root already popped; it accepts any further input.
#[derive(Clone)]
struct SimBranch {
    stack: Vec<(usize, usize)>,
    done: bool,
}

struct Session<'p, TVal> {
    grammar: &'p Grammar,
    feed: Box<dyn ITokenFeed + 'p>,
    hooks: &'p HookSet<TVal>,
    options: &'p ParseOptions,
    buffer: Vec<Lexeme>,
    stack: Vec<Frame<TVal>>,
    log: Log<&'static str>,
}

impl<'p, TVal: Default + 'static> Session<'p, TVal> {
    fn run(&mut self) -> Result<TVal, ParseError> {
        let root_name = self.grammar.nodes[ROOT_NODE].name.clone();
        let mut ctx = ParseContext::new(self.options.cancel.clone());
        let hook = self.hooks.begin_node(&root_name, None, &mut ctx);
        self.drain_ctx(ctx);
        self.stack.push(Frame {
            node: ROOT_NODE,
            state: self.grammar.nodes[ROOT_NODE].first_state,
            hook,
        });

        loop {
            let group = self.active_group();
            let lexeme = self.fill(0, group)?.clone();
            if self.options.cancel.is_cancelled() {
                return Err(ParseError::at(
                    ParseErrorKind::Cancelled,
                    &lexeme,
                    "parse cancelled".to_string(),
                ));
            }
            self.log_dispatch(&lexeme);
            match self.dispatch(lexeme)? {
                Flow::Continue => {}
                Flow::Done(value) => return Ok(value),
            }
        }
    }

    fn active_group(&self) -> i32 {
        match self.stack.last() {
            Some(frame) => self.grammar.states[frame.state].group,
            None => 0,
        }
    }

    /// Ensure `buffer[index]` is present, pulling from the feed under
    /// `group`. Token hooks fire here, once per observed token in source
    /// order; aside tokens reach hooks but never enter the buffer.
    fn fill(&mut self, index: usize, group: i32) -> Result<&Lexeme, ParseError> {
        while self.buffer.len() <= index {
            match self.feed.next(group)? {
                TokenStep::Aside(lexeme) => {
                    // Asides never reach dispatch; only hook extras inject.
                    if let Some(judgment) = self.offer(&lexeme)? {
                        self.buffer.extend(judgment.extra);
                    }
                }
                TokenStep::Token(lexeme) => {
                    if lexeme.is_eof() {
                        self.buffer.push(lexeme);
                        continue;
                    }
                    match self.offer(&lexeme)? {
                        Some(judgment) => {
                            if judgment.emit {
                                self.buffer.push(lexeme);
                            }
                            self.buffer.extend(judgment.extra);
                        }
                        None => self.buffer.push(lexeme),
                    }
                }
            }
        }
        Ok(&self.buffer[index])
    }

    /// Offer a token to its hook, if one is registered for its type.
    fn offer(&mut self, lexeme: &Lexeme) -> Result<Option<crate::TokenJudgment>, ParseError> {
        let hook = match self.hooks.token_hook(lexeme.token) {
            Some(hook) => hook.clone(),
            None => return Ok(None),
        };
        let mut ctx = ParseContext::new(self.options.cancel.clone());
        let judgment = hook.handle_token(lexeme, &mut ctx)?;
        self.drain_ctx(ctx);
        Ok(Some(judgment))
    }

    fn drain_ctx(&mut self, mut ctx: ParseContext) {
        for source in ctx.take_appended() {
            self.feed.append(source);
        }
    }

    fn dispatch(&mut self, lexeme: Lexeme) -> Result<Flow<TVal>, ParseError> {
        let state = match self.stack.last() {
            Some(frame) => frame.state,
            None => {
                return Err(ParseError::at(
                    ParseErrorKind::Syntax,
                    &lexeme,
                    "dispatch on an empty stack".to_string(),
                ))
            }
        };
        let mut lexeme = lexeme;
        let mut found = self.find_match(state, &lexeme);

        // Shrinkable dispatch: trim the token one character at a time until
        // some rule accepts it.
        if found.is_none()
            && lexeme.base >= 0
            && self.grammar.tokens[lexeme.base as usize].flags & flags::SHRINKABLE != 0
        {
            let group = self.grammar.states[state].group;
            self.buffer.truncate(1);
            while found.is_none() {
                match self.feed.shrink(&lexeme, group) {
                    Some(shorter) => {
                        self.buffer[0] = shorter.clone();
                        found = self.find_match(state, &shorter);
                        lexeme = shorter;
                    }
                    None => break,
                }
            }
        }

        match found {
            Some(RuleMatch::One(rule)) => self.apply(rule, &lexeme),
            Some(RuleMatch::Multi(low, high)) => {
                let rule = self.resolve(low, high, &lexeme)?;
                self.apply(rule, &lexeme)
            }
            None => {
                if lexeme.is_eof() {
                    Err(ParseError::at(
                        ParseErrorKind::UnexpectedEof,
                        &lexeme,
                        "unexpected end of input".to_string(),
                    ))
                } else {
                    Err(ParseError::at(
                        ParseErrorKind::Syntax,
                        &lexeme,
                        format!(
                            "unexpected {} '{}'",
                            self.grammar.token_name(lexeme.token),
                            lexeme.content()
                        ),
                    ))
                }
            }
        }
    }

    /// Rule lookup with the dispatch priority: literal id first, then the
    /// matched type unless the text names a reserved literal, then [ANY].
    fn find_match(&self, state: usize, lexeme: &Lexeme) -> Option<RuleMatch> {
        if lexeme.token != lexeme.base {
            if let Some(m) = self.grammar.lookup(state, lexeme.token) {
                return Some(m);
            }
            let reserved =
                self.grammar.tokens[lexeme.token as usize].flags & flags::RESERVED != 0;
            if !reserved {
                if let Some(m) = self.grammar.lookup(state, lexeme.base) {
                    return Some(m);
                }
            }
        } else if lexeme.token >= 0 {
            if let Some(m) = self.grammar.lookup(state, lexeme.token) {
                return Some(m);
            }
        }
        self.grammar.lookup(state, ANY)
    }

    fn apply(&mut self, rule: Rule, lexeme: &Lexeme) -> Result<Flow<TVal>, ParseError> {
        self.log_apply(&rule, lexeme);
        if rule.node != SAME {
            // Push: the pushed node takes over without consuming the token.
            let node = rule.node as usize;
            if let Some(frame) = self.stack.last_mut() {
                frame.state = rule.state as usize;
            }
            let name = self.grammar.nodes[node].name.clone();
            let mut ctx = ParseContext::new(self.options.cancel.clone());
            let hook = self.hooks.begin_node(&name, Some(lexeme), &mut ctx);
            self.drain_ctx(ctx);
            self.stack.push(Frame {
                node,
                state: self.grammar.nodes[node].first_state,
                hook,
            });
            return Ok(Flow::Continue);
        }

        if rule.state == FINAL {
            let mut frame = self.stack.pop().expect("pop on an empty stack");
            let name = self.grammar.nodes[frame.node].name.clone();
            let value = frame.hook.end_node()?;
            return match self.stack.last_mut() {
                Some(parent) => {
                    parent.hook.handle_child(&name, value)?;
                    if rule.key != ANY {
                        let consumed = self.buffer.remove(0);
                        if let Some(top) = self.stack.last_mut() {
                            top.hook.handle_token(&consumed)?;
                        }
                    }
                    Ok(Flow::Continue)
                }
                None => {
                    if rule.key != ANY {
                        self.buffer.remove(0);
                    }
                    if self.options.full_source {
                        let group = 0;
                        let next = self.fill(0, group)?;
                        if !next.is_eof() {
                            let next = next.clone();
                            return Err(ParseError::at(
                                ParseErrorKind::Syntax,
                                &next,
                                format!("unexpected input after '{}' completed", name),
                            ));
                        }
                    }
                    Ok(Flow::Done(value))
                }
            };
        }

        // Advance within the current node.
        if let Some(frame) = self.stack.last_mut() {
            frame.state = rule.state as usize;
        }
        if rule.key != ANY {
            let consumed = self.buffer.remove(0);
            if let Some(top) = self.stack.last_mut() {
                top.hook.handle_token(&consumed)?;
            }
        }
        Ok(Flow::Continue)
    }

    /// Multirule resolution: speculatively advance every candidate over the
    /// buffered tokens, without hook dispatch, until one survives.
    fn resolve(&mut self, low: u32, high: u32, lexeme: &Lexeme) -> Result<Rule, ParseError> {
        let candidates: Vec<Rule> = self.grammar.rules[low as usize..high as usize].to_vec();
        let snapshot: Vec<(usize, usize)> =
            self.stack.iter().map(|f| (f.node, f.state)).collect();

        let mut alive: Vec<(Rule, Vec<SimBranch>)> = Vec::with_capacity(candidates.len());
        for candidate in candidates {
            let mut branch = SimBranch {
                stack: snapshot.clone(),
                done: false,
            };
            let branches = if self.apply_sim(&mut branch, candidate) {
                vec![branch]
            } else {
                self.step_branch(branch, lexeme)
            };
            if !branches.is_empty() {
                alive.push((candidate, branches));
            }
        }

        for depth in 1..=self.options.lookahead_depth {
            match alive.len() {
                0 => break,
                1 => return Ok(alive[0].0),
                _ => {}
            }
            if alive
                .iter()
                .all(|(_, branches)| branches.iter().all(|b| b.done))
            {
                // Every survivor accepts the rest of the input; no further
                // token can discriminate.
                break;
            }
            let group = alive
                .iter()
                .flat_map(|(_, branches)| branches.iter())
                .find_map(|b| b.stack.last().map(|(_, s)| self.grammar.states[*s].group))
                .unwrap_or(0);
            let token = self.fill(depth, group)?.clone();
            for (_, branches) in alive.iter_mut() {
                let stepped: Vec<SimBranch> = branches
                    .drain(..)
                    .flat_map(|b| self.step_branch(b, &token))
                    .collect();
                *branches = stepped;
            }
            alive.retain(|(_, branches)| !branches.is_empty());
        }

        match alive.len() {
            0 => Err(ParseError::at(
                ParseErrorKind::Syntax,
                lexeme,
                format!(
                    "unexpected {} '{}'",
                    self.grammar.token_name(lexeme.token),
                    lexeme.content()
                ),
            )),
            1 => Ok(alive[0].0),
            n => Err(ParseError::at(
                ParseErrorKind::Ambiguous,
                lexeme,
                format!(
                    "ambiguous input: {} interpretations survive {} tokens of lookahead",
                    n, self.options.lookahead_depth
                ),
            )),
        }
    }

    /// Apply one rule to a simulated stack. Returns true when the rule
    /// consumed the observed token.
    fn apply_sim(&self, branch: &mut SimBranch, rule: Rule) -> bool {
        if rule.node != SAME {
            if let Some(top) = branch.stack.last_mut() {
                top.1 = rule.state as usize;
            }
            let node = rule.node as usize;
            branch
                .stack
                .push((node, self.grammar.nodes[node].first_state));
            false
        } else if rule.state == FINAL {
            branch.stack.pop();
            rule.key != ANY
        } else {
            if let Some(top) = branch.stack.last_mut() {
                top.1 = rule.state as usize;
            }
            rule.key != ANY
        }
    }

    /// Advance a branch until it consumes `lexeme`, forking on nested
    /// multirules. Branches that cannot accept the token die off.
    fn step_branch(&self, branch: SimBranch, lexeme: &Lexeme) -> Vec<SimBranch> {
        let mut consumed = Vec::new();
        let mut work = vec![branch];
        let mut steps = 0;
        while let Some(mut b) = work.pop() {
            steps += 1;
            if steps > MAX_SILENT_STEPS {
                break;
            }
            if b.done {
                consumed.push(b);
                continue;
            }
            let state = match b.stack.last() {
                Some((_, state)) => *state,
                None => {
                    // Root popped during simulation: survives only when the
                    // rest of the input may legally follow.
                    if lexeme.is_eof() || !self.options.full_source {
                        b.done = true;
                        consumed.push(b);
                    }
                    continue;
                }
            };
            match self.find_match(state, lexeme) {
                None => {}
                Some(RuleMatch::One(rule)) => {
                    if self.apply_sim(&mut b, rule) {
                        consumed.push(b);
                    } else {
                        work.push(b);
                    }
                }
                Some(RuleMatch::Multi(low, high)) => {
                    for rule in &self.grammar.rules[low as usize..high as usize] {
                        let mut fork = b.clone();
                        if self.apply_sim(&mut fork, *rule) {
                            consumed.push(fork);
                        } else {
                            work.push(fork);
                        }
                    }
                }
            }
        }
        consumed
    }

    fn log_dispatch(&self, _lexeme: &Lexeme) {
        #[cfg(debug_assertions)]
        if let Some(label) = self.log.token_label() {
            println!(
                "[{}] token {} '{}' at {}",
                label,
                self.grammar.token_name(_lexeme.token),
                _lexeme.content(),
                _lexeme.position()
            );
        }
    }

    fn log_apply(&self, _rule: &Rule, _lexeme: &Lexeme) {
        #[cfg(debug_assertions)]
        if let Some(label) = self.log.rule_label() {
            let node = match self.stack.last() {
                Some(frame) => self.grammar.nodes[frame.node].name.as_str(),
                None => "?",
            };
            println!(
                "[{}] {} applies key {} state {} node {}",
                label, node, _rule.key, _rule.state, _rule.node
            );
        }
    }
}
