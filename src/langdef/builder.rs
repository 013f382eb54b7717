use super::{DirectiveKind, Expr, LangDef};
use crate::grammar::RuleMatch;
use crate::{
    flags, BitSet, ByteMap, Grammar, GrammarError, MultiRule, NodeDef, Position, Rule, StateDef,
    TokenDef, ANY, EOF, FINAL, SAME,
};
use regex::bytes::Regex;
use std::collections::BTreeMap;

/// Lookahead window the static ambiguity check explores before declaring a
/// multirule unresolvable.
const STATIC_DEPTH: usize = 6;
/// Caps on simulated configurations, matching the runtime's bounds.
const MAX_SILENT_STEPS: usize = 64;
const MAX_FRONTIER: usize = 64;

pub(crate) fn build(definition: &LangDef) -> Result<Grammar, GrammarError> {
    Builder::new(definition).run()
}

/// A graph position of one nonterminal's expansion. Term and push edges
/// carry the source position of the expression that created them.
#[derive(Default)]
struct GPos {
    eps: Vec<usize>,
    terms: Vec<(i32, usize, usize, usize)>,
    pushes: Vec<(usize, usize, usize, usize)>,
    end: bool,
}

#[derive(Clone, Copy)]
struct ProtoRule {
    rule: Rule,
    line: usize,
    column: usize,
}

struct ProtoState {
    members: Vec<usize>,
    protos: Vec<ProtoRule>,
    group: i32,
}

struct Builder<'d> {
    definition: &'d LangDef,
    tokens: Vec<TokenDef>,
    token_names: ByteMap,
    nodes: Vec<NodeDef>,
    node_names: ByteMap,
    group_count: usize,
    positions: Vec<GPos>,
    starts: Vec<usize>,
    nullable: Vec<bool>,
    first: Vec<BitSet>,
    state_keys: BTreeMap<Vec<usize>, usize>,
    states: Vec<ProtoState>,
    worklist: Vec<usize>,
}

fn fail(line: usize, column: usize, message: String) -> GrammarError {
    GrammarError::new(Position::new(line, column), message)
}

impl<'d> Builder<'d> {
    fn new(definition: &'d LangDef) -> Self {
        Self {
            definition,
            tokens: Vec::new(),
            token_names: ByteMap::new(0),
            nodes: Vec::new(),
            node_names: ByteMap::new(0),
            group_count: 1,
            positions: Vec::new(),
            starts: Vec::new(),
            nullable: Vec::new(),
            first: Vec::new(),
            state_keys: BTreeMap::new(),
            states: Vec::new(),
            worklist: Vec::new(),
        }
    }

    fn run(mut self) -> Result<Grammar, GrammarError> {
        self.collect_tokens()?;
        self.check_patterns()?;
        self.assign_groups()?;
        self.collect_nodes()?;
        self.build_graphs()?;
        self.compute_nullability();
        self.check_left_recursion()?;
        self.compute_first();
        self.build_states();
        self.assign_state_groups()?;
        let (grammar, multi_origins) = self.emit()?;
        grammar
            .check()
            .map_err(|message| fail(1, 1, format!("table invariant violated: {}", message)))?;
        check_multirules(&grammar, &multi_origins)?;
        Ok(grammar)
    }

    // Token table: pattern-defined types first, then externals, then
    // literals; ids are indices into this order.
    fn collect_tokens(&mut self) -> Result<(), GrammarError> {
        let mut literal_uses: Vec<(String, usize, usize)> = Vec::new();
        for prod in &self.definition.prods {
            collect_literals(&prod.expr, &mut literal_uses);
        }
        for directive in &self.definition.directives {
            if matches!(directive.kind, DirectiveKind::Reserved | DirectiveKind::Group) {
                for text in &directive.literals {
                    literal_uses.push((text.clone(), directive.line, directive.column));
                }
            }
        }
        let extern_count: usize = self
            .definition
            .directives
            .iter()
            .filter(|d| d.kind == DirectiveKind::Extern)
            .map(|d| d.tokens.len())
            .sum();
        let capacity = self.definition.tokens.len() + extern_count + literal_uses.len();
        self.token_names = ByteMap::new(capacity);

        for decl in &self.definition.tokens {
            let key = type_key(&decl.name);
            if self.token_names.get(&key).is_some() {
                return Err(fail(
                    decl.line,
                    decl.column,
                    format!("token '${}' is declared twice", decl.name),
                ));
            }
            self.token_names.set(&key, self.tokens.len() as i32);
            self.tokens.push(TokenDef {
                name: decl.name.clone(),
                pattern: decl.pattern.clone(),
                groups: BitSet::new(),
                flags: 0,
            });
        }

        for directive in &self.definition.directives {
            if directive.kind != DirectiveKind::Extern {
                continue;
            }
            for name in &directive.tokens {
                let key = type_key(name);
                if self.token_names.get(&key).is_some() {
                    return Err(fail(
                        directive.line,
                        directive.column,
                        format!("token '${}' is already declared", name),
                    ));
                }
                self.token_names.set(&key, self.tokens.len() as i32);
                self.tokens.push(TokenDef {
                    name: name.clone(),
                    pattern: String::new(),
                    groups: BitSet::new(),
                    flags: flags::EXTERNAL,
                });
            }
        }

        for (text, _, _) in &literal_uses {
            let key = literal_key(text);
            if self.token_names.get(&key).is_none() {
                self.token_names.set(&key, self.tokens.len() as i32);
                self.tokens.push(TokenDef {
                    name: text.clone(),
                    pattern: String::new(),
                    groups: BitSet::new(),
                    flags: flags::LITERAL,
                });
            }
        }

        for directive in &self.definition.directives {
            let flag = match directive.kind {
                DirectiveKind::Aside => flags::ASIDE,
                DirectiveKind::Error => flags::ERROR,
                DirectiveKind::Shrink => flags::SHRINKABLE,
                DirectiveKind::Caseless => flags::CASELESS,
                DirectiveKind::NoLiterals => flags::NO_LITERALS,
                DirectiveKind::Reserved => {
                    for text in &directive.literals {
                        if let Some(id) = self.token_names.get(&literal_key(text)) {
                            self.tokens[id as usize].flags |= flags::RESERVED;
                        }
                    }
                    continue;
                }
                DirectiveKind::Extern | DirectiveKind::Group => continue,
            };
            for name in &directive.tokens {
                match self.token_names.get(&type_key(name)) {
                    Some(id) => self.tokens[id as usize].flags |= flag,
                    None => {
                        return Err(fail(
                            directive.line,
                            directive.column,
                            format!("token '${}' is not declared", name),
                        ));
                    }
                }
            }
        }
        Ok(())
    }

    fn check_patterns(&self) -> Result<(), GrammarError> {
        for decl in &self.definition.tokens {
            let compiled = Regex::new(&format!("^(?:{})", decl.pattern)).map_err(|err| {
                fail(
                    decl.line,
                    decl.column,
                    format!("pattern of '${}' is not a valid expression: {}", decl.name, err),
                )
            })?;
            if compiled.captures_len() > 1 {
                return Err(fail(
                    decl.line,
                    decl.column,
                    format!(
                        "pattern of '${}' must not contain capturing groups; use (?:...)",
                        decl.name
                    ),
                ));
            }
            if compiled.is_match(b"") {
                return Err(fail(
                    decl.line,
                    decl.column,
                    format!("pattern of '${}' must not match empty input", decl.name),
                ));
            }
        }
        Ok(())
    }

    // `!group` directives define groups in declaration order; tokens named
    // in none belong to every group.
    fn assign_groups(&mut self) -> Result<(), GrammarError> {
        let mut group_index = 0;
        for directive in &self.definition.directives {
            if directive.kind != DirectiveKind::Group {
                continue;
            }
            for name in &directive.tokens {
                match self.token_names.get(&type_key(name)) {
                    Some(id) => self.tokens[id as usize].groups.add(group_index),
                    None => {
                        return Err(fail(
                            directive.line,
                            directive.column,
                            format!("token '${}' is not declared", name),
                        ));
                    }
                }
            }
            for text in &directive.literals {
                if let Some(id) = self.token_names.get(&literal_key(text)) {
                    self.tokens[id as usize].groups.add(group_index);
                }
            }
            group_index += 1;
        }
        self.group_count = group_index.max(1);
        for token in &mut self.tokens {
            if token.groups.is_empty() {
                token.groups.add_all(0..self.group_count);
            }
        }
        Ok(())
    }

    fn collect_nodes(&mut self) -> Result<(), GrammarError> {
        if self.definition.prods.is_empty() {
            return Err(fail(1, 1, "grammar defines no productions".to_string()));
        }
        self.node_names = ByteMap::new(self.definition.prods.len());
        for prod in &self.definition.prods {
            if self.node_names.get(prod.name.as_bytes()).is_some() {
                return Err(fail(
                    prod.line,
                    prod.column,
                    format!("nonterminal '{}' is defined twice", prod.name),
                ));
            }
            self.node_names
                .set(prod.name.as_bytes(), self.nodes.len() as i32);
            self.nodes.push(NodeDef {
                name: prod.name.clone(),
                first_state: 0,
            });
        }
        Ok(())
    }

    fn new_pos(&mut self) -> usize {
        self.positions.push(GPos::default());
        self.positions.len() - 1
    }

    fn build_graphs(&mut self) -> Result<(), GrammarError> {
        for i in 0..self.definition.prods.len() {
            let start = self.new_pos();
            self.starts.push(start);
            let exit = self.build_expr(&self.definition.prods[i].expr, start)?;
            self.positions[exit].end = true;
        }
        Ok(())
    }

    fn build_expr(&mut self, expr: &Expr, from: usize) -> Result<usize, GrammarError> {
        match expr {
            Expr::Seq(items) => {
                let mut at = from;
                for item in items {
                    at = self.build_expr(item, at)?;
                }
                Ok(at)
            }
            Expr::Alt(branches) => {
                let join = self.new_pos();
                for branch in branches {
                    let exit = self.build_expr(branch, from)?;
                    self.positions[exit].eps.push(join);
                }
                Ok(join)
            }
            Expr::Opt(inner) => {
                let exit = self.build_expr(inner, from)?;
                self.positions[from].eps.push(exit);
                Ok(exit)
            }
            Expr::Rep(inner) => {
                let exit_inner = self.build_expr(inner, from)?;
                self.positions[exit_inner].eps.push(from);
                let exit = self.new_pos();
                self.positions[from].eps.push(exit);
                Ok(exit)
            }
            Expr::Literal(text, line, column) => {
                let id = match self.token_names.get(&literal_key(text)) {
                    Some(id) => id,
                    None => {
                        return Err(fail(
                            *line,
                            *column,
                            format!("literal '{}' was not collected", text),
                        ));
                    }
                };
                let to = self.new_pos();
                self.positions[from].terms.push((id, to, *line, *column));
                Ok(to)
            }
            Expr::Token(name, line, column) => {
                let id = match self.token_names.get(&type_key(name)) {
                    Some(id) => id,
                    None => {
                        return Err(fail(
                            *line,
                            *column,
                            format!("token '${}' is not declared", name),
                        ));
                    }
                };
                let token_flags = self.tokens[id as usize].flags;
                if token_flags & flags::ASIDE != 0 {
                    return Err(fail(
                        *line,
                        *column,
                        format!("aside token '${}' cannot appear in productions", name),
                    ));
                }
                if token_flags & flags::ERROR != 0 {
                    return Err(fail(
                        *line,
                        *column,
                        format!("error token '${}' cannot appear in productions", name),
                    ));
                }
                let to = self.new_pos();
                self.positions[from].terms.push((id, to, *line, *column));
                Ok(to)
            }
            Expr::Rule(name, line, column) => {
                let node = match self.node_names.get(name.as_bytes()) {
                    Some(node) => node as usize,
                    None => {
                        return Err(fail(
                            *line,
                            *column,
                            format!("nonterminal '{}' is not defined", name),
                        ));
                    }
                };
                let to = self.new_pos();
                self.positions[from].pushes.push((node, to, *line, *column));
                Ok(to)
            }
        }
    }

    /// Epsilon closure of a seed position; a push edge to a nullable node
    /// contributes its continuation.
    fn closure(&self, seed: usize, nullable: &[bool]) -> Vec<usize> {
        let mut visited = vec![false; self.positions.len()];
        let mut pending = vec![seed];
        let mut members = Vec::new();
        while let Some(p) = pending.pop() {
            if visited[p] {
                continue;
            }
            visited[p] = true;
            members.push(p);
            for next in &self.positions[p].eps {
                pending.push(*next);
            }
            for (node, to, _, _) in &self.positions[p].pushes {
                if nullable[*node] {
                    pending.push(*to);
                }
            }
        }
        members.sort_unstable();
        members
    }

    fn compute_nullability(&mut self) {
        self.nullable = vec![false; self.nodes.len()];
        loop {
            let mut changed = false;
            for ni in 0..self.nodes.len() {
                if self.nullable[ni] {
                    continue;
                }
                let closure = self.closure(self.starts[ni], &self.nullable);
                if closure.iter().any(|p| self.positions[*p].end) {
                    self.nullable[ni] = true;
                    changed = true;
                }
            }
            if !changed {
                break;
            }
        }
    }

    /// A node that can push itself before consuming anything would loop the
    /// runtime forever; reject the definition instead.
    fn check_left_recursion(&self) -> Result<(), GrammarError> {
        let heads: Vec<Vec<usize>> = (0..self.nodes.len())
            .map(|ni| {
                let mut pushed: Vec<usize> = self
                    .closure(self.starts[ni], &self.nullable)
                    .iter()
                    .flat_map(|p| self.positions[*p].pushes.iter().map(|(node, _, _, _)| *node))
                    .collect();
                pushed.sort_unstable();
                pushed.dedup();
                pushed
            })
            .collect();
        // 0 unvisited, 1 in progress, 2 finished
        let mut color = vec![0u8; self.nodes.len()];
        for ni in 0..self.nodes.len() {
            if color[ni] == 0 {
                self.left_recursion_dfs(ni, &heads, &mut color)?;
            }
        }
        Ok(())
    }

    fn left_recursion_dfs(
        &self,
        ni: usize,
        heads: &[Vec<usize>],
        color: &mut [u8],
    ) -> Result<(), GrammarError> {
        color[ni] = 1;
        for next in &heads[ni] {
            match color[*next] {
                1 => {
                    let prod = &self.definition.prods[*next];
                    return Err(fail(
                        prod.line,
                        prod.column,
                        format!("nonterminal '{}' is left recursive", prod.name),
                    ));
                }
                0 => self.left_recursion_dfs(*next, heads, color)?,
                _ => {}
            }
        }
        color[ni] = 2;
        Ok(())
    }

    fn compute_first(&mut self) {
        self.first = vec![BitSet::new(); self.nodes.len()];
        loop {
            let mut changed = false;
            for ni in 0..self.nodes.len() {
                let mut set = self.first[ni].clone();
                for p in self.closure(self.starts[ni], &self.nullable) {
                    for (key, _, _, _) in &self.positions[p].terms {
                        set.add(*key as usize);
                    }
                    for (node, _, _, _) in &self.positions[p].pushes {
                        set.union_with(&self.first[*node]);
                    }
                }
                if set != self.first[ni] {
                    self.first[ni] = set;
                    changed = true;
                }
            }
            if !changed {
                break;
            }
        }
    }

    /// Map a closure to its state: states are keyed by the closure's
    /// significant members (positions carrying edges or the end mark), so
    /// behaviorally identical closures share one state.
    fn state_of(&mut self, seed: usize) -> usize {
        let closure = self.closure(seed, &self.nullable);
        let members: Vec<usize> = closure
            .into_iter()
            .filter(|p| {
                let pos = &self.positions[*p];
                pos.end || !pos.terms.is_empty() || !pos.pushes.is_empty()
            })
            .collect();
        if let Some(existing) = self.state_keys.get(&members) {
            return *existing;
        }
        let index = self.states.len();
        self.state_keys.insert(members.clone(), index);
        self.states.push(ProtoState {
            members,
            protos: Vec::new(),
            group: 0,
        });
        self.worklist.push(index);
        index
    }

    fn build_states(&mut self) {
        for ni in 0..self.nodes.len() {
            let first_state = self.state_of(self.starts[ni]);
            self.nodes[ni].first_state = first_state;
        }
        while let Some(si) = self.worklist.pop() {
            let members = self.states[si].members.clone();
            let mut protos = Vec::new();
            for p in members {
                let terms = self.positions[p].terms.clone();
                for (key, to, line, column) in terms {
                    let target = self.state_of(to) as i32;
                    protos.push(ProtoRule {
                        rule: Rule {
                            key,
                            state: target,
                            node: SAME,
                        },
                        line,
                        column,
                    });
                }
                let pushes = self.positions[p].pushes.clone();
                for (node, to, line, column) in pushes {
                    let ret = self.state_of(to) as i32;
                    for key in self.first[node].iter().collect::<Vec<_>>() {
                        protos.push(ProtoRule {
                            rule: Rule {
                                key: key as i32,
                                state: ret,
                                node: node as i32,
                            },
                            line,
                            column,
                        });
                    }
                }
                if self.positions[p].end {
                    protos.push(ProtoRule {
                        rule: Rule {
                            key: ANY,
                            state: FINAL,
                            node: SAME,
                        },
                        line: 0,
                        column: 0,
                    });
                }
            }
            self.states[si].protos = protos;
        }
    }

    /// Every token acceptable at a state must share a group; the state
    /// adopts the lowest one.
    fn assign_state_groups(&mut self) -> Result<(), GrammarError> {
        for si in 0..self.states.len() {
            let keys: Vec<i32> = self.states[si]
                .protos
                .iter()
                .map(|p| p.rule.key)
                .filter(|k| *k >= 0)
                .collect();
            if keys.is_empty() {
                self.states[si].group = 0;
                continue;
            }
            let mut common: BitSet = (0..self.group_count).collect();
            for key in &keys {
                common.intersect_with(&self.tokens[*key as usize].groups);
            }
            let first = common.iter().next();
            match first {
                Some(group) => self.states[si].group = group as i32,
                None => {
                    let at = self.states[si]
                        .protos
                        .iter()
                        .find(|p| p.rule.key >= 0)
                        .map(|p| (p.line, p.column))
                        .unwrap_or((1, 1));
                    let names: Vec<String> = keys
                        .iter()
                        .map(|k| format!("${}", self.tokens[*k as usize].name))
                        .collect();
                    return Err(fail(
                        at.0,
                        at.1,
                        format!(
                            "tokens acceptable together belong to no common group: {}",
                            names.join(", ")
                        ),
                    ));
                }
            }
        }
        Ok(())
    }

    /// Flatten the proto states into the parallel tables. Same-key
    /// collisions become multirules; exact duplicates are rejected outright
    /// since no amount of lookahead separates identical rules.
    fn emit(self) -> Result<(Grammar, Vec<(usize, Position)>), GrammarError> {
        let mut rules: Vec<Rule> = Vec::new();
        let mut multirules: Vec<MultiRule> = Vec::new();
        let mut states: Vec<StateDef> = Vec::new();
        let mut multi_origins: Vec<(usize, Position)> = Vec::new();

        for proto_state in &self.states {
            let mut protos = proto_state.protos.clone();
            protos.sort_by_key(|p| p.rule.key);

            let mut singles: Vec<Rule> = Vec::new();
            let mut multis: Vec<(i32, Vec<ProtoRule>)> = Vec::new();
            let mut at = 0;
            while at < protos.len() {
                let key = protos[at].rule.key;
                let mut run_end = at + 1;
                while run_end < protos.len() && protos[run_end].rule.key == key {
                    run_end += 1;
                }
                let run = &protos[at..run_end];
                if run.len() == 1 {
                    singles.push(run[0].rule);
                } else {
                    for i in 0..run.len() {
                        for j in i + 1..run.len() {
                            if run[i].rule == run[j].rule {
                                return Err(fail(
                                    run[j].line.max(1),
                                    run[j].column.max(1),
                                    "ambiguous alternatives: indistinguishable derivations for \
                                     the same token"
                                        .to_string(),
                                ));
                            }
                        }
                    }
                    multis.push((key, run.to_vec()));
                }
                at = run_end;
            }

            let rule_start = rules.len() as u32;
            rules.extend(singles);
            let rule_end = rules.len() as u32;

            let multi_start = multirules.len() as u32;
            for (key, candidates) in multis {
                let low = rules.len() as u32;
                let origin = Position::new(candidates[0].line.max(1), candidates[0].column.max(1));
                rules.extend(candidates.iter().map(|p| p.rule));
                let high = rules.len() as u32;
                multi_origins.push((multirules.len(), origin));
                multirules.push(MultiRule { key, low, high });
            }
            let multi_end = multirules.len() as u32;

            states.push(StateDef {
                group: proto_state.group,
                rules: (rule_start, rule_end),
                multirules: (multi_start, multi_end),
            });
        }

        let literal_count = self
            .tokens
            .iter()
            .filter(|t| t.flags & flags::LITERAL != 0)
            .count();
        let mut literals = ByteMap::new(literal_count);
        for (id, token) in self.tokens.iter().enumerate() {
            if token.flags & flags::LITERAL != 0 {
                literals.set(token.name.as_bytes(), id as i32);
            }
        }

        let grammar = Grammar {
            tokens: self.tokens,
            nodes: self.nodes,
            states,
            rules,
            multirules,
            literals,
        };
        Ok((grammar, multi_origins))
    }
}

fn type_key(name: &str) -> Vec<u8> {
    let mut key = Vec::with_capacity(name.len() + 1);
    key.push(b'$');
    key.extend_from_slice(name.as_bytes());
    key
}

fn literal_key(text: &str) -> Vec<u8> {
    let mut key = Vec::with_capacity(text.len() + 1);
    key.push(b'\'');
    key.extend_from_slice(text.as_bytes());
    key
}

fn collect_literals(expr: &Expr, out: &mut Vec<(String, usize, usize)>) {
    match expr {
        Expr::Seq(items) | Expr::Alt(items) => {
            for item in items {
                collect_literals(item, out);
            }
        }
        Expr::Opt(inner) | Expr::Rep(inner) => collect_literals(inner, out),
        Expr::Literal(text, line, column) => out.push((text.clone(), *line, *column)),
        Expr::Token(_, _, _) | Expr::Rule(_, _, _) => {}
    }
}

/// A configuration of the static lookahead check: a stack snapshot plus the
/// accept-all mark once its root has popped.
#[derive(Clone)]
struct Cfg {
    stack: Vec<(usize, usize)>,
    done: bool,
}

fn sim_apply(grammar: &Grammar, cfg: &mut Cfg, rule: Rule) -> bool {
    if rule.node != SAME {
        if let Some(top) = cfg.stack.last_mut() {
            top.1 = rule.state as usize;
        }
        let node = rule.node as usize;
        cfg.stack.push((node, grammar.nodes[node].first_state));
        false
    } else if rule.state == FINAL {
        cfg.stack.pop();
        rule.key != ANY
    } else {
        if let Some(top) = cfg.stack.last_mut() {
            top.1 = rule.state as usize;
        }
        rule.key != ANY
    }
}

/// Advance a configuration until it consumes the abstract token `key`
/// ([EOF] included); dead configurations drop out.
fn sim_step(grammar: &Grammar, cfg: Cfg, key: i32) -> Vec<Cfg> {
    let mut consumed = Vec::new();
    let mut work = vec![cfg];
    let mut steps = 0;
    while let Some(mut c) = work.pop() {
        steps += 1;
        if steps > MAX_SILENT_STEPS {
            break;
        }
        if c.done {
            consumed.push(c);
            continue;
        }
        let state = match c.stack.last() {
            Some((_, state)) => *state,
            None => {
                if key == EOF {
                    c.done = true;
                    consumed.push(c);
                }
                continue;
            }
        };
        let found = if key >= 0 {
            grammar
                .lookup(state, key)
                .or_else(|| grammar.lookup(state, ANY))
        } else {
            grammar.lookup(state, ANY)
        };
        match found {
            None => {}
            Some(RuleMatch::One(rule)) => {
                if sim_apply(grammar, &mut c, rule) {
                    consumed.push(c);
                } else {
                    work.push(c);
                }
            }
            Some(RuleMatch::Multi(low, high)) => {
                for rule in &grammar.rules[low as usize..high as usize] {
                    let mut fork = c.clone();
                    if sim_apply(grammar, &mut fork, *rule) {
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

fn step_all(grammar: &Grammar, cfgs: &[Cfg], key: i32) -> Vec<Cfg> {
    cfgs.iter()
        .flat_map(|c| sim_step(grammar, c.clone(), key))
        .take(MAX_FRONTIER)
        .collect()
}

/// True when some token sequence of bounded length is accepted after one
/// candidate but not the other.
fn separable(grammar: &Grammar, a: Vec<Cfg>, b: Vec<Cfg>) -> bool {
    let token_count = grammar.tokens.len() as i32;
    let mut frontier = vec![(a, b)];
    for _ in 0..STATIC_DEPTH {
        let mut next = Vec::new();
        for (a, b) in frontier {
            for key in (0..token_count).chain([EOF]) {
                let a2 = step_all(grammar, &a, key);
                let b2 = step_all(grammar, &b, key);
                match (a2.is_empty(), b2.is_empty()) {
                    (true, true) => {}
                    (true, false) | (false, true) => return true,
                    (false, false) => {
                        if next.len() < MAX_FRONTIER {
                            next.push((a2, b2));
                        }
                    }
                }
            }
        }
        if next.is_empty() {
            return false;
        }
        frontier = next;
    }
    false
}

/// Compile-time gate for every emitted multirule: each candidate pair must
/// be separable within the bounded lookahead window.
fn check_multirules(
    grammar: &Grammar,
    multi_origins: &[(usize, Position)],
) -> Result<(), GrammarError> {
    for (mi, origin) in multi_origins {
        let multi = &grammar.multirules[*mi];
        let candidates = grammar.candidates(multi);
        let state = grammar
            .states
            .iter()
            .position(|st| (st.multirules.0 as usize..st.multirules.1 as usize).contains(mi))
            .unwrap_or(0);
        for i in 0..candidates.len() {
            for j in i + 1..candidates.len() {
                let seed = |rule: Rule| -> Vec<Cfg> {
                    let mut cfg = Cfg {
                        stack: vec![(0, state)],
                        done: false,
                    };
                    if sim_apply(grammar, &mut cfg, rule) {
                        vec![cfg]
                    } else {
                        sim_step(grammar, cfg, multi.key)
                    }
                };
                let a = seed(candidates[i]);
                let b = seed(candidates[j]);
                if !a.is_empty() && !b.is_empty() && !separable(grammar, a, b) {
                    return Err(GrammarError::new(
                        *origin,
                        format!(
                            "ambiguous alternatives: candidates for {} cannot be separated \
                             within {} tokens of lookahead",
                            grammar.token_name(multi.key),
                            STATIC_DEPTH
                        ),
                    ));
                }
            }
        }
    }
    Ok(())
}
