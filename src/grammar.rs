use crate::{flags, Grammar, MultiRule, Rule, ANY, EOF, FINAL, SAME};
use std::fmt::Write;

/// Outcome of a key lookup at a state: a single applicable rule, or the
/// candidate rule range of a multirule to be resolved by lookahead.
#[derive(Clone, Copy)]
pub(crate) enum RuleMatch {
    One(Rule),
    Multi(u32, u32),
}

impl Grammar {
    pub fn token_id(&self, name: &str) -> Option<i32> {
        self.tokens
            .iter()
            .position(|t| t.name == name)
            .map(|i| i as i32)
    }

    pub fn node_id(&self, name: &str) -> Option<usize> {
        self.nodes.iter().position(|n| n.name == name)
    }

    /// Display name of a token id, sentinels included.
    pub fn token_name(&self, id: i32) -> String {
        if id == EOF {
            return "end of input".to_string();
        }
        match self.tokens.get(id as usize) {
            Some(t) if t.flags & flags::LITERAL != 0 => format!("'{}'", t.name),
            Some(t) => format!("${}", t.name),
            None => format!("#{}", id),
        }
    }

    pub(crate) fn literal_of(&self, text: &[u8]) -> Option<i32> {
        self.literals.get(text)
    }

    /// Exact-key lookup in a state's sorted rule and multirule ranges.
    pub(crate) fn lookup(&self, state: usize, key: i32) -> Option<RuleMatch> {
        let st = &self.states[state];
        let rules = &self.rules[st.rules.0 as usize..st.rules.1 as usize];
        if let Ok(i) = rules.binary_search_by_key(&key, |r| r.key) {
            return Some(RuleMatch::One(rules[i]));
        }
        let multis = &self.multirules[st.multirules.0 as usize..st.multirules.1 as usize];
        if let Ok(i) = multis.binary_search_by_key(&key, |m| m.key) {
            return Some(RuleMatch::Multi(multis[i].low, multis[i].high));
        }
        None
    }

    pub(crate) fn candidates(&self, multi: &MultiRule) -> &[Rule] {
        &self.rules[multi.low as usize..multi.high as usize]
    }

    /// Verify the structural invariants the compiler promises: in-bounds
    /// table references, sorted disjoint key ranges, no empty state, and a
    /// path to [FINAL] from every node's first state.
    pub fn check(&self) -> Result<(), String> {
        if self.nodes.is_empty() {
            return Err("grammar has no nodes".to_string());
        }
        for node in &self.nodes {
            if node.first_state >= self.states.len() {
                return Err(format!("node '{}' first state out of bounds", node.name));
            }
            if !self.reaches_final(node.first_state) {
                return Err(format!("node '{}' cannot reach completion", node.name));
            }
        }
        for (s, st) in self.states.iter().enumerate() {
            let rules = &self.rules[st.rules.0 as usize..st.rules.1 as usize];
            let multis = &self.multirules[st.multirules.0 as usize..st.multirules.1 as usize];
            if rules.is_empty() && multis.is_empty() {
                return Err(format!("state {} has no rules", s));
            }
            if rules.windows(2).any(|w| w[0].key >= w[1].key) {
                return Err(format!("state {} rules are not sorted by key", s));
            }
            if multis.windows(2).any(|w| w[0].key >= w[1].key) {
                return Err(format!("state {} multirules are not sorted by key", s));
            }
            for m in multis {
                if rules.binary_search_by_key(&m.key, |r| r.key).is_ok() {
                    return Err(format!(
                        "state {} key {} appears in both rule and multirule ranges",
                        s, m.key
                    ));
                }
                if m.low >= m.high || m.high as usize > self.rules.len() {
                    return Err(format!("state {} has an empty multirule block", s));
                }
            }
            for rule in rules.iter().chain(multis.iter().flat_map(|m| self.candidates(m))) {
                if rule.state != FINAL && rule.state as usize >= self.states.len() {
                    return Err(format!("state {} rule targets a missing state", s));
                }
                if rule.node != SAME && rule.node as usize >= self.nodes.len() {
                    return Err(format!("state {} rule pushes a missing node", s));
                }
            }
        }
        Ok(())
    }

    fn reaches_final(&self, first_state: usize) -> bool {
        let mut visited = vec![false; self.states.len()];
        let mut pending = vec![first_state];
        while let Some(s) = pending.pop() {
            if visited[s] {
                continue;
            }
            visited[s] = true;
            for rule in self.state_rules(s) {
                if rule.state == FINAL {
                    return true;
                }
                pending.push(rule.state as usize);
            }
        }
        false
    }

    /// All rules dispatchable at a state, multirule candidates included.
    pub(crate) fn state_rules(&self, state: usize) -> impl Iterator<Item = Rule> + '_ {
        let st = self.states[state];
        let singles = self.rules[st.rules.0 as usize..st.rules.1 as usize].iter();
        let multis = self.multirules[st.multirules.0 as usize..st.multirules.1 as usize]
            .iter()
            .flat_map(|m| self.candidates(m));
        singles.chain(multis).copied()
    }

    /// Render the compiled tables in a readable form.
    pub fn dump(&self) -> Result<String, std::fmt::Error> {
        let mut writer = String::new();
        writeln!(writer, "tokens {{")?;
        for (i, t) in self.tokens.iter().enumerate() {
            let shown = if t.pattern.is_empty() {
                if t.flags & flags::LITERAL != 0 {
                    format!("{:?}", t.name)
                } else {
                    "extern".to_string()
                }
            } else {
                format!("/{}/", t.pattern.replace('/', "\\/"))
            };
            writeln!(writer, "{:>6}{} : {} ,", "", self.token_name(i as i32), shown)?;
        }
        writeln!(writer, "}}")?;
        for node in &self.nodes {
            writeln!(writer, "")?;
            writeln!(writer, "{} {{", node.name)?;
            let mut pending = vec![node.first_state];
            let mut visited = vec![false; self.states.len()];
            while let Some(s) = pending.pop() {
                if visited[s] {
                    continue;
                }
                visited[s] = true;
                let st = &self.states[s];
                writeln!(writer, "{:>4}s{} (group {}):", "", s, st.group)?;
                for rule in self.state_rules(s) {
                    writeln!(writer, "{:>8}{}", "", self.rule_text(&rule))?;
                    if rule.state != FINAL {
                        pending.push(rule.state as usize);
                    }
                }
            }
            writeln!(writer, "}}")?;
        }
        Ok(writer)
    }

    fn rule_text(&self, rule: &Rule) -> String {
        let key = if rule.key == ANY {
            "ANY".to_string()
        } else {
            self.token_name(rule.key)
        };
        let target = if rule.state == FINAL {
            "FINAL".to_string()
        } else {
            format!("s{}", rule.state)
        };
        if rule.node == SAME {
            format!("{} -> {}", key, target)
        } else {
            format!("{} -> {} push {}", key, target, self.nodes[rule.node as usize].name)
        }
    }
}
