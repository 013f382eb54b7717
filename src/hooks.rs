use crate::{
    CancelToken, Grammar, HookSet, INodeHook, INodeInstance, ITokenHook, Lexeme, ParseContext,
    ParseError, Source, SyntaxTree, TokenJudgment, TreeBuilder,
};
use ptree::TreeItem;
use std::collections::HashMap;
use std::marker::PhantomData;
use std::rc::Rc;

impl TokenJudgment {
    /// Pass the token through unchanged.
    pub fn emit() -> Self {
        Self {
            emit: true,
            extra: Vec::new(),
        }
    }

    /// Drop the token before dispatch.
    pub fn skip() -> Self {
        Self {
            emit: false,
            extra: Vec::new(),
        }
    }

    /// Inject extra tokens into the stream right after this one.
    pub fn with_extra(mut self, extra: Vec<Lexeme>) -> Self {
        self.extra = extra;
        self
    }
}

impl ParseContext {
    pub(crate) fn new(cancel: CancelToken) -> Self {
        Self {
            appended: Vec::new(),
            cancel,
        }
    }

    /// Queue another source after the ones already pending.
    pub fn append_source(&mut self, source: Rc<Source>) {
        self.appended.push(source);
    }

    pub fn cancel_token(&self) -> &CancelToken {
        &self.cancel
    }

    pub(crate) fn take_appended(&mut self) -> Vec<Rc<Source>> {
        std::mem::take(&mut self.appended)
    }
}

impl<TVal> HookSet<TVal> {
    pub fn new() -> Self {
        Self {
            token_hooks: HashMap::new(),
            fallback_token_hook: None,
            node_hooks: HashMap::new(),
            fallback_node_hook: None,
        }
    }

    pub fn with_token_hook(mut self, token: i32, hook: Rc<dyn ITokenHook>) -> Self {
        self.token_hooks.insert(token, hook);
        self
    }

    /// Catch-all for tokens without a dedicated hook.
    pub fn with_fallback_token_hook(mut self, hook: Rc<dyn ITokenHook>) -> Self {
        self.fallback_token_hook = Some(hook);
        self
    }

    pub fn with_node_hook(mut self, node: &str, hook: Rc<dyn INodeHook<TVal>>) -> Self {
        self.node_hooks.insert(node.to_string(), hook);
        self
    }

    /// Catch-all for nodes without a dedicated hook.
    pub fn with_fallback_node_hook(mut self, hook: Rc<dyn INodeHook<TVal>>) -> Self {
        self.fallback_node_hook = Some(hook);
        self
    }

    pub(crate) fn token_hook(&self, token: i32) -> Option<&Rc<dyn ITokenHook>> {
        self.token_hooks
            .get(&token)
            .or(self.fallback_token_hook.as_ref())
    }
}

impl<TVal: Default + 'static> HookSet<TVal> {
    pub(crate) fn begin_node(
        &self,
        node: &str,
        lexeme: Option<&Lexeme>,
        ctx: &mut ParseContext,
    ) -> Box<dyn INodeInstance<TVal>> {
        match self
            .node_hooks
            .get(node)
            .or(self.fallback_node_hook.as_ref())
        {
            Some(hook) => hook.begin_node(node, lexeme, ctx),
            None => Box::new(SilentInstance(PhantomData)),
        }
    }
}

impl<TVal> Default for HookSet<TVal> {
    fn default() -> Self {
        Self::new()
    }
}

/// Stands in for nodes nobody observes.
struct SilentInstance<TVal>(PhantomData<TVal>);

impl<TVal: Default> INodeInstance<TVal> for SilentInstance<TVal> {
    fn handle_token(&mut self, _: &Lexeme) -> Result<(), ParseError> {
        Ok(())
    }

    fn handle_child(&mut self, _: &str, _: TVal) -> Result<(), ParseError> {
        Ok(())
    }

    fn end_node(&mut self) -> Result<TVal, ParseError> {
        Ok(TVal::default())
    }
}

impl SyntaxTree {
    pub fn new(name: String, start: usize, end: usize, children: Vec<SyntaxTree>) -> Self {
        Self {
            name,
            start,
            end,
            content: None,
            children,
        }
    }

    pub fn leaf(name: String, start: usize, end: usize, content: String) -> Self {
        Self {
            name,
            start,
            end,
            content: Some(content),
            children: Vec::with_capacity(0),
        }
    }

    /// Search through all nested children and return the first matching node.
    pub fn find<TF: Fn(&SyntaxTree) -> bool>(&self, p: &TF) -> Option<&SyntaxTree> {
        if p(self) {
            Some(self)
        } else {
            self.children.iter().find_map(|child| child.find(p))
        }
    }

    pub fn get_child(&self, name: &str) -> Option<&SyntaxTree> {
        self.children.iter().find(|child| child.name == name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.name == name || self.children.iter().any(|child| child.contains(name))
    }

    pub fn print(&self) -> Result<(), std::io::Error> {
        ptree::print_tree(self)
    }
}

impl TreeItem for SyntaxTree {
    type Child = Self;

    fn write_self<W: std::io::Write>(&self, f: &mut W, _: &ptree::Style) -> std::io::Result<()> {
        match &self.content {
            Some(content) => write!(f, "{} {:?} # {}-{}", self.name, content, self.start, self.end),
            None => write!(f, "{} # {}-{}", self.name, self.start, self.end),
        }
    }

    fn children(&self) -> std::borrow::Cow<[Self::Child]> {
        std::borrow::Cow::from(&self.children)
    }
}

impl TreeBuilder {
    pub fn new(grammar: Rc<Grammar>) -> Self {
        Self { grammar }
    }
}

impl INodeHook<SyntaxTree> for TreeBuilder {
    fn begin_node(
        &self,
        node: &str,
        lexeme: Option<&Lexeme>,
        _: &mut ParseContext,
    ) -> Box<dyn INodeInstance<SyntaxTree>> {
        let at = lexeme.map_or(0, |l| l.start);
        Box::new(TreeInstance {
            grammar: self.grammar.clone(),
            tree: SyntaxTree::new(node.to_string(), at, at, Vec::new()),
        })
    }
}

struct TreeInstance {
    grammar: Rc<Grammar>,
    tree: SyntaxTree,
}

impl INodeInstance<SyntaxTree> for TreeInstance {
    fn handle_token(&mut self, lexeme: &Lexeme) -> Result<(), ParseError> {
        let name = self.grammar.tokens[lexeme.token as usize].name.clone();
        self.tree.children.push(SyntaxTree::leaf(
            name,
            lexeme.start,
            lexeme.end,
            lexeme.content().to_string(),
        ));
        self.tree.end = lexeme.end;
        Ok(())
    }

    fn handle_child(&mut self, _: &str, child: SyntaxTree) -> Result<(), ParseError> {
        self.tree.end = self.tree.end.max(child.end);
        self.tree.children.push(child);
        Ok(())
    }

    fn end_node(&mut self) -> Result<SyntaxTree, ParseError> {
        Ok(std::mem::take(&mut self.tree))
    }
}
