//! Token sink that keeps a lightweight open-element stack and reports
//! selector matches to a [`NodeVisitor`].

use html5ever::tokenizer::states::RawKind;
use html5ever::tokenizer::{Tag, TagKind, Token, TokenSink, TokenSinkResult};
use std::cell::RefCell;
use std::sync::Arc;

use super::{CompiledSelectors, ElementView, NodeVisitor, SelectorId};

/// Elements that never have content or an end tag.
const VOID_ELEMENTS: &[&str] = &[
    "area", "base", "br", "col", "embed", "hr", "img", "input", "link", "meta", "param", "source",
    "track", "wbr",
];

/// Start tags that close an open `<p>`.
const CLOSES_P: &[&str] = &[
    "address", "article", "aside", "blockquote", "details", "dialog", "div", "dl", "fieldset",
    "figcaption", "figure", "footer", "form", "h1", "h2", "h3", "h4", "h5", "h6", "header",
    "hgroup", "hr", "main", "menu", "nav", "ol", "p", "pre", "section", "summary", "table", "ul",
];

/// Elements an open `<p>` is not looked for beyond.
const P_BOUNDARIES: &[&str] = &[
    "applet", "button", "caption", "html", "marquee", "object", "table", "td", "template", "th",
];

/// Elements an open `<a>` is not looked for beyond.
const FORMATTING_BOUNDARIES: &[&str] = &[
    "applet", "button", "caption", "marquee", "object", "table", "td", "template", "th",
];

struct OpenElement {
    name: String,
    matched: Vec<SelectorId>,
}

struct MatchState<V> {
    stack: Vec<OpenElement>,
    /// Stack index of the open item container.
    item_at: Option<usize>,
    visitor: Option<V>,
}

/// html5ever [`TokenSink`] driving a [`NodeVisitor`].
pub struct MatchingSink<V> {
    selectors: Arc<CompiledSelectors>,
    state: RefCell<MatchState<V>>,
}

impl<V: NodeVisitor> MatchingSink<V> {
    pub fn new(selectors: Arc<CompiledSelectors>, visitor: V) -> Self {
        Self {
            selectors,
            state: RefCell::new(MatchState {
                stack: Vec::new(),
                item_at: None,
                visitor: Some(visitor),
            }),
        }
    }

    /// Move the visitor out. Only meaningful once, after the tokenizer ended.
    pub(crate) fn take_visitor(&self) -> V {
        let mut state = self.state.borrow_mut();
        state.close_from(0);
        state
            .visitor
            .take()
            .unwrap_or_else(|| unreachable!("visitor taken twice"))
    }
}

impl<V: NodeVisitor> MatchState<V> {
    fn is_active(&self, id: SelectorId) -> bool {
        self.stack.iter().any(|e| e.matched.contains(&id))
    }

    /// Pop every element at or above `index`, innermost first.
    fn close_from(&mut self, index: usize) {
        while self.stack.len() > index {
            let Some(element) = self.stack.pop() else { break };
            if let Some(visitor) = self.visitor.as_mut() {
                for id in element.matched.iter().rev() {
                    visitor.on_end(*id);
                }
            }
            if self.item_at == Some(self.stack.len()) {
                self.item_at = None;
            }
        }
    }

    /// Close elements that the start tag `name` ends implicitly, e.g. an open
    /// `<li>` before another `<li>`, or an open `<p>` before a `<div>`.
    fn close_implied(&mut self, name: &str) {
        let (siblings, boundaries): (&[&str], &[&str]) = match name {
            "li" => (&["li"], &["ul", "ol", "menu"]),
            "dt" | "dd" => (&["dt", "dd"], &["dl"]),
            "tr" => (&["tr"], &["table", "thead", "tbody", "tfoot"]),
            "td" | "th" => (&["td", "th"], &["tr", "table"]),
            "option" => (&["option"], &["select", "datalist"]),
            "a" => (&["a"], FORMATTING_BOUNDARIES),
            _ if CLOSES_P.contains(&name) => (&["p"], P_BOUNDARIES),
            _ => return,
        };
        for i in (0..self.stack.len()).rev() {
            let open = self.stack[i].name.as_str();
            if boundaries.contains(&open) {
                return;
            }
            if siblings.contains(&open) {
                self.close_from(i);
                return;
            }
        }
    }

    fn start_tag(&mut self, selectors: &CompiledSelectors, tag: &Tag) {
        let name: &str = &tag.name;
        self.close_implied(name);

        let element = ElementView::from_tag(tag);
        let mut matched = Vec::new();
        for (id, selector) in selectors.page_level() {
            if id == SelectorId::Item && self.item_at.is_some() {
                continue;
            }
            if !self.is_active(id) && selector.matches(&element) {
                matched.push(id);
            }
        }
        if self.item_at.is_some() {
            for (id, selector) in selectors.item_level() {
                if !self.is_active(id) && selector.matches(&element) {
                    matched.push(id);
                }
            }
        }

        if let Some(visitor) = self.visitor.as_mut() {
            for id in &matched {
                visitor.on_element(*id, &element);
            }
        }

        if VOID_ELEMENTS.contains(&name) {
            if let Some(visitor) = self.visitor.as_mut() {
                for id in matched.iter().rev() {
                    visitor.on_end(*id);
                }
            }
            return;
        }

        if matched.contains(&SelectorId::Item) {
            self.item_at = Some(self.stack.len());
        }
        self.stack.push(OpenElement {
            name: name.to_string(),
            matched,
        });
    }

    fn end_tag(&mut self, tag: &Tag) {
        let name: &str = &tag.name;
        if let Some(index) = self.stack.iter().rposition(|e| e.name == name) {
            self.close_from(index);
        }
    }

    fn text(&mut self, text: &str) {
        let Some(visitor) = self.visitor.as_mut() else { return };
        for element in &self.stack {
            for id in &element.matched {
                visitor.on_text(*id, text);
            }
        }
    }
}

/// Content model the tokenizer must switch to after this start tag.
fn raw_kind(name: &str) -> Option<RawKind> {
    match name {
        "title" | "textarea" => Some(RawKind::Rcdata),
        "script" => Some(RawKind::ScriptData),
        "style" | "xmp" | "iframe" | "noembed" | "noframes" => Some(RawKind::Rawtext),
        _ => None,
    }
}

impl<V: NodeVisitor> TokenSink for MatchingSink<V> {
    type Handle = ();

    fn process_token(&self, token: Token, _line_number: u64) -> TokenSinkResult<()> {
        let mut state = self.state.borrow_mut();
        match token {
            Token::TagToken(tag) => match tag.kind {
                TagKind::StartTag => {
                    state.start_tag(&self.selectors, &tag);
                    if let Some(kind) = raw_kind(&tag.name) {
                        return TokenSinkResult::RawData(kind);
                    }
                }
                TagKind::EndTag => state.end_tag(&tag),
            },
            Token::CharacterTokens(text) => state.text(&text),
            Token::EOFToken => state.close_from(0),
            _ => {}
        }
        TokenSinkResult::Continue
    }
}
