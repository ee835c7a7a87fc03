//! Streaming extraction of page metadata and listing entries.
//!
//! The page body is fed to an html5ever tokenizer chunk by chunk. No document
//! tree is built: a [`sink::MatchingSink`] tracks the open elements, matches
//! each start tag against a fixed set of selectors and reports matches to a
//! [`NodeVisitor`] as they happen. [`collector::PageCollector`] is the visitor
//! that turns those callbacks into a [`crate::models::PageExtract`].
//!
//! # Selectors
//!
//! | Id | Ankang portal | Captures |
//! |----|---------------|----------|
//! | [`SelectorId::PageTitle`] | `title` | text |
//! | [`SelectorId::PageDescription`] | `meta[name="description"]` | `content` attribute |
//! | [`SelectorId::Item`] | `.list-li` | starts one record |
//! | [`SelectorId::ItemTitle`] | `.list-title` | text |
//! | [`SelectorId::ItemLink`] | `a` | `href` and text |
//! | [`SelectorId::ItemDate`] | `.list-time` | text |
//! | [`SelectorId::ItemDescription`] | `.list-desc` | text |
//!
//! The `Item*` selectors only match inside an open item container.

pub mod collector;
pub mod selector;
pub mod sink;

use html5ever::tendril::StrTendril;
use html5ever::TokenizerResult;
use html5ever::tokenizer::{BufferQueue, Tag, Tokenizer, TokenizerOpts};
use std::sync::Arc;
use tracing::debug;

use crate::error::Result;
use crate::sites::SelectorMap;

pub use collector::PageCollector;
pub use selector::SimpleSelector;
pub use sink::MatchingSink;

/// Which configured selector matched a node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SelectorId {
    PageTitle,
    PageDescription,
    Item,
    ItemTitle,
    ItemLink,
    ItemDate,
    ItemDescription,
}

/// A start tag as seen by selectors and visitors.
#[derive(Debug, Clone)]
pub struct ElementView<'a> {
    pub name: &'a str,
    attrs: Vec<(&'a str, &'a str)>,
}

impl<'a> ElementView<'a> {
    pub fn from_tag(tag: &'a Tag) -> Self {
        Self {
            name: &tag.name,
            attrs: tag
                .attrs
                .iter()
                .map(|a| (&*a.name.local, &*a.value))
                .collect(),
        }
    }

    #[cfg(test)]
    pub fn from_pairs(name: &'a str, attrs: &[(&'a str, &'a str)]) -> Self {
        Self {
            name,
            attrs: attrs.to_vec(),
        }
    }

    /// Value of the first attribute called `name`.
    pub fn attr(&self, name: &str) -> Option<&'a str> {
        self.attrs.iter().find(|(k, _)| *k == name).map(|(_, v)| *v)
    }
}

/// Push-based callbacks fired during the single forward pass.
///
/// For each selector, only the outermost of several nested matching elements
/// is reported, so text is never delivered twice for the same id.
pub trait NodeVisitor {
    /// A start tag matched `id`.
    fn on_element(&mut self, id: SelectorId, element: &ElementView<'_>);

    /// Text inside an element that matched `id`.
    fn on_text(&mut self, id: SelectorId, text: &str);

    /// The element that matched `id` was closed, explicitly or implicitly.
    fn on_end(&mut self, _id: SelectorId) {}
}

/// A site's selectors, parsed once at startup.
#[derive(Debug, Clone)]
pub struct CompiledSelectors {
    pub page_title: SimpleSelector,
    pub page_description: SimpleSelector,
    pub page_description_attr: String,
    pub item: SimpleSelector,
    pub item_title: SimpleSelector,
    pub item_link: SimpleSelector,
    pub item_date: SimpleSelector,
    pub item_description: SimpleSelector,
}

impl CompiledSelectors {
    pub fn compile(map: &SelectorMap) -> Result<Self> {
        Ok(Self {
            page_title: SimpleSelector::parse(&map.page_title)?,
            page_description: SimpleSelector::parse(&map.page_description)?,
            page_description_attr: map.page_description_attr.to_ascii_lowercase(),
            item: SimpleSelector::parse(&map.item)?,
            item_title: SimpleSelector::parse(&map.item_title)?,
            item_link: SimpleSelector::parse(&map.item_link)?,
            item_date: SimpleSelector::parse(&map.item_date)?,
            item_description: SimpleSelector::parse(&map.item_description)?,
        })
    }

    /// Page-level selectors, tried on every start tag.
    pub(crate) fn page_level(&self) -> [(SelectorId, &SimpleSelector); 3] {
        [
            (SelectorId::PageTitle, &self.page_title),
            (SelectorId::PageDescription, &self.page_description),
            (SelectorId::Item, &self.item),
        ]
    }

    /// Selectors that only apply inside an item container.
    pub(crate) fn item_level(&self) -> [(SelectorId, &SimpleSelector); 4] {
        [
            (SelectorId::ItemTitle, &self.item_title),
            (SelectorId::ItemLink, &self.item_link),
            (SelectorId::ItemDate, &self.item_date),
            (SelectorId::ItemDescription, &self.item_description),
        ]
    }
}

/// Incremental extractor: feed raw body bytes as they arrive, then finish.
///
/// UTF-8 sequences split across chunks are carried over to the next chunk;
/// invalid bytes are replaced with U+FFFD.
pub struct StreamingExtractor<V: NodeVisitor> {
    tokenizer: Tokenizer<MatchingSink<V>>,
    input: BufferQueue,
    pending: Vec<u8>,
    bytes_seen: usize,
}

impl StreamingExtractor<PageCollector> {
    pub fn new(selectors: Arc<CompiledSelectors>) -> Self {
        let attr = selectors.page_description_attr.clone();
        Self::with_visitor(selectors, PageCollector::new(attr))
    }
}

impl<V: NodeVisitor> StreamingExtractor<V> {
    pub fn with_visitor(selectors: Arc<CompiledSelectors>, visitor: V) -> Self {
        Self {
            tokenizer: Tokenizer::new(MatchingSink::new(selectors, visitor), TokenizerOpts::default()),
            input: BufferQueue::default(),
            pending: Vec::new(),
            bytes_seen: 0,
        }
    }

    pub fn feed(&mut self, bytes: &[u8]) {
        self.bytes_seen += bytes.len();
        self.pending.extend_from_slice(bytes);

        let mut text = String::new();
        let mut consumed = 0;
        loop {
            match std::str::from_utf8(&self.pending[consumed..]) {
                Ok(valid) => {
                    text.push_str(valid);
                    consumed = self.pending.len();
                    break;
                }
                Err(e) => {
                    let valid_end = consumed + e.valid_up_to();
                    text.push_str(std::str::from_utf8(&self.pending[consumed..valid_end]).unwrap_or_default());
                    match e.error_len() {
                        Some(bad) => {
                            text.push(char::REPLACEMENT_CHARACTER);
                            consumed = valid_end + bad;
                        }
                        // Incomplete sequence at the end: wait for the next chunk.
                        None => {
                            consumed = valid_end;
                            break;
                        }
                    }
                }
            }
        }
        self.pending.drain(..consumed);
        self.push_text(text);
    }

    fn push_text(&mut self, text: String) {
        if text.is_empty() {
            return;
        }
        self.input.push_back(StrTendril::from(text));
        while let TokenizerResult::Script(_) = self.tokenizer.feed(&self.input) {}
    }

    /// Flush the tokenizer and hand back the visitor.
    pub fn finish(mut self) -> V {
        if !self.pending.is_empty() {
            self.pending.clear();
            self.push_text(char::REPLACEMENT_CHARACTER.to_string());
        }
        self.tokenizer.end();
        debug!(bytes = self.bytes_seen, "Finished streaming extraction");
        self.tokenizer.sink.take_visitor()
    }
}
