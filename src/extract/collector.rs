//! [`NodeVisitor`] that accumulates page metadata and one [`RawItemRecord`]
//! per item container.

use crate::models::{PageExtract, RawItemRecord};

use super::{ElementView, NodeVisitor, SelectorId};

/// Text captured from the first element matching a selector.
#[derive(Debug, Default)]
enum Capture {
    #[default]
    Idle,
    Open(String),
    Done(String),
}

impl Capture {
    fn start(&mut self) {
        if matches!(self, Capture::Idle) {
            *self = Capture::Open(String::new());
        }
    }

    fn push(&mut self, text: &str) {
        if let Capture::Open(buf) = self {
            buf.push_str(text);
        }
    }

    fn close(&mut self) {
        if let Capture::Open(buf) = self {
            *self = Capture::Done(std::mem::take(buf));
        }
    }

    fn into_text(self) -> Option<String> {
        match self {
            Capture::Idle => None,
            Capture::Open(s) | Capture::Done(s) => Some(s.trim().to_string()),
        }
    }
}

#[derive(Debug, Default)]
struct ItemBuilder {
    title: Capture,
    link: Capture,
    href: Option<String>,
    date: Capture,
    desc: Capture,
}

impl ItemBuilder {
    fn field(&mut self, id: SelectorId) -> Option<&mut Capture> {
        match id {
            SelectorId::ItemTitle => Some(&mut self.title),
            SelectorId::ItemLink => Some(&mut self.link),
            SelectorId::ItemDate => Some(&mut self.date),
            SelectorId::ItemDescription => Some(&mut self.desc),
            _ => None,
        }
    }

    fn build(self) -> RawItemRecord {
        RawItemRecord {
            title_text: self.title.into_text(),
            link_text: self.link.into_text(),
            href_raw: self.href,
            date_text: self.date.into_text(),
            desc_text: self.desc.into_text(),
        }
    }
}

/// Collects a [`PageExtract`] from extractor callbacks.
#[derive(Debug)]
pub struct PageCollector {
    description_attr: String,
    title: Capture,
    description: Option<String>,
    current: Option<ItemBuilder>,
    items: Vec<RawItemRecord>,
}

impl PageCollector {
    pub fn new(description_attr: impl Into<String>) -> Self {
        Self {
            description_attr: description_attr.into(),
            title: Capture::Idle,
            description: None,
            current: None,
            items: Vec::new(),
        }
    }

    pub fn into_extract(mut self) -> PageExtract {
        if let Some(open) = self.current.take() {
            self.items.push(open.build());
        }
        PageExtract {
            page_title: self.title.into_text().filter(|t| !t.is_empty()),
            page_description: self.description,
            items: self.items,
        }
    }
}

impl NodeVisitor for PageCollector {
    fn on_element(&mut self, id: SelectorId, element: &ElementView<'_>) {
        match id {
            SelectorId::PageTitle => self.title.start(),
            SelectorId::PageDescription => {
                if self.description.is_none() {
                    self.description = element
                        .attr(&self.description_attr)
                        .map(str::trim)
                        .filter(|d| !d.is_empty())
                        .map(str::to_string);
                }
            }
            SelectorId::Item => {
                if let Some(done) = self.current.replace(ItemBuilder::default()) {
                    self.items.push(done.build());
                }
            }
            _ => {
                let Some(item) = self.current.as_mut() else { return };
                if id == SelectorId::ItemLink && matches!(item.link, Capture::Idle) {
                    item.href = element.attr("href").map(|h| h.trim().to_string());
                }
                if let Some(field) = item.field(id) {
                    field.start();
                }
            }
        }
    }

    fn on_text(&mut self, id: SelectorId, text: &str) {
        match id {
            SelectorId::PageTitle => self.title.push(text),
            _ => {
                if let Some(field) = self.current.as_mut().and_then(|item| item.field(id)) {
                    field.push(text);
                }
            }
        }
    }

    fn on_end(&mut self, id: SelectorId) {
        match id {
            SelectorId::PageTitle => self.title.close(),
            SelectorId::Item => {
                if let Some(done) = self.current.take() {
                    self.items.push(done.build());
                }
            }
            _ => {
                if let Some(field) = self.current.as_mut().and_then(|item| item.field(id)) {
                    field.close();
                }
            }
        }
    }
}
