//! RSS 2.0 serialization.
//!
//! Free text (titles, descriptions, author, categories, source title) goes into
//! CDATA sections; a `]]>` inside the text is split across two adjacent
//! sections. URLs and dates are written as escaped text, attributes are
//! escaped by quick-xml. Characters that XML 1.0 forbids are dropped.
//!
//! Output depends only on the [`FeedDocument`]: rendering is deterministic.

use quick_xml::Writer;
use quick_xml::events::{BytesCData, BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use tracing::{debug, instrument};

use crate::error::Result;
use crate::models::{ChannelMeta, FeedDocument, FeedItem};

pub const CONTENT_TYPE: &str = "application/xml; charset=utf-8";

/// Render `doc` as a complete RSS 2.0 document.
///
/// # Arguments
///
/// * `doc` - Channel metadata and items, in output order
///
/// # Returns
///
/// The UTF-8 XML text, starting with the XML declaration.
///
/// # Errors
///
/// Only if the in-memory writer fails, which does not happen for a `Vec<u8>`
/// sink in practice.
#[instrument(level = "debug", skip_all, fields(items = doc.items.len()))]
pub fn render(doc: &FeedDocument) -> Result<String> {
    let mut writer = Writer::new_with_indent(Vec::new(), b' ', 2);
    writer.write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))?;

    writer.write_event(Event::Start(BytesStart::new("rss").with_attributes([("version", "2.0")])))?;
    writer.write_event(Event::Start(BytesStart::new("channel")))?;
    write_channel(&mut writer, &doc.channel)?;
    for item in &doc.items {
        write_item(&mut writer, item)?;
    }
    writer.write_event(Event::End(BytesEnd::new("channel")))?;
    writer.write_event(Event::End(BytesEnd::new("rss")))?;

    let xml = String::from_utf8(writer.into_inner())?;
    debug!(bytes = xml.len(), "Rendered feed");
    Ok(xml)
}

fn write_channel(w: &mut Writer<Vec<u8>>, channel: &ChannelMeta) -> Result<()> {
    write_cdata_element(w, "title", &channel.title)?;
    write_text_element(w, "link", &channel.link)?;
    write_cdata_element(w, "description", &channel.description)?;
    write_text_element(w, "language", &channel.language)?;
    write_cdata_element(w, "category", &channel.category)?;
    Ok(())
}

fn write_item(w: &mut Writer<Vec<u8>>, item: &FeedItem) -> Result<()> {
    w.write_event(Event::Start(BytesStart::new("item")))?;
    write_cdata_element(w, "title", &item.title)?;
    write_text_element(w, "link", &item.link)?;
    write_cdata_element(w, "description", &item.description)?;
    write_text_element(w, "pubDate", &item.pub_date)?;
    write_text_element(w, "guid", &item.guid)?;
    write_cdata_element(w, "author", &item.author)?;
    write_cdata_element(w, "category", &item.category)?;

    let length = item.enclosure.length.to_string();
    let enclosure = BytesStart::new("enclosure").with_attributes([
        ("url", sanitize(&item.enclosure.url).as_str()),
        ("type", sanitize(&item.enclosure.mime_type).as_str()),
        ("length", length.as_str()),
    ]);
    w.write_event(Event::Empty(enclosure))?;

    let source = BytesStart::new("source").with_attributes([("url", sanitize(&item.source.url).as_str())]);
    w.write_event(Event::Start(source))?;
    write_cdata(w, &item.source.title)?;
    w.write_event(Event::End(BytesEnd::new("source")))?;

    w.write_event(Event::End(BytesEnd::new("item")))?;
    Ok(())
}

fn write_text_element(w: &mut Writer<Vec<u8>>, name: &str, text: &str) -> Result<()> {
    w.write_event(Event::Start(BytesStart::new(name)))?;
    w.write_event(Event::Text(BytesText::new(&sanitize(text))))?;
    w.write_event(Event::End(BytesEnd::new(name)))?;
    Ok(())
}

fn write_cdata_element(w: &mut Writer<Vec<u8>>, name: &str, text: &str) -> Result<()> {
    w.write_event(Event::Start(BytesStart::new(name)))?;
    write_cdata(w, text)?;
    w.write_event(Event::End(BytesEnd::new(name)))?;
    Ok(())
}

fn write_cdata(w: &mut Writer<Vec<u8>>, text: &str) -> Result<()> {
    for section in cdata_sections(&sanitize(text)) {
        w.write_event(Event::CData(BytesCData::new(section)))?;
    }
    Ok(())
}

/// Split `text` so no section contains `]]>`.
///
/// `a]]>b` becomes `a]]` and `>b`; concatenating the sections gives `text`.
fn cdata_sections(text: &str) -> Vec<&str> {
    let mut sections = Vec::new();
    let mut rest = text;
    while let Some(pos) = rest.find("]]>") {
        sections.push(&rest[..pos + 2]);
        rest = &rest[pos + 2..];
    }
    sections.push(rest);
    sections
}

/// Drop characters not allowed in XML 1.0 documents.
fn sanitize(text: &str) -> String {
    text.chars()
        .filter(|&c| {
            matches!(c, '\t' | '\n' | '\r')
                || ('\u{20}'..='\u{D7FF}').contains(&c)
                || ('\u{E000}'..='\u{FFFD}').contains(&c)
                || c >= '\u{10000}'
        })
        .collect()
}
