//! Compound selectors for the streaming extractor.
//!
//! Supported forms, which may be combined into one compound selector:
//! `tag`, `*`, `.class`, `#id`, `[attr]`, `[attr=value]`, `[attr="value"]`.
//! Combinators are not supported; nesting is expressed by the extractor's
//! container scoping instead.

use std::fmt;

use crate::error::{FeedError, Result};

use super::ElementView;

#[derive(Debug, Clone, PartialEq, Eq)]
enum AttrMatch {
    Exists(String),
    Equals(String, String),
}

/// A parsed compound selector such as `meta[name="description"]`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SimpleSelector {
    source: String,
    tag: Option<String>,
    classes: Vec<String>,
    id: Option<String>,
    attrs: Vec<AttrMatch>,
}

impl SimpleSelector {
    pub fn parse(input: &str) -> Result<Self> {
        let source = input.trim();
        let fail = |reason: &str| FeedError::Selector {
            selector: input.to_string(),
            reason: reason.to_string(),
        };
        if source.is_empty() {
            return Err(fail("empty selector"));
        }

        let mut selector = SimpleSelector {
            source: source.to_string(),
            tag: None,
            classes: Vec::new(),
            id: None,
            attrs: Vec::new(),
        };

        let mut rest = source;
        let tag_len = rest
            .find(|c: char| !is_ident_char(c) && c != '*')
            .unwrap_or(rest.len());
        if tag_len > 0 {
            let tag = &rest[..tag_len];
            if tag != "*" {
                if tag.contains('*') {
                    return Err(fail("malformed universal selector"));
                }
                selector.tag = Some(tag.to_ascii_lowercase());
            }
            rest = &rest[tag_len..];
        }

        while let Some(c) = rest.chars().next() {
            match c {
                '.' | '#' => {
                    let body = &rest[1..];
                    let len = body.find(|c: char| !is_ident_char(c)).unwrap_or(body.len());
                    if len == 0 {
                        return Err(fail("expected a name after '.' or '#'"));
                    }
                    let name = body[..len].to_string();
                    if c == '.' {
                        selector.classes.push(name);
                    } else {
                        selector.id = Some(name);
                    }
                    rest = &body[len..];
                }
                '[' => {
                    let close = rest.find(']').ok_or_else(|| fail("unterminated '['"))?;
                    selector.attrs.push(parse_attr(&rest[1..close]).map_err(fail)?);
                    rest = &rest[close + 1..];
                }
                c if c.is_whitespace() || c == '>' || c == '+' || c == '~' || c == ',' => {
                    return Err(fail("combinators and selector lists are not supported"));
                }
                _ => return Err(fail("unexpected character")),
            }
        }

        Ok(selector)
    }

    pub fn matches(&self, element: &ElementView<'_>) -> bool {
        if let Some(tag) = &self.tag {
            if tag != element.name {
                return false;
            }
        }
        if let Some(id) = &self.id {
            if element.attr("id") != Some(id.as_str()) {
                return false;
            }
        }
        if !self.classes.is_empty() {
            let Some(class_attr) = element.attr("class") else {
                return false;
            };
            let has = |wanted: &String| class_attr.split_ascii_whitespace().any(|c| c == wanted);
            if !self.classes.iter().all(has) {
                return false;
            }
        }
        self.attrs.iter().all(|m| match m {
            AttrMatch::Exists(name) => element.attr(name).is_some(),
            AttrMatch::Equals(name, value) => element.attr(name) == Some(value.as_str()),
        })
    }
}

impl fmt::Display for SimpleSelector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.source)
    }
}

fn is_ident_char(c: char) -> bool {
    c.is_alphanumeric() || c == '-' || c == '_'
}

fn parse_attr(body: &str) -> std::result::Result<AttrMatch, &'static str> {
    let Some((name, value)) = body.split_once('=') else {
        let name = body.trim();
        if name.is_empty() || !name.chars().all(is_ident_char) {
            return Err("malformed attribute name");
        }
        return Ok(AttrMatch::Exists(name.to_ascii_lowercase()));
    };

    let name = name.trim();
    if name.is_empty() || !name.chars().all(is_ident_char) {
        return Err("malformed attribute name");
    }
    let value = value.trim();
    let unquoted = match value.chars().next() {
        Some(q @ ('"' | '\'')) => value
            .strip_prefix(q)
            .and_then(|v| v.strip_suffix(q))
            .ok_or("unbalanced quotes in attribute value")?,
        _ => value,
    };
    Ok(AttrMatch::Equals(name.to_ascii_lowercase(), unquoted.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn element<'a>(name: &'a str, attrs: &'a [(&'a str, &'a str)]) -> ElementView<'a> {
        ElementView::from_pairs(name, attrs)
    }

    #[test]
    fn test_tag_selector() {
        let sel = SimpleSelector::parse("title").unwrap();
        assert!(sel.matches(&element("title", &[])));
        assert!(!sel.matches(&element("meta", &[])));
    }

    #[test]
    fn test_class_selector_matches_any_listed_class() {
        let sel = SimpleSelector::parse(".list-li").unwrap();
        assert!(sel.matches(&element("li", &[("class", "clearfix list-li")])));
        assert!(sel.matches(&element("div", &[("class", "list-li")])));
        assert!(!sel.matches(&element("li", &[("class", "list-lit")])));
        assert!(!sel.matches(&element("li", &[])));
    }

    #[test]
    fn test_attribute_value_selector() {
        let sel = SimpleSelector::parse(r#"meta[name="description"]"#).unwrap();
        assert!(sel.matches(&element("meta", &[("name", "description"), ("content", "x")])));
        assert!(!sel.matches(&element("meta", &[("name", "keywords")])));
        assert!(!sel.matches(&element("link", &[("name", "description")])));

        let single = SimpleSelector::parse("meta[name='description']").unwrap();
        assert_eq!(single, SimpleSelector { source: "meta[name='description']".to_string(), ..sel });
    }

    #[test]
    fn test_compound_selector() {
        let sel = SimpleSelector::parse("a.title[href]#main").unwrap();
        assert!(sel.matches(&element("a", &[("class", "title big"), ("href", "/x"), ("id", "main")])));
        assert!(!sel.matches(&element("a", &[("class", "title"), ("id", "main")])));
    }

    #[test]
    fn test_universal_selector_matches_everything() {
        let sel = SimpleSelector::parse("*").unwrap();
        assert!(sel.matches(&element("span", &[])));
    }

    #[test]
    fn test_rejects_unsupported_syntax() {
        for bad in ["", "ul li", "a > b", "a,b", ".", "[href", "[=x]", "a[x=\"y]", "a*"] {
            assert!(SimpleSelector::parse(bad).is_err(), "{bad:?} should be rejected");
        }
    }

    #[test]
    fn test_display_round_trips_source() {
        let sel = SimpleSelector::parse("  .list-time ").unwrap();
        assert_eq!(sel.to_string(), ".list-time");
    }
}
