//! Minimal element tree over `quick-xml`'s pull events.
//!
//! TEI apparatus files are small enough to hold in memory, and the
//! collation structure wants nested navigation (`note/graph/arc`, feature
//! structures under `note/fs`), so the parser materializes a tree once
//! and the TEI layer walks it.

use quick_xml::events::Event;
use quick_xml::Reader;

use crate::error::Error;

#[derive(Debug, Clone, Default)]
pub struct Element {
    pub name: String,
    pub attributes: Vec<(String, String)>,
    pub children: Vec<Element>,
    pub text: String,
}

impl Element {
    /// Value of the first attribute with the given qualified name.
    #[must_use]
    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }

    /// The first of the given attribute names that is present. TEI sources
    /// vary between `xml:id`, `id`, and `n` for identifiers.
    #[must_use]
    pub fn first_attr(&self, names: &[&str]) -> Option<&str> {
        names.iter().find_map(|&name| self.attr(name))
    }

    /// Direct children with the given element name.
    pub fn children_named<'a, 'b>(&'a self, name: &'b str) -> impl Iterator<Item = &'a Element> + 'b
    where
        'a: 'b,
    {
        self.children.iter().filter(move |child| child.name == name)
    }

    /// The first direct child with the given name.
    #[must_use]
    pub fn child(&self, name: &str) -> Option<&Element> {
        self.children_named(name).next()
    }

    /// Walks a path of nested child names.
    #[must_use]
    pub fn descend(&self, path: &[&str]) -> Option<&Element> {
        let mut current = self;
        for name in path {
            current = current.child(name)?;
        }
        Some(current)
    }

    /// Every descendant with the given name, in document order, self
    /// excluded.
    #[must_use]
    pub fn descendants_named<'a>(&'a self, name: &str) -> Vec<&'a Element> {
        let mut found = Vec::new();
        let mut stack: Vec<&Element> = self.children.iter().rev().collect();
        while let Some(element) = stack.pop() {
            if element.name == name {
                found.push(element);
            }
            stack.extend(element.children.iter().rev());
        }
        found
    }
}

/// Parses an XML document into its root element.
///
/// # Errors
///
/// Returns [`Error::InvalidInput`] on malformed XML or a missing root.
pub fn parse(input: &str) -> Result<Element, Error> {
    let mut reader = Reader::from_str(input);
    let config = reader.config_mut();
    config.trim_text_start = true;
    config.trim_text_end = true;

    let mut stack: Vec<Element> = Vec::new();
    let mut root: Option<Element> = None;
    loop {
        match reader.read_event()? {
            Event::Start(start) => {
                let element = element_from_start(&start)?;
                stack.push(element);
            }
            Event::Empty(start) => {
                let element = element_from_start(&start)?;
                attach(&mut stack, &mut root, element)?;
            }
            Event::End(_) => {
                let element = stack.pop().ok_or_else(|| Error::InvalidInput {
                    detail: "unbalanced closing tag".to_owned(),
                })?;
                attach(&mut stack, &mut root, element)?;
            }
            Event::Text(text) => {
                if let Some(parent) = stack.last_mut() {
                    parent.text.push_str(&text.unescape()?);
                }
            }
            Event::CData(data) => {
                if let Some(parent) = stack.last_mut() {
                    parent.text.push_str(&String::from_utf8_lossy(&data));
                }
            }
            Event::Eof => break,
            Event::Decl(_) | Event::Comment(_) | Event::PI(_) | Event::DocType(_) => {}
        }
    }
    if !stack.is_empty() {
        return Err(Error::InvalidInput {
            detail: "unclosed element at end of document".to_owned(),
        });
    }
    root.ok_or_else(|| Error::InvalidInput {
        detail: "document has no root element".to_owned(),
    })
}

fn element_from_start(start: &quick_xml::events::BytesStart<'_>) -> Result<Element, Error> {
    let name = String::from_utf8_lossy(start.name().as_ref()).into_owned();
    let mut attributes = Vec::new();
    for attribute in start.attributes() {
        let attribute = attribute.map_err(|err| Error::InvalidInput {
            detail: format!("bad attribute in <{name}>: {err}"),
        })?;
        let key = String::from_utf8_lossy(attribute.key.as_ref()).into_owned();
        let value = attribute
            .unescape_value()
            .map_err(|err| Error::InvalidInput {
                detail: format!("bad attribute value in <{name}>: {err}"),
            })?
            .into_owned();
        attributes.push((key, value));
    }
    Ok(Element {
        name,
        attributes,
        children: Vec::new(),
        text: String::new(),
    })
}

fn attach(
    stack: &mut [Element],
    root: &mut Option<Element>,
    element: Element,
) -> Result<(), Error> {
    if let Some(parent) = stack.last_mut() {
        parent.children.push(element);
        Ok(())
    } else if root.is_none() {
        *root = Some(element);
        Ok(())
    } else {
        Err(Error::InvalidInput {
            detail: "multiple root elements".to_owned(),
        })
    }
}
