//! Minimal XML plumbing shared by the diagnostic stream, the analyzer-info
//! cache and the dump writer.
//!
//! Writing is plain string building over [`escape_xml`]; reading goes
//! through `quick-xml` events collected into an [`XmlNode`] tree. The
//! documents involved are small and attribute-heavy, so a DOM-ish tree is
//! simpler than streaming consumers at every call site.

use anyhow::{anyhow, Context, Result};
use quick_xml::events::Event;
use quick_xml::Reader;

/// Escape a string for use in XML attribute or text content.
pub fn escape_xml(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&apos;")
}

/// One parsed element: name, attributes in document order, child elements.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct XmlNode {
    pub name: String,
    pub attrs: Vec<(String, String)>,
    pub children: Vec<XmlNode>,
}

impl XmlNode {
    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attrs
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }

    pub fn attr_u32(&self, name: &str) -> Option<u32> {
        self.attr(name).and_then(|v| v.parse().ok())
    }

    pub fn attr_i64(&self, name: &str) -> Option<i64> {
        self.attr(name).and_then(|v| v.parse().ok())
    }

    /// Child elements with the given name.
    pub fn children_named<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a XmlNode> {
        self.children.iter().filter(move |c| c.name == name)
    }

    /// Parse a document and return its root element.
    pub fn parse(text: &str) -> Result<XmlNode> {
        let mut reader = Reader::from_str(text);
        let mut stack: Vec<XmlNode> = Vec::new();
        let mut root: Option<XmlNode> = None;

        loop {
            match reader.read_event().context("malformed XML")? {
                Event::Start(e) => {
                    stack.push(node_from_start(&e)?);
                }
                Event::Empty(e) => {
                    let node = node_from_start(&e)?;
                    match stack.last_mut() {
                        Some(parent) => parent.children.push(node),
                        None => root = Some(node),
                    }
                }
                Event::End(_) => {
                    let node = stack.pop().ok_or_else(|| anyhow!("unbalanced XML"))?;
                    match stack.last_mut() {
                        Some(parent) => parent.children.push(node),
                        None => root = Some(node),
                    }
                }
                Event::Eof => break,
                // Text, comments, declarations and processing instructions
                // carry no information for our documents.
                _ => {}
            }
        }

        root.ok_or_else(|| anyhow!("XML document has no root element"))
    }
}

fn node_from_start(e: &quick_xml::events::BytesStart<'_>) -> Result<XmlNode> {
    let name = String::from_utf8_lossy(e.name().as_ref()).into_owned();
    let mut attrs = Vec::new();
    for attr in e.attributes() {
        let attr = attr.context("malformed XML attribute")?;
        let key = String::from_utf8_lossy(attr.key.as_ref()).into_owned();
        let value = attr
            .unescape_value()
            .context("malformed XML attribute value")?
            .into_owned();
        attrs.push((key, value));
    }
    Ok(XmlNode {
        name,
        attrs,
        children: Vec::new(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn escape_replaces_metacharacters() {
        assert_eq!(escape_xml("a<b&c>\"d'"), "a&lt;b&amp;c&gt;&quot;d&apos;");
    }

    #[test]
    fn parse_nested_elements_and_attributes() {
        let doc = r#"<?xml version="1.0"?>
            <analyzerinfo checksum="123">
              <error id="nullPointer" severity="error"/>
              <function-call call-id="f.c:1:6" call-argnr="1">
                <path file="f.c" line="3" col="5" info="step"/>
              </function-call>
            </analyzerinfo>"#;
        let root = XmlNode::parse(doc).unwrap();
        assert_eq!(root.name, "analyzerinfo");
        assert_eq!(root.attr_u32("checksum"), Some(123));
        assert_eq!(root.children.len(), 2);
        let call = root.children_named("function-call").next().unwrap();
        assert_eq!(call.attr("call-id"), Some("f.c:1:6"));
        assert_eq!(call.children[0].attr("info"), Some("step"));
    }

    #[test]
    fn parse_rejects_unbalanced_document() {
        assert!(XmlNode::parse("<a>").is_err());
        assert!(XmlNode::parse("").is_err());
    }
}
