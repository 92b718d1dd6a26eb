//! Owned, read-only XML tree for structured input formats
//!
//! `roxmltree` gives a fast, strict parse but its tree borrows the input
//! text. Documents keep their parsed tree for their whole lifetime, so the
//! borrowed tree is copied once into [`XmlTree`], an owned representation
//! keyed by local names. Namespaces are dropped: `xml:lang` is reachable as
//! `lang`, and DocBook 5 elements match the same paths as DocBook 4 ones.
//!
//! # Paths
//!
//! [`XmlTree::select`] accepts absolute slash paths such as
//! `/book/bookinfo/author/surname`. The first step must name the root
//! element; each following step selects child elements by local name.

use crate::charset::decode_text;
use crate::error::{DocumentError, Result};
use crate::parser::normalize_whitespace;

/// A node of the owned XML tree
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum XmlNode {
    Element(XmlElement),
    Text(String),
}

/// An element with its attributes and children
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct XmlElement {
    pub name: String,
    pub attributes: Vec<(String, String)>,
    pub children: Vec<XmlNode>,
}

impl XmlElement {
    /// Value of the attribute with local name `name`
    pub fn attribute(&self, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }

    /// Child elements in document order
    pub fn child_elements(&self) -> impl Iterator<Item = &XmlElement> {
        self.children.iter().filter_map(|child| match child {
            XmlNode::Element(element) => Some(element),
            XmlNode::Text(_) => None,
        })
    }

    /// Concatenated descendant text, unnormalized
    pub fn text(&self) -> String {
        let mut output = String::new();
        self.collect_text(&mut output);
        output
    }

    fn collect_text(&self, output: &mut String) {
        for child in &self.children {
            match child {
                XmlNode::Text(text) => output.push_str(text),
                XmlNode::Element(element) => element.collect_text(output),
            }
        }
    }

    /// All descendant elements (including `self`) named `name`
    pub fn descendants_named<'a>(&'a self, name: &str, found: &mut Vec<&'a XmlElement>) {
        if self.name == name {
            found.push(self);
        }
        for child in self.child_elements() {
            child.descendants_named(name, found);
        }
    }
}

/// Parsed XML document
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct XmlTree {
    root: XmlElement,
}

impl XmlTree {
    /// Decode and parse raw XML bytes
    ///
    /// # Errors
    ///
    /// - `DocumentError::Parse` for malformed XML or undecodable bytes
    pub fn parse_bytes(bytes: &[u8]) -> Result<Self> {
        let text = decode_text(bytes)
            .map_err(|e| DocumentError::Parse(format!("XML input is not decodable: {e}")))?;
        Self::parse(&text)
    }

    /// Parse XML text
    ///
    /// DTDs are allowed (DocBook 4 files routinely carry a DOCTYPE) but
    /// external entities are never resolved.
    ///
    /// # Errors
    ///
    /// - `DocumentError::Parse` for malformed XML
    pub fn parse(text: &str) -> Result<Self> {
        let options = roxmltree::ParsingOptions {
            allow_dtd: true,
            ..roxmltree::ParsingOptions::default()
        };
        let doc = roxmltree::Document::parse_with_options(text, options)
            .map_err(|e| DocumentError::Parse(format!("XML parse error: {e}")))?;

        Ok(Self {
            root: copy_element(doc.root_element()),
        })
    }

    pub fn root(&self) -> &XmlElement {
        &self.root
    }

    /// Elements matching an absolute slash path
    pub fn select(&self, path: &str) -> Vec<&XmlElement> {
        let mut steps = path.split('/').filter(|step| !step.is_empty());

        let Some(first) = steps.next() else {
            return Vec::new();
        };
        if self.root.name != first {
            return Vec::new();
        }

        let mut current = vec![&self.root];
        for step in steps {
            current = current
                .into_iter()
                .flat_map(|element| element.child_elements().filter(move |c| c.name == step))
                .collect();
            if current.is_empty() {
                break;
            }
        }
        current
    }

    /// Whitespace-normalized text of every element matching `path`
    pub fn select_text(&self, path: &str) -> Vec<String> {
        self.select(path)
            .into_iter()
            .map(|element| normalize_whitespace(&element.text()))
            .collect()
    }

    /// Texts of every element named `name` anywhere in the document
    pub fn texts_of(&self, name: &str) -> Vec<String> {
        let mut found = Vec::new();
        self.root.descendants_named(name, &mut found);
        found.into_iter().map(XmlElement::text).collect()
    }
}

fn copy_element(node: roxmltree::Node<'_, '_>) -> XmlElement {
    let attributes = node
        .attributes()
        .map(|attr| (attr.name().to_string(), attr.value().to_string()))
        .collect();

    let children = node
        .children()
        .filter_map(|child| {
            if child.is_element() {
                Some(XmlNode::Element(copy_element(child)))
            } else if child.is_text() {
                child.text().map(|text| XmlNode::Text(text.to_string()))
            } else {
                None
            }
        })
        .collect();

    XmlElement {
        name: node.tag_name().name().to_string(),
        attributes,
        children,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const BOOK: &str = r#"<?xml version="1.0"?>
<book lang="fr">
  <title>  The   <emphasis>Great</emphasis> Book </title>
  <bookinfo>
    <title>Info Title</title>
    <author><firstname>Jane</firstname><surname>Doe</surname></author>
  </bookinfo>
  <chapter><para>One</para><section><para>Two</para></section></chapter>
</book>"#;

    #[test]
    fn test_parse_and_root_attribute() {
        let tree = XmlTree::parse(BOOK).unwrap();
        assert_eq!(tree.root().name, "book");
        assert_eq!(tree.root().attribute("lang"), Some("fr"));
    }

    #[test]
    fn test_select_text_normalizes_whitespace() {
        let tree = XmlTree::parse(BOOK).unwrap();
        assert_eq!(tree.select_text("/book/title"), vec!["The Great Book"]);
        assert_eq!(tree.select_text("/book/bookinfo/title"), vec!["Info Title"]);
    }

    #[test]
    fn test_select_requires_matching_root() {
        let tree = XmlTree::parse(BOOK).unwrap();
        assert!(tree.select("/article/title").is_empty());
        assert!(tree.select("/book/missing/title").is_empty());
        assert!(tree.select("").is_empty());
    }

    #[test]
    fn test_texts_of_finds_nested_elements() {
        let tree = XmlTree::parse(BOOK).unwrap();
        assert_eq!(tree.texts_of("para"), vec!["One", "Two"]);
    }

    #[test]
    fn test_namespaced_xml_lang_is_reachable() {
        let tree = XmlTree::parse(
            r#"<book xmlns="http://docbook.org/ns/docbook" xml:lang="de"><title>T</title></book>"#,
        )
        .unwrap();
        assert_eq!(tree.root().attribute("lang"), Some("de"));
        assert_eq!(tree.select_text("/book/title"), vec!["T"]);
    }

    #[test]
    fn test_doctype_is_accepted() {
        let xml = r#"<?xml version="1.0"?>
<!DOCTYPE book PUBLIC "-//OASIS//DTD DocBook XML V4.5//EN" "http://www.oasis-open.org/docbook/xml/4.5/docbookx.dtd">
<book><title>With Doctype</title></book>"#;
        let tree = XmlTree::parse(xml).unwrap();
        assert_eq!(tree.select_text("/book/title"), vec!["With Doctype"]);
    }

    #[test]
    fn test_malformed_xml_is_parse_error() {
        match XmlTree::parse("<book><title>Unclosed</book>") {
            Err(DocumentError::Parse(message)) => assert!(message.contains("XML parse error")),
            other => panic!("Expected Parse error, got: {other:?}"),
        }
    }

    #[test]
    fn test_undecodable_bytes_are_parse_error() {
        match XmlTree::parse_bytes(b"<book>\xFF</book>") {
            Err(DocumentError::Parse(_)) => {}
            other => panic!("Expected Parse error, got: {other:?}"),
        }
    }
}
