//! HTML5 parsing and DOM helpers using html5ever
//!
//! Converter output is parsed with Mozilla's html5ever, which implements the
//! WHATWG HTML5 parsing algorithm. Malformed output is therefore parsed the
//! same way a browser would parse it, and the resulting tree always has an
//! `html` element with `head` and `body` children.
//!
//! # Examples
//!
//! ```rust
//! use document_normalizer::parser::{find_first_element, parse_html, text_content};
//!
//! let dom = parse_html("<html><head><title> Hello </title></head></html>").unwrap();
//! let title = find_first_element(&dom.document, "title").unwrap();
//! assert_eq!(text_content(&title), " Hello ");
//! ```
//!
//! # Configuration
//!
//! The parser uses default html5ever configuration:
//! - **Scripting**: Disabled (scripts are not executed)
//! - **Error Handling**: Errors are collected but parsing continues
//! - **Tree Builder**: Uses RcDom for reference-counted DOM nodes

use html5ever::parse_document;
use html5ever::tendril::TendrilSink;
use markup5ever_rcdom::{Handle, NodeData, RcDom};

use crate::charset::decode_text;
use crate::error::{DocumentError, Result};

/// Parse an HTML string into a DOM tree
///
/// # Errors
///
/// - `DocumentError::InvalidInput`: Input is empty
pub fn parse_html(html: &str) -> Result<RcDom> {
    if html.is_empty() {
        return Err(DocumentError::InvalidInput(
            "HTML input is empty".to_string(),
        ));
    }

    let dom = parse_document(RcDom::default(), Default::default()).one(html);
    Ok(dom)
}

/// Decode HTML bytes (BOM / meta charset aware) and parse them
///
/// # Errors
///
/// - `DocumentError::Encoding`: bytes are invalid for the detected charset
/// - `DocumentError::InvalidInput`: Input is empty
pub fn parse_html_bytes(html: &[u8]) -> Result<RcDom> {
    if html.is_empty() {
        return Err(DocumentError::InvalidInput(
            "HTML input is empty".to_string(),
        ));
    }
    let text = decode_text(html)?;
    parse_html(&text)
}

/// Local name of an element node, `None` for every other node kind
pub fn element_name(node: &Handle) -> Option<&str> {
    match node.data {
        NodeData::Element { ref name, .. } => Some(name.local.as_ref()),
        _ => None,
    }
}

/// Value of attribute `attr` on an element node
pub fn attribute(node: &Handle, attr: &str) -> Option<String> {
    match node.data {
        NodeData::Element { ref attrs, .. } => attrs
            .borrow()
            .iter()
            .find(|a| a.name.local.as_ref() == attr)
            .map(|a| a.value.to_string()),
        _ => None,
    }
}

/// Concatenated text of `node` and all of its descendants
pub fn text_content(node: &Handle) -> String {
    let mut output = String::new();
    collect_text(node, &mut output);
    output
}

fn collect_text(node: &Handle, output: &mut String) {
    match node.data {
        NodeData::Text { ref contents } => {
            output.push_str(&contents.borrow());
        }
        NodeData::Element { .. } | NodeData::Document => {
            for child in node.children.borrow().iter() {
                collect_text(child, output);
            }
        }
        _ => {}
    }
}

/// First element named `name` in document order (depth-first)
pub fn find_first_element(node: &Handle, name: &str) -> Option<Handle> {
    if element_name(node) == Some(name) {
        return Some(node.clone());
    }
    for child in node.children.borrow().iter() {
        if let Some(found) = find_first_element(child, name) {
            return Some(found);
        }
    }
    None
}

/// All elements named `name` in document order
pub fn find_all_elements(node: &Handle, name: &str) -> Vec<Handle> {
    let mut found = Vec::new();
    collect_elements(node, name, &mut found);
    found
}

fn collect_elements(node: &Handle, name: &str, found: &mut Vec<Handle>) {
    if element_name(node) == Some(name) {
        found.push(node.clone());
    }
    for child in node.children.borrow().iter() {
        collect_elements(child, name, found);
    }
}

/// Collapse runs of whitespace into single spaces and trim the ends
pub fn normalize_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}
