//! Full-text extraction boundary
//!
//! Search and segmentation live outside this crate. What documents hand
//! over is the contract "extract ordered text segments from HTML", modeled
//! by [`FullTextExtractor`]. [`HtmlTextExtractor`] is the default
//! implementation: one segment per block-level element, in document order.

use markup5ever_rcdom::{Handle, NodeData};
use serde::Serialize;

use crate::error::Result;
use crate::parser::{element_name, normalize_whitespace, parse_html};

/// Block-level elements that start a new segment
const BLOCK_ELEMENTS: &[&str] = &[
    "p", "h1", "h2", "h3", "h4", "h5", "h6", "li", "dt", "dd", "td", "th", "pre", "blockquote",
    "caption", "figcaption",
];

/// Elements whose content never reaches the reader
const SKIPPED_ELEMENTS: &[&str] = &["head", "script", "style", "template", "noscript"];

/// One ordered block of document text
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TextSegment {
    /// Zero-based position in the document
    pub index: usize,
    pub text: String,
}

/// "Extract ordered text segments from HTML"
pub trait FullTextExtractor {
    fn extract(&self, html: &str) -> Result<Vec<TextSegment>>;
}

/// Default block-based extractor
#[derive(Debug, Default, Clone, Copy)]
pub struct HtmlTextExtractor;

impl FullTextExtractor for HtmlTextExtractor {
    fn extract(&self, html: &str) -> Result<Vec<TextSegment>> {
        if html.trim().is_empty() {
            return Ok(Vec::new());
        }
        let dom = parse_html(html)?;

        let mut blocks = Vec::new();
        let mut pending = String::new();
        walk(&dom.document, &mut pending, &mut blocks);
        flush(&mut pending, &mut blocks);

        Ok(blocks
            .into_iter()
            .enumerate()
            .map(|(index, text)| TextSegment { index, text })
            .collect())
    }
}

/// Visible text of an HTML document as a single string, blocks separated
/// by newlines
pub fn html_to_text(extractor: &dyn FullTextExtractor, html: &str) -> Result<String> {
    let segments = extractor.extract(html)?;
    Ok(segments
        .into_iter()
        .map(|segment| segment.text)
        .collect::<Vec<_>>()
        .join("\n"))
}

fn walk(node: &Handle, pending: &mut String, blocks: &mut Vec<String>) {
    match node.data {
        NodeData::Text { ref contents } => {
            pending.push_str(&contents.borrow());
        }
        NodeData::Element { .. } => {
            let name = element_name(node).unwrap_or_default();
            if SKIPPED_ELEMENTS.contains(&name) {
                return;
            }
            let is_block = BLOCK_ELEMENTS.contains(&name);
            if is_block {
                flush(pending, blocks);
            }
            if name == "br" {
                pending.push(' ');
            }
            for child in node.children.borrow().iter() {
                walk(child, pending, blocks);
            }
            if is_block {
                flush(pending, blocks);
            }
        }
        NodeData::Document => {
            for child in node.children.borrow().iter() {
                walk(child, pending, blocks);
            }
        }
        _ => {}
    }
}

fn flush(pending: &mut String, blocks: &mut Vec<String>) {
    let text = normalize_whitespace(pending);
    pending.clear();
    if !text.is_empty() {
        blocks.push(text);
    }
}
