//! Idempotent repair of converter HTML output
//!
//! Downstream consumers require every produced document to carry a `head`
//! with a non-empty `title`. Converters routinely omit the title when the
//! source has no title metadata (RTF almost never does), so this pass fills
//! it in from the source file's stem.
//!
//! # Guarantees
//!
//! - Output that already has a non-empty `head > title` is returned
//!   byte-for-byte unchanged. Pandoc's `-` placeholder (written when a
//!   standalone document has no title) does not count as a title.
//! - Empty output (pandoc prints nothing for an empty document) becomes an
//!   empty document carrying the title.
//! - Repaired output always satisfies the invariant, so a second pass is a
//!   no-op.
//!
//! # Example
//!
//! ```rust
//! use document_normalizer::repair::repair_html;
//!
//! let html = "<html><head></head><body><p>Body</p></body></html>";
//! let repaired = repair_html(html, "report").unwrap();
//! assert!(repaired.contains("<title>report</title>"));
//!
//! let again = repair_html(&repaired, "report").unwrap();
//! assert_eq!(again, repaired);
//! ```

use std::rc::Rc;

use html5ever::serialize::{SerializeOpts, serialize};
use markup5ever_rcdom::{Handle, RcDom, SerializableHandle};
use tracing::debug;

use crate::error::{DocumentError, Result};
use crate::parser::{element_name, find_all_elements, find_first_element, parse_html, text_content};

/// Title used when the source path has no usable stem
pub const UNTITLED: &str = "Untitled";

/// Title pandoc writes when a standalone document has none
const PLACEHOLDER_TITLE: &str = "-";

/// Document substituted for empty converter output
const EMPTY_DOCUMENT: &str = "<html><head></head><body></body></html>";

/// Whether a title text is blank or pandoc's placeholder
pub fn is_placeholder_title(text: &str) -> bool {
    let text = text.trim();
    text.is_empty() || text == PLACEHOLDER_TITLE
}

/// Ensure `html` has a non-empty `head > title`, using `stem` as its text
///
/// # Errors
///
/// - `DocumentError::Encoding` if serialization produces invalid UTF-8
pub fn repair_html(html: &str, stem: &str) -> Result<String> {
    let source = if html.trim().is_empty() {
        debug!("converter produced no output, substituting an empty document");
        EMPTY_DOCUMENT
    } else {
        html
    };
    let dom = parse_html(source)?;

    if has_title(&dom) {
        return Ok(html.to_string());
    }

    let stem = if is_placeholder_title(stem) { UNTITLED } else { stem };
    debug!(title = stem, "inserting fallback title into converter output");

    let head = ensure_head(&dom)?;

    for title in find_all_elements(&dom.document, "title") {
        if is_placeholder_title(&text_content(&title)) {
            detach(&title);
        }
    }

    let title = build_title(stem)?;
    insert_first(&head, title);

    serialize_dom(&dom)
}

/// Whether the document head holds a real (non-placeholder) title
pub fn has_title(dom: &RcDom) -> bool {
    find_first_element(&dom.document, "head")
        .map(|head| {
            find_all_elements(&head, "title")
                .iter()
                .any(|title| !is_placeholder_title(&text_content(title)))
        })
        .unwrap_or(false)
}

/// Return the `head` element, creating it as the first child of `html`
fn ensure_head(dom: &RcDom) -> Result<Handle> {
    let html = find_first_element(&dom.document, "html").ok_or_else(|| {
        DocumentError::InvalidInput("converter output has no html element".to_string())
    })?;

    let existing = html
        .children
        .borrow()
        .iter()
        .find(|child| element_name(child) == Some("head"))
        .cloned();
    if let Some(head) = existing {
        return Ok(head);
    }

    let head = detached_element("<head></head>", "head")?;
    insert_first(&html, head.clone());
    Ok(head)
}

fn build_title(text: &str) -> Result<Handle> {
    let escaped = text.replace('&', "&amp;").replace('<', "&lt;");
    detached_element(&format!("<title>{escaped}</title>"), "title")
}

/// Parse `snippet` and lift the first `name` element out of it
fn detached_element(snippet: &str, name: &str) -> Result<Handle> {
    let fragment = parse_html(snippet)?;
    let node = find_first_element(&fragment.document, name).ok_or_else(|| {
        DocumentError::InvalidInput(format!("could not construct <{name}> element"))
    })?;
    detach(&node);
    Ok(node)
}

fn detach(node: &Handle) {
    if let Some(parent) = node.parent.take().and_then(|weak| weak.upgrade()) {
        parent
            .children
            .borrow_mut()
            .retain(|child| !Rc::ptr_eq(child, node));
    }
}

fn insert_first(parent: &Handle, child: Handle) {
    child.parent.set(Some(Rc::downgrade(parent)));
    parent.children.borrow_mut().insert(0, child);
}

fn serialize_dom(dom: &RcDom) -> Result<String> {
    let mut output = Vec::new();
    let document: SerializableHandle = dom.document.clone().into();
    serialize(&mut output, &document, SerializeOpts::default())
        .map_err(|e| DocumentError::Encoding(format!("HTML serialization failed: {e}")))?;
    String::from_utf8(output)
        .map_err(|e| DocumentError::Encoding(format!("HTML serialization produced invalid UTF-8: {e}")))
}
