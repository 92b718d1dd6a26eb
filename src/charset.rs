//! Character encoding detection and strict decoding
//!
//! Converter output and DocBook input arrive as raw bytes. Before they can be
//! parsed they must be decoded to UTF-8, and decoding is strict: a byte
//! sequence that is invalid for the detected charset is an error rather than
//! a source of replacement characters.
//!
//! # Detection Cascade
//!
//! 1. **Byte order mark**: UTF-8, UTF-16LE and UTF-16BE BOMs win outright
//! 2. **In-band declaration**: `<meta charset>`, `<meta http-equiv>` or the
//!    `encoding` pseudo-attribute of an XML declaration
//! 3. **Default to UTF-8**
//!
//! Declarations are only searched for in the first 1024 bytes.
//!
//! # Examples
//!
//! ```rust
//! use document_normalizer::charset::{decode_text, detect_charset};
//!
//! let html = b"<html><head><meta charset=\"ISO-8859-1\"></head></html>";
//! assert_eq!(detect_charset(html), "ISO-8859-1");
//!
//! let text = decode_text(b"<p>Caf\xE9</p><meta charset=latin1>").unwrap();
//! assert_eq!(text, "<p>Caf\u{e9}</p><meta charset=latin1>");
//! ```

use std::borrow::Cow;
use std::sync::OnceLock;

use encoding_rs::Encoding;
use regex::Regex;

use crate::error::{DocumentError, Result};

/// Default charset when detection fails
const DEFAULT_CHARSET: &str = "UTF-8";

/// Maximum bytes to scan for in-band charset declarations
const DECLARATION_SCAN_LIMIT: usize = 1024;

/// Detect the character encoding of `bytes`
///
/// Returns the normalized (uppercase) charset label. Always returns a value,
/// defaulting to `"UTF-8"`.
pub fn detect_charset(bytes: &[u8]) -> String {
    if let Some((encoding, _)) = Encoding::for_bom(bytes) {
        return normalize_charset(encoding.name());
    }

    if let Some(charset) = extract_declared_charset(bytes) {
        return normalize_charset(&charset);
    }

    DEFAULT_CHARSET.to_string()
}

/// Extract an in-band charset declaration
///
/// # Supported Formats
///
/// - HTML5: `<meta charset="UTF-8">`
/// - HTML4: `<meta http-equiv="Content-Type" content="text/html; charset=UTF-8">`
/// - XML: `<?xml version="1.0" encoding="ISO-8859-1"?>`
pub fn extract_declared_charset(bytes: &[u8]) -> Option<String> {
    let scan_limit = std::cmp::min(bytes.len(), DECLARATION_SCAN_LIMIT);

    // Lossy conversion is fine here: declarations are plain ASCII
    let prefix = String::from_utf8_lossy(&bytes[..scan_limit]);

    static PATTERNS: OnceLock<Vec<Regex>> = OnceLock::new();
    let patterns = PATTERNS.get_or_init(|| {
        [
            r#"(?i)<meta\s+charset\s*=\s*["']?([^"';>\s/]+)"#,
            r#"(?i)<meta\s+http-equiv\s*=\s*"?Content-Type"?\s+content\s*=\s*"?[^">]*charset\s*=\s*([^";>\s]+)"?"#,
            r#"(?i)<\?xml[^>]*\sencoding\s*=\s*["']([^"']+)["']"#,
        ]
        .iter()
        .filter_map(|pattern| Regex::new(pattern).ok())
        .collect()
    });

    patterns.iter().find_map(|regex| {
        regex
            .captures(&prefix)
            .and_then(|caps| caps.get(1))
            .map(|m| m.as_str().to_string())
    })
}

/// Normalize a charset label to uppercase
pub fn normalize_charset(charset: &str) -> String {
    charset.to_uppercase()
}

/// Decode `bytes` strictly using the detected charset
///
/// # Errors
///
/// Returns `DocumentError::Encoding` when the charset is unknown or the
/// bytes are invalid for it.
pub fn decode_text(bytes: &[u8]) -> Result<String> {
    let charset = detect_charset(bytes);
    decode_with_charset(bytes, &charset).map(Cow::into_owned)
}

/// Decode `bytes` strictly using `charset`, stripping a matching BOM
pub fn decode_with_charset<'a>(bytes: &'a [u8], charset: &str) -> Result<Cow<'a, str>> {
    let encoding = Encoding::for_label(charset.as_bytes()).ok_or_else(|| {
        DocumentError::Encoding(format!("Unsupported charset '{}'", charset))
    })?;

    let body = match Encoding::for_bom(bytes) {
        Some((bom_encoding, bom_len)) if bom_encoding == encoding => &bytes[bom_len..],
        _ => bytes,
    };

    if encoding == encoding_rs::UTF_8 {
        return std::str::from_utf8(body).map(Cow::Borrowed).map_err(|e| {
            DocumentError::Encoding(format!(
                "Invalid UTF-8 at byte position {}: {}",
                e.valid_up_to(),
                e
            ))
        });
    }

    encoding
        .decode_without_bom_handling_and_without_replacement(body)
        .ok_or_else(|| {
            DocumentError::Encoding(format!("Invalid byte sequence for charset '{}'", charset))
        })
}
