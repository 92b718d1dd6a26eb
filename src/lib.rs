//! Document Normalizer - DocBook and RTF to canonical HTML
//!
//! This library turns heterogeneous document formats into a canonical HTML
//! representation suitable for full-text extraction, while resolving the
//! document's bibliographic metadata and natural language.
//!
//! # Architecture
//!
//! The library is structured into several modules:
//! - `bridge`: Synchronous bridge to the external converter (pandoc)
//! - `process`: Silent, fully buffered subprocess execution
//! - `document`: Shared adapter contract and format discovery
//! - `docbook` / `rtf`: Format adapters
//! - `metadata`: Fallback-chain metadata extraction and date localization
//! - `language`: Declared-tag and heuristic language resolution
//! - `repair`: Idempotent repair of converter HTML output
//! - `fulltext`: Full-text segment extraction boundary
//! - `parser` / `xml`: HTML5 and XML tree parsing
//! - `charset`: Character encoding detection and decoding
//! - `config`: Bridge options and environment overrides
//!
//! # Example
//!
//! ```rust,no_run
//! use document_normalizer::{AnyDocument, DocumentServices};
//!
//! let services = DocumentServices::default();
//! let doc = AnyDocument::open("/books/manual.dbk", &services)?;
//!
//! println!("{} ({})", doc.metadata().title, doc.language());
//! let html = doc.get_html()?;
//! # let _ = html;
//! # Ok::<(), document_normalizer::DocumentError>(())
//! ```
//!
//! # Threading
//!
//! Documents memoize their derived values in `OnceCell`s and share
//! collaborators through `Rc`, so they are intentionally neither `Send` nor
//! `Sync`. Each document is used from one thread.

// Module declarations
pub mod bridge;
pub mod charset;
pub mod config;
pub mod docbook;
pub mod document;
pub mod error;
pub mod fulltext;
pub mod language;
pub mod metadata;
pub mod parser;
pub mod process;
pub mod repair;
pub mod rtf;
pub mod xml;

// Re-export main types for convenience
pub use bridge::{ConversionOutput, ConversionRequest, Converter, ConverterBridge, OutputMode};
pub use config::BridgeOptions;
pub use docbook::DocbookAdapter;
pub use document::{AnyDocument, DocumentServices, FormatAdapter, supported_formats};
pub use error::{DocumentError, Result};
pub use language::LanguageTag;
pub use metadata::BookMetadata;
pub use repair::repair_html;
pub use rtf::RtfAdapter;
