//! Shared document contract and format discovery
//!
//! Every input format is handled by an adapter implementing
//! [`FormatAdapter`]. Adapters are read once from a path and then expose
//! lazily computed, memoized views of the document:
//!
//! - `get_html()`: canonical HTML produced by the converter
//! - `parse_html()`: ordered text segments of that HTML
//! - `language()`: resolved natural language
//! - `metadata()`: bibliographic record
//!
//! [`AnyDocument`] closes the set of adapters so callers can open a file
//! without knowing its format up front.

use std::fs;
use std::path::Path;
use std::rc::Rc;

use glob::{MatchOptions, Pattern};
use tracing::debug;

use crate::bridge::{Converter, ConverterBridge};
use crate::config::BridgeOptions;
use crate::docbook::DocbookAdapter;
use crate::error::{DocumentError, Result};
use crate::fulltext::{FullTextExtractor, HtmlTextExtractor, TextSegment};
use crate::language::{LanguageDetector, LanguageResolver, LanguageTag, WhatlangDetector};
use crate::metadata::BookMetadata;
use crate::rtf::RtfAdapter;

/// Collaborators shared by all adapters
#[derive(Clone)]
pub struct DocumentServices {
    pub converter: Rc<dyn Converter>,
    pub detector: Rc<dyn LanguageDetector>,
    pub extractor: Rc<dyn FullTextExtractor>,
    /// Language used when detection has nothing to work with
    pub default_language: String,
}

impl DocumentServices {
    /// Services around `converter` with the default detector and extractor
    pub fn new(converter: Rc<dyn Converter>) -> Self {
        Self {
            converter,
            detector: Rc::new(WhatlangDetector),
            extractor: Rc::new(HtmlTextExtractor),
            default_language: crate::config::DEFAULT_LANGUAGE.to_string(),
        }
    }

    /// Services backed by a [`ConverterBridge`] configured from `options`
    pub fn from_options(options: BridgeOptions) -> Self {
        let default_language = options.default_language.clone();
        Self {
            default_language,
            ..Self::new(Rc::new(ConverterBridge::new(options)))
        }
    }

    pub fn with_detector(mut self, detector: Rc<dyn LanguageDetector>) -> Self {
        self.detector = detector;
        self
    }

    pub fn with_extractor(mut self, extractor: Rc<dyn FullTextExtractor>) -> Self {
        self.extractor = extractor;
        self
    }

    pub fn language_resolver(&self) -> LanguageResolver {
        LanguageResolver::new(Rc::clone(&self.detector), &self.default_language)
    }
}

impl Default for DocumentServices {
    /// Bridge configured from the `DOCNORM_*` environment
    fn default() -> Self {
        Self::from_options(BridgeOptions::from_env())
    }
}

impl std::fmt::Debug for DocumentServices {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DocumentServices")
            .field("default_language", &self.default_language)
            .finish_non_exhaustive()
    }
}

/// Contract implemented by every format adapter
pub trait FormatAdapter: Sized {
    /// Converter format name
    const FORMAT: &'static str;
    /// File name glob patterns, matched case-insensitively
    const EXTENSIONS: &'static [&'static str];
    /// Display name
    const NAME: &'static str;

    /// Load (and for structured formats, parse) the document at `path`
    ///
    /// # Errors
    ///
    /// - `DocumentError::Io` if the file cannot be read
    /// - `DocumentError::Parse` if structured input is malformed
    fn read(path: &Path, services: &DocumentServices) -> Result<Self>;

    fn path(&self) -> &Path;

    /// Complete HTML document, converted once and cached
    ///
    /// A failed conversion is not cached; the next call retries.
    fn get_html(&self) -> Result<&str>;

    /// Ordered text segments of [`FormatAdapter::get_html`]
    fn parse_html(&self) -> Result<Vec<TextSegment>>;

    /// Resolved language; never fails
    fn language(&self) -> &LanguageTag;

    /// Bibliographic metadata; never fails
    fn metadata(&self) -> &BookMetadata;
}

/// Hand converted HTML to the full-text collaborator
pub fn parse_to_full_text(services: &DocumentServices, html: &str) -> Result<Vec<TextSegment>> {
    services.extractor.extract(html)
}

/// Read a whole input file
pub(crate) fn read_source(path: &Path) -> Result<Vec<u8>> {
    fs::read(path).map_err(|e| DocumentError::io(path, e))
}

/// Whether `path`'s file name matches one of `patterns`, ignoring case
pub fn matches_extensions(path: &Path, patterns: &[&str]) -> bool {
    let Some(name) = path.file_name().map(|name| name.to_string_lossy()) else {
        return false;
    };
    let options = MatchOptions {
        case_sensitive: false,
        ..MatchOptions::new()
    };
    patterns.iter().any(|pattern| {
        Pattern::new(pattern).is_ok_and(|pattern| pattern.matches_with(&name, options))
    })
}

/// `(FORMAT, EXTENSIONS)` of every adapter, for format discovery
pub fn supported_formats() -> Vec<(&'static str, &'static [&'static str])> {
    vec![
        (DocbookAdapter::FORMAT, DocbookAdapter::EXTENSIONS),
        (RtfAdapter::FORMAT, RtfAdapter::EXTENSIONS),
    ]
}

/// A document of any supported format
#[derive(Debug)]
pub enum AnyDocument {
    Docbook(DocbookAdapter),
    Rtf(RtfAdapter),
}

impl AnyDocument {
    /// Open `path` with the adapter whose extension patterns match it
    ///
    /// # Errors
    ///
    /// - `DocumentError::UnsupportedFormat` if no adapter matches
    /// - any error of the chosen adapter's `read`
    pub fn open(path: impl AsRef<Path>, services: &DocumentServices) -> Result<Self> {
        let path = path.as_ref();

        if matches_extensions(path, DocbookAdapter::EXTENSIONS) {
            debug!(path = %path.display(), format = DocbookAdapter::FORMAT, "opening document");
            return DocbookAdapter::read(path, services).map(AnyDocument::Docbook);
        }
        if matches_extensions(path, RtfAdapter::EXTENSIONS) {
            debug!(path = %path.display(), format = RtfAdapter::FORMAT, "opening document");
            return RtfAdapter::read(path, services).map(AnyDocument::Rtf);
        }

        Err(DocumentError::UnsupportedFormat(path.display().to_string()))
    }

    pub fn format(&self) -> &'static str {
        match self {
            AnyDocument::Docbook(_) => DocbookAdapter::FORMAT,
            AnyDocument::Rtf(_) => RtfAdapter::FORMAT,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            AnyDocument::Docbook(_) => DocbookAdapter::NAME,
            AnyDocument::Rtf(_) => RtfAdapter::NAME,
        }
    }

    pub fn path(&self) -> &Path {
        match self {
            AnyDocument::Docbook(doc) => doc.path(),
            AnyDocument::Rtf(doc) => doc.path(),
        }
    }

    pub fn get_html(&self) -> Result<&str> {
        match self {
            AnyDocument::Docbook(doc) => doc.get_html(),
            AnyDocument::Rtf(doc) => doc.get_html(),
        }
    }

    pub fn parse_html(&self) -> Result<Vec<TextSegment>> {
        match self {
            AnyDocument::Docbook(doc) => doc.parse_html(),
            AnyDocument::Rtf(doc) => doc.parse_html(),
        }
    }

    pub fn language(&self) -> &LanguageTag {
        match self {
            AnyDocument::Docbook(doc) => doc.language(),
            AnyDocument::Rtf(doc) => doc.language(),
        }
    }

    pub fn metadata(&self) -> &BookMetadata {
        match self {
            AnyDocument::Docbook(doc) => doc.metadata(),
            AnyDocument::Rtf(doc) => doc.metadata(),
        }
    }
}
