//! Rich Text Format adapter
//!
//! RTF has no convenient tree before conversion, so reading only loads the
//! bytes. Everything else is derived from the converter's HTML:
//!
//! - the HTML is repaired so it always carries a `head > title`
//! - language is detected from the HTML in markup mode
//! - metadata is read from the converter's own output (before repair), whose
//!   head carries the RTF `\info` group (`title`, `author`, ...)
//!
//! When conversion fails, `language()` and `metadata()` still answer with
//! the default language and the file-stem title.

use std::cell::OnceCell;
use std::path::{Path, PathBuf};

use markup5ever_rcdom::RcDom;
use tracing::{debug, warn};

use crate::bridge::ConversionRequest;
use crate::document::{DocumentServices, FormatAdapter, parse_to_full_text, read_source};
use crate::error::Result;
use crate::fulltext::TextSegment;
use crate::language::{LanguageTag, TextOrigin};
use crate::metadata::{
    AuthorPolicy, BookMetadata, EmptySource, FieldPolicy, MetadataExtractor, MetadataSource,
    file_stem,
};
use crate::parser::parse_html;
use crate::repair::{is_placeholder_title, repair_html};

/// Candidate queries over the converted HTML
pub const RTF_HTML_POLICY: FieldPolicy = FieldPolicy {
    title: &["title", "meta:title", "h1"],
    author: AuthorPolicy::Whole(&["meta:author"]),
    publisher: &["meta:publisher"],
    creation_date: &["meta:dcterms.date", "meta:date"],
};

/// Converter output with pandoc's placeholder title hidden
struct ConvertedHtml<'a>(&'a RcDom);

impl MetadataSource for ConvertedHtml<'_> {
    fn lookup(&self, query: &str) -> Vec<String> {
        self.0
            .lookup(query)
            .into_iter()
            .filter(|text| !is_placeholder_title(text))
            .collect()
    }
}

/// An RTF document
pub struct RtfAdapter {
    path: PathBuf,
    raw: Vec<u8>,
    services: DocumentServices,
    /// Converter output as produced, before repair
    converted: OnceCell<String>,
    html: OnceCell<String>,
    dom: OnceCell<Option<RcDom>>,
    language: OnceCell<LanguageTag>,
    metadata: OnceCell<BookMetadata>,
}

impl RtfAdapter {
    /// Parsed unrepaired converter output, `None` when conversion failed
    /// or produced nothing
    fn html_tree(&self) -> Option<&RcDom> {
        self.dom
            .get_or_init(|| {
                self.get_html().ok()?;
                let converted = self.converted.get()?;
                if converted.trim().is_empty() {
                    return None;
                }
                parse_html(converted)
                    .inspect_err(|e| debug!(error = %e, "converted HTML did not parse"))
                    .ok()
            })
            .as_ref()
    }
}

impl FormatAdapter for RtfAdapter {
    const FORMAT: &'static str = "rtf";
    const EXTENSIONS: &'static [&'static str] = &["*.rtf"];
    const NAME: &'static str = "Rich Text";

    fn read(path: &Path, services: &DocumentServices) -> Result<Self> {
        let raw = read_source(path)?;
        debug!(path = %path.display(), bytes = raw.len(), "read rtf");

        Ok(Self {
            path: path.to_path_buf(),
            raw,
            services: services.clone(),
            converted: OnceCell::new(),
            html: OnceCell::new(),
            dom: OnceCell::new(),
            language: OnceCell::new(),
            metadata: OnceCell::new(),
        })
    }

    fn path(&self) -> &Path {
        &self.path
    }

    fn get_html(&self) -> Result<&str> {
        if let Some(html) = self.html.get() {
            return Ok(html);
        }

        let request = ConversionRequest::text(&self.raw, Self::FORMAT, "html");
        let converted = self.services.converter.convert(&request)?.into_text()?;
        let html = repair_html(&converted, &file_stem(&self.path))?;

        let _ = self.converted.set(converted);
        Ok(self.html.get_or_init(|| html))
    }

    fn parse_html(&self) -> Result<Vec<TextSegment>> {
        parse_to_full_text(&self.services, self.get_html()?)
    }

    fn language(&self) -> &LanguageTag {
        self.language.get_or_init(|| {
            self.services.language_resolver().resolve(
                None,
                || match self.get_html() {
                    Ok(html) => html.to_string(),
                    Err(e) => {
                        warn!(error = %e, path = %self.path.display(), "no HTML for language detection");
                        String::new()
                    }
                },
                TextOrigin::Markup,
            )
        })
    }

    fn metadata(&self) -> &BookMetadata {
        self.metadata.get_or_init(|| {
            let extractor = MetadataExtractor::new(&RTF_HTML_POLICY);
            let language = || self.language().clone();
            match self.html_tree() {
                Some(dom) => extractor.extract(&ConvertedHtml(dom), &self.path, language),
                None => extractor.extract(&EmptySource, &self.path, language),
            }
        })
    }
}

impl std::fmt::Debug for RtfAdapter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RtfAdapter")
            .field("path", &self.path)
            .field("bytes", &self.raw.len())
            .field("converted", &self.html.get().is_some())
            .finish_non_exhaustive()
    }
}
