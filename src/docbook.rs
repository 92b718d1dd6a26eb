//! DocBook XML adapter
//!
//! DocBook files are parsed into an [`XmlTree`] when read, so malformed XML
//! fails immediately and metadata and language come straight from the
//! source structure. Only the HTML rendition needs the converter.
//!
//! # Language
//!
//! A `lang` / `xml:lang` attribute on the root element wins when it is a
//! recognized tag. Otherwise the text of every `para` element is handed to
//! the detector as plain text.
//!
//! # Metadata
//!
//! DocBook 4 `bookinfo` paths are tried before DocBook 5 `info` paths:
//!
//! | Field      | Candidates                                                     |
//! |------------|----------------------------------------------------------------|
//! | title      | `/book/title`, `/book/bookinfo/title`, `/book/info/title`      |
//! | author     | `firstname` + `surname` under `bookinfo/author` or `info/author/personname` |
//! | publisher  | `bookinfo/corpname`, `bookinfo/publisher/publishername`, `info/publisher/publishername` |
//! | date       | `bookinfo/date`, `bookinfo/pubdate`, `info/date`, `info/pubdate` |

use std::cell::OnceCell;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::bridge::ConversionRequest;
use crate::document::{DocumentServices, FormatAdapter, parse_to_full_text, read_source};
use crate::error::Result;
use crate::fulltext::TextSegment;
use crate::language::{LanguageTag, TextOrigin};
use crate::metadata::{AuthorPolicy, BookMetadata, FieldPolicy, MetadataExtractor, file_stem};
use crate::repair::repair_html;
use crate::xml::XmlTree;

/// Candidate paths for every metadata field
pub const DOCBOOK_POLICY: FieldPolicy = FieldPolicy {
    title: &["/book/title", "/book/bookinfo/title", "/book/info/title"],
    author: AuthorPolicy::Split {
        first_name: &[
            "/book/bookinfo/author/firstname",
            "/book/info/author/personname/firstname",
        ],
        surname: &[
            "/book/bookinfo/author/surname",
            "/book/info/author/personname/surname",
        ],
    },
    publisher: &[
        "/book/bookinfo/corpname",
        "/book/bookinfo/publisher/publishername",
        "/book/info/publisher/publishername",
    ],
    creation_date: &[
        "/book/bookinfo/date",
        "/book/bookinfo/pubdate",
        "/book/info/date",
        "/book/info/pubdate",
    ],
};

/// A DocBook document
#[derive(Debug)]
pub struct DocbookAdapter {
    path: PathBuf,
    raw: Vec<u8>,
    tree: XmlTree,
    services: DocumentServices,
    html: OnceCell<String>,
    language: OnceCell<LanguageTag>,
    metadata: OnceCell<BookMetadata>,
}

impl DocbookAdapter {
    /// Parsed source tree
    pub fn tree(&self) -> &XmlTree {
        &self.tree
    }

    fn paragraph_text(&self) -> String {
        self.tree.texts_of("para").join("\n")
    }
}

impl FormatAdapter for DocbookAdapter {
    const FORMAT: &'static str = "docbook";
    const EXTENSIONS: &'static [&'static str] = &["*.dbk", "*.docbook"];
    const NAME: &'static str = "DocBook";

    fn read(path: &Path, services: &DocumentServices) -> Result<Self> {
        let raw = read_source(path)?;
        let tree = XmlTree::parse_bytes(&raw)?;
        debug!(path = %path.display(), bytes = raw.len(), root = %tree.root().name, "read docbook");

        Ok(Self {
            path: path.to_path_buf(),
            raw,
            tree,
            services: services.clone(),
            html: OnceCell::new(),
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
        let html = self.services.converter.convert(&request)?.into_text()?;
        let html = repair_html(&html, &file_stem(&self.path))?;

        Ok(self.html.get_or_init(|| html))
    }

    fn parse_html(&self) -> Result<Vec<TextSegment>> {
        parse_to_full_text(&self.services, self.get_html()?)
    }

    fn language(&self) -> &LanguageTag {
        self.language.get_or_init(|| {
            self.services.language_resolver().resolve(
                self.tree.root().attribute("lang"),
                || self.paragraph_text(),
                TextOrigin::Plain,
            )
        })
    }

    fn metadata(&self) -> &BookMetadata {
        self.metadata.get_or_init(|| {
            MetadataExtractor::new(&DOCBOOK_POLICY).extract(&self.tree, &self.path, || {
                self.language().clone()
            })
        })
    }
}
