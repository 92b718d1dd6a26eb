//! Bibliographic metadata extraction
//!
//! Every field is resolved by an ordered list of candidate queries run
//! against a parsed tree. The first candidate that yields a non-empty text
//! wins; when all of them come up empty the field's default applies:
//!
//! | Field           | Default                                   |
//! |-----------------|-------------------------------------------|
//! | `title`         | file name stem (never empty)              |
//! | `author`        | empty string                              |
//! | `publisher`     | empty string                              |
//! | `creation_date` | `None`, never guessed from other fields   |
//!
//! Queries are interpreted by the [`MetadataSource`]: slash paths for
//! [`XmlTree`], element names and `meta:<name>` lookups for HTML trees.
//!
//! # Creation Dates
//!
//! A matched date is parsed using the document language as a hint and
//! reformatted in that language's long style (`March 5, 2021`,
//! `5. März 2021`, ...). Text that cannot be parsed as a date is kept
//! verbatim.
//!
//! # Examples
//!
//! ```rust
//! use std::path::Path;
//! use document_normalizer::language::LanguageTag;
//! use document_normalizer::metadata::{AuthorPolicy, FieldPolicy, MetadataExtractor};
//! use document_normalizer::xml::XmlTree;
//!
//! const POLICY: FieldPolicy = FieldPolicy {
//!     title: &["/book/title"],
//!     author: AuthorPolicy::Whole(&["/book/author"]),
//!     publisher: &[],
//!     creation_date: &["/book/date"],
//! };
//!
//! let tree = XmlTree::parse("<book><author>Ann</author><date>2021-03-05</date></book>").unwrap();
//! let metadata = MetadataExtractor::new(&POLICY).extract(&tree, Path::new("/tmp/guide.xml"), || {
//!     LanguageTag::parse("en").unwrap()
//! });
//!
//! assert_eq!(metadata.title, "guide");
//! assert_eq!(metadata.author, "Ann");
//! assert_eq!(metadata.creation_date.as_deref(), Some("March 5, 2021"));
//! ```

use std::path::Path;
use std::sync::OnceLock;

use chrono::{DateTime, Days, Locale, NaiveDate, NaiveDateTime};
use markup5ever_rcdom::{Handle, NodeData, RcDom};
use regex::Regex;
use serde::Serialize;
use tracing::debug;

use crate::language::LanguageTag;
use crate::parser::{attribute, element_name, find_all_elements, normalize_whitespace, text_content};
use crate::repair::UNTITLED;
use crate::xml::XmlTree;

/// Canonical bibliographic record of a document
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BookMetadata {
    /// Never empty
    pub title: String,
    pub author: String,
    /// Localized long-form date
    pub creation_date: Option<String>,
    pub publisher: String,
}

/// A tree that can answer metadata queries
pub trait MetadataSource {
    /// Texts matched by `query`, in document order
    fn lookup(&self, query: &str) -> Vec<String>;
}

impl MetadataSource for XmlTree {
    fn lookup(&self, query: &str) -> Vec<String> {
        self.select_text(query)
    }
}

/// Source with no content, used when no tree could be produced
#[derive(Debug, Default, Clone, Copy)]
pub struct EmptySource;

impl MetadataSource for EmptySource {
    fn lookup(&self, _query: &str) -> Vec<String> {
        Vec::new()
    }
}

/// HTML lookups
///
/// - `meta:<name>` matches `<meta name="<name>">` or `<meta property="<name>">`
///   and yields its `content`
/// - anything else matches elements by local name and yields their text
impl MetadataSource for RcDom {
    fn lookup(&self, query: &str) -> Vec<String> {
        match query.strip_prefix("meta:") {
            Some(key) => {
                let mut found = Vec::new();
                traverse_for_meta(&self.document, key, &mut found);
                found
            }
            None => find_all_elements(&self.document, query)
                .iter()
                .map(|element| normalize_whitespace(&text_content(element)))
                .collect(),
        }
    }
}

/// Traverse DOM tree looking for meta tags carrying `key`
fn traverse_for_meta(node: &Handle, key: &str, found: &mut Vec<String>) {
    match node.data {
        NodeData::Element { .. } => {
            if element_name(node) == Some("meta") {
                let matches = attribute(node, "name")
                    .or_else(|| attribute(node, "property"))
                    .is_some_and(|name| name.eq_ignore_ascii_case(key));
                if matches && let Some(content) = attribute(node, "content") {
                    found.push(normalize_whitespace(&content));
                }
            }

            for child in node.children.borrow().iter() {
                traverse_for_meta(child, key, found);
            }
        }
        NodeData::Document => {
            for child in node.children.borrow().iter() {
                traverse_for_meta(child, key, found);
            }
        }
        _ => {}
    }
}

/// How the author field is assembled
#[derive(Debug, Clone, Copy)]
pub enum AuthorPolicy {
    /// Given name and surname resolved independently, joined by one space
    Split {
        first_name: &'static [&'static str],
        surname: &'static [&'static str],
    },
    /// A single candidate chain for the full name
    Whole(&'static [&'static str]),
}

/// Ordered candidate queries for every metadata field
#[derive(Debug, Clone, Copy)]
pub struct FieldPolicy {
    pub title: &'static [&'static str],
    pub author: AuthorPolicy,
    pub publisher: &'static [&'static str],
    pub creation_date: &'static [&'static str],
}

/// First non-empty text produced by `candidates`, in order
pub fn first_non_empty<S>(source: &S, candidates: &[&str]) -> Option<String>
where
    S: MetadataSource + ?Sized,
{
    candidates.iter().find_map(|query| {
        source
            .lookup(query)
            .into_iter()
            .find(|text| !text.trim().is_empty())
    })
}

/// Applies a [`FieldPolicy`] to a [`MetadataSource`]
#[derive(Debug, Clone, Copy)]
pub struct MetadataExtractor<'p> {
    policy: &'p FieldPolicy,
}

impl<'p> MetadataExtractor<'p> {
    pub fn new(policy: &'p FieldPolicy) -> Self {
        Self { policy }
    }

    /// Resolve every field
    ///
    /// # Arguments
    ///
    /// * `source` - Parsed tree to query
    /// * `path` - Source file path, used for the title fallback
    /// * `language` - Produces the document language; only called when a
    ///   creation date has to be localized
    pub fn extract<S, L>(&self, source: &S, path: &Path, language: L) -> BookMetadata
    where
        S: MetadataSource + ?Sized,
        L: FnOnce() -> LanguageTag,
    {
        let title = first_non_empty(source, self.policy.title).unwrap_or_else(|| file_stem(path));

        let author = match self.policy.author {
            AuthorPolicy::Split {
                first_name,
                surname,
            } => [first_non_empty(source, first_name), first_non_empty(source, surname)]
                .into_iter()
                .flatten()
                .collect::<Vec<_>>()
                .join(" "),
            AuthorPolicy::Whole(candidates) => {
                first_non_empty(source, candidates).unwrap_or_default()
            }
        };

        let publisher = first_non_empty(source, self.policy.publisher).unwrap_or_default();

        let creation_date = first_non_empty(source, self.policy.creation_date)
            .map(|raw| localize_date(&raw, &language()));

        BookMetadata {
            title,
            author,
            creation_date,
            publisher,
        }
    }
}

/// File name stem of `path`, or a placeholder when there is none
pub fn file_stem(path: &Path) -> String {
    path.file_stem()
        .map(|stem| stem.to_string_lossy().trim().to_string())
        .filter(|stem| !stem.is_empty())
        .unwrap_or_else(|| UNTITLED.to_string())
}

/// Reformat `raw` in `language`'s long style, keeping it verbatim when it
/// is not a recognizable date
pub fn localize_date(raw: &str, language: &LanguageTag) -> String {
    match parse_date(raw, language) {
        Some(date) => language.format_long_date(date),
        None => {
            debug!(date = raw, "keeping unparseable creation date verbatim");
            raw.trim().to_string()
        }
    }
}

/// Parse a free-form date using `language` as a hint for numeric ordering
///
/// Supported forms:
/// - RFC 3339 / ISO 8601 timestamps (`2021-03-05T10:00:00Z`)
/// - `2021-03-05`, `2021/03/05`, `2021.03.05`, `20210305`
/// - numeric day/month forms (`05/03/2021`), ordered by the language
/// - month names in English or `language` (`March 5th, 2021`, `5 Mar 2021`,
///   `5. März 2021`, `5 de marzo de 2021`), weekday names are ignored
/// - month and year (`March 2021`, `2021-03`), year only (`2021`)
pub fn parse_date(raw: &str, language: &LanguageTag) -> Option<NaiveDate> {
    let text = raw.trim();
    if text.is_empty() {
        return None;
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(text) {
        return Some(dt.date_naive());
    }
    for format in ["%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M:%S"] {
        if let Ok(dt) = NaiveDateTime::parse_from_str(text, format) {
            return Some(dt.date());
        }
    }

    const ISO_FORMATS: &[&str] = &["%Y-%m-%d", "%Y/%m/%d", "%Y.%m.%d", "%Y%m%d"];
    const DAY_FIRST: &[&str] = &["%d/%m/%Y", "%d.%m.%Y", "%d-%m-%Y"];
    const MONTH_FIRST: &[&str] = &["%m/%d/%Y", "%m-%d-%Y", "%m.%d.%Y"];

    let numeric: [&[&str]; 2] = if language.prefers_day_first() {
        [DAY_FIRST, MONTH_FIRST]
    } else {
        [MONTH_FIRST, DAY_FIRST]
    };
    for format in ISO_FORMATS
        .iter()
        .chain(numeric[0].iter())
        .chain(numeric[1].iter())
    {
        if let Ok(date) = NaiveDate::parse_from_str(text, format) {
            return Some(date);
        }
    }

    let words = CalendarWords::for_language(language).translate(&simplify_words(text));
    for format in ["%B %d %Y", "%d %B %Y"] {
        if let Ok(date) = NaiveDate::parse_from_str(&words, format) {
            return Some(date);
        }
    }

    // Month precision: pin to the first day
    if let Ok(date) = NaiveDate::parse_from_str(&format!("1 {words}"), "%d %B %Y") {
        return Some(date);
    }
    if let Ok(date) = NaiveDate::parse_from_str(&format!("{text}-01"), "%Y-%m-%d") {
        return Some(date);
    }

    // Year precision
    if text.len() == 4
        && let Ok(year) = text.parse::<i32>()
        && (1000..=9999).contains(&year)
    {
        return NaiveDate::from_ymd_opt(year, 1, 1);
    }

    None
}

/// Words linking day, month and year (`5 de marzo`, `5th of March`)
const DATE_CONNECTORS: &[&str] = &[
    "am", "de", "del", "den", "der", "el", "la", "le", "of", "on", "the",
];

/// Month and weekday names of a language, plus English
struct CalendarWords {
    /// Lowercased full and abbreviated month names with their month number
    months: Vec<(String, u32)>,
    /// Lowercased full and abbreviated weekday names
    weekdays: Vec<String>,
}

impl CalendarWords {
    fn for_language(language: &LanguageTag) -> Self {
        let locales = [language.chrono_locale(), Locale::en_US];

        let mut months = Vec::with_capacity(48);
        let mut weekdays = Vec::with_capacity(28);
        for locale in locales {
            for month in 1..=12 {
                let Some(date) = NaiveDate::from_ymd_opt(2000, month, 1) else {
                    continue;
                };
                for pattern in ["%B", "%b"] {
                    months.push((calendar_word(date, pattern, locale), month));
                }
            }
            // 2000-01-03 was a Monday
            let Some(monday) = NaiveDate::from_ymd_opt(2000, 1, 3) else {
                continue;
            };
            for offset in 0..7 {
                let Some(date) = monday.checked_add_days(Days::new(offset)) else {
                    continue;
                };
                for pattern in ["%A", "%a"] {
                    weekdays.push(calendar_word(date, pattern, locale));
                }
            }
        }

        months.retain(|(name, _)| !name.is_empty());
        weekdays.retain(|name| !name.is_empty());
        Self { months, weekdays }
    }

    fn month(&self, word: &str) -> Option<u32> {
        self.months
            .iter()
            .find(|(name, _)| name == word)
            .map(|(_, month)| *month)
    }

    /// Rewrite month names in English and drop weekdays and connectors
    fn translate(&self, words: &str) -> String {
        let mut out = Vec::new();
        for word in words.split_whitespace() {
            let lower = word.to_lowercase();
            if let Some(date) = self
                .month(&lower)
                .and_then(|month| NaiveDate::from_ymd_opt(2000, month, 1))
            {
                out.push(date.format("%B").to_string());
            } else if !self.weekdays.contains(&lower) && !DATE_CONNECTORS.contains(&lower.as_str()) {
                out.push(word.to_string());
            }
        }
        out.join(" ")
    }
}

fn calendar_word(date: NaiveDate, pattern: &str, locale: Locale) -> String {
    date.format_localized(pattern, locale)
        .to_string()
        .trim()
        .trim_end_matches('.')
        .to_lowercase()
}

/// Drop ordinal suffixes, commas and periods so written forms share formats
fn simplify_words(text: &str) -> String {
    static ORDINAL: OnceLock<Option<Regex>> = OnceLock::new();
    let ordinal =
        ORDINAL.get_or_init(|| Regex::new(r"(?i)\b(\d{1,2})(st|nd|rd|th|er)\b").ok());

    let text = match ordinal {
        Some(regex) => regex.replace_all(text, "$1").into_owned(),
        None => text.to_string(),
    };
    normalize_whitespace(&text.replace([',', '.'], " "))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse_html;

    fn en() -> LanguageTag {
        LanguageTag::parse("en").unwrap()
    }

    const XML_POLICY: FieldPolicy = FieldPolicy {
        title: &["/book/title", "/book/bookinfo/title"],
        author: AuthorPolicy::Split {
            first_name: &["/book/bookinfo/author/firstname"],
            surname: &["/book/bookinfo/author/surname"],
        },
        publisher: &["/book/bookinfo/corpname"],
        creation_date: &["/book/bookinfo/date"],
    };

    fn extract_xml(xml: &str) -> BookMetadata {
        let tree = XmlTree::parse(xml).unwrap();
        MetadataExtractor::new(&XML_POLICY).extract(&tree, Path::new("/books/manual.dbk"), en)
    }

    // ============================================================================
    // Fallback chains
    // ============================================================================

    #[test]
    fn test_primary_candidate_wins() {
        let metadata = extract_xml(
            "<book><title>Primary</title><bookinfo><title>Alternate</title></bookinfo></book>",
        );
        assert_eq!(metadata.title, "Primary");
    }

    #[test]
    fn test_empty_primary_falls_through() {
        let metadata =
            extract_xml("<book><title>  </title><bookinfo><title>Alternate</title></bookinfo></book>");
        assert_eq!(metadata.title, "Alternate");
    }

    #[test]
    fn test_title_falls_back_to_stem() {
        let metadata = extract_xml("<book><chapter/></book>");
        assert_eq!(metadata.title, "manual");
    }

    #[test]
    fn test_author_first_name_only() {
        let metadata = extract_xml(
            "<book><bookinfo><author><firstname>Jane</firstname></author></bookinfo></book>",
        );
        assert_eq!(metadata.author, "Jane");
    }

    #[test]
    fn test_author_surname_only() {
        let metadata =
            extract_xml("<book><bookinfo><author><surname>Doe</surname></author></bookinfo></book>");
        assert_eq!(metadata.author, "Doe");
    }

    #[test]
    fn test_author_both_parts() {
        let metadata = extract_xml(
            "<book><bookinfo><author><firstname>Jane</firstname><surname>Doe</surname></author></bookinfo></book>",
        );
        assert_eq!(metadata.author, "Jane Doe");
    }

    #[test]
    fn test_defaults_when_absent() {
        let metadata = extract_xml("<book/>");
        assert_eq!(metadata.author, "");
        assert_eq!(metadata.publisher, "");
        assert_eq!(metadata.creation_date, None);
    }

    #[test]
    fn test_language_not_requested_without_date() {
        let tree = XmlTree::parse("<book><title>T</title></book>").unwrap();
        let metadata = MetadataExtractor::new(&XML_POLICY).extract(
            &tree,
            Path::new("t.dbk"),
            || panic!("language must not be resolved"),
        );
        assert_eq!(metadata.title, "T");
    }

    #[test]
    fn test_date_is_localized() {
        let metadata =
            extract_xml("<book><bookinfo><date>2021-03-05</date></bookinfo></book>");
        assert_eq!(metadata.creation_date.as_deref(), Some("March 5, 2021"));
    }

    #[test]
    fn test_unparseable_date_is_kept() {
        let metadata =
            extract_xml("<book><bookinfo><date> Spring, sometime </date></bookinfo></book>");
        assert_eq!(metadata.creation_date.as_deref(), Some("Spring, sometime"));
    }

    // ============================================================================
    // HTML source
    // ============================================================================

    #[test]
    fn test_html_meta_lookup() {
        let dom = parse_html(
            "<html><head><title>Doc</title>\
             <meta name=\"author\" content=\"John  Smith\">\
             <meta property=\"dcterms.date\" content=\"2020-01-02\"></head></html>",
        )
        .unwrap();
        assert_eq!(dom.lookup("title"), vec!["Doc"]);
        assert_eq!(dom.lookup("meta:author"), vec!["John Smith"]);
        assert_eq!(dom.lookup("meta:dcterms.date"), vec!["2020-01-02"]);
        assert!(dom.lookup("meta:publisher").is_empty());
    }

    #[test]
    fn test_meta_without_content_is_ignored() {
        let dom = parse_html("<html><head><meta name=\"author\"></head></html>").unwrap();
        assert!(dom.lookup("meta:author").is_empty());
    }

    // ============================================================================
    // Dates
    // ============================================================================

    fn ymd(y: i32, m: u32, d: u32) -> Option<NaiveDate> {
        NaiveDate::from_ymd_opt(y, m, d)
    }

    #[test]
    fn test_parse_iso_forms() {
        assert_eq!(parse_date("2021-03-05", &en()), ymd(2021, 3, 5));
        assert_eq!(parse_date("2021/03/05", &en()), ymd(2021, 3, 5));
        assert_eq!(parse_date("20210305", &en()), ymd(2021, 3, 5));
        assert_eq!(parse_date("2021-03-05T10:30:00Z", &en()), ymd(2021, 3, 5));
    }

    #[test]
    fn test_parse_numeric_order_follows_language() {
        let fr = LanguageTag::parse("fr").unwrap();
        assert_eq!(parse_date("05/03/2021", &fr), ymd(2021, 3, 5));
        assert_eq!(parse_date("05/03/2021", &en()), ymd(2021, 5, 3));
        // Impossible in the preferred order, valid in the other
        assert_eq!(parse_date("25/03/2021", &en()), ymd(2021, 3, 25));
    }

    #[test]
    fn test_parse_english_month_names() {
        assert_eq!(parse_date("March 5, 2021", &en()), ymd(2021, 3, 5));
        assert_eq!(parse_date("March 5th, 2021", &en()), ymd(2021, 3, 5));
        assert_eq!(parse_date("5 Mar 2021", &en()), ymd(2021, 3, 5));
        assert_eq!(parse_date("Friday, March 5, 2021", &en()), ymd(2021, 3, 5));
    }

    #[test]
    fn test_parse_localized_month_names() {
        let fr = LanguageTag::parse("fr").unwrap();
        let de = LanguageTag::parse("de").unwrap();
        let es = LanguageTag::parse("es").unwrap();
        assert_eq!(parse_date("5 mars 2021", &fr), ymd(2021, 3, 5));
        assert_eq!(parse_date("1er juin 2018", &fr), ymd(2018, 6, 1));
        assert_eq!(parse_date("vendredi 5 mars 2021", &fr), ymd(2021, 3, 5));
        assert_eq!(parse_date("5. März 2021", &de), ymd(2021, 3, 5));
        assert_eq!(parse_date("12. Okt. 2020", &de), ymd(2020, 10, 12));
        assert_eq!(parse_date("5 de marzo de 2021", &es), ymd(2021, 3, 5));
        assert_eq!(parse_date("marzo de 2021", &es), ymd(2021, 3, 1));
    }

    #[test]
    fn test_english_names_parse_under_any_language() {
        let fr = LanguageTag::parse("fr").unwrap();
        assert_eq!(parse_date("March 5, 2021", &fr), ymd(2021, 3, 5));
        assert_eq!(parse_date("5th of March 2021", &en()), ymd(2021, 3, 5));
    }

    #[test]
    fn test_localized_date_is_reformatted() {
        let de = LanguageTag::parse("de").unwrap();
        assert_eq!(localize_date("5. März 2021", &de), "5. März 2021");
        let fr = LanguageTag::parse("fr").unwrap();
        assert_eq!(localize_date("1er juin 2018", &fr), "1 juin 2018");
    }

    #[test]
    fn test_parse_reduced_precision() {
        assert_eq!(parse_date("March 2021", &en()), ymd(2021, 3, 1));
        assert_eq!(parse_date("2021-03", &en()), ymd(2021, 3, 1));
        assert_eq!(parse_date("2021", &en()), ymd(2021, 1, 1));
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert_eq!(parse_date("", &en()), None);
        assert_eq!(parse_date("sometime", &en()), None);
        assert_eq!(parse_date("123", &en()), None);
    }

    #[test]
    fn test_file_stem() {
        assert_eq!(file_stem(Path::new("/a/report.rtf")), "report");
        assert_eq!(file_stem(Path::new("archive.tar.gz")), "archive.tar");
        assert_eq!(file_stem(Path::new("/")), UNTITLED);
    }
}
