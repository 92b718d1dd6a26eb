//! Document language resolution
//!
//! A document's language comes from one of two places:
//!
//! 1. A declared tag (e.g. DocBook's `lang` attribute). Tags that do not map
//!    to a recognized ISO 639-1 language are treated as absent, never as
//!    errors.
//! 2. Heuristic detection over extracted text, through the
//!    [`LanguageDetector`] trait. The default detector is backed by
//!    `whatlang`; markup-originated text has its tags stripped first.
//!
//! Resolution never fails: with no usable tag and no usable text the
//! configured default language is returned.

use std::fmt;
use std::rc::Rc;

use chrono::{Locale, NaiveDate};
use tracing::debug;

use crate::fulltext::{HtmlTextExtractor, html_to_text};

/// Every ISO 639-1 language code
const ISO_639_1: &str = "aa ab ae af ak am an ar as av ay az ba be bg bh bi bm bn bo br bs ca ce \
ch co cr cs cu cv cy da de dv dz ee el en eo es et eu fa ff fi fj fo fr fy ga gd gl gn gu gv ha he \
hi ho hr ht hu hy hz ia id ie ig ii ik io is it iu ja jv ka kg ki kj kk kl km kn ko kr ks ku kv kw \
ky la lb lg li ln lo lt lu lv mg mh mi mk ml mn mr ms mt my na nb nd ne ng nl nn no nr nv ny oc oj \
om or os pa pi pl ps pt qu rm rn ro ru rw sa sc sd se sg si sk sl sm sn so sq sr ss st su sv sw ta \
te tg th ti tk tl tn to tr ts tt tw ty ug uk ur uz ve vi vo wa wo xh yi yo za zh zu";

/// ISO 639-3 codes reported by the detector mapped to ISO 639-1
const ISO_639_3_TO_1: &[(&str, &str)] = &[
    ("afr", "af"), ("aka", "ak"), ("amh", "am"), ("ara", "ar"), ("aze", "az"), ("bel", "be"),
    ("ben", "bn"), ("bul", "bg"), ("cat", "ca"), ("ces", "cs"), ("cmn", "zh"), ("dan", "da"),
    ("deu", "de"), ("ell", "el"), ("eng", "en"), ("epo", "eo"), ("est", "et"), ("fin", "fi"),
    ("fra", "fr"), ("guj", "gu"), ("heb", "he"), ("hin", "hi"), ("hrv", "hr"), ("hun", "hu"),
    ("hye", "hy"), ("ind", "id"), ("ita", "it"), ("jav", "jv"), ("jpn", "ja"), ("kan", "kn"),
    ("kat", "ka"), ("khm", "km"), ("kor", "ko"), ("lat", "la"), ("lav", "lv"), ("lit", "lt"),
    ("mal", "ml"), ("mar", "mr"), ("mkd", "mk"), ("mya", "my"), ("nep", "ne"), ("nld", "nl"),
    ("nob", "nb"), ("ori", "or"), ("pan", "pa"), ("pes", "fa"), ("pol", "pl"), ("por", "pt"),
    ("ron", "ro"), ("rus", "ru"), ("sin", "si"), ("slk", "sk"), ("slv", "sl"), ("sna", "sn"),
    ("spa", "es"), ("srp", "sr"), ("swe", "sv"), ("tam", "ta"), ("tel", "te"), ("tgl", "tl"),
    ("tha", "th"), ("tuk", "tk"), ("tur", "tr"), ("ukr", "uk"), ("urd", "ur"), ("uzb", "uz"),
    ("vie", "vi"), ("yid", "yi"), ("zul", "zu"),
];

/// Region assumed for a bare language code when picking date locales
const DEFAULT_REGIONS: &[(&str, &str)] = &[
    ("ar", "SA"), ("be", "BY"), ("bn", "BD"), ("ca", "ES"), ("cs", "CZ"), ("da", "DK"),
    ("el", "GR"), ("en", "US"), ("et", "EE"), ("fa", "IR"), ("ga", "IE"), ("he", "IL"),
    ("hi", "IN"), ("hy", "AM"), ("ja", "JP"), ("ka", "GE"), ("kk", "KZ"), ("ko", "KR"),
    ("ms", "MY"), ("nb", "NO"), ("nn", "NO"), ("sl", "SI"), ("sq", "AL"), ("sr", "RS"),
    ("sv", "SE"), ("ta", "IN"), ("te", "IN"), ("uk", "UA"), ("ur", "PK"), ("vi", "VN"),
    ("zh", "CN"),
];

/// Resolved locale identifier: ISO 639-1 language plus optional region
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct LanguageTag {
    language: String,
    region: Option<String>,
}

impl LanguageTag {
    /// Parse a BCP 47 / POSIX style tag (`en`, `en-US`, `pt_BR`, `fr-FR.UTF-8`)
    ///
    /// Returns `None` when the language subtag is not a recognized ISO 639-1
    /// (or detector-reported ISO 639-3) code.
    pub fn parse(tag: &str) -> Option<Self> {
        let tag = tag.trim();
        let tag = tag.split(['.', '@']).next().unwrap_or(tag);
        let mut parts = tag.split(['-', '_']);

        let primary = parts.next()?.to_ascii_lowercase();
        let language = match primary.len() {
            2 if is_iso_639_1(&primary) => primary,
            3 => iso_639_3_to_1(&primary)?.to_string(),
            _ => return None,
        };

        let region = parts
            .find(|part| part.len() == 2 && part.chars().all(|c| c.is_ascii_alphabetic()))
            .map(str::to_ascii_uppercase);

        Some(Self { language, region })
    }

    /// Two-letter ISO 639-1 language code
    pub fn two_letter_language_code(&self) -> &str {
        &self.language
    }

    pub fn region(&self) -> Option<&str> {
        self.region.as_deref()
    }

    /// Best matching date/time locale for this language
    pub fn chrono_locale(&self) -> Locale {
        let mut candidates = Vec::with_capacity(3);
        if let Some(region) = &self.region {
            candidates.push(format!("{}_{}", self.language, region));
        }
        if let Some((_, region)) = DEFAULT_REGIONS.iter().find(|(l, _)| *l == self.language) {
            candidates.push(format!("{}_{}", self.language, region));
        }
        candidates.push(format!(
            "{}_{}",
            self.language,
            self.language.to_ascii_uppercase()
        ));

        candidates
            .iter()
            .find_map(|name| Locale::try_from(name.as_str()).ok())
            .unwrap_or(Locale::en_US)
    }

    /// Format `date` in this language's long localized style
    pub fn format_long_date(&self, date: NaiveDate) -> String {
        date.format_localized(self.long_date_pattern(), self.chrono_locale())
            .to_string()
    }

    fn long_date_pattern(&self) -> &'static str {
        match self.language.as_str() {
            "en" => "%B %-d, %Y",
            "de" | "da" | "nb" | "nn" | "no" | "cs" | "sk" => "%-d. %B %Y",
            "es" | "pt" | "ca" => "%-d de %B de %Y",
            "ja" | "zh" => "%Y年%-m月%-d日",
            "ko" => "%Y년 %-m월 %-d일",
            "hu" => "%Y. %B %-d.",
            _ => "%-d %B %Y",
        }
    }

    /// Whether day-first numeric dates (`05/03/2021` = 5 March) apply
    pub fn prefers_day_first(&self) -> bool {
        !(self.language == "en" && matches!(self.region.as_deref(), None | Some("US")))
    }
}

impl fmt::Display for LanguageTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.region {
            Some(region) => write!(f, "{}-{}", self.language, region),
            None => write!(f, "{}", self.language),
        }
    }
}

fn is_iso_639_1(code: &str) -> bool {
    ISO_639_1.split_whitespace().any(|known| known == code)
}

fn iso_639_3_to_1(code: &str) -> Option<&'static str> {
    ISO_639_3_TO_1
        .iter()
        .find(|(three, _)| *three == code)
        .map(|(_, two)| *two)
}

/// Where detection input text came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextOrigin {
    /// Plain text (e.g. concatenated XML paragraph text)
    Plain,
    /// HTML markup that still has to be tokenized into text
    Markup,
}

/// Heuristic language detection contract
pub trait LanguageDetector {
    /// Guess the language of `text`; `None` when no guess is possible
    fn detect(&self, text: &str, origin: TextOrigin) -> Option<LanguageTag>;
}

/// Default detector backed by `whatlang`
#[derive(Debug, Default, Clone, Copy)]
pub struct WhatlangDetector;

impl LanguageDetector for WhatlangDetector {
    fn detect(&self, text: &str, origin: TextOrigin) -> Option<LanguageTag> {
        let stripped;
        let text = match origin {
            TextOrigin::Plain => text,
            TextOrigin::Markup => {
                stripped = html_to_text(&HtmlTextExtractor, text).ok()?;
                stripped.as_str()
            }
        };

        let info = whatlang::detect(text)?;
        debug!(
            lang = info.lang().code(),
            confidence = info.confidence(),
            reliable = info.is_reliable(),
            "heuristic language detection"
        );
        LanguageTag::parse(info.lang().code())
    }
}

/// Combines declared tags, heuristic detection and a default
#[derive(Clone)]
pub struct LanguageResolver {
    detector: Rc<dyn LanguageDetector>,
    default: LanguageTag,
}

impl LanguageResolver {
    /// Create a resolver; an unrecognized `default_language` falls back to `en`
    pub fn new(detector: Rc<dyn LanguageDetector>, default_language: &str) -> Self {
        let default = LanguageTag::parse(default_language).unwrap_or_else(|| LanguageTag {
            language: "en".to_string(),
            region: None,
        });
        Self { detector, default }
    }

    pub fn default_language(&self) -> &LanguageTag {
        &self.default
    }

    /// Resolve a language
    ///
    /// # Arguments
    ///
    /// * `declared` - Tag declared by the document, if any
    /// * `text` - Produces the detection input; only called when `declared`
    ///   is absent or unrecognized
    /// * `origin` - Whether the produced text is markup
    pub fn resolve<F>(&self, declared: Option<&str>, text: F, origin: TextOrigin) -> LanguageTag
    where
        F: FnOnce() -> String,
    {
        if let Some(raw) = declared {
            match LanguageTag::parse(raw) {
                Some(tag) => return tag,
                None => debug!(tag = raw, "ignoring unrecognized declared language"),
            }
        }

        let text = text();
        if text.trim().is_empty() {
            debug!(default = %self.default, "no text for language detection");
            return self.default.clone();
        }

        self.detector
            .detect(&text, origin)
            .unwrap_or_else(|| self.default.clone())
    }
}

impl fmt::Debug for LanguageResolver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LanguageResolver")
            .field("default", &self.default)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    struct CountingDetector {
        calls: Cell<usize>,
        answer: Option<&'static str>,
    }

    impl LanguageDetector for CountingDetector {
        fn detect(&self, _text: &str, _origin: TextOrigin) -> Option<LanguageTag> {
            self.calls.set(self.calls.get() + 1);
            self.answer.and_then(LanguageTag::parse)
        }
    }

    fn counting(answer: Option<&'static str>) -> Rc<CountingDetector> {
        Rc::new(CountingDetector {
            calls: Cell::new(0),
            answer,
        })
    }

    // ============================================================================
    // LanguageTag
    // ============================================================================

    #[test]
    fn test_parse_forms() {
        assert_eq!(LanguageTag::parse("en").unwrap().to_string(), "en");
        assert_eq!(LanguageTag::parse("en-us").unwrap().to_string(), "en-US");
        assert_eq!(LanguageTag::parse("pt_BR").unwrap().to_string(), "pt-BR");
        assert_eq!(LanguageTag::parse("fr_FR.UTF-8").unwrap().to_string(), "fr-FR");
        assert_eq!(LanguageTag::parse(" DE ").unwrap().to_string(), "de");
        assert_eq!(LanguageTag::parse("zh-Hans-CN").unwrap().to_string(), "zh-CN");
    }

    #[test]
    fn test_parse_three_letter_codes() {
        assert_eq!(LanguageTag::parse("eng").unwrap().to_string(), "en");
        assert_eq!(LanguageTag::parse("cmn").unwrap().to_string(), "zh");
        assert!(LanguageTag::parse("xyz").is_none());
    }

    #[test]
    fn test_parse_rejects_unknown() {
        assert!(LanguageTag::parse("").is_none());
        assert!(LanguageTag::parse("qq").is_none());
        assert!(LanguageTag::parse("klingon").is_none());
    }

    #[test]
    fn test_two_letter_code() {
        let tag = LanguageTag::parse("es-MX").unwrap();
        assert_eq!(tag.two_letter_language_code(), "es");
        assert_eq!(tag.region(), Some("MX"));
    }

    #[test]
    fn test_format_long_date_english() {
        let tag = LanguageTag::parse("en").unwrap();
        let date = NaiveDate::from_ymd_opt(2021, 3, 5).unwrap();
        assert_eq!(tag.format_long_date(date), "March 5, 2021");
    }

    #[test]
    fn test_format_long_date_unknown_locale_falls_back() {
        // Volapük has no date locale; formatting still succeeds
        let tag = LanguageTag::parse("vo").unwrap();
        let date = NaiveDate::from_ymd_opt(2021, 3, 5).unwrap();
        assert_eq!(tag.format_long_date(date), "5 March 2021");
    }

    #[test]
    fn test_day_first_preference() {
        assert!(!LanguageTag::parse("en").unwrap().prefers_day_first());
        assert!(!LanguageTag::parse("en-US").unwrap().prefers_day_first());
        assert!(LanguageTag::parse("en-GB").unwrap().prefers_day_first());
        assert!(LanguageTag::parse("fr").unwrap().prefers_day_first());
    }

    // ============================================================================
    // Resolver
    // ============================================================================

    #[test]
    fn test_declared_tag_skips_detector() {
        let detector = counting(Some("de"));
        let resolver = LanguageResolver::new(detector.clone(), "en");
        let tag = resolver.resolve(Some("fr"), || panic!("text must not be built"), TextOrigin::Plain);
        assert_eq!(tag.to_string(), "fr");
        assert_eq!(detector.calls.get(), 0);
    }

    #[test]
    fn test_unrecognized_tag_falls_through_to_detection() {
        let detector = counting(Some("de"));
        let resolver = LanguageResolver::new(detector.clone(), "en");
        let tag = resolver.resolve(Some("nonsense"), || "Text".to_string(), TextOrigin::Plain);
        assert_eq!(tag.to_string(), "de");
        assert_eq!(detector.calls.get(), 1);
    }

    #[test]
    fn test_no_text_uses_default() {
        let detector = counting(Some("de"));
        let resolver = LanguageResolver::new(detector.clone(), "it");
        let tag = resolver.resolve(None, String::new, TextOrigin::Plain);
        assert_eq!(tag.to_string(), "it");
        assert_eq!(detector.calls.get(), 0);
    }

    #[test]
    fn test_failed_detection_uses_default() {
        let resolver = LanguageResolver::new(counting(None), "en");
        let tag = resolver.resolve(None, || "???".to_string(), TextOrigin::Plain);
        assert_eq!(tag.to_string(), "en");
    }

    #[test]
    fn test_bad_default_falls_back_to_english() {
        let resolver = LanguageResolver::new(counting(None), "not-a-language");
        assert_eq!(resolver.default_language().to_string(), "en");
    }

    // ============================================================================
    // whatlang detector
    // ============================================================================

    #[test]
    fn test_whatlang_detects_plain_text() {
        let text = "Der schnelle braune Fuchs springt über den faulen Hund. \
            Das ist ein ganz gewöhnlicher deutscher Satz mit vielen Wörtern.";
        let tag = WhatlangDetector.detect(text, TextOrigin::Plain).unwrap();
        assert_eq!(tag.two_letter_language_code(), "de");
    }

    #[test]
    fn test_whatlang_strips_markup() {
        let html = "<html><body><p>La casa es muy grande y tiene un jardín precioso.</p>\
            <p>Los niños juegan en el parque todos los días después de la escuela.</p></body></html>";
        let tag = WhatlangDetector.detect(html, TextOrigin::Markup).unwrap();
        assert_eq!(tag.two_letter_language_code(), "es");
    }
}
