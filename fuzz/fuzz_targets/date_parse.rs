#![no_main]

use document_normalizer::language::LanguageTag;
use document_normalizer::metadata::localize_date;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let Ok(text) = std::str::from_utf8(data) else {
        return;
    };
    for tag in ["en", "de", "fr-CA", "ja"] {
        if let Some(language) = LanguageTag::parse(tag) {
            let _ = localize_date(text, &language);
        }
    }
});
