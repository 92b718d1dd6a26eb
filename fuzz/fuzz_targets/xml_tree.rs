#![no_main]

use std::path::Path;

use document_normalizer::docbook::DOCBOOK_POLICY;
use document_normalizer::language::LanguageTag;
use document_normalizer::metadata::MetadataExtractor;
use document_normalizer::xml::XmlTree;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let Ok(tree) = XmlTree::parse_bytes(data) else {
        return;
    };
    let metadata = MetadataExtractor::new(&DOCBOOK_POLICY).extract(
        &tree,
        Path::new("fuzz.dbk"),
        || LanguageTag::parse("en").expect("en is a known tag"),
    );
    assert!(!metadata.title.is_empty());
});
