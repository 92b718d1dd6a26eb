#![no_main]

use document_normalizer::repair::repair_html;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let Ok(html) = std::str::from_utf8(data) else {
        return;
    };
    if let Ok(first) = repair_html(html, "fuzz") {
        let second = repair_html(&first, "fuzz").expect("repaired output must parse");
        assert_eq!(first, second, "repair must be idempotent");
    }
});
