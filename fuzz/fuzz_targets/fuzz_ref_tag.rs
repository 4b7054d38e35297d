#![no_main]

use libfuzzer_sys::fuzz_target;
use veil_ledger::{RefTag, REF_TAG_HEX_LEN};

fuzz_target!(|data: &str| {
    // Parsing arbitrary input should not panic
    if let Ok(tag) = RefTag::parse(data) {
        assert_eq!(tag.hex().len(), REF_TAG_HEX_LEN);

        // Display form parses back to the same tag
        let reparsed = RefTag::parse(&tag.to_string()).unwrap();
        assert_eq!(tag, reparsed);
    }
});
