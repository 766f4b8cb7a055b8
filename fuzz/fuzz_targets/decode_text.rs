#![no_main]
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    if let Ok(text) = std::str::from_utf8(data) {
        if let Ok(value) = graphpack::decode(text) {
            // Anything that decodes must encode again, unless it carries a reference-like string.
            match graphpack::encode(&value) {
                Ok(_) => (),
                Err(e) => assert!(e.is_serialization()),
            }
        }
    }
});
