#![no_main]
use libfuzzer_sys::fuzz_target;
use xmlshape::{parse_str, stringify};

fuzz_target!(|data: &[u8]| {
    if let Ok(s) = std::str::from_utf8(data) {
        // Parse -> stringify -> parse should never panic
        if let Ok(value) = parse_str(s) {
            if let Ok(output) = stringify(&value) {
                let _ = parse_str(&output);
            }
        }
    }
});
