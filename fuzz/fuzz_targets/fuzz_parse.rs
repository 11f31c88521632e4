#![no_main]
use libfuzzer_sys::fuzz_target;
use xmlshape::parser::{parse_bytes_with_options, ParseOptions, ReviveOptions};

fuzz_target!(|data: &[u8]| {
    // Byte input goes through encoding detection first.
    let _ = parse_bytes_with_options(data, &ParseOptions::default());
    let revive = ReviveOptions::default().booleans(true).numbers(true);
    let _ = parse_bytes_with_options(data, &ParseOptions::default().revive(revive));
});
