#![no_main]
use libfuzzer_sys::fuzz_target;
use xmlshape::parser::{build_tree, parse_str_with_options, Mode, ParseOptions};

fuzz_target!(|data: &[u8]| {
    if let Ok(s) = std::str::from_utf8(data) {
        let _ = parse_str_with_options(s, &ParseOptions::default().mode(Mode::Html));
        let _ = build_tree(s, Mode::Html);
    }
});
