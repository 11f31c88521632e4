#![allow(clippy::expect_used)]

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use std::fmt::Write;
use xmlshape::parser::{
    build_tree, parse_str_with_options, CleanOptions, Mode, ParseOptions, ReviveOptions,
};
use xmlshape::serial::{stringify_with_options, FormatOptions, StringifyOptions};
use xmlshape::{parse_str, stringify};

// ---------------------------------------------------------------------------
// Document generators
// ---------------------------------------------------------------------------

/// Generates a small XML document with approximately 10 elements.
fn make_small_xml() -> String {
    let mut xml = String::from("<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n<root>\n");
    for i in 0..10 {
        let _ = writeln!(xml, "  <item id=\"{i}\">Value {i}</item>");
    }
    xml.push_str("</root>\n");
    xml
}

/// Generates a catalog with 1000 books, comments and numeric leaves.
fn make_large_xml() -> String {
    let mut xml = String::from("<?xml version=\"1.0\"?>\n<catalog>\n");
    for i in 0..1000 {
        let _ = writeln!(
            xml,
            "  <book id=\"bk{i}\"><!-- entry {i} --><title lang=\"en\">Title {i}</title>\
             <author>Author {i}</author><price>{}.99</price>\
             <available>{}</available></book>",
            10 + i,
            i % 2 == 0
        );
    }
    xml.push_str("</catalog>\n");
    xml
}

/// Generates a deeply nested XML document with the given nesting depth.
fn make_nested_xml(depth: usize) -> String {
    let mut xml = String::new();
    for i in 0..depth {
        let _ = write!(xml, "<level{i}>");
    }
    xml.push_str("leaf");
    for i in (0..depth).rev() {
        let _ = write!(xml, "</level{i}>");
    }
    xml
}

/// Generates text-heavy content full of entity references.
fn make_entity_heavy_xml() -> String {
    let mut xml = String::from("<root>\n");
    for i in 0..200 {
        let _ = writeln!(
            xml,
            "  <p>&quot;{i}&quot; &lt; &#{}; &amp;&amp; &#x41; &apos;quoted&apos;</p>",
            48 + i % 10
        );
    }
    xml.push_str("</root>\n");
    xml
}

/// Generates html-like markup with unclosed tags and unquoted attributes.
fn make_html_like() -> String {
    let mut html = String::from("<html><body>\n");
    for i in 0..100 {
        let _ = writeln!(
            html,
            "<div class=section id=s{i}><p>Paragraph {i}<p>Another <br> line</div>"
        );
    }
    html.push_str("</body></html>\n");
    html
}

// ---------------------------------------------------------------------------
// Parsing benchmarks
// ---------------------------------------------------------------------------

fn bench_parse_small(c: &mut Criterion) {
    let xml = make_small_xml();
    c.bench_function("parse_small", |b| {
        b.iter(|| parse_str(black_box(&xml)));
    });
}

fn bench_parse_large(c: &mut Criterion) {
    let xml = make_large_xml();
    c.bench_function("parse_large", |b| {
        b.iter(|| parse_str(black_box(&xml)));
    });
}

fn bench_parse_large_revived(c: &mut Criterion) {
    let xml = make_large_xml();
    let options = ParseOptions::default()
        .clean(CleanOptions::default().comments(true))
        .revive(ReviveOptions::default().booleans(true).numbers(true));
    c.bench_function("parse_large_revived", |b| {
        b.iter(|| parse_str_with_options(black_box(&xml), &options));
    });
}

fn bench_parse_deeply_nested(c: &mut Criterion) {
    let xml = make_nested_xml(200);
    c.bench_function("parse_deeply_nested", |b| {
        b.iter(|| parse_str(black_box(&xml)));
    });
}

fn bench_parse_entities(c: &mut Criterion) {
    let xml = make_entity_heavy_xml();
    c.bench_function("parse_entities", |b| {
        b.iter(|| parse_str(black_box(&xml)));
    });
}

fn bench_parse_html_mode(c: &mut Criterion) {
    let html = make_html_like();
    let options = ParseOptions::default().mode(Mode::Html);
    c.bench_function("parse_html_mode", |b| {
        b.iter(|| parse_str_with_options(black_box(&html), &options));
    });
}

fn bench_build_tree(c: &mut Criterion) {
    let xml = make_large_xml();
    c.bench_function("build_tree_large", |b| {
        b.iter(|| build_tree(black_box(&xml), Mode::Xml));
    });
}

// ---------------------------------------------------------------------------
// Stringify benchmarks
// ---------------------------------------------------------------------------

fn bench_stringify_small(c: &mut Criterion) {
    let value = parse_str(&make_small_xml()).expect("small document should parse");
    c.bench_function("stringify_small", |b| {
        b.iter(|| stringify(black_box(&value)));
    });
}

fn bench_stringify_large(c: &mut Criterion) {
    let value = parse_str(&make_large_xml()).expect("large document should parse");
    c.bench_function("stringify_large", |b| {
        b.iter(|| stringify(black_box(&value)));
    });
}

fn bench_stringify_minified(c: &mut Criterion) {
    let value = parse_str(&make_large_xml()).expect("large document should parse");
    let options = StringifyOptions::default().format(FormatOptions::default().indent(""));
    c.bench_function("stringify_minified", |b| {
        b.iter(|| stringify_with_options(black_box(&value), &options));
    });
}

// ---------------------------------------------------------------------------
// Round-trip benchmark
// ---------------------------------------------------------------------------

fn bench_roundtrip(c: &mut Criterion) {
    let xml = make_large_xml();
    c.bench_function("roundtrip_large", |b| {
        b.iter(|| {
            let value = parse_str(black_box(&xml)).expect("parse should succeed");
            let output = stringify(&value).expect("stringify should succeed");
            parse_str(&output).expect("re-parse should succeed")
        });
    });
}

criterion_group!(
    parsing,
    bench_parse_small,
    bench_parse_large,
    bench_parse_large_revived,
    bench_parse_deeply_nested,
    bench_parse_entities,
    bench_parse_html_mode,
    bench_build_tree,
);

criterion_group!(
    stringifying,
    bench_stringify_small,
    bench_stringify_large,
    bench_stringify_minified,
);

criterion_group!(roundtrip, bench_roundtrip);

criterion_main!(parsing, stringifying, roundtrip);
