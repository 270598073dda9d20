// benches/path_encoding_bench.rs
//! Path encoding and header resolution benchmarks
//!
//! Encoding runs once per network resource and once per intercepted request,
//! header resolution once per intercepted request.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use overrides_engine::overrides::header_overrides::{parse_header_overrides, Header};
use overrides_engine::overrides::path_encoder::decode;
use overrides_engine::overrides::{HeaderOverrideResolver, PathEncoder};

const PROJECT_ROOT: &str = "/home/dev/overrides";

fn bench_encode(c: &mut Criterion) {
    let encoder = PathEncoder::default();
    let mut group = c.benchmark_group("path_encoder/encode");

    let urls = [
        ("plain", "https://example.com/static/js/app.js".to_string()),
        ("directory", "https://example.com/docs/".to_string()),
        (
            "query",
            "https://example.com/api/search?q=rust+lang&page=2".to_string(),
        ),
        ("unicode", "https://example.com/données/été.css".to_string()),
        ("long", format!("https://example.com/{}", "segment/".repeat(40))),
    ];

    for (name, url) in &urls {
        group.bench_with_input(BenchmarkId::from_parameter(name), url, |b, url| {
            b.iter(|| encoder.encode(black_box(url), PROJECT_ROOT));
        });
    }

    group.finish();
}

fn bench_decode(c: &mut Criterion) {
    let encoder = PathEncoder::default();
    let encoded = encoder.encode("https://example.com/données/a b?x=1", PROJECT_ROOT);

    c.bench_function("path_encoder/decode", |b| {
        b.iter(|| decode(black_box(&encoded)));
    });
}

fn bench_resolve_headers(c: &mut Criterion) {
    let mut resolver = HeaderOverrideResolver::new();
    for (path, content) in [
        (".headers", r#"[{"applyTo":"*","headers":{"X-Root":"1"}}]"#),
        (
            "example.com/.headers",
            r#"[{"applyTo":"*.js","headers":{"Cache-Control":"no-store"}}]"#,
        ),
        (
            "example.com/static/.headers",
            r#"[{"applyTo":"index.html","headers":{"X-Index":"1"}}]"#,
        ),
    ] {
        if let Ok(parsed) = parse_header_overrides(path, content) {
            resolver.insert(parsed);
        }
    }

    let base = vec![
        Header::new("Content-Type", "text/javascript"),
        Header::new("Cache-Control", "max-age=3600"),
    ];

    c.bench_function("header_overrides/resolve", |b| {
        b.iter(|| {
            resolver.resolve(
                black_box("https://example.com/static/js/app.js"),
                "example.com/static/js/app.js",
                &base,
            )
        });
    });
}

criterion_group!(benches, bench_encode, bench_decode, bench_resolve_headers);
criterion_main!(benches);
